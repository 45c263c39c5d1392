//! Frame headers, quantization tables, Huffman tables and scan headers.

use std::io::{self, Write};

use crate::error::DocumentError;
use crate::selector::{OutputMode, TableClass, MAX_DESTINATION};

/// Natural (row-major) position of each zigzag coefficient.
pub const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Bounds-checked big-endian reader over a segment payload.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    /// File offset of `data[0]`, for error messages
    base: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// File offset of the next byte
    pub(crate) fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DocumentError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + n)
            .ok_or_else(|| DocumentError::Malformed {
                offset: self.base + self.pos,
                reason: format!("segment truncated, {n} more byte(s) expected"),
            })?;
        self.pos += n;
        Ok(bytes)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DocumentError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, DocumentError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameComponent {
    pub id: u8,
    pub horizontal: u8,
    pub vertical: u8,
    pub quantization_table: u8,
}

/// Content of an SOFn segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub marker: u8,
    pub precision: u8,
    pub height: u16,
    pub width: u16,
    pub components: Vec<FrameComponent>,
}

impl FrameHeader {
    pub fn parse(marker: u8, payload: &[u8], base: usize) -> Result<Self, DocumentError> {
        let mut r = Reader::new(payload, base);
        let precision = r.u8()?;
        let height = r.u16()?;
        let width = r.u16()?;
        let count = r.u8()?;
        let components = (0..count)
            .map(|_| {
                let id = r.u8()?;
                let sampling = r.u8()?;
                Ok(FrameComponent {
                    id,
                    horizontal: sampling >> 4,
                    vertical: sampling & 0x0F,
                    quantization_table: r.u8()?,
                })
            })
            .collect::<Result<_, DocumentError>>()?;
        Ok(Self {
            marker,
            precision,
            height,
            width,
            components,
        })
    }

    pub fn format(&self, out: &mut dyn Write, frame: usize) -> io::Result<()> {
        writeln!(
            out,
            "Frame {frame}: {} ({}), {}-bit, {}x{}, {} component(s)",
            super::marker_name(self.marker),
            coding_process(self.marker),
            self.precision,
            self.width,
            self.height,
            self.components.len()
        )?;
        for c in &self.components {
            writeln!(
                out,
                "  component {}: sampling {}x{}, quantization table {}",
                c.id, c.horizontal, c.vertical, c.quantization_table
            )?;
        }
        Ok(())
    }
}

fn coding_process(marker: u8) -> &'static str {
    match marker & 0x0F {
        0x0 => "baseline DCT",
        0x1 => "extended sequential DCT, Huffman",
        0x2 => "progressive DCT, Huffman",
        0x3 => "lossless, Huffman",
        0x5 => "differential sequential DCT, Huffman",
        0x6 => "differential progressive DCT, Huffman",
        0x7 => "differential lossless, Huffman",
        0x9 => "extended sequential DCT, arithmetic",
        0xA => "progressive DCT, arithmetic",
        0xB => "lossless, arithmetic",
        0xD => "differential sequential DCT, arithmetic",
        0xE => "differential progressive DCT, arithmetic",
        _ => "differential lossless, arithmetic",
    }
}

/// One table of a DQT segment. `values` are in zigzag order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationTable {
    pub destination: u8,
    pub sixteen_bit: bool,
    pub values: [u16; 64],
}

impl QuantizationTable {
    /// A DQT segment may define several tables.
    pub fn parse_all(payload: &[u8], base: usize) -> Result<Vec<Self>, DocumentError> {
        let mut r = Reader::new(payload, base);
        let mut tables = Vec::new();
        while !r.is_empty() {
            let pq_tq = r.u8()?;
            let sixteen_bit = pq_tq >> 4 != 0;
            let mut values = [0u16; 64];
            for v in values.iter_mut() {
                *v = if sixteen_bit { r.u16()? } else { u16::from(r.u8()?) };
            }
            tables.push(Self {
                destination: pq_tq & 0x0F,
                sixteen_bit,
                values,
            });
        }
        Ok(tables)
    }

    /// Coefficients rearranged by rows.
    pub fn matrix(&self) -> [u16; 64] {
        let mut matrix = [0u16; 64];
        for (zz, &natural) in ZIGZAG.iter().enumerate() {
            matrix[natural] = self.values[zz];
        }
        matrix
    }

    pub fn format(&self, out: &mut dyn Write, mode: OutputMode) -> io::Result<()> {
        let precision = if self.sixteen_bit { 16 } else { 8 };
        if mode.standard() {
            writeln!(
                out,
                "Quantization table {} ({precision}-bit), zigzag order:",
                self.destination
            )?;
            write_rows(out, &self.values)?;
        }
        if mode.extra() {
            writeln!(
                out,
                "Quantization table {} ({precision}-bit), matrix by rows:",
                self.destination
            )?;
            write_rows(out, &self.matrix())?;
        }
        Ok(())
    }
}

fn write_rows(out: &mut dyn Write, values: &[u16; 64]) -> io::Result<()> {
    for row in values.chunks(8) {
        for v in row {
            write!(out, "{v:>6}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// A code assigned by a Huffman table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HuffmanCode {
    pub length: u8,
    pub code: u16,
    pub symbol: u8,
}

/// One table of a DHT segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    pub class: TableClass,
    pub destination: u8,
    /// Number of codes of each length 1..=16
    pub counts: [u8; 16],
    pub symbols: Vec<u8>,
}

impl HuffmanTable {
    pub fn parse_all(payload: &[u8], base: usize) -> Result<Vec<Self>, DocumentError> {
        let mut r = Reader::new(payload, base);
        let mut tables = Vec::new();
        while !r.is_empty() {
            let at = r.offset();
            let tc_th = r.u8()?;
            let class = match tc_th >> 4 {
                0 => TableClass::Dc,
                1 => TableClass::Ac,
                other => {
                    return Err(DocumentError::Malformed {
                        offset: at,
                        reason: format!("invalid Huffman table class {other}"),
                    })
                }
            };
            let destination = tc_th & 0x0F;
            if destination > MAX_DESTINATION {
                return Err(DocumentError::Malformed {
                    offset: at,
                    reason: format!("invalid Huffman table destination {destination}"),
                });
            }
            let mut counts = [0u8; 16];
            counts.copy_from_slice(r.take(16)?);
            let total = counts.iter().map(|&c| usize::from(c)).sum();
            tables.push(Self {
                class,
                destination,
                counts,
                symbols: r.take(total)?.to_vec(),
            });
        }
        Ok(tables)
    }

    /// Destination index with DC tables at 0-3 and AC tables at 4-7.
    pub fn flat_destination(&self) -> u8 {
        self.class as u8 * (MAX_DESTINATION + 1) + self.destination
    }

    /// Canonical codes, by increasing length.
    pub fn codes(&self) -> Vec<HuffmanCode> {
        let mut codes = Vec::with_capacity(self.symbols.len());
        let mut symbols = self.symbols.iter();
        let mut code: u32 = 0;
        for (i, &count) in self.counts.iter().enumerate() {
            for _ in 0..count {
                let Some(&symbol) = symbols.next() else {
                    return codes;
                };
                codes.push(HuffmanCode {
                    length: i as u8 + 1,
                    code: code as u16,
                    symbol,
                });
                code += 1;
            }
            code <<= 1;
        }
        codes
    }

    fn class_name(&self) -> &'static str {
        match self.class {
            TableClass::Dc => "DC",
            TableClass::Ac => "AC",
        }
    }

    pub fn format(&self, out: &mut dyn Write, mode: OutputMode) -> io::Result<()> {
        if mode.standard() {
            writeln!(
                out,
                "Huffman table {} {} ({} symbols), code lengths:",
                self.class_name(),
                self.destination,
                self.symbols.len()
            )?;
            let mut symbols = self.symbols.iter();
            for (i, &count) in self.counts.iter().enumerate() {
                if count == 0 {
                    continue;
                }
                write!(out, "  {:>2} bits, {:>3} symbol(s):", i + 1, count)?;
                for symbol in symbols.by_ref().take(usize::from(count)) {
                    write!(out, " {symbol:02X}")?;
                }
                writeln!(out)?;
            }
        }
        if mode.extra() {
            writeln!(
                out,
                "Huffman table {} {}, codes by increasing length:",
                self.class_name(),
                self.destination
            )?;
            for c in self.codes() {
                let bits = format!("{:0width$b}", c.code, width = usize::from(c.length));
                writeln!(out, "  {bits:<16} -> {:02X}", c.symbol)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanComponent {
    pub selector: u8,
    pub dc_table: u8,
    pub ac_table: u8,
}

/// Content of an SOS segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHeader {
    pub components: Vec<ScanComponent>,
    pub spectral_start: u8,
    pub spectral_end: u8,
    pub approx_high: u8,
    pub approx_low: u8,
}

impl ScanHeader {
    pub fn parse(payload: &[u8], base: usize) -> Result<Self, DocumentError> {
        let mut r = Reader::new(payload, base);
        let count = r.u8()?;
        let components = (0..count)
            .map(|_| {
                let selector = r.u8()?;
                let tables = r.u8()?;
                Ok(ScanComponent {
                    selector,
                    dc_table: tables >> 4,
                    ac_table: tables & 0x0F,
                })
            })
            .collect::<Result<_, DocumentError>>()?;
        let spectral_start = r.u8()?;
        let spectral_end = r.u8()?;
        let approx = r.u8()?;
        Ok(Self {
            components,
            spectral_start,
            spectral_end,
            approx_high: approx >> 4,
            approx_low: approx & 0x0F,
        })
    }

    pub fn format(
        &self,
        out: &mut dyn Write,
        index: usize,
        data: &[u8],
        mode: OutputMode,
    ) -> io::Result<()> {
        writeln!(out, "Scan {index}: {} component(s)", self.components.len())?;
        if mode.standard() {
            for c in &self.components {
                writeln!(
                    out,
                    "  component {}: DC table {}, AC table {}",
                    c.selector, c.dc_table, c.ac_table
                )?;
            }
            writeln!(
                out,
                "  spectral selection {}-{}, successive approximation {}/{}",
                self.spectral_start, self.spectral_end, self.approx_high, self.approx_low
            )?;
        }
        if mode.extra() {
            let restarts = data
                .windows(2)
                .filter(|w| w[0] == 0xFF && (0xD0..=0xD7).contains(&w[1]))
                .count();
            writeln!(
                out,
                "  entropy-coded data: {} byte(s), {restarts} restart marker(s)",
                data.len()
            )?;
        }
        Ok(())
    }
}
