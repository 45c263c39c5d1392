//! Marker-level JPEG reader implementing [`Document`].
//!
//! The file is split into marker segments; entropy-coded data following each SOS is kept
//! verbatim with its segment. Tables are defined ahead of the SOFn of the frame that uses
//! them, so a table belongs to the next SOFn unless another SOS of the current frame
//! follows it. Scans belong to the frame whose SOFn precedes them. Nothing is decoded
//! beyond segment headers; pixel work is left to the `image` crate.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::dispatch::Document;
use crate::error::DocumentError;
use crate::selector::{Choice, OutputMode, PictureSaveSelector, TableDomain, ThumbnailSelector};

pub mod app;
pub mod picture;
pub mod tables;

use app::{app_id, Exif};
use tables::{FrameHeader, HuffmanTable, QuantizationTable, ScanHeader};

pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOS: u8 = 0xDA;
pub const DQT: u8 = 0xDB;
pub const DHT: u8 = 0xC4;
pub const APP0: u8 = 0xE0;
pub const APP15: u8 = 0xEF;
const TEM: u8 = 0x01;

/// Start-of-frame markers: C0-CF except DHT, JPG and DAC.
pub fn is_sof(marker: u8) -> bool {
    (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

fn is_rst(marker: u8) -> bool {
    (0xD0..=0xD7).contains(&marker)
}

// Markers without a length field
fn is_standalone(marker: u8) -> bool {
    marker == TEM || is_rst(marker)
}

pub fn marker_name(marker: u8) -> String {
    match marker {
        SOI => "SOI".into(),
        EOI => "EOI".into(),
        SOS => "SOS".into(),
        DQT => "DQT".into(),
        DHT => "DHT".into(),
        0xCC => "DAC".into(),
        0xDD => "DRI".into(),
        0xDC => "DNL".into(),
        0xDE => "DHP".into(),
        0xDF => "EXP".into(),
        0xFE => "COM".into(),
        TEM => "TEM".into(),
        m if is_sof(m) => format!("SOF{}", m - 0xC0),
        m if is_rst(m) => format!("RST{}", m - 0xD0),
        m if app_id(m).is_some() => format!("APP{}", m - APP0),
        m => format!("0x{m:02X}"),
    }
}

/// One marker segment. `offset` is the position in the original file of the 0xFF
/// immediately preceding the marker code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub marker: u8,
    pub offset: usize,
    pub payload: Vec<u8>,
    /// Entropy-coded data following an SOS header
    pub scan_data: Vec<u8>,
}

impl Segment {
    fn encoded_len(&self) -> usize {
        let header = if is_standalone(self.marker) { 2 } else { 4 };
        header + self.payload.len() + self.scan_data.len()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend([0xFF, self.marker]);
        if !is_standalone(self.marker) {
            out.extend(((self.payload.len() + 2) as u16).to_be_bytes());
            out.extend(&self.payload);
        }
        out.extend(&self.scan_data);
    }

    // payload starts after marker and length
    fn payload_offset(&self) -> usize {
        self.offset + 4
    }
}

/// Result of walking a marker stream.
#[derive(Debug)]
pub(crate) struct Walk {
    pub segments: Vec<Segment>,
    /// Bytes consumed, EOI included when present. Without EOI, the start of whatever
    /// could not be read as a complete segment.
    pub end: usize,
    /// False when the data ran out before EOI
    pub complete: bool,
}

fn malformed(offset: usize, reason: impl Into<String>) -> DocumentError {
    DocumentError::Malformed {
        offset,
        reason: reason.into(),
    }
}

/// Position of the marker ending the entropy-coded data that starts at `from`.
fn entropy_end(data: &[u8], from: usize) -> usize {
    let mut i = from;
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < data.len() && data[j] == 0xFF {
            j += 1;
        }
        match data.get(j) {
            Some(&0x00) => i = j + 1,
            Some(&m) if is_rst(m) => i = j + 1,
            Some(_) => return i,
            None => return data.len(),
        }
    }
    data.len()
}

pub(crate) fn walk(data: &[u8], log_markers: bool) -> Result<Walk, DocumentError> {
    if !data.starts_with(&[0xFF, SOI]) {
        return Err(malformed(0, "missing SOI marker"));
    }
    let mut segments = Vec::new();
    let mut pos = 2;
    loop {
        let Some(&byte) = data.get(pos) else {
            return Ok(Walk {
                segments,
                end: data.len(),
                complete: false,
            });
        };
        if byte != 0xFF {
            return Err(malformed(pos, format!("expected a marker, found 0x{byte:02X}")));
        }
        let start = pos;
        while data.get(pos) == Some(&0xFF) {
            pos += 1;
        }
        let Some(&marker) = data.get(pos) else {
            return Ok(Walk {
                segments,
                end: start,
                complete: false,
            });
        };
        // the 0xFF right before the marker code; fill bytes come earlier
        let offset = pos - 1;
        if offset > start {
            debug!("{} fill byte(s) at offset {start}", offset - start);
        }
        pos += 1;

        match marker {
            EOI => {
                if log_markers {
                    info!("{} at offset {offset}", marker_name(marker));
                }
                return Ok(Walk {
                    segments,
                    end: pos,
                    complete: true,
                });
            }
            0x00 | SOI => {
                return Err(malformed(offset, format!("unexpected marker 0x{marker:02X}")));
            }
            m if is_standalone(m) => {
                if log_markers {
                    info!("{} at offset {offset}", marker_name(m));
                }
                segments.push(Segment {
                    marker,
                    offset,
                    payload: Vec::new(),
                    scan_data: Vec::new(),
                });
                continue;
            }
            _ => {}
        }

        let length = match data.get(pos..pos + 2) {
            Some(&[hi, lo]) => usize::from(u16::from_be_bytes([hi, lo])),
            _ => return Err(malformed(pos, "segment length missing")),
        };
        if length < 2 || pos + length > data.len() {
            return Err(malformed(
                pos,
                format!("{} length {length} overruns the data", marker_name(marker)),
            ));
        }
        let payload = data[pos + 2..pos + length].to_vec();
        pos += length;

        let scan_data = if marker == SOS {
            let end = entropy_end(data, pos);
            let scan = data[pos..end].to_vec();
            pos = end;
            scan
        } else {
            Vec::new()
        };
        if log_markers {
            info!(
                "{} at offset {offset}: length {length}{}",
                marker_name(marker),
                if marker == SOS {
                    format!(", {} byte(s) of entropy-coded data", scan_data.len())
                } else {
                    String::new()
                }
            );
        }
        segments.push(Segment {
            marker,
            offset,
            payload,
            scan_data,
        });
    }
}

/// Wraps a writer and counts the bytes written through it.
struct Counted<'a> {
    inner: &'a mut dyn Write,
    bytes: usize,
}

impl<'a> Counted<'a> {
    fn new(inner: &'a mut dyn Write) -> Self {
        Self { inner, bytes: 0 }
    }
}

impl Write for Counted<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// A JPEG file split into marker segments.
#[derive(Debug, Clone)]
pub struct JpegDocument {
    source: Vec<u8>,
    segments: Vec<Segment>,
    /// Whether an EOI is written after the segments
    eoi: bool,
    /// Bytes after EOI, or the unreadable tail of a file without EOI
    trailer: Vec<u8>,
}

impl JpegDocument {
    pub fn open(path: &Path, log_markers: bool) -> Result<Self, DocumentError> {
        let data = fs::read(path)?;
        info!("read {} byte(s) from {}", data.len(), path.display());
        Self::parse(data, log_markers)
    }

    pub fn parse(data: Vec<u8>, log_markers: bool) -> Result<Self, DocumentError> {
        let walked = walk(&data, log_markers)?;
        if !walked.complete {
            warn!("missing EOI marker");
        }
        if walked.end < data.len() {
            warn!("{} unexpected byte(s) at offset {}", data.len() - walked.end, walked.end);
        }
        let doc = Self {
            trailer: data[walked.end..].to_vec(),
            eoi: walked.complete,
            source: data,
            segments: walked.segments,
        };
        if doc.frame_count() == 0 {
            warn!("no frame header found");
        }
        Ok(doc)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Frame index of every segment.
    ///
    /// Segments waiting between two markers are settled by the next SOFn (they open a new
    /// frame) or the next SOS (they belong to the current one). Whatever follows the last
    /// scan stays with the last frame.
    fn frame_indexes(&self) -> Vec<usize> {
        let mut frames = vec![0; self.segments.len()];
        let mut current: Option<usize> = None;
        let mut pending = Vec::new();
        for (i, s) in self.segments.iter().enumerate() {
            let frame = if is_sof(s.marker) {
                let next = current.map_or(0, |f| f + 1);
                current = Some(next);
                next
            } else if s.marker == SOS {
                current.unwrap_or(0)
            } else {
                pending.push(i);
                continue;
            };
            for p in pending.drain(..) {
                frames[p] = frame;
            }
            frames[i] = frame;
        }
        let last = current.unwrap_or(0);
        for p in pending {
            frames[p] = last;
        }
        frames
    }

    /// Segments of one frame, in file order.
    fn frame_segments(&self, frame: usize) -> impl Iterator<Item = &Segment> {
        self.segments
            .iter()
            .zip(self.frame_indexes())
            .filter(move |&(_, f)| f == frame)
            .map(|(s, _)| s)
    }

    fn frame_headers(&self) -> Result<Vec<FrameHeader>, DocumentError> {
        self.segments
            .iter()
            .filter(|s| is_sof(s.marker))
            .map(|s| FrameHeader::parse(s.marker, &s.payload, s.payload_offset()))
            .collect()
    }

    fn check_frame(&self, frame: usize) -> Result<(), DocumentError> {
        let count = self.frame_count();
        if frame >= count {
            return Err(DocumentError::NoSuchFrame { frame, count });
        }
        Ok(())
    }

    fn app_segments(&self, container: Choice<u8>) -> impl Iterator<Item = (u8, &Segment)> {
        self.segments.iter().filter_map(move |s| {
            app_id(s.marker)
                .filter(|&id| container.covers(id))
                .map(|id| (id, s))
        })
    }

    fn encoded_len(&self) -> usize {
        let eoi = if self.eoi { 2 } else { 0 };
        2 + self.segments.iter().map(Segment::encoded_len).sum::<usize>()
            + eoi
            + self.trailer.len()
    }

    /// SOI, the segments, then EOI and any trailing bytes as they were read.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend([0xFF, SOI]);
        for s in &self.segments {
            s.encode(&mut out);
        }
        if self.eoi {
            out.extend([0xFF, EOI]);
        }
        out.extend(&self.trailer);
        out
    }

    /// Repair the framing of the file: add a missing EOI and drop whatever follows it.
    /// Returns the number of fixes applied.
    pub fn tidy_up(&mut self) -> usize {
        let mut fixes = 0;
        if !self.eoi {
            info!("tidy up: adding the missing EOI marker");
            self.eoi = true;
            fixes += 1;
        }
        if !self.trailer.is_empty() {
            info!("tidy up: dropping {} trailing byte(s)", self.trailer.len());
            self.trailer.clear();
            fixes += 1;
        }
        fixes
    }

    /// Write the current segments to `path`; returns the byte count.
    pub fn write_to(&self, path: &Path) -> Result<usize, DocumentError> {
        let data = self.encode();
        fs::write(path, &data)?;
        info!("wrote {} byte(s) to {}", data.len(), path.display());
        Ok(data.len())
    }

    /// (current encoded length, original length)
    pub fn lengths(&self) -> (usize, usize) {
        (self.encoded_len(), self.source.len())
    }

    /// Parse every complete JPEG picture embedded in the app segments.
    pub fn embedded(&self, log_markers: bool) -> Result<Vec<JpegDocument>, DocumentError> {
        app::embedded_pictures(&self.segments)
            .into_iter()
            .map(|data| JpegDocument::parse(data.to_vec(), log_markers))
            .collect()
    }

    /// Image info (and the `-t` listing when `tables` is set) of every embedded picture,
    /// recursing into pictures embedded in those. `label` names this document.
    pub fn format_embedded(
        &self,
        out: &mut dyn Write,
        label: &str,
        log_markers: bool,
        tables: bool,
    ) -> Result<usize, DocumentError> {
        let mut out = Counted::new(out);
        for (i, picture) in self.embedded(log_markers)?.iter().enumerate() {
            let label = format!("{label}.{i}");
            writeln!(out, "Embedded picture {label}:")?;
            picture.format_image_info(&mut out)?;
            if tables {
                picture.format_segments(&mut out)?;
            }
            picture.format_embedded(&mut out, &label, log_markers, tables)?;
        }
        Ok(out.bytes)
    }

    /// Stored orientation from the Exif primary directory.
    pub fn exif_orientation(&self) -> Option<u16> {
        self.app_segments(Choice::One(1))
            .find_map(|(_, s)| Exif::from_payload(&s.payload)?.orientation())
    }

    /// Summary of the file and each frame header.
    pub fn format_image_info(&self, out: &mut dyn Write) -> Result<usize, DocumentError> {
        let mut out = Counted::new(out);
        let apps = self.app_segments(Choice::All).count();
        writeln!(
            out,
            "JPEG: {} byte(s), {} segment(s), {} frame(s), {} app segment(s)",
            self.source.len(),
            self.segments.len(),
            self.frame_count(),
            apps
        )?;
        for (i, header) in self.frame_headers()?.iter().enumerate() {
            header.format(&mut out, i)?;
        }
        Ok(out.bytes)
    }

    /// Every table and scan header, in file order.
    pub fn format_segments(&self, out: &mut dyn Write) -> Result<usize, DocumentError> {
        let mut out = Counted::new(out);
        let mut scan = 0;
        for s in &self.segments {
            let base = s.payload_offset();
            match s.marker {
                DQT => {
                    for t in QuantizationTable::parse_all(&s.payload, base)? {
                        t.format(&mut out, OutputMode::Standard)?;
                    }
                }
                DHT => {
                    for t in HuffmanTable::parse_all(&s.payload, base)? {
                        t.format(&mut out, OutputMode::Standard)?;
                    }
                }
                SOS => {
                    ScanHeader::parse(&s.payload, base)?.format(
                        &mut out,
                        scan,
                        &s.scan_data,
                        OutputMode::Standard,
                    )?;
                    scan += 1;
                }
                m if is_sof(m) => scan = 0,
                _ => {}
            }
        }
        Ok(out.bytes)
    }
}

impl Document for JpegDocument {
    fn frame_count(&self) -> usize {
        self.segments.iter().filter(|s| is_sof(s.marker)).count()
    }

    fn format_table(
        &self,
        out: &mut dyn Write,
        frame: usize,
        domain: TableDomain,
        destination: Choice<u8>,
        mode: OutputMode,
    ) -> Result<usize, DocumentError> {
        self.check_frame(frame)?;
        let mut out = Counted::new(out);
        let mut found = 0;

        match domain {
            TableDomain::Quantization => {
                for s in self.frame_segments(frame).filter(|s| s.marker == DQT) {
                    for t in QuantizationTable::parse_all(&s.payload, s.payload_offset())? {
                        if destination.covers(t.destination) {
                            t.format(&mut out, mode)?;
                            found += 1;
                        }
                    }
                }
            }
            TableDomain::Entropy => {
                for s in self.frame_segments(frame).filter(|s| s.marker == DHT) {
                    for t in HuffmanTable::parse_all(&s.payload, s.payload_offset())? {
                        if destination.covers(t.flat_destination()) {
                            t.format(&mut out, mode)?;
                            found += 1;
                        }
                    }
                }
            }
            TableDomain::Scan => {
                let scans = self.frame_segments(frame).filter(|s| s.marker == SOS);
                for (index, s) in scans.enumerate() {
                    if destination.map(usize::from).covers(index) {
                        ScanHeader::parse(&s.payload, s.payload_offset())?.format(
                            &mut out,
                            index,
                            &s.scan_data,
                            mode,
                        )?;
                        found += 1;
                    }
                }
            }
        }

        match destination {
            Choice::One(destination) if found == 0 => Err(DocumentError::NoSuchTable {
                frame,
                domain,
                destination,
            }),
            _ => {
                if found == 0 {
                    warn!("frame {frame} has no {domain} table");
                }
                Ok(out.bytes)
            }
        }
    }

    fn format_metadata(
        &self,
        out: &mut dyn Write,
        container: Choice<u8>,
        sub_ids: &[u32],
    ) -> Result<usize, DocumentError> {
        let mut out = Counted::new(out);
        let mut found = false;
        for (id, s) in self.app_segments(container) {
            found = true;
            app::format_header(&mut out, id, s)?;
            let exif = Exif::from_payload(&s.payload);
            match (&exif, sub_ids) {
                (Some(exif), []) => {
                    for sub_id in 0..app::IFD_NAMES.len() as u32 {
                        if let Some(ifd) = exif.ifd(sub_id) {
                            exif.format_ifd(&mut out, sub_id, &ifd)?;
                        }
                    }
                }
                (Some(exif), ids) => {
                    for &sub_id in ids {
                        if sub_id as usize >= app::IFD_NAMES.len() {
                            return Err(DocumentError::Unsupported(format!(
                                "APP{id} sub-container {sub_id} (known: 0-{})",
                                app::IFD_NAMES.len() - 1
                            )));
                        }
                        let ifd = exif.ifd(sub_id).ok_or(DocumentError::NoSuchSubContainer {
                            container: id,
                            sub_id,
                        })?;
                        exif.format_ifd(&mut out, sub_id, &ifd)?;
                    }
                }
                (None, []) => {}
                (None, _) => {
                    return Err(DocumentError::Unsupported(format!(
                        "APP{id} ({}) has no sub-containers",
                        app::identifier(&s.payload)
                    )))
                }
            }
        }
        if !found {
            if container.is_all() {
                writeln!(out, "no app segment")?;
            } else {
                return Err(DocumentError::NoSuchContainer(container));
            }
        }
        Ok(out.bytes)
    }

    fn remove_container(
        &mut self,
        container: Choice<u8>,
        sub_ids: &[u32],
    ) -> Result<(), DocumentError> {
        if !sub_ids.is_empty() {
            return Err(DocumentError::Unsupported(format!(
                "removing sub-containers of app{container}"
            )));
        }
        let before = self.segments.len();
        self.segments
            .retain(|s| !app_id(s.marker).is_some_and(|id| container.covers(id)));
        let removed = before - self.segments.len();
        debug!(%container, removed, "removed app segments");
        if removed == 0 && !container.is_all() {
            return Err(DocumentError::NoSuchContainer(container));
        }
        Ok(())
    }

    fn save_thumbnails(&self, thumbnails: &[ThumbnailSelector]) -> Result<(), DocumentError> {
        let pictures = app::embedded_pictures(&self.segments);
        for t in thumbnails {
            let data = pictures
                .get(t.id.index())
                .ok_or(DocumentError::NoSuchThumbnail(t.id as u8))?;
            fs::write(&t.path, data)?;
            info!(
                "saved thumbnail {} ({} bytes) to {}",
                t.id as u8,
                data.len(),
                t.path.display()
            );
        }
        Ok(())
    }

    fn save_picture(&self, selector: &PictureSaveSelector) -> Result<(), DocumentError> {
        picture::save_picture(&self.source, selector, self.exif_orientation())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Builders for small synthetic JPEG streams.

    use super::*;

    pub fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, marker];
        out.extend(((payload.len() + 2) as u16).to_be_bytes());
        out.extend(payload);
        out
    }

    pub fn dqt(destination: u8, fill: u8) -> Vec<u8> {
        let mut payload = vec![destination];
        payload.extend([fill; 64]);
        segment(DQT, &payload)
    }

    pub fn dht(class: u8, destination: u8) -> Vec<u8> {
        let mut payload = vec![class << 4 | destination];
        let mut counts = [0u8; 16];
        counts[0] = 2;
        payload.extend(counts);
        payload.extend([0x00, 0x01]);
        segment(DHT, &payload)
    }

    pub fn sof0() -> Vec<u8> {
        segment(0xC0, &[8, 0, 16, 0, 32, 1, 1, 0x11, 0])
    }

    /// SOS header for one component followed by entropy-coded data
    pub fn sos(data: &[u8]) -> Vec<u8> {
        let mut out = segment(SOS, &[1, 1, 0x00, 0, 63, 0]);
        out.extend(data);
        out
    }

    pub fn jpeg(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0xFF, SOI];
        for p in parts {
            out.extend(p);
        }
        out.extend([0xFF, EOI]);
        out
    }

    /// Little-endian Exif payload with an orientation tag, an Exif IFD and a thumbnail IFD.
    pub fn exif_payload(orientation: u16) -> Vec<u8> {
        let mut tiff = b"II*\0".to_vec();
        tiff.extend(8u32.to_le_bytes());
        // IFD0 at 8: orientation and Exif pointer, next IFD at 38
        tiff.extend(2u16.to_le_bytes());
        tiff.extend(0x0112u16.to_le_bytes());
        tiff.extend(3u16.to_le_bytes());
        tiff.extend(1u32.to_le_bytes());
        tiff.extend(orientation.to_le_bytes());
        tiff.extend([0, 0]);
        tiff.extend(0x8769u16.to_le_bytes());
        tiff.extend(4u16.to_le_bytes());
        tiff.extend(1u32.to_le_bytes());
        tiff.extend(44u32.to_le_bytes());
        tiff.extend(38u32.to_le_bytes());
        // IFD1 at 38, Exif IFD at 44, both empty
        tiff.extend(0u16.to_le_bytes());
        tiff.extend(0u32.to_le_bytes());
        tiff.extend(0u16.to_le_bytes());
        tiff.extend(0u32.to_le_bytes());

        let mut payload = b"Exif\0\0".to_vec();
        payload.extend(tiff);
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn two_frame_document() -> JpegDocument {
        let data = jpeg(&[
            segment(APP0, b"JFIF\0\x01\x02\0\0\x01\0\x01\0\0"),
            segment(APP0 + 1, &exif_payload(6)),
            dqt(0, 2),
            dqt(1, 3),
            sof0(),
            dht(0, 0),
            dht(1, 1),
            sos(&[0x12, 0xFF, 0x00, 0x34, 0xFF, 0xD0, 0x56]),
            dqt(0, 9),
            sof0(),
            sos(&[0x78]),
        ]);
        JpegDocument::parse(data, false).unwrap()
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_walk_segments_and_frames() {
        let doc = two_frame_document();
        assert_eq!(doc.frame_count(), 2);
        assert_eq!(doc.segments().len(), 11);
        let sos = &doc.segments()[7];
        assert_eq!(sos.marker, SOS);
        assert_eq!(sos.scan_data, vec![0x12, 0xFF, 0x00, 0x34, 0xFF, 0xD0, 0x56]);
    }

    #[test]
    fn test_round_trip_encoding() {
        let doc = two_frame_document();
        let encoded = doc.encode();
        assert_eq!(encoded, doc.source);
        assert_eq!(doc.lengths(), (encoded.len(), encoded.len()));
    }

    #[test]
    fn test_tidy_up_missing_eoi() {
        let mut data = jpeg(&[dqt(0, 1), sof0(), sos(&[0x01, 0x02])]);
        data.truncate(data.len() - 2);
        let mut doc = JpegDocument::parse(data.clone(), false).unwrap();
        assert_eq!(doc.encode(), data);

        assert_eq!(doc.tidy_up(), 1);
        let tidy = doc.encode();
        assert!(tidy.ends_with(&[0x01, 0x02, 0xFF, EOI]));
        assert_eq!(doc.lengths(), (data.len() + 2, data.len()));
        assert_eq!(doc.tidy_up(), 0);
    }

    #[test]
    fn test_tidy_up_trailing_bytes() {
        let clean = jpeg(&[dqt(0, 1), sof0(), sos(&[0x01])]);
        let mut data = clean.clone();
        data.extend(b"junk");
        let mut doc = JpegDocument::parse(data.clone(), false).unwrap();
        assert_eq!(doc.encode(), data);

        assert_eq!(doc.tidy_up(), 1);
        assert_eq!(doc.encode(), clean);
    }

    #[test]
    fn test_offsets_skip_fill_bytes() {
        // DQT preceded by two fill bytes, its table cut short after one value
        let data = vec![0xFF, SOI, 0xFF, 0xFF, 0xFF, DQT, 0x00, 0x04, 0x00, 0x01, 0xFF, EOI];
        let doc = JpegDocument::parse(data, false).unwrap();
        assert_eq!(doc.segments()[0].offset, 4);
        assert!(matches!(
            doc.format_segments(&mut Vec::new()),
            Err(DocumentError::Malformed { offset: 10, .. })
        ));
    }

    #[test]
    fn test_missing_soi() {
        assert!(matches!(
            JpegDocument::parse(vec![0x00, 0x01], false),
            Err(DocumentError::Malformed { offset: 0, .. })
        ));
    }

    #[test]
    fn test_overrunning_length() {
        let mut data = vec![0xFF, SOI, 0xFF, DQT, 0x01, 0x00];
        data.extend([0u8; 4]);
        assert!(matches!(
            JpegDocument::parse(data, false),
            Err(DocumentError::Malformed { .. })
        ));
    }

    #[test]
    fn test_quantization_by_frame() {
        let doc = two_frame_document();
        let mut out = Vec::new();
        let n = doc
            .format_table(&mut out, 0, TableDomain::Quantization, Choice::All, OutputMode::Standard)
            .unwrap();
        assert_eq!(n, out.len());
        let s = text(out);
        assert!(s.contains("Quantization table 0"));
        assert!(s.contains("Quantization table 1"));

        let mut out = Vec::new();
        doc.format_table(&mut out, 1, TableDomain::Quantization, Choice::One(0), OutputMode::Extra)
            .unwrap();
        let s = text(out);
        assert!(s.contains("matrix by rows"));
        assert!(s.contains("     9"));

        let err = doc
            .format_table(
                &mut Vec::new(),
                1,
                TableDomain::Quantization,
                Choice::One(1),
                OutputMode::Standard,
            )
            .unwrap_err();
        assert!(matches!(err, DocumentError::NoSuchTable { frame: 1, destination: 1, .. }));
    }

    #[test]
    fn test_tables_belong_to_the_next_frame() {
        let data = jpeg(&[dqt(0, 1), sof0(), sos(&[0x01]), dqt(0, 7), sof0(), sos(&[0x02])]);
        let doc = JpegDocument::parse(data, false).unwrap();

        let mut out = Vec::new();
        doc.format_table(&mut out, 1, TableDomain::Quantization, Choice::One(0), OutputMode::Standard)
            .unwrap();
        let s = text(out);
        assert!(s.contains("     7"));
        assert!(!s.contains("     1"));

        let mut out = Vec::new();
        doc.format_table(&mut out, 0, TableDomain::Quantization, Choice::All, OutputMode::Standard)
            .unwrap();
        assert_eq!(text(out).matches("Quantization table").count(), 1);
    }

    #[test]
    fn test_tables_between_scans_stay_in_frame() {
        let data = jpeg(&[dqt(0, 1), sof0(), dht(0, 0), sos(&[0x01]), dht(1, 1), sos(&[0x02])]);
        let doc = JpegDocument::parse(data, false).unwrap();
        assert_eq!(doc.frame_count(), 1);

        let mut out = Vec::new();
        doc.format_table(&mut out, 0, TableDomain::Entropy, Choice::All, OutputMode::Standard)
            .unwrap();
        let s = text(out);
        assert!(s.contains("Huffman table DC 0") && s.contains("Huffman table AC 1"));

        let mut out = Vec::new();
        doc.format_table(&mut out, 0, TableDomain::Scan, Choice::One(1), OutputMode::Standard)
            .unwrap();
        assert!(text(out).contains("Scan 1"));
    }

    #[test]
    fn test_entropy_flat_destination() {
        let doc = two_frame_document();
        let mut out = Vec::new();
        doc.format_table(&mut out, 0, TableDomain::Entropy, Choice::One(5), OutputMode::Both)
            .unwrap();
        let s = text(out);
        assert!(s.contains("Huffman table AC 1"));
        assert!(!s.contains("Huffman table DC 0"));

        let mut out = Vec::new();
        doc.format_table(&mut out, 0, TableDomain::Entropy, Choice::All, OutputMode::Standard)
            .unwrap();
        let s = text(out);
        assert!(s.contains("Huffman table DC 0") && s.contains("Huffman table AC 1"));
    }

    #[test]
    fn test_scan_and_missing_frame() {
        let doc = two_frame_document();
        let mut out = Vec::new();
        doc.format_table(&mut out, 0, TableDomain::Scan, Choice::One(0), OutputMode::Extra)
            .unwrap();
        assert!(text(out).contains("7 byte(s), 1 restart marker(s)"));

        let err = doc
            .format_table(&mut Vec::new(), 2, TableDomain::Scan, Choice::All, OutputMode::Standard)
            .unwrap_err();
        assert!(matches!(err, DocumentError::NoSuchFrame { frame: 2, count: 2 }));
    }

    #[test]
    fn test_metadata_display() {
        let doc = two_frame_document();
        let mut out = Vec::new();
        doc.format_metadata(&mut out, Choice::All, &[]).unwrap();
        let s = text(out);
        assert!(s.contains("APP0 at offset 2"));
        assert!(s.contains("identifier \"JFIF\""));
        assert!(s.contains("identifier \"Exif\""));
        assert!(s.contains("IFD 2 (exif)"));

        let mut out = Vec::new();
        doc.format_metadata(&mut out, Choice::One(1), &[0]).unwrap();
        let s = text(out);
        assert!(s.contains("Orientation"));
        assert!(!s.contains("IFD 2"));

        assert!(matches!(
            doc.format_metadata(&mut Vec::new(), Choice::One(1), &[3]),
            Err(DocumentError::NoSuchSubContainer { container: 1, sub_id: 3 })
        ));
        assert!(matches!(
            doc.format_metadata(&mut Vec::new(), Choice::One(1), &[5]),
            Err(DocumentError::Unsupported(_))
        ));
        assert!(matches!(
            doc.format_metadata(&mut Vec::new(), Choice::One(0), &[1]),
            Err(DocumentError::Unsupported(_))
        ));
        assert!(matches!(
            doc.format_metadata(&mut Vec::new(), Choice::One(13), &[]),
            Err(DocumentError::NoSuchContainer(Choice::One(13)))
        ));
    }

    #[test]
    fn test_remove_containers() {
        let mut doc = two_frame_document();
        doc.remove_container(Choice::One(1), &[]).unwrap();
        assert_eq!(doc.exif_orientation(), None);
        assert!(matches!(
            doc.remove_container(Choice::One(1), &[]),
            Err(DocumentError::NoSuchContainer(_))
        ));
        assert!(matches!(
            doc.remove_container(Choice::One(0), &[2]),
            Err(DocumentError::Unsupported(_))
        ));
        doc.remove_container(Choice::All, &[]).unwrap();
        assert_eq!(doc.app_segments(Choice::All).count(), 0);
        // nothing left to remove is not an error for the wildcard
        doc.remove_container(Choice::All, &[]).unwrap();

        let (current, original) = doc.lengths();
        assert!(current < original);
        let reparsed = JpegDocument::parse(doc.encode(), false).unwrap();
        assert_eq!(reparsed.frame_count(), 2);
    }

    #[test]
    fn test_exif_orientation() {
        assert_eq!(two_frame_document().exif_orientation(), Some(6));
    }

    #[test]
    fn test_embedded_thumbnails() {
        let thumb = jpeg(&[dqt(0, 1), sof0(), sos(&[0x01, 0x02])]);
        let mut payload = b"JFXX\0\x10".to_vec();
        payload.extend(&thumb);
        let data = jpeg(&[segment(APP0, &payload), sof0(), sos(&[0x00])]);
        let doc = JpegDocument::parse(data, false).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thumb.jpg");
        doc.save_thumbnails(&[ThumbnailSelector {
            id: crate::selector::ThumbnailId::Primary,
            path: path.clone(),
        }])
        .unwrap();
        assert_eq!(fs::read(&path).unwrap(), thumb);

        let err = doc
            .save_thumbnails(&[ThumbnailSelector {
                id: crate::selector::ThumbnailId::Preview,
                path: dir.path().join("preview.jpg"),
            }])
            .unwrap_err();
        assert!(matches!(err, DocumentError::NoSuchThumbnail(1)));

        let mut out = Vec::new();
        let n = doc.format_embedded(&mut out, "0", false, true).unwrap();
        assert_eq!(n, out.len());
        let s = text(out);
        assert!(s.contains("Embedded picture 0.0:"));
        assert!(s.contains("1 frame(s)"));
        assert!(s.contains("Quantization table 0"));
        assert!(!s.contains("Embedded picture 0.1"));
    }

    #[test]
    fn test_format_segments_and_info() {
        let doc = two_frame_document();
        let mut out = Vec::new();
        doc.format_segments(&mut out).unwrap();
        let s = text(out);
        assert_eq!(s.matches("Quantization table").count(), 3);
        assert_eq!(s.matches("Scan 0").count(), 2);

        let mut out = Vec::new();
        doc.format_image_info(&mut out).unwrap();
        let s = text(out);
        assert!(s.contains("2 frame(s)"));
        assert!(s.contains("Frame 1: SOF0 (baseline DCT), 8-bit, 32x16, 1 component(s)"));
    }
}
