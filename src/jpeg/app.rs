//! Application segments: identification, TIFF/Exif directories and embedded pictures.

use std::io::{self, Write};

use super::{walk, Segment, APP0, APP15};

/// Application segment id (0-15) of a marker.
pub fn app_id(marker: u8) -> Option<u8> {
    (APP0..=APP15).contains(&marker).then(|| marker - APP0)
}

/// Leading NUL-terminated identifier of an application segment, e.g. `JFIF` or `Exif`.
pub fn identifier(payload: &[u8]) -> String {
    let end = payload
        .iter()
        .take(32)
        .position(|&b| b == 0)
        .unwrap_or(payload.len().min(32));
    payload[..end]
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect()
}

pub fn format_header(out: &mut dyn Write, id: u8, segment: &Segment) -> io::Result<()> {
    writeln!(
        out,
        "APP{id} at offset {}: {} byte(s), identifier \"{}\"",
        segment.offset,
        segment.payload.len() + 2,
        identifier(&segment.payload)
    )
}

/// Directory names by sub-container id.
pub const IFD_NAMES: [&str; 5] = ["primary", "thumbnail", "exif", "gps", "interoperability"];

const EXIF_IFD_POINTER: u16 = 0x8769;
const GPS_IFD_POINTER: u16 = 0x8825;
const INTEROP_IFD_POINTER: u16 = 0xA005;
const ORIENTATION: u16 = 0x0112;

fn tag_name(tag: u16) -> &'static str {
    match tag {
        0x0100 => "ImageWidth",
        0x0101 => "ImageLength",
        0x0103 => "Compression",
        0x010E => "ImageDescription",
        0x010F => "Make",
        0x0110 => "Model",
        0x0112 => "Orientation",
        0x011A => "XResolution",
        0x011B => "YResolution",
        0x0128 => "ResolutionUnit",
        0x0131 => "Software",
        0x0132 => "DateTime",
        0x013B => "Artist",
        0x0201 => "JPEGInterchangeFormat",
        0x0202 => "JPEGInterchangeFormatLength",
        0x0213 => "YCbCrPositioning",
        0x8298 => "Copyright",
        0x829A => "ExposureTime",
        0x829D => "FNumber",
        0x8769 => "ExifIFDPointer",
        0x8825 => "GPSInfoIFDPointer",
        0x8827 => "ISOSpeedRatings",
        0x9000 => "ExifVersion",
        0x9003 => "DateTimeOriginal",
        0x9004 => "DateTimeDigitized",
        0x920A => "FocalLength",
        0x927C => "MakerNote",
        0xA000 => "FlashpixVersion",
        0xA001 => "ColorSpace",
        0xA002 => "PixelXDimension",
        0xA003 => "PixelYDimension",
        0xA005 => "InteroperabilityIFDPointer",
        _ => "",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag: u16,
    pub kind: u16,
    pub count: u32,
    /// Offset of the entry's 4-byte value field within the TIFF data
    pub value_at: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifd {
    pub entries: Vec<IfdEntry>,
    pub next: u32,
}

/// TIFF structure carried by an `Exif` APP1 segment.
pub struct Exif<'a> {
    tiff: &'a [u8],
    big_endian: bool,
}

impl<'a> Exif<'a> {
    pub fn from_payload(payload: &'a [u8]) -> Option<Self> {
        let tiff = payload.strip_prefix(b"Exif\0\0")?;
        let big_endian = match tiff.get(..4)? {
            b"MM\0*" => true,
            b"II*\0" => false,
            _ => return None,
        };
        Some(Self { tiff, big_endian })
    }

    fn u16_at(&self, at: usize) -> Option<u16> {
        let b: [u8; 2] = self.tiff.get(at..at + 2)?.try_into().ok()?;
        Some(if self.big_endian {
            u16::from_be_bytes(b)
        } else {
            u16::from_le_bytes(b)
        })
    }

    fn u32_at(&self, at: usize) -> Option<u32> {
        let b: [u8; 4] = self.tiff.get(at..at + 4)?.try_into().ok()?;
        Some(if self.big_endian {
            u32::from_be_bytes(b)
        } else {
            u32::from_le_bytes(b)
        })
    }

    pub fn ifd_at(&self, offset: u32) -> Option<Ifd> {
        let start = offset as usize;
        let count = usize::from(self.u16_at(start)?);
        let entries = (0..count)
            .map(|i| {
                let at = start + 2 + 12 * i;
                Some(IfdEntry {
                    tag: self.u16_at(at)?,
                    kind: self.u16_at(at + 2)?,
                    count: self.u32_at(at + 4)?,
                    value_at: at + 8,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        let next = self.u32_at(start + 2 + 12 * count)?;
        Some(Ifd { entries, next })
    }

    fn pointer(&self, ifd: &Ifd, tag: u16) -> Option<u32> {
        let entry = ifd.entries.iter().find(|e| e.tag == tag)?;
        self.u32_at(entry.value_at).filter(|&o| o != 0)
    }

    /// Directory for a sub-container id (see [`IFD_NAMES`]); `None` when absent.
    pub fn ifd(&self, sub_id: u32) -> Option<Ifd> {
        let primary = self.ifd_at(self.u32_at(4)?)?;
        let offset = match sub_id {
            0 => return Some(primary),
            1 => Some(primary.next).filter(|&o| o != 0)?,
            2 => self.pointer(&primary, EXIF_IFD_POINTER)?,
            3 => self.pointer(&primary, GPS_IFD_POINTER)?,
            4 => {
                let exif = self.ifd_at(self.pointer(&primary, EXIF_IFD_POINTER)?)?;
                self.pointer(&exif, INTEROP_IFD_POINTER)?
            }
            _ => return None,
        };
        self.ifd_at(offset)
    }

    /// Orientation tag (1-8) of the primary directory.
    pub fn orientation(&self) -> Option<u16> {
        let primary = self.ifd(0)?;
        let entry = primary.entries.iter().find(|e| e.tag == ORIENTATION)?;
        self.u16_at(entry.value_at)
    }

    pub fn format_ifd(&self, out: &mut dyn Write, sub_id: u32, ifd: &Ifd) -> io::Result<()> {
        let name = IFD_NAMES.get(sub_id as usize).copied().unwrap_or("unknown");
        writeln!(
            out,
            "  IFD {sub_id} ({name}): {} entr{}",
            ifd.entries.len(),
            if ifd.entries.len() == 1 { "y" } else { "ies" }
        )?;
        for e in &ifd.entries {
            writeln!(
                out,
                "    tag 0x{:04X} {:<28} type {:>2} count {}",
                e.tag,
                tag_name(e.tag),
                e.kind,
                e.count
            )?;
        }
        Ok(())
    }
}

/// Complete JPEG pictures embedded in application segments, in file order.
///
/// Index 0 is the main thumbnail, index 1 a possible preview.
pub fn embedded_pictures(segments: &[Segment]) -> Vec<&[u8]> {
    let mut pictures = Vec::new();
    for segment in segments.iter().filter(|s| app_id(s.marker).is_some()) {
        let data = segment.payload.as_slice();
        let mut from = 0;
        while let Some(start) = data[from..]
            .windows(3)
            .position(|w| w == [0xFF, 0xD8, 0xFF])
            .map(|p| from + p)
        {
            match walk(&data[start..], false) {
                Ok(walked) if walked.complete => {
                    pictures.push(&data[start..start + walked.end]);
                    from = start + walked.end;
                }
                _ => from = start + 1,
            }
        }
    }
    pictures
}
