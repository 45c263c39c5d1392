//! One-shot grammars for `-sthumb` and `-spict`. Neither has wildcards, so their
//! selectors are used as parsed.

use std::fmt;
use std::path::PathBuf;

use crate::error::SelectorError;

use super::{fields, Flag, OptionValue};

/// Embedded picture to extract. By convention 0 is the main thumbnail and 1 an optional
/// larger preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbnailId {
    Primary = 0,
    Preview = 1,
}

impl ThumbnailId {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// `<0|1>:<path>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailSelector {
    pub id: ThumbnailId,
    pub path: PathBuf,
}

pub fn parse_thumbnails(value: &str) -> Result<Vec<ThumbnailSelector>, SelectorError> {
    let opt = OptionValue::new(Flag::SaveThumbnail, value);
    opt.entries()
        .map(|entry| {
            let fields = fields(entry);
            let [id, path] = fields.as_slice() else {
                return Err(opt.invalid("thumbnail entry (expected <id>:<path>)", entry));
            };
            let id = match opt.bounded("thumbnail id", id, 0..=1)? {
                0 => ThumbnailId::Primary,
                _ => ThumbnailId::Preview,
            };
            Ok(ThumbnailSelector {
                id,
                path: PathBuf::from(*path),
            })
        })
        .collect()
}

/// Picture edge that row 0 or column 0 of the stored pixels corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

/// Stored orientation of a picture: which visual sides its first row and first column
/// lie on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Orientation {
    pub row_zero: Side,
    pub column_zero: Side,
}

// (code, exif tag, row 0, column 0)
const ORIENTATIONS: [(&str, u16, Side, Side); 8] = [
    ("tl", 1, Side::Top, Side::Left),
    ("tr", 2, Side::Top, Side::Right),
    ("br", 3, Side::Bottom, Side::Right),
    ("bl", 4, Side::Bottom, Side::Left),
    ("lt", 5, Side::Left, Side::Top),
    ("rt", 6, Side::Right, Side::Top),
    ("rb", 7, Side::Right, Side::Bottom),
    ("lb", 8, Side::Left, Side::Bottom),
];

impl Orientation {
    /// Row 0 at the top, column 0 on the left: pixels are stored as displayed.
    pub const IDENTITY: Orientation = Orientation {
        row_zero: Side::Top,
        column_zero: Side::Left,
    };

    pub fn from_code(code: &str) -> Option<Self> {
        ORIENTATIONS
            .iter()
            .find(|(c, ..)| *c == code)
            .map(|&(_, _, row_zero, column_zero)| Orientation {
                row_zero,
                column_zero,
            })
    }

    /// Map an EXIF orientation tag value (1-8).
    pub fn from_exif(tag: u16) -> Option<Self> {
        ORIENTATIONS
            .iter()
            .find(|(_, t, ..)| *t == tag)
            .map(|&(_, _, row_zero, column_zero)| Orientation {
                row_zero,
                column_zero,
            })
    }

    pub fn exif_tag(self) -> u16 {
        self.entry().1
    }

    pub fn code(self) -> &'static str {
        self.entry().0
    }

    fn entry(self) -> (&'static str, u16, Side, Side) {
        ORIENTATIONS
            .into_iter()
            .find(|&(_, _, r, c)| r == self.row_zero && c == self.column_zero)
            // every (row, column) pair a parser can build is in the table
            .unwrap_or(ORIENTATIONS[0])
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// `[<orientation>[,<format>]:]<path>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureSaveSelector {
    /// `None` defers to the document's own orientation, or the identity
    pub orientation: Option<Orientation>,
    pub monochrome: bool,
    pub path: PathBuf,
}

pub fn parse_picture(value: &str) -> Result<PictureSaveSelector, SelectorError> {
    let opt = OptionValue::new(Flag::SavePicture, value);

    let (settings, path) = match value.split_once(':') {
        None => (None, value),
        Some((settings, path)) => {
            if path.contains(':') {
                return Err(opt.syntax("at most one ':' allowed"));
            }
            (Some(settings), path)
        }
    };
    if path.is_empty() {
        return Err(opt.syntax("missing path"));
    }

    let mut selector = PictureSaveSelector {
        orientation: None,
        monochrome: false,
        path: PathBuf::from(path),
    };
    let Some(settings) = settings else {
        return Ok(selector);
    };

    let (orientation, format) = match settings.split_once(',') {
        None => (settings, None),
        Some((orientation, format)) => {
            if format.contains(',') {
                return Err(opt.syntax("at most one ',' allowed"));
            }
            (orientation, Some(format))
        }
    };
    if !orientation.is_empty() {
        selector.orientation = Some(
            Orientation::from_code(orientation)
                .ok_or_else(|| opt.invalid("orientation code", orientation))?,
        );
    }
    selector.monochrome = match format {
        None => false,
        Some("bw") => true,
        Some("cl") => false,
        Some(token) => return Err(opt.invalid("picture format code", token)),
    };
    Ok(selector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnails() {
        let sel = parse_thumbnails("0:/tmp/a.jpg,1:b.jpg").unwrap();
        assert_eq!(
            sel,
            vec![
                ThumbnailSelector {
                    id: ThumbnailId::Primary,
                    path: PathBuf::from("/tmp/a.jpg"),
                },
                ThumbnailSelector {
                    id: ThumbnailId::Preview,
                    path: PathBuf::from("b.jpg"),
                },
            ]
        );
    }

    #[test]
    fn test_thumbnail_id_out_of_range() {
        let err = parse_thumbnails("2:/tmp/x").unwrap_err();
        assert!(matches!(
            err,
            SelectorError::InvalidSelector { what: "thumbnail id", ref token, .. } if token == "2"
        ));
    }

    #[test]
    fn test_thumbnail_field_count() {
        assert!(matches!(
            parse_thumbnails("0"),
            Err(SelectorError::InvalidSelector { .. })
        ));
        assert!(matches!(
            parse_thumbnails("0:a:b"),
            Err(SelectorError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_picture_path_only() {
        let sel = parse_picture("/tmp/p.png").unwrap();
        assert_eq!(sel.orientation, None);
        assert!(!sel.monochrome);
        assert_eq!(sel.path, PathBuf::from("/tmp/p.png"));
    }

    #[test]
    fn test_picture_orientation_and_format() {
        let sel = parse_picture("rt,bw:/tmp/p.png").unwrap();
        assert_eq!(
            sel.orientation,
            Some(Orientation {
                row_zero: Side::Right,
                column_zero: Side::Top,
            })
        );
        assert!(sel.monochrome);

        let sel = parse_picture(",bw:p.png").unwrap();
        assert_eq!(sel.orientation, None);
        assert!(sel.monochrome);

        let sel = parse_picture("lb,cl:p.png").unwrap();
        assert_eq!(sel.orientation.map(Orientation::exif_tag), Some(8));
        assert!(!sel.monochrome);
    }

    #[test]
    fn test_picture_errors() {
        assert!(matches!(
            parse_picture("a:b:c"),
            Err(SelectorError::Syntax { .. })
        ));
        assert!(matches!(
            parse_picture("tl,bw,x:p.png"),
            Err(SelectorError::Syntax { .. })
        ));
        assert!(matches!(
            parse_picture("tl:"),
            Err(SelectorError::Syntax { .. })
        ));
        assert!(matches!(
            parse_picture("zz:/x"),
            Err(SelectorError::InvalidSelector { what: "orientation code", .. })
        ));
        assert!(matches!(
            parse_picture("tl,gray:/x"),
            Err(SelectorError::InvalidSelector { what: "picture format code", .. })
        ));
    }

    #[test]
    fn test_orientation_exif_round_trip() {
        for tag in 1..=8 {
            let orientation = Orientation::from_exif(tag).unwrap();
            assert_eq!(orientation.exif_tag(), tag);
            assert_eq!(Orientation::from_code(orientation.code()), Some(orientation));
        }
        assert_eq!(Orientation::from_exif(0), None);
        assert_eq!(Orientation::from_exif(9), None);
    }
}
