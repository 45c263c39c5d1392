use image::DynamicImage;
use tracing::info;

use crate::error::DocumentError;
use crate::selector::{Orientation, PictureSaveSelector};

/// Decode the main picture of a JPEG file.
pub fn load_picture(bytes: &[u8]) -> Result<DynamicImage, DocumentError> {
    Ok(image::load_from_memory_with_format(
        bytes,
        image::ImageFormat::Jpeg,
    )?)
}

/// Turn stored pixels into their displayed arrangement.
pub fn orient(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation.exif_tag() {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Decode, orient and write the picture. The output format follows the path extension.
///
/// An explicit orientation wins over the stored one; without either, pixels are kept as is.
pub fn save_picture(
    bytes: &[u8],
    selector: &PictureSaveSelector,
    stored: Option<u16>,
) -> Result<(), DocumentError> {
    let orientation = selector
        .orientation
        .or_else(|| stored.and_then(Orientation::from_exif))
        .unwrap_or(Orientation::IDENTITY);

    let mut img = orient(load_picture(bytes)?, orientation);
    if selector.monochrome {
        img = DynamicImage::ImageLuma8(img.to_luma8());
    }
    img.save(&selector.path)?;
    info!(
        "saved {}x{} picture ({orientation}{}) to {}",
        img.width(),
        img.height(),
        if selector.monochrome { ", bw" } else { "" },
        selector.path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::PathBuf;

    fn sample_jpeg() -> Vec<u8> {
        let img = RgbImage::from_fn(4, 2, |x, _| Rgb([x as u8 * 60, 10, 200]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, ImageFormat::Jpeg)
            .unwrap();
        bytes.into_inner()
    }

    fn selector(orientation: Option<&str>, monochrome: bool, path: PathBuf) -> PictureSaveSelector {
        PictureSaveSelector {
            orientation: orientation.and_then(Orientation::from_code),
            monochrome,
            path,
        }
    }

    #[test]
    fn test_orient_dimensions() {
        let img = load_picture(&sample_jpeg()).unwrap();
        assert_eq!(img.dimensions(), (4, 2));
        for (code, dims) in [("tl", (4, 2)), ("br", (4, 2)), ("rt", (2, 4)), ("lb", (2, 4))] {
            let o = Orientation::from_code(code).unwrap();
            assert_eq!(orient(img.clone(), o).dimensions(), dims, "{code}");
        }
    }

    #[test]
    fn test_explicit_orientation_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        save_picture(&sample_jpeg(), &selector(Some("tl"), false, path.clone()), Some(6)).unwrap();
        assert_eq!(image::open(&path).unwrap().dimensions(), (4, 2));
    }

    #[test]
    fn test_stored_orientation_and_grayscale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        save_picture(&sample_jpeg(), &selector(None, true, path.clone()), Some(6)).unwrap();
        let saved = image::open(&path).unwrap();
        assert_eq!(saved.dimensions(), (2, 4));
        assert_eq!(saved.color(), image::ColorType::L8);
    }

    #[test]
    fn test_not_a_picture() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_picture(b"nope", &selector(None, false, dir.path().join("x.png")), None)
            .unwrap_err();
        assert!(matches!(err, DocumentError::Image(_)));
    }
}
