//! EXIF orientation normalization
//!
//! Cameras frequently store pixels unrotated and record the intended
//! display orientation in EXIF tag 0x0112. Transcoding strips metadata,
//! so the rotation must be baked into the pixels first.

use std::io::Cursor;

use image::DynamicImage;

/// Auto-rotate an image according to its embedded EXIF orientation.
///
/// `data` is the original encoded payload (EXIF lives in the container,
/// not the pixel buffer). Missing or unreadable EXIF leaves the image
/// untouched.
pub fn normalize_orientation(data: &[u8], img: DynamicImage) -> DynamicImage {
    let orientation = read_orientation(data).unwrap_or(1);
    apply_orientation(img, orientation)
}

/// Read the EXIF orientation value (1-8) from an encoded payload.
fn read_orientation(data: &[u8]) -> Option<u32> {
    let reader = exif::Reader::new();
    let exif = reader.read_from_container(&mut Cursor::new(data)).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0)
}

/// Apply the pixel transform that corrects a given orientation value.
pub(crate) fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        // 1 is "upright"; out-of-range values are treated the same
        _ => img,
    }
}
