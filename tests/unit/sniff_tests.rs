// Content sniffing unit tests
//
// Covers precedence over declared headers and encode-then-sniff round
// trips for every format the pipeline produces.

use std::io::Cursor;

use bytes::Bytes;
use kirie::fetch::SourceImage;
use kirie::optimizer::encoder::{EncoderQuality, ImageEncoder, JpegEncoder, PngEncoder, WebPEncoder};
use kirie::optimizer::sniff::{self, detect_content_type};

fn rgba_pixels(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x * 37 % 256) as u8, (y * 11 % 256) as u8, 128, 255])
    });
    img.into_raw()
}

#[test]
fn test_sniff_beats_declared_content_type() {
    // PNG magic bytes served with a text/plain header still classify as PNG
    let mut png = Vec::new();
    let img = image::RgbaImage::from_fn(2, 2, |_, _| image::Rgba([10, 20, 30, 255]));
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let source = SourceImage::new(Bytes::from(png), Some("text/plain".to_string()));
    assert_eq!(source.detected_mime, Some(sniff::PNG));
    assert_eq!(source.effective_mime(), Some("image/png"));
}

#[test]
fn test_encode_then_sniff_jpeg() {
    let data = rgba_pixels(4, 4);
    let encoded = JpegEncoder
        .encode(&data, 4, 4, EncoderQuality::with_quality(80))
        .unwrap();
    assert_eq!(detect_content_type(&encoded.data), Some(sniff::JPEG));
}

#[test]
fn test_encode_then_sniff_png() {
    let data = rgba_pixels(4, 4);
    let encoded = PngEncoder
        .encode(&data, 4, 4, EncoderQuality::with_quality(80))
        .unwrap();
    assert_eq!(detect_content_type(&encoded.data), Some(sniff::PNG));
}

#[test]
fn test_encode_then_sniff_webp() {
    let data = rgba_pixels(4, 4);
    let encoded = WebPEncoder
        .encode(&data, 4, 4, EncoderQuality::with_quality(80))
        .unwrap();
    assert_eq!(detect_content_type(&encoded.data), Some(sniff::WEBP));
}

#[cfg(feature = "avif")]
#[test]
fn test_encode_then_sniff_avif() {
    use kirie::optimizer::encoder::AvifEncoder;

    let data = rgba_pixels(4, 4);
    let encoded = AvifEncoder { speed: 10 }
        .encode(&data, 4, 4, EncoderQuality::with_quality(50))
        .unwrap();
    assert_eq!(detect_content_type(&encoded.data), Some(sniff::AVIF));
}

#[test]
fn test_sniff_priority_order_is_fixed() {
    // A payload that is simultaneously GIF-prefixed cannot exist, but a
    // JPEG prefix must win before any later pattern is considered.
    let mut buf = vec![0xFF, 0xD8, 0xFF];
    buf.extend_from_slice(b"GIF8");
    assert_eq!(detect_content_type(&buf), Some(sniff::JPEG));
}

#[test]
fn test_sniff_rejects_html_error_pages() {
    let body = b"<html><body>404 Not Found</body></html>";
    assert_eq!(detect_content_type(body), None);
}
