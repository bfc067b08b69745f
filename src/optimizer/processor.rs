//! Transcode pipeline
//!
//! Orchestrates decode → orientation normalization → conditional
//! downscale → format-specific encode, and owns the fallback-to-original
//! policy: a corrupt or unsupported source should still serve
//! *something*, so encode/decode failures degrade to the untouched
//! source payload whenever it remains usable.

use bytes::Bytes;
use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::io::Reader as ImageReader;
use image::DynamicImage;
use std::io::Cursor;
use std::num::NonZeroU32;

use crate::constants::{AVIF_QUALITY_OFFSET, DEFAULT_AVIF_SPEED};
use crate::fetch::SourceImage;

use super::encoder::{EncodedImage, EncoderFactory, EncoderQuality};
use super::error::ImageError;
use super::orient::normalize_orientation;
use super::params::OutputFormat;

/// Terminal result of a transcode attempt. Produced once per request.
#[derive(Debug)]
pub enum TranscodeOutcome {
    /// The source was transcoded to the negotiated format
    Optimized {
        data: Vec<u8>,
        content_type: &'static str,
    },
    /// Transcoding failed but the untouched source payload is servable
    FallbackOriginal { data: Bytes, content_type: String },
    /// Nothing usable to serve
    Failed { reason: String },
}

/// Pipeline tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct TranscodeOptions {
    /// AVIF encoder speed preset (1-10)
    pub avif_speed: u8,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            avif_speed: DEFAULT_AVIF_SPEED,
        }
    }
}

/// The AVIF perceptual quality scale is denser than the webp/jpeg scale
/// at the same nominal number, so the input quality is shifted down,
/// floored at zero.
pub fn avif_quality(quality: u8) -> u8 {
    quality.saturating_sub(AVIF_QUALITY_OFFSET)
}

/// Transcode a fetched source into the target format.
///
/// `target_width` of `None` means "use source width". The source is
/// never upscaled. On any pipeline failure the untouched source bytes
/// are returned when a trusted mime type is known for them; only when
/// even that is unavailable does the outcome become `Failed`.
pub fn transcode(
    source: &SourceImage,
    target_width: Option<u32>,
    target: OutputFormat,
    quality: u8,
    options: TranscodeOptions,
) -> TranscodeOutcome {
    match transcode_inner(source, target_width, target, quality, options) {
        Ok(encoded) => TranscodeOutcome::Optimized {
            data: encoded.data,
            content_type: encoded.content_type,
        },
        Err(err) => match source.effective_mime() {
            Some(mime) if !source.bytes.is_empty() => {
                tracing::warn!(
                    error = %err,
                    fallback_mime = mime,
                    "transcode failed, serving original payload"
                );
                TranscodeOutcome::FallbackOriginal {
                    data: source.bytes.clone(),
                    content_type: mime.to_string(),
                }
            }
            _ => TranscodeOutcome::Failed {
                reason: err.to_string(),
            },
        },
    }
}

fn transcode_inner(
    source: &SourceImage,
    target_width: Option<u32>,
    target: OutputFormat,
    quality: u8,
    options: TranscodeOptions,
) -> Result<EncodedImage, ImageError> {
    let img = decode_image(&source.bytes)?;

    // Orientation metadata is stripped by re-encoding, so the rotation
    // must be baked into the pixels first.
    let img = normalize_orientation(&source.bytes, img);

    let src_width = img.width();
    let src_height = img.height();
    let (dst_width, dst_height) = scaled_dimensions(src_width, src_height, target_width);

    let img = if (dst_width, dst_height) != (src_width, src_height) {
        resize_image(&img, dst_width, dst_height)?
    } else {
        img
    };

    let (format, encoder_quality) = resolve_encoding(target, quality);
    let encoder = EncoderFactory::create(format, options.avif_speed);

    let rgba_data = img.to_rgba8().into_raw();
    encoder.encode(&rgba_data, dst_width, dst_height, encoder_quality)
}

/// Pick the actual encode format and quality for a negotiated target.
fn resolve_encoding(target: OutputFormat, quality: u8) -> (OutputFormat, EncoderQuality) {
    match target {
        OutputFormat::Avif if EncoderFactory::avif_available() => (
            OutputFormat::Avif,
            EncoderQuality {
                quality: avif_quality(quality),
                effort: 4,
            },
        ),
        // No AVIF encode capability: WebP at the original, unshifted quality
        OutputFormat::Avif => (OutputFormat::WebP, EncoderQuality::with_quality(quality)),
        other => (other, EncoderQuality::with_quality(quality)),
    }
}

/// Decode image data into a DynamicImage
fn decode_image(data: &[u8]) -> Result<DynamicImage, ImageError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::decode_failed(e.to_string()))?
        .decode()
        .map_err(|e| ImageError::decode_failed(e.to_string()))
}

/// Compute output dimensions: downscale to exactly `target_width` when
/// the intrinsic width exceeds it, preserving aspect ratio; never
/// upscale.
pub(crate) fn scaled_dimensions(
    src_width: u32,
    src_height: u32,
    target_width: Option<u32>,
) -> (u32, u32) {
    match target_width {
        Some(width) if width < src_width => {
            let height =
                ((src_height as u64 * width as u64 + src_width as u64 / 2) / src_width as u64) as u32;
            (width, height.max(1))
        }
        _ => (src_width, src_height),
    }
}

/// Resize image using fast-image-resize with Lanczos3 filter
fn resize_image(img: &DynamicImage, target_w: u32, target_h: u32) -> Result<DynamicImage, ImageError> {
    let src_width = NonZeroU32::new(img.width())
        .ok_or_else(|| ImageError::resize_failed("Source width is 0"))?;
    let src_height = NonZeroU32::new(img.height())
        .ok_or_else(|| ImageError::resize_failed("Source height is 0"))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| ImageError::resize_failed("Target width is 0"))?;
    let dst_height =
        NonZeroU32::new(target_h).ok_or_else(|| ImageError::resize_failed("Target height is 0"))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| ImageError::resize_failed(format!("Failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);

    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));

    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| ImageError::resize_failed(format!("Resize operation failed: {:?}", e)))?;

    let result_buf = dst_image.into_vec();
    let rgba_image = image::RgbaImage::from_raw(target_w, target_h, result_buf)
        .ok_or_else(|| ImageError::resize_failed("Failed to create output image buffer"))?;

    Ok(DynamicImage::ImageRgba8(rgba_image))
}
