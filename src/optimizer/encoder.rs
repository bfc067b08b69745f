//! Image encoder abstraction
//!
//! Provides a trait-based encoder system with format-specific quality
//! handling:
//! - JPEG is encoded progressively (multi-scan) via mozjpeg
//! - WebP is encoded lossy at the given quality
//! - PNG maps "quality" to a compression-effort tier (PNG is lossless,
//!   so the number trades encode time for size, not fidelity)
//! - AVIF is available behind the `avif` feature

use super::error::ImageError;
use super::params::OutputFormat;

/// Quality settings for image encoding
#[derive(Debug, Clone, Copy)]
pub struct EncoderQuality {
    /// Quality value (1-100, where 100 is best quality). AVIF callers may
    /// pass 0 after the perceptual-scale offset.
    pub quality: u8,
    /// Effort/speed trade-off (1-10, where 10 is slowest/best compression)
    pub effort: u8,
}

impl Default for EncoderQuality {
    fn default() -> Self {
        Self {
            quality: 80,
            effort: 4,
        }
    }
}

impl EncoderQuality {
    /// Create quality settings with specified quality level
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            effort: 4,
        }
    }

    /// Set the encoding effort (speed vs compression trade-off)
    pub fn with_effort(mut self, effort: u8) -> Self {
        self.effort = effort.clamp(1, 10);
        self
    }
}

/// Result of encoding an image
#[derive(Debug)]
pub struct EncodedImage {
    /// The encoded image data
    pub data: Vec<u8>,
    /// The output format
    pub format: OutputFormat,
    /// Content-Type header value
    pub content_type: &'static str,
}

impl EncodedImage {
    /// Create a new encoded image result
    pub fn new(data: Vec<u8>, format: OutputFormat) -> Self {
        let content_type = format.content_type();
        Self {
            data,
            format,
            content_type,
        }
    }
}

/// Trait for image encoders
///
/// Implementations encode raw RGBA pixel data to a specific format.
/// The trait is object-safe to allow dynamic dispatch.
pub trait ImageEncoder: Send + Sync {
    /// The output format this encoder produces
    fn format(&self) -> OutputFormat;

    /// Encode raw RGBA image data (4 bytes per pixel) to the target format
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError>;

    /// Check if this encoder supports transparency
    fn supports_transparency(&self) -> bool;
}

/// Progressive JPEG encoder backed by mozjpeg
pub struct JpegEncoder;

impl ImageEncoder for JpegEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_EXT_RGBA);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality.quality as f32);
        // Multi-scan output so partial bytes render at full dimensions
        comp.set_progressive_mode();

        let mut comp = comp
            .start_compress(Vec::new())
            .map_err(|e| ImageError::encode_failed("jpeg", e.to_string()))?;
        comp.write_scanlines(data)
            .map_err(|e| ImageError::encode_failed("jpeg", e.to_string()))?;
        let output = comp
            .finish()
            .map_err(|e| ImageError::encode_failed("jpeg", e.to_string()))?;

        Ok(EncodedImage::new(output, OutputFormat::Jpeg))
    }

    fn supports_transparency(&self) -> bool {
        false
    }
}

/// PNG encoder using the image crate
pub struct PngEncoder;

impl PngEncoder {
    /// Map the 1-100 quality scale to a compression-effort tier
    fn compression_for(quality: u8) -> image::codecs::png::CompressionType {
        use image::codecs::png::CompressionType;
        match quality {
            0..=33 => CompressionType::Fast,
            34..=66 => CompressionType::Default,
            _ => CompressionType::Best,
        }
    }
}

impl ImageEncoder for PngEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Png
    }

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        use image::codecs::png::{FilterType, PngEncoder as ImagePngEncoder};
        use image::ImageEncoder as _;
        use std::io::Cursor;

        let mut output = Cursor::new(Vec::new());
        let encoder = ImagePngEncoder::new_with_quality(
            &mut output,
            Self::compression_for(quality.quality),
            FilterType::Adaptive,
        );

        encoder
            .write_image(data, width, height, image::ColorType::Rgba8)
            .map_err(|e| ImageError::encode_failed("png", e.to_string()))?;

        Ok(EncodedImage::new(output.into_inner(), OutputFormat::Png))
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// Lossy WebP encoder backed by libwebp
pub struct WebPEncoder;

impl ImageEncoder for WebPEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::WebP
    }

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        if data.len() != (width as usize) * (height as usize) * 4 {
            return Err(ImageError::encode_failed(
                "webp",
                "pixel buffer does not match dimensions",
            ));
        }

        let encoder = webp::Encoder::from_rgba(data, width, height);
        let encoded = encoder.encode(quality.quality as f32);

        Ok(EncodedImage::new(encoded.to_vec(), OutputFormat::WebP))
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// AVIF encoder backed by ravif (rav1e)
#[cfg(feature = "avif")]
pub struct AvifEncoder {
    /// Speed preset (1-10, where 1 is slowest/best quality)
    pub speed: u8,
}

#[cfg(feature = "avif")]
impl Default for AvifEncoder {
    fn default() -> Self {
        Self { speed: 6 }
    }
}

#[cfg(feature = "avif")]
impl ImageEncoder for AvifEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Avif
    }

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        use rgb::FromSlice;

        if data.len() != (width as usize) * (height as usize) * 4 {
            return Err(ImageError::encode_failed(
                "avif",
                "pixel buffer does not match dimensions",
            ));
        }

        let img = imgref::Img::new(data.as_rgba(), width as usize, height as usize);
        let encoded = ravif::Encoder::new()
            .with_quality(quality.quality as f32)
            .with_alpha_quality(quality.quality as f32)
            .with_speed(self.speed)
            .encode_rgba(img)
            .map_err(|e| ImageError::encode_failed("avif", e.to_string()))?;

        Ok(EncodedImage::new(encoded.avif_file, OutputFormat::Avif))
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// Factory for creating encoders based on output format
pub struct EncoderFactory;

impl EncoderFactory {
    /// Whether AVIF encoding was compiled in
    pub fn avif_available() -> bool {
        cfg!(feature = "avif")
    }

    /// Create an encoder for the specified output format.
    ///
    /// Callers must downgrade AVIF to WebP themselves when
    /// `avif_available()` is false; this keeps the quality-shift decision
    /// (which differs between the two formats) out of the factory.
    pub fn create(format: OutputFormat, avif_speed: u8) -> Box<dyn ImageEncoder> {
        match format {
            OutputFormat::Jpeg => Box::new(JpegEncoder),
            OutputFormat::Png => Box::new(PngEncoder),
            OutputFormat::WebP => Box::new(WebPEncoder),
            #[cfg(feature = "avif")]
            OutputFormat::Avif => Box::new(AvifEncoder { speed: avif_speed }),
            #[cfg(not(feature = "avif"))]
            OutputFormat::Avif => {
                let _ = avif_speed;
                Box::new(WebPEncoder)
            }
        }
    }
}
