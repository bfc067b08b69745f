//! Image optimization error types
//!
//! Provides structured error handling with HTTP status mapping.
//! These errors stay internal to the transcode pipeline: the pipeline
//! converts them into a fallback-to-original response whenever the
//! source bytes are still usable.

use std::fmt;

/// Errors that can occur during image transcoding
#[derive(Debug, Clone)]
pub enum ImageError {
    /// Image format is not supported
    UnsupportedFormat { format: String },
    /// Failed to decode image data
    DecodeFailed { message: String },
    /// Resize operation failed
    ResizeFailed { message: String },
    /// Encoding to output format failed
    EncodeFailed { format: String, message: String },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::UnsupportedFormat { format } => {
                write!(f, "Unsupported image format: {}", format)
            }
            ImageError::DecodeFailed { message } => {
                write!(f, "Failed to decode image: {}", message)
            }
            ImageError::ResizeFailed { message } => {
                write!(f, "Resize failed: {}", message)
            }
            ImageError::EncodeFailed { format, message } => {
                write!(f, "Failed to encode to {}: {}", format, message)
            }
        }
    }
}

impl std::error::Error for ImageError {}

impl ImageError {
    /// Maps image errors to HTTP status codes
    ///
    /// Status mapping:
    /// - UnsupportedFormat → 415 (Unsupported Media Type)
    /// - DecodeFailed → 400 (Bad Request)
    /// - ResizeFailed, EncodeFailed → 500 (Internal Server Error)
    pub fn to_http_status(&self) -> u16 {
        match self {
            ImageError::UnsupportedFormat { .. } => 415,
            ImageError::DecodeFailed { .. } => 400,
            ImageError::ResizeFailed { .. } | ImageError::EncodeFailed { .. } => 500,
        }
    }

    /// Helper constructors for common error patterns
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        ImageError::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        ImageError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        ImageError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }
}
