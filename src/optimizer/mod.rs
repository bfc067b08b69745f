//! Image transcoding decision pipeline
//!
//! Takes a validated request through the full decision chain:
//! parameter validation → content-type sniffing → format negotiation →
//! transform-with-fallback.
//!
//! # Request parameters
//!
//! ```text
//! /transform?url=https://host/image.jpg&w=800&q=80
//! ```
//!
//! The `Accept` header drives output format negotiation; only formats
//! the server offers (AVIF, WebP) can be negotiated, and a source type
//! is preserved otherwise.
//!
//! # Degradation
//!
//! Transcoding failures fall back to serving the untouched source
//! payload whenever its bytes and a trusted mime type survive, favoring
//! availability over optimization.

// Core modules
pub mod encoder;
pub mod error;
pub mod format;
pub mod orient;
pub mod params;
pub mod processor;
pub mod sniff;

// Re-export commonly used types
pub use encoder::{EncodedImage, EncoderFactory, EncoderQuality, ImageEncoder};
pub use error::ImageError;
pub use format::{choose_output_type, negotiate_target, vary_header};
pub use params::{OutputFormat, TransformRequest, ValidationError};
pub use processor::{avif_quality, transcode, TranscodeOptions, TranscodeOutcome};
pub use sniff::detect_content_type;
