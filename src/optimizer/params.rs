//! Transform request parameter parsing
//!
//! Validates the `url`, `w` and `q` query parameters together with the
//! `Accept` header into a typed [`TransformRequest`], or rejects the
//! request with a specific [`ValidationError`].
//!
//! Policy (see DESIGN.md):
//! - `url` must be an absolute http/https URL; when a domain allow-list
//!   is configured, the hostname must be a member of it.
//! - `q` defaults to 85 when absent; a present but invalid value is a
//!   hard rejection.
//! - `w` absent means "use source width"; a present but invalid value is
//!   a hard rejection.

use std::fmt;
use std::str::FromStr;

use crate::constants::DEFAULT_QUALITY;

use super::error::ImageError;
use super::format::negotiate_target;

/// Output image format; the closed set the pipeline can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
        }
    }

    /// Parse a mime type into a format, `None` for anything the pipeline
    /// cannot encode (e.g. `image/gif`).
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            "image/avif" => Some(Self::Avif),
            _ => None,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            "avif" => Ok(OutputFormat::Avif),
            _ => Err(ImageError::unsupported_format(s)),
        }
    }
}

/// Validated transform request descriptor. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    /// Absolute source URL (scheme is always http or https)
    pub href: http::Uri,
    /// Target max width; `None` means "use source width"
    pub width: Option<u32>,
    /// Output quality, always in [1, 100]
    pub quality: u8,
    /// Accept-negotiated output format, `None` when the client did not
    /// explicitly advertise one of the offered types
    pub target_format: Option<OutputFormat>,
}

/// Request validation failures, surfaced to the client as 400 responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingParameter { param: &'static str },
    MultiValueParameter { param: &'static str },
    InvalidUrl,
    ForbiddenUrl,
    InvalidWidth,
    InvalidQuality,
}

/// Long-form qualifier used in client-facing messages
fn qualifier(param: &str) -> &'static str {
    match param {
        "w" => " (width)",
        "q" => " (quality)",
        _ => "",
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingParameter { param } => {
                write!(f, "\"{}\" parameter is required", param)
            }
            ValidationError::MultiValueParameter { param } => {
                write!(
                    f,
                    "\"{}\" parameter{} cannot be an array",
                    param,
                    qualifier(param)
                )
            }
            ValidationError::InvalidUrl => write!(f, "\"url\" parameter is invalid"),
            ValidationError::ForbiddenUrl => write!(f, "\"url\" parameter is not allowed"),
            ValidationError::InvalidWidth => {
                write!(f, "\"w\" parameter (width) must be a number greater than 0")
            }
            ValidationError::InvalidQuality => {
                write!(
                    f,
                    "\"q\" parameter (quality) must be a number between 1 and 100"
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Decode a raw query string into ordered key/value pairs.
///
/// Duplicate keys are preserved so repeated parameters can be rejected.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        let (key, value) = part.split_once('=').unwrap_or((part, ""));
        let key = urlencoding::decode(key).unwrap_or_default().to_string();
        let value = urlencoding::decode(value).unwrap_or_default().to_string();
        pairs.push((key, value));
    }
    pairs
}

/// Look up a parameter that must appear at most once.
fn single<'a>(
    pairs: &'a [(String, String)],
    param: &'static str,
) -> Result<Option<&'a str>, ValidationError> {
    let mut found = None;
    for (key, value) in pairs {
        if key == param {
            if found.is_some() {
                return Err(ValidationError::MultiValueParameter { param });
            }
            found = Some(value.as_str());
        }
    }
    Ok(found)
}

/// Validate query parameters and the Accept header into a descriptor.
///
/// `allowed_domains` is the optional allow-list; empty accepts any
/// absolute http/https URL. `default_quality` fills in an absent `q`.
pub fn validate(
    pairs: &[(String, String)],
    accept: Option<&str>,
    allowed_domains: &[String],
    default_quality: u8,
) -> Result<TransformRequest, ValidationError> {
    let url = single(pairs, "url")?
        .ok_or(ValidationError::MissingParameter { param: "url" })?;

    let href: http::Uri = url.parse().map_err(|_| ValidationError::InvalidUrl)?;
    match href.scheme_str() {
        Some("http") | Some("https") => {}
        _ => return Err(ValidationError::InvalidUrl),
    }
    let hostname = href.host().ok_or(ValidationError::InvalidUrl)?;

    if !allowed_domains.is_empty() && !allowed_domains.iter().any(|d| d == hostname) {
        return Err(ValidationError::ForbiddenUrl);
    }

    let width = match single(pairs, "w")? {
        None => None,
        Some(raw) => {
            let parsed: u32 = raw.parse().map_err(|_| ValidationError::InvalidWidth)?;
            if parsed == 0 {
                return Err(ValidationError::InvalidWidth);
            }
            Some(parsed)
        }
    };

    let quality = match single(pairs, "q")? {
        None => default_quality,
        Some(raw) => {
            let parsed: u8 = raw.parse().map_err(|_| ValidationError::InvalidQuality)?;
            if !(1..=100).contains(&parsed) {
                return Err(ValidationError::InvalidQuality);
            }
            parsed
        }
    };

    Ok(TransformRequest {
        href,
        width,
        quality,
        target_format: negotiate_target(accept),
    })
}

/// Convenience wrapper taking a raw query string.
pub fn validate_query(
    query: &str,
    accept: Option<&str>,
    allowed_domains: &[String],
) -> Result<TransformRequest, ValidationError> {
    validate(
        &parse_query(query),
        accept,
        allowed_domains,
        DEFAULT_QUALITY,
    )
}
