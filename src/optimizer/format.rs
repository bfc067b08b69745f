//! Accept-based format negotiation
//!
//! Matches the client's weighted `Accept` preferences against the set of
//! optionally supported output types, and resolves the final output type
//! from the negotiated preference and the sniffed source type.

use super::params::OutputFormat;

/// Output types offered for negotiation, in server preference order.
/// PNG and JPEG are always encodable but never negotiated: they are only
/// produced by preserving the source type.
const OFFERED: [OutputFormat; 2] = [OutputFormat::Avif, OutputFormat::WebP];

/// A parsed media range from the Accept header
#[derive(Debug, Clone)]
struct MediaRange {
    media_type: String,
    quality: f32,
    position: usize,
}

/// Negotiate the target output format from the Accept header.
///
/// Only an explicit mention of an offered type counts: wildcard ranges
/// (`image/*`, `*/*`) express no preference for an optional format, so a
/// generic browser header selects nothing and the source type is
/// preserved downstream.
///
/// Returns a member of the offered set or `None`.
pub fn negotiate_target(accept: Option<&str>) -> Option<OutputFormat> {
    let accept = accept?;
    let ranges = parse_accept_header(accept);

    let mut best: Option<(&MediaRange, OutputFormat)> = None;
    for range in &ranges {
        if range.quality <= 0.0 {
            continue;
        }
        let Some(format) = OFFERED
            .iter()
            .copied()
            .find(|f| f.content_type() == range.media_type)
        else {
            continue;
        };
        let better = match best {
            None => true,
            Some((current, _)) => {
                range.quality > current.quality
                    || (range.quality == current.quality && range.position < current.position)
            }
        };
        if better {
            best = Some((range, format));
        }
    }

    best.map(|(_, format)| format)
}

/// Parse an Accept header into media ranges with quality values.
fn parse_accept_header(accept: &str) -> Vec<MediaRange> {
    let mut ranges = Vec::new();

    for (position, part) in accept.split(',').enumerate() {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (media_type, quality) = if let Some((mt, params)) = part.split_once(';') {
            (mt.trim(), parse_quality(params))
        } else {
            (part, 1.0)
        };

        ranges.push(MediaRange {
            media_type: media_type.to_lowercase(),
            quality,
            position,
        });
    }

    ranges
}

/// Parse the quality value from media range parameters (e.g. "q=0.8")
fn parse_quality(params: &str) -> f32 {
    for param in params.split(';') {
        let param = param.trim();
        if let Some(q) = param.strip_prefix("q=") {
            if let Ok(quality) = q.parse::<f32>() {
                return quality.clamp(0.0, 1.0);
            }
        }
    }
    1.0
}

/// Resolve the final output type for a request.
///
/// Rule order: (1) the Accept-negotiated type when present; (2) else the
/// sniffed-or-declared source type when it is encodable; (3) else JPEG.
/// The result is always a member of the closed set the pipeline encodes.
pub fn choose_output_type(
    requested: Option<OutputFormat>,
    source_mime: Option<&str>,
) -> OutputFormat {
    if let Some(format) = requested {
        return format;
    }
    if let Some(format) = source_mime.and_then(OutputFormat::from_mime) {
        return format;
    }
    OutputFormat::Jpeg
}

/// The Vary header value for negotiated responses
pub fn vary_header() -> &'static str {
    "Accept"
}
