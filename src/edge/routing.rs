//! Canonical outbound URL construction
//!
//! The edge tier rewrites every inbound request to one of two canonical
//! origins. The routing decision is deterministic and based solely on
//! the normalized path; the capability tag is appended as an explicit
//! query discriminant so the cache key never depends on header text.

use crate::cache::CapabilityTag;

/// Which origin an inbound request is rewritten to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    /// The transform endpoint itself
    Transform,
    /// The content/application origin
    Content,
}

/// Classify a request path against the configured transform path.
pub fn classify(transform_path: &str, path: &str) -> RouteTarget {
    if path == transform_path || path.starts_with(&format!("{}/", transform_path)) {
        RouteTarget::Transform
    } else {
        RouteTarget::Content
    }
}

/// Build the canonical outbound URL: origin substitution, path/query
/// reconstruction, and the `imageSupport` capability discriminant.
pub fn canonical_url(
    origin: &str,
    path: &str,
    query: Option<&str>,
    capability: CapabilityTag,
) -> String {
    let origin = origin.trim_end_matches('/');
    let mut url = String::with_capacity(origin.len() + path.len() + 32);
    url.push_str(origin);
    url.push_str(path);
    match query {
        Some(q) if !q.is_empty() => {
            url.push('?');
            url.push_str(q);
            url.push('&');
        }
        _ => url.push('?'),
    }
    url.push_str("imageSupport=");
    url.push_str(capability.as_str());
    url
}
