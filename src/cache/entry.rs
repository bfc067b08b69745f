//! Cache key and entry types
//!
//! This module defines the core response cache structures:
//! - `CapabilityTag`: compact discriminant for the optional formats a
//!   client advertised
//! - `CacheKey`: normalized identifier (method + canonical URL + tag)
//! - `CacheEntry`: a stored response; read-only on hit, replaced
//!   wholesale, never mutated

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Which optional output formats a client can accept.
///
/// Derived from the `Accept` header by substring presence, never from
/// raw header equality: header formatting varies across clients while
/// meaning does not, and the tag keeps equivalent requests on one key.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityTag {
    None,
    Webp,
    Avif,
    WebpAvif,
}

impl CapabilityTag {
    /// Build the tag from an Accept header value.
    pub fn from_accept(accept: Option<&str>) -> Self {
        let accept = accept.unwrap_or("");
        let webp = accept.contains("webp");
        let avif = accept.contains("avif");
        match (webp, avif) {
            (false, false) => Self::None,
            (true, false) => Self::Webp,
            (false, true) => Self::Avif,
            (true, true) => Self::WebpAvif,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::WebpAvif => "webp-avif",
        }
    }
}

impl std::fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key for stored responses.
///
/// Built only from normalized fields. Two requests with the same
/// canonical URL and capability tag always collide onto one key;
/// unrelated headers and header ordering cannot fragment the cache.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKey {
    /// Request method (responses are only cached for GET in practice)
    pub method: String,
    /// Canonical outbound URL, capability discriminant included
    pub url: String,
    /// Negotiated capability tag
    pub capability: CapabilityTag,
}

impl CacheKey {
    pub fn new(method: impl Into<String>, url: impl Into<String>, capability: CapabilityTag) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            capability,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} [{}]", self.method, self.url, self.capability)
    }
}

/// A stored response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Response status (always 200 under the edge store policy)
    pub status: u16,
    /// Response headers, in upstream order
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
    /// When this entry was created
    pub stored_at: SystemTime,
}

impl CacheEntry {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: SystemTime::now(),
        }
    }

    /// Approximate size of this entry in bytes, for weighted eviction.
    pub fn size_bytes(&self) -> usize {
        let header_size: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.len() + value.len())
            .sum();
        self.body.len() + header_size + std::mem::size_of::<u16>() + std::mem::size_of::<SystemTime>()
    }
}
