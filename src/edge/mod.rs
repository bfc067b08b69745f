//! Edge cache-key proxy
//!
//! Sits in front of the transform tier as a separate deployment: it
//! normalizes an inbound request into a canonical cache key (folding in
//! the client's negotiated capability), consults a shared cache store,
//! and only fetches from the designated origin on a miss. Exactly-200
//! responses are stored; everything else passes through uncached so
//! transient upstream failures are never memorized.
//!
//! Per-request state machine:
//!
//! ```text
//! Received → KeyComputed → CacheHit → Respond
//!                        → CacheMiss → Fetch → Status200 → Store → Respond
//!                                            → OtherStatus → Respond
//! ```

pub mod routing;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::cache::{CacheEntry, CacheKey, CacheStore, CapabilityTag};
use crate::config::EdgeConfig;

use routing::{canonical_url, classify, RouteTarget};

/// Headers never forwarded upstream or replayed from the store.
/// Bodies are held decoded in memory, so framing and encoding headers
/// would be wrong if preserved; transfer encoding is renegotiated per
/// hop by the HTTP client.
const HOP_BY_HOP: [&str; 8] = [
    "accept-encoding",
    "connection",
    "content-length",
    "content-encoding",
    "host",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Inbound request, already reduced to normalized fields.
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub accept: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Whether a response was served from the store or the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

/// Response handed back to the listener
#[derive(Debug, Clone)]
pub struct EdgeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub cache_status: CacheStatus,
}

/// The edge proxy itself. The cache store is an injected capability so
/// tests can substitute an in-memory or failing store.
pub struct EdgeProxy {
    config: EdgeConfig,
    store: Arc<dyn CacheStore>,
    client: reqwest::Client,
}

impl EdgeProxy {
    pub fn new(config: EdgeConfig, store: Arc<dyn CacheStore>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| format!("Failed to build edge HTTP client: {}", e))?;

        Ok(Self {
            config,
            store,
            client,
        })
    }

    /// Handle one inbound request through the hit/miss state machine.
    pub async fn proxy(&self, req: EdgeRequest) -> EdgeResponse {
        let capability = CapabilityTag::from_accept(req.accept.as_deref());

        let origin = match classify(&self.config.transform_path, &req.path) {
            RouteTarget::Transform => &self.config.transform_origin,
            RouteTarget::Content => &self.config.content_origin,
        };
        let url = canonical_url(origin, &req.path, req.query.as_deref(), capability);
        let key = CacheKey::new(req.method.clone(), url.clone(), capability);

        // A store failure must never fail the request: degrade to a miss.
        let cached = match self.store.match_entry(&key).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(error = %err, key = %key, "cache match failed, treating as miss");
                None
            }
        };

        if let Some(entry) = cached {
            tracing::debug!(key = %key, "cache hit");
            return EdgeResponse {
                status: entry.status,
                headers: entry.headers,
                body: entry.body,
                cache_status: CacheStatus::Hit,
            };
        }

        tracing::debug!(key = %key, url = %url, "cache miss, fetching origin");
        let response = match self.fetch_origin(&req, &url).await {
            Ok(response) => response,
            Err(err) => return err,
        };

        // Only an exact 200 is worth remembering
        if response.status == 200 {
            let entry = CacheEntry::new(200, response.headers.clone(), response.body.clone());
            if let Err(err) = self.store.put(key, entry).await {
                tracing::warn!(error = %err, "cache put failed, serving uncached");
            }
        }

        response
    }

    async fn fetch_origin(&self, req: &EdgeRequest, url: &str) -> Result<EdgeResponse, EdgeResponse> {
        let method = reqwest::Method::from_bytes(req.method.as_bytes())
            .unwrap_or(reqwest::Method::GET);

        let mut outbound = self.client.request(method, url);
        for (name, value) in &req.headers {
            if !is_hop_by_hop(name) {
                outbound = outbound.header(name.as_str(), value.as_str());
            }
        }
        if !req.body.is_empty() {
            outbound = outbound.body(req.body.clone());
        }

        let response = outbound.send().await.map_err(|e| {
            let (status, message) = if e.is_timeout() {
                (504, "upstream origin timed out")
            } else {
                (502, "upstream origin unreachable")
            };
            tracing::warn!(error = %e, url = %url, "origin fetch failed");
            plain_text_response(status, message)
        })?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, url = %url, "origin body read failed");
                plain_text_response(502, "upstream origin body read failed")
            })?;

        Ok(EdgeResponse {
            status,
            headers,
            body,
            cache_status: CacheStatus::Miss,
        })
    }
}

fn plain_text_response(status: u16, message: &str) -> EdgeResponse {
    EdgeResponse {
        status,
        headers: vec![("content-type".to_string(), "text/plain".to_string())],
        body: Bytes::from(message.to_string()),
        cache_status: CacheStatus::Miss,
    }
}
