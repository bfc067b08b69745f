//! Origin fetch
//!
//! Fetches the source payload named by the validated `url` parameter.
//! The fetch is the first suspension point of a request: it is bounded
//! by the configured upstream timeout and aborts when the client
//! disconnects (the request future is dropped). There is no retry logic;
//! repeated client requests retry naturally at the HTTP layer.

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::optimizer::sniff;

/// A fetched source payload, owned by a single request.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Raw payload bytes
    pub bytes: Bytes,
    /// Magic-byte sniffed mime type
    pub detected_mime: Option<&'static str>,
    /// Content-Type the upstream server declared
    pub declared_mime: Option<String>,
}

impl SourceImage {
    /// Wrap a payload, sniffing its content type up front.
    pub fn new(bytes: Bytes, declared_mime: Option<String>) -> Self {
        let detected_mime = sniff::detect_content_type(&bytes);
        Self {
            bytes,
            detected_mime,
            declared_mime,
        }
    }

    /// The mime type to trust: sniffed wins over declared, because
    /// upstream servers misreport formats.
    pub fn effective_mime(&self) -> Option<&str> {
        match self.detected_mime {
            Some(mime) => Some(mime),
            None => self.declared_mime.as_deref(),
        }
    }
}

/// Errors fetching the source payload from its origin.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The origin answered with a non-success status
    #[error("upstream returned status {0}")]
    Status(u16),

    /// The fetch exceeded the configured timeout
    #[error("upstream fetch timed out")]
    Timeout,

    /// Connection or protocol failure
    #[error("upstream fetch failed: {0}")]
    Network(String),

    /// The payload exceeded the configured size limit
    #[error("upstream payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
}

impl UpstreamError {
    /// HTTP status to surface to the client. Origin statuses propagate
    /// unchanged; transport failures map to gateway errors.
    pub fn to_http_status(&self) -> u16 {
        match self {
            UpstreamError::Status(code) => *code,
            UpstreamError::Timeout => 504,
            UpstreamError::Network(_) => 502,
            UpstreamError::PayloadTooLarge { .. } => 502,
        }
    }
}

/// HTTP client for source fetches, shared across requests.
#[derive(Debug, Clone)]
pub struct OriginFetcher {
    client: reqwest::Client,
    max_source_size: usize,
}

impl OriginFetcher {
    pub fn new(config: &UpstreamConfig) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| format!("Failed to build upstream HTTP client: {}", e))?;

        Ok(Self {
            client,
            max_source_size: config.max_source_size,
        })
    }

    /// Fetch the payload at `href`.
    ///
    /// Any non-2xx origin status is an error carrying that status; the
    /// caller propagates it to the client rather than retrying.
    pub async fn fetch(&self, href: &http::Uri) -> Result<SourceImage, UpstreamError> {
        let response = self
            .client
            .get(href.to_string())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let declared_mime = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let bytes = response.bytes().await.map_err(classify_error)?;
        if bytes.len() > self.max_source_size {
            return Err(UpstreamError::PayloadTooLarge {
                size: bytes.len(),
                limit: self.max_source_size,
            });
        }

        Ok(SourceImage::new(bytes, declared_mime))
    }
}

fn classify_error(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Network(err.to_string())
    }
}
