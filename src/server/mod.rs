// Server module - HTTP listener setup and request handling for both tiers

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::cache::MemoryCache;
use crate::config::Config;
use crate::constants::IMMUTABLE_CACHE_CONTROL;
use crate::edge::{CacheStatus, EdgeProxy, EdgeRequest};
use crate::fetch::{OriginFetcher, UpstreamError};
use crate::optimizer::{
    choose_output_type, params, transcode, vary_header, TranscodeOptions, TranscodeOutcome,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Request handler for the transform tier
pub struct TransformService {
    config: Arc<Config>,
    fetcher: OriginFetcher,
}

impl TransformService {
    pub fn new(config: Arc<Config>) -> Result<Self, String> {
        let fetcher = OriginFetcher::new(&config.upstream)?;
        Ok(Self { config, fetcher })
    }

    /// Handle one transform request end to end:
    /// validate → fetch → sniff → negotiate → transcode → respond.
    pub async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let request_id = Uuid::new_v4();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        if method == http::Method::GET && path == "/health" {
            return plain_text(StatusCode::OK, "OK");
        }

        if method != http::Method::GET {
            return plain_text(StatusCode::METHOD_NOT_ALLOWED, "Only GET is supported");
        }

        let query = req.uri().query().unwrap_or("");
        let accept = req
            .headers()
            .get(http::header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let descriptor = match params::validate(
            &params::parse_query(query),
            accept.as_deref(),
            &self.config.upstream.allowed_domains,
            self.config.image.default_quality,
        ) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                tracing::info!(request_id = %request_id, error = %err, "request rejected");
                return plain_text(StatusCode::BAD_REQUEST, &err.to_string());
            }
        };

        tracing::debug!(
            request_id = %request_id,
            href = %descriptor.href,
            width = ?descriptor.width,
            quality = descriptor.quality,
            target = ?descriptor.target_format,
            "fetching source"
        );

        let source = match self.fetcher.fetch(&descriptor.href).await {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(
                    request_id = %request_id,
                    href = %descriptor.href,
                    error = %err,
                    "upstream image response failed"
                );
                let body = match &err {
                    UpstreamError::Status(_) => {
                        "\"url\" parameter is valid but upstream response is invalid".to_string()
                    }
                    other => other.to_string(),
                };
                let status = StatusCode::from_u16(err.to_http_status())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                return plain_text(status, &body);
            }
        };

        let target = choose_output_type(descriptor.target_format, source.effective_mime());
        let options = TranscodeOptions {
            avif_speed: self.config.image.avif_speed,
        };
        let width = descriptor.width;
        let quality = descriptor.quality;

        // Encoding is CPU-bound; keep it off the I/O workers
        let outcome = tokio::task::spawn_blocking(move || {
            transcode(&source, width, target, quality, options)
        })
        .await;

        match outcome {
            Ok(TranscodeOutcome::Optimized { data, content_type }) => {
                image_response(content_type, Bytes::from(data))
            }
            Ok(TranscodeOutcome::FallbackOriginal { data, content_type }) => {
                image_response(&content_type, data)
            }
            Ok(TranscodeOutcome::Failed { reason }) => {
                tracing::error!(request_id = %request_id, reason = %reason, "transcode failed with no fallback");
                plain_text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Unable to optimize image and unable to fallback to upstream image",
                )
            }
            Err(join_err) => {
                tracing::error!(request_id = %request_id, error = %join_err, "transcode task failed");
                plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Image processing failed")
            }
        }
    }
}

/// Successful transform response with long-lived cache headers
fn image_response(content_type: &str, body: Bytes) -> Response<Full<Bytes>> {
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, content_type)
        .header(http::header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL)
        .header(http::header::VARY, vary_header());
    match builder.body(Full::new(body)) {
        Ok(response) => response,
        Err(_) => plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Response build failed"),
    }
}

fn plain_text(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/plain"),
    );
    response
}

/// Serve the transform tier on an already-bound listener.
///
/// One task per connection; a client disconnect drops the request
/// future, which aborts any in-flight origin fetch.
pub async fn serve_transform(
    listener: TcpListener,
    service: Arc<TransformService>,
) -> Result<(), BoxError> {
    loop {
        let (stream, remote) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let service = service.clone();
        tokio::task::spawn(async move {
            let handler = service_fn(move |req| {
                let service = service.clone();
                async move { Ok::<_, Infallible>(service.handle(req).await) }
            });
            if let Err(err) = http1::Builder::new().serve_connection(io, handler).await {
                tracing::debug!(remote = %remote, error = %err, "connection closed with error");
            }
        });
    }
}

/// Bind and run the transform tier from configuration.
pub async fn run_transform(config: Config) -> Result<(), BoxError> {
    let addr: SocketAddr = format!("{}:{}", config.server.address, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Starting Kirie transform tier");

    let service = Arc::new(TransformService::new(Arc::new(config)).map_err(string_error)?);
    serve_transform(listener, service).await
}

/// Translate a hyper request into the edge proxy's normalized form and
/// the proxy's answer back into a hyper response.
pub async fn handle_edge(
    proxy: Arc<EdgeProxy>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to read request body");
            return plain_text(StatusCode::BAD_REQUEST, "Unable to read request body");
        }
    };

    let accept = parts
        .headers
        .get(http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let edge_request = EdgeRequest {
        method: parts.method.as_str().to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(|q| q.to_string()),
        accept,
        headers,
        body,
    };

    let answer = proxy.proxy(edge_request).await;

    let mut builder = Response::builder()
        .status(StatusCode::from_u16(answer.status).unwrap_or(StatusCode::BAD_GATEWAY));
    for (name, value) in &answer.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder = builder.header(
        "x-cache",
        match answer.cache_status {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        },
    );

    match builder.body(Full::new(answer.body)) {
        Ok(response) => response,
        Err(_) => plain_text(StatusCode::BAD_GATEWAY, "Invalid upstream response headers"),
    }
}

/// Serve the edge tier on an already-bound listener.
pub async fn serve_edge(listener: TcpListener, proxy: Arc<EdgeProxy>) -> Result<(), BoxError> {
    loop {
        let (stream, remote) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let proxy = proxy.clone();
        tokio::task::spawn(async move {
            let handler = service_fn(move |req| {
                let proxy = proxy.clone();
                async move { Ok::<_, Infallible>(handle_edge(proxy, req).await) }
            });
            if let Err(err) = http1::Builder::new().serve_connection(io, handler).await {
                tracing::debug!(remote = %remote, error = %err, "connection closed with error");
            }
        });
    }
}

/// Bind and run the edge tier from configuration.
pub async fn run_edge(config: Config) -> Result<(), BoxError> {
    let edge_config = config
        .edge
        .ok_or_else(|| string_error("edge mode requires an [edge] config section".to_string()))?;

    let addr: SocketAddr = format!("{}:{}", edge_config.address, edge_config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        address = %addr,
        transform_origin = %edge_config.transform_origin,
        content_origin = %edge_config.content_origin,
        "Starting Kirie edge tier"
    );

    let store = Arc::new(MemoryCache::new(&edge_config.cache));
    let proxy = Arc::new(EdgeProxy::new(edge_config, store).map_err(string_error)?);
    serve_edge(listener, proxy).await
}

fn string_error(message: String) -> BoxError {
    Box::new(std::io::Error::new(std::io::ErrorKind::Other, message))
}
