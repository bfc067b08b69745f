// Edge cache proxy tests
//
// Exercises the hit/miss state machine, the 200-only store policy,
// capability-tag key fragmentation, and store-failure degradation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use kirie::cache::{
    CacheEntry, CacheError, CacheKey, CacheStats, CacheStore, MemoryCache,
};
use kirie::config::{CacheConfig, EdgeConfig};
use kirie::edge::{CacheStatus, EdgeProxy, EdgeRequest};

use super::test_harness::{spawn_edge_listener, StubOrigin, StubResponse};

fn edge_config(transform_origin: String, content_origin: String) -> EdgeConfig {
    EdgeConfig {
        address: "127.0.0.1".to_string(),
        port: 0,
        transform_path: "/transform".to_string(),
        transform_origin,
        content_origin,
        timeout_seconds: 5,
        cache: CacheConfig::default(),
    }
}

fn get_request(path: &str, query: Option<&str>, accept: Option<&str>) -> EdgeRequest {
    EdgeRequest {
        method: "GET".to_string(),
        path: path.to_string(),
        query: query.map(|q| q.to_string()),
        accept: accept.map(|a| a.to_string()),
        headers: accept
            .map(|a| vec![("accept".to_string(), a.to_string())])
            .unwrap_or_default(),
        body: Bytes::new(),
    }
}

async fn content_stub() -> StubOrigin {
    let mut routes = HashMap::new();
    routes.insert(
        "/page".to_string(),
        StubResponse::ok("text/html", b"<h1>hello</h1>".to_vec()),
    );
    routes.insert(
        "/flaky".to_string(),
        StubResponse {
            status: 503,
            content_type: "text/plain".to_string(),
            body: b"unavailable".to_vec(),
        },
    );
    StubOrigin::spawn(routes).await
}

fn memory_store() -> Arc<MemoryCache> {
    Arc::new(MemoryCache::new(&CacheConfig::default()))
}

#[tokio::test]
async fn test_miss_then_hit_serves_identical_bytes() {
    let origin = content_stub().await;
    let proxy = EdgeProxy::new(
        edge_config(origin.origin(), origin.origin()),
        memory_store(),
    )
    .unwrap();

    let first = proxy.proxy(get_request("/page", None, Some("*/*"))).await;
    assert_eq!(first.status, 200);
    assert_eq!(first.cache_status, CacheStatus::Miss);
    assert_eq!(origin.request_count(), 1);

    let second = proxy.proxy(get_request("/page", None, Some("*/*"))).await;
    assert_eq!(second.status, 200);
    assert_eq!(second.cache_status, CacheStatus::Hit);
    // A hit is byte-identical to the stored origin response
    assert_eq!(first.body, second.body);
    // ...and the origin was not consulted again
    assert_eq!(origin.request_count(), 1);
}

#[tokio::test]
async fn test_non_200_responses_are_never_cached() {
    let origin = content_stub().await;
    let proxy = EdgeProxy::new(
        edge_config(origin.origin(), origin.origin()),
        memory_store(),
    )
    .unwrap();

    let first = proxy.proxy(get_request("/flaky", None, None)).await;
    assert_eq!(first.status, 503);
    assert_eq!(first.cache_status, CacheStatus::Miss);

    let second = proxy.proxy(get_request("/flaky", None, None)).await;
    assert_eq!(second.cache_status, CacheStatus::Miss);
    assert_eq!(origin.request_count(), 2);
}

#[tokio::test]
async fn test_equivalent_accept_headers_share_the_cached_entry() {
    let origin = content_stub().await;
    let proxy = EdgeProxy::new(
        edge_config(origin.origin(), origin.origin()),
        memory_store(),
    )
    .unwrap();

    // Neither header advertises webp/avif: same capability tag
    let first = proxy.proxy(get_request("/page", None, Some("*/*"))).await;
    assert_eq!(first.cache_status, CacheStatus::Miss);

    let second = proxy
        .proxy(get_request("/page", None, Some("text/html,*/*;q=0.8")))
        .await;
    assert_eq!(second.cache_status, CacheStatus::Hit);

    // Advertising webp is a different key
    let third = proxy
        .proxy(get_request("/page", None, Some("image/webp,*/*;q=0.8")))
        .await;
    assert_eq!(third.cache_status, CacheStatus::Miss);
    assert_eq!(origin.request_count(), 2);
}

#[tokio::test]
async fn test_transform_and_content_requests_route_to_their_origins() {
    let transform_origin = {
        let mut routes = HashMap::new();
        routes.insert(
            "/transform".to_string(),
            StubResponse::ok("image/webp", b"RIFFxxxxWEBP".to_vec()),
        );
        StubOrigin::spawn(routes).await
    };
    let content_origin = content_stub().await;

    let proxy = EdgeProxy::new(
        edge_config(transform_origin.origin(), content_origin.origin()),
        memory_store(),
    )
    .unwrap();

    let transformed = proxy
        .proxy(get_request(
            "/transform",
            Some("url=https%3A%2F%2Fa.test%2Fx.jpg&w=100"),
            Some("image/webp"),
        ))
        .await;
    assert_eq!(transformed.status, 200);
    assert_eq!(transform_origin.request_count(), 1);
    assert_eq!(content_origin.request_count(), 0);

    let content = proxy.proxy(get_request("/page", None, None)).await;
    assert_eq!(content.status, 200);
    assert_eq!(content_origin.request_count(), 1);
}

/// Store that fails every operation
struct FailingStore;

#[async_trait]
impl CacheStore for FailingStore {
    async fn match_entry(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        Err(CacheError::Backend("store offline".to_string()))
    }

    async fn put(&self, _key: CacheKey, _entry: CacheEntry) -> Result<(), CacheError> {
        Err(CacheError::Backend("store offline".to_string()))
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        Err(CacheError::Backend("store offline".to_string()))
    }
}

#[tokio::test]
async fn test_store_failure_degrades_to_forced_miss() {
    let origin = content_stub().await;
    let proxy = EdgeProxy::new(
        edge_config(origin.origin(), origin.origin()),
        Arc::new(FailingStore),
    )
    .unwrap();

    // Cache availability is never a hard dependency for correctness
    let response = proxy.proxy(get_request("/page", None, None)).await;
    assert_eq!(response.status, 200);
    assert_eq!(&response.body[..], b"<h1>hello</h1>");
    assert_eq!(origin.request_count(), 1);
}

#[tokio::test]
async fn test_unreachable_origin_is_a_gateway_error_and_uncached() {
    // Nothing listens on this port
    let proxy = EdgeProxy::new(
        edge_config(
            "http://127.0.0.1:9".to_string(),
            "http://127.0.0.1:9".to_string(),
        ),
        memory_store(),
    )
    .unwrap();

    let response = proxy.proxy(get_request("/page", None, None)).await;
    assert_eq!(response.status, 502);
    assert_eq!(response.cache_status, CacheStatus::Miss);
}

#[tokio::test]
async fn test_edge_listener_reports_cache_status() {
    let origin = content_stub().await;
    let proxy = Arc::new(
        EdgeProxy::new(
            edge_config(origin.origin(), origin.origin()),
            memory_store(),
        )
        .unwrap(),
    );
    let addr = spawn_edge_listener(proxy).await;

    let client = reqwest::Client::new();
    let url = format!("http://{}/page", addr);

    let first = client.get(&url).send().await.unwrap();
    assert_eq!(first.status().as_u16(), 200);
    assert_eq!(first.headers().get("x-cache").unwrap(), "MISS");
    let first_body = first.bytes().await.unwrap();

    let second = client.get(&url).send().await.unwrap();
    assert_eq!(second.headers().get("x-cache").unwrap(), "HIT");
    let second_body = second.bytes().await.unwrap();
    assert_eq!(first_body, second_body);
    assert_eq!(origin.request_count(), 1);
}
