// Transform tier end-to-end tests
//
// Full flow over real sockets: client → transform tier → stub origin.

use std::collections::HashMap;

use kirie::config::Config;

use super::test_harness::{
    corrupt_png, create_test_jpeg, create_test_png, spawn_transform, StubOrigin, StubResponse,
};

async fn stub_with_images() -> StubOrigin {
    let mut routes = HashMap::new();
    routes.insert(
        "/a.jpg".to_string(),
        StubResponse::ok("image/jpeg", create_test_jpeg(400, 300)),
    );
    routes.insert(
        "/b.png".to_string(),
        StubResponse::ok("image/png", create_test_png(400, 300)),
    );
    routes.insert(
        "/small.png".to_string(),
        StubResponse::ok("image/png", create_test_png(100, 80)),
    );
    routes.insert(
        "/corrupt.png".to_string(),
        StubResponse::ok("text/plain", corrupt_png()),
    );
    StubOrigin::spawn(routes).await
}

fn transform_url(addr: std::net::SocketAddr) -> String {
    format!("http://{}/transform", addr)
}

#[tokio::test]
async fn test_e2e_avif_transform() {
    let origin = stub_with_images().await;
    let addr = spawn_transform(Config::default()).await;

    let response = reqwest::Client::new()
        .get(transform_url(addr))
        .query(&[
            ("url", origin.url("/a.jpg").as_str()),
            ("w", "100"),
            ("q", "50"),
        ])
        .header("accept", "image/avif")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/avif"
    );
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=31536000, immutable"
    );
    let body = response.bytes().await.unwrap();
    assert_eq!(&body[4..12], b"ftypavif");
}

#[tokio::test]
async fn test_e2e_downscales_to_exact_width() {
    let origin = stub_with_images().await;
    let addr = spawn_transform(Config::default()).await;

    let response = reqwest::Client::new()
        .get(transform_url(addr))
        .query(&[("url", origin.url("/b.png").as_str()), ("w", "100")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    let body = response.bytes().await.unwrap();
    let img = image::load_from_memory(&body).unwrap();
    assert_eq!((img.width(), img.height()), (100, 75));
}

#[tokio::test]
async fn test_e2e_never_upscales() {
    let origin = stub_with_images().await;
    let addr = spawn_transform(Config::default()).await;

    let response = reqwest::Client::new()
        .get(transform_url(addr))
        .query(&[("url", origin.url("/small.png").as_str()), ("w", "400")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body = response.bytes().await.unwrap();
    let img = image::load_from_memory(&body).unwrap();
    assert_eq!((img.width(), img.height()), (100, 80));
}

#[tokio::test]
async fn test_e2e_source_type_preserved_without_negotiation() {
    let origin = stub_with_images().await;
    let addr = spawn_transform(Config::default()).await;

    let response = reqwest::Client::new()
        .get(transform_url(addr))
        .query(&[("url", origin.url("/a.jpg").as_str()), ("w", "50")])
        .header("accept", "*/*")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
}

#[tokio::test]
async fn test_e2e_missing_url_parameter() {
    let addr = spawn_transform(Config::default()).await;

    let response = reqwest::get(format!("{}?w=100", transform_url(addr)))
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body = response.text().await.unwrap();
    assert!(body.contains("\"url\" parameter is required"));
}

#[tokio::test]
async fn test_e2e_invalid_quality() {
    let origin = stub_with_images().await;
    let addr = spawn_transform(Config::default()).await;

    let response = reqwest::Client::new()
        .get(transform_url(addr))
        .query(&[("url", origin.url("/a.jpg").as_str()), ("q", "150")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body = response.text().await.unwrap();
    assert!(body.contains("between 1 and 100"));
}

#[tokio::test]
async fn test_e2e_forbidden_domain() {
    let mut config = Config::default();
    config.upstream.allowed_domains = vec!["allowed.test".to_string()];
    let addr = spawn_transform(config).await;

    let response = reqwest::Client::new()
        .get(transform_url(addr))
        .query(&[("url", "https://denied.test/a.jpg")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body = response.text().await.unwrap();
    assert!(body.contains("\"url\" parameter is not allowed"));
}

#[tokio::test]
async fn test_e2e_upstream_404_is_propagated() {
    let origin = stub_with_images().await;
    let addr = spawn_transform(Config::default()).await;

    let response = reqwest::Client::new()
        .get(transform_url(addr))
        .query(&[("url", origin.url("/missing.jpg").as_str())])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 404);
    let body = response.text().await.unwrap();
    assert!(body.contains("upstream response is invalid"));
}

#[tokio::test]
async fn test_e2e_transcode_failure_falls_back_to_original() {
    let origin = stub_with_images().await;
    let addr = spawn_transform(Config::default()).await;

    let response = reqwest::Client::new()
        .get(transform_url(addr))
        .query(&[("url", origin.url("/corrupt.png").as_str()), ("w", "100")])
        .header("accept", "image/webp")
        .send()
        .await
        .unwrap();

    // The payload is undecodable but sniffs as PNG, so the original
    // bytes come back unchanged with the sniffed type.
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    let body = response.bytes().await.unwrap();
    assert_eq!(&body[..], &corrupt_png()[..]);
}

#[tokio::test]
async fn test_e2e_health_endpoint() {
    let addr = spawn_transform(Config::default()).await;
    let response = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}
