// Cache key construction unit tests
//
// Keys must vary by negotiated capability without fragmenting on header
// formatting differences.

use kirie::cache::{CacheKey, CapabilityTag};
use kirie::edge::routing::canonical_url;

fn key_for(accept: Option<&str>) -> CacheKey {
    let capability = CapabilityTag::from_accept(accept);
    let url = canonical_url(
        "https://kirie.example.net",
        "/transform",
        Some("url=https%3A%2F%2Fexample.test%2Fa.jpg&w=100&q=50"),
        capability,
    );
    CacheKey::new("GET", url, capability)
}

#[test]
fn test_same_url_and_capability_share_a_key() {
    // Neither header advertises webp/avif
    let a = key_for(Some("*/*"));
    let b = key_for(Some("text/html,*/*;q=0.8"));
    assert_eq!(a, b);
}

#[test]
fn test_webp_capability_changes_the_key() {
    let plain = key_for(Some("*/*"));
    let webp = key_for(Some("image/webp,*/*;q=0.8"));
    assert_ne!(plain, webp);
}

#[test]
fn test_all_four_capability_variants_are_distinct() {
    let keys = [
        key_for(None),
        key_for(Some("image/webp")),
        key_for(Some("image/avif")),
        key_for(Some("image/avif,image/webp")),
    ];
    for (i, a) in keys.iter().enumerate() {
        for (j, b) in keys.iter().enumerate() {
            if i != j {
                assert_ne!(a, b, "variants {} and {} must not collide", i, j);
            }
        }
    }
}

#[test]
fn test_header_ordering_does_not_change_the_key() {
    let a = key_for(Some("image/avif,image/webp"));
    let b = key_for(Some("image/webp, image/avif"));
    assert_eq!(a, b);
}

#[test]
fn test_method_is_part_of_the_key() {
    let capability = CapabilityTag::None;
    let url = canonical_url("https://app.example.net", "/page", None, capability);
    let get = CacheKey::new("GET", url.clone(), capability);
    let head = CacheKey::new("HEAD", url, capability);
    assert_ne!(get, head);
}

#[test]
fn test_different_urls_never_collide() {
    let capability = CapabilityTag::None;
    let a = CacheKey::new(
        "GET",
        canonical_url("https://app.example.net", "/a.jpg", None, capability),
        capability,
    );
    let b = CacheKey::new(
        "GET",
        canonical_url("https://app.example.net", "/b.jpg", None, capability),
        capability,
    );
    assert_ne!(a, b);
}
