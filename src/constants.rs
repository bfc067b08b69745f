// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address for the transform tier
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1";

/// Default listen port for the transform tier
pub const DEFAULT_LISTEN_PORT: u16 = 3000;

/// Default listen port for the edge tier
pub const DEFAULT_EDGE_PORT: u16 = 8080;

// =============================================================================
// Upstream defaults
// =============================================================================

/// Default upstream fetch timeout in seconds
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Maximum accepted source payload size (50 MB)
pub const DEFAULT_MAX_SOURCE_SIZE: usize = 50 * 1024 * 1024;

// =============================================================================
// Transcoding defaults
// =============================================================================

/// Default output quality when the `q` parameter is omitted
pub const DEFAULT_QUALITY: u8 = 85;

/// AVIF perceptual scale is denser than the webp/jpeg scale at the same
/// nominal number, so the input quality is shifted down before encoding.
pub const AVIF_QUALITY_OFFSET: u8 = 15;

/// Default AVIF encoder speed (1 = slowest/best, 10 = fastest)
pub const DEFAULT_AVIF_SPEED: u8 = 6;

/// Cache-Control value for transformed responses. Responses are
/// content-addressed by URL + params and never need revalidation.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

// =============================================================================
// Cache defaults
// =============================================================================

/// Default maximum cached item size in megabytes
pub const DEFAULT_MAX_ITEM_SIZE_MB: u64 = 10;

/// Default maximum cache size in megabytes
pub const DEFAULT_MAX_CACHE_SIZE_MB: u64 = 1024;

/// Default TTL in seconds
pub const DEFAULT_TTL_SECONDS: u64 = 3600;
