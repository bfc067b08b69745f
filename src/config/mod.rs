// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{
    DEFAULT_AVIF_SPEED, DEFAULT_EDGE_PORT, DEFAULT_LISTEN_ADDRESS, DEFAULT_LISTEN_PORT,
    DEFAULT_MAX_CACHE_SIZE_MB, DEFAULT_MAX_ITEM_SIZE_MB, DEFAULT_MAX_SOURCE_SIZE,
    DEFAULT_QUALITY, DEFAULT_TTL_SECONDS, DEFAULT_UPSTREAM_TIMEOUT_SECS,
};

fn default_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

fn default_edge_port() -> u16 {
    DEFAULT_EDGE_PORT
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

fn default_max_source_size() -> usize {
    DEFAULT_MAX_SOURCE_SIZE
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_avif_speed() -> u8 {
    DEFAULT_AVIF_SPEED
}

fn default_transform_path() -> String {
    "/transform".to_string()
}

fn default_max_cache_size_mb() -> u64 {
    DEFAULT_MAX_CACHE_SIZE_MB
}

fn default_max_item_size_mb() -> u64 {
    DEFAULT_MAX_ITEM_SIZE_MB
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL_SECONDS
}

/// Top-level configuration for both tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transform tier listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Origin fetch behavior (timeout, allow-list)
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Transcoding defaults
    #[serde(default)]
    pub image: ImageConfig,

    /// Edge tier; absent when only the transform tier is deployed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<EdgeConfig>,
}

/// HTTP listener configuration for the transform tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default: 127.0.0.1)
    #[serde(default = "default_address")]
    pub address: String,

    /// Listen port (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Emit logs as JSON (default: false)
    #[serde(default)]
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            log_json: false,
        }
    }
}

/// Origin fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Fetch timeout in seconds (default: 10). A timeout surfaces as 504
    /// and is never cached.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Domain allow-list for the `url` parameter. Empty means any
    /// absolute http/https URL is accepted.
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    /// Maximum accepted source payload size in bytes (default: 50 MB)
    #[serde(default = "default_max_source_size")]
    pub max_source_size: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            allowed_domains: Vec::new(),
            max_source_size: default_max_source_size(),
        }
    }
}

/// Transcoding defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Quality used when the `q` parameter is omitted (default: 85)
    #[serde(default = "default_quality")]
    pub default_quality: u8,

    /// AVIF encoder speed, 1 (slowest/best) to 10 (default: 6)
    #[serde(default = "default_avif_speed")]
    pub avif_speed: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            default_quality: default_quality(),
            avif_speed: default_avif_speed(),
        }
    }
}

/// Edge tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Listen address (default: 127.0.0.1)
    #[serde(default = "default_address")]
    pub address: String,

    /// Listen port (default: 8080)
    #[serde(default = "default_edge_port")]
    pub port: u16,

    /// Path prefix that routes to the transform origin (default: /transform)
    #[serde(default = "default_transform_path")]
    pub transform_path: String,

    /// Canonical origin serving the transform endpoint, e.g.
    /// "https://kirie.example.net"
    pub transform_origin: String,

    /// Canonical origin for everything else, e.g. "https://app.example.net"
    pub content_origin: String,

    /// Outbound fetch timeout in seconds (default: 10). A timeout is
    /// treated like any non-200 response: returned, never cached.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Shared response cache sizing
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Response cache sizing for the edge tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum total cache size in megabytes (default: 1024)
    #[serde(default = "default_max_cache_size_mb")]
    pub max_cache_size_mb: u64,

    /// Maximum single item size in megabytes (default: 10)
    #[serde(default = "default_max_item_size_mb")]
    pub max_item_size_mb: u64,

    /// Entry TTL in seconds (default: 3600)
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size_mb: default_max_cache_size_mb(),
            max_item_size_mb: default_max_item_size_mb(),
            default_ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl CacheConfig {
    /// Maximum cache size in bytes
    pub fn max_cache_size_bytes(&self) -> u64 {
        self.max_cache_size_mb * 1024 * 1024
    }

    /// Maximum item size in bytes
    pub fn max_item_size_bytes(&self) -> u64 {
        self.max_item_size_mb * 1024 * 1024
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            image: ImageConfig::default(),
            edge: None,
        }
    }
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        // Now perform the substitution (we know all vars exist)
        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap() // Safe because we checked above
        });

        let config: Config = serde_yaml::from_str(&substituted).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.image.default_quality < 1 || self.image.default_quality > 100 {
            return Err(format!(
                "image.default_quality must be 1-100, got {}",
                self.image.default_quality
            ));
        }

        if self.image.avif_speed < 1 || self.image.avif_speed > 10 {
            return Err(format!(
                "image.avif_speed must be 1-10, got {}",
                self.image.avif_speed
            ));
        }

        if self.upstream.timeout_seconds == 0 {
            return Err("upstream.timeout_seconds must be > 0".to_string());
        }

        if let Some(edge) = &self.edge {
            if edge.timeout_seconds == 0 {
                return Err("edge.timeout_seconds must be > 0".to_string());
            }

            if !edge.transform_path.starts_with('/') {
                return Err(format!(
                    "edge.transform_path '{}' does not start with /",
                    edge.transform_path
                ));
            }

            for (name, origin) in [
                ("edge.transform_origin", &edge.transform_origin),
                ("edge.content_origin", &edge.content_origin),
            ] {
                let uri: http::Uri = origin
                    .parse()
                    .map_err(|_| format!("{} '{}' is not a valid URL", name, origin))?;
                match uri.scheme_str() {
                    Some("http") | Some("https") => {}
                    _ => return Err(format!("{} '{}' must be http or https", name, origin)),
                }
                if uri.host().is_none() {
                    return Err(format!("{} '{}' has no hostname", name, origin));
                }
            }
        }

        Ok(())
    }
}
