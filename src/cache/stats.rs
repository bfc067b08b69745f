//! Cache statistics types

use serde::Serialize;

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of evictions (due to size/TTL)
    pub evictions: u64,
    /// Current cache size in bytes
    pub current_size_bytes: u64,
    /// Current number of items in cache
    pub current_item_count: u64,
    /// Maximum cache size in bytes
    pub max_size_bytes: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total requests)
    /// Returns 0.0 if there are no requests
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
