//! Memory cache implementation
//!
//! This module provides in-memory cache store implementations:
//! - `MemoryCache`: LRU response cache backed by moka
//! - `NullCache`: no-op implementation for disabled caching

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::CacheConfig;

use super::entry::{CacheEntry, CacheKey};
use super::error::CacheError;
use super::stats::CacheStats;
use super::traits::CacheStore;

/// Statistics tracker using atomics for thread safety
pub(crate) struct CacheStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStatsTracker {
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn increment_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_evictions(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(
        &self,
        current_size_bytes: u64,
        current_item_count: u64,
        max_size_bytes: u64,
    ) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            current_size_bytes,
            current_item_count,
            max_size_bytes,
        }
    }
}

/// MemoryCache wraps moka for our CacheStore trait
pub struct MemoryCache {
    cache: moka::future::Cache<CacheKey, CacheEntry>,
    stats: Arc<CacheStatsTracker>,
    max_item_size_bytes: u64,
}

impl MemoryCache {
    /// Create a new MemoryCache from configuration
    pub fn new(config: &CacheConfig) -> Self {
        use std::time::Duration;

        // Shared with the eviction listener
        let stats = Arc::new(CacheStatsTracker::new());
        let stats_clone = stats.clone();

        let cache = moka::future::Cache::builder()
            .max_capacity(config.max_cache_size_bytes())
            .time_to_live(Duration::from_secs(config.default_ttl_seconds))
            .weigher(|_key, entry: &CacheEntry| {
                let size = entry.size_bytes();
                if size > u32::MAX as usize {
                    u32::MAX
                } else {
                    size as u32
                }
            })
            .eviction_listener(move |_key, _value, cause| {
                use moka::notification::RemovalCause;
                match cause {
                    RemovalCause::Size | RemovalCause::Expired => {
                        stats_clone.increment_evictions();
                    }
                    _ => {
                        // Explicit replacement is not an eviction
                    }
                }
            })
            .build();

        Self {
            cache,
            stats,
            max_item_size_bytes: config.max_item_size_bytes(),
        }
    }

    /// Run pending maintenance tasks.
    /// Forces moka to process pending evictions and expirations.
    pub async fn run_pending(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// Current entry count (approximate due to eventual consistency)
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn match_entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        match self.cache.get(key).await {
            Some(entry) => {
                self.stats.increment_hits();
                Ok(Some(entry))
            }
            None => {
                self.stats.increment_misses();
                Ok(None)
            }
        }
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        if entry.size_bytes() as u64 > self.max_item_size_bytes {
            return Err(CacheError::StorageFull);
        }
        self.cache.insert(key, entry).await;
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(self.stats.snapshot(
            self.cache.weighted_size(),
            self.cache.entry_count(),
            self.max_item_size_bytes,
        ))
    }
}

/// No-op cache store for deployments with caching disabled
pub struct NullCache;

#[async_trait]
impl CacheStore for NullCache {
    async fn match_entry(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        Ok(None)
    }

    async fn put(&self, _key: CacheKey, _entry: CacheEntry) -> Result<(), CacheError> {
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(CacheStats::default())
    }
}
