//! Cache store trait definition
//!
//! The response cache is an injected capability, not an ambient global:
//! the edge proxy receives an implementation explicitly, which keeps the
//! store substitutable (an in-memory store in tests, a shared service in
//! production).

use async_trait::async_trait;

use super::entry::{CacheEntry, CacheKey};
use super::error::CacheError;
use super::stats::CacheStats;

/// Key/value response store with at-least atomic put/match semantics.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a stored response.
    /// Returns None if the key is not present or the entry has expired.
    async fn match_entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Store a response under the key, replacing any existing entry
    /// wholesale.
    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError>;

    /// Get store statistics
    async fn stats(&self) -> Result<CacheStats, CacheError>;
}
