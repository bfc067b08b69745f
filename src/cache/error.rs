//! Cache error types
//!
//! Store failures are deliberately non-fatal for callers: the edge
//! layer treats any of these as a forced miss and proceeds to origin.

/// Cache error types
#[derive(Debug)]
pub enum CacheError {
    /// Entry exceeds the configured per-item size limit
    StorageFull,
    /// The backing store could not be reached or failed an operation
    Backend(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::StorageFull => write!(f, "Cache storage is full"),
            CacheError::Backend(msg) => write!(f, "Cache backend error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {}
