//! Error types for cache operations.
//!
//! [`CacheError`] covers every failure the cache can surface. Refresh
//! failures (`Fetch`, `Extraction`) are logged and recorded by the manager
//! rather than returned; the rest propagate to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the page cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Network failure or non-success response while downloading the archive.
    #[error("Failed to fetch archive from {url}: {message}")]
    Fetch { url: String, message: String },

    /// The downloaded archive is corrupt or could not be written to disk.
    #[error("Failed to extract archive {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// The manifest is missing or does not have the expected shape.
    #[error("Cache index at {path} is missing or corrupt: {message}")]
    IndexCorrupt { path: PathBuf, message: String },

    /// The manifest lists a page that is not on disk.
    #[error("Page not found: {path}")]
    PageNotFound { path: PathBuf },

    /// A page exists but could not be read (permissions, not a file, ...).
    #[error("Failed to read page {path}: {source}")]
    PageUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A refresh is already running on this manager.
    #[error("Cache is already updating")]
    Busy,
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
