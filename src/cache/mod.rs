//! # Cache Module
//!
//! Offline cache of tldr command pages.
//!
//! ## Key Components
//!
//! - [`service`] - [`CacheManager`], the coordinator callers use
//! - [`storage`] - Cache directory layout and path computation
//! - [`downloader`] - Streams the page archive and unpacks it
//! - [`index`] - Parses `index.json` into the in-memory index
//! - [`language`] - Language fallback and page reads
//! - [`types`] - Manifest and index types
//! - [`constants`] - File and directory names

pub mod constants;
pub mod downloader;
pub mod index;
pub mod language;
pub mod service;
pub mod storage;
pub mod types;

pub use service::{CacheManager, RefreshOutcome};
pub use types::{CacheIndex, CommandMetadata, CommandTarget};
