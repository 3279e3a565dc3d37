//! Settings consumed by [`CacheManager`](crate::CacheManager).
//!
//! The host's configuration loader is responsible for validation; this type
//! only carries the resolved values and their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::constants::{CACHE_DIR, CACHE_ROOT_DIR, DEFAULT_LANGUAGE, REMOTE_ARCHIVE_URL};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Preferred page language, e.g. `en` or `zh`
    pub language: String,
    /// Root of the on-disk cache
    pub cache_dir: PathBuf,
    /// Zip archive holding the pages and `index.json`
    pub archive_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            cache_dir: default_cache_dir(),
            archive_url: REMOTE_ARCHIVE_URL.to_string(),
        }
    }
}

impl CacheConfig {
    /// Build a config rooted at `cache_dir`, keeping the other defaults
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Resolve optional overrides (typically CLI flags or environment
    /// variables) on top of the defaults.
    ///
    /// Cache directory paths may use `~` or environment variables.
    pub fn resolve(
        language: Option<String>,
        cache_dir: Option<&str>,
        archive_url: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();

        if let Some(language) = language.map(|l| l.trim().to_string())
            && !language.is_empty()
        {
            config.language = language;
        }

        if let Some(dir) = cache_dir {
            config.cache_dir = expand_path(dir)?;
        }

        if let Some(url) = archive_url {
            config.archive_url = url;
        }

        Ok(config)
    }
}

/// `~/.tldr/cache`, or a relative `.tldr/cache` when no home directory exists
fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(CACHE_ROOT_DIR)
        .join(CACHE_DIR)
}

fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(raw).with_context(|| format!("Failed to expand path: {raw}"))?;
    Ok(Path::new(expanded.as_ref()).to_path_buf())
}
