use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::cache::downloader::ArchiveFetcher;
use crate::cache::index::load_index;
use crate::cache::language::{read_page, resolve_page};
use crate::cache::storage::CacheStorage;
use crate::cache::types::{CommandMetadata, SharedIndex};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Outcome of the most recent refresh attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub forced: bool,
    /// Set when the fetch, extraction or manifest parse failed
    pub error: Option<String>,
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Clears the refresh flag and removes the temporary archive on drop
struct RefreshGuard<'a> {
    refreshing: &'a AtomicBool,
    storage: &'a CacheStorage,
}

impl<'a> RefreshGuard<'a> {
    /// Flip `Idle -> Refreshing`, or fail if a refresh is already running
    fn acquire(refreshing: &'a AtomicBool, storage: &'a CacheStorage) -> Result<Self> {
        refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CacheError::Busy)?;
        Ok(Self {
            refreshing,
            storage,
        })
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.storage.remove_archive() {
            tracing::warn!(
                "Failed to remove temporary archive {}: {}",
                self.storage.archive_temp_path().display(),
                e
            );
        }
        self.refreshing.store(false, Ordering::Release);
    }
}

/// Coordinates the on-disk page cache and the in-memory index
#[derive(Debug)]
pub struct CacheManager {
    storage: CacheStorage,
    fetcher: ArchiveFetcher,
    archive_url: String,
    language: RwLock<String>,
    index: RwLock<Option<SharedIndex>>,
    refreshing: AtomicBool,
    last_refresh: Mutex<Option<RefreshOutcome>>,
}

impl CacheManager {
    /// Create a new manager, creating the cache root if needed
    pub fn new(config: CacheConfig) -> anyhow::Result<Self> {
        let storage = CacheStorage::new(&config.cache_dir).with_context(|| {
            format!(
                "Failed to create cache directory: {}",
                config.cache_dir.display()
            )
        })?;

        tracing::debug!(
            "Page cache at {} (language: {})",
            storage.cache_dir().display(),
            config.language
        );

        Ok(Self {
            storage,
            fetcher: ArchiveFetcher::new(),
            archive_url: config.archive_url,
            language: RwLock::new(config.language),
            index: RwLock::new(None),
            refreshing: AtomicBool::new(false),
            last_refresh: Mutex::new(None),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        self.storage.cache_dir()
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    /// Currently preferred page language
    pub fn preferred_language(&self) -> String {
        self.language
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change the preferred page language. Takes effect on the next `man` call.
    pub fn update_lang(&self, lang: impl Into<String>) {
        *self.language.write().unwrap_or_else(PoisonError::into_inner) = lang.into();
    }

    /// Whether a refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Result of the latest refresh attempt, if any has run
    pub fn last_refresh(&self) -> Option<RefreshOutcome> {
        self.last_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the manifest has been parsed into memory
    pub fn is_index_loaded(&self) -> bool {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// All command names in manifest order
    pub fn commands(&self) -> Result<Vec<String>> {
        Ok(self.sync_index()?.names().to_vec())
    }

    /// Manifest entry for `name`, if the command is known
    pub fn command(&self, name: &str) -> Result<Option<CommandMetadata>> {
        Ok(self.sync_index()?.get(name).cloned())
    }

    /// Page text for `name` in the best available language.
    ///
    /// Unknown commands yield an empty string.
    pub fn man(&self, name: &str) -> Result<String> {
        let Some(metadata) = self.command(name)? else {
            return Ok(String::new());
        };

        let preferred = self.preferred_language();
        let location = resolve_page(&metadata, &preferred).ok_or_else(|| {
            CacheError::IndexCorrupt {
                path: self.storage.index_path(),
                message: format!("command '{name}' lists no platforms"),
            }
        })?;

        tracing::debug!(
            "Reading {} from {}/{} (preferred: {})",
            name,
            location.language_dir,
            location.platform,
            preferred
        );
        read_page(&self.storage, &location, name)
    }

    /// Download and extract the archive when the cache is empty or `force`
    /// is set, then make sure the index is loaded.
    ///
    /// Fails with [`CacheError::Busy`] if another refresh is running. Fetch
    /// and extraction failures are logged and recorded in
    /// [`last_refresh`](Self::last_refresh) rather than returned.
    pub async fn update_cache(&self, force: bool) -> Result<()> {
        if self.is_refreshing() {
            return Err(CacheError::Busy);
        }

        if force || !self.storage.has_index() {
            self.refresh(force).await?;
        } else {
            tracing::debug!("Cache already populated, skipping download");
        }

        self.sync_index()?;
        Ok(())
    }

    async fn refresh(&self, forced: bool) -> Result<()> {
        let _guard = RefreshGuard::acquire(&self.refreshing, &self.storage)?;
        let started_at = Utc::now();

        tracing::info!(
            "Refreshing page cache from {} into {}",
            self.archive_url,
            self.storage.cache_dir().display()
        );

        // Parse the new manifest before touching the resident index so readers
        // only ever see the old index or the new one.
        let result = match self.fetch_and_extract().await {
            Ok(files) => load_index(&self.storage.index_path()).map(|index| (files, index)),
            Err(e) => Err(e),
        };

        let error = match result {
            Ok((files, index)) => {
                tracing::info!(
                    "Page cache refreshed ({} files, {} commands)",
                    files,
                    index.len()
                );
                self.install_index(Arc::new(index));
                None
            }
            Err(e) => {
                tracing::error!("Page cache refresh failed: {}", e);
                Some(e.to_string())
            }
        };

        *self
            .last_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(RefreshOutcome {
            started_at,
            finished_at: Utc::now(),
            forced,
            error,
        });

        Ok(())
    }

    async fn fetch_and_extract(&self) -> Result<usize> {
        let archive = self.storage.archive_temp_path();

        self.fetcher
            .fetch_archive(&self.archive_url, &archive)
            .await?;
        self.fetcher
            .extract_archive(&archive, self.storage.cache_dir())
            .await
    }

    /// Replace the resident index wholesale
    fn install_index(&self, index: SharedIndex) {
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Some(index);
    }

    /// Load the manifest on first use; later calls reuse the resident index
    fn sync_index(&self) -> Result<SharedIndex> {
        if let Some(index) = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(index));
        }

        let loaded = Arc::new(load_index(&self.storage.index_path())?);

        let mut slot = self.index.write().unwrap_or_else(PoisonError::into_inner);
        // Keep whatever was installed while we parsed; a finished refresh
        // always overwrites the slot with the index it parsed.
        let index = slot.get_or_insert_with(|| Arc::clone(&loaded));
        Ok(Arc::clone(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"{"commands": [
        {"name": "gcc", "platform": ["linux"], "language": ["en", "zh"], "target": []},
        {"name": "foo", "platform": ["osx"], "language": ["ja"], "target": []},
        {"name": "tar", "platform": ["common", "linux"], "language": ["en"], "target": []}
    ]}"#;

    /// A loopback URL on a port nothing is listening on
    fn unused_local_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}/tldr.zip")
    }

    fn manager_with_pages(temp_dir: &TempDir) -> CacheManager {
        let root = temp_dir.path();
        fs::write(root.join("index.json"), MANIFEST).unwrap();
        for (dir, platform, name, body) in [
            ("pages", "linux", "gcc", "gcc en"),
            ("pages.zh", "linux", "gcc", "gcc zh"),
            ("pages.ja", "osx", "foo", "foo ja"),
        ] {
            let dir = root.join(dir).join(platform);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("{name}.md")), body).unwrap();
        }

        let config = CacheConfig {
            archive_url: unused_local_url(),
            ..CacheConfig::with_cache_dir(root)
        };
        CacheManager::new(config).unwrap()
    }

    #[test]
    fn index_loads_lazily() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_with_pages(&temp_dir);

        assert!(!manager.is_index_loaded());
        assert_eq!(manager.commands().unwrap(), vec!["gcc", "foo", "tar"]);
        assert!(manager.is_index_loaded());
    }

    #[test]
    fn man_follows_language_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_with_pages(&temp_dir);

        assert_eq!(manager.man("gcc").unwrap(), "gcc en");

        manager.update_lang("zh");
        assert_eq!(manager.man("gcc").unwrap(), "gcc zh");

        manager.update_lang("fr");
        assert_eq!(manager.man("gcc").unwrap(), "gcc en");
        assert_eq!(manager.man("foo").unwrap(), "foo ja");
    }

    #[test]
    fn man_unknown_command_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_with_pages(&temp_dir);

        assert_eq!(manager.man("definitely-not-a-command").unwrap(), "");
        assert!(manager.command("definitely-not-a-command").unwrap().is_none());
    }

    #[test]
    fn man_missing_page_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_with_pages(&temp_dir);

        assert!(matches!(
            manager.man("tar"),
            Err(CacheError::PageNotFound { .. })
        ));
    }

    #[test]
    fn reads_without_manifest_fail_as_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let manager = CacheManager::new(CacheConfig::with_cache_dir(temp_dir.path())).unwrap();

        assert!(matches!(
            manager.commands(),
            Err(CacheError::IndexCorrupt { .. })
        ));
        assert!(!manager.is_index_loaded());
    }

    #[test]
    fn refresh_guard_is_exclusive() {
        let temp_dir = TempDir::new().unwrap();
        let storage = CacheStorage::new(temp_dir.path()).unwrap();
        let flag = AtomicBool::new(false);

        let guard = RefreshGuard::acquire(&flag, &storage).unwrap();
        assert!(matches!(
            RefreshGuard::acquire(&flag, &storage),
            Err(CacheError::Busy)
        ));
        fs::write(storage.archive_temp_path(), b"partial").unwrap();

        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(!storage.archive_temp_path().exists());
        assert!(RefreshGuard::acquire(&flag, &storage).is_ok());
    }

    #[tokio::test]
    async fn update_cache_skips_download_when_populated() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_with_pages(&temp_dir);

        manager.update_cache(false).await.unwrap();

        assert!(manager.last_refresh().is_none());
        assert!(manager.is_index_loaded());
        assert!(!manager.is_refreshing());
    }

    #[tokio::test]
    async fn failed_refresh_is_recorded_not_returned() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_with_pages(&temp_dir);
        manager.commands().unwrap();

        manager.update_cache(true).await.unwrap();

        let outcome = manager.last_refresh().unwrap();
        assert!(outcome.forced);
        assert!(!outcome.is_success());
        assert!(!manager.is_refreshing());
        assert!(!manager.storage().archive_temp_path().exists());
        // The previous index stays resident after a failed refresh.
        assert_eq!(manager.commands().unwrap().len(), 3);
    }
}
