use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::cache::constants::*;

/// Manages the file system layout of the page cache
#[derive(Debug, Clone)]
pub struct CacheStorage {
    cache_dir: PathBuf,
}

impl CacheStorage {
    /// Create a new cache storage instance, creating the root if needed
    pub fn new(cache_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let storage = Self {
            cache_dir: cache_dir.into(),
        };
        storage.ensure_dir(&storage.cache_dir)?;
        Ok(storage)
    }

    /// Root of the cache
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Ensure a directory exists
    pub fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    /// Name of the directory holding pages for `lang`
    pub fn language_dir_name(lang: &str) -> String {
        if lang == DEFAULT_LANGUAGE {
            PAGES_DIR.to_string()
        } else {
            format!("{PAGES_DIR}.{lang}")
        }
    }

    /// Get the pages directory for a language
    pub fn language_dir(&self, lang: &str) -> PathBuf {
        self.cache_dir.join(Self::language_dir_name(lang))
    }

    /// Get the manifest path
    pub fn index_path(&self) -> PathBuf {
        self.cache_dir.join(INDEX_FILE)
    }

    /// Get the download target for the archive
    pub fn archive_temp_path(&self) -> PathBuf {
        self.cache_dir.join(ARCHIVE_TEMP_FILE)
    }

    /// Get the path of one page
    pub fn page_path(&self, language_dir: &str, platform: &str, name: &str) -> PathBuf {
        self.cache_dir
            .join(language_dir)
            .join(platform)
            .join(format!("{name}.{PAGE_EXTENSION}"))
    }

    /// Check if the manifest has been extracted
    pub fn has_index(&self) -> bool {
        self.index_path().is_file()
    }

    /// Remove the downloaded archive, if any
    pub fn remove_archive(&self) -> io::Result<()> {
        match fs::remove_file(self.archive_temp_path()) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
