//! Archive downloading and extraction
//!
//! The page archive is a single zip holding every `pages*/` directory and the
//! `index.json` manifest. It is streamed to a temporary file inside the cache
//! root and then unpacked over the existing cache contents.

use futures::StreamExt;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use zip::ZipArchive;

use crate::error::{CacheError, Result};

/// Downloads and unpacks the page archive
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    client: reqwest::Client,
}

impl Default for ArchiveFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveFetcher {
    /// Create a new fetcher
    pub fn new() -> Self {
        Self {
            client: Self::build_http_client(),
        }
    }

    /// Build the HTTP client with proper configuration
    fn build_http_client() -> reqwest::Client {
        let user_agent = Self::format_user_agent();

        tracing::debug!("Creating HTTP client with User-Agent: {}", user_agent);

        reqwest::Client::builder()
            .user_agent(user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            })
    }

    fn format_user_agent() -> String {
        format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    /// Stream the response body at `url` into `dest`.
    ///
    /// On failure the partially written file is removed.
    pub async fn fetch_archive(&self, url: &str, dest: &Path) -> Result<()> {
        tracing::debug!("Download URL: {}", url);

        let result = self.stream_to_file(url, dest).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(dest).await;
        }
        result
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<()> {
        let fetch_error = |message: String| CacheError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP {}", response.status())));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| fetch_error(format!("failed to create {}: {e}", dest.display())))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| fetch_error(format!("download interrupted: {e}")))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| fetch_error(format!("failed to write {}: {e}", dest.display())))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| fetch_error(format!("failed to flush {}: {e}", dest.display())))?;

        tracing::debug!("Downloaded {} bytes to {}", written, dest.display());
        Ok(())
    }

    /// Unpack every entry of `archive` into `dest_dir`, atomically replacing
    /// files that already exist. Runs on the blocking pool.
    pub async fn extract_archive(&self, archive: &Path, dest_dir: &Path) -> Result<usize> {
        let archive_path = archive.to_path_buf();
        let dest = dest_dir.to_path_buf();

        tokio::task::spawn_blocking(move || extract_zip(&archive_path, &dest))
            .await
            .map_err(|e| CacheError::Extraction {
                path: archive.to_path_buf(),
                message: format!("extraction task failed: {e}"),
            })?
    }
}

/// Synchronous zip extraction; returns the number of files written
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<usize> {
    let extraction_error = |message: String| CacheError::Extraction {
        path: archive_path.to_path_buf(),
        message,
    };

    let file = File::open(archive_path).map_err(|e| extraction_error(e.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| extraction_error(e.to_string()))?;

    fs::create_dir_all(dest_dir).map_err(|e| extraction_error(e.to_string()))?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| extraction_error(e.to_string()))?;

        let Some(relative_path) = safe_relative_path(entry.name()) else {
            tracing::warn!(
                "Skipping entry that would escape destination: {}",
                entry.name()
            );
            continue;
        };
        let dest_path = dest_dir.join(&relative_path);

        if entry.is_dir() {
            fs::create_dir_all(&dest_path).map_err(|e| extraction_error(e.to_string()))?;
            continue;
        }

        let parent = dest_path.parent().unwrap_or(dest_dir);
        fs::create_dir_all(parent).map_err(|e| extraction_error(e.to_string()))?;

        // Stage next to the target and rename over it, so readers never see
        // a truncated file.
        let mut staged = NamedTempFile::new_in(parent)
            .map_err(|e| extraction_error(format!("{}: {e}", dest_path.display())))?;
        io::copy(&mut entry, staged.as_file_mut())
            .map_err(|e| extraction_error(format!("{}: {e}", dest_path.display())))?;
        staged
            .persist(&dest_path)
            .map_err(|e| extraction_error(format!("{}: {}", dest_path.display(), e.error)))?;
        extracted += 1;
    }

    tracing::debug!(
        "Extracted {} files from {} into {}",
        extracted,
        archive_path.display(),
        dest_dir.display()
    );
    Ok(extracted)
}

/// Reject absolute entry names and parent directory references
fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let mut relative = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}
