//! Manifest parsing
//!
//! Turns `index.json` into a [`CacheIndex`]. Loading is synchronous and does
//! no locking; the caller decides when to swap the result in.

use std::fs;
use std::io;
use std::path::Path;

use crate::cache::types::{CacheIndex, Manifest};
use crate::error::{CacheError, Result};

/// Read and parse the manifest at `path`
pub fn load_index(path: &Path) -> Result<CacheIndex> {
    let corrupt = |message: String| CacheError::IndexCorrupt {
        path: path.to_path_buf(),
        message,
    };

    let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => corrupt("manifest file does not exist".to_string()),
        _ => corrupt(format!("failed to read manifest: {e}")),
    })?;

    let manifest: Manifest =
        serde_json::from_str(&raw).map_err(|e| corrupt(format!("invalid manifest: {e}")))?;

    if let Some(entry) = manifest.commands.iter().find(|c| c.platform.is_empty()) {
        return Err(corrupt(format!(
            "command '{}' lists no platforms",
            entry.name
        )));
    }

    let index = CacheIndex::from_commands(manifest.commands);
    tracing::debug!("Loaded {} commands from {}", index.len(), path.display());
    Ok(index)
}
