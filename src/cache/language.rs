//! Language selection and page reads
//!
//! A command may not be translated into the caller's preferred language.
//! Resolution order: preferred language, then `en`, then whatever the manifest
//! lists first.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::cache::constants::DEFAULT_LANGUAGE;
use crate::cache::storage::CacheStorage;
use crate::cache::types::CommandMetadata;
use crate::error::{CacheError, Result};

/// Where on disk a command's page lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    /// `pages` or `pages.<lang>`
    pub language_dir: String,
    pub platform: String,
}

/// Pick the language variant to read for `metadata`
pub fn resolve_language<'a>(metadata: &'a CommandMetadata, preferred: &'a str) -> &'a str {
    if metadata.supports_language(preferred) {
        preferred
    } else if metadata.supports_language(DEFAULT_LANGUAGE) {
        DEFAULT_LANGUAGE
    } else {
        metadata
            .language
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_LANGUAGE)
    }
}

/// Resolve the language directory and platform for a command.
///
/// Returns `None` only for an entry without platforms, which the indexer
/// never admits.
pub fn resolve_page(metadata: &CommandMetadata, preferred: &str) -> Option<PageLocation> {
    let platform = metadata.default_platform()?;
    let language = resolve_language(metadata, preferred);

    Some(PageLocation {
        language_dir: CacheStorage::language_dir_name(language),
        platform: platform.to_string(),
    })
}

/// Read a page as text
pub fn read_page(storage: &CacheStorage, location: &PageLocation, name: &str) -> Result<String> {
    let path = storage.page_path(&location.language_dir, &location.platform, name);
    read_page_at(path)
}

fn read_page_at(path: PathBuf) -> Result<String> {
    match fs::read(&path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CacheError::PageNotFound { path }),
        Err(source) => Err(CacheError::PageUnreadable { path, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn command(name: &str, platform: &[&str], language: &[&str]) -> CommandMetadata {
        CommandMetadata {
            name: name.to_string(),
            platform: platform.iter().map(|s| s.to_string()).collect(),
            language: language.iter().map(|s| s.to_string()).collect(),
            target: Vec::new(),
        }
    }

    #[test]
    fn preferred_language_wins_when_supported() {
        let gcc = command("gcc", &["linux"], &["en", "zh"]);
        assert_eq!(resolve_language(&gcc, "zh"), "zh");
    }

    #[test]
    fn falls_back_to_english() {
        let gcc = command("gcc", &["linux"], &["en", "zh"]);
        assert_eq!(resolve_language(&gcc, "fr"), "en");
    }

    #[test]
    fn falls_back_to_first_listed_language() {
        let foo = command("foo", &["osx"], &["ja", "ko"]);
        assert_eq!(resolve_language(&foo, "fr"), "ja");
    }

    #[test]
    fn empty_language_list_reads_english() {
        let bare = command("bare", &["common"], &[]);
        assert_eq!(resolve_language(&bare, "de"), "en");
    }

    #[test]
    fn resolve_page_uses_first_platform() {
        let tar = command("tar", &["osx", "linux"], &["en", "de"]);

        let location = resolve_page(&tar, "de").unwrap();
        assert_eq!(
            location,
            PageLocation {
                language_dir: "pages.de".to_string(),
                platform: "osx".to_string(),
            }
        );
    }

    #[test]
    fn resolve_page_english_maps_to_bare_pages_dir() {
        let gcc = command("gcc", &["linux"], &["en", "zh"]);
        assert_eq!(resolve_page(&gcc, "en").unwrap().language_dir, "pages");
    }

    #[test]
    fn read_page_returns_text_or_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = CacheStorage::new(temp_dir.path()).unwrap();
        let location = PageLocation {
            language_dir: "pages.ja".to_string(),
            platform: "osx".to_string(),
        };

        assert!(matches!(
            read_page(&storage, &location, "foo"),
            Err(CacheError::PageNotFound { .. })
        ));

        let path = storage.page_path("pages.ja", "osx", "foo");
        storage.ensure_dir(path.parent().unwrap()).unwrap();
        fs::write(&path, "# foo\n\n> ja page\n").unwrap();

        assert_eq!(
            read_page(&storage, &location, "foo").unwrap(),
            "# foo\n\n> ja page\n"
        );
    }

    #[test]
    fn read_page_distinguishes_unreadable_from_missing() {
        let temp_dir = TempDir::new().unwrap();
        let storage = CacheStorage::new(temp_dir.path()).unwrap();
        let location = PageLocation {
            language_dir: "pages".to_string(),
            platform: "linux".to_string(),
        };

        // A directory where the page file should be cannot be read as text.
        storage
            .ensure_dir(&storage.page_path("pages", "linux", "gcc"))
            .unwrap();

        match read_page(&storage, &location, "gcc") {
            Err(CacheError::PageUnreadable { path, source }) => {
                assert!(path.ends_with("pages/linux/gcc.md"));
                assert_ne!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
