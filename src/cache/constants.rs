//! Constants for cache file and directory names

/// Directory names
pub const CACHE_ROOT_DIR: &str = ".tldr";
pub const CACHE_DIR: &str = "cache";
pub const PAGES_DIR: &str = "pages";

/// File names
pub const INDEX_FILE: &str = "index.json";
pub const ARCHIVE_TEMP_FILE: &str = "_tldr.zip";
pub const PAGE_EXTENSION: &str = "md";

/// Language whose pages live in the bare `pages` directory
pub const DEFAULT_LANGUAGE: &str = "en";

/// Remote archive holding every page plus the manifest
pub const REMOTE_ARCHIVE_URL: &str = "https://tldr.sh/assets/tldr.zip";
