pub mod cache;
pub mod config;
pub mod error;

pub use cache::CacheManager;
pub use config::CacheConfig;
pub use error::{CacheError, Result};
