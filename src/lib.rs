//! Proxy Harvest - public proxy list crawler
//!
//! Walks configured proxy listing sites page by page, extracts candidate
//! addresses with pluggable parsers, deduplicates them against a shared pool
//! and forwards newly seen addresses to a downstream validation service.

pub mod config;
pub mod crawl;
pub mod error;
pub mod pool;
pub mod proxy;
pub mod sites;

pub use config::Settings;
pub use crawl::*;
pub use error::{ConfigError, CrawlError};
pub use pool::*;
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
