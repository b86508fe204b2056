//! Error taxonomy for crawling and bootstrap

use thiserror::Error;

/// Failures raised while visiting a single page
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The transport succeeded but the body was empty
    #[error("empty response from {url}")]
    EmptyResponse { url: String },

    /// Proxy selection, transport or body read failed
    #[error("fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    /// Every attempt in the retry budget failed
    #[error("gave up on {url} after {attempts} attempts: {last}")]
    RetryExhausted {
        url: String,
        attempts: u32,
        last: Box<CrawlError>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CrawlError {
    pub fn fetch(url: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        CrawlError::Fetch {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Whether another attempt at the same page may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CrawlError::EmptyResponse { .. } | CrawlError::Fetch { .. }
        )
    }
}

/// Configuration failures, fatal at bootstrap
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid page url in source '{source_key}': {url}")]
    InvalidUrl { source_key: String, url: String },

    #[error("source '{0}' is registered twice")]
    DuplicateSource(String),

    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error("unknown parser kind '{kind}' for source '{source_key}'")]
    UnknownParser { source_key: String, kind: String },

    #[error("invalid proxy entry '{0}'")]
    InvalidProxy(String),

    #[error("invalid pattern for source '{source_key}': {message}")]
    InvalidPattern { source_key: String, message: String },
}
