//! Settings file
//!
//! ```toml
//! [crawler]
//! mode = "continuous"
//! request_timeout_secs = 30
//! poll_interval_secs = 600
//!
//! [pool]
//! backend = "redis"
//! url = "redis://127.0.0.1/"
//!
//! [[sources]]
//! key = "example"
//! pages = ["https://example.com/list/1"]
//! parser = "text"
//! ```

use crate::crawl::registry::SourceConfig;
use crate::error::ConfigError;
use crate::pool::InitialScore;
use crate::proxy::StaticProxySupply;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default timeout for HTTP requests in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default pause between crawl passes in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 600;

pub const DEFAULT_POOL_KEY: &str = "proxy_pool";
pub const DEFAULT_INITIAL_SCORE: f64 = 10.0;
pub const DEFAULT_QUEUE_KEY: &str = "proxy_check_queue";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1/";

/// Whether the polling loop repeats or stops after one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Continuous,
    SinglePass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerSettings {
    pub mode: RunMode,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            mode: RunMode::Continuous,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl CrawlerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStrategy {
    #[default]
    Fixed,
    DiscoveryTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolBackend {
    #[default]
    Redis,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub key: String,
    pub initial_score: f64,
    pub score_strategy: ScoreStrategy,
    pub backend: PoolBackend,
    pub url: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            key: DEFAULT_POOL_KEY.to_string(),
            initial_score: DEFAULT_INITIAL_SCORE,
            score_strategy: ScoreStrategy::Fixed,
            backend: PoolBackend::Redis,
            url: DEFAULT_REDIS_URL.to_string(),
        }
    }
}

impl PoolSettings {
    pub fn initial_score(&self) -> InitialScore {
        match self.score_strategy {
            ScoreStrategy::Fixed => InitialScore::Fixed(self.initial_score),
            ScoreStrategy::DiscoveryTime => InitialScore::DiscoveryTime,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardKind {
    #[default]
    Redis,
    Log,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardSettings {
    pub kind: ForwardKind,
    pub url: String,
    pub queue_key: String,
}

impl Default for ForwardSettings {
    fn default() -> Self {
        Self {
            kind: ForwardKind::Redis,
            url: DEFAULT_REDIS_URL.to_string(),
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyKind {
    #[default]
    None,
    Static,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySupplySettings {
    pub kind: SupplyKind,
    /// Proxy lines for the static supply
    pub proxies: Vec<String>,
    pub url: String,
    /// Sorted set holding validated proxies
    pub key: String,
    /// Lowest score counted as healthy
    pub min_score: f64,
}

impl Default for ProxySupplySettings {
    fn default() -> Self {
        Self {
            kind: SupplyKind::None,
            proxies: Vec::new(),
            url: DEFAULT_REDIS_URL.to_string(),
            key: DEFAULT_POOL_KEY.to_string(),
            min_score: 50.0,
        }
    }
}

/// Full application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub crawler: CrawlerSettings,
    #[serde(default)]
    pub pool: PoolSettings,
    #[serde(default)]
    pub forward: ForwardSettings,
    #[serde(default)]
    pub proxy_supply: ProxySupplySettings,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Settings {
    /// Read, parse and validate a TOML settings file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crawler.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "crawler.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.crawler.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "crawler.poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.pool.key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "pool.key must not be empty".to_string(),
            ));
        }
        if !self.pool.initial_score.is_finite() {
            return Err(ConfigError::Validation(
                "pool.initial_score must be a finite number".to_string(),
            ));
        }
        if self.proxy_supply.kind == SupplyKind::Static {
            StaticProxySupply::from_lines(&self.proxy_supply.proxies)?;
        }
        for source in &self.sources {
            source.validate()?;
        }
        Ok(())
    }
}
