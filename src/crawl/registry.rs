//! Source configuration and parser bindings, filled once at bootstrap

use crate::crawl::response::{Extracted, RawResponse};
use crate::error::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

fn default_enabled() -> bool {
    true
}

/// Declarative description of one proxy listing site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source identifier
    pub key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Pages visited in order on every pass
    #[serde(default)]
    pub pages: Vec<String>,
    /// Request headers merged over the engine defaults
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Fetch through a proxy from the configured supply
    #[serde(default)]
    pub use_proxy: bool,
    /// Delay after each page, in seconds
    #[serde(default)]
    pub page_interval_secs: f64,
    /// Built-in parser kind bound to this source at bootstrap
    #[serde(default)]
    pub parser: Option<String>,
    /// Source-specific fields, read only by the source's parser
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl SourceConfig {
    pub fn new<S: Into<String>>(key: &str, pages: Vec<S>) -> Self {
        Self {
            key: key.to_string(),
            enabled: true,
            pages: pages.into_iter().map(Into::into).collect(),
            headers: BTreeMap::new(),
            use_proxy: false,
            page_interval_secs: 0.0,
            parser: None,
            extra: toml::Table::new(),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = use_proxy;
        self
    }

    pub fn with_page_interval(mut self, interval: Duration) -> Self {
        self.page_interval_secs = interval.as_secs_f64();
        self
    }

    pub fn with_parser(mut self, kind: &str) -> Self {
        self.parser = Some(kind.to_string());
        self
    }

    pub fn with_extra(mut self, name: &str, value: impl Into<toml::Value>) -> Self {
        self.extra.insert(name.to_string(), value.into());
        self
    }

    pub fn page_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.page_interval_secs).unwrap_or_default()
    }

    pub fn extra_str(&self, name: &str) -> Option<&str> {
        self.extra.get(name).and_then(toml::Value::as_str)
    }

    pub fn extra_usize(&self, name: &str) -> Option<usize> {
        self.extra
            .get(name)
            .and_then(toml::Value::as_integer)
            .and_then(|n| usize::try_from(n).ok())
    }

    /// Check the shape of the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source key must not be empty".to_string(),
            ));
        }

        for page in &self.pages {
            let valid = reqwest::Url::parse(page)
                .map(|url| matches!(url.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !valid {
                return Err(ConfigError::InvalidUrl {
                    source_key: self.key.clone(),
                    url: page.clone(),
                });
            }
        }

        if Duration::try_from_secs_f64(self.page_interval_secs).is_err() {
            return Err(ConfigError::Validation(format!(
                "source '{}': page_interval_secs must be a non-negative number of seconds",
                self.key
            )));
        }

        for (name, value) in &self.headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err()
                || HeaderValue::from_str(value).is_err()
            {
                return Err(ConfigError::Validation(format!(
                    "source '{}': invalid header '{}'",
                    self.key, name
                )));
            }
        }

        Ok(())
    }
}

/// All registered sources, in registration order
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sources: Vec<SourceConfig>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source; malformed or duplicate configuration is rejected
    pub fn register(&mut self, config: SourceConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if self.get(&config.key).is_some() {
            return Err(ConfigError::DuplicateSource(config.key));
        }
        self.sources.push(config);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter()
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Extraction function turning a fetched page into candidate records
pub type ParseFn = Arc<dyn Fn(&RawResponse) -> anyhow::Result<Vec<Extracted>> + Send + Sync>;

/// One parser per source key
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, ParseFn>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `parser` to `key`, replacing any earlier binding
    pub fn register_parser<F>(&mut self, key: &str, parser: F)
    where
        F: Fn(&RawResponse) -> anyhow::Result<Vec<Extracted>> + Send + Sync + 'static,
    {
        self.parsers.insert(key.to_string(), Arc::new(parser));
    }

    pub fn get(&self, key: &str) -> Option<&ParseFn> {
        self.parsers.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.parsers.contains_key(key)
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("keys", &self.parsers.keys().collect::<Vec<_>>())
            .finish()
    }
}
