//! Proxy supply used when a source must be fetched through a proxy

use crate::error::ConfigError;
use crate::proxy::models::{Proxy, ProxyType};
use crate::proxy::parser::ProxyParser;
use crate::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use redis::AsyncCommands;

/// Hands out a random currently-healthy proxy
#[async_trait]
pub trait ProxySupply: Send + Sync {
    /// Pick a proxy, preferring HTTPS-capable ones when `prefer_secure` is set.
    ///
    /// `Ok(None)` means no proxy is available right now and the caller should
    /// fetch directly.
    async fn random_proxy(&self, prefer_secure: bool) -> Result<Option<Proxy>>;
}

/// Choose from `candidates`, narrowing to HTTPS-capable proxies if asked and
/// any exist.
fn choose(candidates: &[Proxy], prefer_secure: bool) -> Option<Proxy> {
    let mut rng = rand::thread_rng();
    if prefer_secure {
        let secure: Vec<&Proxy> = candidates.iter().filter(|p| p.supports_https()).collect();
        if let Some(proxy) = secure.choose(&mut rng) {
            return Some((*proxy).clone());
        }
    }
    candidates.choose(&mut rng).cloned()
}

/// A fixed list of proxies from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticProxySupply {
    proxies: Vec<Proxy>,
}

impl StaticProxySupply {
    pub fn new(proxies: Vec<Proxy>) -> Self {
        Self { proxies }
    }

    /// Parse each entry with [`ProxyParser::parse_line`]
    ///
    /// Blank and `#` comment lines are skipped; any other line that does not
    /// parse is a configuration error.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> std::result::Result<Self, ConfigError> {
        let mut proxies = Vec::new();
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let proxy = ProxyParser::parse_line(line, ProxyType::Http)
                .ok_or_else(|| ConfigError::InvalidProxy(line.to_string()))?;
            proxies.push(proxy);
        }
        Ok(Self { proxies })
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

#[async_trait]
impl ProxySupply for StaticProxySupply {
    async fn random_proxy(&self, prefer_secure: bool) -> Result<Option<Proxy>> {
        Ok(choose(&self.proxies, prefer_secure))
    }
}

/// Draws from a Redis sorted set of validated proxies
///
/// Members are proxy lines (`host:port` or `scheme://host:port`) and only
/// members scored at or above `min_score` count as healthy.
pub struct RedisProxySupply {
    connection: redis::aio::MultiplexedConnection,
    key: String,
    min_score: f64,
}

impl RedisProxySupply {
    pub async fn connect(url: &str, key: &str, min_score: f64) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            connection,
            key: key.to_string(),
            min_score,
        })
    }
}

#[async_trait]
impl ProxySupply for RedisProxySupply {
    async fn random_proxy(&self, prefer_secure: bool) -> Result<Option<Proxy>> {
        let mut con = self.connection.clone();
        let members: Vec<String> = con
            .zrangebyscore(&self.key, self.min_score, "+inf")
            .await?;
        let candidates: Vec<Proxy> = members
            .iter()
            .filter_map(|m| ProxyParser::parse_line(m, ProxyType::Http))
            .collect();
        Ok(choose(&candidates, prefer_secure))
    }
}
