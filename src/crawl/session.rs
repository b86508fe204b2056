//! Per-source HTTP session

use crate::crawl::registry::SourceConfig;
use crate::proxy::Proxy;
use crate::Result;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

/// Browser-like user agent with a randomised Chrome major version
pub fn random_user_agent() -> String {
    let major = rand::thread_rng().gen_range(70..=76);
    format!(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_5) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/{}.0.3770.80 Safari/537.36",
        major
    )
}

/// Default headers with the source's own headers merged over them
pub fn merged_headers(source: &SourceConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_str(&random_user_agent())?);
    for (name, value) in &source.headers {
        headers.insert(
            HeaderName::from_bytes(name.as_bytes())?,
            HeaderValue::from_str(value)?,
        );
    }
    Ok(headers)
}

/// HTTP session owned by one source visit
///
/// Every request carries the merged headers and the fixed timeout. Dropping
/// the session releases its connection pool.
pub struct SourceSession {
    headers: HeaderMap,
    timeout: Duration,
    direct: Client,
}

impl SourceSession {
    pub fn open(source: &SourceConfig, timeout: Duration) -> Result<Self> {
        let headers = merged_headers(source)?;
        let direct = Self::builder(&headers, timeout).build()?;
        Ok(Self {
            headers,
            timeout,
            direct,
        })
    }

    fn builder(headers: &HeaderMap, timeout: Duration) -> reqwest::ClientBuilder {
        Client::builder()
            .default_headers(headers.clone())
            .timeout(timeout)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Client for one request, routed through `proxy` when given
    pub fn client_for(&self, proxy: Option<&Proxy>) -> Result<Client> {
        match proxy {
            None => Ok(self.direct.clone()),
            Some(proxy) => Ok(Self::builder(&self.headers, self.timeout)
                .proxy(proxy.to_reqwest()?)
                .build()?),
        }
    }
}
