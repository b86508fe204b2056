//! Crawl engine: polling loop, per-source page walk, fetch and parse
//!
//! One logical task drives everything: sources are visited one after the
//! other in registration order, pages in configured order, so pacing and
//! retry budgets apply to strictly sequential page visits.

use crate::config::{CrawlerSettings, RunMode};
use crate::crawl::pacing::{Sleeper, TokioSleeper};
use crate::crawl::registry::{ParserRegistry, SiteRegistry, SourceConfig};
use crate::crawl::response::{Extracted, RawResponse};
use crate::crawl::retry::RetryPolicy;
use crate::crawl::session::SourceSession;
use crate::error::{ConfigError, CrawlError};
use crate::pool::ResultSink;
use crate::proxy::ProxySupply;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default page limit for [`CrawlEngine::test_crawl`]
pub const DEFAULT_TEST_PAGE_LIMIT: usize = 3;

/// Where parsed candidates go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Deduplicate into the pool and forward new addresses
    Pool,
    /// Log only; nothing touches the pool
    Display,
}

/// What one successfully fetched page produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOutcome {
    pub candidates: usize,
    pub new_addresses: usize,
}

/// Result of visiting one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    pub pages_fetched: usize,
    pub pages_skipped: usize,
    pub candidates: usize,
    pub new_addresses: usize,
    /// Set when the source could not be visited at all
    pub error: Option<String>,
}

impl SourceReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Default::default()
        }
    }

    fn failure(source: &str, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(source)
        }
    }

    fn record(&mut self, outcome: PageOutcome) {
        self.pages_fetched += 1;
        self.candidates += outcome.candidates;
        self.new_addresses += outcome.new_addresses;
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of one pass over every enabled source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub sources: Vec<SourceReport>,
}

impl PassReport {
    pub fn new_addresses(&self) -> usize {
        self.sources.iter().map(|s| s.new_addresses).sum()
    }

    pub fn pages_skipped(&self) -> usize {
        self.sources.iter().map(|s| s.pages_skipped).sum()
    }

    pub fn source(&self, key: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == key)
    }
}

/// Orchestrates crawling of all registered sources
pub struct CrawlEngine {
    settings: CrawlerSettings,
    sites: SiteRegistry,
    parsers: ParserRegistry,
    sink: ResultSink,
    proxies: Option<Arc<dyn ProxySupply>>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryPolicy,
}

impl CrawlEngine {
    pub fn new(
        settings: CrawlerSettings,
        sites: SiteRegistry,
        parsers: ParserRegistry,
        sink: ResultSink,
    ) -> Self {
        Self {
            settings,
            sites,
            parsers,
            sink,
            proxies: None,
            sleeper: Arc::new(TokioSleeper),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_proxy_supply(mut self, proxies: Arc<dyn ProxySupply>) -> Self {
        self.proxies = Some(proxies);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn sites(&self) -> &SiteRegistry {
        &self.sites
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    /// Polling loop
    ///
    /// Runs a pass, then sleeps for the poll interval and repeats. In
    /// single-pass mode it returns after the first pass. Only
    /// non-retryable errors end the loop early.
    pub async fn run(&self) -> Result<(), CrawlError> {
        loop {
            debug!("crawl task loop");
            let report = self.crawl_pass().await?;
            info!(
                sources = report.sources.len(),
                new_addresses = report.new_addresses(),
                pages_skipped = report.pages_skipped(),
                "crawl pass finished"
            );
            if self.settings.mode == RunMode::SinglePass {
                return Ok(());
            }
            self.sleeper.sleep(self.settings.poll_interval()).await;
        }
    }

    /// Visit every enabled source once, in registration order
    pub async fn crawl_pass(&self) -> Result<PassReport, CrawlError> {
        let mut report = PassReport::default();
        for source in self.sites.enabled_sources() {
            report
                .sources
                .push(self.visit_source(source, 0, Delivery::Pool).await?);
        }
        Ok(report)
    }

    /// Visit one source, optionally stopping after `page_limit` pages (0 = all)
    pub async fn crawl_source(
        &self,
        source: &SourceConfig,
        page_limit: usize,
    ) -> Result<SourceReport, CrawlError> {
        self.visit_source(source, page_limit, Delivery::Pool).await
    }

    /// Crawl the first pages of one source and log what its parser finds,
    /// without touching the pool.
    pub async fn test_crawl(
        &self,
        key: &str,
        page_limit: usize,
    ) -> Result<SourceReport, CrawlError> {
        let source = self
            .sites
            .get(key)
            .ok_or_else(|| ConfigError::UnknownSource(key.to_string()))?;
        self.visit_source(source, page_limit, Delivery::Display).await
    }

    async fn visit_source(
        &self,
        source: &SourceConfig,
        page_limit: usize,
        delivery: Delivery,
    ) -> Result<SourceReport, CrawlError> {
        source.validate()?;
        let session = match SourceSession::open(source, self.settings.request_timeout()) {
            Ok(session) => session,
            Err(e) => {
                error!(source = %source.key, error = %e, "failed to open http session");
                return Ok(SourceReport::failure(&source.key, e.to_string()));
            }
        };

        let pages = match page_limit {
            0 => &source.pages[..],
            limit => &source.pages[..limit.min(source.pages.len())],
        };

        let mut report = SourceReport::new(&source.key);
        let interval = source.page_interval();

        for page in pages {
            let session_ref = &session;
            let result = self
                .retry
                .run(page, move |attempt| {
                    debug!(source = %source.key, url = %page, attempt, "fetching page");
                    self.fetch_and_parse(session_ref, page, source, delivery)
                })
                .await;

            let aborted = match result {
                Ok(outcome) => {
                    report.record(outcome);
                    None
                }
                Err(e @ CrawlError::RetryExhausted { .. }) => {
                    warn!(source = %source.key, error = %e, "max retry, skipping page");
                    report.pages_skipped += 1;
                    None
                }
                Err(e) => {
                    error!(source = %source.key, url = %page, error = %e, "crawl aborted");
                    Some(e)
                }
            };

            if !interval.is_zero() {
                self.sleeper.sleep(interval).await;
            }
            if let Some(e) = aborted {
                return Err(e);
            }
        }

        Ok(report)
    }

    /// Fetch one page and route its parsed candidates
    ///
    /// Only fetch failures surface as errors; parse and pool failures are
    /// logged here and end the page with zero candidates.
    async fn fetch_and_parse(
        &self,
        session: &SourceSession,
        url: &str,
        source: &SourceConfig,
        delivery: Delivery,
    ) -> Result<PageOutcome, CrawlError> {
        let response = self.fetch(session, url, source).await.map_err(|e| {
            error!(url, error = %e, "get page error");
            e
        })?;
        Ok(self.parse_and_route(source, response, delivery).await)
    }

    async fn fetch(
        &self,
        session: &SourceSession,
        url: &str,
        source: &SourceConfig,
    ) -> Result<RawResponse, CrawlError> {
        let proxy = match (&self.proxies, source.use_proxy) {
            (Some(supply), true) => supply
                .random_proxy(url.starts_with("https"))
                .await
                .map_err(|e| CrawlError::fetch(url, e))?,
            _ => None,
        };
        if let Some(proxy) = &proxy {
            debug!(url, proxy = %proxy, "fetching through proxy");
        }

        let client = session
            .client_for(proxy.as_ref())
            .map_err(|e| CrawlError::fetch(url, e))?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| CrawlError::fetch(url, e))?;
        let text = response
            .text()
            .await
            .map_err(|e| CrawlError::fetch(url, e))?;

        if text.is_empty() {
            return Err(CrawlError::EmptyResponse {
                url: url.to_string(),
            });
        }
        Ok(RawResponse::new(text, url))
    }

    async fn parse_and_route(
        &self,
        source: &SourceConfig,
        response: RawResponse,
        delivery: Delivery,
    ) -> PageOutcome {
        let Some(parser) = self.parsers.get(&source.key) else {
            return PageOutcome::default();
        };

        let items: Vec<Extracted> = match catch_unwind(AssertUnwindSafe(|| parser(&response))) {
            Ok(Ok(items)) => items,
            Ok(Err(e)) => {
                error!(source = %source.key, url = response.url(), error = %e, "parse error");
                return PageOutcome::default();
            }
            Err(_) => {
                error!(source = %source.key, url = response.url(), "parser panicked");
                return PageOutcome::default();
            }
        };

        let addresses: Vec<String> = items.iter().filter_map(Extracted::address).collect();
        let mut outcome = PageOutcome {
            candidates: addresses.len(),
            new_addresses: 0,
        };

        match delivery {
            Delivery::Display => {
                info!(url = response.url(), "parsed page");
                for address in &addresses {
                    info!(address = %address, "got candidate");
                }
            }
            Delivery::Pool if addresses.is_empty() => {}
            Delivery::Pool => {
                info!(source = %source.key, count = addresses.len(), "got candidates");
                match self.sink.push(addresses).await {
                    Ok(fresh) => outcome.new_addresses = fresh,
                    Err(e) => error!(
                        source = %source.key,
                        url = response.url(),
                        error = %e,
                        "pool update failed"
                    ),
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{ChannelSubmitter, InitialScore, MemoryPool};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        calls: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.calls.lock().await.push(duration);
        }
    }

    fn engine(sites: SiteRegistry, parsers: ParserRegistry, mode: RunMode) -> CrawlEngine {
        let (submitter, _receiver) = ChannelSubmitter::new();
        let sink = ResultSink::new(
            Arc::new(MemoryPool::new()),
            Arc::new(submitter),
            "proxy_pool",
            InitialScore::Fixed(10.0),
        );
        let settings = CrawlerSettings {
            mode,
            request_timeout_secs: 1,
            poll_interval_secs: 60,
        };
        CrawlEngine::new(settings, sites, parsers, sink)
    }

    #[tokio::test]
    async fn test_single_pass_stops_without_poll_sleep() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let engine = engine(SiteRegistry::new(), ParserRegistry::new(), RunMode::SinglePass)
            .with_sleeper(sleeper.clone());
        engine.run().await.unwrap();
        assert!(sleeper.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_test_crawl_source() {
        let engine = engine(SiteRegistry::new(), ParserRegistry::new(), RunMode::SinglePass);
        assert!(matches!(
            engine.test_crawl("missing", DEFAULT_TEST_PAGE_LIMIT).await,
            Err(CrawlError::Config(ConfigError::UnknownSource(_)))
        ));
    }

    #[tokio::test]
    async fn test_malformed_source_aborts_instead_of_skipping() {
        let engine = engine(SiteRegistry::new(), ParserRegistry::new(), RunMode::SinglePass);
        let source = SourceConfig::new("bad", vec!["gopher://bad.test/list"]);
        assert!(matches!(
            engine.crawl_source(&source, 0).await,
            Err(CrawlError::Config(ConfigError::InvalidUrl { .. }))
        ));
    }

    #[tokio::test]
    async fn test_parse_without_parser_is_noop() {
        let engine = engine(SiteRegistry::new(), ParserRegistry::new(), RunMode::SinglePass);
        let source = SourceConfig::new("none", vec!["http://none.test"]);
        let outcome = engine
            .parse_and_route(
                &source,
                RawResponse::new("1.2.3.4:80", "http://none.test"),
                Delivery::Pool,
            )
            .await;
        assert_eq!(outcome, PageOutcome::default());
    }

    #[tokio::test]
    async fn test_panicking_parser_yields_nothing() {
        let mut parsers = ParserRegistry::new();
        parsers.register_parser("boom", |_| panic!("bad parser"));
        let engine = engine(SiteRegistry::new(), parsers, RunMode::SinglePass);
        let source = SourceConfig::new("boom", vec!["http://boom.test"]);
        let outcome = engine
            .parse_and_route(
                &source,
                RawResponse::new("1.2.3.4:80", "http://boom.test"),
                Delivery::Pool,
            )
            .await;
        assert_eq!(outcome, PageOutcome::default());
    }

    #[tokio::test]
    async fn test_display_delivery_never_pools() {
        let mut parsers = ParserRegistry::new();
        parsers.register_parser("show", |resp| {
            Ok(crate::proxy::ProxyParser::parse_text(resp.text(), Default::default())
                .into_iter()
                .map(Extracted::from)
                .collect())
        });
        let engine = engine(SiteRegistry::new(), parsers, RunMode::SinglePass);
        let source = SourceConfig::new("show", vec!["http://show.test"]);
        let outcome = engine
            .parse_and_route(
                &source,
                RawResponse::new("1.2.3.4:80\n5.6.7.8:81", "http://show.test"),
                Delivery::Display,
            )
            .await;
        assert_eq!(
            outcome,
            PageOutcome {
                candidates: 2,
                new_addresses: 0
            }
        );
    }

    #[test]
    fn test_pass_report_totals() {
        let report = PassReport {
            sources: vec![
                SourceReport {
                    source: "a".to_string(),
                    new_addresses: 2,
                    pages_skipped: 1,
                    ..Default::default()
                },
                SourceReport::failure("b", "boom".to_string()),
            ],
        };
        assert_eq!(report.new_addresses(), 2);
        assert_eq!(report.pages_skipped(), 1);
        assert!(report.source("a").unwrap().is_success());
        assert!(!report.source("b").unwrap().is_success());
    }
}
