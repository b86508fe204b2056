//! Crawl engine and its building blocks
//!
//! - `registry`: source configuration and parser bindings
//! - `response`: fetched page wrapper and parser output
//! - `retry`: bounded retry for page visits
//! - `session`: per-source HTTP client
//! - `pacing`: pluggable sleeping
//! - `engine`: the polling loop that ties everything together

pub mod engine;
pub mod pacing;
pub mod registry;
pub mod response;
pub mod retry;
pub mod session;

pub use engine::{
    CrawlEngine, Delivery, PageOutcome, PassReport, SourceReport, DEFAULT_TEST_PAGE_LIMIT,
};
pub use pacing::{Sleeper, TokioSleeper};
pub use registry::{ParseFn, ParserRegistry, SiteRegistry, SourceConfig};
pub use response::{Extracted, RawResponse};
pub use retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use session::SourceSession;
