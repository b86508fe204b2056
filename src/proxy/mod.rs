//! Proxy models, listing parsers and proxy supply
//!
//! This module provides functionality for:
//! - Representing proxy endpoints (IP:PORT, IP:PORT:USER:PASS, etc.)
//! - Parsing proxies out of listing text
//! - Supplying random healthy proxies for fetching through

pub mod models;
pub mod parser;
pub mod supply;

pub use models::{Proxy, ProxyAuth, ProxyType};
pub use parser::ProxyParser;
pub use supply::{ProxySupply, RedisProxySupply, StaticProxySupply};

use crate::config::{ProxySupplySettings, SupplyKind};
use crate::Result;
use std::sync::Arc;

/// Open the proxy supply named in the settings, `None` when disabled
pub async fn open_supply(settings: &ProxySupplySettings) -> Result<Option<Arc<dyn ProxySupply>>> {
    let supply: Arc<dyn ProxySupply> = match settings.kind {
        SupplyKind::None => return Ok(None),
        SupplyKind::Static => Arc::new(StaticProxySupply::from_lines(&settings.proxies)?),
        SupplyKind::Redis => Arc::new(
            RedisProxySupply::connect(&settings.url, &settings.key, settings.min_score).await?,
        ),
    };
    Ok(Some(supply))
}
