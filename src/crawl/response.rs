//! Fetched page wrapper and parser output records

use crate::proxy::Proxy;
use anyhow::anyhow;
use once_cell::sync::OnceCell;
use scraper::{ElementRef, Html, Selector};
use serde::de::DeserializeOwned;

/// A fetched page: body text plus the URL it came from
///
/// The JSON and HTML views are derived from the text on demand.
#[derive(Debug)]
pub struct RawResponse {
    text: String,
    url: String,
    json: OnceCell<serde_json::Value>,
}

impl RawResponse {
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
            json: OnceCell::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Body decoded as JSON, cached after the first successful decode
    pub fn json(&self) -> serde_json::Result<&serde_json::Value> {
        self.json.get_or_try_init(|| serde_json::from_str(&self.text))
    }

    pub fn json_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.text)
    }

    /// Text content of every element matching a CSS selector
    pub fn select(&self, css: &str) -> anyhow::Result<Vec<String>> {
        let selector = parse_selector(css)?;
        let document = Html::parse_document(&self.text);
        Ok(document.select(&selector).map(element_text).collect())
    }

    /// Rows matched by `row_css`, each split into the text of its `cell_css` children
    pub fn select_rows(&self, row_css: &str, cell_css: &str) -> anyhow::Result<Vec<Vec<String>>> {
        let rows = parse_selector(row_css)?;
        let cells = parse_selector(cell_css)?;
        let document = Html::parse_document(&self.text);
        Ok(document
            .select(&rows)
            .map(|row| row.select(&cells).map(element_text).collect())
            .collect())
    }
}

pub(crate) fn parse_selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{}': {:?}", css, e))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// One record produced by a parser
///
/// Only [`Extracted::Candidate`] records reach the pool; everything else a
/// parser yields (header rows, ads, malformed entries) is ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Candidate(Proxy),
    Noise(String),
}

impl Extracted {
    /// Canonical `host:port` address for candidates
    pub fn address(&self) -> Option<String> {
        match self {
            Extracted::Candidate(proxy) => Some(proxy.address()),
            Extracted::Noise(_) => None,
        }
    }
}

impl From<Proxy> for Extracted {
    fn from(proxy: Proxy) -> Self {
        Extracted::Candidate(proxy)
    }
}
