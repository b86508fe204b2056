//! Built-in parser kinds and registry bootstrap from settings
//!
//! A source picks its parser with `parser = "<kind>"` and tunes it with
//! extra keys in its `[[sources]]` table:
//!
//! | kind    | keys                                                        |
//! |---------|-------------------------------------------------------------|
//! | `text`  | `proxy_type`                                                |
//! | `regex` | `pattern` (named groups `host`, `port`), `proxy_type`       |
//! | `table` | `row`, `cell`, `host_col`, `port_col`, `proxy_type`         |
//! | `json`  | `items` (JSON pointer), `host_field`, `port_field`, `proxy_type` |

use crate::config::Settings;
use crate::crawl::registry::{ParserRegistry, SiteRegistry, SourceConfig};
use crate::crawl::response::{parse_selector, Extracted, RawResponse};
use crate::error::ConfigError;
use crate::proxy::{ProxyParser, ProxyType};
use anyhow::anyhow;
use regex::Regex;

const DEFAULT_ROW_SELECTOR: &str = "table tbody tr";
const DEFAULT_CELL_SELECTOR: &str = "td";

/// Build both registries from the `[[sources]]` tables
pub fn build_registries(
    settings: &Settings,
) -> Result<(SiteRegistry, ParserRegistry), ConfigError> {
    let mut sites = SiteRegistry::new();
    let mut parsers = ParserRegistry::new();

    for source in &settings.sources {
        sites.register(source.clone())?;
        if let Some(kind) = &source.parser {
            bind_parser(&mut parsers, source, kind)?;
        }
    }

    Ok((sites, parsers))
}

fn invalid(source: &SourceConfig, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidPattern {
        source_key: source.key.clone(),
        message: message.into(),
    }
}

fn proxy_type(source: &SourceConfig) -> Result<ProxyType, ConfigError> {
    match source.extra_str("proxy_type") {
        Some(name) => name.parse().map_err(|e: anyhow::Error| invalid(source, e.to_string())),
        None => Ok(ProxyType::Http),
    }
}

/// Bind the built-in parser `kind` to `source`
pub fn bind_parser(
    parsers: &mut ParserRegistry,
    source: &SourceConfig,
    kind: &str,
) -> Result<(), ConfigError> {
    let proxy_type = proxy_type(source)?;

    match kind {
        "text" => {
            parsers.register_parser(&source.key, move |resp| {
                Ok(ProxyParser::parse_text(resp.text(), proxy_type.clone())
                    .into_iter()
                    .map(Extracted::from)
                    .collect())
            });
        }
        "regex" => {
            let pattern = source
                .extra_str("pattern")
                .ok_or_else(|| invalid(source, "regex parser needs a `pattern`"))?;
            let regex = Regex::new(pattern).map_err(|e| invalid(source, e.to_string()))?;
            let names: Vec<_> = regex.capture_names().flatten().collect();
            if !names.contains(&"host") || !names.contains(&"port") {
                return Err(invalid(source, "pattern needs named groups `host` and `port`"));
            }
            parsers.register_parser(&source.key, move |resp| {
                Ok(parse_with_regex(&regex, resp, &proxy_type))
            });
        }
        "table" => {
            let row = source.extra_str("row").unwrap_or(DEFAULT_ROW_SELECTOR).to_string();
            let cell = source.extra_str("cell").unwrap_or(DEFAULT_CELL_SELECTOR).to_string();
            parse_selector(&row).map_err(|e| invalid(source, e.to_string()))?;
            parse_selector(&cell).map_err(|e| invalid(source, e.to_string()))?;
            let host_col = source.extra_usize("host_col").unwrap_or(0);
            let port_col = source.extra_usize("port_col").unwrap_or(1);
            parsers.register_parser(&source.key, move |resp| {
                let rows = resp.select_rows(&row, &cell)?;
                Ok(rows
                    .into_iter()
                    .map(|cells| table_row(cells, host_col, port_col, &proxy_type))
                    .collect())
            });
        }
        "json" => {
            let items = source.extra_str("items").unwrap_or("").to_string();
            if !items.is_empty() && !items.starts_with('/') {
                return Err(invalid(source, "`items` must be a JSON pointer like /data"));
            }
            let host_field = source.extra_str("host_field").unwrap_or("ip").to_string();
            let port_field = source.extra_str("port_field").unwrap_or("port").to_string();
            parsers.register_parser(&source.key, move |resp| {
                let root = resp.json()?;
                let list = root
                    .pointer(&items)
                    .and_then(serde_json::Value::as_array)
                    .ok_or_else(|| anyhow!("no array at '{}' in {}", items, resp.url()))?;
                Ok(list
                    .iter()
                    .map(|item| json_item(item, &host_field, &port_field, &proxy_type))
                    .collect())
            });
        }
        other => {
            return Err(ConfigError::UnknownParser {
                source_key: source.key.clone(),
                kind: other.to_string(),
            })
        }
    }

    Ok(())
}

fn parse_with_regex(regex: &Regex, resp: &RawResponse, proxy_type: &ProxyType) -> Vec<Extracted> {
    regex
        .captures_iter(resp.text())
        .map(|caps| {
            let host = caps.name("host").map_or("", |m| m.as_str());
            let port = caps.name("port").map_or("", |m| m.as_str());
            match ProxyParser::from_parts(host, port, proxy_type.clone()) {
                Some(proxy) => Extracted::Candidate(proxy),
                None => Extracted::Noise(caps[0].to_string()),
            }
        })
        .collect()
}

fn table_row(
    cells: Vec<String>,
    host_col: usize,
    port_col: usize,
    proxy_type: &ProxyType,
) -> Extracted {
    let proxy = match (cells.get(host_col), cells.get(port_col)) {
        (Some(host), Some(port)) => ProxyParser::from_parts(host, port, proxy_type.clone()),
        _ => None,
    };
    match proxy {
        Some(proxy) => Extracted::Candidate(proxy),
        None => Extracted::Noise(cells.join(" | ")),
    }
}

fn json_item(
    item: &serde_json::Value,
    host_field: &str,
    port_field: &str,
    proxy_type: &ProxyType,
) -> Extracted {
    let host = item.get(host_field).and_then(serde_json::Value::as_str);
    let port = match item.get(port_field) {
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        _ => None,
    };
    match (host, port) {
        (Some(host), Some(port)) => match ProxyParser::from_parts(host, &port, proxy_type.clone()) {
            Some(proxy) => Extracted::Candidate(proxy),
            None => Extracted::Noise(item.to_string()),
        },
        _ => Extracted::Noise(item.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &SourceConfig, body: &str) -> anyhow::Result<Vec<Extracted>> {
        let mut parsers = ParserRegistry::new();
        bind_parser(&mut parsers, source, source.parser.as_deref().unwrap()).unwrap();
        let parser = parsers.get(&source.key).unwrap();
        parser(&RawResponse::new(body, "http://site.test/1"))
    }

    fn addresses(items: &[Extracted]) -> Vec<String> {
        items.iter().filter_map(Extracted::address).collect()
    }

    #[test]
    fn test_text_parser() {
        let source = SourceConfig::new("t", vec!["http://site.test/1"]).with_parser("text");
        let items = run(&source, "<pre>1.2.3.4:8080\n1.2.3.4:8080 and 5.6.7.8:3128</pre>").unwrap();
        assert_eq!(addresses(&items), vec!["1.2.3.4:8080", "5.6.7.8:3128"]);
    }

    #[test]
    fn test_regex_parser() {
        let source = SourceConfig::new("r", vec!["http://site.test/1"])
            .with_parser("regex")
            .with_extra("pattern", r"ip=(?P<host>[\d.]+) port=(?P<port>\d+)");
        let items = run(&source, "ip=1.2.3.4 port=80\nip=5.6.7.8 port=99999").unwrap();
        assert_eq!(addresses(&items), vec!["1.2.3.4:80"]);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_regex_parser_requires_groups() {
        let mut parsers = ParserRegistry::new();
        let source = SourceConfig::new("r", vec!["http://site.test/1"])
            .with_extra("pattern", r"(\d+):(\d+)");
        assert!(matches!(
            bind_parser(&mut parsers, &source, "regex"),
            Err(ConfigError::InvalidPattern { .. })
        ));
        let broken = SourceConfig::new("r", vec!["http://site.test/1"]).with_extra("pattern", "(");
        assert!(bind_parser(&mut parsers, &broken, "regex").is_err());
    }

    #[test]
    fn test_table_parser_skips_header_rows() {
        let source = SourceConfig::new("tb", vec!["http://site.test/1"])
            .with_parser("table")
            .with_extra("row", "tr")
            .with_extra("host_col", 1i64)
            .with_extra("port_col", 2i64)
            .with_extra("proxy_type", "socks5");
        let html = r#"<table>
<tr><td>#</td><td>IP</td><td>Port</td></tr>
<tr><td>1</td><td>1.2.3.4</td><td>1080</td></tr>
<tr><td>2</td><td>5.6.7.8</td></tr>
</table>"#;
        let items = run(&source, html).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(addresses(&items), vec!["1.2.3.4:1080"]);
        match &items[1] {
            Extracted::Candidate(proxy) => assert_eq!(proxy.proxy_type, ProxyType::Socks5),
            other => panic!("expected candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_json_parser() {
        let source = SourceConfig::new("j", vec!["http://site.test/1"])
            .with_parser("json")
            .with_extra("items", "/data")
            .with_extra("port_field", "p");
        let body = r#"{"data":[{"ip":"1.2.3.4","p":80},{"ip":"5.6.7.8","p":"3128"},{"ip":"x"}]}"#;
        let items = run(&source, body).unwrap();
        assert_eq!(addresses(&items), vec!["1.2.3.4:80", "5.6.7.8:3128"]);
        assert_eq!(items.len(), 3);

        assert!(run(&source, "not json").is_err());
        assert!(run(&source, r#"{"other":[]}"#).is_err());
    }

    #[test]
    fn test_unknown_kind_and_bad_proxy_type() {
        let mut parsers = ParserRegistry::new();
        let source = SourceConfig::new("u", vec!["http://site.test/1"]);
        assert!(matches!(
            bind_parser(&mut parsers, &source, "xpath"),
            Err(ConfigError::UnknownParser { .. })
        ));
        let typed = source.clone().with_extra("proxy_type", "ftp");
        assert!(bind_parser(&mut parsers, &typed, "text").is_err());
        assert!(!parsers.contains("u"));
    }

    #[test]
    fn test_build_registries() {
        let settings = Settings::from_toml_str(
            r#"
[[sources]]
key = "a"
pages = ["http://a.test/1"]
parser = "text"

[[sources]]
key = "b"
pages = ["http://b.test/1"]
"#,
        )
        .unwrap();
        let (sites, parsers) = build_registries(&settings).unwrap();
        assert_eq!(sites.len(), 2);
        assert!(parsers.contains("a"));
        assert!(!parsers.contains("b"));
    }

    #[test]
    fn test_build_registries_rejects_duplicate_keys() {
        let settings = Settings::from_toml_str(
            r#"
[[sources]]
key = "a"
pages = ["http://a.test/1"]

[[sources]]
key = "a"
pages = ["http://a.test/2"]
"#,
        )
        .unwrap();
        assert!(matches!(
            build_registries(&settings),
            Err(ConfigError::DuplicateSource(_))
        ));
    }
}
