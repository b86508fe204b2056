//! Proxy parser for listing text in the usual `host:port` shapes

use crate::proxy::models::{Proxy, ProxyType};
use once_cell::sync::Lazy;
use regex::Regex;

static URL_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?|socks[45])://(?:([^:]+):([^@]+)@)?([^:]+):(\d+)/?$")
        .expect("Invalid URL format regex")
});

static AUTH_AT_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^:]+):([^@]+)@([^:]+):(\d+)$").expect("Invalid auth format regex")
});

/// Regex pattern to match IP:PORT patterns anywhere in text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})\b")
        .expect("Invalid IP:PORT regex")
});

/// Hostnames and IPv4 literals only; rejects markup glued to an address
fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

/// Proxy parser for parsing proxies from listing text
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single proxy line
    ///
    /// Supports formats:
    /// - IP:PORT
    /// - IP:PORT:USER:PASS
    /// - USER:PASS@IP:PORT
    /// - scheme://IP:PORT
    /// - scheme://USER:PASS@IP:PORT
    pub fn parse_line(line: &str, default_type: ProxyType) -> Option<Proxy> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        if let Some(proxy) = Self::parse_url_format(line) {
            return Some(proxy);
        }

        if let Some(proxy) = Self::parse_auth_at_format(line, default_type.clone()) {
            return Some(proxy);
        }

        Self::parse_colon_format(line, default_type)
    }

    fn parse_url_format(line: &str) -> Option<Proxy> {
        let caps = URL_FORMAT.captures(line)?;

        let proxy_type = caps[1].parse().ok()?;
        let host = caps[4].to_string();
        let port: u16 = caps[5].parse().ok()?;

        match (caps.get(2), caps.get(3)) {
            (Some(user), Some(pass)) => Some(Proxy::with_auth(
                host,
                port,
                proxy_type,
                user.as_str().to_string(),
                pass.as_str().to_string(),
            )),
            _ => Some(Proxy::new(host, port, proxy_type)),
        }
    }

    fn parse_auth_at_format(line: &str, default_type: ProxyType) -> Option<Proxy> {
        let caps = AUTH_AT_FORMAT.captures(line)?;

        let username = caps[1].to_string();
        let password = caps[2].to_string();
        let host = caps[3].to_string();
        let port: u16 = caps[4].parse().ok()?;

        Some(Proxy::with_auth(host, port, default_type, username, password))
    }

    fn parse_colon_format(line: &str, default_type: ProxyType) -> Option<Proxy> {
        let parts: Vec<&str> = line.split(':').collect();

        if !is_valid_host(parts[0]) {
            return None;
        }

        match parts.len() {
            2 => {
                let port: u16 = parts[1].parse().ok()?;
                Some(Proxy::new(parts[0].to_string(), port, default_type))
            }
            4 => {
                let port: u16 = parts[1].parse().ok()?;
                Some(Proxy::with_auth(
                    parts[0].to_string(),
                    port,
                    default_type,
                    parts[2].to_string(),
                    parts[3].to_string(),
                ))
            }
            _ => None,
        }
    }

    /// Build a proxy from separately listed host and port cells
    pub fn from_parts(host: &str, port: &str, proxy_type: ProxyType) -> Option<Proxy> {
        let host = host.trim();
        let port: u16 = port.trim().parse().ok()?;
        if port == 0 || !is_valid_host(host) {
            return None;
        }
        Some(Proxy::new(host.to_string(), port, proxy_type))
    }

    /// Extract dotted-quad `IP:PORT` pairs embedded anywhere in text
    pub fn extract_with_regex(content: &str, proxy_type: ProxyType) -> Vec<Proxy> {
        IP_PORT_REGEX
            .captures_iter(content)
            .filter_map(|cap| {
                let host = cap.get(1)?.as_str();
                let port: u16 = cap.get(2)?.as_str().parse().ok()?;

                for part in host.split('.') {
                    let num: u32 = part.parse().ok()?;
                    if num > 255 {
                        return None;
                    }
                }

                if port == 0 {
                    return None;
                }

                Some(Proxy::new(host.to_string(), port, proxy_type.clone()))
            })
            .collect()
    }

    /// Parse proxies from raw listing text
    ///
    /// Line-by-line parsing is tried first; if no line parses, embedded
    /// `IP:PORT` pairs are extracted with a regex. Duplicates are removed
    /// keeping first-seen order.
    pub fn parse_text(content: &str, proxy_type: ProxyType) -> Vec<Proxy> {
        let mut proxies: Vec<Proxy> = content
            .lines()
            .filter_map(|line| Self::parse_line(line, proxy_type.clone()))
            .collect();

        if proxies.is_empty() {
            proxies = Self::extract_with_regex(content, proxy_type);
        }

        let mut seen = std::collections::HashSet::new();
        proxies.retain(|p| seen.insert(p.address()));
        proxies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_format() {
        let proxy = ProxyParser::parse_line("192.168.1.1:8080", ProxyType::Http).unwrap();
        assert_eq!(proxy.host, "192.168.1.1");
        assert_eq!(proxy.port, 8080);
        assert!(proxy.auth.is_none());
    }

    #[test]
    fn test_parse_with_auth_colon_format() {
        let proxy = ProxyParser::parse_line("192.168.1.1:8080:user:pass", ProxyType::Http).unwrap();
        let auth = proxy.auth.unwrap();
        assert_eq!(auth.username, "user");
        assert_eq!(auth.password, "pass");
    }

    #[test]
    fn test_parse_auth_at_format() {
        let proxy = ProxyParser::parse_line("user:pass@192.168.1.1:8080", ProxyType::Http).unwrap();
        assert_eq!(proxy.host, "192.168.1.1");
        assert_eq!(proxy.port, 8080);
        assert!(proxy.auth.is_some());
    }

    #[test]
    fn test_parse_url_format_socks5() {
        let proxy = ProxyParser::parse_line("socks5://192.168.1.1:1080", ProxyType::Http).unwrap();
        assert_eq!(proxy.port, 1080);
        assert_eq!(proxy.proxy_type, ProxyType::Socks5);
    }

    #[test]
    fn test_parse_comment_and_invalid() {
        assert!(ProxyParser::parse_line("", ProxyType::Http).is_none());
        assert!(ProxyParser::parse_line("# comment", ProxyType::Http).is_none());
        assert!(ProxyParser::parse_line("192.168.1.1", ProxyType::Http).is_none());
        assert!(ProxyParser::parse_line("192.168.1.1:abc", ProxyType::Http).is_none());
    }

    #[test]
    fn test_parse_rejects_markup_in_host() {
        assert!(ProxyParser::parse_line("<td>1.2.3.4:8080", ProxyType::Http).is_none());
        assert!(ProxyParser::parse_line("proxy.example.com:3128", ProxyType::Http).is_some());
    }

    #[test]
    fn test_from_parts() {
        let proxy = ProxyParser::from_parts(" 10.0.0.1 ", "3128\n", ProxyType::Http).unwrap();
        assert_eq!(proxy.address(), "10.0.0.1:3128");
        assert!(ProxyParser::from_parts("IP Address", "Port", ProxyType::Http).is_none());
        assert!(ProxyParser::from_parts("10.0.0.1", "0", ProxyType::Http).is_none());
    }

    #[test]
    fn test_extract_with_regex_rejects_invalid() {
        let content = "ok 192.168.1.1:8080, bad 999.1.1.1:80, zero 10.0.0.1:0";
        let proxies = ProxyParser::extract_with_regex(content, ProxyType::Http);
        assert_eq!(proxies.len(), 1);
        assert_eq!(proxies[0].address(), "192.168.1.1:8080");
    }

    #[test]
    fn test_parse_text_falls_back_to_regex() {
        let content = "<html><body>Some text with 10.0.0.1:3128 embedded</body></html>";
        let proxies = ProxyParser::parse_text(content, ProxyType::Http);
        assert_eq!(proxies.len(), 1);
        assert_eq!(proxies[0].address(), "10.0.0.1:3128");
    }

    #[test]
    fn test_parse_text_deduplicates_in_order() {
        let content = "192.168.1.2:3128\n192.168.1.1:8080\n192.168.1.2:3128\n";
        let proxies = ProxyParser::parse_text(content, ProxyType::Http);
        let addresses: Vec<_> = proxies.iter().map(Proxy::address).collect();
        assert_eq!(addresses, vec!["192.168.1.2:3128", "192.168.1.1:8080"]);
    }
}
