// # HTTP IP Resolver
//
// This crate provides an HTTP-based public IP resolver for sgsync.
//
// ## Behavior
//
// - One GET per `resolve()` call, no caching and no retries
// - Expects a plain text body holding a single IPv4 address
//   (ipify, ifconfig.me/ip, icanhazip.com and checkip.amazonaws.com all work)
// - Every failure maps to `Error::Network`

use async_trait::async_trait;
use sgsync_core::traits::IpResolver;
use sgsync_core::{Error, Result};

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Default lookup service
pub const DEFAULT_IP_URL: &str = "https://api.ipify.org";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based public IP resolver
#[derive(Debug, Clone)]
pub struct HttpIpResolver {
    /// URL to fetch the IP from
    url: String,

    /// HTTP client (carries the timeout)
    client: reqwest::Client,
}

impl HttpIpResolver {
    /// Create a resolver for `url` with the given timeout
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the URL is not http(s) or the HTTP client
    /// cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(Error::config(format!(
                "IP lookup URL must use HTTP or HTTPS scheme. Got: {}",
                url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sgsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { url, client })
    }

    /// Create a resolver against [`DEFAULT_IP_URL`]
    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_IP_URL, DEFAULT_TIMEOUT)
    }

    /// The URL this resolver queries
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl IpResolver for HttpIpResolver {
    async fn resolve(&self) -> Result<Ipv4Addr> {
        tracing::debug!(url = %self.url, "Fetching public IP");

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::network(format!("Request to {} timed out", self.url))
            } else {
                Error::network(format!("Request to {} failed: {}", self.url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::network(format!(
                "IP lookup returned HTTP {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read response: {}", e)))?;

        parse_ipv4_body(&body)
    }

    fn resolver_name(&self) -> &'static str {
        "http"
    }
}

/// Parse a plain text lookup response into an IPv4 address
pub fn parse_ipv4_body(body: &str) -> Result<Ipv4Addr> {
    let text = body.trim();
    match text.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => Ok(ip),
        Ok(IpAddr::V6(ip)) => Err(Error::network(format!(
            "Expected IPv4, got: {}",
            ip
        ))),
        Err(_) => {
            let preview: String = text.chars().take(64).collect();
            Err(Error::network(format!("Invalid IP address: {:?}", preview)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_ipv4() {
        assert_eq!(
            parse_ipv4_body("203.0.113.7").unwrap(),
            Ipv4Addr::new(203, 0, 113, 7)
        );
    }

    #[test]
    fn trims_trailing_newline() {
        assert_eq!(
            parse_ipv4_body("198.51.100.1\n").unwrap(),
            Ipv4Addr::new(198, 51, 100, 1)
        );
    }

    #[test]
    fn rejects_ipv6() {
        let err = parse_ipv4_body("2001:db8::1").unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert!(err.to_string().contains("Expected IPv4"));
    }

    #[test]
    fn rejects_html_error_pages() {
        let err = parse_ipv4_body("<html><body>502 Bad Gateway</body></html>").unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn rejects_empty_body() {
        assert!(parse_ipv4_body("   ").is_err());
    }

    #[test]
    fn rejects_non_http_url() {
        let err = HttpIpResolver::new("ftp://example.com", DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn default_resolver_uses_ipify() {
        let resolver = HttpIpResolver::with_defaults().unwrap();
        assert_eq!(resolver.url(), "https://api.ipify.org");
        assert_eq!(resolver.resolver_name(), "http");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        // Port 9 on loopback: connection refused without leaving the machine.
        let resolver =
            HttpIpResolver::new("http://127.0.0.1:9/", Duration::from_secs(2)).unwrap();
        let err = resolver.resolve().await.unwrap_err();
        assert!(matches!(err, Error::Network(_)), "got {:?}", err);
    }
}
