//! Routing scraper traffic through a local Tor relay.
//!
//! When `use_tor` is set, every unit's browser, downloader and page
//! renderer talk to the target sites through the SOCKS port of a Tor
//! process launched by the command interpreter.

mod tor;

use std::fmt;

use thiserror::Error;

use crate::config::Settings;

pub use tor::{Bootstrap, TorProcess, BOOTSTRAP_TIMEOUT};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Tor binary not found: {0}")]
    BinaryMissing(String),
    #[error("failed to start Tor: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Tor did not bootstrap ({0})")]
    Bootstrap(String),
}

/// A local SOCKS relay endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    endpoint: String,
}

impl ProxyRoute {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            endpoint: format!("{}:{}", host, port),
        }
    }

    /// Route for the current settings, if Tor is enabled.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        settings
            .socks_endpoint()
            .map(|endpoint| Self { endpoint })
    }

    /// Proxy URL for Chrome's `--proxy-server` and wkhtmltopdf's `--proxy`.
    pub fn socks_url(&self) -> String {
        format!("socks5://{}", self.endpoint)
    }

    /// Proxy URL for HTTP clients; host names are resolved by the relay.
    pub fn socks_url_remote_dns(&self) -> String {
        format!("socks5h://{}", self.endpoint)
    }
}

impl fmt::Display for ProxyRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_follows_tor_settings() {
        let mut settings = Settings::default();
        settings.tor.socks_port = 9150;

        let route = ProxyRoute::from_settings(&settings).unwrap();
        assert_eq!(route.socks_url(), "socks5://127.0.0.1:9150");
        assert_eq!(route.socks_url_remote_dns(), "socks5h://127.0.0.1:9150");

        settings.tor.use_tor = false;
        assert_eq!(ProxyRoute::from_settings(&settings), None);
    }
}
