//! Browser sessions used by scraper units.
//!
//! Each unit opens exactly one isolated browser through a
//! [`BrowserProvider`] and drives it through the [`BrowserSession`] trait.
//! The Chrome implementation speaks CDP via chromiumoxide; tests use the
//! scripted fake in `testing`.

mod chrome;
#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use chrome::ChromeProvider;

/// Failures raised by a browser session.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("failed to load {url}: {reason}")]
    Navigation { url: String, reason: String },
    #[error("element not found: {0}")]
    NotFound(String),
    #[error("timed out after {}s waiting for {selector}", .waited.as_secs())]
    Timeout { selector: String, waited: Duration },
    #[error("browser protocol error: {0}")]
    Protocol(String),
    #[error("browser support not compiled. Rebuild with: cargo build --features browser")]
    Unavailable,
}

/// Cookie extracted from a browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

impl BrowserCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_string(),
            secure: false,
            http_only: false,
        }
    }
}

/// Render cookies as a `Cookie` request header value.
pub fn cookie_header(cookies: &[BrowserCookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// How to launch a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    /// Run without a visible window.
    pub headless: bool,
    /// Proxy server URL (e.g. "socks5://127.0.0.1:9050").
    pub proxy: Option<String>,
    /// Explicit Chrome executable. `None` means auto-detect.
    pub chrome_path: Option<PathBuf>,
}

/// An open, isolated browser instance owned by one unit.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for the load to finish.
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Wait until `selector` matches, or fail with `Timeout`.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn is_present(&mut self, selector: &str) -> Result<bool, BrowserError>;

    /// Visible text of the first match.
    async fn text(&mut self, selector: &str) -> Result<String, BrowserError>;

    /// Clear an input and type `value` into it.
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError>;

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;

    async fn current_url(&mut self) -> Result<String, BrowserError>;

    /// Serialized DOM of the current page.
    async fn content(&mut self) -> Result<String, BrowserError>;

    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, BrowserError>;

    async fn user_agent(&mut self) -> Result<String, BrowserError>;

    /// Shut the browser down. Safe to call more than once.
    async fn close(&mut self);
}

/// Opens new browser sessions.
#[async_trait]
pub trait BrowserProvider: Send + Sync {
    async fn open(&self, options: &BrowserOptions) -> Result<Box<dyn BrowserSession>, BrowserError>;
}
