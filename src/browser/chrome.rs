//! Chrome/Chromium sessions over CDP.

#[cfg(feature = "browser")]
use std::path::{Path, PathBuf};
#[cfg(feature = "browser")]
use std::time::{Duration, Instant};

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;

#[cfg(feature = "browser")]
use super::BrowserCookie;
use super::{BrowserError, BrowserOptions, BrowserProvider, BrowserSession};

/// Launches one Chrome process per session.
#[derive(Debug, Clone, Default)]
pub struct ChromeProvider;

#[cfg(feature = "browser")]
impl ChromeProvider {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    /// Find a Chrome executable, preferring an explicit path.
    fn find_chrome(explicit: Option<&Path>) -> Result<PathBuf, BrowserError> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            warn!("Configured Chrome path {:?} does not exist, searching", path);
        }

        for path in Self::CHROME_PATHS {
            let p = Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in [
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(path) = which::which(cmd) {
                debug!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(BrowserError::Launch(
            "Chrome/Chromium not found. Install it or run `set chrome-path <path>`".to_string(),
        ))
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl BrowserProvider for ChromeProvider {
    async fn open(
        &self,
        options: &BrowserOptions,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let chrome_path = Self::find_chrome(options.chrome_path.as_deref())?;

        info!("Launching browser (headless={})", options.headless);

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless
        if !options.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = options.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--no-sandbox");

        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            page,
            handler,
        }))
    }
}

/// A single Chrome process with one working tab.
#[cfg(feature = "browser")]
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Page,
    handler: tokio::task::JoinHandle<()>,
}

#[cfg(feature = "browser")]
impl ChromeSession {
    const POLL_INTERVAL: Duration = Duration::from_millis(250);

    async fn element(&self, selector: &str) -> Result<chromiumoxide::Element, BrowserError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::NotFound(selector.to_string()))
    }
}

#[cfg(feature = "browser")]
fn protocol(e: chromiumoxide::error::CdpError) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

#[cfg(feature = "browser")]
#[async_trait]
impl BrowserSession for ChromeSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        debug!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let started = Instant::now();
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(BrowserError::Timeout {
                    selector: selector.to_string(),
                    waited: timeout,
                });
            }
            tokio::time::sleep(Self::POLL_INTERVAL).await;
        }
    }

    async fn is_present(&mut self, selector: &str) -> Result<bool, BrowserError> {
        Ok(self.page.find_element(selector).await.is_ok())
    }

    async fn text(&mut self, selector: &str) -> Result<String, BrowserError> {
        let element = self.element(selector).await?;
        Ok(element
            .inner_text()
            .await
            .map_err(protocol)?
            .unwrap_or_default())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let element = self.element(selector).await?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(protocol)?;
        element.click().await.map_err(protocol)?;
        element.type_str(value).await.map_err(protocol)?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        let element = self.element(selector).await?;
        element.click().await.map_err(protocol)?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self.page.url().await.map_err(protocol)?.unwrap_or_default())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(protocol)
    }

    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, BrowserError> {
        let cookies = self.page.get_cookies().await.map_err(protocol)?;
        debug!("Got {} cookies from browser", cookies.len());
        Ok(cookies
            .into_iter()
            .map(|c| BrowserCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect())
    }

    async fn user_agent(&mut self) -> Result<String, BrowserError> {
        self.page
            .evaluate("navigator.userAgent")
            .await
            .map_err(protocol)?
            .into_value::<String>()
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }

    async fn close(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!("Browser close failed: {}", e);
            }
            let _ = browser.wait().await;
        }
        self.handler.abort();
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
#[async_trait]
impl BrowserProvider for ChromeProvider {
    async fn open(
        &self,
        _options: &BrowserOptions,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        Err(BrowserError::Unavailable)
    }
}
