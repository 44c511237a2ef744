use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{info, warn};

use super::{StopHandle, UnitLog};
use crate::browser::{BrowserCookie, BrowserError, BrowserOptions, BrowserProvider, BrowserSession};
use crate::config::{expand_path, Settings};
use crate::interaction::{Credentials, InteractionLock};
use crate::privacy::ProxyRoute;
use crate::services::{
    self, ArchiveOutcome, Archiver, DownloadError, DownloadOutcome, Downloader, Written,
};

/// Root directory for logs and downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn downloads_dir(&self, unit: &str) -> PathBuf {
        self.root.join("downloads").join(unit)
    }
}

/// Login state handed from the browser to plain HTTP requests.
#[derive(Debug, Clone, Default)]
pub struct HttpSession {
    pub cookies: Vec<BrowserCookie>,
    pub user_agent: String,
}

impl HttpSession {
    /// Cookies with an empty value are dropped.
    pub fn new(cookies: Vec<BrowserCookie>, user_agent: impl Into<String>) -> Self {
        Self {
            cookies: cookies.into_iter().filter(|c| !c.value.is_empty()).collect(),
            user_agent: user_agent.into(),
        }
    }
}

/// Runtime shared by every site variant.
pub struct UnitContext {
    name: String,
    settings: Arc<Settings>,
    stop: StopHandle,
    lock: Arc<InteractionLock>,
    log: UnitLog,
    browsers: Arc<dyn BrowserProvider>,
    downloader: Downloader,
    archiver: Archiver,
    pacing: bool,
}

impl UnitContext {
    const STOP_POLL: Duration = Duration::from_millis(250);

    pub fn new(
        name: &str,
        settings: Arc<Settings>,
        lock: Arc<InteractionLock>,
        browsers: Arc<dyn BrowserProvider>,
        workspace: &Workspace,
    ) -> Result<Self, DownloadError> {
        let proxy = ProxyRoute::from_settings(&settings);
        let downloads = workspace.downloads_dir(name);
        let downloader = Downloader::new(&downloads, proxy.as_ref())?;
        let archiver = Archiver::new(
            expand_path(&settings.wkhtmltopdf_path),
            &downloads,
            proxy.as_ref(),
        );

        Ok(Self {
            name: name.to_string(),
            log: UnitLog::new(&workspace.logs_dir(), name),
            settings,
            stop: StopHandle::new(),
            lock,
            browsers,
            downloader,
            archiver,
            pacing: true,
        })
    }

    /// Skip the jittered pauses between site interactions.
    pub fn without_pauses(mut self) -> Self {
        self.pacing = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// Write to the unit's log file and the console.
    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!(unit = %self.name, "{}", message);
        self.log.append(message);
    }

    pub fn browser_options(&self) -> BrowserOptions {
        let chrome_path = self.settings.chrome_path.trim();
        BrowserOptions {
            headless: self.settings.run_headless,
            proxy: ProxyRoute::from_settings(&self.settings).map(|r| r.socks_url()),
            chrome_path: (!chrome_path.is_empty()).then(|| expand_path(chrome_path)),
        }
    }

    pub async fn open_browser(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.browsers.open(&self.browser_options()).await
    }

    /// Ask the operator for this site's credentials.
    ///
    /// Waits for the shared interaction lock on a blocking thread so the
    /// unit's runtime keeps servicing its browser meanwhile.
    pub async fn prompt_credentials(&self) -> io::Result<Credentials> {
        let lock = self.lock.clone();
        let label = self.name.clone();
        tokio::task::spawn_blocking(move || lock.prompt_credentials(&label))
            .await
            .map_err(io::Error::other)?
    }

    /// Fetch an attachment, logging the outcome. Failures are not fatal.
    pub async fn download(
        &self,
        url: &str,
        dir_key: &str,
        file_name: &str,
        session: &HttpSession,
    ) -> Option<DownloadOutcome> {
        match self
            .downloader
            .download(url, dir_key, file_name, &session.cookies, &session.user_agent)
            .await
        {
            Ok(outcome) => {
                match &outcome {
                    DownloadOutcome::Saved { path, bytes } => {
                        self.log(format!("Downloaded {} ({} bytes)", path.display(), bytes))
                    }
                    DownloadOutcome::AlreadyExists(path) => {
                        self.log(format!("File {} already exists", path.display()))
                    }
                }
                Some(outcome)
            }
            Err(e) => {
                self.log(format!("Failed to download {}: {}", url, e));
                None
            }
        }
    }

    /// Render a PDF snapshot of `url`, logging the outcome.
    pub async fn archive(
        &self,
        url: &str,
        dir_key: &str,
        page: Option<u32>,
        session: &HttpSession,
    ) -> Option<ArchiveOutcome> {
        match self
            .archiver
            .archive(url, dir_key, page, &session.cookies, &session.user_agent)
            .await
        {
            Ok(outcome) => {
                match &outcome {
                    ArchiveOutcome::Rendered(path) => {
                        self.log(format!("Archived {} to {}", url, path.display()))
                    }
                    ArchiveOutcome::AlreadyExists(path) => {
                        self.log(format!("Archive {} already exists", path.display()))
                    }
                }
                Some(outcome)
            }
            Err(e) => {
                self.log(format!("Failed to archive {}: {}", url, e));
                None
            }
        }
    }

    /// Remember which URL a topic directory came from.
    pub fn record_topic_url(&self, dir_key: &str, url: &str) {
        match services::record_topic_url(self.downloader.root(), dir_key, url) {
            Ok(Written::Created(_)) | Ok(Written::AlreadyExists(_)) => {}
            Err(e) => warn!(unit = %self.name, "Could not record URL for {}: {}", dir_key, e),
        }
    }

    /// Sleep a random number of seconds from `seconds`, waking early on stop.
    pub async fn pause(&self, seconds: RangeInclusive<u64>) {
        if !self.pacing || self.is_stopped() {
            return;
        }
        let millis = rand::rng().random_range(seconds.start() * 1000..=seconds.end() * 1000);
        let deadline = Instant::now() + Duration::from_millis(millis);
        while !self.is_stopped() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep((deadline - now).min(Self::STOP_POLL)).await;
        }
    }
}
