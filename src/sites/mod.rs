//! Forum scrapers.
//!
//! Every supported forum follows the same flow: load the home page, log in
//! with credentials typed by the operator, search for each configured term,
//! walk every result page and every topic found there, then archive each
//! topic page that carries attachments and download the attachments. The
//! per-forum differences are captured by a [`SiteProfile`].

mod parse;
pub mod profiles;

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::browser::{BrowserError, BrowserSession};
use crate::unit::{HttpSession, ScraperUnit, UnitContext};

pub use parse::Link;
pub use profiles::SiteProfile;

/// Why a run ended early.
#[derive(Debug)]
enum Abort {
    Stopped,
    Failed(String),
}

impl Abort {
    fn failed(what: impl fmt::Display, err: impl fmt::Display) -> Self {
        Abort::Failed(format!("{}: {}", what, err))
    }
}

impl From<BrowserError> for Abort {
    fn from(e: BrowserError) -> Self {
        Abort::Failed(e.to_string())
    }
}

type Step<T = ()> = Result<T, Abort>;

/// Outcome of submitting the login form.
enum LoginResult {
    LoggedIn,
    Rejected(String),
}

/// A forum scraper driven by a [`SiteProfile`].
pub struct ForumScraper {
    profile: SiteProfile,
    ctx: UnitContext,
}

impl ForumScraper {
    /// Class name jobs use to select this scraper.
    pub const CLASS: &'static str = "ForumScraper";

    const POLL_INTERVAL: Duration = Duration::from_millis(250);

    pub fn new(profile: SiteProfile, ctx: UnitContext) -> Self {
        Self { profile, ctx }
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    fn checkpoint(&self) -> Step {
        if self.ctx.is_stopped() {
            Err(Abort::Stopped)
        } else {
            Ok(())
        }
    }

    /// Poll until one of `selectors` is present. Returns its index, or
    /// `None` once the profile timeout has passed.
    async fn wait_any(
        &self,
        browser: &mut dyn BrowserSession,
        selectors: &[&str],
    ) -> Step<Option<usize>> {
        let deadline = Instant::now() + self.profile.timeout;
        loop {
            for (i, selector) in selectors.iter().enumerate() {
                if browser.is_present(selector).await? {
                    return Ok(Some(i));
                }
            }
            self.checkpoint()?;
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Self::POLL_INTERVAL).await;
        }
    }

    async fn scrape(&self, browser: &mut dyn BrowserSession) -> Step {
        self.load_home(browser).await?;
        let session = self.login(browser).await?;

        let mut seen_topics = HashSet::new();
        for term in self.ctx.settings().search_terms.iter() {
            self.checkpoint()?;
            self.search(browser, term, &session, &mut seen_topics)
                .await?;
        }
        Ok(())
    }

    async fn load_home(&self, browser: &mut dyn BrowserSession) -> Step {
        self.checkpoint()?;
        let home = self.profile.home;
        browser
            .goto(home)
            .await
            .map_err(|e| Abort::failed(format!("Could not load {}", home), e))?;
        browser
            .wait_for(self.profile.home_ready, self.profile.timeout)
            .await
            .map_err(|e| Abort::failed(format!("Could not load {}", home), e))?;
        self.checkpoint()?;
        debug!(unit = %self.ctx.name(), "Page loaded successfully");
        Ok(())
    }

    /// Log in, re-prompting after rejected credentials.
    async fn login(&self, browser: &mut dyn BrowserSession) -> Step<HttpSession> {
        let form = &self.profile.login;
        let mut first = true;
        loop {
            if !first {
                self.load_home(browser).await?;
            }
            first = false;

            if !browser.is_present(form.username).await? {
                return Err(Abort::Failed(format!(
                    "Could not find the username input field ({})",
                    form.username
                )));
            }

            let credentials = self
                .ctx
                .prompt_credentials()
                .await
                .map_err(|e| Abort::failed("Could not read credentials", e))?;
            self.checkpoint()?;

            browser
                .fill(form.username, &credentials.username)
                .await
                .map_err(|e| Abort::failed("Could not fill the username input field", e))?;
            browser
                .fill(form.password, &credentials.password)
                .await
                .map_err(|e| Abort::failed("Could not fill the password input field", e))?;
            if let Some(option) = form.pre_submit {
                browser
                    .click(option)
                    .await
                    .map_err(|e| Abort::failed("Could not select the session option", e))?;
            }

            self.ctx.pause(2..=4).await;
            self.checkpoint()?;

            browser
                .click(form.submit)
                .await
                .map_err(|e| Abort::failed("Could not click the login button", e))?;

            match self.login_result(browser).await? {
                LoginResult::LoggedIn => {
                    self.ctx
                        .log(format!("Logged in as {}", credentials.username));
                    break;
                }
                LoginResult::Rejected(message) => {
                    self.ctx.log(format!("Login rejected: {}", message));
                }
            }
        }

        self.checkpoint()?;
        let cookies = browser.cookies().await?;
        let user_agent = browser.user_agent().await?;
        debug!(unit = %self.ctx.name(), "Carrying {} cookies to downloads", cookies.len());
        Ok(HttpSession::new(cookies, user_agent))
    }

    async fn login_result(&self, browser: &mut dyn BrowserSession) -> Step<LoginResult> {
        let form = &self.profile.login;
        match self.wait_any(browser, &[form.logged_in, form.error]).await? {
            Some(0) => Ok(LoginResult::LoggedIn),
            Some(_) => {
                let message = browser.text(form.error).await.unwrap_or_default();
                let message = message.trim();
                match form.bad_credentials_text {
                    Some(expected) if !message.contains(expected) => Err(Abort::Failed(
                        format!("Could not log in. Unknown reason: {}", message),
                    )),
                    _ => Ok(LoginResult::Rejected(message.to_string())),
                }
            }
            None => Err(Abort::Failed(
                "Could not log in. Timed out waiting for the login result".to_string(),
            )),
        }
    }

    async fn search(
        &self,
        browser: &mut dyn BrowserSession,
        term: &str,
        session: &HttpSession,
        seen_topics: &mut HashSet<String>,
    ) -> Step {
        let form = &self.profile.search;
        let results = &self.profile.results;
        info!(unit = %self.ctx.name(), "Searching for '{}'", term);

        browser
            .goto(self.profile.home)
            .await
            .map_err(|e| Abort::failed(format!("Could not load {}", self.profile.home), e))?;
        if let Some(opener) = form.opener {
            browser
                .wait_for(opener, self.profile.timeout)
                .await
                .map_err(|e| Abort::failed("Could not find the search form link", e))?;
            browser
                .click(opener)
                .await
                .map_err(|e| Abort::failed("Could not open the search form", e))?;
        }
        browser
            .wait_for(form.input, self.profile.timeout)
            .await
            .map_err(|e| Abort::failed("Could not find the search input field", e))?;
        browser
            .fill(form.input, term)
            .await
            .map_err(|e| Abort::failed("Could not fill the search input field", e))?;

        self.ctx.pause(1..=4).await;
        self.checkpoint()?;

        if let Some(option) = form.pre_submit {
            browser
                .click(option)
                .await
                .map_err(|e| Abort::failed("Could not select the search option", e))?;
        }
        browser
            .click(form.button)
            .await
            .map_err(|e| Abort::failed("Could not click the search button", e))?;

        let mut indicators = vec![results.ready];
        indicators.extend(results.no_results);
        match self.wait_any(browser, &indicators).await? {
            Some(0) => {}
            Some(_) => {
                info!(unit = %self.ctx.name(), "No results for '{}'", term);
                return Ok(());
            }
            None => {
                return Err(Abort::Failed(
                    "Could not load results page. Timeout error occurred".to_string(),
                ))
            }
        }

        let first = browser.current_url().await?;
        self.walk_results(browser, first, session, seen_topics)
            .await
    }

    /// Visit every result page reachable through pagination links.
    async fn walk_results(
        &self,
        browser: &mut dyn BrowserSession,
        first: String,
        session: &HttpSession,
        seen_topics: &mut HashSet<String>,
    ) -> Step {
        let results = &self.profile.results;
        let mut pending = VecDeque::from([first]);
        let mut visited = HashSet::new();

        while let Some(page) = pending.pop_front() {
            self.checkpoint()?;
            if !visited.insert(page.clone()) {
                continue;
            }
            if browser.current_url().await? != page {
                browser.goto(&page).await?;
                browser
                    .wait_for(results.ready, self.profile.timeout)
                    .await
                    .map_err(|e| Abort::failed("Could not load results page", e))?;
            }

            let html = browser.content().await?;
            for next in parse::links(&html, &page, results.pagination) {
                if !visited.contains(&next.url) {
                    pending.push_back(next.url);
                }
            }
            let topics = parse::links(&html, &page, results.topics);
            debug!(unit = %self.ctx.name(), "{} topics on {}", topics.len(), page);

            for topic in topics {
                self.checkpoint()?;
                if !seen_topics.insert(topic.url.clone()) {
                    continue;
                }
                self.scrape_topic(browser, &topic, session).await?;
                self.ctx.pause(2..=5).await;
            }
        }
        Ok(())
    }

    /// Archive and download from every page of one topic.
    async fn scrape_topic(
        &self,
        browser: &mut dyn BrowserSession,
        topic: &Link,
        session: &HttpSession,
    ) -> Step {
        let title = if topic.text.is_empty() {
            topic.url.as_str()
        } else {
            topic.text.as_str()
        };
        let paginated = self.profile.results.topic_pagination;
        let mut pending = VecDeque::from([topic.url.clone()]);
        let mut visited = HashSet::new();
        let mut number = 0u32;

        while let Some(page) = pending.pop_front() {
            self.checkpoint()?;
            if !visited.insert(page.clone()) {
                continue;
            }
            number += 1;
            browser.goto(&page).await?;
            self.checkpoint()?;

            let html = browser.content().await?;
            if let Some(selector) = paginated {
                for next in parse::links(&html, &page, selector) {
                    if !visited.contains(&next.url) {
                        pending.push_back(next.url);
                    }
                }
            }
            let attachments = parse::attachments(&html, &page, &self.profile.attachments);
            if attachments.is_empty() {
                continue;
            }

            self.ctx
                .archive(&page, title, paginated.map(|_| number), session)
                .await;
            self.ctx.record_topic_url(title, &page);

            for link in attachments {
                self.checkpoint()?;
                self.ctx
                    .download(&link.url, title, &link.text, session)
                    .await;
                self.ctx.pause(1..=3).await;
            }

            if !pending.is_empty() {
                self.ctx.pause(2..=5).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ScraperUnit for ForumScraper {
    fn context(&self) -> &UnitContext {
        &self.ctx
    }

    async fn run(&mut self) {
        if self.ctx.is_stopped() {
            return;
        }

        let mut browser = match self.ctx.open_browser().await {
            Ok(browser) => browser,
            Err(e) => {
                self.ctx.log(format!("Could not open browser: {}", e));
                return;
            }
        };

        let outcome = AssertUnwindSafe(self.scrape(&mut *browser))
            .catch_unwind()
            .await;
        browser.close().await;

        match outcome {
            Ok(Ok(())) => self.ctx.log("Finished scraping"),
            Ok(Err(Abort::Stopped)) => info!(unit = %self.ctx.name(), "Stopped"),
            Ok(Err(Abort::Failed(reason))) => self.ctx.log(reason),
            Err(_) => self.ctx.log("Scraper crashed. Browser closed"),
        }
    }
}
