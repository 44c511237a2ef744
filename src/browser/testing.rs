//! Scripted in-memory browser for tests.
//!
//! Pages are HTML fixtures keyed by URL; selectors are matched against the
//! current fixture with the `scraper` crate, so profile selectors are
//! exercised for real. Clicks can be scripted to navigate.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use super::{BrowserCookie, BrowserError, BrowserOptions, BrowserProvider, BrowserSession};

/// What a session did, for assertions.
#[derive(Debug, Default)]
pub struct Journal {
    pub visited: Vec<String>,
    pub fills: Vec<(String, String)>,
    pub clicks: Vec<String>,
    pub closed: usize,
}

type VisitHook = Box<dyn Fn() + Send + Sync>;

/// A fake website: URL → HTML, plus click-driven navigation.
#[derive(Default)]
pub struct FakeSite {
    pages: HashMap<String, String>,
    click_targets: Mutex<HashMap<String, VecDeque<String>>>,
    visit_hooks: Mutex<HashMap<String, VisitHook>>,
    pub cookies: Vec<BrowserCookie>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Clicking `selector` navigates to each of `targets` in turn; the last
    /// one repeats.
    pub fn on_click(self, selector: &str, targets: &[&str]) -> Self {
        self.click_targets
            .lock()
            .unwrap()
            .insert(
                selector.to_string(),
                targets.iter().map(|s| s.to_string()).collect(),
            );
        self
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push(BrowserCookie::new(name, value));
        self
    }

    fn next_target(&self, selector: &str) -> Option<String> {
        let mut targets = self.click_targets.lock().unwrap();
        let queue = targets.get_mut(selector)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

pub struct FakeProvider {
    site: Arc<FakeSite>,
    pub journal: Arc<Mutex<Journal>>,
    opened: AtomicUsize,
}

impl FakeProvider {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
            journal: Arc::new(Mutex::new(Journal::default())),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Run `hook` every time a session navigates to `url`.
    pub fn on_visit(&self, url: &str, hook: impl Fn() + Send + Sync + 'static) {
        self.site
            .visit_hooks
            .lock()
            .unwrap()
            .insert(url.to_string(), Box::new(hook));
    }
}

#[async_trait]
impl BrowserProvider for FakeProvider {
    async fn open(
        &self,
        _options: &BrowserOptions,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            site: self.site.clone(),
            journal: self.journal.clone(),
            current: "about:blank".to_string(),
        }))
    }
}

pub struct FakeSession {
    site: Arc<FakeSite>,
    journal: Arc<Mutex<Journal>>,
    current: String,
}

impl FakeSession {
    fn html(&self) -> &str {
        self.site
            .pages
            .get(&self.current)
            .map(String::as_str)
            .unwrap_or("")
    }

    fn matches(&self, selector: &str) -> bool {
        let Ok(sel) = Selector::parse(selector) else {
            return false;
        };
        Html::parse_document(self.html()).select(&sel).next().is_some()
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        self.journal.lock().unwrap().visited.push(url.to_string());
        if !self.site.pages.contains_key(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "no such fixture".to_string(),
            });
        }
        self.current = url.to_string();
        if let Some(hook) = self.site.visit_hooks.lock().unwrap().get(url) {
            hook();
        }
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        if self.matches(selector) {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                selector: selector.to_string(),
                waited: timeout,
            })
        }
    }

    async fn is_present(&mut self, selector: &str) -> Result<bool, BrowserError> {
        Ok(self.matches(selector))
    }

    async fn text(&mut self, selector: &str) -> Result<String, BrowserError> {
        let sel = Selector::parse(selector)
            .map_err(|_| BrowserError::NotFound(selector.to_string()))?;
        Html::parse_document(self.html())
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>())
            .ok_or_else(|| BrowserError::NotFound(selector.to_string()))
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        if !self.matches(selector) {
            return Err(BrowserError::NotFound(selector.to_string()));
        }
        self.journal
            .lock()
            .unwrap()
            .fills
            .push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        if !self.matches(selector) {
            return Err(BrowserError::NotFound(selector.to_string()));
        }
        self.journal.lock().unwrap().clicks.push(selector.to_string());
        if let Some(target) = self.site.next_target(selector) {
            self.goto(&target).await?;
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self.current.clone())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        Ok(self.html().to_string())
    }

    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, BrowserError> {
        Ok(self.site.cookies.clone())
    }

    async fn user_agent(&mut self) -> Result<String, BrowserError> {
        Ok("FakeBrowser/1.0".to_string())
    }

    async fn close(&mut self) {
        self.journal.lock().unwrap().closed += 1;
    }
}
