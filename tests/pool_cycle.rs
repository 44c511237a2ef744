//! Pool cycles driven through the public API with a custom unit.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use firmscrape::browser::{BrowserError, BrowserOptions, BrowserProvider, BrowserSession};
use firmscrape::config;
use firmscrape::interaction::InteractionLock;
use firmscrape::registry::Registry;
use firmscrape::unit::Workspace;
use firmscrape::{Job, JobQueue, ScraperUnit, Settings, UnitContext, WorkerPool};

struct NoBrowser;

#[async_trait]
impl BrowserProvider for NoBrowser {
    async fn open(&self, _options: &BrowserOptions) -> Result<Box<dyn BrowserSession>, BrowserError> {
        Err(BrowserError::Unavailable)
    }
}

struct Recorder {
    ctx: UnitContext,
    runs: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ScraperUnit for Recorder {
    fn context(&self) -> &UnitContext {
        &self.ctx
    }

    async fn run(&mut self) {
        if self.is_stopped() {
            return;
        }
        if let Err(e) = self.ctx.open_browser().await {
            self.ctx.log(format!("Could not open browser: {}", e));
        }
        self.runs.lock().unwrap().push(self.name().to_string());
    }
}

fn pool(root: &std::path::Path, queue: Arc<JobQueue>, runs: Arc<Mutex<Vec<String>>>) -> WorkerPool {
    let mut registry = Registry::new();
    for module in ["siteA", "siteB"] {
        let runs = runs.clone();
        registry = registry.register(module, "Recorder", move |ctx| {
            Box::new(Recorder {
                ctx,
                runs: runs.clone(),
            })
        });
    }
    WorkerPool::new(
        queue,
        Arc::new(registry),
        Arc::new(InteractionLock::console()),
        Arc::new(NoBrowser),
        Workspace::new(root),
    )
}

#[test]
fn cycles_drain_a_loaded_config_one_job_at_a_time() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut settings = Settings::default();
    settings.max_threads = 1;
    settings.tor.use_tor = false;
    let jobs = vec![Job::new("siteA", "Recorder"), Job::new("siteB", "Recorder")];
    config::export(&path, &settings, &jobs).unwrap();

    let loaded = config::import(&path).unwrap();
    assert_eq!(loaded.settings, settings);
    let queue = Arc::new(JobQueue::from_jobs(loaded.jobs));
    let runs = Arc::new(Mutex::new(Vec::new()));
    let pool = pool(dir.path(), queue.clone(), runs.clone());
    let settings = Arc::new(loaded.settings);

    let first = pool.start_cycle(settings.clone());
    assert_eq!(first.launched, vec!["siteA"]);
    assert_eq!(queue.snapshot(), vec![Job::new("siteB", "Recorder")]);
    assert!(pool.canceller().running().is_empty());

    let second = pool.start_cycle(settings.clone());
    assert_eq!(second.launched, vec!["siteB"]);
    assert!(queue.is_empty());

    let third = pool.start_cycle(settings);
    assert!(third.launched.is_empty());

    assert_eq!(*runs.lock().unwrap(), vec!["siteA", "siteB"]);
    let log = std::fs::read_to_string(dir.path().join("logs").join("log_siteA.txt")).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("] siteA Could not open browser"));
}
