//! Scraper units: the independent workers the pool runs, one per thread.
//!
//! A unit implements [`ScraperUnit::run`] and holds a [`UnitContext`], the
//! shared runtime every site variant composes: stop flag, settings
//! snapshot, interaction lock, log file, downloader and archiver.

mod context;
mod log;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

pub use context::{HttpSession, UnitContext, Workspace};
pub use log::UnitLog;

/// Cooperative stop flag shared between a unit and whoever may cancel it.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One site's login, search and download flow.
///
/// `run` is driven to completion on a dedicated thread. It never reports
/// failure to its caller: problems go to the unit's log file.
#[async_trait]
pub trait ScraperUnit: Send {
    fn context(&self) -> &UnitContext;

    async fn run(&mut self);

    fn name(&self) -> &str {
        self.context().name()
    }

    fn stop_handle(&self) -> StopHandle {
        self.context().stop_handle().clone()
    }

    fn stop(&self) {
        self.context().stop_handle().stop();
    }

    fn is_stopped(&self) -> bool {
        self.context().is_stopped()
    }
}
