//! Worker pool: turns queued jobs into running scraper units.
//!
//! A cycle dequeues up to `max_threads` jobs, builds a unit for each, runs
//! every unit on its own OS thread with a private current-thread runtime and
//! joins them all before returning. The roster of running units is shared
//! with [`PoolCanceller`] so a signal handler can stop them without waiting.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, error, info, warn};

use crate::browser::BrowserProvider;
use crate::config::Settings;
use crate::interaction::InteractionLock;
use crate::queue::{Job, JobQueue};
use crate::registry::{ModuleResolver, ResolveError};
use crate::unit::{ScraperUnit, StopHandle, UnitContext, Workspace};

type Roster = Arc<Mutex<Vec<(String, StopHandle)>>>;

fn lock_roster(roster: &Roster) -> MutexGuard<'_, Vec<(String, StopHandle)>> {
    roster.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Units that were started, in launch order.
    pub launched: Vec<String>,
    /// Jobs dropped because they could not be resolved or constructed.
    pub skipped: Vec<(Job, String)>,
}

/// Stops every unit in the current roster. Cheap to clone and safe to use
/// from any thread.
#[derive(Clone)]
pub struct PoolCanceller {
    roster: Roster,
}

impl PoolCanceller {
    /// Signal stop to every rostered unit without waiting for them.
    /// Returns how many units were signalled.
    pub fn cancel_all(&self) -> usize {
        let roster = lock_roster(&self.roster);
        for (name, stop) in roster.iter() {
            debug!(unit = %name, "Stop requested");
            stop.stop();
        }
        roster.len()
    }

    /// Names of the units in the current roster.
    pub fn running(&self) -> Vec<String> {
        lock_roster(&self.roster)
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

pub struct WorkerPool {
    queue: Arc<JobQueue>,
    resolver: Arc<dyn ModuleResolver>,
    lock: Arc<InteractionLock>,
    browsers: Arc<dyn BrowserProvider>,
    workspace: Workspace,
    roster: Roster,
    pacing: bool,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<JobQueue>,
        resolver: Arc<dyn ModuleResolver>,
        lock: Arc<InteractionLock>,
        browsers: Arc<dyn BrowserProvider>,
        workspace: Workspace,
    ) -> Self {
        Self {
            queue,
            resolver,
            lock,
            browsers,
            workspace,
            roster: Roster::default(),
            pacing: true,
        }
    }

    /// Units built by this pool skip their pauses.
    pub fn without_pauses(mut self) -> Self {
        self.pacing = false;
        self
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn canceller(&self) -> PoolCanceller {
        PoolCanceller {
            roster: self.roster.clone(),
        }
    }

    pub fn cancel_all(&self) -> usize {
        self.canceller().cancel_all()
    }

    fn build(&self, job: &Job, settings: &Arc<Settings>) -> Result<Box<dyn ScraperUnit>, ResolveError> {
        let constructor = self.resolver.resolve(job)?;
        let ctx = UnitContext::new(
            &job.module,
            settings.clone(),
            self.lock.clone(),
            self.browsers.clone(),
            &self.workspace,
        )
        .map_err(|e| ResolveError::Construction {
            module: job.module.clone(),
            reason: e.to_string(),
        })?;
        let ctx = if self.pacing { ctx } else { ctx.without_pauses() };
        Ok(constructor(ctx))
    }

    /// Run one cycle to completion. Blocks the calling thread until every
    /// launched unit has terminated.
    pub fn start_cycle(&self, settings: Arc<Settings>) -> CycleReport {
        let mut report = CycleReport::default();
        if self.queue.is_empty() {
            info!("No scrapers queued");
            return report;
        }

        let limit = match settings.max_threads {
            0 => usize::MAX,
            n => n,
        };

        let mut units: Vec<Box<dyn ScraperUnit>> = Vec::new();
        while units.len() < limit {
            let Some(job) = self.queue.dequeue() else {
                break;
            };
            match self.build(&job, &settings) {
                Ok(unit) => {
                    lock_roster(&self.roster).push((unit.name().to_string(), unit.stop_handle()));
                    units.push(unit);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", job, e);
                    report.skipped.push((job, e.to_string()));
                }
            }
        }

        let mut handles = Vec::with_capacity(units.len());
        for unit in units {
            let name = unit.name().to_string();
            match thread::Builder::new()
                .name(format!("unit-{}", name))
                .spawn(move || run_unit(unit))
            {
                Ok(handle) => {
                    info!(unit = %name, "Started");
                    report.launched.push(name);
                    handles.push(handle);
                }
                Err(e) => error!(unit = %name, "Could not start thread: {}", e),
            }
        }

        for handle in handles {
            if handle.join().is_err() {
                error!("A scraper thread exited abnormally");
            }
        }

        lock_roster(&self.roster).clear();
        info!("Cycle finished ({} units)", report.launched.len());
        report
    }
}

/// Thread body: drive `unit.run()` on a fresh runtime, containing panics.
fn run_unit(mut unit: Box<dyn ScraperUnit>) {
    let name = unit.name().to_string();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(unit.run()),
            Err(e) => unit
                .context()
                .log(format!("Could not start runtime: {}", e)),
        }
    }));
    if outcome.is_err() {
        unit.context().log("Scraper crashed");
    }
    debug!(unit = %name, "Thread exiting");
}
