//! firmscrape - concurrent forum scrapers for firmware attachments.
//!
//! Scraper jobs wait in a [`queue::JobQueue`]; a [`pool::WorkerPool`] cycle
//! turns them into [`unit::ScraperUnit`]s, each running on its own thread
//! with its own browser, and joins them all. Credential prompts from every
//! unit are serialised through one [`interaction::InteractionLock`].

pub mod browser;
pub mod cli;
pub mod config;
pub mod interaction;
pub mod pool;
pub mod privacy;
pub mod queue;
pub mod registry;
pub mod services;
pub mod sites;
pub mod unit;

pub use config::Settings;
pub use pool::{CycleReport, PoolCanceller, WorkerPool};
pub use queue::{Job, JobQueue};
pub use unit::{ScraperUnit, StopHandle, UnitContext};
