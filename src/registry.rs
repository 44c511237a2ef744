//! Maps queued (module, class) pairs to unit constructors.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::queue::Job;
use crate::sites::{profiles, ForumScraper};
use crate::unit::{ScraperUnit, UnitContext};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no scraper module named '{0}'")]
    NotFound(String),
    #[error("module '{module}' has no scraper class '{class}'")]
    ShapeMismatch { module: String, class: String },
    #[error("could not construct '{module}': {reason}")]
    Construction { module: String, reason: String },
}

/// Builds a unit around its runtime context.
pub type UnitConstructor = Arc<dyn Fn(UnitContext) -> Box<dyn ScraperUnit> + Send + Sync>;

/// Resolves a job to something the pool can construct.
pub trait ModuleResolver: Send + Sync {
    fn resolve(&self, job: &Job) -> Result<UnitConstructor, ResolveError>;
}

/// Table of known modules. Module names are case-insensitive, class names
/// are exact.
#[derive(Default, Clone)]
pub struct Registry {
    modules: HashMap<String, HashMap<String, UnitConstructor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, module: &str, class: &str, constructor: F) -> Self
    where
        F: Fn(UnitContext) -> Box<dyn ScraperUnit> + Send + Sync + 'static,
    {
        self.modules
            .entry(module.to_lowercase())
            .or_default()
            .insert(class.to_string(), Arc::new(constructor));
        self
    }

    /// Registered module names, sorted.
    pub fn modules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl ModuleResolver for Registry {
    fn resolve(&self, job: &Job) -> Result<UnitConstructor, ResolveError> {
        let classes = self
            .modules
            .get(&job.module.to_lowercase())
            .ok_or_else(|| ResolveError::NotFound(job.module.clone()))?;
        classes
            .get(&job.class)
            .cloned()
            .ok_or_else(|| ResolveError::ShapeMismatch {
                module: job.module.clone(),
                class: job.class.clone(),
            })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("modules", &self.modules())
            .finish()
    }
}

/// The built-in forum scrapers.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    for profile in profiles::all() {
        registry = registry.register(profile.module, ForumScraper::CLASS, move |ctx| {
            Box::new(ForumScraper::new(profile.clone(), ctx))
        });
    }
    registry
}
