//! Process-wide configuration and its TOML persistence.
//!
//! `Settings` is mutated only by the command interpreter between cycles.
//! The worker pool snapshots it into an `Arc<Settings>` at the start of each
//! cycle, so units only ever see an immutable value.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::Job;

/// Default configuration file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Errors raised while exporting or importing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file does not exist: {0}")]
    Missing(PathBuf),
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Ordered set of search terms, stored lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SearchTerms(Vec<String>);

impl SearchTerms {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a term unless it is already present. Returns `true` if added.
    pub fn add(&mut self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() || self.0.contains(&term) {
            return false;
        }
        self.0.push(term);
        true
    }

    /// Remove a term. Returns `true` if it was present.
    pub fn remove(&mut self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        let before = self.0.len();
        self.0.retain(|t| *t != term);
        before != self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SearchTerms {
    fn default() -> Self {
        ["firmware", "dump", "flash"].into_iter().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for SearchTerms {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut terms = SearchTerms::new();
        for term in iter {
            terms.add(term.as_ref());
        }
        terms
    }
}

impl From<Vec<String>> for SearchTerms {
    fn from(terms: Vec<String>) -> Self {
        terms.into_iter().collect()
    }
}

impl From<SearchTerms> for Vec<String> {
    fn from(terms: SearchTerms) -> Self {
        terms.0
    }
}

impl fmt::Display for SearchTerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

/// Anonymizing proxy (Tor) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorSettings {
    pub use_tor: bool,
    pub tor_path: String,
    pub socks_port: u16,
    pub control_port: u16,
}

impl Default for TorSettings {
    fn default() -> Self {
        Self {
            use_tor: true,
            tor_path: "tor".to_string(),
            socks_port: 9050,
            control_port: 9051,
        }
    }
}

/// Process-wide settings read by the pool and by every unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Units launched per cycle. 0 means unbounded.
    pub max_threads: usize,
    pub search_terms: SearchTerms,
    /// Chrome/Chromium executable. Empty means auto-detect.
    pub chrome_path: String,
    pub wkhtmltopdf_path: String,
    pub run_headless: bool,
    pub tor: TorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_threads: 1,
            search_terms: SearchTerms::default(),
            chrome_path: String::new(),
            wkhtmltopdf_path: "wkhtmltopdf".to_string(),
            run_headless: false,
            tor: TorSettings::default(),
        }
    }
}

impl Settings {
    /// SOCKS endpoint units should route through, if Tor is enabled.
    pub fn socks_endpoint(&self) -> Option<String> {
        self.tor
            .use_tor
            .then(|| format!("127.0.0.1:{}", self.tor.socks_port))
    }
}

/// Expand `~` and environment variables in a configured tool path.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(raw),
    }
}

/// On-disk layout. Every key is required on import.
#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    general: GeneralSection,
    tor: TorSettings,
    scrapers: ScrapersSection,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeneralSection {
    chrome_path: String,
    wkhtmltopdf_path: String,
    run_headless: bool,
    max_threads: usize,
    search_terms: SearchTerms,
}

#[derive(Debug, Serialize, Deserialize)]
struct ScrapersSection {
    jobs: Vec<Job>,
}

/// Settings and job list restored from a config file.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub settings: Settings,
    pub jobs: Vec<Job>,
}

/// Render settings and a job list as TOML.
pub fn to_toml(settings: &Settings, jobs: &[Job]) -> Result<String, ConfigError> {
    let file = ConfigFile {
        general: GeneralSection {
            chrome_path: settings.chrome_path.clone(),
            wkhtmltopdf_path: settings.wkhtmltopdf_path.clone(),
            run_headless: settings.run_headless,
            max_threads: settings.max_threads,
            search_terms: settings.search_terms.clone(),
        },
        tor: settings.tor.clone(),
        scrapers: ScrapersSection {
            jobs: jobs.to_vec(),
        },
    };
    Ok(toml::to_string_pretty(&file)?)
}

/// Parse settings and a job list from TOML.
pub fn from_toml(content: &str) -> Result<LoadedConfig, ConfigError> {
    let file: ConfigFile = toml::from_str(content)?;
    Ok(LoadedConfig {
        settings: Settings {
            max_threads: file.general.max_threads,
            search_terms: file.general.search_terms,
            chrome_path: file.general.chrome_path,
            wkhtmltopdf_path: file.general.wkhtmltopdf_path,
            run_headless: file.general.run_headless,
            tor: file.tor,
        },
        jobs: file.scrapers.jobs,
    })
}

/// Write settings and the job queue snapshot to `path`.
pub fn export(path: &Path, settings: &Settings, jobs: &[Job]) -> Result<(), ConfigError> {
    let content = to_toml(settings, jobs)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read settings and a job list from `path`.
pub fn import(path: &Path) -> Result<LoadedConfig, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_toml(&content)
}
