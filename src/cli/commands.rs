//! Interactive command interpreter.
//!
//! Each input line is parsed as a multicall command line: the first word
//! names the command. The interpreter owns the mutable [`Settings`] and
//! the Tor process, and drives one pool cycle per `start`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use console::style;

use crate::config::{self, Settings};
use crate::pool::{PoolCanceller, WorkerPool};
use crate::privacy::TorProcess;
use crate::queue::JobQueue;

use super::status::{detail, say, Status};

/// Shared slot for the running Tor process, also reachable from the
/// termination handler.
pub type TorSlot = Arc<Mutex<Option<TorProcess>>>;

fn lock_tor(slot: &TorSlot) -> MutexGuard<'_, Option<TorProcess>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Kill the Tor process held in `slot`, if any.
pub fn stop_tor(slot: &TorSlot) {
    if let Some(mut process) = lock_tor(slot).take() {
        process.kill();
    }
}

/// `true` and `1` are true, anything else is false.
fn parse_flag(value: &str) -> Result<bool, std::convert::Infallible> {
    Ok(matches!(value.trim().to_lowercase().as_str(), "true" | "1"))
}

#[derive(Parser, Debug)]
#[command(multicall = true, disable_help_subcommand = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Show available commands
    Help,
    /// Run the queued scrapers
    Start,
    /// Queue a scraper or add a search term
    Add {
        #[command(subcommand)]
        target: AddTarget,
    },
    /// Remove a queued scraper or a search term
    Delete {
        #[command(subcommand)]
        target: DeleteTarget,
    },
    /// Change a setting
    Set {
        #[command(subcommand)]
        setting: SetCommand,
    },
    /// Show the current configuration
    Config,
    /// Save settings and queued scrapers to the config file
    Export,
    /// Replace settings and queued scrapers from the config file
    Load,
    /// Leave the program
    #[command(alias = "exit")]
    Quit,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum AddTarget {
    /// Queue a scraper: add scraper <module> <class>
    Scraper { module: String, class: String },
    /// Add a search term
    Term {
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum DeleteTarget {
    /// Remove a queued scraper by module name
    Scraper { module: String },
    /// Remove a search term
    Term {
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum SetCommand {
    /// Scrapers run per cycle (0 = all)
    Threads { count: usize },
    /// Chrome/Chromium executable (empty = auto-detect)
    ChromePath { path: String },
    /// wkhtmltopdf executable
    WkhtmltopdfPath { path: String },
    /// Run browsers without a window (true/1)
    Headless {
        #[arg(action = ArgAction::Set, value_parser = parse_flag)]
        enabled: bool,
    },
    /// Route traffic through Tor (true/1)
    Tor {
        #[arg(action = ArgAction::Set, value_parser = parse_flag)]
        enabled: bool,
    },
    /// Tor executable
    TorPath { path: String },
    /// Tor SOCKS port
    SocksPort { port: u16 },
    /// Tor control port
    ControlPort { port: u16 },
}

/// Whether the interpreter loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

pub struct Session {
    config_path: PathBuf,
    settings: Settings,
    pool: WorkerPool,
    tor: TorSlot,
}

impl Session {
    pub fn new(config_path: impl Into<PathBuf>, pool: WorkerPool) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
            pool,
            tor: TorSlot::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        self.pool.queue()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn canceller(&self) -> PoolCanceller {
        self.pool.canceller()
    }

    pub fn tor_slot(&self) -> TorSlot {
        self.tor.clone()
    }

    /// Load the config file if there is one, otherwise keep the defaults.
    pub fn load_startup(&mut self) {
        if self.config_path.is_file() {
            self.report(Self::load);
        } else {
            say(
                Status::Note,
                format_args!("No config file at {}. Using defaults", self.config_path.display()),
            );
        }
    }

    /// Parse and execute one input line.
    pub fn execute_line(&mut self, line: &str) -> Outcome {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Outcome::Continue;
        }
        match Line::try_parse_from(words) {
            Ok(parsed) => self.execute(parsed.command),
            Err(e) => {
                let _ = e.print();
                Outcome::Continue
            }
        }
    }

    pub fn execute(&mut self, command: Command) -> Outcome {
        match command {
            Command::Help => print_help(),
            Command::Start => self.report(Self::start),
            Command::Add { target } => self.add(target),
            Command::Delete { target } => self.delete(target),
            Command::Set { setting } => self.set(setting),
            Command::Config => self.print_config(),
            Command::Export => self.report(Self::export),
            Command::Load => self.report(Self::load),
            Command::Quit => {
                stop_tor(&self.tor);
                return Outcome::Quit;
            }
        }
        Outcome::Continue
    }

    fn report(&mut self, action: fn(&mut Self) -> anyhow::Result<()>) {
        if let Err(e) = action(self) {
            say(Status::Failed, format_args!("{:#}", e));
        }
    }

    fn start(&mut self) -> anyhow::Result<()> {
        if self.queue().is_empty() {
            say(Status::Warning, "No scrapers queued");
            return Ok(());
        }
        if self.settings.tor.use_tor {
            self.ensure_tor()?;
        }

        let report = self.pool.start_cycle(Arc::new(self.settings.clone()));
        for (job, reason) in &report.skipped {
            say(Status::Warning, format_args!("Skipped {}: {}", job, reason));
        }
        say(
            Status::Done,
            format_args!(
                "Cycle finished: {} scraper(s) ran, {} still queued",
                report.launched.len(),
                self.queue().len()
            ),
        );
        Ok(())
    }

    fn ensure_tor(&mut self) -> anyhow::Result<()> {
        if let Some(process) = lock_tor(&self.tor).as_mut() {
            if process.is_running() {
                return Ok(());
            }
        }
        say(Status::Note, "Starting Tor...");
        let (process, bootstrap) =
            TorProcess::spawn(&self.settings.tor).context("Could not start Tor")?;
        // stored before waiting so the termination handler can kill it
        *lock_tor(&self.tor) = Some(process);
        if let Err(e) = bootstrap.wait(|line| detail(line.trim())) {
            stop_tor(&self.tor);
            return Err(e).context("Could not start Tor");
        }
        say(Status::Done, "Tor is ready");
        Ok(())
    }

    fn add(&mut self, target: AddTarget) {
        match target {
            AddTarget::Scraper { module, class } => {
                let label = format!("{}::{}", module, class);
                if self.queue().enqueue(module, class) {
                    say(Status::Done, format_args!("Queued {}", label));
                } else {
                    say(Status::Warning, "A scraper for that module is already queued");
                }
            }
            AddTarget::Term { words } => {
                let term = words.join(" ");
                if self.settings.search_terms.add(&term) {
                    say(Status::Done, format_args!("Added search term '{}'", term.to_lowercase()));
                } else {
                    say(Status::Warning, format_args!("'{}' is already a search term", term));
                }
            }
        }
    }

    fn delete(&mut self, target: DeleteTarget) {
        match target {
            DeleteTarget::Scraper { module } => match self.queue().delete(&module) {
                0 => say(Status::Warning, format_args!("No queued scraper named {}", module)),
                _ => say(Status::Done, format_args!("Removed {}", module)),
            },
            DeleteTarget::Term { words } => {
                let term = words.join(" ");
                if self.settings.search_terms.remove(&term) {
                    say(Status::Done, format_args!("Removed search term '{}'", term));
                } else {
                    say(Status::Warning, format_args!("'{}' is not a search term", term));
                }
            }
        }
    }

    fn set(&mut self, setting: SetCommand) {
        let tor_changed = matches!(
            setting,
            SetCommand::Tor { .. }
                | SetCommand::TorPath { .. }
                | SetCommand::SocksPort { .. }
                | SetCommand::ControlPort { .. }
        );
        let settings = &mut self.settings;
        match setting {
            SetCommand::Threads { count } => settings.max_threads = count,
            SetCommand::ChromePath { path } => settings.chrome_path = path,
            SetCommand::WkhtmltopdfPath { path } => settings.wkhtmltopdf_path = path,
            SetCommand::Headless { enabled } => settings.run_headless = enabled,
            SetCommand::Tor { enabled } => settings.tor.use_tor = enabled,
            SetCommand::TorPath { path } => settings.tor.tor_path = path,
            SetCommand::SocksPort { port } => settings.tor.socks_port = port,
            SetCommand::ControlPort { port } => settings.tor.control_port = port,
        }
        if tor_changed {
            stop_tor(&self.tor);
        }
        say(Status::Done, "Setting updated");
    }

    fn print_config(&self) {
        let s = &self.settings;
        let or_auto = |path: &str| {
            if path.trim().is_empty() {
                "(auto-detect)".to_string()
            } else {
                path.to_string()
            }
        };

        println!("{}", style("[general]").bold());
        println!("  threads          {}", s.max_threads);
        println!("  search terms     {}", s.search_terms);
        println!("  chrome path      {}", or_auto(&s.chrome_path));
        println!("  wkhtmltopdf path {}", s.wkhtmltopdf_path);
        println!("  headless         {}", s.run_headless);
        println!("{}", style("[tor]").bold());
        println!("  enabled          {}", s.tor.use_tor);
        println!("  tor path         {}", s.tor.tor_path);
        println!("  socks port       {}", s.tor.socks_port);
        println!("  control port     {}", s.tor.control_port);
        println!("{}", style("[scrapers]").bold());
        println!("  {}", self.queue().module_names());
    }

    fn export(&mut self) -> anyhow::Result<()> {
        config::export(&self.config_path, &self.settings, &self.queue().snapshot())
            .with_context(|| format!("Could not export to {}", self.config_path.display()))?;
        say(Status::Done, format_args!("Exported to {}", self.config_path.display()));
        Ok(())
    }

    fn load(&mut self) -> anyhow::Result<()> {
        let loaded = config::import(&self.config_path)
            .with_context(|| format!("Could not load {}", self.config_path.display()))?;
        stop_tor(&self.tor);
        self.settings = loaded.settings;
        self.queue().replace(loaded.jobs);
        say(Status::Done, format_args!("Loaded {}", self.config_path.display()));
        Ok(())
    }
}

fn print_help() {
    println!("{}", style("Commands:").bold());
    for command in Line::command().get_subcommands() {
        let about = command.get_about().map(|a| a.to_string()).unwrap_or_default();
        println!("  {:<8} {}", style(command.get_name()).cyan(), about);
        for sub in command.get_subcommands() {
            let about = sub.get_about().map(|a| a.to_string()).unwrap_or_default();
            println!("    {:<18} {}", sub.get_name(), style(about).dim());
        }
    }
}
