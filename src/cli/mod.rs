//! Command-line interface for firmscrape.

mod commands;
mod status;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use console::style;
use tracing::debug;

use crate::browser::ChromeProvider;
use crate::config::DEFAULT_CONFIG_FILE;
use crate::interaction::InteractionLock;
use crate::pool::WorkerPool;
use crate::queue::JobQueue;
use crate::registry::default_registry;
use crate::unit::Workspace;

pub use commands::{stop_tor, AddTarget, Command, DeleteTarget, Outcome, Session, SetCommand, TorSlot};

#[derive(Parser, Debug)]
#[command(name = "firmscrape")]
#[command(about = "Forum scrapers that collect firmware attachments")]
#[command(version)]
pub struct Cli {
    /// Config file read at start-up and by export/load
    #[arg(long, env = "FIRMSCRAPE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory for logs/ and downloads/
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Parse arguments, load the config and run the interpreter until `quit`
/// or end of input.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let pool = WorkerPool::new(
        Arc::new(JobQueue::new()),
        Arc::new(default_registry()),
        Arc::new(InteractionLock::console()),
        Arc::new(ChromeProvider),
        Workspace::new(&cli.data_dir),
    );
    let mut session = Session::new(&cli.config, pool);
    session.load_startup();

    let canceller = session.canceller();
    let tor = session.tor_slot();
    ctrlc::set_handler(move || {
        let stopped = canceller.cancel_all();
        debug!("Stop requested for {} scraper(s)", stopped);
        stop_tor(&tor);
        std::process::exit(0);
    })
    .context("Could not install the termination handler")?;

    println!(
        "{} Type {} for a list of commands",
        style("firmscrape").bold(),
        style("help").cyan()
    );

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{} ", style(">>>").dim());
        io::stdout().flush().context("Could not write prompt")?;

        line.clear();
        if stdin.lock().read_line(&mut line).context("Could not read input")? == 0 {
            stop_tor(&session.tor_slot());
            break;
        }
        if session.execute_line(&line) == Outcome::Quit {
            break;
        }
    }
    Ok(())
}
