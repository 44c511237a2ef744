//! Tor child process for the SOCKS relay.
//!
//! 1. Spawn `tor --SocksPort <n> --ControlPort <n>`
//! 2. Follow its notice log on stdout, echoing `Bootstrapped` progress
//! 3. Return once it reports `Bootstrapped 100%`, or give up after
//!    [`BOOTSTRAP_TIMEOUT`]
//!
//! The process is killed when the handle is dropped.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SendError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::ProxyError;
use crate::config::{expand_path, TorSettings};

/// How long Tor gets to reach `Bootstrapped 100%`.
pub const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(90);

pub struct TorProcess {
    child: Child,
    socks_port: u16,
}

/// Notice log of a freshly spawned Tor, read until it has bootstrapped.
pub struct Bootstrap {
    lines: Receiver<String>,
    timeout: Duration,
}

impl TorProcess {
    /// Find the tor binary at the configured location or in PATH.
    pub fn find_binary(configured: &str) -> Option<PathBuf> {
        let explicit = expand_path(configured);
        if explicit.components().count() > 1 && explicit.is_file() {
            return Some(explicit);
        }

        let candidates = if cfg!(windows) {
            vec![configured, "tor.exe", "Tor\\tor.exe"]
        } else {
            vec![configured, "tor", "/usr/bin/tor", "/usr/local/bin/tor"]
        };

        candidates
            .into_iter()
            .filter(|c| !c.is_empty())
            .find_map(|c| which::which(c).ok())
    }

    /// Command-line arguments for the configured ports.
    pub fn args(settings: &TorSettings) -> Vec<String> {
        vec![
            "--SocksPort".to_string(),
            settings.socks_port.to_string(),
            "--ControlPort".to_string(),
            settings.control_port.to_string(),
        ]
    }

    /// Start Tor without waiting for it.
    ///
    /// The returned handle owns the process from the start, so it can be
    /// stored (and killed) while [`Bootstrap::wait`] is still running.
    pub fn spawn(settings: &TorSettings) -> Result<(Self, Bootstrap), ProxyError> {
        let binary = Self::find_binary(&settings.tor_path)
            .ok_or_else(|| ProxyError::BinaryMissing(settings.tor_path.clone()))?;
        Self::spawn_binary(&binary, settings)
    }

    fn spawn_binary(
        binary: &Path,
        settings: &TorSettings,
    ) -> Result<(Self, Bootstrap), ProxyError> {
        info!("Starting Tor ({})", binary.display());

        let mut child = Command::new(binary)
            .args(Self::args(settings))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProxyError::Bootstrap("no output stream".to_string()));
        };

        // the reader outlives the bootstrap so tor never blocks on a full pipe
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if let Err(SendError(line)) = tx.send(line) {
                    debug!("Tor: {}", line);
                }
            }
        });

        let process = Self {
            child,
            socks_port: settings.socks_port,
        };
        Ok((
            process,
            Bootstrap {
                lines: rx,
                timeout: BOOTSTRAP_TIMEOUT,
            },
        ))
    }

    pub fn socks_port(&self) -> u16 {
        self.socks_port
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    pub fn kill(&mut self) {
        if self.is_running() {
            info!("Shutting down Tor process...");
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

impl Bootstrap {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Block until Tor reports `Bootstrapped 100%`.
    ///
    /// `progress` receives every `Bootstrapped` line as it arrives. The
    /// caller kills the process when this fails.
    pub fn wait(self, mut progress: impl FnMut(&str)) -> Result<(), ProxyError> {
        let deadline = Instant::now() + self.timeout;
        let mut last = String::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = match self.lines.recv_timeout(remaining) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => {
                    warn!("Tor did not bootstrap within {:?}", self.timeout);
                    return Err(ProxyError::Bootstrap("timed out".to_string()));
                }
                // stdout closed: tor exited or detached from its output
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ProxyError::Bootstrap(if last.is_empty() {
                        "no output".to_string()
                    } else {
                        last
                    }));
                }
            };

            if line.contains("Bootstrapped ") {
                progress(&line);
                if line.contains("Bootstrapped 100%") {
                    info!("Tor bootstrap complete");
                    return Ok(());
                }
            } else if line.contains("[warn]") || line.contains("[err]") {
                warn!("Tor: {}", line);
            } else {
                debug!("Tor: {}", line);
            }
            last = line;
        }
    }
}

impl Drop for TorProcess {
    fn drop(&mut self) {
        self.kill();
    }
}
