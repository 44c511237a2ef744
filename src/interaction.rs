//! Shared interaction lock serializing credential prompts across units.
//!
//! Every unit runs on its own thread but they all share one console. The
//! lock is held only for the prompt-and-capture window: the guard lives
//! inside [`InteractionLock::prompt_credentials`], so it is released on
//! every exit path, including an I/O error or a panic in the prompter.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use console::Term;

/// Username and password captured from the console.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of interactive input.
pub trait Prompter: Send + Sync {
    /// Read a visible line of input.
    fn read_line(&self, prompt: &str) -> io::Result<String>;
    /// Read a line without echoing it.
    fn read_secret(&self, prompt: &str) -> io::Result<String>;
}

/// Prompter backed by the controlling terminal.
#[derive(Debug, Clone, Default)]
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn read_line(&self, prompt: &str) -> io::Result<String> {
        let term = Term::stdout();
        term.write_str(prompt)?;
        term.read_line()
    }

    fn read_secret(&self, prompt: &str) -> io::Result<String> {
        let term = Term::stdout();
        term.write_str(prompt)?;
        term.read_secure_line()
    }
}

/// The single process-wide lock around credential prompts.
pub struct InteractionLock {
    gate: Mutex<()>,
    prompter: Arc<dyn Prompter>,
}

impl InteractionLock {
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self {
            gate: Mutex::new(()),
            prompter,
        }
    }

    /// Lock wired to the terminal.
    pub fn console() -> Self {
        Self::new(Arc::new(ConsolePrompter))
    }

    /// Ask `label` for a username then a password while holding the lock.
    ///
    /// Blocks the calling thread, both while waiting for the lock and while
    /// waiting for input. Call from a blocking context.
    pub fn prompt_credentials(&self, label: &str) -> io::Result<Credentials> {
        let _held = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let username = self.prompter.read_line(&format!("{}: Username: ", label))?;
        let password = self.prompter.read_secret(&format!("{}: Password: ", label))?;
        Ok(Credentials {
            username: username.trim().to_string(),
            password,
        })
    }

    /// Whether some unit is mid-prompt right now.
    pub fn is_held(&self) -> bool {
        matches!(
            self.gate.try_lock(),
            Err(std::sync::TryLockError::WouldBlock)
        )
    }
}

impl fmt::Debug for InteractionLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionLock")
            .field("held", &self.is_held())
            .finish()
    }
}
