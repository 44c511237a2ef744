//! Marked status lines printed by the interpreter.

use std::fmt::Display;

use console::{style, StyledObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    Note,
    Warning,
    Failed,
}

impl Status {
    fn mark(self) -> StyledObject<&'static str> {
        match self {
            Status::Done => style("✓").green(),
            Status::Note => style("→").cyan(),
            Status::Warning => style("!").yellow(),
            Status::Failed => style("✗").red(),
        }
    }
}

pub fn line(status: Status, message: impl Display) -> String {
    format!("{} {}", status.mark(), message)
}

/// Print one status line. Failures go to stderr.
pub fn say(status: Status, message: impl Display) {
    let text = line(status, message);
    match status {
        Status::Failed => eprintln!("{}", text),
        _ => println!("{}", text),
    }
}

/// Indented progress line under the last status line.
pub fn detail(message: impl Display) {
    println!("  {} {}", style("→").dim(), message);
}
