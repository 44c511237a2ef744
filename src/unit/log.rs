//! Per-unit append-only log file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;

/// `logs/log_<name>.txt`, one timestamped line per entry.
#[derive(Debug, Clone)]
pub struct UnitLog {
    name: String,
    path: PathBuf,
}

impl UnitLog {
    pub fn new(logs_dir: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: logs_dir.join(format!("log_{}.txt", name)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line. Failures are reported on the console and swallowed.
    pub fn append(&self, message: &str) {
        if let Err(e) = self.try_append(message) {
            warn!(unit = %self.name, "Could not write {}: {}", self.path.display(), e);
        }
    }

    fn try_append(&self, message: &str) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "[{}] {} {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.name,
            message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lines_are_appended_with_timestamp_and_name() {
        let dir = tempdir().unwrap();
        let log = UnitLog::new(dir.path(), "siteA");
        log.append("first");
        log.append("second");

        let content = std::fs::read_to_string(dir.path().join("log_siteA.txt")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] siteA first"));
        assert!(lines[1].ends_with("] siteA second"));
        // [YYYY-MM-DD HH:MM:SS]
        assert_eq!(lines[0].find(']'), Some(20));
    }

    #[test]
    fn write_failures_are_swallowed() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let log = UnitLog::new(&blocker, "siteA");
        log.append("lost");
        assert!(!log.path().exists());
    }
}
