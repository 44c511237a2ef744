//! File collaborators used by scraper units: attachment downloads and PDF
//! snapshots of the pages they came from.
//!
//! Both write below a per-unit root, into a directory named by a sanitised
//! key (usually the topic title), and both skip work whose output already
//! exists.

pub mod archive;
pub mod download;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

pub use archive::{ArchiveError, ArchiveOutcome, Archiver};
pub use download::{DownloadError, DownloadOutcome, Downloader};

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\W_]+").unwrap());

/// Strip every run of non-word characters and underscores.
pub fn sanitize_key(raw: &str) -> String {
    NON_WORD.replace_all(raw, "").into_owned()
}

/// Directory for `key` below `root`.
pub fn keyed_dir(root: &Path, key: &str) -> PathBuf {
    let key = sanitize_key(key);
    if key.is_empty() {
        root.join("untitled")
    } else {
        root.join(key)
    }
}

/// Outcome shared by the idempotent file writers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Written {
    Created(PathBuf),
    AlreadyExists(PathBuf),
}

/// Write `url` into `<key>/<key>.txt` once.
pub fn record_topic_url(root: &Path, key: &str, url: &str) -> std::io::Result<Written> {
    let dir = keyed_dir(root, key);
    std::fs::create_dir_all(&dir)?;
    let stem = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let path = dir.join(format!("{}.txt", stem));
    if path.is_file() {
        return Ok(Written::AlreadyExists(path));
    }
    std::fs::write(&path, url)?;
    Ok(Written::Created(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sanitize_removes_punctuation_and_underscores() {
        assert_eq!(sanitize_key("EDC16 / full_dump (v2)!"), "EDC16fulldumpv2");
        assert_eq!(sanitize_key("Motronic ME7.5"), "MotronicME75");
        assert_eq!(sanitize_key("Прошивка ЭБУ"), "ПрошивкаЭБУ");
        assert_eq!(sanitize_key("___"), "");
    }

    #[test]
    fn keyed_dir_falls_back_for_empty_key() {
        let root = Path::new("/data");
        assert_eq!(keyed_dir(root, "a b"), PathBuf::from("/data/ab"));
        assert_eq!(keyed_dir(root, "?!"), PathBuf::from("/data/untitled"));
    }

    #[test]
    fn topic_url_written_once() {
        let dir = tempdir().unwrap();
        let first = record_topic_url(dir.path(), "My Topic", "http://a/1").unwrap();
        let second = record_topic_url(dir.path(), "My Topic", "http://a/2").unwrap();

        let path = dir.path().join("MyTopic").join("MyTopic.txt");
        assert_eq!(first, Written::Created(path.clone()));
        assert_eq!(second, Written::AlreadyExists(path.clone()));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "http://a/1");
    }
}
