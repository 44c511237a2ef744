//! PDF snapshots of visited pages via wkhtmltopdf.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use super::keyed_dir;
use crate::browser::BrowserCookie;
use crate::privacy::ProxyRoute;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("renderer exited with {status}: {stderr}")]
    Renderer { status: String, stderr: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Rendered(PathBuf),
    AlreadyExists(PathBuf),
}

/// Renders pages into `<root>/<dir key>/<dir key>[_<page>].pdf`.
#[derive(Debug, Clone)]
pub struct Archiver {
    program: PathBuf,
    root: PathBuf,
    proxy: Option<String>,
}

impl Archiver {
    pub fn new(
        program: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
        proxy: Option<&ProxyRoute>,
    ) -> Self {
        Self {
            program: program.into(),
            root: root.into(),
            proxy: proxy.map(ProxyRoute::socks_url),
        }
    }

    /// Where the snapshot for `dir_key` (and optional page) is written.
    pub fn destination(&self, dir_key: &str, page: Option<u32>) -> PathBuf {
        let dir = keyed_dir(&self.root, dir_key);
        let stem = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match page {
            Some(page) => format!("{}_{}.pdf", stem, page),
            None => format!("{}.pdf", stem),
        };
        dir.join(name)
    }

    /// Renderer arguments for one snapshot.
    pub fn render_args(
        &self,
        url: &str,
        out: &Path,
        cookies: &[BrowserCookie],
        user_agent: &str,
    ) -> Vec<String> {
        let mut args = vec![
            "--javascript-delay".to_string(),
            "1000".to_string(),
            "--custom-header".to_string(),
            "User-Agent".to_string(),
            user_agent.to_string(),
        ];
        for cookie in cookies {
            args.push("--cookie".to_string());
            args.push(cookie.name.clone());
            args.push(cookie.value.clone());
        }
        if let Some(ref proxy) = self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        args.push(url.to_string());
        args.push(out.to_string_lossy().into_owned());
        args
    }

    /// Snapshot `url` unless the PDF already exists.
    pub async fn archive(
        &self,
        url: &str,
        dir_key: &str,
        page: Option<u32>,
        cookies: &[BrowserCookie],
        user_agent: &str,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        let out = self.destination(dir_key, page);
        if out.is_file() {
            return Ok(ArchiveOutcome::AlreadyExists(out));
        }
        if let Some(dir) = out.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ArchiveError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let args = self.render_args(url, &out, cookies, user_agent);
        debug!("Running {} {:?}", self.program.display(), args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ArchiveError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // wkhtmltopdf exits non-zero on minor resource errors but still writes the PDF
        if output.status.success() || out.is_file() {
            if !output.status.success() {
                warn!(
                    "{} exited with {} but wrote {}",
                    self.program.display(),
                    output.status,
                    out.display()
                );
            }
            return Ok(ArchiveOutcome::Rendered(out));
        }

        Err(ArchiveError::Renderer {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
