//! Attachment downloads over plain HTTP, reusing the browser's login.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{COOKIE, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use super::keyed_dir;
use crate::browser::{cookie_header, BrowserCookie};
use crate::privacy::ProxyRoute;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved { path: PathBuf, bytes: usize },
    AlreadyExists(PathBuf),
}

/// Fetches attachments into `<root>/<sanitised dir key>/<file name>`.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    root: PathBuf,
}

impl Downloader {
    const TIMEOUT: Duration = Duration::from_secs(300);

    /// Create a downloader writing below `root`, optionally through a relay.
    pub fn new(root: impl Into<PathBuf>, proxy: Option<&ProxyRoute>) -> Result<Self, DownloadError> {
        let mut builder = Client::builder()
            .timeout(Self::TIMEOUT)
            .gzip(true)
            .brotli(true);
        if let Some(route) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(route.socks_url_remote_dns())?);
        }
        Ok(Self {
            client: builder.build()?,
            root: root.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination for a download, without touching the filesystem.
    pub fn destination(&self, dir_key: &str, file_name: &str, url: &str) -> PathBuf {
        keyed_dir(&self.root, dir_key).join(clean_file_name(file_name, url))
    }

    /// Fetch `url` unless the destination file already exists.
    pub async fn download(
        &self,
        url: &str,
        dir_key: &str,
        file_name: &str,
        cookies: &[BrowserCookie],
        user_agent: &str,
    ) -> Result<DownloadOutcome, DownloadError> {
        let target = url::Url::parse(url).map_err(|_| DownloadError::InvalidUrl(url.to_string()))?;
        let path = self.destination(dir_key, file_name, url);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| DownloadError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(DownloadOutcome::AlreadyExists(path));
        }

        let mut request = self.client.get(target).header(USER_AGENT, user_agent);
        if !cookies.is_empty() {
            request = request.header(COOKIE, cookie_header(cookies));
        }
        let body = request.send().await?.error_for_status()?.bytes().await?;
        debug!("Fetched {} bytes from {}", body.len(), url);

        tokio::fs::write(&path, &body)
            .await
            .map_err(|source| DownloadError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(DownloadOutcome::Saved {
            path,
            bytes: body.len(),
        })
    }
}

/// Turn link text into a safe file name, falling back to the URL's last
/// path segment.
pub fn clean_file_name(name: &str, url: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.').trim().to_string();
    if !cleaned.is_empty() {
        return cleaned;
    }
    url.split(['?', '#'])
        .next()
        .and_then(|u| u.trim_end_matches('/').rsplit('/').next())
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .unwrap_or("download")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn file_names_are_cleaned() {
        assert_eq!(clean_file_name("  ecu.bin ", "http://x/a"), "ecu.bin");
        assert_eq!(clean_file_name("../../etc/passwd", "http://x/a"), "etcpasswd");
        assert_eq!(clean_file_name("   ", "http://x/files/dump.bin?x=1"), "dump.bin");
        assert_eq!(clean_file_name("", "http://x/"), "x");
        assert_eq!(clean_file_name("", "http:"), "download");
    }

    #[tokio::test]
    async fn second_download_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/attachment.php"))
            .and(header("cookie", "sid=abc"))
            .and(header("user-agent", "TestAgent"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x7fELF".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let downloader = Downloader::new(dir.path(), None).unwrap();
        let url = format!("{}/attachment.php", server.uri());
        let cookies = vec![BrowserCookie::new("sid", "abc")];

        let first = downloader
            .download(&url, "EDC16 dump", "dump.bin", &cookies, "TestAgent")
            .await
            .unwrap();
        let second = downloader
            .download(&url, "EDC16 dump", "dump.bin", &cookies, "TestAgent")
            .await
            .unwrap();

        let expected = dir.path().join("EDC16dump").join("dump.bin");
        assert_eq!(
            first,
            DownloadOutcome::Saved {
                path: expected.clone(),
                bytes: 4
            }
        );
        assert_eq!(second, DownloadOutcome::AlreadyExists(expected.clone()));
        assert_eq!(std::fs::read(expected).unwrap(), b"\x7fELF");
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let downloader = Downloader::new(dir.path(), None).unwrap();
        let result = downloader
            .download(&format!("{}/gone", server.uri()), "t", "f.bin", &[], "UA")
            .await;

        assert!(matches!(result, Err(DownloadError::Http(_))));
        assert!(!dir.path().join("t").join("f.bin").exists());
    }

    #[tokio::test]
    async fn relative_url_is_rejected() {
        let dir = tempdir().unwrap();
        let downloader = Downloader::new(dir.path(), None).unwrap();
        let result = downloader
            .download("attachment.php?id=1", "t", "f.bin", &[], "UA")
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl(_))));
    }
}
