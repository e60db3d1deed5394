//! Best-effort media prefetching
//!
//! Warms a local copy of the picture so it can be shown without waiting on the
//! network. Failures are reported to the caller, which only logs them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while prefetching a media asset
#[derive(Debug, Error)]
pub enum PrefetchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Media host answered with a non-success status
    #[error("Media host returned status {0}")]
    Status(StatusCode),

    /// Writing the asset to disk failed
    #[error("Failed to store media: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches a media asset ahead of display
#[async_trait]
pub trait MediaPrefetcher: Send + Sync {
    async fn prefetch(&self, url: &str) -> Result<(), PrefetchError>;

    /// Deletes every locally stored asset
    fn purge(&self) -> Result<(), PrefetchError> {
        Ok(())
    }
}

/// Downloads assets into a media directory
#[derive(Debug, Clone)]
pub struct HttpPrefetcher {
    http_client: Client,
    media_dir: PathBuf,
}

impl HttpPrefetcher {
    /// Creates a prefetcher that stores assets under `media_dir`
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            http_client: Client::new(),
            media_dir: media_dir.into(),
        }
    }

    /// Directory assets are written to
    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Local path an asset is stored at
    pub fn local_path(&self, url: &str) -> PathBuf {
        self.media_dir.join(file_name_for(url))
    }

    /// Writes an asset and removes every other file in the media directory
    ///
    /// Only the current picture is kept, so the directory never holds more
    /// than one asset.
    async fn store_asset(&self, url: &str, bytes: &[u8]) -> Result<PathBuf, PrefetchError> {
        tokio::fs::create_dir_all(&self.media_dir).await?;
        let path = self.local_path(url);
        tokio::fs::write(&path, bytes).await?;

        let mut entries = tokio::fs::read_dir(&self.media_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let stale = entry.path();
            if stale != path && entry.file_type().await?.is_file() {
                tokio::fs::remove_file(&stale).await?;
                debug!(path = %stale.display(), "removed previous media");
            }
        }

        Ok(path)
    }
}

#[async_trait]
impl MediaPrefetcher for HttpPrefetcher {
    async fn prefetch(&self, url: &str) -> Result<(), PrefetchError> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PrefetchError::Status(status));
        }
        let bytes = response.bytes().await?;

        let path = self.store_asset(url, &bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "media prefetched");
        Ok(())
    }

    fn purge(&self) -> Result<(), PrefetchError> {
        match std::fs::remove_dir_all(&self.media_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Prefetcher that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPrefetcher;

#[async_trait]
impl MediaPrefetcher for NoopPrefetcher {
    async fn prefetch(&self, _url: &str) -> Result<(), PrefetchError> {
        Ok(())
    }
}

/// Derives a filesystem-safe name from the last path segment of a URL
fn file_name_for(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let segment = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    let sanitized: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "media".to_string()
    } else {
        sanitized
    }
}
