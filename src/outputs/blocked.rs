//! Side-channel log of URLs that produced no records because of a block or
//! exhausted retries.
//!
//! The log is append-only, unordered, and may contain duplicates. Each entry
//! is written as one complete line under a lock so concurrent fetches never
//! interleave partial lines.

use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::instrument;

/// Destination for blocked or exhausted URLs.
pub trait BlockedSink {
    async fn append(&self, url: &str) -> std::io::Result<()>;
}

/// Appends one URL per line to a plain-text file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    /// Open `path` for appending, creating it if needed.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockedSink for FileSink {
    async fn append(&self, url: &str) -> std::io::Result<()> {
        let line = format!("{url}\n");
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}
