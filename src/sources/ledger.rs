//! Append-only ledger of fetched item ids
//!
//! The file doubles as the downloader's `--download-archive`, whose lines
//! look like `youtube dQw4w9WgXcQ`. Membership tests therefore accept either
//! the bare id or the last whitespace-separated token of a line.

use crate::error::SourceError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Ledger file of one tracked source
#[derive(Clone, Debug)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// Ledger at `path`; the file is created lazily
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger of source `id` inside `archive_dir`
    pub fn for_source(archive_dir: &Path, id: &str) -> Self {
        Self::new(archive_dir.join(format!("{}.txt", id)))
    }

    /// File path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ids recorded so far. A missing file is an empty ledger.
    pub async fn load(&self) -> Result<HashSet<String>, SourceError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(self.error(e)),
        };
        Ok(text
            .lines()
            .filter_map(|line| line.split_whitespace().last())
            .map(str::to_string)
            .collect())
    }

    /// Number of non-empty lines
    pub async fn len(&self) -> Result<usize, SourceError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(text.lines().filter(|l| !l.trim().is_empty()).count()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(self.error(e)),
        }
    }

    /// Whether the ledger has no entries
    pub async fn is_empty(&self) -> Result<bool, SourceError> {
        Ok(self.len().await? == 0)
    }

    /// Append ids, creating the file and its directory when needed
    pub async fn append<I, S>(&self, ids: I) -> Result<usize, SourceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut buf = String::new();
        let mut count = 0;
        for id in ids {
            let id = id.as_ref().trim();
            if id.is_empty() {
                continue;
            }
            buf.push_str(id);
            buf.push('\n');
            count += 1;
        }
        if count == 0 {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error(e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.error(e))?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| self.error(e))?;
        file.flush().await.map_err(|e| self.error(e))?;
        Ok(count)
    }

    /// Delete the file; a missing file is fine
    pub async fn remove(&self) -> Result<(), SourceError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.error(e)),
        }
    }

    fn error(&self, e: std::io::Error) -> SourceError {
        SourceError::Ledger {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}
