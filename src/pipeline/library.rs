//! Library copy and media server refresh

use super::StageContext;
use crate::config::JellyfinConfig;
use crate::error::Result;
use crate::job::JobUpdate;
use crate::types::Stage;
use crate::utils::file_name;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Files copied into one library folder
#[derive(Clone, Debug)]
pub(crate) struct LibraryBatch {
    pub(crate) files: Vec<PathBuf>,
    pub(crate) dest: PathBuf,
}

/// Regular files directly inside `dir`, sorted
pub(crate) fn files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

/// Result of a refresh request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The server accepted the request
    Refreshed,
    /// The server answered with another status
    Rejected(u16),
}

/// Asks the media server to rescan its libraries
#[derive(Clone, Debug)]
pub struct LibraryNotifier {
    http: reqwest::Client,
    refresh_url: String,
    api_key: String,
}

impl LibraryNotifier {
    /// Notifier for the server at `base_url` (scheme, host and port)
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            refresh_url: format!("{}/Library/Refresh", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
        })
    }

    /// `None` unless both host and API key are configured
    pub fn from_config(config: &JellyfinConfig, timeout: Duration) -> Result<Option<Self>> {
        let host = config.host.as_deref().map(str::trim).filter(|h| !h.is_empty());
        let api_key = config.api_key.as_deref().filter(|k| !k.is_empty());
        let (Some(host), Some(api_key)) = (host, api_key) else {
            return Ok(None);
        };
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host.trim_end_matches('/'), config.port)
        } else {
            format!("http://{}:{}", host, config.port)
        };
        Self::new(&base_url, api_key, timeout).map(Some)
    }

    /// Request a library scan
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let response = self
            .http
            .post(&self.refresh_url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;
        let status = response.status().as_u16();
        debug!(status, "library refresh answered");
        Ok(match status {
            200 | 204 => RefreshOutcome::Refreshed,
            other => RefreshOutcome::Rejected(other),
        })
    }
}

/// Whether `dest` already holds a file of the same size as `src`
async fn same_size(src: &Path, dest: &Path) -> bool {
    match (tokio::fs::metadata(src).await, tokio::fs::metadata(dest).await) {
        (Ok(a), Ok(b)) => a.len() == b.len(),
        _ => false,
    }
}

pub(crate) async fn run_library_stage(
    ctx: &StageContext<'_>,
    batches: &[LibraryBatch],
    notifier: Option<&LibraryNotifier>,
) -> Result<()> {
    ctx.job.update(
        JobUpdate::new()
            .stage(Stage::CopyingToLibrary)
            .progress(95.0)
            .stage_progress(0.0)
            .detailed("Copying files to library")
            .message("Starting copy to media library"),
    );

    match copy_batches(ctx, batches).await {
        Ok(copied) => ctx.job.update(
            JobUpdate::new()
                .progress(98.0)
                .stage_progress(100.0)
                .detailed("Copy to library completed")
                .message(format!("Copied {copied} files to library")),
        ),
        Err(e) if ctx.job.is_cancelled() => return Err(e),
        Err(e) => ctx.job.warn(format!("Error copying files to library: {e}")),
    }

    if let Some(notifier) = notifier {
        ctx.job.message("Triggering library scan");
        match notifier.refresh().await {
            Ok(RefreshOutcome::Refreshed) => ctx.job.message("Successfully triggered library scan"),
            Ok(RefreshOutcome::Rejected(status)) => ctx
                .job
                .warn(format!("Failed to trigger library scan: HTTP {status}")),
            Err(e) => ctx.job.warn(format!("Error triggering library scan: {e}")),
        }
    }
    Ok(())
}

async fn copy_batches(ctx: &StageContext<'_>, batches: &[LibraryBatch]) -> Result<usize> {
    let total: usize = batches.iter().map(|b| b.files.len()).sum();
    let mut done = 0;
    let mut copied = 0;

    for batch in batches {
        tokio::fs::create_dir_all(&batch.dest).await?;
        for src in &batch.files {
            ctx.job.ensure_active()?;
            let name = file_name(src);
            let dest = batch.dest.join(&name);
            if same_size(src, &dest).await {
                ctx.job
                    .message(format!("Skipped {name} - already exists"));
            } else {
                tokio::fs::copy(src, &dest).await?;
                copied += 1;
                ctx.job.message(format!("Copied {name} to library"));
            }
            done += 1;
            ctx.job.update(
                JobUpdate::new()
                    .file(name)
                    .stage_progress(done as f64 / total as f64 * 100.0),
            );
        }
    }
    Ok(copied)
}
