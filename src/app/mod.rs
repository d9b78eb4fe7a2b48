//! Application context split into focused submodules.
//!
//! The [`Tubarr`] struct and its methods are organized by domain:
//! - [`jobs`] - TV, movie and music job submission and queries
//! - [`media`] - Listing of the organised library on disk
//! - [`sources`] - Tracked playlists and channel subscriptions
//! - [`lifecycle`] - Source poller startup and graceful shutdown

mod jobs;
mod lifecycle;
mod media;
mod sources;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use jobs::{MovieJobRequest, MusicJobRequest, TvJobRequest};
pub use media::{MediaEpisode, MediaSeason, MediaShow, MovieEntry};

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::process::ProcessRunner;
use crate::scheduler::{Scheduler, SchedulerLimits};
use crate::sources::{RemoteLister, SourceTracker, YtDlpLister};
use crate::types::Event;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Capacity of the event channel; slow subscribers lag beyond it
const EVENT_CAPACITY: usize = 1000;

/// Main application instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Tubarr {
    /// Database of tracked sources and episode counters.
    /// Public for integration tests to inspect stored state
    pub db: Arc<Database>,
    pub(crate) config: Arc<Config>,
    pub(crate) scheduler: Scheduler,
    pub(crate) tracker: Arc<SourceTracker>,
    pub(crate) lister: Arc<dyn RemoteLister>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Fired on shutdown; stops the poller and any listing in progress
    pub(crate) shutdown: CancellationToken,
}

impl Tubarr {
    /// Create a new instance.
    ///
    /// Validates the configuration, creates the output and state
    /// directories, opens the database and wires the scheduler to an
    /// acquisition [`Pipeline`]. Remote listings go through `yt-dlp`.
    pub async fn new(config: Config) -> Result<Self> {
        let shutdown = CancellationToken::new();
        let cookies = config
            .downloader
            .cookies_path
            .clone()
            .filter(|path| path.exists());
        let lister = YtDlpLister::new(
            config.downloader.ytdlp_path.clone(),
            cookies,
            ProcessRunner::new(config.jobs.cancel_grace, config.jobs.probe_timeout),
            shutdown.clone(),
        );
        Self::build(config, Arc::new(lister), shutdown).await
    }

    /// Like [`new`](Self::new) but with a custom remote lister
    pub async fn with_lister(config: Config, lister: Arc<dyn RemoteLister>) -> Result<Self> {
        Self::build(config, lister, CancellationToken::new()).await
    }

    async fn build(
        config: Config,
        lister: Arc<dyn RemoteLister>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        for dir in [&config.media.output_dir, &config.persistence.state_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory '{}': {}", dir.display(), e),
                ))
            })?;
        }

        let config = Arc::new(config);
        let db = Arc::new(Database::new(&config.persistence.database_path()).await?);
        let (event_tx, _rx) = broadcast::channel(EVENT_CAPACITY);

        let tracker = Arc::new(SourceTracker::new(
            db.clone(),
            lister.clone(),
            config.persistence.archive_dir(),
            config.media.output_dir.clone(),
        ));
        let pipeline = Pipeline::new(config.clone(), db.clone())?.with_tracker(tracker.clone());
        let scheduler = Scheduler::new(
            Arc::new(pipeline),
            SchedulerLimits {
                max_concurrent_jobs: config.jobs.max_concurrent_jobs,
                completed_jobs_limit: config.jobs.completed_jobs_limit,
            },
            event_tx.clone(),
        );

        tracing::info!(
            output_dir = %config.media.output_dir.display(),
            max_concurrent_jobs = config.jobs.max_concurrent_jobs,
            "tubarr initialised"
        );

        Ok(Self {
            db,
            config,
            scheduler,
            tracker,
            lister,
            event_tx,
            shutdown,
        })
    }

    /// The configuration this instance runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The job scheduler
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The source tracker
    pub fn tracker(&self) -> &Arc<SourceTracker> {
        &self.tracker
    }

    /// Receive job and source events.
    ///
    /// Each subscriber gets every event sent after it subscribed; a receiver
    /// that falls more than the channel capacity behind sees `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}
