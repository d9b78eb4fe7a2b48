//! # tubarr
//!
//! Media acquisition orchestrator: turns video playlists, single videos and
//! albums into an organised TV, movie and music library by driving yt-dlp,
//! ffmpeg and ImageMagick as child processes.
//!
//! ## Design
//!
//! - **Jobs, not scripts** - every acquisition is a [`job::Job`] moving through
//!   fixed [`Stage`]s, observable while it runs and cancellable at any point
//! - **Bounded concurrency** - the [`Scheduler`] admits a fixed number of jobs
//!   and queues the rest in submission order
//! - **Tracked sources** - playlists and channel subscriptions are polled and
//!   only new items are fetched, numbered after the last known episode
//! - **Event-driven** - consumers subscribe to [`Event`]s instead of polling
//!
//! ## Quick Start
//!
//! ```no_run
//! use tubarr::{Config, Tubarr};
//! use tubarr::app::TvJobRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = Tubarr::new(Config::load()?).await?;
//!
//!     let mut events = app.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let job_id = app
//!         .create_job(TvJobRequest {
//!             playlist_url: "https://www.youtube.com/playlist?list=PL123".into(),
//!             show_name: "My Show".into(),
//!             season_num: "01".into(),
//!             episode_start: "1".into(),
//!             playlist_start: None,
//!             track_playlist: true,
//!         })
//!         .await?;
//!     println!("queued {job_id}");
//!
//!     tubarr::run_with_shutdown(app).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Application context and its operations
pub mod app;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Job state and updates
pub mod job;
/// Sidecar metadata, episode resolution and description files
pub mod metadata;
/// Acquisition pipeline stages
pub mod pipeline;
/// External process supervision
pub mod process;
/// Tool output progress parsing
pub mod progress;
/// Output pruning for tracked sources
pub mod retention;
/// Retry logic with exponential backoff
pub mod retry;
/// Bounded job scheduling
pub mod scheduler;
/// Tracked playlists and channel subscriptions
pub mod sources;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use app::Tubarr;
pub use config::Config;
pub use db::Database;
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, JobError, MetadataError, Result, SourceError,
    ToHttpStatus, ToolError,
};
pub use job::{Job, JobTarget, JobUpdate, JobView};
pub use pipeline::Pipeline;
pub use scheduler::{JobExecutor, Scheduler, SchedulerLimits};
pub use sources::{SourceKind, SourceTracker, TrackedSource};
pub use types::{Event, JobId, MediaKind, Stage, TrackMetadata};

/// Run until a termination signal arrives, then shut the app down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use tubarr::{Config, Tubarr, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let app = Tubarr::new(Config::default()).await?;
///     let _poller = app.start_update_checker();
///
///     run_with_shutdown(app).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(app: Tubarr) -> Result<()> {
    wait_for_signal().await;
    app.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
