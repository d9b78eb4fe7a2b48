//! Source poller startup and shutdown coordination.

use super::Tubarr;
use crate::error::Result;
use crate::sources::SourcePoller;
use crate::types::Event;
use std::sync::Arc;

impl Tubarr {
    /// Start the source poller background task.
    ///
    /// Returns a finished no-op task when the update checker is disabled.
    /// The poller stops when [`shutdown`](Self::shutdown) runs.
    pub fn start_update_checker(&self) -> tokio::task::JoinHandle<()> {
        let settings = &self.config.update_checker;
        if !settings.enabled {
            tracing::info!("Update checker disabled, skipping source poller");
            return tokio::spawn(async {});
        }

        let poller = SourcePoller::new(
            self.tracker.clone(),
            Arc::new(self.clone()),
            settings.interval(),
            self.event_tx.clone(),
            self.shutdown.clone(),
        );
        tracing::info!(
            interval_minutes = settings.interval_minutes,
            "Source poller background task started"
        );
        poller.spawn()
    }

    /// Gracefully shut down.
    ///
    /// 1. Stops the poller and aborts remote listings in progress
    /// 2. Stops accepting jobs, cancels every live job and waits for the
    ///    workers to finish (bounded by a timeout)
    /// 3. Emits [`Event::Shutdown`]
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");
        self.shutdown.cancel();

        let grace = self.config.jobs.cancel_grace * 2 + std::time::Duration::from_secs(30);
        match tokio::time::timeout(grace, self.scheduler.shutdown()).await {
            Ok(()) => tracing::info!("All jobs stopped"),
            Err(_) => tracing::warn!("Timeout waiting for jobs to stop, proceeding with shutdown"),
        }

        self.event_tx.send(Event::Shutdown).ok();
        tracing::info!("Shutdown complete");
        Ok(())
    }
}
