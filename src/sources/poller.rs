//! Periodic polling of tracked sources
//!
//! Runs [`SourceTracker::poll_all`] once at start and then every interval
//! until the shutdown token fires. A cycle that fails for one source never
//! ends the loop.

use super::{JobSubmitter, SourceTracker};
use crate::types::Event;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Background poller for tracked sources
pub struct SourcePoller {
    tracker: Arc<SourceTracker>,
    submitter: Arc<dyn JobSubmitter>,
    interval: Duration,
    events: broadcast::Sender<Event>,
    shutdown: CancellationToken,
}

impl SourcePoller {
    /// Creates a new poller
    ///
    /// # Parameters
    /// - `tracker`: the source tracker to poll
    /// - `submitter`: where new jobs are submitted
    /// - `interval`: time between cycles
    /// - `events`: channel receiving a `SourcePolled` event per created job
    /// - `shutdown`: stops the loop when cancelled
    pub fn new(
        tracker: Arc<SourceTracker>,
        submitter: Arc<dyn JobSubmitter>,
        interval: Duration,
        events: broadcast::Sender<Event>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            tracker,
            submitter,
            interval,
            events,
            shutdown,
        }
    }

    /// Run one polling cycle, returning how many jobs were submitted
    pub async fn cycle(&self) -> usize {
        let jobs = self.tracker.poll_all(self.submitter.as_ref()).await;
        for (source_id, job_id) in &jobs {
            self.events
                .send(Event::SourcePolled {
                    source_id: source_id.clone(),
                    job_id: Some(job_id.clone()),
                })
                .ok();
        }
        jobs.len()
    }

    /// Poll until shutdown.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "source poller started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            let submitted = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                submitted = self.cycle() => submitted,
            };
            debug!(submitted, "source poll cycle finished");

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("source poller stopped");
    }

    /// Spawn [`run`](Self::run) on the runtime
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
