//! Worker-side access to one job

use super::{SharedState, lock};
use crate::error::{JobError, Result};
use crate::job::{Job, JobUpdate, ProcessInfo};
use crate::process::ProcessObserver;
use crate::types::{Event, JobId, Stage};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Handle through which a pipeline mutates the job it runs.
///
/// Every mutation takes the scheduler mutex just long enough to apply a
/// [`JobUpdate`]. The cancellation token is read without any lock.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    state: SharedState,
    cancel: CancellationToken,
    events: broadcast::Sender<Event>,
}

impl JobHandle {
    pub(crate) fn new(
        id: JobId,
        state: SharedState,
        cancel: CancellationToken,
        events: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            id,
            state,
            cancel,
            events,
        }
    }

    /// Job id
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Token fired when the job is cancelled
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cooperative cancellation point
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(JobError::Cancelled {
                id: self.id.to_string(),
            }
            .into())
        } else {
            Ok(())
        }
    }

    /// Apply an update to the job record
    pub fn update(&self, update: JobUpdate) {
        let changed = self
            .with_job(|job| job.apply(update).then(|| (job.stage, job.progress)))
            .flatten();
        if let Some((stage, progress)) = changed {
            tracing::debug!(job_id = %self.id, %stage, "stage changed");
            self.events
                .send(Event::StageChanged {
                    id: self.id.clone(),
                    stage,
                    progress,
                })
                .ok();
        }
    }

    /// Append a message, logging it as well
    pub fn message(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::info!(job_id = %self.id, "{}", text);
        self.update(JobUpdate::new().message(text));
    }

    /// Append a warning message for a degraded but non-fatal step
    pub fn warn(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!(job_id = %self.id, "{}", text);
        self.update(JobUpdate::new().message(text));
    }

    /// Mark the job failed with a final explanatory message
    pub fn fail(&self, detailed: impl Into<String>, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(job_id = %self.id, "{}", message);
        self.update(
            JobUpdate::new()
                .stage(Stage::Failed)
                .detailed(detailed)
                .message(message),
        );
    }

    /// Copy of the current record
    pub fn snapshot(&self) -> Option<Job> {
        self.with_job(|job| job.clone())
    }

    /// Current stage
    pub fn stage(&self) -> Option<Stage> {
        self.with_job(|job| job.stage)
    }

    fn with_job<R>(&self, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        let mut state = lock(&self.state);
        state.jobs.get_mut(&self.id).map(f)
    }
}

impl ProcessObserver for JobHandle {
    fn attached(&self, pid: Option<u32>, tool: &str) {
        self.with_job(|job| {
            job.process = Some(ProcessInfo {
                pid,
                tool: tool.to_string(),
            })
        });
    }

    fn detached(&self) {
        self.with_job(|job| job.process = None);
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
