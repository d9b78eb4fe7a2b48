//! Bounded-concurrency job scheduler
//!
//! Owns every [`Job`], admits at most `max_concurrent_jobs` of them to a
//! worker task, keeps the rest in a FIFO wait queue and promotes the next
//! queued job whenever a worker finishes. All bookkeeping happens under one
//! mutex that is never held across an await point.

mod handle;

pub use handle::JobHandle;

use crate::error::{Error, Result};
use crate::job::{Job, JobUpdate, JobView};
use crate::types::{Event, JobId, Stage};
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Notify, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub(crate) type SharedState = Arc<Mutex<SchedulerState>>;

/// Runs the pipeline for one admitted job.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Drive the job to a terminal stage.
    ///
    /// Returning `Err` marks the job failed with the error text unless it is
    /// already terminal.
    async fn execute(&self, job: JobHandle) -> Result<()>;
}

/// Scheduler limits
#[derive(Clone, Copy, Debug)]
pub struct SchedulerLimits {
    /// Jobs allowed to run at once
    pub max_concurrent_jobs: usize,
    /// Completed/failed jobs retained in the table
    pub completed_jobs_limit: usize,
}

/// Job table plus admission bookkeeping
#[derive(Default)]
pub struct SchedulerState {
    pub(crate) jobs: HashMap<JobId, Job>,
    tokens: HashMap<JobId, CancellationToken>,
    active: HashSet<JobId>,
    waiting: VecDeque<JobId>,
}

impl SchedulerState {
    /// Ids currently running
    pub fn active(&self) -> &HashSet<JobId> {
        &self.active
    }

    /// Ids waiting for a slot, front first
    pub fn waiting(&self) -> &VecDeque<JobId> {
        &self.waiting
    }

    /// Drop the oldest completed/failed jobs beyond `limit`.
    fn evict_terminal(&mut self, limit: usize) {
        let mut finished: Vec<(chrono::DateTime<chrono::Local>, JobId)> = self
            .jobs
            .values()
            .filter(|job| matches!(job.stage, Stage::Completed | Stage::Failed))
            .map(|job| (job.updated_at, job.id.clone()))
            .collect();
        if finished.len() <= limit {
            return;
        }
        finished.sort();
        let excess = finished.len() - limit;
        for (_, id) in finished.into_iter().take(excess) {
            self.jobs.remove(&id);
            self.tokens.remove(&id);
        }
    }
}

pub(crate) fn lock(state: &SharedState) -> MutexGuard<'_, SchedulerState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The scheduler. Cheap to clone; clones share one job table.
#[derive(Clone)]
pub struct Scheduler {
    state: SharedState,
    executor: Arc<dyn JobExecutor>,
    limits: SchedulerLimits,
    events: broadcast::Sender<Event>,
    accepting: Arc<AtomicBool>,
    idle: Arc<Notify>,
}

impl Scheduler {
    /// Create a scheduler driving jobs through `executor`
    pub fn new(
        executor: Arc<dyn JobExecutor>,
        limits: SchedulerLimits,
        events: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::default())),
            executor,
            limits,
            events,
            accepting: Arc::new(AtomicBool::new(true)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Add a job. It starts immediately when a slot is free, otherwise it
    /// waits in FIFO order with a "Job queued" message.
    pub fn submit(&self, job: Job) -> Result<JobId> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let id = job.id.clone();
        let kind = job.kind();
        let start = {
            let mut state = lock(&self.state);
            state.evict_terminal(self.limits.completed_jobs_limit);
            state.jobs.insert(id.clone(), job);
            state.tokens.insert(id.clone(), CancellationToken::new());

            if state.active.len() < self.limits.max_concurrent_jobs {
                Some(self.admit(&mut state, &id))
            } else {
                state.waiting.push_back(id.clone());
                if let Some(job) = state.jobs.get_mut(&id) {
                    job.apply(JobUpdate::new().detailed("Job queued").message("Job queued"));
                }
                None
            }
        };

        info!(job_id = %id, %kind, started = start.is_some(), "job submitted");
        self.events.send(Event::JobQueued { id: id.clone(), kind }).ok();
        if let Some(handle) = start {
            self.spawn_worker(handle);
        }
        Ok(id)
    }

    /// Cancel a job.
    ///
    /// Returns `false` for unknown or terminal jobs. A waiting job is removed
    /// from the queue without ever starting a process; a running job has its
    /// token fired, which terminates its process group.
    pub fn cancel(&self, id: &JobId) -> bool {
        {
            let mut state = lock(&self.state);
            let Some(job) = state.jobs.get(id) else {
                return false;
            };
            if job.stage.is_terminal() {
                return false;
            }

            state.waiting.retain(|queued| queued != id);
            if let Some(token) = state.tokens.get(id) {
                token.cancel();
            }
            if let Some(job) = state.jobs.get_mut(id) {
                job.process = None;
                job.apply(
                    JobUpdate::new()
                        .stage(Stage::Cancelled)
                        .detailed("Job cancelled")
                        .message("Job cancelled"),
                );
            }
        }

        info!(job_id = %id, "job cancelled");
        self.events.send(Event::JobCancelled { id: id.clone() }).ok();
        true
    }

    /// Release the slot of a finished job and admit waiting jobs while
    /// capacity remains.
    pub fn on_complete(&self, id: &JobId) {
        let started = {
            let mut state = lock(&self.state);
            state.active.remove(id);

            let mut started = Vec::new();
            while self.accepting.load(Ordering::SeqCst)
                && state.active.len() < self.limits.max_concurrent_jobs
            {
                let Some(next) = state.waiting.pop_front() else {
                    break;
                };
                let runnable = state
                    .jobs
                    .get(&next)
                    .is_some_and(|job| !job.stage.is_terminal());
                if runnable {
                    started.push(self.admit(&mut state, &next));
                }
            }
            started
        };

        for handle in started {
            self.spawn_worker(handle);
        }
        self.idle.notify_waiters();
    }

    /// Full view of one job with the newest `message_limit` messages
    pub fn get(&self, id: &JobId, message_limit: usize) -> Option<JobView> {
        lock(&self.state)
            .jobs
            .get(id)
            .map(|job| job.view(Some(message_limit)))
    }

    /// Views of every job, newest first, without messages
    pub fn list(&self) -> Vec<JobView> {
        let state = lock(&self.state);
        let mut jobs: Vec<&Job> = state.jobs.values().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.into_iter().map(|job| job.view(None)).collect()
    }

    /// Copy of a job record
    pub fn snapshot(&self, id: &JobId) -> Option<Job> {
        lock(&self.state).jobs.get(id).cloned()
    }

    /// Whether a non-terminal job exists for a tracked source
    pub fn has_live_job_for_source(&self, source_id: &str) -> bool {
        lock(&self.state).jobs.values().any(|job| {
            !job.stage.is_terminal() && job.source_id.as_deref() == Some(source_id)
        })
    }

    /// `(active, waiting)` counts
    pub fn counts(&self) -> (usize, usize) {
        let state = lock(&self.state);
        (state.active.len(), state.waiting.len())
    }

    /// Run `f` with the locked state (tests and diagnostics)
    pub fn inspect<R>(&self, f: impl FnOnce(&SchedulerState) -> R) -> R {
        f(&lock(&self.state))
    }

    /// Stop admitting jobs, cancel everything live and wait for workers.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let live: Vec<JobId> = {
            let state = lock(&self.state);
            state
                .jobs
                .values()
                .filter(|job| !job.stage.is_terminal())
                .map(|job| job.id.clone())
                .collect()
        };
        for id in &live {
            self.cancel(id);
        }
        self.wait_idle().await;
    }

    /// Resolve once no job holds a worker slot
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if lock(&self.state).active.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Move a job into `active`; caller holds the lock.
    fn admit(&self, state: &mut SchedulerState, id: &JobId) -> JobHandle {
        state.active.insert(id.clone());
        if let Some(job) = state.jobs.get_mut(id) {
            job.apply(
                JobUpdate::new()
                    .stage(Stage::InProgress)
                    .detailed("Starting job"),
            );
        }
        let token = state.tokens.entry(id.clone()).or_default().clone();
        JobHandle::new(id.clone(), self.state.clone(), token, self.events.clone())
    }

    fn spawn_worker(&self, handle: JobHandle) {
        let scheduler = self.clone();
        self.events
            .send(Event::JobStarted {
                id: handle.id().clone(),
            })
            .ok();

        tokio::spawn(async move {
            let id = handle.id().clone();
            let result = AssertUnwindSafe(scheduler.executor.execute(handle.clone()))
                .catch_unwind()
                .await;

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::Other("job worker panicked".to_string())),
            };
            scheduler.finish(&handle, outcome);
            scheduler.on_complete(&id);
        });
    }

    /// Force a terminal stage once the executor returns.
    fn finish(&self, handle: &JobHandle, outcome: Result<()>) {
        let id = handle.id().clone();
        let stage = handle.stage();
        if stage.is_none_or(|s| s.is_terminal()) {
            if stage == Some(Stage::Failed) {
                let error = handle
                    .snapshot()
                    .and_then(|job| job.last_message().map(str::to_string))
                    .unwrap_or_default();
                self.events.send(Event::JobFailed { id, error }).ok();
            } else if stage == Some(Stage::Completed) {
                self.events.send(Event::JobCompleted { id }).ok();
            }
            return;
        }

        match outcome {
            Ok(()) => {
                warn!(job_id = %id, "executor returned without finishing the job");
                handle.update(
                    JobUpdate::new()
                        .stage(Stage::Completed)
                        .progress(100.0)
                        .detailed("Job completed")
                        .message("Job completed successfully"),
                );
                self.events.send(Event::JobCompleted { id }).ok();
            }
            Err(_) if handle.is_cancelled() => {
                handle.update(JobUpdate::new().stage(Stage::Cancelled).message("Job cancelled"));
            }
            Err(e) => {
                error!(job_id = %id, error = %e, "job failed");
                let message = format!("Error: {}", e);
                handle.update(
                    JobUpdate::new()
                        .stage(Stage::Failed)
                        .detailed("Job failed")
                        .message(message.clone()),
                );
                self.events.send(Event::JobFailed { id, error: message }).ok();
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
