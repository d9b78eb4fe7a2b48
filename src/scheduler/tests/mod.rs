use super::*;
use crate::job::JobTarget;
use std::time::Duration;
use tokio::sync::Semaphore;


/// Executor that holds every job until the test releases a permit.
///
/// Jobs whose URL is `fail` return an error, `panic` panics and `done`
/// finishes the job itself without waiting.
struct GatedExecutor {
    gate: Semaphore,
    started: Mutex<Vec<JobId>>,
}

impl GatedExecutor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            started: Mutex::new(Vec::new()),
        })
    }

    fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    fn started(&self) -> Vec<JobId> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobExecutor for GatedExecutor {
    async fn execute(&self, job: JobHandle) -> Result<()> {
        self.started.lock().unwrap().push(job.id().clone());
        job.update(JobUpdate::new().stage(Stage::Downloading).message("Downloading"));

        let url = job.snapshot().map(|j| j.url).unwrap_or_default();
        match url.as_str() {
            "fail" => return Err(Error::Other("downloader exited with code 1".into())),
            "panic" => panic!("worker blew up"),
            "done" => {
                job.update(
                    JobUpdate::new()
                        .stage(Stage::Completed)
                        .progress(100.0)
                        .message("Job completed successfully"),
                );
                return Ok(());
            }
            _ => {}
        }

        tokio::select! {
            _ = job.cancel_token().cancelled() => {
                job.ensure_active()?;
                Ok(())
            }
            permit = self.gate.acquire() => {
                if let Ok(permit) = permit {
                    permit.forget();
                }
                Ok(())
            }
        }
    }
}

fn tv_job(url: &str) -> Job {
    Job::new(
        url,
        JobTarget::Tv {
            show_name: "Show".into(),
            season_num: "01".into(),
            episode_start: "1".into(),
            playlist_start: None,
        },
    )
}

fn scheduler(executor: Arc<GatedExecutor>, max: usize, keep: usize) -> Scheduler {
    let (tx, _rx) = broadcast::channel(64);
    Scheduler::new(
        executor,
        SchedulerLimits {
            max_concurrent_jobs: max,
            completed_jobs_limit: keep,
        },
        tx,
    )
}

/// Poll `cond` until it holds or two seconds pass.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

fn stage_of(scheduler: &Scheduler, id: &JobId) -> Stage {
    scheduler.snapshot(id).unwrap().stage
}
