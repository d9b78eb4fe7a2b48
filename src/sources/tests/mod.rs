use super::*;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::JobId;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

mod registration;

/// Lister serving canned entries per URL; unknown URLs fail
#[derive(Default)]
struct FakeLister {
    lists: Mutex<HashMap<String, Vec<RemoteEntry>>>,
}

impl FakeLister {
    fn set(&self, url: &str, ids: &[&str]) {
        let entries = ids
            .iter()
            .enumerate()
            .map(|(i, id)| RemoteEntry {
                index: u32::try_from(i + 1).unwrap(),
                id: id.to_string(),
                title: format!("Title {id}"),
                extractor: Some("youtube".into()),
            })
            .collect();
        self.lists.lock().unwrap().insert(url.to_string(), entries);
    }
}

#[async_trait]
impl RemoteLister for FakeLister {
    async fn list(&self, url: &str) -> Result<Vec<RemoteEntry>> {
        self.lists
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Other(format!("no listing for {url}")))
    }
}

/// Submitter recording requests
#[derive(Default)]
struct FakeSubmitter {
    requests: Mutex<Vec<TrackedJobRequest>>,
    live: Mutex<HashSet<String>>,
}

impl FakeSubmitter {
    fn requests(&self) -> Vec<TrackedJobRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobSubmitter for FakeSubmitter {
    async fn submit_tracked(&self, request: TrackedJobRequest) -> Result<JobId> {
        self.requests.lock().unwrap().push(request);
        Ok(JobId::new())
    }

    fn has_live_job(&self, source_id: &str) -> bool {
        self.live.lock().unwrap().contains(source_id)
    }
}

struct Fixture {
    tracker: Arc<SourceTracker>,
    lister: Arc<FakeLister>,
    submitter: Arc<FakeSubmitter>,
    db: Arc<Database>,
    dir: TempDir,
}

impl Fixture {
    fn output(&self) -> std::path::PathBuf {
        self.dir.path().join("media")
    }

    fn season_dir(&self, show: &str, season: &str) -> std::path::PathBuf {
        let dir = crate::utils::season_folder(&self.output(), show, season);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(Database::new(&dir.path().join("tubarr.db")).await.unwrap());
    let lister = Arc::new(FakeLister::default());
    let tracker = Arc::new(SourceTracker::new(
        db.clone(),
        lister.clone(),
        dir.path().join("archives"),
        dir.path().join("media"),
    ));
    Fixture {
        tracker,
        lister,
        submitter: Arc::new(FakeSubmitter::default()),
        db,
        dir,
    }
}

fn touch(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), b"x").unwrap();
}

const PLAYLIST: &str = "https://www.youtube.com/playlist?list=PLabc";
const CHANNEL: &str = "https://www.youtube.com/@somechannel";
