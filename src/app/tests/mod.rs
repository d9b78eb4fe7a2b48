use super::*;
use crate::sources::RemoteEntry;
use crate::types::JobId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;


/// Lister serving canned entries per URL; unknown URLs fail
#[derive(Default)]
struct FakeLister {
    lists: Mutex<HashMap<String, Vec<RemoteEntry>>>,
}

impl FakeLister {
    fn with(url: &str, entries: &[(&str, &str)]) -> Arc<Self> {
        let lister = Self::default();
        lister.set(url, entries);
        Arc::new(lister)
    }

    fn set(&self, url: &str, entries: &[(&str, &str)]) {
        let entries = entries
            .iter()
            .enumerate()
            .map(|(i, (id, title))| RemoteEntry {
                index: u32::try_from(i + 1).unwrap(),
                id: id.to_string(),
                title: title.to_string(),
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

/// Configuration rooted in `dir` whose tools do not exist, so every job
/// fails its dependency check without touching the network.
fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.media.output_dir = dir.path().join("media");
    config.persistence.state_dir = dir.path().join("state");
    config.jobs.cancel_grace = Duration::from_secs(1);
    let missing = dir.path().join("missing");
    config.downloader.ytdlp_path = missing.join("yt-dlp");
    config.tools.ffmpeg_path = missing.join("ffmpeg");
    config.tools.ffprobe_path = missing.join("ffprobe");
    config.tools.convert_path = missing.join("convert");
    config.tools.montage_path = missing.join("montage");
    config
}

async fn app_with(lister: Arc<FakeLister>) -> (Tubarr, TempDir) {
    let dir = TempDir::new().unwrap();
    let app = Tubarr::with_lister(test_config(&dir), lister).await.unwrap();
    (app, dir)
}

async fn settle(app: &Tubarr) {
    tokio::time::timeout(Duration::from_secs(10), app.scheduler().wait_idle())
        .await
        .unwrap();
}

fn find(app: &Tubarr, id: &JobId) -> crate::job::JobView {
    app.get_job(id).expect("job should exist")
}
