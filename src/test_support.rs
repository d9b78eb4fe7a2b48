//! Shared helpers for tests that stand in for external tools.

use std::path::{Path, PathBuf};

/// Write an executable shell script into `dir`
#[cfg(unix)]
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// A flat-playlist JSON document with entries `(id, title)` numbered from 1
pub(crate) fn flat_playlist_json(entries: &[(&str, &str)]) -> String {
    let entries: Vec<serde_json::Value> = entries
        .iter()
        .enumerate()
        .map(|(i, (id, title))| {
            serde_json::json!({
                "id": id,
                "title": title,
                "ie_key": "Youtube",
                "playlist_index": i + 1,
            })
        })
        .collect();
    serde_json::json!({ "entries": entries, "playlist_count": entries.len() }).to_string()
}

/// A handle on `job` outside any scheduler, for driving pipeline stages directly
pub(crate) fn detached_handle(job: crate::job::Job) -> crate::scheduler::JobHandle {
    use crate::scheduler::{JobHandle, SchedulerState};
    use std::sync::{Arc, Mutex};

    let id = job.id.clone();
    let mut state = SchedulerState::default();
    state.jobs.insert(id.clone(), job);
    let (events, _) = tokio::sync::broadcast::channel(64);
    JobHandle::new(
        id,
        Arc::new(Mutex::new(state)),
        tokio_util::sync::CancellationToken::new(),
        events,
    )
}
