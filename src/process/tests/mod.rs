use super::*;
use crate::test_support::write_script;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use std::path::Path;
use tokio_util::sync::CancellationToken;


fn runner() -> ProcessRunner {
    ProcessRunner::new(Duration::from_millis(500), Duration::from_secs(5))
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl ProcessObserver for RecordingObserver {
    fn attached(&self, pid: Option<u32>, tool: &str) {
        assert!(pid.is_some());
        self.events.lock().unwrap().push(format!("attach {tool}"));
    }

    fn detached(&self) {
        self.events.lock().unwrap().push("detach".to_string());
    }
}
