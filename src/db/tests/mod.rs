use super::*;
use crate::error::{DatabaseError, Error};
use tempfile::NamedTempFile;

mod episodes;

/// Helper: create a fresh database with migrations applied
async fn setup_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

fn sample_source(id: &str, kind: SourceKind) -> TrackedSource {
    let now = Utc::now();
    TrackedSource {
        id: id.to_string(),
        kind,
        url: format!("https://www.youtube.com/playlist?list={}", id),
        show_name: "Test Show".to_string(),
        season_num: "01".to_string(),
        ledger_path: PathBuf::from(format!("/tmp/archives/{}.txt", id)),
        enabled: true,
        resume_cursor: 1,
        retention: RetentionPolicy::KeepAll,
        created_at: now,
        updated_at: now,
        last_checked: None,
        last_error: None,
    }
}
