//! Database layer for tubarr
//!
//! SQLite persistence for tracked sources and the per-season episode
//! tracker. Job state is deliberately not persisted.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`sources`] - Tracked playlist and channel records
//! - [`episodes`] - Last episode number per show and season

use crate::retention::RetentionPolicy;
use crate::sources::{SourceKind, TrackedSource};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

mod episodes;
mod migrations;
mod sources;

/// Tracked source record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct TrackedSourceRow {
    /// Source id derived from the URL
    pub id: String,
    /// "playlist" or "channel"
    pub kind: String,
    /// Remote URL
    pub url: String,
    /// Show name
    pub show_name: String,
    /// Season number text
    pub season_num: String,
    /// Ledger file path
    pub ledger_path: String,
    /// Whether the source is polled (0 = no, 1 = yes)
    pub enabled: i32,
    /// 1-based resume position
    pub resume_cursor: i64,
    /// Retention mode ("all", "episodes", "days")
    pub retention_mode: String,
    /// Retention count, if the mode takes one
    pub retention_value: Option<i64>,
    /// Unix timestamp of registration
    pub created_at: i64,
    /// Unix timestamp of the last change
    pub updated_at: i64,
    /// Unix timestamp of the last poll
    pub last_checked: Option<i64>,
    /// Error of the last poll
    pub last_error: Option<String>,
}

fn from_timestamp(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

impl From<TrackedSourceRow> for TrackedSource {
    fn from(row: TrackedSourceRow) -> Self {
        TrackedSource {
            id: row.id,
            kind: SourceKind::parse(&row.kind).unwrap_or(SourceKind::Playlist),
            url: row.url,
            show_name: row.show_name,
            season_num: row.season_num,
            ledger_path: PathBuf::from(row.ledger_path),
            enabled: row.enabled != 0,
            resume_cursor: u32::try_from(row.resume_cursor.max(1)).unwrap_or(1),
            retention: RetentionPolicy::from_parts(&row.retention_mode, row.retention_value),
            created_at: from_timestamp(row.created_at),
            updated_at: from_timestamp(row.updated_at),
            last_checked: row.last_checked.map(from_timestamp),
            last_error: row.last_error,
        }
    }
}

/// Database handle for tubarr
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
