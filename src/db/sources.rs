//! Tracked source CRUD operations.

use crate::error::DatabaseError;
use crate::retention::RetentionPolicy;
use crate::sources::{SourceKind, TrackedSource};
use crate::{Error, Result};

use super::{Database, TrackedSourceRow};

const SOURCE_COLUMNS: &str = r#"
    id, kind, url, show_name, season_num, ledger_path, enabled, resume_cursor,
    retention_mode, retention_value, created_at, updated_at, last_checked, last_error
"#;

impl Database {
    /// Insert a tracked source unless one with the same id exists.
    ///
    /// Returns `true` when a row was inserted.
    pub async fn insert_source(&self, source: &TrackedSource) -> Result<bool> {
        let (mode, value) = source.retention.to_parts();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO tracked_sources
                (id, kind, url, show_name, season_num, ledger_path, enabled, resume_cursor,
                 retention_mode, retention_value, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&source.id)
        .bind(source.kind.as_str())
        .bind(&source.url)
        .bind(&source.show_name)
        .bind(&source.season_num)
        .bind(source.ledger_path.to_string_lossy().as_ref())
        .bind(source.enabled as i32)
        .bind(i64::from(source.resume_cursor))
        .bind(mode)
        .bind(value)
        .bind(source.created_at.timestamp())
        .bind(source.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert tracked source: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a tracked source by id
    pub async fn get_source(&self, id: &str) -> Result<Option<TrackedSource>> {
        let row = sqlx::query_as::<_, TrackedSourceRow>(&format!(
            "SELECT {} FROM tracked_sources WHERE id = ?",
            SOURCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get tracked source: {}",
                e
            )))
        })?;

        Ok(row.map(TrackedSource::from))
    }

    /// List tracked sources of one kind, oldest registration first
    pub async fn list_sources(&self, kind: SourceKind) -> Result<Vec<TrackedSource>> {
        let rows = sqlx::query_as::<_, TrackedSourceRow>(&format!(
            "SELECT {} FROM tracked_sources WHERE kind = ? ORDER BY created_at ASC, id ASC",
            SOURCE_COLUMNS
        ))
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list tracked sources: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(TrackedSource::from).collect())
    }

    /// Enable or disable polling of a source. Returns `false` if absent.
    pub async fn set_source_enabled(&self, id: &str, enabled: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tracked_sources SET enabled = ?, updated_at = ? WHERE id = ?",
        )
        .bind(enabled as i32)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update source enabled flag: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Change the show a source files its items under
    pub async fn set_source_show(&self, id: &str, show_name: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tracked_sources SET show_name = ?, updated_at = ? WHERE id = ?",
        )
        .bind(show_name)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update source show name: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the retention policy of a source
    pub async fn set_source_retention(&self, id: &str, retention: RetentionPolicy) -> Result<bool> {
        let (mode, value) = retention.to_parts();
        let result = sqlx::query(
            r#"
            UPDATE tracked_sources
            SET retention_mode = ?, retention_value = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(mode)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update source retention: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Move the resume cursor of a source
    pub async fn set_resume_cursor(&self, id: &str, cursor: u32) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tracked_sources SET resume_cursor = ?, updated_at = ? WHERE id = ?",
        )
        .bind(i64::from(cursor.max(1)))
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update resume cursor: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Record the outcome of a poll: the check time and the error, if any
    pub async fn record_source_check(&self, id: &str, error: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE tracked_sources SET last_checked = ?, last_error = ? WHERE id = ?")
            .bind(chrono::Utc::now().timestamp())
            .bind(error)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to record source check: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Delete a tracked source. Returns `false` if absent.
    pub async fn delete_source(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tracked_sources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete tracked source: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }
}
