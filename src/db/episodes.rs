//! Last-episode tracker.
//!
//! Keyed by the sanitised show name so that "My_Show" and "My Show" share a
//! counter.

use crate::error::DatabaseError;
use crate::utils::sanitize_name;
use crate::{Error, Result};

use super::Database;

impl Database {
    /// Last episode recorded for a show's season, 0 when unknown
    pub async fn get_last_episode(&self, show_name: &str, season_num: &str) -> Result<u32> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT last_episode FROM episode_tracker WHERE show_key = ? AND season_num = ?",
        )
        .bind(sanitize_name(show_name))
        .bind(season_num)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get last episode: {}",
                e
            )))
        })?;

        Ok(value
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0))
    }

    /// Record the last episode of a show's season
    pub async fn set_last_episode(
        &self,
        show_name: &str,
        season_num: &str,
        last_episode: u32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO episode_tracker (show_key, season_num, last_episode, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(show_key, season_num)
            DO UPDATE SET last_episode = excluded.last_episode, updated_at = excluded.updated_at
            "#,
        )
        .bind(sanitize_name(show_name))
        .bind(season_num)
        .bind(i64::from(last_episode))
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set last episode: {}",
                e
            )))
        })?;

        Ok(())
    }
}
