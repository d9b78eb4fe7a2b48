//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use super::Database;

/// Latest schema version
const SCHEMA_VERSION: i64 = 1;

/// Statements of migration v1, each with a label for error messages
const V1_STATEMENTS: &[(&str, &str)] = &[
    (
        "tracked_sources table",
        r#"
        CREATE TABLE tracked_sources (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            url TEXT NOT NULL,
            show_name TEXT NOT NULL,
            season_num TEXT NOT NULL,
            ledger_path TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            resume_cursor INTEGER NOT NULL DEFAULT 1,
            retention_mode TEXT NOT NULL DEFAULT 'all',
            retention_value INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            last_checked INTEGER,
            last_error TEXT
        )
        "#,
    ),
    (
        "tracked_sources index",
        "CREATE INDEX idx_tracked_sources_kind ON tracked_sources(kind, created_at)",
    ),
    (
        "episode_tracker table",
        r#"
        CREATE TABLE episode_tracker (
            show_key TEXT NOT NULL,
            season_num TEXT NOT NULL,
            last_episode INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (show_key, season_num)
        )
        "#,
    ),
];

fn connection_failed(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Database(DatabaseError::ConnectionFailed(format!("{context}: {e}")))
}

fn migration_failed(context: String) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Database(DatabaseError::MigrationFailed(format!("{context}: {e}")))
}

impl Database {
    /// Open (creating if needed) the database at `path` and bring its
    /// schema up to date. The parent directory is created as well.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                )))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(connection_failed("Failed to parse database path"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(connection_failed("Failed to connect to database"))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(connection_failed("Failed to acquire connection"))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
        )
        .execute(&mut *conn)
        .await
        .map_err(migration_failed("Failed to create schema_version table".into()))?;

        let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to query schema version: {e}"
                )))
            })?;

        if current.unwrap_or(0) < SCHEMA_VERSION {
            Self::apply(&mut conn, SCHEMA_VERSION, V1_STATEMENTS).await?;
        }
        Ok(())
    }

    /// Run `statements` and record `version` in one transaction
    async fn apply(
        conn: &mut SqliteConnection,
        version: i64,
        statements: &[(&str, &str)],
    ) -> Result<()> {
        tracing::info!(version, "applying database migration");

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(migration_failed(format!("Failed to begin migration v{version}")))?;

        let outcome = async {
            for (label, sql) in statements {
                sqlx::query(sql)
                    .execute(&mut *conn)
                    .await
                    .map_err(migration_failed(format!("Failed to create {label}")))?;
            }
            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *conn)
                .await
                .map_err(migration_failed(format!("Failed to record migration v{version}")))?;
            Ok::<(), Error>(())
        }
        .await;

        if let Err(e) = outcome {
            sqlx::query("ROLLBACK").execute(&mut *conn).await.ok();
            return Err(e);
        }
        sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map_err(migration_failed(format!("Failed to commit migration v{version}")))?;

        tracing::info!(version, "database migration complete");
        Ok(())
    }

    /// Close the connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// The underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
