//! SQLite-backed tracker

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use sqlx::{FromRow, SqliteConnection};
use std::path::Path;
use std::str::FromStr;

use crate::error::TrackingError;
use crate::types::{JobKey, JobRecord, ProcessingState, SavingState};

use super::Tracker;

/// Raw job record row from SQLite
#[derive(Debug, FromRow)]
struct JobRow {
    job_id: Option<String>,
    processing_state: Option<String>,
    artifact_id: Option<String>,
    last_error: Option<String>,
    saving_state: String,
}

impl From<JobRow> for JobRecord {
    fn from(row: JobRow) -> Self {
        JobRecord {
            job_id: row.job_id,
            processing_state: row.processing_state.as_deref().map(ProcessingState::parse),
            artifact_id: row.artifact_id,
            last_error: row.last_error,
            saving_state: SavingState::parse(&row.saving_state),
        }
    }
}

/// Durable tracker over a SQLite file
///
/// One row per [`JobKey`]; `put` is an upsert that replaces every value
/// column, so the table always reflects the most recent attempt. WAL
/// journaling keeps concurrent readers cheap.
pub struct SqliteTracker {
    pool: SqlitePool,
}

impl SqliteTracker {
    /// Open (or create) the tracker database and run migrations
    pub async fn new(path: &Path) -> Result<Self, TrackingError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TrackingError::ConnectionFailed(format!(
                    "failed to create tracker directory: {e}"
                ))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                TrackingError::ConnectionFailed(format!("failed to parse tracker path: {e}"))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            TrackingError::ConnectionFailed(format!("failed to connect to tracker: {e}"))
        })?;

        let tracker = Self { pool };
        tracker.run_migrations().await?;
        Ok(tracker)
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run_migrations(&self) -> Result<(), TrackingError> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            TrackingError::ConnectionFailed(format!("failed to acquire connection: {e}"))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            TrackingError::MigrationFailed(format!("failed to create schema_version table: {e}"))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    TrackingError::QueryFailed(format!("failed to query schema version: {e}"))
                })?
                .flatten();

        if current_version.unwrap_or(0) < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: job record table keyed by (kind, scope, date range)
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<(), TrackingError> {
        tracing::info!("Applying tracker migration v1");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_records (
                report_kind TEXT NOT NULL,
                scope TEXT NOT NULL,
                period_start TEXT NOT NULL,
                period_end TEXT NOT NULL,
                job_id TEXT,
                processing_state TEXT,
                artifact_id TEXT,
                last_error TEXT,
                saving_state TEXT NOT NULL DEFAULT 'NOT_SAVED',
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (report_kind, scope, period_start, period_end)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            TrackingError::MigrationFailed(format!("failed to create job_records table: {e}"))
        })?;

        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (1, ?)")
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                TrackingError::MigrationFailed(format!("failed to record migration v1: {e}"))
            })?;

        Ok(())
    }
}

#[async_trait]
impl Tracker for SqliteTracker {
    async fn get(&self, key: &JobKey) -> Result<Option<JobRecord>, TrackingError> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            SELECT job_id, processing_state, artifact_id, last_error, saving_state
            FROM job_records
            WHERE report_kind = ? AND scope = ? AND period_start = ? AND period_end = ?
            "#,
        )
        .bind(&key.kind)
        .bind(&key.scope)
        .bind(key.period_start.to_string())
        .bind(key.period_end.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TrackingError::QueryFailed(format!("failed to read job record: {e}")))?;

        Ok(row.map(JobRecord::from))
    }

    async fn put(&self, key: &JobKey, record: JobRecord) -> Result<(), TrackingError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO job_records (
                report_kind, scope, period_start, period_end,
                job_id, processing_state, artifact_id, last_error, saving_state, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(report_kind, scope, period_start, period_end) DO UPDATE SET
                job_id = excluded.job_id,
                processing_state = excluded.processing_state,
                artifact_id = excluded.artifact_id,
                last_error = excluded.last_error,
                saving_state = excluded.saving_state,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&key.kind)
        .bind(&key.scope)
        .bind(key.period_start.to_string())
        .bind(key.period_end.to_string())
        .bind(&record.job_id)
        .bind(record.processing_state.as_ref().map(|s| s.as_str().to_string()))
        .bind(&record.artifact_id)
        .bind(&record.last_error)
        .bind(record.saving_state.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| TrackingError::QueryFailed(format!("failed to write job record: {e}")))?;

        Ok(())
    }
}
