//! Run ledger persisted in SQLite.
//!
//! Stores one row per ingestion run so past runs can be reviewed and runs
//! interrupted by a crash are visible on the next start.

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

/// Database connection pool for the run ledger.
pub struct Database {
    pool: SqlitePool,
}

/// Stored ingestion run record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredRun {
    pub id: String,
    pub status: String,
    pub total: i64,
    pub batch_size: i64,
    pub processed: i64,
    pub error_message: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

/// Counts of finished runs by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub completed: i64,
    pub stopped: i64,
    pub failed: i64,
    pub interrupted: i64,
}

impl Database {
    /// Create a new database connection.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Private in-memory database (single connection so every query sees the same data).
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run all database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ingestion_runs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL DEFAULT 'running',
                total INTEGER NOT NULL,
                batch_size INTEGER NOT NULL,
                processed INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                started_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                finished_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ingestion_runs_started ON ingestion_runs(started_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a run in the `running` state.
    pub async fn record_run_started(
        &self,
        run_id: &Uuid,
        total: u64,
        batch_size: usize,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ingestion_runs (id, status, total, batch_size)
            VALUES (?, 'running', ?, ?)
            "#,
        )
        .bind(run_id.to_string())
        .bind(total as i64)
        .bind(batch_size as i64)
        .execute(&self.pool)
        .await
        .context("Failed to record run start")?;

        Ok(())
    }

    /// Record the terminal state of a run.
    pub async fn record_run_finished(
        &self,
        run_id: &Uuid,
        status: &str,
        processed: u64,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingestion_runs SET
                status = ?,
                processed = ?,
                error_message = ?,
                finished_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(processed as i64)
        .bind(error_message)
        .bind(run_id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to record run result")?;

        Ok(())
    }

    /// Mark runs still `running` (left over from a crash) as `interrupted`.
    pub async fn mark_interrupted_runs(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE ingestion_runs SET
                status = 'interrupted',
                finished_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
            WHERE status = 'running'
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn get_run(&self, run_id: &Uuid) -> Result<Option<StoredRun>> {
        let run = sqlx::query_as::<_, StoredRun>("SELECT * FROM ingestion_runs WHERE id = ?")
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(run)
    }

    /// Most recent runs first.
    pub async fn recent_runs(&self, limit: i64) -> Result<Vec<StoredRun>> {
        let runs = sqlx::query_as::<_, StoredRun>(
            "SELECT * FROM ingestion_runs ORDER BY started_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(runs)
    }

    /// Get run counts by outcome.
    pub async fn run_stats(&self) -> Result<RunStats> {
        let (completed, stopped, failed, interrupted): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'stopped' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'error' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'interrupted' THEN 1 ELSE 0 END), 0)
            FROM ingestion_runs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(RunStats {
            completed,
            stopped,
            failed,
            interrupted,
        })
    }
}
