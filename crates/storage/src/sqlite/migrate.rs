use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates session records and the single-row progression state.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_records (
                    id TEXT PRIMARY KEY,
                    scenario_id TEXT NOT NULL,
                    product_id TEXT NOT NULL,
                    turns TEXT NOT NULL,
                    opening INTEGER NOT NULL CHECK (opening BETWEEN 0 AND 100),
                    clinical_knowledge INTEGER NOT NULL CHECK (clinical_knowledge BETWEEN 0 AND 100),
                    objection_handling INTEGER NOT NULL CHECK (objection_handling BETWEEN 0 AND 100),
                    time_management INTEGER NOT NULL CHECK (time_management BETWEEN 0 AND 100),
                    compliance INTEGER NOT NULL CHECK (compliance BETWEEN 0 AND 100),
                    closing INTEGER NOT NULL CHECK (closing BETWEEN 0 AND 100),
                    overall INTEGER NOT NULL CHECK (overall BETWEEN 0 AND 100),
                    started_at TEXT NOT NULL,
                    completed_at TEXT NOT NULL,
                    duration_secs INTEGER NOT NULL CHECK (duration_secs >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS progression_state (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    payload TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_session_records_completed
                    ON session_records (completed_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
