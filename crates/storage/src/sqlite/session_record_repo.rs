use coach_core::model::{SessionId, SessionRecord};

use super::SqliteRepository;
use super::mapping::{encode_turns, map_record_row, session_id_to_text};
use crate::repository::{MAX_RETAINED_SESSIONS, SessionRecordRepository, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl SessionRecordRepository for SqliteRepository {
    async fn append_record(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let turns = encode_turns(record.turns())?;
        let breakdown = record.breakdown();
        let duration_secs = i64::try_from(record.duration_secs())
            .map_err(|_| StorageError::Serialization("duration_secs overflow".into()))?;
        let keep = i64::try_from(MAX_RETAINED_SESSIONS).unwrap_or(i64::MAX);

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
                INSERT INTO session_records (
                    id, scenario_id, product_id, turns,
                    opening, clinical_knowledge, objection_handling,
                    time_management, compliance, closing,
                    overall, started_at, completed_at, duration_secs
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(session_id_to_text(record.id()))
        .bind(record.scenario_id().as_str())
        .bind(record.product_id().as_str())
        .bind(turns)
        .bind(i64::from(breakdown.opening))
        .bind(i64::from(breakdown.clinical_knowledge))
        .bind(i64::from(breakdown.objection_handling))
        .bind(i64::from(breakdown.time_management))
        .bind(i64::from(breakdown.compliance))
        .bind(i64::from(breakdown.closing))
        .bind(i64::from(record.overall()))
        .bind(record.started_at())
        .bind(record.completed_at())
        .bind(duration_secs)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        sqlx::query(
            r"
                DELETE FROM session_records
                WHERE id NOT IN (
                    SELECT id FROM session_records
                    ORDER BY completed_at DESC, rowid DESC
                    LIMIT ?1
                )
            ",
        )
        .bind(keep)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<SessionRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, scenario_id, product_id, turns,
                    opening, clinical_knowledge, objection_handling,
                    time_management, compliance, closing,
                    overall, started_at, completed_at, duration_secs
                FROM session_records
                ORDER BY completed_at DESC, rowid DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_record_row(&row)?);
        }
        Ok(out)
    }

    async fn delete_record(&self, id: SessionId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM session_records WHERE id = ?1")
            .bind(session_id_to_text(id))
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn clear_records(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM session_records")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
