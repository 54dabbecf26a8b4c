use async_trait::async_trait;
use chrono::Utc;
use coach_core::progression::UnlockLedger;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{StorageError, UnlockLedgerRepository, decode_ledger, encode_ledger};

#[async_trait]
impl UnlockLedgerRepository for SqliteRepository {
    async fn load_ledger(&self) -> Result<Option<UnlockLedger>, StorageError> {
        let row = sqlx::query("SELECT payload FROM progression_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row
            .try_get("payload")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        decode_ledger(&payload).map(Some)
    }

    async fn save_ledger(&self, ledger: &UnlockLedger) -> Result<(), StorageError> {
        let payload = encode_ledger(ledger)?;
        sqlx::query(
            r"
            INSERT INTO progression_state (id, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            ",
        )
        .bind(1_i64)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
