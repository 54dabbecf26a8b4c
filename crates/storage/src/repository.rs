use async_trait::async_trait;
use coach_core::model::{SessionId, SessionRecord};
use coach_core::progression::UnlockLedger;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Oldest records beyond this count are evicted on append.
pub const MAX_RETAINED_SESSIONS: usize = 50;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub(crate) fn encode_ledger(ledger: &UnlockLedger) -> Result<String, StorageError> {
    serde_json::to_string(ledger).map_err(|e| StorageError::Serialization(e.to_string()))
}

pub(crate) fn decode_ledger(payload: &str) -> Result<UnlockLedger, StorageError> {
    serde_json::from_str(payload).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Repository contract for completed session records.
#[async_trait]
pub trait SessionRecordRepository: Send + Sync {
    /// Store a completed record, evicting the oldest beyond [`MAX_RETAINED_SESSIONS`].
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id already exists, or other storage errors.
    async fn append_record(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// All retained records, newest first by completion time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if records cannot be read or decoded.
    async fn list_records(&self) -> Result<Vec<SessionRecord>, StorageError>;

    /// Remove one record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn delete_record(&self, id: SessionId) -> Result<(), StorageError>;

    /// Remove every record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be cleared.
    async fn clear_records(&self) -> Result<(), StorageError>;
}

/// Repository contract for the durable unlock ledger.
#[async_trait]
pub trait UnlockLedgerRepository: Send + Sync {
    /// Load the persisted ledger, `None` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored payload cannot be parsed.
    async fn load_ledger(&self) -> Result<Option<UnlockLedger>, StorageError>;

    /// Replace the persisted ledger.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the ledger cannot be stored.
    async fn save_ledger(&self, ledger: &UnlockLedger) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<Vec<SessionRecord>>>,
    ledger_payload: Arc<Mutex<Option<String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the stored ledger payload verbatim, e.g. to simulate corruption.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn set_raw_ledger(&self, payload: impl Into<String>) -> Result<(), StorageError> {
        let mut guard = self
            .ledger_payload
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(payload.into());
        Ok(())
    }
}

#[async_trait]
impl SessionRecordRepository for InMemoryRepository {
    async fn append_record(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.iter().any(|r| r.id() == record.id()) {
            return Err(StorageError::Conflict);
        }
        let pos = guard
            .iter()
            .position(|r| r.completed_at() < record.completed_at())
            .unwrap_or(guard.len());
        guard.insert(pos, record.clone());
        guard.truncate(MAX_RETAINED_SESSIONS);
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<SessionRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn delete_record(&self, id: SessionId) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let before = guard.len();
        guard.retain(|r| r.id() != id);
        if guard.len() == before {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn clear_records(&self) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.clear();
        Ok(())
    }
}

#[async_trait]
impl UnlockLedgerRepository for InMemoryRepository {
    async fn load_ledger(&self) -> Result<Option<UnlockLedger>, StorageError> {
        let guard = self
            .ledger_payload
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.as_deref().map(decode_ledger).transpose()
    }

    async fn save_ledger(&self, ledger: &UnlockLedger) -> Result<(), StorageError> {
        let payload = encode_ledger(ledger)?;
        let mut guard = self
            .ledger_payload
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(payload);
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRecordRepository>,
    pub unlocks: Arc<dyn UnlockLedgerRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn SessionRecordRepository> = Arc::new(repo.clone());
        let unlocks: Arc<dyn UnlockLedgerRepository> = Arc::new(repo);
        Self { sessions, unlocks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use coach_core::model::{ProductId, ScenarioId, ScoreBreakdown, SessionRecordDraft};
    use coach_core::time::fixed_now;

    fn build_record(minutes_ago: i64, overall: u32) -> SessionRecord {
        let completed_at = fixed_now() - Duration::minutes(minutes_ago);
        SessionRecordDraft {
            scenario_id: ScenarioId::new("dr-patel"),
            product_id: ProductId::new("cardiozen"),
            turns: Vec::new(),
            breakdown: ScoreBreakdown::uniform(overall).unwrap(),
            overall: None,
            started_at: completed_at - Duration::minutes(5),
            completed_at,
        }
        .complete()
        .unwrap()
    }

    #[tokio::test]
    async fn lists_newest_first_regardless_of_append_order() {
        let repo = InMemoryRepository::new();
        repo.append_record(&build_record(30, 60)).await.unwrap();
        repo.append_record(&build_record(10, 80)).await.unwrap();
        repo.append_record(&build_record(20, 70)).await.unwrap();

        let scores: Vec<u8> = repo
            .list_records()
            .await
            .unwrap()
            .iter()
            .map(SessionRecord::overall)
            .collect();
        assert_eq!(scores, vec![80, 70, 60]);
    }

    #[tokio::test]
    async fn evicts_oldest_beyond_cap() {
        let repo = InMemoryRepository::new();
        let oldest = build_record(1_000, 10);
        repo.append_record(&oldest).await.unwrap();
        for i in 0..MAX_RETAINED_SESSIONS {
            repo.append_record(&build_record(i as i64, 70)).await.unwrap();
        }

        let records = repo.list_records().await.unwrap();
        assert_eq!(records.len(), MAX_RETAINED_SESSIONS);
        assert!(records.iter().all(|r| r.id() != oldest.id()));
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let repo = InMemoryRepository::new();
        let record = build_record(1, 70);
        repo.append_record(&record).await.unwrap();
        assert!(matches!(
            repo.append_record(&record).await,
            Err(StorageError::Conflict)
        ));

        repo.delete_record(record.id()).await.unwrap();
        assert!(matches!(
            repo.delete_record(record.id()).await,
            Err(StorageError::NotFound)
        ));

        repo.append_record(&build_record(2, 70)).await.unwrap();
        repo.clear_records().await.unwrap();
        assert!(repo.list_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ledger_round_trips_and_reports_corruption() {
        let repo = InMemoryRepository::new();
        assert!(repo.load_ledger().await.unwrap().is_none());

        let mut ledger = UnlockLedger::baseline_only();
        ledger.record(ScenarioId::new("dr-nguyen"), fixed_now());
        repo.save_ledger(&ledger).await.unwrap();
        assert_eq!(repo.load_ledger().await.unwrap(), Some(ledger));

        repo.set_raw_ledger("{not json").unwrap();
        assert!(matches!(
            repo.load_ledger().await,
            Err(StorageError::Serialization(_))
        ));
    }
}
