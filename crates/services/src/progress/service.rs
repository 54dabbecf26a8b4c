use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, info, warn};

use coach_core::catalog::Catalog;
use coach_core::model::{ScenarioId, SessionId, SessionRecord, SessionRecordDraft};
use coach_core::progression::{
    EvaluationPass, ProgressionInputs, ProgressionSummary, UnlockLedger, UnlockRequirement,
    UnlockTable, evaluate,
};
use coach_core::stats::ProgressStats;
use storage::repository::{
    InMemoryRepository, MAX_RETAINED_SESSIONS, SessionRecordRepository, StorageError,
    UnlockLedgerRepository,
};

use super::view::ScenarioProgressItem;
use crate::Clock;
use crate::error::ProgressError;

/// In-memory mirror of durable state, used as-is once the store has failed.
struct ProgressState {
    ledger: UnlockLedger,
    sessions: Vec<SessionRecord>,
    degraded: bool,
}

impl ProgressState {
    fn insert_session(&mut self, record: SessionRecord) {
        let pos = self
            .sessions
            .iter()
            .position(|r| r.completed_at() < record.completed_at())
            .unwrap_or(self.sessions.len());
        self.sessions.insert(pos, record);
        self.sessions.truncate(MAX_RETAINED_SESSIONS);
    }
}

/// Store-backed facade over stats aggregation and unlock progression.
///
/// One instance per user context. Reads never fail: an unreachable or
/// corrupt store degrades the service to in-memory operation for the rest of
/// its lifetime.
pub struct ProgressService {
    clock: Clock,
    offset: FixedOffset,
    catalog: Arc<Catalog>,
    table: Arc<UnlockTable>,
    sessions: Arc<dyn SessionRecordRepository>,
    unlocks: Arc<dyn UnlockLedgerRepository>,
    state: Mutex<ProgressState>,
}

impl ProgressService {
    /// Build the service and load the persisted unlock ledger.
    ///
    /// A missing or unreadable ledger falls back to baseline-only.
    pub async fn load(
        clock: Clock,
        offset: FixedOffset,
        catalog: Arc<Catalog>,
        table: Arc<UnlockTable>,
        sessions: Arc<dyn SessionRecordRepository>,
        unlocks: Arc<dyn UnlockLedgerRepository>,
    ) -> Self {
        let mut degraded = false;
        let ledger = match unlocks.load_ledger().await {
            Ok(Some(ledger)) => ledger,
            Ok(None) => UnlockLedger::baseline_only(),
            Err(StorageError::Serialization(reason)) => {
                warn!(%reason, "unreadable unlock ledger, starting from baseline");
                UnlockLedger::baseline_only()
            }
            Err(err) => {
                warn!(error = %err, "unlock store unavailable, running in memory");
                degraded = true;
                UnlockLedger::baseline_only()
            }
        };

        Self {
            clock,
            offset,
            catalog,
            table,
            sessions,
            unlocks,
            state: Mutex::new(ProgressState {
                ledger,
                sessions: Vec::new(),
                degraded,
            }),
        }
    }

    /// Fully in-memory service with the built-in catalog and unlock table.
    pub async fn in_memory(clock: Clock, offset: FixedOffset) -> Self {
        let repo = InMemoryRepository::new();
        Self::load(
            clock,
            offset,
            Arc::new(Catalog::built_in()),
            Arc::new(UnlockTable::default_table()),
            Arc::new(repo.clone()),
            Arc::new(repo),
        )
        .await
    }

    fn state(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn degrade(&self, operation: &'static str, err: &StorageError) {
        let mut state = self.state();
        if !state.degraded {
            warn!(operation, error = %err, "session store failed, continuing in memory");
            state.degraded = true;
        }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn unlock_table(&self) -> &UnlockTable {
        &self.table
    }

    /// Whether the durable store has failed and state is memory-only.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.state().degraded
    }

    /// Session history, newest first. Falls back to the in-memory copy.
    pub async fn sessions(&self) -> Vec<SessionRecord> {
        if self.is_degraded() {
            return self.state().sessions.clone();
        }
        match self.sessions.list_records().await {
            Ok(records) => {
                self.state().sessions.clone_from(&records);
                records
            }
            Err(err) => {
                self.degrade("list", &err);
                self.state().sessions.clone()
            }
        }
    }

    /// Persist a completed session.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::DuplicateSession` if the id is already recorded.
    pub async fn record_session(&self, record: SessionRecord) -> Result<(), ProgressError> {
        let id = record.id();
        if self.state().sessions.iter().any(|r| r.id() == id) {
            return Err(ProgressError::DuplicateSession(id));
        }

        if !self.is_degraded() {
            match self.sessions.append_record(&record).await {
                Ok(()) => {}
                Err(StorageError::Conflict) => return Err(ProgressError::DuplicateSession(id)),
                Err(err) => self.degrade("append", &err),
            }
        }

        debug!(session = %id, scenario = %record.scenario_id(), score = record.overall(), "session recorded");
        self.state().insert_session(record);
        Ok(())
    }

    /// Finalize a draft produced by the conversation layer and record it.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Record` if the draft is invalid, or
    /// `ProgressError::DuplicateSession`.
    pub async fn complete_session(
        &self,
        draft: SessionRecordDraft,
    ) -> Result<SessionRecord, ProgressError> {
        let record = draft.complete()?;
        self.record_session(record.clone()).await?;
        Ok(record)
    }

    /// Remove one session from the history.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::SessionNotFound` if no such session exists.
    pub async fn delete_session(&self, id: SessionId) -> Result<(), ProgressError> {
        let known_locally = {
            let mut state = self.state();
            let before = state.sessions.len();
            state.sessions.retain(|r| r.id() != id);
            state.sessions.len() != before
        };

        if self.is_degraded() {
            return if known_locally {
                Ok(())
            } else {
                Err(ProgressError::SessionNotFound(id))
            };
        }

        match self.sessions.delete_record(id).await {
            Ok(()) => Ok(()),
            Err(StorageError::NotFound) if !known_locally => {
                Err(ProgressError::SessionNotFound(id))
            }
            Err(StorageError::NotFound) => Ok(()),
            Err(err) => {
                self.degrade("delete", &err);
                if known_locally {
                    Ok(())
                } else {
                    Err(ProgressError::SessionNotFound(id))
                }
            }
        }
    }

    /// Drop the whole session history. Unlocks are kept.
    pub async fn clear_sessions(&self) {
        self.state().sessions.clear();
        if self.is_degraded() {
            return;
        }
        if let Err(err) = self.sessions.clear_records().await {
            self.degrade("clear", &err);
        }
    }

    /// Aggregate statistics over the current history.
    pub async fn stats(&self) -> ProgressStats {
        let sessions = self.sessions().await;
        ProgressStats::from_sessions(&sessions, self.clock.now(), self.offset)
    }

    async fn inputs(&self) -> ProgressionInputs {
        let sessions = self.sessions().await;
        ProgressionInputs::from_sessions(&sessions, &self.catalog)
    }

    /// Evaluate every rule without recording anything.
    pub async fn preview(&self) -> EvaluationPass {
        let inputs = self.inputs().await;
        let state = self.state();
        evaluate(&self.table, &inputs, &state.ledger, self.clock.now())
    }

    #[must_use]
    pub fn is_unlocked(&self, id: &ScenarioId) -> bool {
        self.state().ledger.is_unlocked(&self.table, id)
    }

    /// When `id` was unlocked, `None` for the baseline or locked scenarios.
    #[must_use]
    pub fn unlocked_at(&self, id: &ScenarioId) -> Option<DateTime<Utc>> {
        self.state().ledger.unlocked_at(id)
    }

    /// 0-100 progress towards unlocking `id`; `None` for unknown scenarios.
    pub async fn unlock_progress(&self, id: &ScenarioId) -> Option<u8> {
        self.preview().await.state(id).map(|state| state.progress)
    }

    #[must_use]
    pub fn unlock_requirements(&self, id: &ScenarioId) -> &[UnlockRequirement] {
        self.table.requirements(id)
    }

    /// Record every scenario whose requirements now hold.
    ///
    /// Returns the newly unlocked ids in table order. The ledger is written at
    /// most once, and only when something changed.
    pub async fn check_and_unlock(&self) -> Vec<ScenarioId> {
        let inputs = self.inputs().await;
        let (newly_unlocked, snapshot, degraded) = {
            let mut state = self.state();
            let pass = evaluate(&self.table, &inputs, &state.ledger, self.clock.now());
            if !pass.apply_to(&mut state.ledger) {
                return Vec::new();
            }
            (pass.newly_unlocked, state.ledger.clone(), state.degraded)
        };

        for id in &newly_unlocked {
            info!(scenario = %id, label = %self.catalog.scenario_label(id), "scenario unlocked");
        }

        if !degraded {
            if let Err(err) = self.unlocks.save_ledger(&snapshot).await {
                self.degrade("save_ledger", &err);
            }
        }

        newly_unlocked
    }

    /// Tier, next-tier progress, and achievements.
    pub async fn summary(&self) -> ProgressionSummary {
        let inputs = self.inputs().await;
        let state = self.state();
        ProgressionSummary::derive(&self.table, &state.ledger, &inputs)
    }

    /// Presentation-agnostic state of every scenario, in table order.
    pub async fn scenario_states(&self) -> Vec<ScenarioProgressItem> {
        let pass = self.preview().await;
        pass.states
            .iter()
            .map(|state| ScenarioProgressItem::from_state(state, &self.catalog))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::Duration;
    use coach_core::model::{ProductId, ScoreBreakdown, SessionRecordDraft};
    use coach_core::stats::Trend;
    use coach_core::time::{fixed_now, utc_offset};

    fn record(scenario: &str, overall: u32, minutes_ago: i64) -> SessionRecord {
        let completed_at = fixed_now() - Duration::minutes(minutes_ago);
        SessionRecordDraft {
            scenario_id: ScenarioId::new(scenario),
            product_id: ProductId::new("cardiozen"),
            turns: Vec::new(),
            breakdown: ScoreBreakdown::uniform(overall).unwrap(),
            overall: Some(overall),
            started_at: completed_at - Duration::minutes(5),
            completed_at,
        }
        .complete()
        .unwrap()
    }

    /// Store that fails every call, as if the backing file were gone.
    struct BrokenStore;

    #[async_trait]
    impl SessionRecordRepository for BrokenStore {
        async fn append_record(&self, _: &SessionRecord) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk gone".into()))
        }
        async fn list_records(&self) -> Result<Vec<SessionRecord>, StorageError> {
            Err(StorageError::Connection("disk gone".into()))
        }
        async fn delete_record(&self, _: SessionId) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk gone".into()))
        }
        async fn clear_records(&self) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk gone".into()))
        }
    }

    #[async_trait]
    impl UnlockLedgerRepository for BrokenStore {
        async fn load_ledger(&self) -> Result<Option<UnlockLedger>, StorageError> {
            Err(StorageError::Connection("disk gone".into()))
        }
        async fn save_ledger(&self, _: &UnlockLedger) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk gone".into()))
        }
    }

    /// Healthy store whose session or ledger side can be made to fail later.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryRepository,
        sessions_down: AtomicBool,
        ledger_down: AtomicBool,
    }

    impl FlakyStore {
        fn check(flag: &AtomicBool) -> Result<(), StorageError> {
            if flag.load(Ordering::SeqCst) {
                Err(StorageError::Connection("disk gone".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl SessionRecordRepository for FlakyStore {
        async fn append_record(&self, record: &SessionRecord) -> Result<(), StorageError> {
            Self::check(&self.sessions_down)?;
            self.inner.append_record(record).await
        }
        async fn list_records(&self) -> Result<Vec<SessionRecord>, StorageError> {
            Self::check(&self.sessions_down)?;
            self.inner.list_records().await
        }
        async fn delete_record(&self, id: SessionId) -> Result<(), StorageError> {
            Self::check(&self.sessions_down)?;
            self.inner.delete_record(id).await
        }
        async fn clear_records(&self) -> Result<(), StorageError> {
            Self::check(&self.sessions_down)?;
            self.inner.clear_records().await
        }
    }

    #[async_trait]
    impl UnlockLedgerRepository for FlakyStore {
        async fn load_ledger(&self) -> Result<Option<UnlockLedger>, StorageError> {
            Self::check(&self.ledger_down)?;
            self.inner.load_ledger().await
        }
        async fn save_ledger(&self, ledger: &UnlockLedger) -> Result<(), StorageError> {
            Self::check(&self.ledger_down)?;
            self.inner.save_ledger(ledger).await
        }
    }

    async fn service_over_flaky(store: Arc<FlakyStore>) -> ProgressService {
        ProgressService::load(
            Clock::fixed(fixed_now()),
            utc_offset(),
            Arc::new(Catalog::built_in()),
            Arc::new(UnlockTable::default_table()),
            store.clone(),
            store,
        )
        .await
    }

    async fn service_over(repo: InMemoryRepository) -> ProgressService {
        ProgressService::load(
            Clock::fixed(fixed_now()),
            utc_offset(),
            Arc::new(Catalog::built_in()),
            Arc::new(UnlockTable::default_table()),
            Arc::new(repo.clone()),
            Arc::new(repo),
        )
        .await
    }

    #[tokio::test]
    async fn empty_history_gives_zero_stats() {
        let svc = ProgressService::in_memory(Clock::fixed(fixed_now()), utc_offset()).await;
        let stats = svc.stats().await;
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.recent_trend, Trend::Insufficient);
        assert!(svc.check_and_unlock().await.is_empty());
    }

    #[tokio::test]
    async fn first_session_unlocks_next_scenario_and_persists() {
        let repo = InMemoryRepository::new();
        let svc = service_over(repo.clone()).await;
        svc.record_session(record("dr-patel", 60, 1)).await.unwrap();

        let unlocked = svc.check_and_unlock().await;
        assert_eq!(unlocked, vec![ScenarioId::new("dr-nguyen")]);
        assert!(svc.is_unlocked(&ScenarioId::new("dr-nguyen")));
        assert!(!svc.is_unlocked(&ScenarioId::new("dr-okafor")));
        assert_eq!(svc.unlocked_at(&ScenarioId::new("dr-nguyen")), Some(fixed_now()));

        let persisted = repo.load_ledger().await.unwrap().unwrap();
        assert!(persisted.unlocked_at(&ScenarioId::new("dr-nguyen")).is_some());

        // Nothing new: no second unlock.
        assert!(svc.check_and_unlock().await.is_empty());
    }

    #[tokio::test]
    async fn unlocks_survive_history_reset() {
        let repo = InMemoryRepository::new();
        let svc = service_over(repo.clone()).await;
        for (i, score) in [70, 65, 60].into_iter().enumerate() {
            let scenario = if i < 2 { "dr-patel" } else { "dr-nguyen" };
            svc.record_session(record(scenario, score, i as i64)).await.unwrap();
        }
        let unlocked = svc.check_and_unlock().await;
        assert!(unlocked.contains(&ScenarioId::new("dr-okafor")));

        svc.clear_sessions().await;
        assert!(svc.check_and_unlock().await.is_empty());
        assert!(svc.is_unlocked(&ScenarioId::new("dr-okafor")));

        // A fresh service over the same store sees the same unlocks.
        let reloaded = service_over(repo).await;
        assert!(reloaded.is_unlocked(&ScenarioId::new("dr-okafor")));
        assert_eq!(reloaded.unlock_progress(&ScenarioId::new("dr-okafor")).await, Some(100));
    }

    #[tokio::test]
    async fn corrupt_ledger_falls_back_to_baseline() {
        let repo = InMemoryRepository::new();
        repo.set_raw_ledger("not json at all").unwrap();
        let svc = service_over(repo).await;

        assert!(!svc.is_degraded());
        assert!(svc.is_unlocked(&ScenarioId::new("dr-patel")));
        assert!(!svc.is_unlocked(&ScenarioId::new("dr-nguyen")));
    }

    #[tokio::test]
    async fn broken_store_degrades_to_memory() {
        let svc = ProgressService::load(
            Clock::fixed(fixed_now()),
            utc_offset(),
            Arc::new(Catalog::built_in()),
            Arc::new(UnlockTable::default_table()),
            Arc::new(BrokenStore),
            Arc::new(BrokenStore),
        )
        .await;
        assert!(svc.is_degraded());

        svc.record_session(record("dr-patel", 80, 2)).await.unwrap();
        svc.record_session(record("dr-patel", 60, 1)).await.unwrap();

        let stats = svc.stats().await;
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.average_score, 70);
        assert_eq!(svc.check_and_unlock().await, vec![ScenarioId::new("dr-nguyen")]);
    }

    #[tokio::test]
    async fn append_failure_mid_session_keeps_the_record() {
        let store = Arc::new(FlakyStore::default());
        let svc = service_over_flaky(store.clone()).await;
        svc.record_session(record("dr-patel", 80, 2)).await.unwrap();
        assert!(!svc.is_degraded());

        store.sessions_down.store(true, Ordering::SeqCst);
        svc.record_session(record("dr-patel", 60, 1)).await.unwrap();
        assert!(svc.is_degraded());

        let stats = svc.stats().await;
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.average_score, 70);
        assert_eq!(svc.check_and_unlock().await, vec![ScenarioId::new("dr-nguyen")]);
        assert_eq!(store.inner.list_records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_failure_falls_back_to_cached_history() {
        let store = Arc::new(FlakyStore::default());
        let svc = service_over_flaky(store.clone()).await;
        svc.record_session(record("dr-patel", 75, 1)).await.unwrap();
        assert_eq!(svc.stats().await.total_sessions, 1);

        store.sessions_down.store(true, Ordering::SeqCst);
        assert_eq!(svc.sessions().await.len(), 1);
        assert!(svc.is_degraded());

        // Once degraded, the store is no longer consulted.
        store.sessions_down.store(false, Ordering::SeqCst);
        svc.clear_sessions().await;
        assert_eq!(svc.stats().await.total_sessions, 0);
        assert_eq!(store.inner.list_records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ledger_save_failure_still_reports_unlocks() {
        let store = Arc::new(FlakyStore::default());
        let svc = service_over_flaky(store.clone()).await;
        svc.record_session(record("dr-patel", 60, 1)).await.unwrap();

        store.ledger_down.store(true, Ordering::SeqCst);
        let unlocked = svc.check_and_unlock().await;
        assert_eq!(unlocked, vec![ScenarioId::new("dr-nguyen")]);
        assert!(svc.is_degraded());
        assert!(svc.is_unlocked(&ScenarioId::new("dr-nguyen")));
        assert_eq!(svc.stats().await.total_sessions, 1);
        assert!(store.inner.load_ledger().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_failure_still_removes_known_session() {
        let store = Arc::new(FlakyStore::default());
        let svc = service_over_flaky(store.clone()).await;
        let r = record("dr-patel", 70, 1);
        svc.record_session(r.clone()).await.unwrap();

        store.sessions_down.store(true, Ordering::SeqCst);
        svc.delete_session(r.id()).await.unwrap();
        assert!(svc.is_degraded());
        assert_eq!(svc.stats().await.total_sessions, 0);
    }

    #[tokio::test]
    async fn duplicate_and_missing_sessions_are_reported() {
        let svc = ProgressService::in_memory(Clock::fixed(fixed_now()), utc_offset()).await;
        let r = record("dr-patel", 70, 1);
        svc.record_session(r.clone()).await.unwrap();
        assert!(matches!(
            svc.record_session(r.clone()).await,
            Err(ProgressError::DuplicateSession(_))
        ));

        svc.delete_session(r.id()).await.unwrap();
        assert!(matches!(
            svc.delete_session(r.id()).await,
            Err(ProgressError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn progress_and_requirements_are_exposed() {
        let svc = ProgressService::in_memory(Clock::fixed(fixed_now()), utc_offset()).await;
        svc.record_session(record("dr-patel", 90, 2)).await.unwrap();
        svc.record_session(record("dr-nguyen", 85, 1)).await.unwrap();
        svc.check_and_unlock().await;

        let okafor = ScenarioId::new("dr-okafor");
        assert!(!svc.is_unlocked(&okafor));
        assert_eq!(svc.unlock_requirements(&okafor).len(), 2);
        assert_eq!(svc.unlock_progress(&okafor).await, Some(83));
        assert_eq!(svc.unlock_progress(&ScenarioId::new("unknown")).await, None);

        let summary = svc.summary().await;
        assert_eq!(summary.unlocked_count, 2);
        assert_eq!(summary.tier.name, "Trainee");
    }

    #[tokio::test]
    async fn stats_are_idempotent() {
        let svc = ProgressService::in_memory(Clock::fixed(fixed_now()), utc_offset()).await;
        for (i, score) in [60, 80, 70].into_iter().enumerate() {
            svc.record_session(record("dr-patel", score, i as i64)).await.unwrap();
        }
        let first = svc.stats().await;
        let second = svc.stats().await;
        assert_eq!(first, second);
        assert_eq!(first.average_score, 70);
        assert_eq!(first.highest_score, 80);
        assert_eq!(first.lowest_score, 60);
    }

    #[tokio::test]
    async fn invalid_draft_is_rejected_before_storage() {
        let repo = InMemoryRepository::new();
        let svc = service_over(repo.clone()).await;
        let draft = SessionRecordDraft {
            scenario_id: ScenarioId::new("dr-patel"),
            product_id: ProductId::new("cardiozen"),
            turns: Vec::new(),
            breakdown: ScoreBreakdown::uniform(70).unwrap(),
            overall: None,
            started_at: fixed_now(),
            completed_at: fixed_now() - Duration::minutes(1),
        };
        assert!(matches!(
            svc.complete_session(draft).await,
            Err(ProgressError::Record(_))
        ));
        assert!(repo.list_records().await.unwrap().is_empty());
    }
}
