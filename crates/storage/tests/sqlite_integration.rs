use chrono::Duration;
use coach_core::model::{
    ProductId, ScenarioId, ScoreBreakdown, SessionRecord, SessionRecordDraft, Turn,
};
use coach_core::progression::UnlockLedger;
use coach_core::time::fixed_now;
use storage::repository::{
    MAX_RETAINED_SESSIONS, SessionRecordRepository, StorageError, UnlockLedgerRepository,
};
use storage::sqlite::SqliteRepository;

fn build_record(minutes_ago: i64, overall: u32) -> SessionRecord {
    let completed_at = fixed_now() - Duration::minutes(minutes_ago);
    SessionRecordDraft {
        scenario_id: ScenarioId::new("dr-okafor"),
        product_id: ProductId::new("cardiozen"),
        turns: vec![
            Turn::counterpart("What does the data show?"),
            Turn::user("The trial showed a 22% reduction in events."),
        ],
        breakdown: ScoreBreakdown::new(80, 75, 70, 65, 90, 60).unwrap(),
        overall: Some(overall),
        started_at: completed_at - Duration::minutes(6),
        completed_at,
    }
    .complete()
    .unwrap()
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_record() {
    let repo = connect("memdb_roundtrip").await;
    let record = build_record(5, 73);
    repo.append_record(&record).await.unwrap();

    let listed = repo.list_records().await.expect("list");
    assert_eq!(listed, vec![record]);
}

#[tokio::test]
async fn sqlite_lists_newest_first_and_enforces_unique_ids() {
    let repo = connect("memdb_order").await;
    let older = build_record(60, 60);
    let newer = build_record(1, 90);
    repo.append_record(&older).await.unwrap();
    repo.append_record(&newer).await.unwrap();

    let listed = repo.list_records().await.unwrap();
    assert_eq!(listed[0].id(), newer.id());
    assert_eq!(listed[1].id(), older.id());

    assert!(matches!(
        repo.append_record(&older).await,
        Err(StorageError::Conflict)
    ));
}

#[tokio::test]
async fn sqlite_evicts_beyond_retention_cap() {
    let repo = connect("memdb_evict").await;
    let oldest = build_record(10_000, 40);
    repo.append_record(&oldest).await.unwrap();
    for i in 0..MAX_RETAINED_SESSIONS {
        repo.append_record(&build_record(i as i64, 70)).await.unwrap();
    }

    let listed = repo.list_records().await.unwrap();
    assert_eq!(listed.len(), MAX_RETAINED_SESSIONS);
    assert!(listed.iter().all(|r| r.id() != oldest.id()));
}

#[tokio::test]
async fn sqlite_delete_and_clear() {
    let repo = connect("memdb_delete").await;
    let record = build_record(3, 70);
    repo.append_record(&record).await.unwrap();
    repo.append_record(&build_record(4, 70)).await.unwrap();

    repo.delete_record(record.id()).await.unwrap();
    assert!(matches!(
        repo.delete_record(record.id()).await,
        Err(StorageError::NotFound)
    ));
    assert_eq!(repo.list_records().await.unwrap().len(), 1);

    repo.clear_records().await.unwrap();
    assert!(repo.list_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_ledger_upserts_single_row() {
    let repo = connect("memdb_ledger").await;
    assert!(repo.load_ledger().await.unwrap().is_none());

    let mut ledger = UnlockLedger::baseline_only();
    ledger.record(ScenarioId::new("dr-nguyen"), fixed_now());
    repo.save_ledger(&ledger).await.unwrap();

    ledger.record(ScenarioId::new("dr-okafor"), fixed_now() + Duration::hours(1));
    repo.save_ledger(&ledger).await.unwrap();

    assert_eq!(repo.load_ledger().await.unwrap(), Some(ledger));
}

#[tokio::test]
async fn sqlite_corrupt_ledger_is_a_serialization_error() {
    let repo = connect("memdb_corrupt").await;
    sqlx::query(
        "INSERT INTO progression_state (id, payload, updated_at) VALUES (1, 'garbage', '2024-01-01T00:00:00Z')",
    )
    .execute(repo.pool())
    .await
    .unwrap();

    assert!(matches!(
        repo.load_ledger().await,
        Err(StorageError::Serialization(_))
    ));
}
