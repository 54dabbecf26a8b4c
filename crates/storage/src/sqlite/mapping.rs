use coach_core::model::{
    ProductId, ScenarioId, ScoreBreakdown, SessionId, SessionRecord, Turn,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn score_from_row(row: &sqlx::sqlite::SqliteRow, field: &'static str) -> Result<u32, StorageError> {
    u32_from_i64(field, row.try_get::<i64, _>(field).map_err(ser)?)
}

pub(crate) fn session_id_to_text(id: SessionId) -> String {
    id.to_string()
}

pub(crate) fn session_id_from_text(raw: &str) -> Result<SessionId, StorageError> {
    raw.parse::<SessionId>().map_err(ser)
}

pub(crate) fn encode_turns(turns: &[Turn]) -> Result<String, StorageError> {
    serde_json::to_string(turns).map_err(ser)
}

fn decode_turns(raw: &str) -> Result<Vec<Turn>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_record_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, StorageError> {
    let id = session_id_from_text(&row.try_get::<String, _>("id").map_err(ser)?)?;
    let scenario_id = ScenarioId::new(row.try_get::<String, _>("scenario_id").map_err(ser)?);
    let product_id = ProductId::new(row.try_get::<String, _>("product_id").map_err(ser)?);
    let turns = decode_turns(&row.try_get::<String, _>("turns").map_err(ser)?)?;

    let breakdown = ScoreBreakdown::new(
        score_from_row(row, "opening")?,
        score_from_row(row, "clinical_knowledge")?,
        score_from_row(row, "objection_handling")?,
        score_from_row(row, "time_management")?,
        score_from_row(row, "compliance")?,
        score_from_row(row, "closing")?,
    )
    .map_err(ser)?;

    let duration_secs: i64 = row.try_get("duration_secs").map_err(ser)?;
    let duration_secs = u64::try_from(duration_secs)
        .map_err(|_| StorageError::Serialization(format!("invalid duration_secs: {duration_secs}")))?;

    SessionRecord::from_persisted(
        id,
        scenario_id,
        product_id,
        turns,
        breakdown,
        score_from_row(row, "overall")?,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
        duration_secs,
    )
    .map_err(ser)
}
