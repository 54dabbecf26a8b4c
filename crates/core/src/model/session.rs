use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::score::{ScoreBreakdown, ScoreError, checked_overall};
use crate::model::{ProductId, ScenarioId, SessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionRecordError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error(transparent)]
    Score(#[from] ScoreError),
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    /// The trainee.
    User,
    /// The simulated persona.
    Counterpart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: SpeakerRole,
    pub text: String,
}

impl Turn {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: SpeakerRole::User,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn counterpart(text: impl Into<String>) -> Self {
        Self {
            role: SpeakerRole::Counterpart,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == SpeakerRole::User
    }
}

/// Everything needed to create a `SessionRecord` at session completion.
#[derive(Debug, Clone)]
pub struct SessionRecordDraft {
    pub scenario_id: ScenarioId,
    pub product_id: ProductId,
    pub turns: Vec<Turn>,
    pub breakdown: ScoreBreakdown,
    /// Overall score as reported by the evaluator. `None` derives it from the breakdown.
    pub overall: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl SessionRecordDraft {
    /// Validate and freeze the draft into a record with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError` if the time range or any score is invalid.
    pub fn complete(self) -> Result<SessionRecord, SessionRecordError> {
        self.complete_with_id(SessionId::generate())
    }

    /// Same as [`complete`](Self::complete) with a caller-chosen id.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError` if the time range or any score is invalid.
    pub fn complete_with_id(self, id: SessionId) -> Result<SessionRecord, SessionRecordError> {
        if self.completed_at < self.started_at {
            return Err(SessionRecordError::InvalidTimeRange);
        }
        self.breakdown.validate()?;
        let overall = match self.overall {
            Some(value) => checked_overall(value)?,
            None => self.breakdown.overall(),
        };
        let duration_secs =
            u64::try_from((self.completed_at - self.started_at).num_seconds()).unwrap_or(0);

        Ok(SessionRecord {
            id,
            scenario_id: self.scenario_id,
            product_id: self.product_id,
            turns: self.turns,
            breakdown: self.breakdown,
            overall,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_secs,
        })
    }
}

/// One completed simulated conversation and its evaluation outcome.
///
/// Immutable once created. `overall` is the canonical score for every derived
/// computation, whether it was supplied by the evaluator or derived from the
/// breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    id: SessionId,
    scenario_id: ScenarioId,
    product_id: ProductId,
    turns: Vec<Turn>,
    breakdown: ScoreBreakdown,
    overall: u8,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    duration_secs: u64,
}

impl SessionRecord {
    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError` if persisted values violate record invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        scenario_id: ScenarioId,
        product_id: ProductId,
        turns: Vec<Turn>,
        breakdown: ScoreBreakdown,
        overall: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        duration_secs: u64,
    ) -> Result<Self, SessionRecordError> {
        if completed_at < started_at {
            return Err(SessionRecordError::InvalidTimeRange);
        }
        breakdown.validate()?;
        Ok(Self {
            id,
            scenario_id,
            product_id,
            turns,
            breakdown,
            overall: checked_overall(overall)?,
            started_at,
            completed_at,
            duration_secs,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn scenario_id(&self) -> &ScenarioId {
        &self.scenario_id
    }

    #[must_use]
    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn breakdown(&self) -> &ScoreBreakdown {
        &self.breakdown
    }

    #[must_use]
    pub fn overall(&self) -> u8 {
        self.overall
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn draft(overall: Option<u32>) -> SessionRecordDraft {
        let now = fixed_now();
        SessionRecordDraft {
            scenario_id: ScenarioId::new("dr-patel"),
            product_id: ProductId::new("cardiozen"),
            turns: vec![Turn::counterpart("Hello"), Turn::user("Hi doctor")],
            breakdown: ScoreBreakdown::new(80, 70, 75, 60, 90, 66).unwrap(),
            overall,
            started_at: now - Duration::seconds(300),
            completed_at: now,
        }
    }

    #[test]
    fn derives_overall_and_duration() {
        let record = draft(None).complete().unwrap();
        assert_eq!(record.overall(), 74);
        assert_eq!(record.duration_secs(), 300);
        assert_eq!(record.turns().len(), 2);
    }

    #[test]
    fn supplied_overall_wins_over_breakdown() {
        let record = draft(Some(55)).complete().unwrap();
        assert_eq!(record.overall(), 55);
    }

    #[test]
    fn rejects_inverted_time_range() {
        let mut d = draft(None);
        d.completed_at = d.started_at - Duration::seconds(1);
        assert_eq!(d.complete().unwrap_err(), SessionRecordError::InvalidTimeRange);
    }

    #[test]
    fn rejects_out_of_range_overall() {
        let err = draft(Some(140)).complete().unwrap_err();
        assert!(matches!(err, SessionRecordError::Score(_)));
    }

    #[test]
    fn persisted_rows_go_through_the_same_checks() {
        let now = fixed_now();
        let rehydrate = |overall: u32, started_at: DateTime<Utc>| {
            SessionRecord::from_persisted(
                SessionId::generate(),
                ScenarioId::new("dr-patel"),
                ProductId::new("cardiozen"),
                Vec::new(),
                ScoreBreakdown::uniform(70).unwrap(),
                overall,
                started_at,
                now,
                60,
            )
        };

        assert_eq!(rehydrate(70, now - Duration::seconds(60)).unwrap().overall(), 70);
        assert!(matches!(
            rehydrate(101, now - Duration::seconds(60)),
            Err(SessionRecordError::Score(_))
        ));
        assert_eq!(
            rehydrate(70, now + Duration::seconds(1)).unwrap_err(),
            SessionRecordError::InvalidTimeRange
        );
    }
}
