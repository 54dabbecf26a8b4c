use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest value any score can take.
pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("{dimension} score {value} is out of range (0-100)")]
    OutOfRange {
        dimension: &'static str,
        value: u32,
    },
}

/// One of the six dimensions a session is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillDimension {
    Opening,
    ClinicalKnowledge,
    ObjectionHandling,
    TimeManagement,
    Compliance,
    Closing,
}

impl SkillDimension {
    pub const ALL: [SkillDimension; 6] = [
        SkillDimension::Opening,
        SkillDimension::ClinicalKnowledge,
        SkillDimension::ObjectionHandling,
        SkillDimension::TimeManagement,
        SkillDimension::Compliance,
        SkillDimension::Closing,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SkillDimension::Opening => "opening",
            SkillDimension::ClinicalKnowledge => "clinical_knowledge",
            SkillDimension::ObjectionHandling => "objection_handling",
            SkillDimension::TimeManagement => "time_management",
            SkillDimension::Compliance => "compliance",
            SkillDimension::Closing => "closing",
        }
    }
}

/// Six-dimension score breakdown produced by the external evaluator.
///
/// Only the contract is assumed: six values in `0..=100`. How they were
/// derived (model-backed or heuristic) is irrelevant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub opening: u8,
    pub clinical_knowledge: u8,
    pub objection_handling: u8,
    pub time_management: u8,
    pub compliance: u8,
    pub closing: u8,
}

impl ScoreBreakdown {
    /// Build a breakdown, validating every dimension.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::OutOfRange` for the first dimension above 100.
    pub fn new(
        opening: u32,
        clinical_knowledge: u32,
        objection_handling: u32,
        time_management: u32,
        compliance: u32,
        closing: u32,
    ) -> Result<Self, ScoreError> {
        Ok(Self {
            opening: checked(SkillDimension::Opening, opening)?,
            clinical_knowledge: checked(SkillDimension::ClinicalKnowledge, clinical_knowledge)?,
            objection_handling: checked(SkillDimension::ObjectionHandling, objection_handling)?,
            time_management: checked(SkillDimension::TimeManagement, time_management)?,
            compliance: checked(SkillDimension::Compliance, compliance)?,
            closing: checked(SkillDimension::Closing, closing)?,
        })
    }

    /// Same score on every dimension.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::OutOfRange` if `value` exceeds 100.
    pub fn uniform(value: u32) -> Result<Self, ScoreError> {
        Self::new(value, value, value, value, value, value)
    }

    #[must_use]
    pub fn get(&self, dimension: SkillDimension) -> u8 {
        match dimension {
            SkillDimension::Opening => self.opening,
            SkillDimension::ClinicalKnowledge => self.clinical_knowledge,
            SkillDimension::ObjectionHandling => self.objection_handling,
            SkillDimension::TimeManagement => self.time_management,
            SkillDimension::Compliance => self.compliance,
            SkillDimension::Closing => self.closing,
        }
    }

    /// Rounded mean of the six dimensions.
    #[must_use]
    pub fn overall(&self) -> u8 {
        let sum: u32 = SkillDimension::ALL
            .iter()
            .map(|d| u32::from(self.get(*d)))
            .sum();
        rounded_mean(u64::from(sum), 6)
    }

    /// Validate that every stored dimension is still in range.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::OutOfRange` for the first offending dimension.
    pub fn validate(&self) -> Result<(), ScoreError> {
        for dimension in SkillDimension::ALL {
            checked(dimension, u32::from(self.get(dimension)))?;
        }
        Ok(())
    }
}

/// Validate a standalone overall score.
///
/// # Errors
///
/// Returns `ScoreError::OutOfRange` if `value` exceeds 100.
pub fn checked_overall(value: u32) -> Result<u8, ScoreError> {
    checked_named("overall", value)
}

fn checked(dimension: SkillDimension, value: u32) -> Result<u8, ScoreError> {
    checked_named(dimension.as_str(), value)
}

fn checked_named(dimension: &'static str, value: u32) -> Result<u8, ScoreError> {
    match u8::try_from(value) {
        Ok(v) if v <= MAX_SCORE => Ok(v),
        _ => Err(ScoreError::OutOfRange { dimension, value }),
    }
}

/// Integer mean rounded half away from zero; 0 for an empty set.
///
/// Inputs are scores, so the result always fits in `u8`.
#[must_use]
pub fn rounded_mean(sum: u64, count: u64) -> u8 {
    if count == 0 {
        return 0;
    }
    let rounded = (sum * 2 + count) / (count * 2);
    u8::try_from(rounded).unwrap_or(MAX_SCORE)
}
