//! Scenario unlock rules, evaluation, and the derived tier/achievement summary.

mod evaluate;
mod ledger;
mod requirement;
mod summary;
mod table;

use thiserror::Error;

use crate::model::ScenarioId;

pub use evaluate::{EvaluationPass, RequirementProgress, ScenarioProgressionState, evaluate};
pub use ledger::{LEDGER_VERSION, UnlockLedger};
pub use requirement::{ProgressionInputs, SCORE_STREAK_THRESHOLD, UnlockRequirement, score_streak};
pub use summary::{Achievement, ProgressionSummary, TIERS, Tier};
pub use table::{ScenarioRule, UnlockTable};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressionError {
    #[error("unlock table needs exactly one baseline scenario, found {found}")]
    BaselineCount { found: usize },

    #[error("scenario {0} appears more than once in the unlock table")]
    DuplicateScenario(ScenarioId),
}
