use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Difficulty};
use crate::model::{ScenarioId, SessionRecord};

/// Minimum overall score that keeps a score streak alive.
pub const SCORE_STREAK_THRESHOLD: u8 = 70;

/// A thresholded condition gating a scenario. All requirements of a scenario must hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnlockRequirement {
    /// Total completed sessions.
    Sessions { threshold: u32 },
    /// Best overall score, optionally restricted to one difficulty tier.
    Score {
        threshold: u32,
        difficulty: Option<Difficulty>,
    },
    /// Consecutive most-recent sessions scoring at least 70.
    Streak { threshold: u32 },
    /// Best overall score against one specific scenario.
    PersonaMastery {
        scenario: ScenarioId,
        threshold: u32,
    },
}

impl UnlockRequirement {
    #[must_use]
    pub fn sessions(threshold: u32) -> Self {
        Self::Sessions { threshold }
    }

    #[must_use]
    pub fn score(threshold: u32, difficulty: Option<Difficulty>) -> Self {
        Self::Score {
            threshold,
            difficulty,
        }
    }

    #[must_use]
    pub fn streak(threshold: u32) -> Self {
        Self::Streak { threshold }
    }

    #[must_use]
    pub fn persona_mastery(scenario: impl Into<ScenarioId>, threshold: u32) -> Self {
        Self::PersonaMastery {
            scenario: scenario.into(),
            threshold,
        }
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        match self {
            Self::Sessions { threshold }
            | Self::Score { threshold, .. }
            | Self::Streak { threshold }
            | Self::PersonaMastery { threshold, .. } => *threshold,
        }
    }

    /// The value this requirement's threshold is compared against.
    #[must_use]
    pub fn current(&self, inputs: &ProgressionInputs) -> u32 {
        match self {
            Self::Sessions { .. } => inputs.total_sessions,
            Self::Score {
                difficulty: Some(difficulty),
                ..
            } => inputs.best_on(*difficulty).map_or(0, u32::from),
            Self::Score {
                difficulty: None, ..
            } => inputs.best_any.map_or(0, u32::from),
            Self::Streak { .. } => inputs.score_streak,
            Self::PersonaMastery { scenario, .. } => {
                inputs.best_against(scenario).map_or(0, u32::from)
            }
        }
    }

    #[must_use]
    pub fn is_satisfied(&self, inputs: &ProgressionInputs) -> bool {
        self.current(inputs) >= self.threshold()
    }

    /// `min(100, 100 * current / threshold)`; a zero threshold is always complete.
    #[must_use]
    pub fn percent(&self, inputs: &ProgressionInputs) -> f64 {
        let threshold = self.threshold();
        if threshold == 0 {
            return 100.0;
        }
        (100.0 * f64::from(self.current(inputs)) / f64::from(threshold)).min(100.0)
    }
}

/// Everything the unlock rules look at, derived once from the session history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressionInputs {
    pub total_sessions: u32,
    pub best_any: Option<u8>,
    pub best_by_difficulty: BTreeMap<Difficulty, u8>,
    pub best_by_scenario: HashMap<ScenarioId, u8>,
    /// Consecutive newest sessions scoring at least [`SCORE_STREAK_THRESHOLD`].
    ///
    /// Unrelated to the calendar streak in `ProgressStats`.
    pub score_streak: u32,
}

impl ProgressionInputs {
    /// Derive inputs from a session history in any order.
    ///
    /// Scenarios missing from the catalog only count towards the unfiltered best.
    #[must_use]
    pub fn from_sessions(sessions: &[SessionRecord], catalog: &Catalog) -> Self {
        let mut inputs = Self {
            total_sessions: u32::try_from(sessions.len()).unwrap_or(u32::MAX),
            score_streak: score_streak(sessions),
            ..Self::default()
        };

        for session in sessions {
            let score = session.overall();
            inputs.best_any = Some(inputs.best_any.map_or(score, |b| b.max(score)));

            let best = inputs
                .best_by_scenario
                .entry(session.scenario_id().clone())
                .or_insert(score);
            *best = (*best).max(score);

            if let Some(difficulty) = catalog.difficulty(session.scenario_id()) {
                let best = inputs.best_by_difficulty.entry(difficulty).or_insert(score);
                *best = (*best).max(score);
            }
        }

        inputs
    }

    #[must_use]
    pub fn best_on(&self, difficulty: Difficulty) -> Option<u8> {
        self.best_by_difficulty.get(&difficulty).copied()
    }

    #[must_use]
    pub fn best_against(&self, scenario: &ScenarioId) -> Option<u8> {
        self.best_by_scenario.get(scenario).copied()
    }
}

/// Count the newest sessions scoring at least 70, stopping at the first miss.
///
/// Sessions are sorted newest-first by completion time before counting, so the
/// input order does not matter.
#[must_use]
pub fn score_streak(sessions: &[SessionRecord]) -> u32 {
    let mut ordered: Vec<&SessionRecord> = sessions.iter().collect();
    ordered.sort_by(|a, b| b.completed_at().cmp(&a.completed_at()));

    let run = ordered
        .iter()
        .take_while(|s| s.overall() >= SCORE_STREAK_THRESHOLD)
        .count();
    u32::try_from(run).unwrap_or(u32::MAX)
}
