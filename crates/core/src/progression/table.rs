use std::collections::HashSet;

use crate::catalog::Difficulty;
use crate::model::ScenarioId;
use crate::progression::{ProgressionError, UnlockRequirement};

/// Unlock rule for one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioRule {
    pub scenario_id: ScenarioId,
    /// All must hold. Empty marks the baseline scenario.
    pub requirements: Vec<UnlockRequirement>,
    pub tier: u8,
}

impl ScenarioRule {
    #[must_use]
    pub fn new(
        scenario_id: impl Into<ScenarioId>,
        tier: u8,
        requirements: Vec<UnlockRequirement>,
    ) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            requirements,
            tier,
        }
    }

    #[must_use]
    pub fn is_baseline(&self) -> bool {
        self.requirements.is_empty()
    }
}

/// Static, ordered unlock configuration.
///
/// Invariant: exactly one rule has no requirements, and scenario ids are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockTable {
    rules: Vec<ScenarioRule>,
    baseline: usize,
}

impl UnlockTable {
    /// Validate and build a table.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::BaselineCount` unless exactly one rule is
    /// requirement-free, or `DuplicateScenario` if an id repeats.
    pub fn new(rules: Vec<ScenarioRule>) -> Result<Self, ProgressionError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(&rule.scenario_id) {
                return Err(ProgressionError::DuplicateScenario(rule.scenario_id.clone()));
            }
        }

        let baselines: Vec<usize> = rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.is_baseline())
            .map(|(idx, _)| idx)
            .collect();
        let [baseline] = baselines.as_slice() else {
            return Err(ProgressionError::BaselineCount {
                found: baselines.len(),
            });
        };
        let baseline = *baseline;

        Ok(Self { rules, baseline })
    }

    /// The unlock ladder matching the built-in scenario catalog.
    ///
    /// # Panics
    ///
    /// Never in practice: the built-in rules satisfy the table invariants.
    #[must_use]
    pub fn default_table() -> Self {
        use UnlockRequirement as R;

        Self::new(vec![
            ScenarioRule::new("dr-patel", 1, vec![]),
            ScenarioRule::new("dr-nguyen", 1, vec![R::sessions(1)]),
            ScenarioRule::new(
                "dr-okafor",
                2,
                vec![R::score(65, Some(Difficulty::Beginner)), R::sessions(3)],
            ),
            ScenarioRule::new(
                "dr-lindqvist",
                2,
                vec![R::sessions(5), R::score(70, Some(Difficulty::Beginner))],
            ),
            ScenarioRule::new(
                "dr-morales",
                3,
                vec![R::score(70, Some(Difficulty::Intermediate)), R::sessions(8)],
            ),
            ScenarioRule::new(
                "dr-brennan",
                3,
                vec![R::streak(3), R::persona_mastery("dr-okafor", 75)],
            ),
            ScenarioRule::new(
                "dr-whitfield",
                4,
                vec![R::score(80, Some(Difficulty::Advanced)), R::streak(5)],
            ),
            ScenarioRule::new(
                "dr-castellano",
                4,
                vec![R::persona_mastery("dr-whitfield", 85), R::sessions(20)],
            ),
        ])
        .expect("built-in unlock table is valid")
    }

    #[must_use]
    pub fn rules(&self) -> &[ScenarioRule] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn baseline(&self) -> &ScenarioId {
        &self.rules[self.baseline].scenario_id
    }

    #[must_use]
    pub fn rule(&self, id: &ScenarioId) -> Option<&ScenarioRule> {
        self.rules.iter().find(|rule| &rule.scenario_id == id)
    }

    #[must_use]
    pub fn requirements(&self, id: &ScenarioId) -> &[UnlockRequirement] {
        self.rule(id)
            .map(|rule| rule.requirements.as_slice())
            .unwrap_or_default()
    }
}
