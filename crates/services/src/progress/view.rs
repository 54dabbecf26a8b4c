use chrono::{DateTime, Utc};

use coach_core::catalog::{Catalog, Difficulty};
use coach_core::model::ScenarioId;
use coach_core::progression::{RequirementProgress, ScenarioProgressionState};

/// Presentation-agnostic progression row for one scenario.
///
/// Carries the catalog label and difficulty alongside the evaluated state so a
/// caller can render a locked/unlocked roster without touching the catalog.
/// No pre-formatted strings beyond the display name.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioProgressItem {
    pub scenario_id: ScenarioId,
    pub label: String,
    pub difficulty: Option<Difficulty>,
    pub tier: u8,
    pub unlocked: bool,
    pub progress: u8,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub requirements: Vec<RequirementProgress>,
}

impl ScenarioProgressItem {
    #[must_use]
    pub fn from_state(state: &ScenarioProgressionState, catalog: &Catalog) -> Self {
        Self {
            scenario_id: state.scenario_id.clone(),
            label: catalog.scenario_label(&state.scenario_id),
            difficulty: catalog.difficulty(&state.scenario_id),
            tier: state.tier,
            unlocked: state.unlocked,
            progress: state.progress,
            unlocked_at: state.unlocked_at,
            requirements: state.requirements.clone(),
        }
    }

    /// Requirements still standing between the user and this scenario.
    pub fn outstanding(&self) -> impl Iterator<Item = &RequirementProgress> {
        self.requirements.iter().filter(|r| !r.satisfied)
    }
}
