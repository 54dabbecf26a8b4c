//! Read-only catalogs of scenario, product, and coaching-strategy metadata.
//!
//! Lookups never fail: a missing id degrades to the raw id as a label and a
//! generic coaching strategy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{ProductId, ScenarioId};

/// Coarse difficulty tier of a scenario, ordered from easiest to hardest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    pub const HARDEST: Difficulty = Difficulty::Expert;

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        }
    }
}

/// Time budget used when a scenario does not define one.
pub const DEFAULT_TIME_BUDGET_SECS: u32 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioMeta {
    pub name: String,
    pub difficulty: Difficulty,
    pub time_budget_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductMeta {
    pub name: String,
}

/// Display metadata for scenarios and products.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    scenarios: HashMap<ScenarioId, ScenarioMeta>,
    products: HashMap<ProductId, ProductMeta>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_scenario(
        mut self,
        id: impl Into<ScenarioId>,
        name: impl Into<String>,
        difficulty: Difficulty,
        time_budget_secs: u32,
    ) -> Self {
        self.scenarios.insert(
            id.into(),
            ScenarioMeta {
                name: name.into(),
                difficulty,
                time_budget_secs,
            },
        );
        self
    }

    #[must_use]
    pub fn with_product(mut self, id: impl Into<ProductId>, name: impl Into<String>) -> Self {
        self.products
            .insert(id.into(), ProductMeta { name: name.into() });
        self
    }

    /// The scenarios and products shipped with the product.
    #[must_use]
    pub fn built_in() -> Self {
        Self::new()
            .with_scenario("dr-patel", "Dr. Patel, Family Medicine", Difficulty::Beginner, 300)
            .with_scenario("dr-nguyen", "Dr. Nguyen, Internal Medicine", Difficulty::Beginner, 300)
            .with_scenario("dr-okafor", "Dr. Okafor, Cardiology", Difficulty::Intermediate, 300)
            .with_scenario("dr-lindqvist", "Dr. Lindqvist, Endocrinology", Difficulty::Intermediate, 360)
            .with_scenario("dr-morales", "Dr. Morales, Oncology", Difficulty::Advanced, 360)
            .with_scenario("dr-brennan", "Dr. Brennan, Hospital Formulary Lead", Difficulty::Advanced, 420)
            .with_scenario("dr-whitfield", "Dr. Whitfield, Department Chair", Difficulty::Expert, 420)
            .with_scenario("dr-castellano", "Dr. Castellano, Key Opinion Leader", Difficulty::Expert, 480)
            .with_product("cardiozen", "CardioZen")
            .with_product("glucobalance", "GlucoBalance")
            .with_product("oncoshield", "OncoShield")
    }

    #[must_use]
    pub fn scenario(&self, id: &ScenarioId) -> Option<&ScenarioMeta> {
        self.scenarios.get(id)
    }

    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<&ProductMeta> {
        self.products.get(id)
    }

    #[must_use]
    pub fn difficulty(&self, id: &ScenarioId) -> Option<Difficulty> {
        self.scenario(id).map(|meta| meta.difficulty)
    }

    #[must_use]
    pub fn scenario_label(&self, id: &ScenarioId) -> String {
        self.scenario(id)
            .map_or_else(|| id.as_str().to_owned(), |meta| meta.name.clone())
    }

    #[must_use]
    pub fn product_label(&self, id: &ProductId) -> String {
        self.product(id)
            .map_or_else(|| id.as_str().to_owned(), |meta| meta.name.clone())
    }

    #[must_use]
    pub fn time_budget_secs(&self, id: &ScenarioId) -> u32 {
        self.scenario(id)
            .map_or(DEFAULT_TIME_BUDGET_SECS, |meta| meta.time_budget_secs)
    }
}

/// Per-scenario coaching strategy consumed by the hint generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioStrategy {
    pub opening_tip: String,
    pub reminders: Vec<String>,
    /// Ordered keyword → tip pairs; the first keyword found wins.
    pub objection_tips: Vec<(String, String)>,
    pub closing_tip: String,
    /// Ideal response length in characters, `(min, max)`.
    pub ideal_response_len: (usize, usize),
}

impl ScenarioStrategy {
    /// Strategy applied when a scenario has no dedicated entry.
    #[must_use]
    pub fn generic() -> Self {
        Self {
            opening_tip: "Introduce yourself and ask what matters most to this physician today."
                .into(),
            reminders: vec![
                "Tie every claim back to the patient population this physician treats.".into(),
                "Listen for the concern behind the question before answering.".into(),
                "Keep answers short and check for understanding.".into(),
            ],
            objection_tips: vec![
                (
                    "cost".into(),
                    "Acknowledge the cost concern, then bring up coverage and patient support programs."
                        .into(),
                ),
                (
                    "side effect".into(),
                    "Address safety directly with the tolerability data from the label.".into(),
                ),
                (
                    "busy".into(),
                    "Respect their time: offer one key point and ask for two minutes.".into(),
                ),
            ],
            closing_tip: "Summarize the key benefit and ask for a concrete next step.".into(),
            ideal_response_len: (40, 280),
        }
    }
}

/// Coaching strategies keyed by scenario.
#[derive(Debug, Clone)]
pub struct StrategyCatalog {
    strategies: HashMap<ScenarioId, ScenarioStrategy>,
    fallback: ScenarioStrategy,
}

impl Default for StrategyCatalog {
    fn default() -> Self {
        Self {
            strategies: HashMap::new(),
            fallback: ScenarioStrategy::generic(),
        }
    }
}

impl StrategyCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_strategy(mut self, id: impl Into<ScenarioId>, strategy: ScenarioStrategy) -> Self {
        self.strategies.insert(id.into(), strategy);
        self
    }

    #[must_use]
    pub fn built_in() -> Self {
        let skeptic = ScenarioStrategy {
            opening_tip: "Dr. Okafor values evidence. Open with the headline outcome from the pivotal trial."
                .into(),
            reminders: vec![
                "Quote absolute risk reduction, not just relative numbers.".into(),
                "Cardiologists compare against standard of care: be ready with head-to-head data.".into(),
            ],
            objection_tips: vec![
                (
                    "evidence".into(),
                    "Cite the trial design and primary endpoint before the result.".into(),
                ),
                (
                    "guideline".into(),
                    "Reference where the therapy sits in current guidelines.".into(),
                ),
                (
                    "cost".into(),
                    "Reframe cost around avoided hospitalizations.".into(),
                ),
            ],
            closing_tip: "Ask which of their patients would be the first candidate.".into(),
            ideal_response_len: (60, 320),
        };
        let gatekeeper = ScenarioStrategy {
            opening_tip: "Dr. Brennan manages the formulary. Lead with budget impact, not features."
                .into(),
            reminders: vec![
                "Speak to total cost of care across the hospital.".into(),
                "Mention the patient support program when access comes up.".into(),
            ],
            objection_tips: vec![
                (
                    "budget".into(),
                    "Walk through the budget-impact model for their bed count.".into(),
                ),
                (
                    "formulary".into(),
                    "Explain the clinical gap the current formulary leaves open.".into(),
                ),
            ],
            closing_tip: "Propose a formulary review date before you leave.".into(),
            ideal_response_len: (60, 300),
        };

        Self::new()
            .with_strategy("dr-okafor", skeptic)
            .with_strategy("dr-brennan", gatekeeper)
    }

    /// Strategy for a scenario, or the generic fallback.
    #[must_use]
    pub fn strategy(&self, id: &ScenarioId) -> &ScenarioStrategy {
        self.strategies.get(id).unwrap_or(&self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ids_fall_back_to_raw_label() {
        let catalog = Catalog::built_in();
        let unknown = ScenarioId::new("dr-unknown");
        assert_eq!(catalog.scenario_label(&unknown), "dr-unknown");
        assert_eq!(catalog.product_label(&ProductId::new("mystery")), "mystery");
        assert_eq!(catalog.time_budget_secs(&unknown), DEFAULT_TIME_BUDGET_SECS);
        assert_eq!(catalog.difficulty(&unknown), None);
    }

    #[test]
    fn built_in_catalog_resolves_known_ids() {
        let catalog = Catalog::built_in();
        let id = ScenarioId::new("dr-whitfield");
        assert_eq!(catalog.difficulty(&id), Some(Difficulty::Expert));
        assert_eq!(catalog.product_label(&ProductId::new("cardiozen")), "CardioZen");
    }

    #[test]
    fn strategy_falls_back_to_generic() {
        let strategies = StrategyCatalog::built_in();
        let generic = strategies.strategy(&ScenarioId::new("dr-patel"));
        assert_eq!(generic, &ScenarioStrategy::generic());
        let okafor = strategies.strategy(&ScenarioId::new("dr-okafor"));
        assert!(okafor.opening_tip.contains("Okafor"));
    }

    #[test]
    fn difficulty_is_ordered() {
        assert!(Difficulty::Beginner < Difficulty::Expert);
        assert_eq!(Difficulty::HARDEST, Difficulty::Expert);
    }
}
