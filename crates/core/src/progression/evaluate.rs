use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::ScenarioId;
use crate::progression::{ProgressionInputs, UnlockLedger, UnlockRequirement, UnlockTable};

/// Where one requirement currently stands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementProgress {
    pub requirement: UnlockRequirement,
    pub current: u32,
    pub satisfied: bool,
    /// 0-100, capped.
    pub percent: f64,
}

/// Unlock state of one scenario after an evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioProgressionState {
    pub scenario_id: ScenarioId,
    pub tier: u8,
    pub unlocked: bool,
    pub requirements: Vec<RequirementProgress>,
    /// Mean of the requirement percentages, rounded; 100 once unlocked.
    pub progress: u8,
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// Result of evaluating every rule against the current inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationPass {
    pub states: Vec<ScenarioProgressionState>,
    /// Scenarios whose requirements hold for the first time, in table order.
    pub newly_unlocked: Vec<ScenarioId>,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationPass {
    #[must_use]
    pub fn state(&self, id: &ScenarioId) -> Option<&ScenarioProgressionState> {
        self.states.iter().find(|s| &s.scenario_id == id)
    }

    /// Record this pass's new unlocks. Returns whether the ledger changed.
    pub fn apply_to(&self, ledger: &mut UnlockLedger) -> bool {
        let mut changed = false;
        for id in &self.newly_unlocked {
            changed |= ledger.record(id.clone(), self.evaluated_at);
        }
        changed
    }
}

/// Evaluate all unlock rules. Pure: the ledger is read, never written.
///
/// Scenarios already in the ledger stay unlocked whatever the inputs say.
#[must_use]
pub fn evaluate(
    table: &UnlockTable,
    inputs: &ProgressionInputs,
    ledger: &UnlockLedger,
    now: DateTime<Utc>,
) -> EvaluationPass {
    let mut states = Vec::with_capacity(table.len());
    let mut newly_unlocked = Vec::new();

    for rule in table.rules() {
        let requirements: Vec<RequirementProgress> = rule
            .requirements
            .iter()
            .map(|requirement| RequirementProgress {
                requirement: requirement.clone(),
                current: requirement.current(inputs),
                satisfied: requirement.is_satisfied(inputs),
                percent: requirement.percent(inputs),
            })
            .collect();

        let all_hold = requirements.iter().all(|r| r.satisfied);
        let already = ledger.is_unlocked(table, &rule.scenario_id);

        let unlocked_at = if rule.is_baseline() {
            None
        } else if already {
            ledger.unlocked_at(&rule.scenario_id)
        } else if all_hold {
            newly_unlocked.push(rule.scenario_id.clone());
            Some(now)
        } else {
            None
        };
        let unlocked = already || all_hold;

        let progress = if unlocked {
            100
        } else {
            mean_percent(&requirements)
        };

        states.push(ScenarioProgressionState {
            scenario_id: rule.scenario_id.clone(),
            tier: rule.tier,
            unlocked,
            requirements,
            progress,
            unlocked_at,
        });
    }

    EvaluationPass {
        states,
        newly_unlocked,
        evaluated_at: now,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn mean_percent(requirements: &[RequirementProgress]) -> u8 {
    if requirements.is_empty() {
        return 100;
    }
    let mean = requirements.iter().map(|r| r.percent).sum::<f64>() / requirements.len() as f64;
    mean.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Difficulty};
    use crate::model::{ProductId, ScoreBreakdown, SessionRecord, SessionRecordDraft};
    use crate::progression::ScenarioRule;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn session(scenario: &str, overall: u32, hours_ago: i64) -> SessionRecord {
        let completed_at = fixed_now() - Duration::hours(hours_ago);
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

    fn table() -> UnlockTable {
        UnlockTable::new(vec![
            ScenarioRule::new("dr-patel", 1, vec![]),
            ScenarioRule::new("one-session", 1, vec![UnlockRequirement::sessions(1)]),
            ScenarioRule::new("three-sessions", 1, vec![UnlockRequirement::sessions(3)]),
            ScenarioRule::new(
                "target",
                2,
                vec![
                    UnlockRequirement::score(65, Some(Difficulty::Beginner)),
                    UnlockRequirement::sessions(3),
                ],
            ),
        ])
        .unwrap()
    }

    fn run(sessions: &[SessionRecord], ledger: &UnlockLedger) -> EvaluationPass {
        let inputs = ProgressionInputs::from_sessions(sessions, &Catalog::built_in());
        evaluate(&table(), &inputs, ledger, fixed_now())
    }

    #[test]
    fn single_session_unlocks_one_session_rule_only() {
        let pass = run(&[session("dr-patel", 50, 0)], &UnlockLedger::baseline_only());
        assert!(pass.state(&ScenarioId::new("one-session")).unwrap().unlocked);
        assert!(!pass.state(&ScenarioId::new("three-sessions")).unwrap().unlocked);
        assert_eq!(pass.newly_unlocked, vec![ScenarioId::new("one-session")]);
    }

    #[test]
    fn score_alone_does_not_unlock_when_count_is_short() {
        let sessions = [session("dr-patel", 90, 0), session("dr-nguyen", 85, 1)];
        let pass = run(&sessions, &UnlockLedger::baseline_only());
        let target = pass.state(&ScenarioId::new("target")).unwrap();

        assert!(!target.unlocked);
        assert!(target.requirements[0].satisfied);
        assert!(!target.requirements[1].satisfied);
        // (100 + 66.67) / 2
        assert_eq!(target.progress, 83);
    }

    #[test]
    fn mixed_difficulty_history_unlocks_target() {
        let sessions = [
            session("dr-patel", 70, 0),
            session("dr-nguyen", 65, 1),
            session("dr-okafor", 60, 2),
        ];
        let pass = run(&sessions, &UnlockLedger::baseline_only());
        let target = pass.state(&ScenarioId::new("target")).unwrap();
        assert!(target.unlocked);
        assert_eq!(target.unlocked_at, Some(fixed_now()));
        assert!(pass.newly_unlocked.contains(&ScenarioId::new("target")));
    }

    #[test]
    fn unlocks_are_never_revoked() {
        let mut ledger = UnlockLedger::baseline_only();
        let earned_at = fixed_now() - Duration::days(3);
        ledger.record(ScenarioId::new("three-sessions"), earned_at);

        // Empty history would not satisfy anything.
        let pass = run(&[], &ledger);
        let state = pass.state(&ScenarioId::new("three-sessions")).unwrap();
        assert!(state.unlocked);
        assert_eq!(state.unlocked_at, Some(earned_at));
        assert_eq!(state.progress, 100);
        assert!(pass.newly_unlocked.is_empty());
    }

    #[test]
    fn apply_records_each_unlock_once() {
        let mut ledger = UnlockLedger::baseline_only();
        let sessions = [session("dr-patel", 50, 0)];

        let first = run(&sessions, &ledger);
        assert!(first.apply_to(&mut ledger));

        let second = run(&sessions, &ledger);
        assert!(second.newly_unlocked.is_empty());
        assert!(!second.apply_to(&mut ledger));
    }

    #[test]
    fn baseline_is_unlocked_with_full_progress() {
        let pass = run(&[], &UnlockLedger::baseline_only());
        let base = pass.state(&ScenarioId::new("dr-patel")).unwrap();
        assert!(base.unlocked);
        assert_eq!(base.progress, 100);
        assert_eq!(base.unlocked_at, None);
        assert!(pass.newly_unlocked.is_empty());
    }
}
