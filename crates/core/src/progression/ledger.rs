use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ScenarioId;
use crate::progression::UnlockTable;

/// Format version written alongside the persisted ledger.
pub const LEDGER_VERSION: u32 = 1;

/// Durable record of earned unlocks and when they happened.
///
/// The baseline scenario is implied by the unlock table and never stored.
/// Entries are only ever added: an unlock is never revoked and its timestamp
/// never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockLedger {
    #[serde(default = "default_version")]
    version: u32,
    unlocked: BTreeMap<ScenarioId, DateTime<Utc>>,
}

fn default_version() -> u32 {
    LEDGER_VERSION
}

impl Default for UnlockLedger {
    fn default() -> Self {
        Self::baseline_only()
    }
}

impl UnlockLedger {
    /// A ledger where only the baseline scenario is available.
    #[must_use]
    pub fn baseline_only() -> Self {
        Self {
            version: LEDGER_VERSION,
            unlocked: BTreeMap::new(),
        }
    }

    /// Record an unlock. Returns `false` (and changes nothing) if it was already recorded.
    pub fn record(&mut self, id: ScenarioId, at: DateTime<Utc>) -> bool {
        if self.unlocked.contains_key(&id) {
            return false;
        }
        self.unlocked.insert(id, at);
        true
    }

    #[must_use]
    pub fn unlocked_at(&self, id: &ScenarioId) -> Option<DateTime<Utc>> {
        self.unlocked.get(id).copied()
    }

    /// Whether `id` is available, counting the table's baseline scenario.
    #[must_use]
    pub fn is_unlocked(&self, table: &UnlockTable, id: &ScenarioId) -> bool {
        table.baseline() == id || self.unlocked.contains_key(id)
    }

    /// Number of available scenarios in `table`, baseline included.
    #[must_use]
    pub fn unlocked_count(&self, table: &UnlockTable) -> usize {
        table
            .rules()
            .iter()
            .filter(|rule| self.is_unlocked(table, &rule.scenario_id))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ScenarioId, &DateTime<Utc>)> {
        self.unlocked.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unlocked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn record_is_set_once() {
        let mut ledger = UnlockLedger::baseline_only();
        let id = ScenarioId::new("dr-nguyen");
        let first = fixed_now();

        assert!(ledger.record(id.clone(), first));
        assert!(!ledger.record(id.clone(), first + Duration::days(1)));
        assert_eq!(ledger.unlocked_at(&id), Some(first));
    }

    #[test]
    fn baseline_is_always_unlocked() {
        let table = UnlockTable::default_table();
        let ledger = UnlockLedger::baseline_only();
        assert!(ledger.is_unlocked(&table, table.baseline()));
        assert!(!ledger.is_unlocked(&table, &ScenarioId::new("dr-nguyen")));
        assert_eq!(ledger.unlocked_count(&table), 1);
    }

    #[test]
    fn json_round_trip_keeps_timestamps() {
        let mut ledger = UnlockLedger::baseline_only();
        ledger.record(ScenarioId::new("dr-okafor"), fixed_now());

        let json = serde_json::to_string(&ledger).unwrap();
        let back: UnlockLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ledger);
    }

    #[test]
    fn missing_version_defaults() {
        let back: UnlockLedger = serde_json::from_str(r#"{"unlocked":{}}"#).unwrap();
        assert_eq!(back, UnlockLedger::baseline_only());
    }
}
