use serde::Serialize;

use crate::catalog::Difficulty;
use crate::progression::{ProgressionInputs, UnlockLedger, UnlockTable};

/// Coarse progression label, reached at `threshold` unlocked scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tier {
    pub name: &'static str,
    pub threshold: usize,
}

/// Unlocked-count → tier ladder, ascending.
pub const TIERS: [Tier; 4] = [
    Tier {
        name: "Trainee",
        threshold: 1,
    },
    Tier {
        name: "Associate",
        threshold: 3,
    },
    Tier {
        name: "Specialist",
        threshold: 5,
    },
    Tier {
        name: "Master",
        threshold: 8,
    },
];

const HOT_STREAK_LENGTH: u32 = 5;
const TOP_PERFORMER_SCORE: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    /// Unlocked a scenario beyond the baseline.
    FirstUnlock,
    /// At least half of all scenarios unlocked.
    HalfwayThere,
    /// Every scenario unlocked.
    FullRoster,
    /// Score streak of 5 or more.
    HotStreak,
    /// 90+ on a scenario of the hardest difficulty.
    TopPerformer,
}

impl Achievement {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Achievement::FirstUnlock => "First Unlock",
            Achievement::HalfwayThere => "Halfway There",
            Achievement::FullRoster => "Full Roster",
            Achievement::HotStreak => "Hot Streak",
            Achievement::TopPerformer => "Top Performer",
        }
    }
}

/// Tier, next-tier progress, and achievements. Derived on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressionSummary {
    pub unlocked_count: usize,
    pub total_scenarios: usize,
    pub tier: Tier,
    pub next_tier: Option<Tier>,
    /// 0-100; 100 at the top tier.
    pub next_tier_progress: u8,
    pub achievements: Vec<Achievement>,
}

impl ProgressionSummary {
    #[must_use]
    pub fn derive(table: &UnlockTable, ledger: &UnlockLedger, inputs: &ProgressionInputs) -> Self {
        let unlocked_count = ledger.unlocked_count(table);
        let total_scenarios = table.len();

        let tier = TIERS
            .iter()
            .rev()
            .find(|tier| unlocked_count >= tier.threshold)
            .copied()
            .unwrap_or(TIERS[0]);
        let next_tier = TIERS
            .iter()
            .find(|tier| tier.threshold > unlocked_count)
            .copied();
        let next_tier_progress = next_tier.map_or(100, |next| {
            let pct = unlocked_count.saturating_mul(100) / next.threshold;
            u8::try_from(pct.min(100)).unwrap_or(100)
        });

        let mut achievements = Vec::new();
        if unlocked_count > 1 {
            achievements.push(Achievement::FirstUnlock);
        }
        if total_scenarios > 0 && unlocked_count * 2 >= total_scenarios {
            achievements.push(Achievement::HalfwayThere);
        }
        if total_scenarios > 0 && unlocked_count == total_scenarios {
            achievements.push(Achievement::FullRoster);
        }
        if inputs.score_streak >= HOT_STREAK_LENGTH {
            achievements.push(Achievement::HotStreak);
        }
        if inputs
            .best_on(Difficulty::HARDEST)
            .is_some_and(|best| best >= TOP_PERFORMER_SCORE)
        {
            achievements.push(Achievement::TopPerformer);
        }

        Self {
            unlocked_count,
            total_scenarios,
            tier,
            next_tier,
            next_tier_progress,
            achievements,
        }
    }
}
