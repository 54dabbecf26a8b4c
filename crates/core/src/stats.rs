use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use crate::model::{
    ProductId, ScenarioId, ScoreBreakdown, SessionRecord, SkillDimension, rounded_mean,
};
use crate::time::local_date;

//
// ─── CONSTANTS ─────────────────────────────────────────────────────────────────
//

/// Sessions required before a trend is reported.
pub const TREND_MIN_SESSIONS: usize = 5;
/// Size of each window compared by the trend.
pub const TREND_WINDOW: usize = 5;
/// Mean difference (in points) that counts as a real change.
pub const TREND_THRESHOLD: f64 = 5.0;
/// Longest calendar streak the walk will count.
pub const MAX_STREAK_DAYS: u32 = 365;
/// Number of personal bests reported.
pub const PERSONAL_BEST_LIMIT: usize = 10;

//
// ─── OUTPUT TYPES ──────────────────────────────────────────────────────────────
//

/// Direction of recent performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    Insufficient,
}

/// Running aggregate for one scenario or product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rollup {
    pub average: u8,
    pub count: u32,
    pub best: u8,
}

impl Rollup {
    fn first(score: u8) -> Self {
        Self {
            average: score,
            count: 1,
            best: score,
        }
    }

    /// Fold one more score in. The average is rounded on every update.
    fn push(&mut self, score: u8) {
        let total = u64::from(self.average) * u64::from(self.count) + u64::from(score);
        self.count = self.count.saturating_add(1);
        self.average = rounded_mean(total, u64::from(self.count));
        self.best = self.best.max(score);
    }
}

/// Highest score for one (scenario, product) combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonalBest {
    pub scenario_id: ScenarioId,
    pub product_id: ProductId,
    pub score: u8,
    pub achieved_at: DateTime<Utc>,
}

/// Statistics derived from the session history. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressStats {
    pub total_sessions: u32,
    pub average_score: u8,
    pub highest_score: u8,
    pub lowest_score: u8,
    pub total_time_secs: u64,
    pub by_scenario: BTreeMap<ScenarioId, Rollup>,
    pub by_product: BTreeMap<ProductId, Rollup>,
    pub recent_trend: Trend,
    pub skill_breakdown: ScoreBreakdown,
    /// Consecutive calendar days with at least one session.
    pub streak_days: u32,
    pub sessions_this_week: u32,
    pub personal_bests: Vec<PersonalBest>,
}

impl ProgressStats {
    /// Zero-valued statistics for an empty history.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            total_sessions: 0,
            average_score: 0,
            highest_score: 0,
            lowest_score: 0,
            total_time_secs: 0,
            by_scenario: BTreeMap::new(),
            by_product: BTreeMap::new(),
            recent_trend: Trend::Insufficient,
            skill_breakdown: ScoreBreakdown::default(),
            streak_days: 0,
            sessions_this_week: 0,
            personal_bests: Vec::new(),
        }
    }

    /// Aggregate a newest-first session history.
    ///
    /// `offset` decides which calendar day a session falls on for the streak.
    #[must_use]
    pub fn from_sessions(
        sessions: &[SessionRecord],
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Self {
        if sessions.is_empty() {
            return Self::empty();
        }

        let mut score_sum = 0_u64;
        let mut highest = 0_u8;
        let mut lowest = u8::MAX;
        let mut total_time_secs = 0_u64;
        let mut by_scenario: BTreeMap<ScenarioId, Rollup> = BTreeMap::new();
        let mut by_product: BTreeMap<ProductId, Rollup> = BTreeMap::new();
        let mut dimension_sums = [0_u64; 6];
        let mut sessions_this_week = 0_u32;
        let week_start = now - Duration::days(7);

        for session in sessions {
            let score = session.overall();
            score_sum += u64::from(score);
            highest = highest.max(score);
            lowest = lowest.min(score);
            total_time_secs = total_time_secs.saturating_add(session.duration_secs());

            by_scenario
                .entry(session.scenario_id().clone())
                .and_modify(|r| r.push(score))
                .or_insert_with(|| Rollup::first(score));
            by_product
                .entry(session.product_id().clone())
                .and_modify(|r| r.push(score))
                .or_insert_with(|| Rollup::first(score));

            for (sum, dimension) in dimension_sums.iter_mut().zip(SkillDimension::ALL) {
                *sum += u64::from(session.breakdown().get(dimension));
            }

            if session.completed_at() >= week_start {
                sessions_this_week = sessions_this_week.saturating_add(1);
            }
        }

        let count = sessions.len() as u64;
        let total_sessions = u32::try_from(sessions.len()).unwrap_or(u32::MAX);

        Self {
            total_sessions,
            average_score: rounded_mean(score_sum, count),
            highest_score: highest,
            lowest_score: lowest,
            total_time_secs,
            by_scenario,
            by_product,
            recent_trend: recent_trend(sessions),
            skill_breakdown: mean_breakdown(&dimension_sums, count),
            streak_days: calendar_streak(sessions, local_date(now, offset), offset),
            sessions_this_week,
            personal_bests: personal_bests(sessions),
        }
    }
}

//
// ─── HELPERS ───────────────────────────────────────────────────────────────────
//

fn mean_breakdown(sums: &[u64; 6], count: u64) -> ScoreBreakdown {
    ScoreBreakdown {
        opening: rounded_mean(sums[0], count),
        clinical_knowledge: rounded_mean(sums[1], count),
        objection_handling: rounded_mean(sums[2], count),
        time_management: rounded_mean(sums[3], count),
        compliance: rounded_mean(sums[4], count),
        closing: rounded_mean(sums[5], count),
    }
}

/// Compare the 5 most recent sessions with the 5 before them.
#[must_use]
pub fn recent_trend(sessions: &[SessionRecord]) -> Trend {
    if sessions.len() < TREND_MIN_SESSIONS {
        return Trend::Insufficient;
    }
    if sessions.len() < TREND_WINDOW * 2 {
        return Trend::Stable;
    }

    let mean = |window: &[SessionRecord]| {
        window.iter().map(|s| f64::from(s.overall())).sum::<f64>() / window.len() as f64
    };
    let recent = mean(&sessions[..TREND_WINDOW]);
    let prior = mean(&sessions[TREND_WINDOW..TREND_WINDOW * 2]);
    let diff = recent - prior;

    if diff > TREND_THRESHOLD {
        Trend::Improving
    } else if diff < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Consecutive local calendar days, ending today or yesterday, with a session.
#[must_use]
pub fn calendar_streak(sessions: &[SessionRecord], today: NaiveDate, offset: FixedOffset) -> u32 {
    let covered: BTreeSet<NaiveDate> = sessions
        .iter()
        .map(|s| local_date(s.completed_at(), offset))
        .collect();

    let start = if covered.contains(&today) {
        Some(today)
    } else {
        today.pred_opt().filter(|yesterday| covered.contains(yesterday))
    };
    let Some(mut day) = start else {
        return 0;
    };

    let mut streak = 0;
    while streak < MAX_STREAK_DAYS && covered.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

/// Best score per (scenario, product), top entries by score.
#[must_use]
pub fn personal_bests(sessions: &[SessionRecord]) -> Vec<PersonalBest> {
    let mut best: HashMap<(&ScenarioId, &ProductId), (u8, DateTime<Utc>)> = HashMap::new();
    for session in sessions {
        let key = (session.scenario_id(), session.product_id());
        let candidate = (session.overall(), session.completed_at());
        best.entry(key)
            .and_modify(|current| {
                if candidate.0 > current.0 {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }

    let mut out: Vec<PersonalBest> = best
        .into_iter()
        .map(|((scenario_id, product_id), (score, achieved_at))| PersonalBest {
            scenario_id: scenario_id.clone(),
            product_id: product_id.clone(),
            score,
            achieved_at,
        })
        .collect();
    out.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.scenario_id.cmp(&b.scenario_id))
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    out.truncate(PERSONAL_BEST_LIMIT);
    out
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
