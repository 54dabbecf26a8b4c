//! Priority-ordered hint selection over a snapshot of the conversation.

use std::collections::HashSet;

use chrono::Duration;
use rand::Rng;
use serde::Serialize;

use coach_core::catalog::ScenarioStrategy;
use coach_core::model::Turn;

use super::config::CoachingConfig;

pub const OPENING_KEY: &str = "opening";
pub const LENGTH_WARNING_KEY: &str = "length-warning";
pub const DATA_REMINDER_KEY: &str = "data-reminder";
pub const ENGAGEMENT_KEY: &str = "engagement";
pub const CLOSING_KEY: &str = "closing";
pub const MOMENTUM_KEY: &str = "momentum";

/// Terms that show a reply leaned on clinical evidence. Matched as
/// lowercase substrings.
const CLINICAL_INDICATORS: &[&str] = &[
    "%",
    "percent",
    "trial",
    "study",
    "studies",
    "data",
    "evidence",
    "endpoint",
    "efficacy",
    "outcome",
    "compared",
    "versus",
    " vs",
    "reduction",
    "relative risk",
    "placebo",
];

const INTERROGATIVE_OPENERS: &[&str] = &[
    "what", "how", "why", "when", "where", "which", "who", "could", "would", "can", "do",
    "does", "is", "are", "have", "will", "should",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    Tip,
    Warning,
    Reminder,
    Suggestion,
}

/// One coaching message. `key` is stable across re-evaluations and is what
/// dismissal suppresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoachingHint {
    pub key: String,
    pub kind: HintKind,
    pub title: String,
    pub message: String,
    /// 1 is the most urgent.
    pub priority: u8,
}

impl CoachingHint {
    fn new(
        key: impl Into<String>,
        kind: HintKind,
        priority: u8,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            kind,
            title: title.into(),
            message: message.into(),
            priority,
        }
    }

    /// Nudge shown when the user goes quiet after the counterpart spoke.
    #[must_use]
    pub fn momentum() -> Self {
        Self::new(
            MOMENTUM_KEY,
            HintKind::Reminder,
            2,
            "Keep the momentum",
            "The physician is waiting. Acknowledge what they said and respond.",
        )
    }
}

/// Everything the rule pass looks at. Borrowed from the live session.
#[derive(Debug, Clone, Copy)]
pub struct HintContext<'a> {
    pub strategy: &'a ScenarioStrategy,
    pub turns: &'a [Turn],
    pub draft: &'a str,
    /// Time left in the scenario's budget, if it has one.
    pub remaining: Option<Duration>,
    /// Since the last shown hint, or since the session started.
    pub since_last_hint: Duration,
    pub dismissed: &'a HashSet<String>,
    pub config: &'a CoachingConfig,
}

impl HintContext<'_> {
    fn allows(&self, key: &str) -> bool {
        !self.dismissed.contains(key)
    }

    fn user_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|turn| turn.is_user())
    }

    fn user_turn_count(&self) -> usize {
        self.user_turns().count()
    }
}

/// Scan the bands in priority order and return the first undismissed match.
pub fn select_hint<R: Rng + ?Sized>(ctx: &HintContext<'_>, rng: &mut R) -> Option<CoachingHint> {
    opening(ctx)
        .or_else(|| objection(ctx))
        .or_else(|| length_warning(ctx))
        .or_else(|| data_reminder(ctx))
        .or_else(|| engagement(ctx))
        .or_else(|| closing(ctx))
        .or_else(|| fallback_reminder(ctx, rng))
}

fn opening(ctx: &HintContext<'_>) -> Option<CoachingHint> {
    let fresh = ctx.user_turn_count() == 0 && ctx.draft.trim().is_empty();
    (fresh && ctx.allows(OPENING_KEY)).then(|| {
        CoachingHint::new(
            OPENING_KEY,
            HintKind::Tip,
            1,
            "Open strong",
            ctx.strategy.opening_tip.clone(),
        )
    })
}

fn objection(ctx: &HintContext<'_>) -> Option<CoachingHint> {
    let last = ctx.turns.last().filter(|turn| !turn.is_user())?;
    let text = last.text.to_lowercase();
    ctx.strategy
        .objection_tips
        .iter()
        .filter(|(keyword, _)| text.contains(&keyword.to_lowercase()))
        .map(|(keyword, tip)| (format!("objection:{keyword}"), tip))
        .find(|(key, _)| ctx.allows(key))
        .map(|(key, tip)| {
            CoachingHint::new(key, HintKind::Tip, 1, "Handle the objection", tip.clone())
        })
}

#[allow(clippy::cast_precision_loss)]
fn length_warning(ctx: &HintContext<'_>) -> Option<CoachingHint> {
    let (_, ideal_max) = ctx.strategy.ideal_response_len;
    let limit = ideal_max as f64 * ctx.config.length_factor;
    let too_long = ctx.draft.chars().count() as f64 > limit;
    (too_long && ctx.allows(LENGTH_WARNING_KEY)).then(|| {
        CoachingHint::new(
            LENGTH_WARNING_KEY,
            HintKind::Warning,
            2,
            "Tighten your reply",
            "Long answers lose busy physicians. Lead with one point and stop.",
        )
    })
}

fn data_reminder(ctx: &HintContext<'_>) -> Option<CoachingHint> {
    let no_data = ctx.user_turn_count() >= 2
        && !ctx.user_turns().any(|turn| mentions_clinical_data(&turn.text));
    (no_data && ctx.allows(DATA_REMINDER_KEY)).then(|| {
        CoachingHint::new(
            DATA_REMINDER_KEY,
            HintKind::Reminder,
            3,
            "Bring the evidence",
            "Back your claims with trial results or outcome numbers.",
        )
    })
}

fn engagement(ctx: &HintContext<'_>) -> Option<CoachingHint> {
    let count = ctx.user_turn_count();
    let no_questions =
        (2..=4).contains(&count) && !ctx.user_turns().any(|turn| asks_question(&turn.text));
    (no_questions && ctx.allows(ENGAGEMENT_KEY)).then(|| {
        CoachingHint::new(
            ENGAGEMENT_KEY,
            HintKind::Suggestion,
            4,
            "Ask, don't tell",
            "Try an open question to learn what this physician cares about.",
        )
    })
}

fn closing(ctx: &HintContext<'_>) -> Option<CoachingHint> {
    let in_window = ctx
        .remaining
        .is_some_and(|remaining| ctx.config.in_closing_window(remaining));
    (in_window && ctx.user_turn_count() >= 2 && ctx.allows(CLOSING_KEY)).then(|| {
        CoachingHint::new(
            CLOSING_KEY,
            HintKind::Tip,
            2,
            "Time to close",
            ctx.strategy.closing_tip.clone(),
        )
    })
}

fn fallback_reminder<R: Rng + ?Sized>(ctx: &HintContext<'_>, rng: &mut R) -> Option<CoachingHint> {
    if ctx.since_last_hint < ctx.config.fallback_window {
        return None;
    }
    let candidates: Vec<(String, &String)> = ctx
        .strategy
        .reminders
        .iter()
        .enumerate()
        .map(|(idx, text)| (format!("reminder:{idx}"), text))
        .filter(|(key, _)| ctx.allows(key))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    let (key, text) = &candidates[rng.random_range(0..candidates.len())];
    Some(CoachingHint::new(
        key.clone(),
        HintKind::Reminder,
        5,
        "Reminder",
        (*text).clone(),
    ))
}

fn mentions_clinical_data(text: &str) -> bool {
    let lower = text.to_lowercase();
    CLINICAL_INDICATORS.iter().any(|term| lower.contains(term))
}

fn asks_question(text: &str) -> bool {
    if text.contains('?') {
        return true;
    }
    text.split_whitespace()
        .next()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .is_some_and(|word| INTERROGATIVE_OPENERS.contains(&word.as_str()))
}
