use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use coach_core::catalog::{Catalog, ScenarioStrategy, StrategyCatalog};
use coach_core::model::{ScenarioId, Turn};

use super::config::CoachingConfig;
use super::rules::{CLOSING_KEY, CoachingHint, HintContext, MOMENTUM_KEY, select_hint};
use super::timers::{TimerKind, TimerWheel};

//
// ─── HISTORY ───────────────────────────────────────────────────────────────────
//

/// A hint as it was shown, kept for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownHint {
    pub hint: CoachingHint,
    pub shown_at: DateTime<Utc>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Live coaching state for one role-play conversation.
///
/// Host-driven: every event takes the current time and re-evaluates which
/// hint, if any, should be visible. Timers are never fired in the background;
/// the host calls [`CoachingSession::tick`] at or after
/// [`CoachingSession::next_wakeup`].
pub struct CoachingSession {
    scenario_id: ScenarioId,
    strategy: ScenarioStrategy,
    config: CoachingConfig,
    time_budget: Option<Duration>,
    rng: StdRng,

    started_at: DateTime<Utc>,
    turns: Vec<Turn>,
    draft: String,
    busy: bool,
    enabled: bool,
    ended: bool,

    current: Option<CoachingHint>,
    history: Vec<ShownHint>,
    dismissed: HashSet<String>,
    last_shown_at: Option<DateTime<Utc>>,

    idle_since: Option<DateTime<Utc>>,
    momentum_due: bool,
    /// Momentum already shown for the current idle period.
    momentum_spent: bool,
    timers: TimerWheel,
}

impl CoachingSession {
    /// Start coaching `scenario_id` with strategy and budget from the catalogs.
    #[must_use]
    pub fn start(
        scenario_id: ScenarioId,
        catalog: &Catalog,
        strategies: &StrategyCatalog,
        config: CoachingConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let strategy = strategies.strategy(&scenario_id).clone();
        let budget = Duration::seconds(i64::from(catalog.time_budget_secs(&scenario_id)));
        Self::with_rng(
            scenario_id,
            strategy,
            Some(budget),
            config,
            StdRng::from_os_rng(),
            now,
        )
    }

    /// Fully explicit constructor; tests inject a seeded `rng`.
    #[must_use]
    pub fn with_rng(
        scenario_id: ScenarioId,
        strategy: ScenarioStrategy,
        time_budget: Option<Duration>,
        config: CoachingConfig,
        rng: StdRng,
        now: DateTime<Utc>,
    ) -> Self {
        let mut session = Self {
            scenario_id,
            strategy,
            config,
            time_budget,
            rng,
            started_at: now,
            turns: Vec::new(),
            draft: String::new(),
            busy: false,
            enabled: true,
            ended: false,
            current: None,
            history: Vec::new(),
            dismissed: HashSet::new(),
            last_shown_at: None,
            idle_since: None,
            momentum_due: false,
            momentum_spent: false,
            timers: TimerWheel::new(),
        };
        session.evaluate(now);
        session
    }

    #[must_use]
    pub fn scenario_id(&self) -> &ScenarioId {
        &self.scenario_id
    }

    #[must_use]
    pub fn current_hint(&self) -> Option<&CoachingHint> {
        self.current.as_ref()
    }

    /// Every hint shown so far, oldest first. Survives `end`, not `reset`.
    #[must_use]
    pub fn history(&self) -> &[ShownHint] {
        &self.history
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    #[must_use]
    pub fn is_dismissed(&self, key: &str) -> bool {
        self.dismissed.contains(key)
    }

    /// Earliest time the host should call [`CoachingSession::tick`].
    #[must_use]
    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.timers.next_due()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// When the pending timer of `kind` comes due, if one is armed.
    #[must_use]
    pub fn timer_due(&self, kind: TimerKind) -> Option<DateTime<Utc>> {
        self.timers.due_at(kind)
    }

    pub fn push_turn(&mut self, turn: Turn, now: DateTime<Utc>) {
        if self.ended {
            return;
        }
        if turn.is_user() {
            self.draft.clear();
        }
        self.turns.push(turn);
        // A new turn always restarts the idle clock.
        self.end_idle_period();
        self.evaluate(now);
    }

    pub fn set_draft(&mut self, draft: impl Into<String>, now: DateTime<Utc>) {
        if self.ended {
            return;
        }
        self.draft = draft.into();
        self.evaluate(now);
    }

    pub fn set_busy(&mut self, busy: bool, now: DateTime<Utc>) {
        if self.ended {
            return;
        }
        self.busy = busy;
        self.evaluate(now);
    }

    /// Turning coaching off hides the current hint and cancels all timers.
    pub fn set_enabled(&mut self, enabled: bool, now: DateTime<Utc>) {
        if self.ended {
            return;
        }
        self.enabled = enabled;
        self.evaluate(now);
    }

    /// Fire whatever came due and re-evaluate.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if self.ended {
            return;
        }
        for kind in self.timers.drain_due(now) {
            if kind == TimerKind::IdleMomentum {
                self.momentum_due = true;
            }
        }
        self.evaluate(now);
    }

    /// Hide the current hint and suppress its key for the rest of the session.
    pub fn dismiss_hint(&mut self, now: DateTime<Utc>) -> Option<CoachingHint> {
        if self.ended {
            return None;
        }
        let hint = self.current.take()?;
        debug!(scenario = %self.scenario_id, key = %hint.key, "hint dismissed");
        self.dismissed.insert(hint.key.clone());
        if hint.key == MOMENTUM_KEY {
            self.momentum_due = false;
        }
        self.evaluate(now);
        Some(hint)
    }

    /// Start over as a brand-new conversation.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.timers.cancel_all();
        self.current = None;
        self.turns.clear();
        self.draft.clear();
        self.busy = false;
        self.enabled = true;
        self.ended = false;
        self.history.clear();
        self.dismissed.clear();
        self.last_shown_at = None;
        self.end_idle_period();
        self.started_at = now;
        self.evaluate(now);
    }

    /// Tear down: no timer survives and later events are ignored.
    pub fn end(&mut self) {
        let cancelled = self.timers.cancel_all();
        self.current = None;
        self.end_idle_period();
        self.ended = true;
        debug!(scenario = %self.scenario_id, cancelled, "coaching ended");
    }

    fn end_idle_period(&mut self) {
        self.idle_since = None;
        self.momentum_due = false;
        self.momentum_spent = false;
    }

    fn is_idle(&self) -> bool {
        self.turns.last().is_some_and(|turn| !turn.is_user())
            && self.draft.is_empty()
            && !self.busy
    }

    fn evaluate(&mut self, now: DateTime<Utc>) {
        self.timers.cancel_all();

        if !self.enabled {
            self.current = None;
            self.end_idle_period();
            return;
        }

        if self.is_idle() {
            self.idle_since.get_or_insert(now);
        } else {
            self.end_idle_period();
        }

        let candidate = self.candidate(now);
        let cooldown_until = self.last_shown_at.map(|at| at + self.config.cooldown);

        if let Some(hint) = candidate {
            let unchanged = self.current.as_ref().is_some_and(|c| c.key == hint.key);
            match cooldown_until {
                _ if unchanged => {}
                Some(until) if now < until => {
                    self.timers.schedule(TimerKind::CooldownExpiry, until);
                }
                _ => self.show(hint, now),
            }
        }

        if let Some(since) = self.idle_since {
            if !self.momentum_due
                && !self.momentum_spent
                && !self.dismissed.contains(MOMENTUM_KEY)
            {
                self.timers
                    .schedule(TimerKind::IdleMomentum, since + self.config.idle_delay);
            }
        }

        if let Some(opens_at) = self.closing_opens_at() {
            if opens_at > now
                && self.user_turn_count() >= 2
                && !self.dismissed.contains(CLOSING_KEY)
            {
                self.timers.schedule(TimerKind::ClosingWindow, opens_at);
            }
        }

        if !self.strategy.reminders.is_empty() {
            let quiet_from = self.last_shown_at.unwrap_or(self.started_at);
            let due = quiet_from + self.config.fallback_window;
            if due > now {
                self.timers.schedule(TimerKind::FallbackWindow, due);
            }
        }
    }

    /// Instant the remaining time first falls inside the closing window.
    fn closing_opens_at(&self) -> Option<DateTime<Utc>> {
        let (_, window_end) = self.config.closing_window;
        self.time_budget
            .map(|budget| self.started_at + budget - window_end)
    }

    fn user_turn_count(&self) -> usize {
        self.turns.iter().filter(|turn| turn.is_user()).count()
    }

    fn candidate(&mut self, now: DateTime<Utc>) -> Option<CoachingHint> {
        let since_last_hint = now - self.last_shown_at.unwrap_or(self.started_at);
        let remaining = self
            .time_budget
            .map(|budget| budget - (now - self.started_at));
        let ctx = HintContext {
            strategy: &self.strategy,
            turns: &self.turns,
            draft: &self.draft,
            remaining,
            since_last_hint,
            dismissed: &self.dismissed,
            config: &self.config,
        };
        let selected = select_hint(&ctx, &mut self.rng);

        let momentum = self.momentum_due && !self.dismissed.contains(MOMENTUM_KEY);
        match selected {
            Some(hint) if !momentum || hint.priority <= 2 => Some(hint),
            _ if momentum => Some(CoachingHint::momentum()),
            other => other,
        }
    }

    fn show(&mut self, hint: CoachingHint, now: DateTime<Utc>) {
        debug!(
            scenario = %self.scenario_id,
            key = %hint.key,
            priority = hint.priority,
            "hint shown"
        );
        if hint.key == MOMENTUM_KEY {
            self.momentum_due = false;
            self.momentum_spent = true;
        }
        self.history.push(ShownHint {
            hint: hint.clone(),
            shown_at: now,
        });
        self.current = Some(hint);
        self.last_shown_at = Some(now);
    }
}

// ─── TESTS ─────────────────────────────────────────────────────────────────────
