use chrono::{DateTime, Utc};

/// What a scheduled timer means when it comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Draft stayed empty long enough after a counterpart turn.
    IdleMomentum,
    /// The global cooldown is over; a blocked hint may now be shown.
    CooldownExpiry,
    /// The fallback reminder window has elapsed.
    FallbackWindow,
    /// Remaining time has just entered the closing window.
    ClosingWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    id: TimerId,
    kind: TimerKind,
    due: DateTime<Utc>,
}

/// Explicit, host-polled timers.
///
/// Nothing fires on its own: the owner calls [`TimerWheel::drain_due`] with
/// the current time and reacts to whatever came due. At most one timer per
/// kind is pending; scheduling a kind again replaces the earlier entry.
#[derive(Debug, Default)]
pub struct TimerWheel {
    next_id: u64,
    pending: Vec<Scheduled>,
}

impl TimerWheel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, kind: TimerKind, due: DateTime<Utc>) -> TimerId {
        self.cancel_kind(kind);
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push(Scheduled { id, kind, due });
        id
    }

    /// Returns whether a pending timer was removed.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| t.id != id);
        self.pending.len() != before
    }

    pub fn cancel_kind(&mut self, kind: TimerKind) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| t.kind != kind);
        self.pending.len() != before
    }

    /// Drop every pending timer, returning how many there were.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Remove and return every timer due at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: DateTime<Utc>) -> Vec<TimerKind> {
        let mut due: Vec<Scheduled> = Vec::new();
        self.pending.retain(|t| {
            if t.due <= now {
                due.push(*t);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|t| (t.due, t.id));
        due.into_iter().map(|t| t.kind).collect()
    }

    #[must_use]
    pub fn due_at(&self, kind: TimerKind) -> Option<DateTime<Utc>> {
        self.pending.iter().find(|t| t.kind == kind).map(|t| t.due)
    }

    /// Earliest pending deadline; the host should tick no later than this.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.pending.iter().map(|t| t.due).min()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }
}
