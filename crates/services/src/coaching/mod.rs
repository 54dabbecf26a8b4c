//! In-session coaching: rule pass, timers, and the live session state machine.

mod config;
mod rules;
mod session;
mod timers;

pub use config::CoachingConfig;
pub use rules::{
    CLOSING_KEY, CoachingHint, DATA_REMINDER_KEY, ENGAGEMENT_KEY, HintContext, HintKind,
    LENGTH_WARNING_KEY, MOMENTUM_KEY, OPENING_KEY, select_hint,
};
pub use session::{CoachingSession, ShownHint};
pub use timers::{TimerId, TimerKind, TimerWheel};
