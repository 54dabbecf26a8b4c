#![forbid(unsafe_code)]

pub mod app_services;
pub mod coaching;
pub mod error;
pub mod progress;

pub use coach_core::Clock;

pub use app_services::AppServices;
pub use coaching::{CoachingConfig, CoachingHint, CoachingSession, HintKind, ShownHint};
pub use error::{AppServicesError, ProgressError};
pub use progress::{ProgressService, ScenarioProgressItem};
