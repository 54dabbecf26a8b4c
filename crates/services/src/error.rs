//! Shared error types for the services crate.

use thiserror::Error;

use coach_core::model::{SessionId, SessionRecordError};
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
///
/// Store outages never surface here; the service degrades to in-memory
/// operation instead. Only caller mistakes are reported.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("session {0} is already recorded")]
    DuplicateSession(SessionId),
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error(transparent)]
    Record(#[from] SessionRecordError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
