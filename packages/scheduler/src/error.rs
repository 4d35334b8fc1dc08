//! Error type for scheduler operations.

use std::time::Duration;

use queue_core::EmitterError;
use thiserror::Error;

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors returned by a [`JobQueue`](crate::JobQueue) handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("scheduler already started")]
    AlreadyStarted,

    #[error("scheduler is stopped")]
    Stopped,

    #[error("scheduler did not reply within {0:?}")]
    Timeout(Duration),

    #[error("failed to spawn scheduler: {0}")]
    Spawn(String),

    #[error(transparent)]
    Emitter(#[from] EmitterError),
}
