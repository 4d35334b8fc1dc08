//! Error types shared by the scheduling primitives.

use std::any::Any;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::JobId;

/// Why a job settled as failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobError {
    /// The processor did not settle before the job's timeout elapsed.
    #[error("job {job_id} timed out after {timeout_ms}ms")]
    Timeout { job_id: JobId, timeout_ms: u64 },

    /// The processor returned an error.
    #[error("{message}")]
    Failed { message: String },

    /// The processor panicked.
    #[error("processor panicked: {message}")]
    Panicked { message: String },
}

impl JobError {
    /// Create a failure from any displayable reason.
    pub fn failed(message: impl Into<String>) -> Self {
        JobError::Failed {
            message: message.into(),
        }
    }

    /// Normalize an arbitrary processor error.
    ///
    /// A boxed `JobError` is unwrapped as-is; anything else becomes `Failed`.
    pub fn from_boxed(error: Box<dyn std::error::Error + Send + Sync>) -> Self {
        match error.downcast::<JobError>() {
            Ok(job_error) => *job_error,
            Err(other) => JobError::failed(other.to_string()),
        }
    }

    /// Normalize a panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        JobError::Panicked {
            message: panic_message(payload.as_ref()),
        }
    }

    /// Check if this failure is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, JobError::Timeout { .. })
    }
}

impl From<String> for JobError {
    fn from(message: String) -> Self {
        JobError::Failed { message }
    }
}

impl From<&str> for JobError {
    fn from(message: &str) -> Self {
        JobError::failed(message)
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Returned when a deferred is canceled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("operation canceled: {}", .reason.as_deref().unwrap_or("no reason"))]
pub struct CanceledError {
    pub reason: Option<String>,
}

impl CanceledError {
    pub fn new(reason: Option<String>) -> Self {
        Self { reason }
    }
}

/// Terminal rejection of a [`Deferred`](crate::Deferred).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeferredError<E> {
    #[error("rejected: {0}")]
    Rejected(E),

    #[error(transparent)]
    Canceled(#[from] CanceledError),
}

impl<E> DeferredError<E> {
    /// Check if the deferred was canceled rather than rejected.
    pub fn is_canceled(&self) -> bool {
        matches!(self, DeferredError::Canceled(_))
    }
}

/// Errors returned by the event emitter registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EmitterError {
    #[error("event emitter has been disposed")]
    Disposed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk full")]
    struct DiskFull;

    #[test]
    fn test_boxed_errors_are_normalized() {
        let err = JobError::from_boxed(Box::new(DiskFull));
        assert_eq!(err, JobError::failed("disk full"));

        let err = JobError::from_boxed("plain string reason".into());
        assert_eq!(err.to_string(), "plain string reason");

        let timeout = JobError::Timeout {
            job_id: JobId::new(),
            timeout_ms: 10,
        };
        let err = JobError::from_boxed(Box::new(timeout.clone()));
        assert_eq!(err, timeout);
        assert!(err.is_timeout());
    }

    #[test]
    fn test_panic_payloads() {
        let err = JobError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "processor panicked: boom");

        let err = JobError::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(
            err,
            JobError::Panicked {
                message: "owned boom".into()
            }
        );

        let err = JobError::from_panic(Box::new(42_u8));
        assert!(matches!(err, JobError::Panicked { .. }));
    }

    #[test]
    fn test_canceled_display() {
        assert_eq!(
            CanceledError::default().to_string(),
            "operation canceled: no reason"
        );
        let err: DeferredError<String> = CanceledError::new(Some("shutdown".into())).into();
        assert!(err.is_canceled());
        assert_eq!(err.to_string(), "operation canceled: shutdown");
    }
}
