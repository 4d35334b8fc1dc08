//! Event types reported by the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Job, JobError, JobId};

/// Event name for [`JobEvent::Processing`].
pub const PROCESSING: &str = "processing";
/// Event name for [`JobEvent::Completed`].
pub const COMPLETED: &str = "completed";
/// Event name for [`JobEvent::Failed`].
pub const FAILED: &str = "failed";

/// Lifecycle events emitted by a job scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent<T, R> {
    /// The scheduler was started with a processor.
    Processing {
        queue: String,
        concurrency: usize,
        timestamp: DateTime<Utc>,
    },
    /// A job's processor settled successfully.
    Completed {
        job: Job<T>,
        result: R,
        timestamp: DateTime<Utc>,
    },
    /// A job's processor failed, panicked or timed out.
    Failed {
        job: Job<T>,
        error: JobError,
        timestamp: DateTime<Utc>,
    },
}

impl<T, R> JobEvent<T, R> {
    /// The emitter event name this event is delivered under.
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::Processing { .. } => PROCESSING,
            JobEvent::Completed { .. } => COMPLETED,
            JobEvent::Failed { .. } => FAILED,
        }
    }

    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::Processing { timestamp, .. } => *timestamp,
            JobEvent::Completed { timestamp, .. } => *timestamp,
            JobEvent::Failed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job this event concerns, if any.
    pub fn job(&self) -> Option<&Job<T>> {
        match self {
            JobEvent::Completed { job, .. } | JobEvent::Failed { job, .. } => Some(job),
            JobEvent::Processing { .. } => None,
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        self.job().map(|job| job.id)
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::Processing {
                queue, concurrency, ..
            } => format!("Queue '{}' processing ({} at a time)", queue, concurrency),
            JobEvent::Completed { job, timestamp, .. } => {
                let elapsed = (*timestamp - job.queued_at).num_milliseconds();
                format!("Job {} completed {}ms after queueing", job.id, elapsed)
            }
            JobEvent::Failed { job, error, .. } => format!("Job {} failed: {}", job.id, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_accessors() {
        let job = Job::new(7_u32);
        let completed: JobEvent<u32, String> = JobEvent::Completed {
            job: job.clone(),
            result: "ok".into(),
            timestamp: Utc::now(),
        };
        assert_eq!(completed.name(), COMPLETED);
        assert_eq!(completed.job_id(), Some(job.id));

        let failed: JobEvent<u32, String> = JobEvent::Failed {
            job: job.clone(),
            error: JobError::failed("nope"),
            timestamp: Utc::now(),
        };
        assert_eq!(failed.name(), FAILED);
        assert!(failed.description().ends_with("failed: nope"));

        let processing: JobEvent<u32, String> = JobEvent::Processing {
            queue: "mail".into(),
            concurrency: 1,
            timestamp: Utc::now(),
        };
        assert_eq!(processing.name(), PROCESSING);
        assert_eq!(processing.job_id(), None);
    }

    #[test]
    fn test_serialized_shape() {
        let job = Job::new(serde_json::json!({ "to": "a@example.com" })).with_message_type("email");
        let event: JobEvent<serde_json::Value, bool> = JobEvent::Failed {
            job,
            error: JobError::failed("smtp down"),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "failed");
        assert_eq!(value["job"]["message_type"], "email");
        assert_eq!(value["error"]["kind"], "failed");
        assert_eq!(value["error"]["message"], "smtp down");

        let back: JobEvent<serde_json::Value, bool> = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
