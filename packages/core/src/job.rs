//! Job domain types for work items in the queue.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-job scheduling options.
///
/// A zero or missing value means the option is not set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Fail the job if the processor has not settled after this many milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Wait this many milliseconds before handing the job to the processor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl JobOptions {
    /// Set the timeout for this job.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the dispatch delay for this job.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = Some(delay.as_millis() as u64);
        self
    }

    /// Effective timeout, if one is set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Effective delay, if one is set.
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    /// Fill unset fields from `defaults`.
    pub fn or(self, defaults: JobOptions) -> Self {
        Self {
            timeout_ms: self.timeout_ms.or(defaults.timeout_ms),
            delay_ms: self.delay_ms.or(defaults.delay_ms),
        }
    }
}

/// A job represents a unit of work handed to the scheduler's processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job<T> {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Job payload.
    pub data: T,
    /// When the job was added to the queue.
    pub queued_at: DateTime<Utc>,
    /// Optional message type, used for routing to processors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Timeout and delay for this job.
    #[serde(default)]
    pub options: JobOptions,
}

impl<T> Job<T> {
    /// Create a new job queued now.
    pub fn new(data: T) -> Self {
        Self {
            id: JobId::new(),
            data,
            queued_at: Utc::now(),
            message_type: None,
            options: JobOptions::default(),
        }
    }

    /// Set the message type for this job.
    pub fn with_message_type(mut self, message_type: impl Into<String>) -> Self {
        self.message_type = Some(message_type.into());
        self
    }

    /// Set the options for this job.
    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_options_are_unset() {
        let options = JobOptions {
            timeout_ms: Some(0),
            delay_ms: Some(0),
        };
        assert_eq!(options.timeout(), None);
        assert_eq!(options.delay(), None);

        let options = JobOptions::default()
            .with_timeout(Duration::from_millis(250))
            .with_delay(Duration::from_secs(1));
        assert_eq!(options.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(options.delay(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn test_options_fall_back_per_field() {
        let defaults = JobOptions {
            timeout_ms: Some(5_000),
            delay_ms: Some(10),
        };
        let merged = JobOptions::default()
            .with_delay(Duration::from_millis(50))
            .or(defaults);
        assert_eq!(merged.timeout_ms, Some(5_000));
        assert_eq!(merged.delay_ms, Some(50));

        // An explicit zero disables the default rather than falling back.
        let merged = JobOptions {
            timeout_ms: Some(0),
            delay_ms: None,
        }
        .or(defaults);
        assert_eq!(merged.timeout(), None);
        assert_eq!(merged.delay(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_job_ids_are_unique_and_parse() {
        let a = Job::new("a");
        let b = Job::new("b").with_message_type("email");
        assert_ne!(a.id, b.id);
        assert_eq!(b.message_type.as_deref(), Some("email"));
        assert_eq!(JobId::parse(&a.id.to_string()).ok(), Some(a.id));
        assert!(JobId::parse("not-a-ulid").is_err());
    }
}
