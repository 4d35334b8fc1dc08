//! Scheduler configuration.

use std::time::Duration;

use queue_core::{JobOptions, QueueOrder};
use serde::{Deserialize, Serialize};

/// Configuration for a job scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Human-readable name, used in logs and events.
    pub name: String,
    /// Maximum number of jobs handed to the processor at once.
    pub concurrency: usize,
    /// Dispatch order of pending jobs.
    pub order: QueueOrder,
    /// Options applied to jobs that leave a field unset.
    pub default_options: JobOptions,
    /// How long a handle waits for the scheduler to answer a request (milliseconds).
    pub reply_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            concurrency: 1,
            order: QueueOrder::Fifo,
            default_options: JobOptions::default(),
            reply_timeout_ms: 5_000,
        }
    }
}

impl SchedulerConfig {
    /// Create a config with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the dispatch order.
    pub fn with_order(mut self, order: QueueOrder) -> Self {
        self.order = order;
        self
    }

    /// Set the default job options.
    pub fn with_default_options(mut self, options: JobOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Set the reply timeout.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Concurrency actually used; zero is treated as one.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{ "name": "mail", "order": "lifo" }"#).unwrap();
        assert_eq!(config.name, "mail");
        assert_eq!(config.order, QueueOrder::Lifo);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.reply_timeout(), Duration::from_secs(5));
        assert_eq!(config.default_options, JobOptions::default());
    }

    #[test]
    fn test_builders() {
        let config = SchedulerConfig::new("reports")
            .with_concurrency(0)
            .with_order(QueueOrder::Lifo)
            .with_default_options(JobOptions::default().with_timeout(Duration::from_secs(2)))
            .with_reply_timeout(Duration::from_millis(750));
        assert_eq!(config.effective_concurrency(), 1);
        assert_eq!(config.with_concurrency(4).effective_concurrency(), 4);
    }
}
