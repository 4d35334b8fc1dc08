//! Scheduler statistics.

use serde::{Deserialize, Serialize};

/// Statistics for a scheduler's current state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerStats {
    /// Number of jobs waiting in the queue.
    pub pending: u64,
    /// Number of jobs handed to the processor and not yet settled.
    pub in_flight: u64,
    /// Number of completed jobs (since the scheduler was spawned).
    pub completed: u64,
    /// Number of failed jobs, timeouts included.
    pub failed: u64,
    /// Number of jobs that failed by timing out.
    pub timed_out: u64,
}

impl SchedulerStats {
    /// Total jobs not yet settled (pending + in flight).
    pub fn active(&self) -> u64 {
        self.pending + self.in_flight
    }

    /// Total settled jobs.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.processed();
        if total == 0 {
            None
        } else {
            Some((self.completed as f64 / total as f64) * 100.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_counts() {
        let stats = SchedulerStats {
            pending: 2,
            in_flight: 1,
            completed: 3,
            failed: 1,
            timed_out: 1,
        };
        assert_eq!(stats.active(), 3);
        assert_eq!(stats.processed(), 4);
        assert_eq!(stats.success_rate(), Some(75.0));
        assert_eq!(SchedulerStats::default().success_rate(), None);
    }
}
