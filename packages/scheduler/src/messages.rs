//! Message types for the scheduler actor.

use std::sync::Arc;

use queue_core::{Deferred, Job, JobError, JobId, SchedulerStats};
use ractor::RpcReplyPort;

use crate::error::SchedulerError;
use crate::processor::JobProcessor;

/// Messages for the SchedulerActor.
pub enum SchedulerMessage<T, R> {
    /// Enqueue a new job and reply with its queue position.
    Add {
        job: Box<Job<T>>,
        reply: RpcReplyPort<usize>,
    },

    /// Register the processor and begin draining.
    Start {
        processor: Arc<dyn JobProcessor<T, R>>,
        reply: RpcReplyPort<Result<Deferred<()>, SchedulerError>>,
    },

    /// Clear all state and resolve the pending start handle.
    Dispose { reply: RpcReplyPort<()> },

    /// Move pending jobs into flight, up to the concurrency limit.
    Drain,

    /// A dispatched job settled.
    Settled {
        cycle: u64,
        job_id: JobId,
        outcome: Result<R, JobError>,
    },

    /// Remove a pending job before it is dispatched.
    Cancel {
        job_id: JobId,
        reply: RpcReplyPort<Option<Job<T>>>,
    },

    /// List pending jobs in dispatch order.
    ListPending { reply: RpcReplyPort<Vec<Job<T>>> },

    /// Get scheduler stats.
    GetStats { reply: RpcReplyPort<SchedulerStats> },

    /// Dispose and stop the actor.
    Shutdown,
}

impl<T, R> std::fmt::Debug for SchedulerMessage<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerMessage::Add { job, .. } => write!(f, "Add({})", job.id),
            SchedulerMessage::Start { .. } => write!(f, "Start"),
            SchedulerMessage::Dispose { .. } => write!(f, "Dispose"),
            SchedulerMessage::Drain => write!(f, "Drain"),
            SchedulerMessage::Settled { cycle, job_id, outcome } => write!(
                f,
                "Settled({}, cycle {}, ok: {})",
                job_id,
                cycle,
                outcome.is_ok()
            ),
            SchedulerMessage::Cancel { job_id, .. } => write!(f, "Cancel({})", job_id),
            SchedulerMessage::ListPending { .. } => write!(f, "ListPending"),
            SchedulerMessage::GetStats { .. } => write!(f, "GetStats"),
            SchedulerMessage::Shutdown => write!(f, "Shutdown"),
        }
    }
}
