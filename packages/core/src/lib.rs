//! Core scheduling primitives for the job queue system.
//!
//! This crate contains the leaf types used by the scheduler:
//! - Job, JobId and JobOptions for work items
//! - OrderedQueue for pending work
//! - Deferred for externally settled awaitables
//! - EventEmitter for lifecycle events
//! - AbortController/AbortSignal for advisory cancellation

mod deferred;
pub mod emitter;
mod error;
pub mod events;
mod job;
mod queue;
mod signal;
mod stats;

pub use deferred::Deferred;
pub use emitter::{
    ErrorHandler, EventEmitter, Listener, ListenerError, SubscribeOptions, Subscription,
    SubscriptionId, SubscriptionInfo,
};
pub use error::{CanceledError, DeferredError, EmitterError, JobError};
pub use events::JobEvent;
pub use job::{Job, JobId, JobOptions};
pub use queue::{OrderedQueue, QueueOrder};
pub use signal::{AbortController, AbortSignal};
pub use stats::SchedulerStats;
