//! In-process job scheduling.
//!
//! This crate provides a Ractor-based job scheduler and a bounded-concurrency
//! batch runner built on the primitives in `queue_core`.
//!
//! # Architecture
//!
//! - `JobQueue` - Cloneable handle used to add jobs, start and dispose
//! - `SchedulerActor` - Owns the pending queue and in-flight set of one scheduler
//! - `batch` - `map_promises` / `promise_concurrency` over a fixed worker count
//!
//! # Usage
//!
//! ```ignore
//! use scheduler::{JobQueue, SchedulerConfig};
//!
//! let queue = JobQueue::spawn(SchedulerConfig::new("mail").with_concurrency(2)).await?;
//! queue.on_completed(|job, sent: &bool| tracing::info!("{} sent: {}", job.id, sent))?;
//! queue.add("hello@example.com".to_string()).await?;
//!
//! let running = queue
//!     .start(|job: Job<String>, _signal| async move { send(&job.data).await })
//!     .await?;
//! ```

pub mod batch;
mod config;
mod dispatch;
mod error;
mod handle;
mod messages;
mod processor;
pub mod registry;
mod scheduler_actor;

pub use batch::{DEFAULT_CONCURRENCY, Settled, map_promises, promise_concurrency};
pub use config::SchedulerConfig;
pub use error::{SchedulerError, SchedulerResult};
pub use handle::{JobQueue, Running};
pub use messages::SchedulerMessage;
pub use processor::{BoxError, JobProcessor, ProcessorFuture, ProcessorRegistry, ProcessorResult};
pub use registry::{QueueRegistry, global_registry};
pub use scheduler_actor::{SchedulerActor, SchedulerState};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort};
