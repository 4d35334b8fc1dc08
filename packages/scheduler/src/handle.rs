//! Public handle to a running scheduler.

use std::sync::Arc;

use queue_core::{
    Deferred, EventEmitter, Job, JobError, JobEvent, JobId, JobOptions, SchedulerStats,
    SubscribeOptions, Subscription, events,
};
use ractor::rpc::CallResult;
use ractor::{Actor, ActorRef, RpcReplyPort};

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::messages::SchedulerMessage;
use crate::processor::JobProcessor;
use crate::scheduler_actor::{SchedulerActor, SchedulerState};

struct Inner<T, R> {
    actor: ActorRef<SchedulerMessage<T, R>>,
    events: EventEmitter<JobEvent<T, R>>,
    config: SchedulerConfig,
}

impl<T, R> Drop for Inner<T, R> {
    fn drop(&mut self) {
        self.actor.stop(None);
    }
}

/// Handle to a job scheduler.
///
/// Jobs are added at any time and dispatched once a processor is registered
/// with [`start`](Self::start), at most `concurrency` at a time, in the
/// configured order. Outcomes are reported only through the `completed` and
/// `failed` events.
///
/// Timeouts are advisory. A timed-out job is reported as failed and its
/// [`AbortSignal`](queue_core::AbortSignal) fires, but the processor's future
/// is left running until it observes the signal or finishes.
///
/// Clones share the same scheduler. The scheduler actor stops when the last
/// clone is dropped.
pub struct JobQueue<T, R> {
    inner: Arc<Inner<T, R>>,
}

impl<T, R> Clone for JobQueue<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A processing cycle started by [`JobQueue::start`].
#[derive(Debug, Clone)]
pub struct Running {
    stopped: Deferred<()>,
}

impl Running {
    /// Wait until the scheduler is disposed.
    pub async fn stopped(&self) {
        let _ = self.stopped.wait().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_settled()
    }
}

impl<T, R> JobQueue<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// Spawn a scheduler actor and return a handle to it.
    pub async fn spawn(config: SchedulerConfig) -> SchedulerResult<Self> {
        let events = EventEmitter::new();
        let state = SchedulerState::new(config.clone(), events.clone());
        let (actor, _handle) = Actor::spawn(None, SchedulerActor::<T, R>::new(), state)
            .await
            .map_err(|e| SchedulerError::Spawn(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                actor,
                events,
                config,
            }),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Add a job with the default options. Returns its queue position.
    pub async fn add(&self, data: T) -> SchedulerResult<usize> {
        self.add_job(Job::new(data)).await
    }

    /// Add a job with a message type and options.
    pub async fn add_with(
        &self,
        data: T,
        message_type: Option<String>,
        options: JobOptions,
    ) -> SchedulerResult<usize> {
        let mut job = Job::new(data).with_options(options);
        job.message_type = message_type;
        self.add_job(job).await
    }

    /// Add a prepared job. Unset options fall back to the configured defaults.
    pub async fn add_job(&self, job: Job<T>) -> SchedulerResult<usize> {
        let options = job.options.or(self.inner.config.default_options);
        let job = Box::new(job.with_options(options));
        self.call(|reply| SchedulerMessage::Add { job, reply }).await
    }

    /// Register the processor and begin dispatching.
    ///
    /// Fails with [`SchedulerError::AlreadyStarted`] while a processor is
    /// registered; the existing processor is kept.
    pub async fn start(&self, processor: impl JobProcessor<T, R>) -> SchedulerResult<Running> {
        let processor: Arc<dyn JobProcessor<T, R>> = Arc::new(processor);
        let stopped = self
            .call(|reply| SchedulerMessage::Start { processor, reply })
            .await??;
        Ok(Running { stopped })
    }

    /// Start processing and wait until the scheduler is disposed.
    pub async fn run(&self, processor: impl JobProcessor<T, R>) -> SchedulerResult<()> {
        let running = self.start(processor).await?;
        running.stopped().await;
        Ok(())
    }

    /// Drop all pending and in-flight work, unregister the processor and
    /// remove every listener. Safe to call while idle.
    pub async fn dispose(&self) -> SchedulerResult<()> {
        self.call(|reply| SchedulerMessage::Dispose { reply })
            .await
    }

    /// Remove a job that has not been dispatched yet.
    pub async fn cancel(&self, job_id: JobId) -> SchedulerResult<Option<Job<T>>> {
        self.call(|reply| SchedulerMessage::Cancel { job_id, reply })
            .await
    }

    /// Jobs waiting to be dispatched, next first.
    pub async fn pending(&self) -> SchedulerResult<Vec<Job<T>>> {
        self.call(|reply| SchedulerMessage::ListPending { reply })
            .await
    }

    pub async fn stats(&self) -> SchedulerResult<SchedulerStats> {
        self.call(|reply| SchedulerMessage::GetStats { reply })
            .await
    }

    /// Dispose and stop the scheduler actor. Later calls fail with
    /// [`SchedulerError::Stopped`].
    pub fn shutdown(&self) -> SchedulerResult<()> {
        self.inner
            .actor
            .send_message(SchedulerMessage::Shutdown)
            .map_err(|_| SchedulerError::Stopped)
    }

    /// The emitter scheduler events are delivered on.
    pub fn events(&self) -> &EventEmitter<JobEvent<T, R>> {
        &self.inner.events
    }

    /// Listen for a scheduler event by name.
    pub fn add_event_listener(
        &self,
        event: &str,
        listener: impl Fn(&JobEvent<T, R>) + Send + Sync + 'static,
        options: SubscribeOptions,
    ) -> SchedulerResult<Subscription> {
        Ok(self.inner.events.subscribe(event, listener, options)?)
    }

    /// Listen for completed jobs.
    pub fn on_completed(
        &self,
        listener: impl Fn(&Job<T>, &R) + Send + Sync + 'static,
    ) -> SchedulerResult<Subscription> {
        self.add_event_listener(
            events::COMPLETED,
            move |event| {
                if let JobEvent::Completed { job, result, .. } = event {
                    listener(job, result);
                }
            },
            SubscribeOptions::default(),
        )
    }

    /// Listen for failed jobs, timeouts included.
    pub fn on_failed(
        &self,
        listener: impl Fn(&Job<T>, &JobError) + Send + Sync + 'static,
    ) -> SchedulerResult<Subscription> {
        self.add_event_listener(
            events::FAILED,
            move |event| {
                if let JobEvent::Failed { job, error, .. } = event {
                    listener(job, error);
                }
            },
            SubscribeOptions::default(),
        )
    }

    async fn call<V: Send + 'static>(
        &self,
        build: impl FnOnce(RpcReplyPort<V>) -> SchedulerMessage<T, R>,
    ) -> SchedulerResult<V> {
        let timeout = self.inner.config.reply_timeout();
        match ractor::rpc::call(&self.inner.actor, build, Some(timeout)).await {
            Ok(CallResult::Success(value)) => Ok(value),
            Ok(CallResult::Timeout) => Err(SchedulerError::Timeout(timeout)),
            Ok(CallResult::SenderError) | Err(_) => Err(SchedulerError::Stopped),
        }
    }
}

impl<T, R> std::fmt::Debug for JobQueue<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("name", &self.inner.config.name)
            .field("actor", &self.inner.actor.get_id())
            .finish()
    }
}
