//! Execution of a single dispatched job.
//!
//! Jobs without a delay are handed to the processor on the scheduler actor,
//! in the order they were popped; only the returned future runs on its own
//! task. Delayed jobs are handed over when their delay elapses.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use queue_core::{AbortController, AbortSignal, Job, JobError, JobId};
use ractor::ActorRef;
use tokio::task::JoinError;

use crate::messages::SchedulerMessage;
use crate::processor::{JobProcessor, ProcessorFuture, ProcessorResult};

/// A job popped from the queue, ready to run.
pub(crate) struct Dispatch<T, R> {
    pub cycle: u64,
    pub job: Job<T>,
    pub processor: Arc<dyn JobProcessor<T, R>>,
    /// Aborted when the scheduler is disposed.
    pub cycle_signal: AbortSignal,
    pub scheduler: ActorRef<SchedulerMessage<T, R>>,
}

impl<T, R> Dispatch<T, R>
where
    T: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// Hand the job to the processor and report the outcome to the scheduler.
    pub fn spawn(self) {
        let Dispatch {
            cycle,
            job,
            processor,
            cycle_signal,
            scheduler,
        } = self;
        let job_id = job.id;

        let Some(delay) = job.options.delay() else {
            let invocation = Invocation::begin(processor.as_ref(), job);
            tokio::spawn(async move {
                let outcome = invocation.settle().await;
                report(&scheduler, cycle, job_id, outcome);
            });
            return;
        };

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cycle_signal.aborted() => {}
            }
            if cycle_signal.is_aborted() {
                tracing::debug!(%job_id, "Dropping delayed job of a disposed cycle");
                return;
            }
            let outcome = Invocation::begin(processor.as_ref(), job).settle().await;
            report(&scheduler, cycle, job_id, outcome);
        });
    }
}

fn report<T, R>(
    scheduler: &ActorRef<SchedulerMessage<T, R>>,
    cycle: u64,
    job_id: JobId,
    outcome: Result<R, JobError>,
) where
    T: Send + 'static,
    R: Send + 'static,
{
    let settled = SchedulerMessage::Settled {
        cycle,
        job_id,
        outcome,
    };
    if scheduler.send_message(settled).is_err() {
        tracing::debug!(%job_id, "Scheduler stopped before job settled");
    }
}

/// A processor call whose future has not been awaited yet.
struct Invocation<R> {
    job_id: JobId,
    timeout: Option<(Duration, AbortController)>,
    call: Result<ProcessorFuture<R>, JobError>,
}

impl<R: Send + 'static> Invocation<R> {
    /// Call the processor. A panic during the call fails the job.
    fn begin<T: 'static>(processor: &dyn JobProcessor<T, R>, job: Job<T>) -> Self {
        let job_id = job.id;
        let timeout = job
            .options
            .timeout()
            .map(|timeout| (timeout, AbortController::new()));
        let signal = match &timeout {
            Some((_, controller)) => controller.signal(),
            None => AbortSignal::never(),
        };
        let call = panic::catch_unwind(AssertUnwindSafe(|| processor.process(job, signal)))
            .map_err(JobError::from_panic);

        Self {
            job_id,
            timeout,
            call,
        }
    }

    /// Run the processor's future on its own task, raced against the timeout.
    async fn settle(self) -> Result<R, JobError> {
        let Invocation {
            job_id,
            timeout,
            call,
        } = self;
        let task = tokio::spawn(call?);

        let Some((timeout, controller)) = timeout else {
            return settle(task.await);
        };
        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => settle(joined),
            Err(_) => {
                // The processor task is detached and keeps running until it
                // observes the signal or finishes on its own.
                controller.abort();
                Err(JobError::Timeout {
                    job_id,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

fn settle<R>(joined: Result<ProcessorResult<R>, JoinError>) -> Result<R, JobError> {
    match joined {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(error)) => Err(JobError::from_boxed(error)),
        Err(error) if error.is_panic() => Err(JobError::from_panic(error.into_panic())),
        Err(error) => Err(JobError::failed(error.to_string())),
    }
}
