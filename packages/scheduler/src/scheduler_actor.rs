//! Scheduler actor owning a single job queue.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use queue_core::{
    AbortController, Deferred, EventEmitter, Job, JobEvent, OrderedQueue, SchedulerStats,
};
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::config::SchedulerConfig;
use crate::dispatch::Dispatch;
use crate::error::SchedulerError;
use crate::messages::SchedulerMessage;
use crate::processor::JobProcessor;

/// State for the scheduler actor.
pub struct SchedulerState<T, R> {
    config: SchedulerConfig,
    /// Jobs waiting for a free slot, in dispatch order.
    queue: OrderedQueue<Job<T>>,
    /// Set while Processing.
    processor: Option<Arc<dyn JobProcessor<T, R>>>,
    /// Jobs handed to the processor and not yet settled.
    in_flight: Vec<Job<T>>,
    /// Resolved when the current processing cycle is disposed.
    stop: Option<Deferred<()>>,
    /// Incremented on every start; settlements from older cycles are dropped.
    cycle: u64,
    cycle_abort: AbortController,
    events: EventEmitter<JobEvent<T, R>>,
    stats: SchedulerStats,
}

impl<T, R> SchedulerState<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// Create a new scheduler state emitting on `events`.
    pub fn new(config: SchedulerConfig, events: EventEmitter<JobEvent<T, R>>) -> Self {
        Self {
            queue: OrderedQueue::new(config.order),
            config,
            processor: None,
            in_flight: Vec::new(),
            stop: None,
            cycle: 0,
            cycle_abort: AbortController::new(),
            events,
            stats: SchedulerStats::default(),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processor.is_some()
    }

    fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            pending: self.queue.len() as u64,
            in_flight: self.in_flight.len() as u64,
            ..self.stats
        }
    }

    fn emit(&self, event: &JobEvent<T, R>) {
        if let Err(e) = self.events.emit(event.name(), event) {
            tracing::debug!(queue = %self.config.name, "Dropping {} event: {}", event.name(), e);
        }
    }

    /// Hand pending jobs to the processor until the concurrency limit is reached.
    fn drain(&mut self, myself: &ActorRef<SchedulerMessage<T, R>>) {
        let Some(processor) = self.processor.clone() else {
            return;
        };
        let capacity = self.config.effective_concurrency();

        while self.in_flight.len() < capacity {
            let Some(job) = self.queue.pop() else {
                break;
            };
            tracing::debug!(
                queue = %self.config.name,
                job_id = %job.id,
                in_flight = self.in_flight.len() + 1,
                "Dispatching job"
            );
            self.in_flight.push(job.clone());
            Dispatch {
                cycle: self.cycle,
                job,
                processor: Arc::clone(&processor),
                cycle_signal: self.cycle_abort.signal(),
                scheduler: myself.clone(),
            }
            .spawn();
        }
    }

    /// Return to Idle, dropping all queued and in-flight work.
    fn dispose(&mut self) {
        let was_processing = self.processor.take().is_some();
        self.cycle_abort.abort();
        let dropped = self.queue.len() + self.in_flight.len();
        self.queue.clear();
        self.in_flight.clear();
        if let Some(stop) = self.stop.take() {
            stop.resolve(());
        }
        let _ = self.events.remove_all_listeners();

        if was_processing || dropped > 0 {
            tracing::info!(queue = %self.config.name, dropped, "Disposed scheduler");
        }
    }
}

/// Actor that serializes every state transition of one scheduler.
pub struct SchedulerActor<T, R>(PhantomData<fn() -> (T, R)>);

impl<T, R> SchedulerActor<T, R> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T, R> Default for SchedulerActor<T, R> {
    fn default() -> Self {
        Self::new()
    }
}

fn schedule_drain<T, R>(myself: &ActorRef<SchedulerMessage<T, R>>)
where
    T: Send + 'static,
    R: Send + 'static,
{
    // Only fails once the actor is stopping, when there is nothing to drain.
    let _ = myself.send_message(SchedulerMessage::Drain);
}

impl<T, R> Actor for SchedulerActor<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    type Msg = SchedulerMessage<T, R>;
    type State = SchedulerState<T, R>;
    type Arguments = SchedulerState<T, R>;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            queue = %args.config.name,
            order = %args.config.order,
            concurrency = args.config.effective_concurrency(),
            "Starting scheduler"
        );
        Ok(args)
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.dispose();
        state.events.dispose();
        tracing::info!(queue = %state.config.name, "Scheduler stopped");
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SchedulerMessage::Add { job, reply } => {
                let job = *job;
                tracing::debug!(queue = %state.config.name, job_id = %job.id, "Job added");
                let position = state.queue.push(job);
                let _ = reply.send(position);
                schedule_drain(&myself);
            }

            SchedulerMessage::Start { processor, reply } => {
                if state.is_processing() {
                    let _ = reply.send(Err(SchedulerError::AlreadyStarted));
                    return Ok(());
                }

                state.processor = Some(processor);
                state.cycle += 1;
                state.cycle_abort = AbortController::new();
                let stop = Deferred::new();
                state.stop = Some(stop.clone());

                let concurrency = state.config.effective_concurrency();
                tracing::info!(
                    queue = %state.config.name,
                    concurrency,
                    pending = state.queue.len(),
                    "Scheduler processing"
                );
                state.emit(&JobEvent::Processing {
                    queue: state.config.name.clone(),
                    concurrency,
                    timestamp: Utc::now(),
                });

                let _ = reply.send(Ok(stop));
                schedule_drain(&myself);
            }

            SchedulerMessage::Dispose { reply } => {
                state.dispose();
                let _ = reply.send(());
            }

            SchedulerMessage::Drain => {
                state.drain(&myself);
            }

            SchedulerMessage::Settled {
                cycle,
                job_id,
                outcome,
            } => {
                if cycle != state.cycle {
                    tracing::debug!(%job_id, cycle, "Discarding settlement from a disposed cycle");
                    return Ok(());
                }
                let Some(index) = state.in_flight.iter().position(|job| job.id == job_id) else {
                    return Ok(());
                };
                let job = state.in_flight.remove(index);

                let event = match outcome {
                    Ok(result) => {
                        state.stats.completed += 1;
                        JobEvent::Completed {
                            job,
                            result,
                            timestamp: Utc::now(),
                        }
                    }
                    Err(error) => {
                        tracing::warn!(queue = %state.config.name, %job_id, "Job failed: {}", error);
                        state.stats.failed += 1;
                        if error.is_timeout() {
                            state.stats.timed_out += 1;
                        }
                        JobEvent::Failed {
                            job,
                            error,
                            timestamp: Utc::now(),
                        }
                    }
                };
                state.emit(&event);
                schedule_drain(&myself);
            }

            SchedulerMessage::Cancel { job_id, reply } => {
                let removed = state
                    .queue
                    .find_index(|job| job.id == job_id)
                    .and_then(|index| state.queue.remove(index));
                if removed.is_some() {
                    tracing::debug!(queue = %state.config.name, %job_id, "Job canceled");
                }
                let _ = reply.send(removed);
            }

            SchedulerMessage::ListPending { reply } => {
                let _ = reply.send(state.queue.iter().cloned().collect());
            }

            SchedulerMessage::GetStats { reply } => {
                let _ = reply.send(state.stats());
            }

            SchedulerMessage::Shutdown => {
                tracing::info!(queue = %state.config.name, "Shutting down scheduler");
                state.dispose();
                myself.stop(None);
            }
        }

        Ok(())
    }
}
