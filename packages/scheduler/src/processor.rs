//! Job processor trait and registry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use queue_core::{AbortSignal, Job};

/// Error type processors may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for job processors.
pub type ProcessorResult<R> = Result<R, BoxError>;

/// Future type for async job processors.
pub type ProcessorFuture<R> = Pin<Box<dyn Future<Output = ProcessorResult<R>> + Send>>;

/// Trait for job processors.
///
/// The signal is advisory: when a job times out the scheduler aborts it and
/// reports the job as failed, but keeps no hold on the returned future. A
/// processor that ignores the signal runs to completion in the background and
/// its result is discarded.
///
/// Implemented for closures `Fn(Job<T>, AbortSignal) -> impl Future`.
pub trait JobProcessor<T, R>: Send + Sync + 'static {
    /// Process a job and return the result.
    fn process(&self, job: Job<T>, signal: AbortSignal) -> ProcessorFuture<R>;
}

impl<T, R, F, Fut> JobProcessor<T, R> for F
where
    F: Fn(Job<T>, AbortSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProcessorResult<R>> + Send + 'static,
{
    fn process(&self, job: Job<T>, signal: AbortSignal) -> ProcessorFuture<R> {
        Box::pin(self(job, signal))
    }
}

/// Routes jobs to processors by message type.
pub struct ProcessorRegistry<T, R> {
    processors: HashMap<String, Arc<dyn JobProcessor<T, R>>>,
    fallback: Option<Arc<dyn JobProcessor<T, R>>>,
}

impl<T, R> ProcessorRegistry<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
            fallback: None,
        }
    }

    /// Register a processor for a message type.
    pub fn register(
        mut self,
        message_type: impl Into<String>,
        processor: impl JobProcessor<T, R>,
    ) -> Self {
        self.processors
            .insert(message_type.into(), Arc::new(processor));
        self
    }

    /// Process jobs without a registered message type with `processor`.
    pub fn with_fallback(mut self, processor: impl JobProcessor<T, R>) -> Self {
        self.fallback = Some(Arc::new(processor));
        self
    }

    /// Get the processor for a message type.
    pub fn get(&self, message_type: &str) -> Option<Arc<dyn JobProcessor<T, R>>> {
        self.processors.get(message_type).cloned()
    }

    /// Check if a processor exists for a message type.
    pub fn has_processor(&self, message_type: &str) -> bool {
        self.processors.contains_key(message_type)
    }

    /// List all registered message types.
    pub fn message_types(&self) -> Vec<&str> {
        self.processors.keys().map(|s| s.as_str()).collect()
    }
}

impl<T, R> Default for ProcessorRegistry<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> JobProcessor<T, R> for ProcessorRegistry<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    fn process(&self, job: Job<T>, signal: AbortSignal) -> ProcessorFuture<R> {
        let routed = job
            .message_type
            .as_deref()
            .and_then(|message_type| self.processors.get(message_type))
            .or(self.fallback.as_ref());

        match routed {
            Some(processor) => processor.process(job, signal),
            None => {
                let message_type = job.message_type.unwrap_or_else(|| "<none>".to_string());
                let error: BoxError =
                    format!("No processor for message type: {}", message_type).into();
                Box::pin(async move { Err::<R, BoxError>(error) })
            }
        }
    }
}
