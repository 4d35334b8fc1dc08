//! Externally settled awaitable.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{CanceledError, DeferredError};

type Outcome<T, E> = Result<T, DeferredError<E>>;

/// A handle that lets one party settle a value others are awaiting.
///
/// Only the first of [`resolve`](Self::resolve), [`reject`](Self::reject) or
/// [`cancel`](Self::cancel) takes effect. Clones share the same slot.
pub struct Deferred<T, E = String> {
    slot: Arc<watch::Sender<Option<Outcome<T, E>>>>,
}

impl<T, E> Deferred<T, E> {
    pub fn new() -> Self {
        let (slot, _rx) = watch::channel(None);
        Self {
            slot: Arc::new(slot),
        }
    }

    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub fn reject(&self, reason: E) -> bool {
        self.settle(Err(DeferredError::Rejected(reason)))
    }

    pub fn cancel(&self, reason: Option<String>) -> bool {
        self.settle(Err(CanceledError::new(reason).into()))
    }

    pub fn is_settled(&self) -> bool {
        self.slot.borrow().is_some()
    }

    fn settle(&self, outcome: Outcome<T, E>) -> bool {
        self.slot.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }
}

impl<T: Clone, E: Clone> Deferred<T, E> {
    /// The recorded outcome, if settled.
    pub fn outcome(&self) -> Option<Outcome<T, E>> {
        self.slot.borrow().clone()
    }

    /// Wait for the outcome.
    pub async fn wait(&self) -> Outcome<T, E> {
        let mut rx = self.slot.subscribe();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };
        match outcome {
            Some(outcome) => outcome,
            // The sender lives in `self`, so the channel cannot close here.
            None => std::future::pending().await,
        }
    }
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T, E> Default for Deferred<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> std::fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("settled", &self.is_settled())
            .finish()
    }
}
