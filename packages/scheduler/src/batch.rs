//! Bounded-concurrency batch runner.
//!
//! Runs a batch of async operations with at most `concurrency` of them in
//! flight and collects every outcome at its input index. Returned errors are
//! recorded as [`Settled::Rejected`] and never fail the batch.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Concurrency used when a caller has no preference.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Outcome of one operation in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Settled<T, E> {
    Fulfilled { value: T },
    Rejected { reason: E },
}

impl<T, E> Settled<T, E> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settled::Fulfilled { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Settled::Rejected { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Settled::Fulfilled { value } => Some(value),
            Settled::Rejected { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&E> {
        match self {
            Settled::Fulfilled { .. } => None,
            Settled::Rejected { reason } => Some(reason),
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Settled::Fulfilled { value } => Ok(value),
            Settled::Rejected { reason } => Err(reason),
        }
    }
}

impl<T, E> From<Result<T, E>> for Settled<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Settled::Fulfilled { value },
            Err(reason) => Settled::Rejected { reason },
        }
    }
}

/// Apply `f` to every argument with at most `concurrency` calls in flight.
///
/// Results are returned in argument order. A `concurrency` of zero is
/// treated as one.
///
/// Only returned errors are recorded as [`Settled::Rejected`]. A panic in `f`
/// or in its future is not caught: it unwinds out of this call and the other
/// results are lost.
pub async fn map_promises<A, T, E, F, Fut>(
    args: Vec<A>,
    f: F,
    concurrency: usize,
) -> Vec<Settled<T, E>>
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    run_bounded(args, concurrency, |arg| f(arg)).await
}

/// Run every callback with at most `concurrency` in flight.
///
/// Results are returned in callback order. A `concurrency` of zero is
/// treated as one. Panics propagate as in [`map_promises`].
pub async fn promise_concurrency<T, E, C, Fut>(
    callbacks: Vec<C>,
    concurrency: usize,
) -> Vec<Settled<T, E>>
where
    C: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    run_bounded(callbacks, concurrency, |callback| callback()).await
}

async fn run_bounded<I, T, E, F, Fut>(items: Vec<I>, concurrency: usize, run: F) -> Vec<Settled<T, E>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = concurrency.max(1).min(total);
    tracing::debug!(total, workers, "Running batch");

    let cursor = Mutex::new(items.into_iter().enumerate());
    let results: Mutex<Vec<Option<Settled<T, E>>>> =
        Mutex::new(std::iter::repeat_with(|| None).take(total).collect());
    let settled = AtomicUsize::new(0);

    let (claim, record, count) = (&cursor, &results, &settled);
    let run = &run;
    let worker = move || async move {
        loop {
            let next = claim.lock().unwrap_or_else(PoisonError::into_inner).next();
            let Some((index, item)) = next else {
                break;
            };
            let outcome = Settled::from(run(item).await);
            record.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(outcome);
            count.fetch_add(1, Ordering::Relaxed);
            tokio::task::yield_now().await;
        }
    };
    futures_util::future::join_all((0..workers).map(|_| worker())).await;

    debug_assert_eq!(settled.load(Ordering::Relaxed), total);
    results
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_serializes_with_status_tag() {
        let fulfilled: Settled<u32, String> = Settled::Fulfilled { value: 4 };
        assert_eq!(
            serde_json::to_value(&fulfilled).unwrap(),
            serde_json::json!({ "status": "fulfilled", "value": 4 })
        );

        let rejected: Settled<u32, String> = Err("nope".to_string()).into();
        assert_eq!(
            serde_json::to_value(&rejected).unwrap(),
            serde_json::json!({ "status": "rejected", "reason": "nope" })
        );
        assert_eq!(rejected.reason().map(String::as_str), Some("nope"));
        assert!(rejected.into_result().is_err());
    }

    #[tokio::test]
    #[should_panic(expected = "operation exploded")]
    async fn test_panic_in_operation_propagates() {
        map_promises(
            vec![1u32, 2, 3],
            |n| async move {
                if n == 2 {
                    panic!("operation exploded");
                }
                Ok::<_, String>(n)
            },
            2,
        )
        .await;
    }

    #[tokio::test]
    async fn test_zero_concurrency_runs_one_at_a_time() {
        let results = map_promises(
            vec![1, 2, 3],
            |n: u32| async move { Ok::<_, String>(n + 1) },
            0,
        )
        .await;
        let values: Vec<u32> = results.into_iter().filter_map(|s| s.into_result().ok()).collect();
        assert_eq!(values, vec![2, 3, 4]);
    }
}
