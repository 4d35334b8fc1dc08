#![allow(dead_code)]

use std::sync::Once;
use std::time::Duration;

use queue_core::JobEvent;
use scheduler::{JobQueue, SchedulerConfig, SchedulerResult};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub async fn spawn_queue<T, R>(config: SchedulerConfig) -> SchedulerResult<JobQueue<T, R>>
where
    T: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    init_tracing();
    JobQueue::spawn(config).await
}

/// Forward every completed and failed event into a channel.
pub fn collect_events<T, R>(
    queue: &JobQueue<T, R>,
) -> SchedulerResult<mpsc::UnboundedReceiver<JobEvent<T, R>>>
where
    T: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    for event in [queue_core::events::COMPLETED, queue_core::events::FAILED] {
        let tx = tx.clone();
        queue.add_event_listener(
            event,
            move |event| {
                let _ = tx.send(event.clone());
            },
            Default::default(),
        )?;
    }
    Ok(rx)
}

/// Receive `n` events, failing if they do not arrive in time.
pub async fn next_events<T, R>(
    rx: &mut mpsc::UnboundedReceiver<JobEvent<T, R>>,
    n: usize,
) -> Result<Vec<JobEvent<T, R>>, Box<dyn std::error::Error>> {
    let mut events = Vec::with_capacity(n);
    while events.len() < n {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await?
            .ok_or("event channel closed")?;
        events.push(event);
    }
    Ok(events)
}
