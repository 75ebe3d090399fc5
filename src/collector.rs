//! The batch-assembly loop: the single coordinator that turns a stream of
//! admitted items into batches handed to the dispatcher.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout, Instant};

use crate::dispatcher;
use crate::engine::Inner;
use crate::handle::CompletionHandle;
use crate::queue::CollectorQueue;

/// Bound on how long the loop can go without re-checking the stop
/// predicate, whether it's blocked acquiring a dispatch slot or seeding a
/// batch. Matches the spec's "≈1s" figure.
const STOP_CHECK_INTERVAL: Duration = Duration::from_secs(1);

pub(crate) async fn run<T, S, E>(
    inner: Arc<Inner<T, S, E>>,
    mut queue: CollectorQueue<(T, CompletionHandle<S, E>)>,
) where
    T: Send + 'static,
    S: Send + Default + 'static,
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    loop {
        if inner.stop_requested.load(Ordering::SeqCst) && queue.len() == 0 {
            break;
        }

        let permit = match &inner.semaphore {
            Some(sem) => match timeout(STOP_CHECK_INTERVAL, sem.clone().acquire_owned()).await {
                Ok(Ok(permit)) => Some(permit),
                Ok(Err(_)) => break, // the semaphore was closed: the engine is gone
                Err(_) => continue,  // no free slot yet; re-check the stop predicate
            },
            None => None,
        };

        // Seeding separately from extension means the deadline clock only
        // starts once there is real work, so an idle engine never burns a
        // batch on an empty window.
        let Some(first) = queue.take_timeout(STOP_CHECK_INTERVAL).await else {
            continue; // `permit`, if any, drops here and releases the slot
        };

        let mut batch = vec![first];
        let deadline = Instant::now() + inner.config.max_queue_time;

        loop {
            if let Some(max) = inner.config.max_batch_size {
                if batch.len() >= max {
                    break;
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let next = if remaining > Duration::ZERO {
                // Per spec, the wait uses the original `max_queue_time`
                // window rather than the shrinking `remaining` value — a
                // lingering batch can run past its nominal deadline when
                // items trickle in just before each window expires.
                queue.take_timeout(inner.config.max_queue_time).await
            } else {
                queue.try_take()
            };

            match next {
                Some(entry) => batch.push(entry),
                None => break,
            }
        }

        dispatcher::dispatch(&inner, batch, permit);
    }

    tracing::debug!("batch collector loop exiting");
}
