//! Allocates task ids and launches worker tasks, tracked in the in-flight set.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;

use crate::engine::Inner;
use crate::handle::CompletionHandle;
use crate::worker;

/// Hand an assembled batch to a fresh worker task. The worker removes
/// itself from the in-flight set on its own terminal step.
pub(crate) fn dispatch<T, S, E>(
    inner: &Arc<Inner<T, S, E>>,
    batch: Vec<(T, CompletionHandle<S, E>)>,
    permit: Option<OwnedSemaphorePermit>,
) where
    T: Send + 'static,
    S: Send + Default + 'static,
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    let task_id = inner.next_task_id.fetch_add(1, Ordering::SeqCst);
    let worker_inner = inner.clone();
    let handle = tokio::spawn(worker::run(task_id, batch, permit, worker_inner));
    inner.in_flight.lock().insert(task_id, handle);
}
