//! Invokes the user's `process_batch` and fans the outcome back to handles.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OwnedSemaphorePermit;

use crate::engine::Inner;
use crate::error::BatcherError;
use crate::handle::CompletionHandle;
use crate::processor::{BatchOutcome, BatchProcessor};

/// Process one dispatched batch and resolve every completion handle in it.
///
/// `permit`, if held, is dropped at the end of this function's scope —
/// whether by falling off the end, an early `return`, or the whole task
/// being aborted by a forced shutdown — which is exactly when the spec says
/// the dispatch slot should be released.
pub(crate) async fn run<T, S, E>(
    task_id: u64,
    batch: Vec<(T, CompletionHandle<S, E>)>,
    permit: Option<OwnedSemaphorePermit>,
    inner: Arc<Inner<T, S, E>>,
) where
    T: Send + 'static,
    S: Send + Default + 'static,
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    let _permit = permit;
    let started_at = Instant::now();
    let batch_len = batch.len();
    let (items, handles): (Vec<T>, Vec<CompletionHandle<S, E>>) = batch.into_iter().unzip();

    let outcome = match &inner.processor {
        BatchProcessor::Async(f) => f(items).await,
        BatchProcessor::Blocking(f, per_call_executor) => {
            let f = f.clone();
            let join = match per_call_executor.as_ref().or(inner.config.executor.as_ref()) {
                Some(handle) => handle.spawn_blocking(move || f(items)),
                None => tokio::task::spawn_blocking(move || f(items)),
            };
            match join.await {
                Ok(result) => result,
                Err(join_err) => {
                    let msg = join_err.to_string();
                    tracing::error!(task_id, batch_size = batch_len, %msg, "batch processor panicked");
                    for handle in handles {
                        handle.resolve(Err(BatcherError::Panicked(msg.clone())));
                    }
                    inner.in_flight.lock().remove(&task_id);
                    return;
                }
            }
        }
    };

    match outcome {
        Err(e) => {
            tracing::error!(task_id, batch_size = batch_len, error = %e, "batch processing failed");
            let err = BatcherError::BatchProcessing(e);
            for handle in handles {
                handle.resolve(Err(err.clone()));
            }
        }
        Ok(BatchOutcome::Empty) => {
            for handle in handles {
                handle.resolve(Ok(S::default()));
            }
        }
        Ok(BatchOutcome::Results(results)) => {
            if results.len() != handles.len() {
                tracing::error!(
                    task_id,
                    expected = handles.len(),
                    got = results.len(),
                    "process_batch returned the wrong number of results"
                );
                let err = BatcherError::ResultCountMismatch {
                    expected: handles.len(),
                    got: results.len(),
                };
                for handle in handles {
                    handle.resolve(Err(err.clone()));
                }
            } else {
                for (handle, result) in handles.into_iter().zip(results) {
                    handle.resolve(result.map_err(BatcherError::BatchProcessing));
                }
            }
        }
    }

    tracing::debug!(
        task_id,
        batch_size = batch_len,
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        "processed batch"
    );

    inner.in_flight.lock().remove(&task_id);
}
