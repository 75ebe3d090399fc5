//! The user-supplied batch-processing contract.

use std::sync::Arc;

use futures::future::BoxFuture;

/// What a `process_batch` call produced for a batch.
///
/// `Results` must have the same length as the batch it was given; a length
/// mismatch is reported as [`BatcherError::ResultCountMismatch`](crate::BatcherError::ResultCountMismatch).
/// `Empty` is the Rust rendition of the distilled spec's "returned `None`"
/// case: every item in the batch resolves with `S::default()`, for
/// write-only operations with no meaningful per-item payload.
pub enum BatchOutcome<S, E> {
    Results(Vec<Result<S, E>>),
    Empty,
}

type AsyncProcessFn<T, S, E> =
    Arc<dyn Fn(Vec<T>) -> BoxFuture<'static, Result<BatchOutcome<S, E>, E>> + Send + Sync>;

type BlockingProcessFn<T, S, E> = Arc<dyn Fn(Vec<T>) -> Result<BatchOutcome<S, E>, E> + Send + Sync>;

/// A batch processor, expressed as a closed sum type rather than something
/// the worker must introspect at runtime: either a cooperative async
/// function awaited directly on the collector's runtime, or a blocking one
/// offloaded to `spawn_blocking` so it never stalls the collector loop.
#[derive(Clone)]
pub enum BatchProcessor<T, S, E> {
    /// Awaited directly. Must not block the executor thread.
    Async(AsyncProcessFn<T, S, E>),
    /// Run via `tokio::task::spawn_blocking`, optionally on a caller-supplied
    /// `tokio::runtime::Handle`.
    Blocking(BlockingProcessFn<T, S, E>, Option<tokio::runtime::Handle>),
}

impl<T, S, E> BatchProcessor<T, S, E>
where
    T: Send + 'static,
    S: Send + 'static,
    E: Send + 'static,
{
    /// Wrap a cooperative async function as a [`BatchProcessor::Async`].
    pub fn async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<BatchOutcome<S, E>, E>> + Send + 'static,
    {
        Self::Async(Arc::new(move |items| Box::pin(f(items))))
    }

    /// Wrap a blocking function as a [`BatchProcessor::Blocking`], run on the
    /// ambient runtime's blocking pool.
    pub fn blocking_fn<F>(f: F) -> Self
    where
        F: Fn(Vec<T>) -> Result<BatchOutcome<S, E>, E> + Send + Sync + 'static,
    {
        Self::Blocking(Arc::new(f), None)
    }

    /// Like [`blocking_fn`](Self::blocking_fn), but run on the given runtime
    /// handle instead of the ambient one.
    pub fn blocking_fn_on<F>(f: F, executor: tokio::runtime::Handle) -> Self
    where
        F: Fn(Vec<T>) -> Result<BatchOutcome<S, E>, E> + Send + Sync + 'static,
    {
        Self::Blocking(Arc::new(f), Some(executor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[test]
    fn async_fn_builds_the_async_variant() {
        let processor: BatchProcessor<i32, i32, Infallible> =
            BatchProcessor::async_fn(|items| async move { Ok(BatchOutcome::Results(
                items.into_iter().map(Ok).collect(),
            )) });
        assert!(matches!(processor, BatchProcessor::Async(_)));
    }

    #[test]
    fn blocking_fn_builds_the_blocking_variant_with_no_executor() {
        let processor: BatchProcessor<i32, i32, Infallible> =
            BatchProcessor::blocking_fn(|items| Ok(BatchOutcome::Results(
                items.into_iter().map(Ok).collect(),
            )));
        assert!(matches!(processor, BatchProcessor::Blocking(_, None)));
    }

    #[test]
    fn processor_is_cheaply_clonable() {
        let processor: BatchProcessor<i32, i32, Infallible> =
            BatchProcessor::blocking_fn(|items| Ok(BatchOutcome::Results(
                items.into_iter().map(Ok).collect(),
            )));
        let cloned = processor.clone();
        assert!(matches!(cloned, BatchProcessor::Blocking(_, None)));
    }
}
