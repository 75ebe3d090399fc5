//! Single-shot completion plumbing between a producer and its batch's worker.

use tokio::sync::oneshot;

use crate::error::BatcherError;

/// The worker-side half: resolves exactly once, from inside the worker task
/// (or is silently dropped if the batch is cancelled, see [`Completion`]).
pub(crate) struct CompletionHandle<S, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    tx: oneshot::Sender<Result<S, BatcherError<E>>>,
}

impl<S, E> CompletionHandle<S, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Resolve this handle. If the producer already abandoned its
    /// [`Completion`] (dropped the future awaiting `submit`), this is a
    /// silent no-op: the item's batch still ran, its result is just
    /// discarded.
    pub(crate) fn resolve(self, result: Result<S, BatcherError<E>>) {
        let _ = self.tx.send(result);
    }
}

/// The producer-side half, returned to `submit`'s caller to await.
pub(crate) struct Completion<S, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    rx: oneshot::Receiver<Result<S, BatcherError<E>>>,
}

impl<S, E> Completion<S, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Wait for this item's batch to resolve it. If the sender was dropped
    /// without resolving (the admission queue was torn down by a forced
    /// shutdown while this item was still queued, or the worker task that
    /// held it was aborted), this resolves as [`BatcherError::Cancelled`].
    pub(crate) async fn wait(self) -> Result<S, BatcherError<E>> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(BatcherError::Cancelled),
        }
    }
}

/// Create a fresh completion pair for one admitted item.
pub(crate) fn pair<S, E>() -> (CompletionHandle<S, E>, Completion<S, E>)
where
    E: std::error::Error + Send + Sync + 'static,
{
    let (tx, rx) = oneshot::channel();
    (CompletionHandle { tx }, Completion { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct DummyError;
    impl std::fmt::Display for DummyError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "dummy")
        }
    }
    impl std::error::Error for DummyError {}

    #[tokio::test]
    async fn resolves_with_the_sent_value() {
        let (handle, completion) = pair::<i32, DummyError>();
        handle.resolve(Ok(42));
        assert_eq!(completion.wait().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn resolves_as_cancelled_when_handle_is_dropped() {
        let (handle, completion) = pair::<i32, DummyError>();
        drop(handle);
        let err = completion.wait().await.unwrap_err();
        assert!(matches!(err, BatcherError::Cancelled));
    }

    #[tokio::test]
    async fn abandoned_completion_does_not_panic_on_resolve() {
        let (handle, completion) = pair::<i32, DummyError>();
        drop(completion);
        handle.resolve(Ok(1));
    }
}
