//! Error types returned by the batching engine.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`Batcher::submit`](crate::Batcher::submit) and
/// [`Batcher::stop`](crate::Batcher::stop).
///
/// `E` is the error type of the caller's own `process_batch` callable. It is
/// threaded through rather than erased, so a caller who wants to match on
/// their own error variants still can, one layer down inside
/// [`BatcherError::BatchProcessing`].
#[derive(Debug, Error)]
pub enum BatcherError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Construction-time configuration failure. Irrecoverable.
    #[error("invalid batcher configuration: {0}")]
    ConfigInvalid(String),

    /// `submit` was called after the engine started (or finished) stopping.
    #[error("batcher has stopped accepting new items")]
    EngineStopped,

    /// The admission queue is at capacity. Never raised by an unbounded queue.
    #[error("admission queue is full")]
    QueueFull,

    /// `process_batch` returned a results vector whose length didn't match
    /// the batch it was given. Resolves every handle in the batch.
    #[error("process_batch returned {got} results for a batch of {expected} items")]
    ResultCountMismatch { expected: usize, got: usize },

    /// The user's `process_batch` callable returned an error, either for the
    /// whole batch or (when it surfaces inside a per-item `Result`) for a
    /// single item within an otherwise-successful batch.
    #[error("batch processing failed: {0}")]
    BatchProcessing(#[source] E),

    /// A `Blocking` batch processor panicked inside `spawn_blocking`.
    /// Resolves every handle in the batch.
    #[error("batch processor panicked: {0}")]
    Panicked(String),

    /// A forced shutdown cancelled the batch this item belonged to (or the
    /// item was still queued when the engine's admission queue was torn
    /// down).
    #[error("batch was cancelled by a forced shutdown")]
    Cancelled,

    /// A graceful `stop` did not complete within the caller-supplied
    /// deadline. The engine keeps draining in the background.
    #[error("stop() did not complete within {0:?}")]
    Timeout(Duration),
}

// Manual impl rather than `#[derive(Clone)]`: the derive would require
// `E: Clone` bounds threaded awkwardly through thiserror's generated code.
// `BatcherError` requires `E: Clone` to fan a single batch-wide failure out
// to every handle in the batch without an `Arc` indirection in the public
// API.
impl<E> Clone for BatcherError<E>
where
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        match self {
            Self::ConfigInvalid(msg) => Self::ConfigInvalid(msg.clone()),
            Self::EngineStopped => Self::EngineStopped,
            Self::QueueFull => Self::QueueFull,
            Self::ResultCountMismatch { expected, got } => Self::ResultCountMismatch {
                expected: *expected,
                got: *got,
            },
            Self::BatchProcessing(e) => Self::BatchProcessing(e.clone()),
            Self::Panicked(msg) => Self::Panicked(msg.clone()),
            Self::Cancelled => Self::Cancelled,
            Self::Timeout(d) => Self::Timeout(*d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug, Clone)]
    struct DummyError(String);

    impl fmt::Display for DummyError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "dummy: {}", self.0)
        }
    }

    impl std::error::Error for DummyError {}

    #[test]
    fn display_messages_are_human_readable() {
        let err: BatcherError<DummyError> = BatcherError::QueueFull;
        assert_eq!(err.to_string(), "admission queue is full");

        let err: BatcherError<DummyError> =
            BatcherError::ResultCountMismatch { expected: 3, got: 1 };
        assert_eq!(
            err.to_string(),
            "process_batch returned 1 results for a batch of 3 items"
        );
    }

    #[test]
    fn batch_processing_error_is_clonable_and_sourced() {
        let err: BatcherError<DummyError> =
            BatcherError::BatchProcessing(DummyError("boom".into()));
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
        assert!(std::error::Error::source(&err).is_some());
    }
}
