//! Batcher configuration and its validated builder.

use std::time::Duration;

use crate::error::BatcherError;

/// Immutable configuration for a [`Batcher`](crate::Batcher), produced by
/// [`BatcherBuilder::build`].
///
/// `None` is the Rust rendition of the spec's `-1` "unbounded" sentinel for
/// `max_batch_size`, `max_queue_size`, and `concurrency`.
#[derive(Clone, Debug)]
pub struct BatcherConfig {
    pub(crate) max_batch_size: Option<usize>,
    pub(crate) max_queue_time: Duration,
    pub(crate) max_queue_size: Option<usize>,
    pub(crate) concurrency: Option<usize>,
    pub(crate) executor: Option<tokio::runtime::Handle>,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_batch_size: None,
            max_queue_time: Duration::from_millis(10),
            max_queue_size: None,
            concurrency: Some(1),
            executor: None,
        }
    }
}

/// Builder for a [`BatcherConfig`].
///
/// Mirrors the `#[must_use]` builder shape used throughout this crate's
/// sibling types: every setter consumes and returns `Self`, and nothing
/// happens until [`build`](Self::build) is called.
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Clone, Debug, Default)]
pub struct BatcherBuilder {
    config: BatcherConfig,
}

impl BatcherBuilder {
    /// Start from the default configuration: unbounded batch size, a 10ms
    /// queue-time deadline, an unbounded queue, and `concurrency = 1`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound on the number of items in a single batch. Must be `None`
    /// (unbounded) or `Some(n)` with `n > 1`; `Some(0)` and `Some(1)` are
    /// rejected by [`build`](Self::build).
    pub fn max_batch_size(mut self, max_batch_size: impl Into<Option<usize>>) -> Self {
        self.config.max_batch_size = max_batch_size.into();
        self
    }

    /// How long a seeded batch waits for additional items before dispatch.
    pub fn max_queue_time(mut self, max_queue_time: Duration) -> Self {
        self.config.max_queue_time = max_queue_time;
        self
    }

    /// Capacity of the admission queue. `None` disables the bound;
    /// `submit` never fails with [`QueueFull`](BatcherError::QueueFull) in
    /// that case.
    pub fn max_queue_size(mut self, max_queue_size: impl Into<Option<usize>>) -> Self {
        self.config.max_queue_size = max_queue_size.into();
        self
    }

    /// Maximum number of batches processed concurrently. `None` disables the
    /// bound; `Some(0)` is rejected by [`build`](Self::build).
    pub fn concurrency(mut self, concurrency: impl Into<Option<usize>>) -> Self {
        self.config.concurrency = concurrency.into();
        self
    }

    /// Runtime handle used to offload a `Blocking` batch processor via
    /// `spawn_blocking`. If unset, the ambient runtime the engine was
    /// constructed on is used.
    pub fn executor(mut self, handle: tokio::runtime::Handle) -> Self {
        self.config.executor = Some(handle);
        self
    }

    /// Validate and produce a [`BatcherConfig`].
    pub fn build<E>(self) -> Result<BatcherConfig, BatcherError<E>>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let Some(n) = self.config.max_batch_size {
            if n <= 1 {
                return Err(BatcherError::ConfigInvalid(
                    "max_batch_size must be greater than 1, or unbounded".to_string(),
                ));
            }
        }
        if self.config.concurrency == Some(0) {
            return Err(BatcherError::ConfigInvalid(
                "concurrency must be greater than 0, or unbounded".to_string(),
            ));
        }
        if self.config.max_queue_size == Some(0) {
            return Err(BatcherError::ConfigInvalid(
                "max_queue_size must be at least 1, or unbounded".to_string(),
            ));
        }
        Ok(self.config)
    }
}
