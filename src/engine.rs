//! The public engine: ties the admission gate, queue, collector, dispatcher,
//! and worker together behind a lifecycle controller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Semaphore};
use tokio::task::{AbortHandle, JoinHandle};

use crate::collector;
use crate::config::{BatcherBuilder, BatcherConfig};
use crate::error::BatcherError;
use crate::handle::{self, CompletionHandle};
use crate::processor::BatchProcessor;
use crate::queue::{self, AdmissionQueue, CollectorQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Draining,
    Stopped,
}

pub(crate) struct Inner<T, S, E>
where
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    pub(crate) config: BatcherConfig,
    pub(crate) processor: BatchProcessor<T, S, E>,
    admission: AdmissionQueue<(T, CompletionHandle<S, E>)>,
    collector_queue: Mutex<Option<CollectorQueue<(T, CompletionHandle<S, E>)>>>,
    pub(crate) semaphore: Option<Arc<Semaphore>>,
    lifecycle: Mutex<Lifecycle>,
    // Only ever used to abort the collector on a forced stop. A graceful
    // stop never takes this out, so a later forced stop can still reach it
    // even after a timed-out graceful wait.
    collector_abort: Mutex<Option<AbortHandle>>,
    // Flips to `true` once the collector task has run to completion (by
    // draining naturally or by being aborted), independent of whether any
    // `stop()` caller is still waiting on it.
    collector_done: watch::Sender<bool>,
    pub(crate) in_flight: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
    pub(crate) next_task_id: AtomicU64,
    pub(crate) stop_requested: AtomicBool,
}

/// A generic request-coalescing batcher: producers `submit` items of type
/// `T` and receive results of type `S` (or the caller's own error type
/// `E`), while batches of up to `max_batch_size` items are assembled and
/// handed to a user-supplied [`BatchProcessor`].
///
/// Cheaply [`Clone`]: every clone shares the same admission queue, collector
/// task, and lifecycle state, the way `Producer` and `Client` do in this
/// crate's HTTP-facing siblings.
pub struct Batcher<T, S, E>
where
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<T, S, E>>,
}

impl<T, S, E> Clone for Batcher<T, S, E>
where
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, S, E> Batcher<T, S, E>
where
    T: Send + 'static,
    S: Send + Default + 'static,
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    /// Construct a batcher with default configuration. See
    /// [`BatcherBuilder`] (via [`Batcher::builder`]) to customize.
    pub fn new(processor: BatchProcessor<T, S, E>) -> Result<Self, BatcherError<E>> {
        Self::from_config(BatcherBuilder::new().build()?, processor)
    }

    /// Start building a batcher with a non-default configuration.
    pub fn builder() -> BatcherBuilder {
        BatcherBuilder::new()
    }

    /// Construct a batcher from an already-validated [`BatcherConfig`] (for
    /// example, `Batcher::builder().max_batch_size(50).build()?`).
    pub fn from_config(
        config: BatcherConfig,
        processor: BatchProcessor<T, S, E>,
    ) -> Result<Self, BatcherError<E>> {
        let semaphore = config.concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let (admission, collector_queue) = queue::channel(config.max_queue_size);

        let inner = Arc::new(Inner {
            config,
            processor,
            admission,
            collector_queue: Mutex::new(Some(collector_queue)),
            semaphore,
            lifecycle: Mutex::new(Lifecycle::Created),
            collector_abort: Mutex::new(None),
            collector_done: watch::channel(false).0,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_task_id: AtomicU64::new(0),
            stop_requested: AtomicBool::new(false),
        });

        Ok(Self { inner })
    }

    /// Add an item to the queue and wait for the result of the batch it
    /// ends up in.
    ///
    /// Fails synchronously with [`BatcherError::EngineStopped`] if the
    /// engine has stopped (or is draining), or with
    /// [`BatcherError::QueueFull`] if the admission queue is at capacity.
    /// Otherwise waits for this item's batch to be processed and returns
    /// its individual result.
    pub async fn submit(&self, item: T) -> Result<S, BatcherError<E>> {
        {
            let lifecycle = *self.inner.lifecycle.lock();
            if matches!(lifecycle, Lifecycle::Draining | Lifecycle::Stopped) {
                return Err(BatcherError::EngineStopped);
            }
        }

        self.ensure_collector_started();

        let (completion_handle, completion) = handle::pair();
        if let Err(_rejected) = self
            .inner
            .admission
            .try_enqueue((item, completion_handle))
        {
            return Err(BatcherError::QueueFull);
        }

        completion.wait().await
    }

    /// `true` while the engine is accepting (`Running`) or finishing up
    /// already-admitted (`Draining`) work.
    pub fn is_running(&self) -> bool {
        matches!(
            *self.inner.lifecycle.lock(),
            Lifecycle::Running | Lifecycle::Draining
        )
    }

    /// Stop the engine.
    ///
    /// `force = false` (graceful): stop accepting new items, let the
    /// collector drain whatever is already queued, and wait for it to reach
    /// the terminal state — up to `timeout`, if given, beyond which this
    /// returns [`BatcherError::Timeout`] while the drain keeps running in
    /// the background.
    ///
    /// `force = true`: cancel the collector and every in-flight worker
    /// immediately. Every handle still unresolved in a cancelled batch (or
    /// still sitting in the queue) resolves with
    /// [`BatcherError::Cancelled`]. Returns as soon as the cancellation is
    /// issued, without waiting for the cancelled tasks to finish unwinding.
    pub async fn stop(&self, force: bool, timeout: Option<Duration>) -> Result<(), BatcherError<E>> {
        self.inner.stop_requested.store(true, Ordering::SeqCst);

        if force {
            *self.inner.lifecycle.lock() = Lifecycle::Stopped;
            if let Some(abort) = self.inner.collector_abort.lock().take() {
                abort.abort();
            }
            let workers: Vec<_> = self.inner.in_flight.lock().drain().collect();
            for (_, task) in workers {
                task.abort();
            }
            // Unblock any concurrent graceful `stop()` still waiting below —
            // the aborted collector will never reach its own completion line.
            let _ = self.inner.collector_done.send(true);
            return Ok(());
        }

        let was_running = {
            let mut lifecycle = self.inner.lifecycle.lock();
            match *lifecycle {
                Lifecycle::Created => {
                    // The collector never started: nothing was ever queued.
                    *lifecycle = Lifecycle::Stopped;
                    false
                }
                Lifecycle::Stopped => false,
                _ => {
                    *lifecycle = Lifecycle::Draining;
                    true
                }
            }
        };

        if was_running {
            // `subscribe()` always observes the channel's current value, so
            // there's no lost-wakeup window between checking "already done"
            // and awaiting the next change, even if the collector (or a
            // concurrent forced stop) finished before we got here.
            let mut done = self.inner.collector_done.subscribe();
            if !*done.borrow() {
                let wait = async {
                    while !*done.borrow() {
                        if done.changed().await.is_err() {
                            break;
                        }
                    }
                };
                match timeout {
                    Some(duration) => {
                        if tokio::time::timeout(duration, wait).await.is_err() {
                            return Err(BatcherError::Timeout(duration));
                        }
                    }
                    None => wait.await,
                }
            }
        }

        Ok(())
    }

    fn ensure_collector_started(&self) {
        let mut collector_abort = self.inner.collector_abort.lock();
        if collector_abort.is_some() {
            return;
        }

        let queue = self
            .inner
            .collector_queue
            .lock()
            .take()
            .expect("collector queue is only taken once, when the collector starts");

        let task = tokio::spawn(collector::run(self.inner.clone(), queue));
        *collector_abort = Some(task.abort_handle());
        drop(collector_abort);

        // Detached supervisor: regardless of whether any `stop()` caller is
        // still waiting (or gave up on a timeout), the engine always reaches
        // `Stopped` once the collector task actually finishes.
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _ = task.await;
            let mut lifecycle = inner.lifecycle.lock();
            if *lifecycle != Lifecycle::Stopped {
                *lifecycle = Lifecycle::Stopped;
            }
            drop(lifecycle);
            let _ = inner.collector_done.send(true);
        });

        let mut lifecycle = self.inner.lifecycle.lock();
        if *lifecycle == Lifecycle::Created {
            *lifecycle = Lifecycle::Running;
        }
    }
}
