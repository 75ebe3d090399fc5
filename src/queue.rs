//! Bounded (or unbounded) multi-producer / single-consumer FIFO.
//!
//! Wraps `tokio::sync::mpsc`, split into the cloneable producer-facing
//! [`AdmissionQueue`] and the collector-exclusive [`CollectorQueue`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

/// Producer-facing half. Enqueueing never blocks: a bounded queue at
/// capacity fails synchronously instead of awaiting backpressure, matching
/// the spec's admission-gate contract.
pub(crate) enum AdmissionQueue<T> {
    Bounded(mpsc::Sender<T>),
    Unbounded(mpsc::UnboundedSender<T>),
}

impl<T> Clone for AdmissionQueue<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Bounded(tx) => Self::Bounded(tx.clone()),
            Self::Unbounded(tx) => Self::Unbounded(tx.clone()),
        }
    }
}

impl<T> AdmissionQueue<T> {
    /// Enqueue without blocking. `Err(item)` means the queue was at capacity
    /// (or, in the rare case the collector task is gone, closed) and the
    /// item is handed back to the caller to surface as `QueueFull`.
    pub(crate) fn try_enqueue(&self, item: T) -> Result<(), T> {
        match self {
            Self::Bounded(tx) => tx.try_send(item).map_err(|e| match e {
                mpsc::error::TrySendError::Full(item) => item,
                mpsc::error::TrySendError::Closed(item) => item,
            }),
            Self::Unbounded(tx) => tx.send(item).map_err(|e| e.0),
        }
    }
}

/// Collector-exclusive half: owned solely by the collector task once it
/// starts.
pub(crate) enum CollectorQueue<T> {
    Bounded(mpsc::Receiver<T>),
    Unbounded(mpsc::UnboundedReceiver<T>),
}

impl<T> CollectorQueue<T> {
    /// Current number of entries awaiting collection. Used to evaluate the
    /// `stop_signalled AND queue_empty` stop predicate.
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Bounded(rx) => rx.len(),
            Self::Unbounded(rx) => rx.len(),
        }
    }

    /// Non-blocking take. `None` if nothing is queued right now.
    pub(crate) fn try_take(&mut self) -> Option<T> {
        match self {
            Self::Bounded(rx) => rx.try_recv().ok(),
            Self::Unbounded(rx) => rx.try_recv().ok(),
        }
    }

    /// Await an entry, up to `duration`. `None` on timeout or if every
    /// [`AdmissionQueue`] clone has been dropped.
    pub(crate) async fn take_timeout(&mut self, duration: Duration) -> Option<T> {
        match self {
            Self::Bounded(rx) => timeout(duration, rx.recv()).await.ok().flatten(),
            Self::Unbounded(rx) => timeout(duration, rx.recv()).await.ok().flatten(),
        }
    }
}

/// Build a producer/collector queue pair. `capacity = None` yields an
/// unbounded channel; `Some(n)` yields a bounded one with capacity `n`.
pub(crate) fn channel<T>(capacity: Option<usize>) -> (AdmissionQueue<T>, CollectorQueue<T>) {
    match capacity {
        Some(n) => {
            let (tx, rx) = mpsc::channel(n);
            (AdmissionQueue::Bounded(tx), CollectorQueue::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                AdmissionQueue::Unbounded(tx),
                CollectorQueue::Unbounded(rx),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_queue_rejects_enqueue_past_capacity() {
        let (admission, mut collector) = channel::<i32>(Some(1));
        admission.try_enqueue(1).unwrap();
        assert_eq!(admission.try_enqueue(2), Err(2));
        assert_eq!(collector.try_take(), Some(1));
    }

    #[tokio::test]
    async fn unbounded_queue_never_rejects() {
        let (admission, mut collector) = channel::<i32>(None);
        for i in 0..1000 {
            admission.try_enqueue(i).unwrap();
        }
        assert_eq!(collector.len(), 1000);
        assert_eq!(collector.try_take(), Some(0));
    }

    #[tokio::test]
    async fn take_timeout_returns_none_when_nothing_arrives() {
        let (_admission, mut collector) = channel::<i32>(Some(4));
        let got = collector.take_timeout(Duration::from_millis(20)).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn preserves_fifo_order() {
        let (admission, mut collector) = channel::<i32>(None);
        for i in 0..10 {
            admission.try_enqueue(i).unwrap();
        }
        let mut seen = Vec::new();
        while let Some(v) = collector.try_take() {
            seen.push(v);
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }
}
