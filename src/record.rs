//! Queue elements and completion plumbing.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};

use crate::error::DeliveryError;

/// Callback fired exactly once with the delivery outcome of a record.
pub type Completion = Box<dyn FnOnce(Result<(), DeliveryError>) + Send + 'static>;

/// A producer-supplied record together with its completion.
pub struct QueuedRecord<R> {
    pub record: R,
    completion: Completion,
}

impl<R> QueuedRecord<R> {
    pub fn new(record: R, completion: impl FnOnce(Result<(), DeliveryError>) + Send + 'static) -> Self {
        Self {
            record,
            completion: Box::new(completion),
        }
    }

    /// Consume the record and fire its completion.
    pub fn complete(self, outcome: Result<(), DeliveryError>) {
        (self.completion)(outcome);
    }

    /// Split into the record and its completion.
    pub fn into_parts(self) -> (R, Completion) {
        (self.record, self.completion)
    }
}

impl<R: std::fmt::Debug> std::fmt::Debug for QueuedRecord<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedRecord")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

/// Element carried by the work queue.
#[derive(Debug)]
pub enum QueueItem<R> {
    /// A record to render and transmit.
    Record(QueuedRecord<R>),
    /// Flush barrier; acknowledged when dequeued, never transmitted.
    Flush(FlushAck),
}

/// Consumer-side half of a flush barrier.
///
/// Settling records the outcome before the channel disconnects, so every
/// waiter on the shared [`FlushHandle`] wakes and observes the same result.
/// Dropping it unsettled cancels the flush.
#[derive(Debug)]
pub struct FlushAck {
    _wake: Sender<()>,
    settled: Arc<AtomicBool>,
}

impl FlushAck {
    pub fn settle(self) {
        self.settled.store(true, Ordering::Release);
    }
}

/// Caller-side view of a pending flush.
///
/// Settles once the flush marker has been dequeued, which implies every
/// record queued before it has had its completion fired. If the pipeline
/// shuts down first the marker is dropped and the handle reports
/// [`DeliveryError::Cancelled`]. The handle may be shared between threads;
/// all waiters observe the same outcome.
#[derive(Debug)]
pub struct FlushHandle {
    // Never carries a message; disconnects when the ack is settled or dropped.
    wake: Receiver<()>,
    settled: Arc<AtomicBool>,
}

impl FlushHandle {
    pub(crate) fn pair() -> (FlushAck, Self) {
        let (tx, rx) = bounded(0);
        let settled = Arc::new(AtomicBool::new(false));
        (
            FlushAck {
                _wake: tx,
                settled: Arc::clone(&settled),
            },
            Self { wake: rx, settled },
        )
    }

    /// Handle that is already cancelled, used when the queue is closed.
    pub(crate) fn cancelled() -> Self {
        let (_, handle) = Self::pair();
        handle
    }

    fn outcome(&self) -> Result<(), DeliveryError> {
        if self.settled.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DeliveryError::Cancelled)
        }
    }

    /// Block until the flush settles.
    pub fn wait(&self) -> Result<(), DeliveryError> {
        // `recv` only returns once the ack is gone.
        let _ = self.wake.recv();
        self.outcome()
    }

    /// Block for at most `timeout`. Returns `Ok(false)` if it has not
    /// settled in time.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool, DeliveryError> {
        match self.wake.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => self.outcome().map(|()| true),
        }
    }

    /// Non-blocking poll.
    pub fn is_settled(&self) -> Result<bool, DeliveryError> {
        match self.wake.try_recv() {
            Err(TryRecvError::Empty) => Ok(false),
            Ok(()) | Err(TryRecvError::Disconnected) => self.outcome().map(|()| true),
        }
    }
}
