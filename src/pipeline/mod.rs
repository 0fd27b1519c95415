//! Asynchronous delivery pipeline.
//!
//! [`AsyncLogger`] accepts records from any number of producer threads,
//! applies the configured [`ThrottlingPolicy`](crate::throttling::ThrottlingPolicy)
//! and hands admitted records to a single consumer thread over a FIFO queue.
//! Every record carries a completion that fires once with the delivery
//! outcome. [`AsyncLogger::flush`] enqueues a barrier that settles once all
//! earlier records have been processed.
//!
//! Closing the pipeline cancels the consumer. Records still queued at that
//! point are dropped without their completions firing, and pending flush
//! handles report [`DeliveryError::Cancelled`].

mod config;
mod reconnect;
mod worker;


use std::thread::{self, JoinHandle};

use crossbeam_channel::{SendTimeoutError, Sender, TrySendError, bounded, unbounded};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::{
    byte_array::ByteArray,
    cancellation::CancellationToken,
    error::{BuildError, DeliveryError},
    message::MessageBuilder,
    rate_limited_warner::RateLimitedWarner,
    record::{FlushHandle, QueueItem, QueuedRecord},
    throttling::{ThrottleDecision, ThrottlingPolicy, Wait},
    transport::Transmitter,
};

pub use config::{DEFAULT_MAX_MESSAGE_LENGTH, PipelineConfig};
pub use reconnect::ReconnectGate;

use worker::Consumer;

/// Front end of the delivery pipeline.
pub struct AsyncLogger<R> {
    tx: Mutex<Option<Sender<QueueItem<R>>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    throttling: ThrottlingPolicy,
    warner: RateLimitedWarner,
}

impl<R: Send + 'static> AsyncLogger<R> {
    /// Start a pipeline rendering records with `builder` and sending them
    /// through `transmitter`.
    ///
    /// `reconnect_interval` is the minimum delay between two connection
    /// attempts made by the consumer.
    pub fn new<B, T>(
        config: PipelineConfig,
        builder: B,
        transmitter: T,
        reconnect_interval: std::time::Duration,
    ) -> Result<Self, BuildError>
    where
        B: MessageBuilder<R>,
        T: Transmitter,
    {
        let (tx, rx) = match config.throttling.bounded_capacity() {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };
        let cancel = CancellationToken::new();
        let consumer = Consumer::new(
            rx,
            builder,
            transmitter,
            ByteArray::new(config.max_message_length),
            ReconnectGate::new(reconnect_interval),
            cancel.clone(),
        );
        let handle = consumer.spawn()?;
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            cancel,
            throttling: config.throttling,
            warner: RateLimitedWarner::new(config.warn_interval),
        })
    }

    /// Submit a record.
    ///
    /// Returns without waiting for delivery. Only the block policy may wait,
    /// bounded by its timeout. Admission failures are reported through
    /// `completion`, never to the caller.
    pub fn log(
        &self,
        record: R,
        completion: impl FnOnce(Result<(), DeliveryError>) + Send + 'static,
    ) {
        let queued = QueuedRecord::new(record, completion);
        let Some(tx) = self.sender() else {
            self.reject(queued, DeliveryError::EnqueueFailed("queue closed"));
            return;
        };
        let depth = tx.len();
        match self.throttling.decide(depth) {
            ThrottleDecision::Discard => {
                debug!("syslog record skipped at queue depth {depth}");
                self.reject(
                    queued,
                    DeliveryError::EnqueueSkipped {
                        depth,
                        limit: self.throttling.limit(),
                    },
                );
            }
            ThrottleDecision::Accept(wait) => self.enqueue(&tx, queued, wait),
        }
    }

    /// Hand `queued` to the consumer.
    ///
    /// Without a wait the queue's own capacity is the ceiling: a producer
    /// that raced past the depth check onto a full queue is skipped rather
    /// than blocked.
    fn enqueue(&self, tx: &Sender<QueueItem<R>>, queued: QueuedRecord<R>, wait: Wait) {
        let result = match wait {
            Wait::Infinite => tx.try_send(QueueItem::Record(queued)).map_err(|err| match err {
                TrySendError::Full(item) => (
                    item,
                    DeliveryError::EnqueueSkipped {
                        depth: tx.len(),
                        limit: self.throttling.limit(),
                    },
                ),
                TrySendError::Disconnected(item) => {
                    (item, DeliveryError::EnqueueFailed("queue closed"))
                }
            }),
            Wait::Timeout(timeout) => {
                tx.send_timeout(QueueItem::Record(queued), timeout)
                    .map_err(|err| match err {
                        SendTimeoutError::Timeout(item) => (
                            item,
                            DeliveryError::EnqueueFailed("timed out waiting for queue space"),
                        ),
                        SendTimeoutError::Disconnected(item) => {
                            (item, DeliveryError::EnqueueFailed("queue closed"))
                        }
                    })
            }
        };
        match result {
            Ok(()) => debug!("syslog record queued"),
            Err((QueueItem::Record(queued), err)) => self.reject(queued, err),
            Err((QueueItem::Flush(_), _)) => {}
        }
    }

    fn reject(&self, queued: QueuedRecord<R>, err: DeliveryError) {
        self.warner.record_drop();
        self.warner.warn_if_due(|count| {
            warn!("syslog pipeline dropped {count} records: {err}");
        });
        queued.complete(Err(err));
    }

    /// Enqueue a flush barrier, bypassing throttling.
    ///
    /// The returned handle settles once every record submitted before this
    /// call has had its completion fired.
    pub fn flush(&self) -> FlushHandle {
        self.warner.flush(|count| {
            warn!("syslog pipeline dropped {count} records in the last interval");
        });
        let Some(tx) = self.sender() else {
            return FlushHandle::cancelled();
        };
        let (ack, handle) = FlushHandle::pair();
        // On failure the marker is dropped, which settles the handle as
        // cancelled.
        let _ = tx.send(QueueItem::Flush(ack));
        handle
    }

    /// Number of items currently queued.
    pub fn queue_depth(&self) -> usize {
        self.sender().map_or(0, |tx| tx.len())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Cancel the consumer, close the queue and wait for the consumer thread
    /// to release the transport. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
        self.tx.lock().take();
        self.join_worker();
    }

    fn sender(&self) -> Option<Sender<QueueItem<R>>> {
        self.tx.lock().as_ref().cloned()
    }

    fn join_worker(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        // A completion dropping the last reference runs on the consumer
        // thread itself; it exits on its own once cancelled.
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!("syslog consumer thread panicked");
        }
    }
}

impl<R> Drop for AsyncLogger<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.tx.get_mut().take();
        if let Some(handle) = self.handle.get_mut().take()
            && handle.thread().id() != thread::current().id()
            && handle.join().is_err()
        {
            warn!("syslog consumer thread panicked");
        }
    }
}

impl<R> std::fmt::Debug for AsyncLogger<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncLogger")
            .field("throttling", &self.throttling)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
