//! Consumer thread driving record delivery.
//!
//! A single consumer owns the transmitter and the shared [`ByteArray`]. It
//! dequeues one item at a time, acknowledges flush markers, and renders and
//! sends records, firing each record's completion with the outcome. A
//! supervisor wraps the loop: a panic escaping an iteration is logged and
//! the loop restarts with the remaining queue intact, until cancellation.

use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    thread::{self, JoinHandle},
    time::Instant,
};

use crossbeam_channel::{Receiver, select};
use log::{debug, warn};

use crate::{
    byte_array::ByteArray,
    cancellation::CancellationToken,
    error::DeliveryError,
    message::MessageBuilder,
    record::QueueItem,
    transport::Transmitter,
};

use super::reconnect::ReconnectGate;

/// Supervisor states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LoopState {
    Running,
    Restarting,
    Stopped,
}

pub(crate) struct Consumer<R, B, T> {
    rx: Receiver<QueueItem<R>>,
    builder: B,
    transmitter: T,
    buffer: ByteArray,
    reconnect: ReconnectGate,
    cancel: CancellationToken,
    restarts: u64,
}

impl<R, B, T> Consumer<R, B, T>
where
    R: Send + 'static,
    B: MessageBuilder<R>,
    T: Transmitter,
{
    pub(crate) fn new(
        rx: Receiver<QueueItem<R>>,
        builder: B,
        transmitter: T,
        buffer: ByteArray,
        reconnect: ReconnectGate,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rx,
            builder,
            transmitter,
            buffer,
            reconnect,
            cancel,
            restarts: 0,
        }
    }

    /// Start the consumer on a dedicated thread.
    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("syslog-relay-consumer".into())
            .spawn(move || self.run())
    }

    pub(crate) fn run(mut self) {
        let mut state = LoopState::Running;
        while state != LoopState::Stopped {
            state = self.step(state);
        }
        self.transmitter.tear_down();
        debug!("syslog consumer stopped after {} restarts", self.restarts);
    }

    fn step(&mut self, state: LoopState) -> LoopState {
        match state {
            LoopState::Running => {
                match panic::catch_unwind(AssertUnwindSafe(|| self.drain())) {
                    Ok(()) => LoopState::Stopped,
                    Err(payload) => {
                        warn!(
                            "syslog consumer loop faulted: {}; restarting",
                            panic_message(payload.as_ref())
                        );
                        LoopState::Restarting
                    }
                }
            }
            LoopState::Restarting if self.cancel.is_cancelled() => LoopState::Stopped,
            LoopState::Restarting => {
                self.restarts += 1;
                self.buffer.reset();
                LoopState::Running
            }
            LoopState::Stopped => LoopState::Stopped,
        }
    }

    /// Process items until cancelled or until the queue is closed and empty.
    fn drain(&mut self) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let item = select! {
                recv(self.rx) -> item => match item {
                    Ok(item) => item,
                    Err(_) => return,
                },
                recv(self.cancel.signal()) -> _ => return,
            };
            self.process(item);
        }
    }

    fn process(&mut self, item: QueueItem<R>) {
        match item {
            QueueItem::Flush(ack) => {
                ack.settle();
                debug!("syslog flush marker processed");
            }
            QueueItem::Record(queued) => {
                let (record, completion) = queued.into_parts();
                let outcome = self.deliver(&record);
                let failure = outcome.as_ref().err().map(ToString::to_string);
                // Fire before logging so a faulty logger cannot swallow it.
                completion(outcome);
                match failure {
                    None => debug!("syslog message sent ({} bytes)", self.buffer.len()),
                    Some(err) => warn!("syslog message not sent: {err}"),
                }
            }
        }
    }

    fn deliver(&mut self, record: &R) -> Result<(), DeliveryError> {
        self.render(record)?;
        self.transmit()?;
        if self.cancel.is_cancelled() {
            return Err(DeliveryError::Cancelled);
        }
        Ok(())
    }

    /// Render `record` into the shared buffer. A panicking builder fails
    /// only this record.
    fn render(&mut self, record: &R) -> Result<(), DeliveryError> {
        self.buffer.reset();
        let builder = &self.builder;
        let buffer = &mut self.buffer;
        panic::catch_unwind(AssertUnwindSafe(|| builder.build(record, buffer)))
            .unwrap_or_else(|payload| {
                Err(io::Error::other(format!(
                    "rendering panicked: {}",
                    panic_message(payload.as_ref())
                )))
            })
            .map_err(|err| DeliveryError::Build(err.to_string()))?;
        if self.buffer.was_truncated() {
            debug!(
                "syslog message truncated to {} bytes",
                self.buffer.max_len()
            );
        }
        Ok(())
    }

    /// Make the transport ready and send the rendered buffer. A panicking
    /// transmitter is torn down and the record fails as a transport error.
    fn transmit(&mut self) -> Result<(), DeliveryError> {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), DeliveryError> {
            self.ensure_ready()?;
            self.transmitter.send(&mut self.buffer, &self.cancel)?;
            Ok(())
        }));
        attempt.unwrap_or_else(|payload| {
            let reason = format!("transmitter panicked: {}", panic_message(payload.as_ref()));
            self.transmitter.tear_down();
            Err(DeliveryError::Transport(io::Error::other(reason)))
        })
    }

    /// Reconnect when the transport is not usable, honouring the reconnect
    /// interval between attempts.
    fn ensure_ready(&mut self) -> Result<(), DeliveryError> {
        if self.transmitter.is_ready() {
            return Ok(());
        }
        if let Some(delay) = self.reconnect.delay(Instant::now())
            && !self.cancel.sleep(delay)
        {
            return Err(DeliveryError::Cancelled);
        }
        self.reconnect.record_attempt(Instant::now());
        self.transmitter.setup()?;
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
