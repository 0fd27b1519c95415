//! Connection management towards the syslog collector.
//!
//! [`Transmitter`] is the contract the consumer thread drives: establish a
//! connection, check it is still usable, send one message, tear it down.
//! [`TcpTransmitter`] implements it over TCP with optional TLS; other
//! transports slot in as sibling implementations.

mod config;
mod tcp;
mod tls;


use std::{fmt, io};

use crate::{byte_array::ByteArray, cancellation::CancellationToken};

pub use config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_CONNECTION_CHECK_TIMEOUT,
    DEFAULT_RECONNECT_INTERVAL, DEFAULT_TCP_PORT, DEFAULT_TLS_PORT, DEFAULT_WRITE_TIMEOUT,
    KeepAlive, TcpConfig,
};
pub use tcp::TcpTransmitter;
pub use tls::{CertificateProvider, MIN_PROTOCOL_VERSION, TlsOptions};

/// Lifecycle of a transmitter's connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Unconnected,
    Connecting,
    Ready,
    Faulted,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Unconnected => "unconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

/// Operations every transport must support.
///
/// A transmitter is owned by exactly one consumer thread, so all methods
/// take `&mut self` and no internal locking is needed.
pub trait Transmitter: Send + 'static {
    /// Tear down any existing connection and establish a fresh one.
    fn setup(&mut self) -> io::Result<()>;

    /// Whether the connection exists and passes a liveness probe. A failed
    /// probe moves the transmitter to [`ConnectionState::Faulted`].
    fn is_ready(&mut self) -> bool;

    /// Frame and write one message.
    ///
    /// Framing may append a trailer to `message`. If `cancel` has fired the
    /// call returns `Ok(())` without performing I/O. A failed write leaves
    /// the transmitter faulted; the message is not retried.
    fn send(&mut self, message: &mut ByteArray, cancel: &CancellationToken) -> io::Result<()>;

    /// Release the connection. Safe to call repeatedly.
    fn tear_down(&mut self);

    fn state(&self) -> ConnectionState;
}
