//! Error types shared by the delivery pipeline and the transport layer.
//!
//! [`DeliveryError`] is the value handed to a record's completion when it was
//! not delivered. [`BuildError`] is returned by
//! [`SyslogTargetBuilder`](crate::builder::SyslogTargetBuilder) when the
//! supplied configuration cannot be turned into a running pipeline.

use std::io;

use thiserror::Error;

/// Reasons a queued record did not reach the collector.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The throttling policy refused the record; it was never queued.
    #[error("enqueue skipped: queue depth {depth} reached limit {limit}")]
    EnqueueSkipped { depth: usize, limit: usize },
    /// The record was admitted but could not be placed on the queue, either
    /// because the wait timed out or because the queue was closed.
    #[error("enqueue failed: {0}")]
    EnqueueFailed(&'static str),
    /// The message builder could not render the record.
    #[error("message build failed: {0}")]
    Build(String),
    /// Connection setup or the write itself failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    /// The pipeline shut down before the operation settled.
    #[error("delivery cancelled")]
    Cancelled,
}

/// Errors that may occur while building a pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid syslog target configuration: {0}")]
    InvalidConfig(String),
    /// Underlying I/O error whilst creating the pipeline.
    #[error(transparent)]
    Io(#[from] io::Error),
}
