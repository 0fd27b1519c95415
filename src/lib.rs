//! Asynchronous syslog delivery over TCP and TLS.
//!
//! Producers hand records to an [`AsyncLogger`], which admits them through a
//! [`ThrottlingPolicy`] and queues them for a single consumer thread. The
//! consumer renders each record with a [`MessageBuilder`], frames it and
//! writes it through a [`Transmitter`], reconnecting when the collector goes
//! away. Every record's completion fires exactly once with the outcome,
//! unless the pipeline is closed while the record is still queued.
//!
//! ```no_run
//! use syslog_relay::{DisplayBuilder, SyslogTargetBuilder, ThrottlingKind};
//!
//! let logger = SyslogTargetBuilder::new()
//!     .with_tcp("collector.example.com", 514)
//!     .with_throttling(ThrottlingKind::Discard, 1024)
//!     .build::<String, _>(DisplayBuilder)?;
//! logger.log("<13>1 - host app - - - hello".to_string(), |outcome| {
//!     if let Err(err) = outcome {
//!         eprintln!("delivery failed: {err}");
//!     }
//! });
//! logger.flush().wait()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod byte_array;
pub mod cancellation;
pub mod error;
pub mod framing;
pub mod message;
pub mod pipeline;
pub mod rate_limited_warner;
pub mod record;
pub mod settings;
pub mod throttling;
pub mod transport;

pub use builder::{KeepAliveOverrides, SyslogTargetBuilder};
pub use byte_array::ByteArray;
pub use cancellation::CancellationToken;
pub use error::{BuildError, DeliveryError};
pub use framing::{FrameDecoder, FrameError, FramingMethod};
pub use message::{DisplayBuilder, MessageBuilder};
pub use pipeline::{AsyncLogger, PipelineConfig};
pub use record::FlushHandle;
pub use settings::TargetSettings;
pub use throttling::{ThrottlingKind, ThrottlingPolicy};
pub use transport::{
    CertificateProvider, ConnectionState, KeepAlive, TcpConfig, TcpTransmitter, TlsOptions,
    Transmitter,
};
