//! Typed configuration consumed by [`TcpTransmitter`](super::TcpTransmitter).
//!
//! [`SyslogTargetBuilder`](crate::builder::SyslogTargetBuilder) validates and
//! assembles these values.

use std::time::Duration;

use crate::framing::FramingMethod;

use super::tls::TlsOptions;

/// Default syslog port for plain TCP.
pub const DEFAULT_TCP_PORT: u16 = 514;
/// Default syslog port for TLS (RFC 5425).
pub const DEFAULT_TLS_PORT: u16 = 6514;
/// Default connection timeout applied when establishing sockets.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default write timeout applied to socket writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default minimum delay between connection attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(500);
/// Default readiness probe timeout. Zero polls without waiting.
pub const DEFAULT_CONNECTION_CHECK_TIMEOUT: Duration = Duration::ZERO;
/// Default size of each socket write.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;
/// Default idle time before the first keepalive probe.
pub const DEFAULT_KEEPALIVE_TIME: Duration = Duration::from_secs(10);
/// Default interval between keepalive probes.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);
/// Default number of unanswered probes before the peer is declared dead.
pub const DEFAULT_KEEPALIVE_RETRIES: u32 = 10;

/// TCP keepalive probe schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepAlive {
    pub time: Duration,
    pub interval: Duration,
    pub retries: u32,
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self {
            time: DEFAULT_KEEPALIVE_TIME,
            interval: DEFAULT_KEEPALIVE_INTERVAL,
            retries: DEFAULT_KEEPALIVE_RETRIES,
        }
    }
}

impl KeepAlive {
    pub(crate) fn to_socket2(self) -> socket2::TcpKeepalive {
        let keepalive = socket2::TcpKeepalive::new().with_time(self.time);
        #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "freebsd"
        ))]
        let keepalive = keepalive
            .with_interval(self.interval)
            .with_retries(self.retries);
        keepalive
    }
}

/// Everything the TCP transmitter needs to reach the collector.
#[derive(Clone, Debug)]
pub struct TcpConfig {
    /// Hostname or IP address of the collector.
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    /// Minimum delay between two connection attempts.
    pub reconnect_interval: Duration,
    /// Upper bound on the readiness probe.
    pub connection_check_timeout: Duration,
    /// `None` leaves keepalive disabled.
    pub keepalive: Option<KeepAlive>,
    pub tls: Option<TlsOptions>,
    pub framing: FramingMethod,
    /// Size of each socket write.
    pub chunk_size: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_TCP_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            connection_check_timeout: DEFAULT_CONNECTION_CHECK_TIMEOUT,
            keepalive: Some(KeepAlive::default()),
            tls: None,
            framing: FramingMethod::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl TcpConfig {
    /// Target `host:port` with default settings.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_framing(mut self, framing: FramingMethod) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }
}
