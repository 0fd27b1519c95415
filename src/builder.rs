//! Builder for a TCP-backed [`AsyncLogger`].
//!
//! Exposes target selection, timeout tuning, TLS configuration, framing,
//! keepalive and throttling parameters. Every knob is optional; unset values
//! fall back to the defaults in [`transport`](crate::transport) and
//! [`pipeline`](crate::pipeline).

use std::time::Duration;

use crate::{
    error::BuildError,
    framing::FramingMethod,
    message::MessageBuilder,
    pipeline::{AsyncLogger, PipelineConfig},
    throttling::{ThrottlingKind, ThrottlingPolicy},
    transport::{CertificateProvider, KeepAlive, TcpConfig, TcpTransmitter, TlsOptions},
};

#[derive(Clone, Default)]
struct TlsConfig {
    domain: Option<String>,
    insecure: bool,
    client_certificate: Option<CertificateProvider>,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("domain", &self.domain)
            .field("insecure", &self.insecure)
            .field("client_certificate", &self.client_certificate.is_some())
            .finish()
    }
}

/// Overrides for the TCP keepalive schedule.
#[derive(Clone, Debug, Default)]
pub struct KeepAliveOverrides {
    enabled: Option<bool>,
    time_ms: Option<u64>,
    interval_ms: Option<u64>,
    retries: Option<u32>,
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(BuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

impl KeepAliveOverrides {
    /// Create overrides with no custom values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn keepalive probes on or off.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Override the idle time before the first probe in milliseconds.
    pub fn with_time_ms(mut self, time_ms: u64) -> Self {
        self.time_ms = Some(time_ms);
        self
    }

    /// Override the interval between probes in milliseconds.
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = Some(interval_ms);
        self
    }

    /// Override the number of unanswered probes tolerated.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    fn apply(&self, keepalive: &mut Option<KeepAlive>) -> Result<(), BuildError> {
        if self.enabled == Some(false) {
            *keepalive = None;
            return Ok(());
        }
        let mut schedule = keepalive.unwrap_or_default();
        if let Some(time) = self.time_ms {
            ensure_positive!(time, "keepalive_time_ms")?;
            schedule.time = Duration::from_millis(time);
        }
        if let Some(interval) = self.interval_ms {
            ensure_positive!(interval, "keepalive_interval_ms")?;
            schedule.interval = Duration::from_millis(interval);
        }
        if let Some(retries) = self.retries {
            ensure_positive!(retries, "keepalive_retries")?;
            schedule.retries = retries;
        }
        *keepalive = Some(schedule);
        Ok(())
    }
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`AsyncLogger`] instances that ship records to a
/// syslog collector over TCP.
#[derive(Clone, Debug, Default)]
pub struct SyslogTargetBuilder {
    target: Option<(String, u16)>,
    tls: Option<TlsConfig>,
    framing: Option<FramingMethod>,
    chunk_size: Option<usize>,
    connect_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    reconnect_interval_ms: Option<u64>,
    connection_check_timeout_ms: Option<u64>,
    keepalive: KeepAliveOverrides,
    max_message_length: Option<usize>,
    throttling: Option<ThrottlingKind>,
    throttling_limit: Option<usize>,
    throttling_timeout_ms: Option<u64>,
    warn_interval_ms: Option<u64>,
}

impl SyslogTargetBuilder {
    /// Create a new builder with no target configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send to the collector at `host:port`.
    pub fn with_tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.target = Some((host.into(), port));
        self
    }

    /// Enable TLS. `domain` defaults to the target host.
    pub fn with_tls(mut self, domain: Option<String>, insecure: bool) -> Self {
        let client_certificate = self.tls.take().and_then(|tls| tls.client_certificate);
        self.tls = Some(TlsConfig {
            domain,
            insecure,
            client_certificate,
        });
        self
    }

    /// Present a client certificate during the handshake. Enables TLS if it
    /// was not already enabled.
    pub fn with_client_certificate(mut self, provider: CertificateProvider) -> Self {
        let mut tls = self.tls.take().unwrap_or_default();
        tls.client_certificate = Some(provider);
        self.tls = Some(tls);
        self
    }

    /// Select the admission policy applied to producers.
    pub fn with_throttling(mut self, kind: ThrottlingKind, limit: usize) -> Self {
        self.throttling = Some(kind);
        self.throttling_limit = Some(limit);
        self
    }

    option_setter!(
        #[doc = "Select the wire framing."]
        with_framing,
        framing,
        FramingMethod
    );
    option_setter!(
        #[doc = "Set the size of each socket write."]
        with_chunk_size,
        chunk_size,
        usize
    );
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_write_timeout_ms, write_timeout_ms, u64);
    option_setter!(with_reconnect_interval_ms, reconnect_interval_ms, u64);
    option_setter!(
        #[doc = "Bound the readiness probe; zero polls without waiting."]
        with_connection_check_timeout_ms,
        connection_check_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Truncate rendered messages to this many bytes; zero disables truncation."]
        with_max_message_length,
        max_message_length,
        usize
    );
    option_setter!(
        #[doc = "How long the block policy waits for queue space."]
        with_throttling_timeout_ms,
        throttling_timeout_ms,
        u64
    );
    option_setter!(with_warn_interval_ms, warn_interval_ms, u64);

    /// Override keepalive settings using the provided overrides.
    pub fn with_keepalive(mut self, overrides: KeepAliveOverrides) -> Self {
        self.keepalive = overrides;
        self
    }

    fn validate(&self) -> Result<(), BuildError> {
        self.validate_target()?;
        self.validate_timeouts()?;
        self.validate_throttling()?;
        if let Some(size) = self.chunk_size {
            ensure_positive!(size, "chunk_size")?;
        }
        Ok(())
    }

    fn validate_target(&self) -> Result<(), BuildError> {
        match &self.target {
            None => Err(BuildError::InvalidConfig(
                "syslog target requires a tcp host and port".into(),
            )),
            Some((host, _)) if host.trim().is_empty() => Err(BuildError::InvalidConfig(
                "tcp host must not be empty".into(),
            )),
            Some((_, port)) => {
                ensure_positive!(*port, "port")?;
                Ok(())
            }
        }
    }

    fn validate_timeouts(&self) -> Result<(), BuildError> {
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.write_timeout_ms {
            ensure_positive!(timeout, "write_timeout_ms")?;
        }
        if let Some(interval) = self.warn_interval_ms {
            ensure_positive!(interval, "warn_interval_ms")?;
        }
        Ok(())
    }

    fn validate_throttling(&self) -> Result<(), BuildError> {
        let kind = self.throttling.unwrap_or_default();
        if kind != ThrottlingKind::None
            && let Some(limit) = self.throttling_limit
        {
            ensure_positive!(limit, "throttling_limit")?;
        }
        if kind == ThrottlingKind::Block
            && let Some(timeout) = self.throttling_timeout_ms
        {
            ensure_positive!(timeout, "throttling_timeout_ms")?;
        }
        Ok(())
    }

    /// Validate the builder and produce the typed configuration.
    pub fn build_config(&self) -> Result<(PipelineConfig, TcpConfig), BuildError> {
        self.validate()?;
        Ok((self.pipeline_config(), self.tcp_config()?))
    }

    fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        let defaults = config.throttling;
        config.throttling = ThrottlingPolicy::new(
            self.throttling.unwrap_or(defaults.kind()),
            self.throttling_limit.unwrap_or(defaults.limit()),
            self.throttling_timeout_ms
                .map_or(defaults.timeout(), Duration::from_millis),
        );
        if let Some(max) = self.max_message_length {
            config.max_message_length = max;
        }
        if let Some(interval) = self.warn_interval_ms {
            config.warn_interval = Duration::from_millis(interval);
        }
        config
    }

    fn tcp_config(&self) -> Result<TcpConfig, BuildError> {
        let Some((host, port)) = &self.target else {
            return Err(BuildError::InvalidConfig(
                "syslog target requires a tcp host and port".into(),
            ));
        };
        let mut config = TcpConfig::new(host.clone(), *port);
        if let Some(framing) = self.framing {
            config.framing = framing;
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if let Some(timeout) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(timeout);
        }
        if let Some(timeout) = self.write_timeout_ms {
            config.write_timeout = Duration::from_millis(timeout);
        }
        if let Some(interval) = self.reconnect_interval_ms {
            config.reconnect_interval = Duration::from_millis(interval);
        }
        if let Some(timeout) = self.connection_check_timeout_ms {
            config.connection_check_timeout = Duration::from_millis(timeout);
        }
        self.keepalive.apply(&mut config.keepalive)?;
        config.tls = self.build_tls_options(host);
        Ok(config)
    }

    fn build_tls_options(&self, host: &str) -> Option<TlsOptions> {
        self.tls.as_ref().map(|tls_cfg| {
            let domain = tls_cfg
                .domain
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| host.to_owned());
            TlsOptions {
                domain,
                insecure_skip_verify: tls_cfg.insecure,
                client_certificate: tls_cfg.client_certificate.clone(),
            }
        })
    }

    /// Start the pipeline, rendering records with `builder`.
    pub fn build<R, B>(&self, builder: B) -> Result<AsyncLogger<R>, BuildError>
    where
        R: Send + 'static,
        B: MessageBuilder<R>,
    {
        let (pipeline, tcp) = self.build_config()?;
        let reconnect_interval = tcp.reconnect_interval;
        AsyncLogger::new(
            pipeline,
            builder,
            TcpTransmitter::new(tcp),
            reconnect_interval,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::{io, sync::Arc};

    use rstest::rstest;

    use super::*;
    use crate::message::DisplayBuilder;

    fn base() -> SyslogTargetBuilder {
        SyslogTargetBuilder::new().with_tcp("logs.example.com", 6514)
    }

    #[rstest]
    fn builder_requires_target() {
        let err = SyslogTargetBuilder::new()
            .build_config()
            .expect_err("target must be required");
        assert!(matches!(err, BuildError::InvalidConfig(msg) if msg.contains("host")));
    }

    #[rstest]
    #[case(SyslogTargetBuilder::new().with_tcp("  ", 514), "host")]
    #[case(SyslogTargetBuilder::new().with_tcp("localhost", 0), "port")]
    #[case(base().with_chunk_size(0), "chunk_size")]
    #[case(base().with_connect_timeout_ms(0), "connect_timeout_ms")]
    #[case(base().with_write_timeout_ms(0), "write_timeout_ms")]
    #[case(base().with_throttling(ThrottlingKind::Discard, 0), "throttling_limit")]
    #[case(
        base().with_throttling(ThrottlingKind::Block, 4).with_throttling_timeout_ms(0),
        "throttling_timeout_ms"
    )]
    #[case(
        base().with_keepalive(KeepAliveOverrides::new().with_retries(0)),
        "keepalive_retries"
    )]
    fn builder_rejects_invalid_values(#[case] builder: SyslogTargetBuilder, #[case] field: &str) {
        let err = builder.build_config().expect_err("configuration must fail");
        assert!(
            matches!(&err, BuildError::InvalidConfig(msg) if msg.contains(field)),
            "unexpected error: {err}"
        );
    }

    #[rstest]
    fn none_policy_accepts_zero_limit() {
        let (pipeline, _) = base()
            .with_throttling(ThrottlingKind::None, 0)
            .build_config()
            .expect("none ignores the limit");
        assert_eq!(pipeline.throttling.kind(), ThrottlingKind::None);
        assert_eq!(pipeline.throttling.bounded_capacity(), None);
    }

    #[rstest]
    fn overrides_flow_into_config() {
        let (pipeline, tcp) = base()
            .with_framing(FramingMethod::NonTransparent)
            .with_chunk_size(512)
            .with_reconnect_interval_ms(250)
            .with_connection_check_timeout_ms(20)
            .with_max_message_length(2048)
            .with_throttling(ThrottlingKind::Block, 64)
            .with_throttling_timeout_ms(75)
            .with_keepalive(KeepAliveOverrides::new().with_time_ms(3_000).with_retries(3))
            .build_config()
            .expect("valid configuration");

        assert_eq!(tcp.host, "logs.example.com");
        assert_eq!(tcp.port, 6514);
        assert_eq!(tcp.framing, FramingMethod::NonTransparent);
        assert_eq!(tcp.chunk_size, 512);
        assert_eq!(tcp.reconnect_interval, Duration::from_millis(250));
        assert_eq!(tcp.connection_check_timeout, Duration::from_millis(20));
        let keepalive = tcp.keepalive.expect("keepalive enabled");
        assert_eq!(keepalive.time, Duration::from_secs(3));
        assert_eq!(keepalive.retries, 3);
        assert_eq!(pipeline.max_message_length, 2048);
        assert_eq!(
            pipeline.throttling,
            ThrottlingPolicy::block(64, Duration::from_millis(75))
        );
    }

    #[rstest]
    fn keepalive_can_be_disabled() {
        let (_, tcp) = base()
            .with_keepalive(KeepAliveOverrides::new().with_enabled(false))
            .build_config()
            .expect("valid configuration");
        assert!(tcp.keepalive.is_none());
    }

    #[rstest]
    #[case(None, "logs.example.com")]
    #[case(Some("  ".to_string()), "logs.example.com")]
    #[case(Some("collector.internal".to_string()), "collector.internal")]
    fn tls_domain_defaults_to_host(#[case] domain: Option<String>, #[case] expected: &str) {
        let (_, tcp) = base()
            .with_tls(domain, false)
            .build_config()
            .expect("valid configuration");
        assert_eq!(tcp.tls.expect("tls enabled").domain, expected);
    }

    #[rstest]
    fn client_certificate_survives_tls_override() {
        let provider: CertificateProvider = Arc::new(|| -> io::Result<_> { Ok(None) });
        let (_, tcp) = base()
            .with_client_certificate(provider)
            .with_tls(None, true)
            .build_config()
            .expect("valid configuration");
        let tls = tcp.tls.expect("tls enabled");
        assert!(tls.client_certificate.is_some());
        assert!(tls.insecure_skip_verify);
    }

    #[rstest]
    fn build_starts_a_pipeline() {
        let logger = base()
            .with_throttling(ThrottlingKind::None, 0)
            .build::<String, _>(DisplayBuilder)
            .expect("pipeline starts");
        assert_eq!(logger.queue_depth(), 0);
        logger.close();
        assert!(logger.is_closed());
    }
}
