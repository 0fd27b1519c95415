//! Deserialisable target settings.
//!
//! [`TargetSettings`] mirrors [`SyslogTargetBuilder`] with plain integer
//! millisecond fields, so a target can be described in any serde format and
//! converted into a builder. Validation happens when the builder is built.

use serde::Deserialize;

use crate::{
    builder::{KeepAliveOverrides, SyslogTargetBuilder},
    framing::FramingMethod,
    throttling::{DEFAULT_THROTTLING_LIMIT, ThrottlingKind},
    transport::{DEFAULT_TCP_PORT, DEFAULT_TLS_PORT},
};

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TlsSettings {
    /// Server name checked against the certificate; defaults to the host.
    pub domain: Option<String>,
    pub insecure: bool,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct KeepAliveSettings {
    pub enabled: Option<bool>,
    pub time_ms: Option<u64>,
    pub interval_ms: Option<u64>,
    pub retries: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ThrottlingSettings {
    pub kind: ThrottlingKind,
    pub limit: Option<usize>,
    /// Only consulted by the block policy.
    pub timeout_ms: Option<u64>,
}

/// Complete description of a syslog target.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSettings {
    pub host: String,
    /// Defaults to 6514 with TLS and 514 without.
    pub port: Option<u16>,
    pub tls: Option<TlsSettings>,
    pub framing: FramingMethod,
    pub chunk_size: Option<usize>,
    pub connect_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub reconnect_interval_ms: Option<u64>,
    pub connection_check_timeout_ms: Option<u64>,
    pub keepalive: Option<KeepAliveSettings>,
    pub max_message_length: Option<usize>,
    pub throttling: Option<ThrottlingSettings>,
    pub warn_interval_ms: Option<u64>,
}

impl TargetSettings {
    /// Port the target resolves to once defaults are applied.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.tls.is_some() {
            DEFAULT_TLS_PORT
        } else {
            DEFAULT_TCP_PORT
        })
    }

    pub fn to_builder(&self) -> SyslogTargetBuilder {
        let mut builder = SyslogTargetBuilder::new()
            .with_tcp(self.host.clone(), self.effective_port())
            .with_framing(self.framing);
        if let Some(tls) = &self.tls {
            builder = builder.with_tls(tls.domain.clone(), tls.insecure);
        }
        if let Some(size) = self.chunk_size {
            builder = builder.with_chunk_size(size);
        }
        if let Some(ms) = self.connect_timeout_ms {
            builder = builder.with_connect_timeout_ms(ms);
        }
        if let Some(ms) = self.write_timeout_ms {
            builder = builder.with_write_timeout_ms(ms);
        }
        if let Some(ms) = self.reconnect_interval_ms {
            builder = builder.with_reconnect_interval_ms(ms);
        }
        if let Some(ms) = self.connection_check_timeout_ms {
            builder = builder.with_connection_check_timeout_ms(ms);
        }
        if let Some(keepalive) = &self.keepalive {
            builder = builder.with_keepalive(keepalive.to_overrides());
        }
        if let Some(max) = self.max_message_length {
            builder = builder.with_max_message_length(max);
        }
        if let Some(throttling) = &self.throttling {
            builder = builder.with_throttling(
                throttling.kind,
                throttling.limit.unwrap_or(DEFAULT_THROTTLING_LIMIT),
            );
            if let Some(ms) = throttling.timeout_ms {
                builder = builder.with_throttling_timeout_ms(ms);
            }
        }
        if let Some(ms) = self.warn_interval_ms {
            builder = builder.with_warn_interval_ms(ms);
        }
        builder
    }
}

impl KeepAliveSettings {
    fn to_overrides(&self) -> KeepAliveOverrides {
        let mut overrides = KeepAliveOverrides::new();
        if let Some(enabled) = self.enabled {
            overrides = overrides.with_enabled(enabled);
        }
        if let Some(ms) = self.time_ms {
            overrides = overrides.with_time_ms(ms);
        }
        if let Some(ms) = self.interval_ms {
            overrides = overrides.with_interval_ms(ms);
        }
        if let Some(retries) = self.retries {
            overrides = overrides.with_retries(retries);
        }
        overrides
    }
}

impl From<&TargetSettings> for SyslogTargetBuilder {
    fn from(settings: &TargetSettings) -> Self {
        settings.to_builder()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{error::BuildError, throttling::ThrottlingPolicy};

    fn parse(value: serde_json::Value) -> TargetSettings {
        serde_json::from_value(value).expect("settings must deserialise")
    }

    #[rstest]
    #[case(json!({"host": "collector"}), 514)]
    #[case(json!({"host": "collector", "tls": {}}), 6514)]
    #[case(json!({"host": "collector", "tls": {}, "port": 1514}), 1514)]
    fn port_defaults_follow_tls(#[case] value: serde_json::Value, #[case] expected: u16) {
        assert_eq!(parse(value).effective_port(), expected);
    }

    #[rstest]
    fn full_document_maps_onto_config() {
        let settings = parse(json!({
            "host": "collector",
            "tls": {"domain": "syslog.internal", "insecure": true},
            "framing": "non_transparent",
            "chunk_size": 1024,
            "connect_timeout_ms": 1500,
            "reconnect_interval_ms": 100,
            "keepalive": {"time_ms": 2000, "retries": 4},
            "max_message_length": 8192,
            "throttling": {"kind": "block", "limit": 16, "timeout_ms": 250},
            "warn_interval_ms": 1000
        }));
        let (pipeline, tcp) = SyslogTargetBuilder::from(&settings)
            .build_config()
            .expect("valid settings");

        assert_eq!(tcp.port, 6514);
        assert_eq!(tcp.framing, FramingMethod::NonTransparent);
        assert_eq!(tcp.chunk_size, 1024);
        assert_eq!(tcp.connect_timeout, Duration::from_millis(1500));
        assert_eq!(tcp.reconnect_interval, Duration::from_millis(100));
        let keepalive = tcp.keepalive.expect("keepalive enabled");
        assert_eq!(keepalive.time, Duration::from_secs(2));
        assert_eq!(keepalive.retries, 4);
        let tls = tcp.tls.expect("tls enabled");
        assert_eq!(tls.domain, "syslog.internal");
        assert!(tls.insecure_skip_verify);
        assert_eq!(pipeline.max_message_length, 8192);
        assert_eq!(
            pipeline.throttling,
            ThrottlingPolicy::block(16, Duration::from_millis(250))
        );
        assert_eq!(pipeline.warn_interval, Duration::from_secs(1));
    }

    #[rstest]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_value::<TargetSettings>(json!({"host": "h", "proto": "udp"}))
            .expect_err("unknown field must fail");
        assert!(err.to_string().contains("proto"));
    }

    #[rstest]
    fn invalid_values_surface_at_build_time() {
        let settings = parse(json!({"host": "collector", "chunk_size": 0}));
        let err = settings.to_builder().build_config().expect_err("must fail");
        assert!(matches!(err, BuildError::InvalidConfig(msg) if msg.contains("chunk_size")));
    }

    #[rstest]
    fn missing_host_is_rejected() {
        let err = TargetSettings::default()
            .to_builder()
            .build_config()
            .expect_err("host is required");
        assert!(matches!(err, BuildError::InvalidConfig(msg) if msg.contains("host")));
    }
}
