//! TLS options for the TCP transmitter.

use std::{fmt, io, net::TcpStream, sync::Arc, time::Duration};

use native_tls::{Identity, Protocol, TlsConnector, TlsStream};

/// Supplies the client identity presented during the handshake.
///
/// Called on every connection attempt so certificates can be rotated
/// without rebuilding the pipeline. Returning `Ok(None)` connects without a
/// client certificate.
pub type CertificateProvider = Arc<dyn Fn() -> io::Result<Option<Identity>> + Send + Sync>;

/// Oldest protocol version the transmitter will negotiate.
pub const MIN_PROTOCOL_VERSION: Protocol = Protocol::Tlsv12;

/// TLS connection options.
#[derive(Clone)]
pub struct TlsOptions {
    /// Domain name presented during the TLS handshake.
    pub domain: String,
    /// Skip certificate validation when true (intended for tests).
    pub insecure_skip_verify: bool,
    /// Optional client certificate source for mutual authentication.
    pub client_certificate: Option<CertificateProvider>,
}

impl TlsOptions {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            insecure_skip_verify: false,
            client_certificate: None,
        }
    }

    pub fn with_client_certificate(mut self, provider: CertificateProvider) -> Self {
        self.client_certificate = Some(provider);
        self
    }

    pub fn insecure(mut self, skip_verify: bool) -> Self {
        self.insecure_skip_verify = skip_verify;
        self
    }

    fn connector(&self) -> io::Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        builder.min_protocol_version(Some(MIN_PROTOCOL_VERSION));
        if let Some(provider) = &self.client_certificate
            && let Some(identity) = provider()?
        {
            builder.identity(identity);
        }
        if self.insecure_skip_verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(io::Error::other)
    }

    /// Run the client handshake over `stream`, bounded by `timeout`.
    pub(crate) fn handshake(
        &self,
        stream: TcpStream,
        timeout: Duration,
    ) -> io::Result<TlsStream<TcpStream>> {
        let connector = self.connector()?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        let stream = connector
            .connect(&self.domain, stream)
            .map_err(io::Error::other)?;
        stream.get_ref().set_read_timeout(None)?;
        Ok(stream)
    }
}

impl fmt::Debug for TlsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsOptions")
            .field("domain", &self.domain)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("client_certificate", &self.client_certificate.is_some())
            .finish()
    }
}
