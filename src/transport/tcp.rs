//! TCP transmitter with optional TLS.

use std::{
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::{debug, warn};
use native_tls::TlsStream;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::{byte_array::ByteArray, cancellation::CancellationToken, framing::FramingMethod};

use super::{ConnectionState, Transmitter, config::TcpConfig};

/// Active socket connection.
enum ActiveConnection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ActiveConnection {
    fn tcp(&self) -> &TcpStream {
        match self {
            ActiveConnection::Plain(stream) => stream,
            ActiveConnection::Tls(stream) => stream.get_ref(),
        }
    }

    fn close(self) {
        match self {
            // The TLS stream owns the socket; shutting it down and dropping
            // it closes the descriptor once.
            ActiveConnection::Tls(mut stream) => {
                let _ = stream.shutdown();
            }
            ActiveConnection::Plain(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
    }
}

impl Write for ActiveConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ActiveConnection::Plain(stream) => stream.write(buf),
            ActiveConnection::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ActiveConnection::Plain(stream) => stream.flush(),
            ActiveConnection::Tls(stream) => stream.flush(),
        }
    }
}

/// [`Transmitter`] speaking syslog over a TCP stream.
pub struct TcpTransmitter {
    config: TcpConfig,
    connection: Option<ActiveConnection>,
    state: ConnectionState,
}

impl TcpTransmitter {
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            connection: None,
            state: ConnectionState::Unconnected,
        }
    }

    #[cfg(test)]
    pub(super) fn stream(&self) -> Option<&TcpStream> {
        self.connection.as_ref().map(ActiveConnection::tcp)
    }

    fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map(|iter| iter.collect())
    }

    pub(super) fn open_socket(&self, addr: &SocketAddr) -> io::Result<Socket> {
        let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
        // Keep SO_REUSEADDR off. This is the Unix default; exclusive use proper
        // needs SO_EXCLUSIVEADDRUSE, which only Windows offers.
        socket.set_reuse_address(false)?;
        socket.set_linger(None)?;
        if let Some(keepalive) = self.config.keepalive {
            socket.set_tcp_keepalive(&keepalive.to_socket2())?;
        }
        Ok(socket)
    }

    fn connect_tcp(&self) -> io::Result<TcpStream> {
        let addrs = self.socket_addrs()?;
        let mut last_err = None;
        for addr in addrs {
            let attempt = self.open_socket(&addr).and_then(|socket| {
                socket.connect_timeout(&SockAddr::from(addr), self.config.connect_timeout)?;
                Ok(socket)
            });
            match attempt {
                Ok(socket) => {
                    let stream = TcpStream::from(socket);
                    stream.set_nonblocking(false)?;
                    stream.set_write_timeout(Some(self.config.write_timeout))?;
                    return Ok(stream);
                }
                Err(err) => {
                    debug!("connect to {addr} failed: {err}");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "no addresses resolved for {}:{}",
                    self.config.host, self.config.port
                ),
            )
        }))
    }

    fn connect(&self) -> io::Result<ActiveConnection> {
        let stream = self.connect_tcp()?;
        match &self.config.tls {
            Some(tls) => {
                let stream = tls.handshake(stream, self.config.connect_timeout)?;
                stream
                    .get_ref()
                    .set_write_timeout(Some(self.config.write_timeout))?;
                Ok(ActiveConnection::Tls(Box::new(stream)))
            }
            None => Ok(ActiveConnection::Plain(stream)),
        }
    }
}

impl Transmitter for TcpTransmitter {
    fn setup(&mut self) -> io::Result<()> {
        self.tear_down();
        self.state = ConnectionState::Connecting;
        match self.connect() {
            Ok(connection) => {
                debug!(
                    "connected to syslog collector at {}:{}",
                    self.config.host, self.config.port
                );
                self.connection = Some(connection);
                self.state = ConnectionState::Ready;
                Ok(())
            }
            Err(err) => {
                warn!(
                    "connecting to syslog collector at {}:{} failed: {err}",
                    self.config.host, self.config.port
                );
                self.state = ConnectionState::Faulted;
                Err(err)
            }
        }
    }

    fn is_ready(&mut self) -> bool {
        let alive = match (&self.connection, self.state) {
            (Some(connection), ConnectionState::Ready) => {
                probe_alive(connection.tcp(), self.config.connection_check_timeout)
            }
            _ => false,
        };
        if !alive && self.connection.is_some() {
            self.state = ConnectionState::Faulted;
        }
        alive
    }

    fn send(&mut self, message: &mut ByteArray, cancel: &CancellationToken) -> io::Result<()> {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let Some(connection) = self.connection.as_mut() else {
            self.state = ConnectionState::Faulted;
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "syslog transport is not connected",
            ));
        };
        let result = write_framed(
            connection,
            self.config.framing,
            self.config.chunk_size,
            message,
            cancel,
        );
        if result.is_err() {
            self.state = ConnectionState::Faulted;
        }
        result
    }

    fn tear_down(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.state = ConnectionState::Unconnected;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

impl Drop for TcpTransmitter {
    fn drop(&mut self) {
        self.tear_down();
    }
}

impl std::fmt::Debug for TcpTransmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransmitter")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("state", &self.state)
            .finish()
    }
}

/// Peek at the socket to tell a live idle connection from a dead one.
///
/// A zero `timeout` polls without blocking.
fn probe_alive(stream: &TcpStream, timeout: Duration) -> bool {
    let mut byte = [0u8; 1];
    let outcome = if timeout.is_zero() {
        stream
            .set_nonblocking(true)
            .and_then(|()| stream.peek(&mut byte))
    } else {
        stream
            .set_read_timeout(Some(timeout))
            .and_then(|()| stream.peek(&mut byte))
    };
    let restored = if timeout.is_zero() {
        stream.set_nonblocking(false)
    } else {
        stream.set_read_timeout(None)
    };
    if restored.is_err() {
        return false;
    }
    match outcome {
        // Orderly shutdown by the peer.
        Ok(0) => false,
        Ok(_) => true,
        Err(err) => matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
        ),
    }
}

/// Write the framing prefix, then the message in chunks.
pub(crate) fn write_framed<W: Write>(
    writer: &mut W,
    framing: FramingMethod,
    chunk_size: usize,
    message: &mut ByteArray,
    cancel: &CancellationToken,
) -> io::Result<()> {
    if cancel.is_cancelled() {
        return Ok(());
    }
    if let Some(prefix) = framing.prefix(message.len()) {
        writer.write_all(&prefix)?;
    }
    if let Some(trailer) = framing.trailer() {
        message.push_trailer(trailer);
    }
    write_chunked(writer, message.as_slice(), chunk_size, cancel)?;
    writer.flush()
}

/// Write `bytes` as sequential `chunk_size` writes, the last one carrying
/// the remainder. Stops quietly when cancelled between chunks.
pub(crate) fn write_chunked<W: Write>(
    writer: &mut W,
    bytes: &[u8],
    chunk_size: usize,
    cancel: &CancellationToken,
) -> io::Result<()> {
    let chunk_size = chunk_size.max(1);
    let mut offset = 0;
    while bytes.len() - offset > chunk_size {
        if cancel.is_cancelled() {
            return Ok(());
        }
        writer.write_all(&bytes[offset..offset + chunk_size])?;
        offset += chunk_size;
    }
    if cancel.is_cancelled() {
        return Ok(());
    }
    writer.write_all(&bytes[offset..])
}
