//! In-process syslog collector for integration tests.
//!
//! Accepts TCP connections one at a time, decodes frames with
//! [`FrameDecoder`] and forwards each payload over a channel so tests can
//! assert on exactly what reached the wire.

use std::{
    io::Read,
    net::{SocketAddr, TcpListener, TcpStream},
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use syslog_relay::{FrameDecoder, FramingMethod};

pub struct Collector {
    pub addr: SocketAddr,
    frames: Receiver<String>,
    closed: Receiver<()>,
}

impl Collector {
    /// Next decoded payload, or `None` if nothing arrives within `timeout`.
    pub fn next_frame(&self, timeout: Duration) -> Option<String> {
        self.frames.recv_timeout(timeout).ok()
    }

    /// Wait until the collector has dropped a connection on purpose.
    #[allow(dead_code)]
    pub fn wait_closed(&self, timeout: Duration) -> bool {
        self.closed.recv_timeout(timeout).is_ok()
    }
}

/// Start a collector on an ephemeral port.
///
/// When `close_after` is set, the first connection is closed once that many
/// frames have been read. Later connections stay open.
pub fn spawn_collector(framing: FramingMethod, close_after: Option<usize>) -> Collector {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind collector");
    let addr = listener.local_addr().expect("collector address");
    let (frame_tx, frames) = unbounded();
    let (closed_tx, closed) = unbounded();
    thread::spawn(move || {
        let mut limit = close_after;
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let closed_early = serve(stream, framing, limit.take(), &frame_tx);
            if closed_early {
                let _ = closed_tx.send(());
            }
        }
    });
    Collector {
        addr,
        frames,
        closed,
    }
}

/// Read frames until EOF or until `limit` frames were read. Returns true
/// when the limit closed the connection.
fn serve(
    mut stream: TcpStream,
    framing: FramingMethod,
    limit: Option<usize>,
    frames: &Sender<String>,
) -> bool {
    let mut decoder = FrameDecoder::new(framing, 0);
    let mut received = 0;
    let mut buf = [0_u8; 1024];
    loop {
        let Ok(n) = stream.read(&mut buf) else {
            return false;
        };
        if n == 0 {
            return false;
        }
        decoder.extend(&buf[..n]);
        while let Ok(Some(frame)) = decoder.next_frame() {
            let _ = frames.send(String::from_utf8_lossy(&frame).into_owned());
            received += 1;
            if limit.is_some_and(|limit| received >= limit) {
                return true;
            }
        }
    }
}
