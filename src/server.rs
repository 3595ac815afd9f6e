//! TCP listener and per-connection handler.
//!
//! The listener binds once and spawns an independent task per accepted
//! connection. Each handler loops: read one frame, dispatch, write exactly
//! one coded response. A zero-length read (peer half-close) or a transport
//! error closes that connection only; other workers and the shared engine
//! are unaffected. The server itself never closes a connection.

use crate::engine::Engine;
use crate::protocol::codes::Reply;
use crate::protocol::framing;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Upper bound on one read, matching the original deployment's receive
/// buffer. A capped read without a newline fails the terminator check and
/// the stream resynchronizes at the next newline.
const RECV_LIMIT: u64 = 1024;

/// A bound listener, not yet serving. Binding and serving are separate so
/// callers can bind to an ephemeral port and discover the assigned address.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let inner = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().context("Listener has no local address")
    }

    /// Accept connections until the task is dropped.
    pub async fn serve(self, engine: Arc<Engine>) -> Result<()> {
        info!(addr = %self.local_addr()?, "server started");
        loop {
            match self.inner.accept().await {
                Ok((stream, peer)) => {
                    info!(%peer, "connection established");
                    let engine = engine.clone();
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, engine).await {
                            debug!(%peer, %err, "connection error");
                        }
                        info!(%peer, "connection closed");
                    });
                }
                Err(err) => {
                    // Transient accept failures must not stop the listener.
                    warn!(%err, "accept failed");
                }
            }
        }
    }
}

/// Bind to `addr` and serve connections until the task is dropped.
pub async fn run(engine: Arc<Engine>, addr: SocketAddr) -> Result<()> {
    Listener::bind(addr).await?.serve(engine).await
}

/// Read loop for one client: AWAITING_DATA → PROCESSING → AWAITING_DATA,
/// until EOF or a transport error transitions to CLOSED.
async fn handle_connection(stream: TcpStream, engine: Arc<Engine>) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut raw = Vec::with_capacity(256);

    loop {
        raw.clear();
        let n = (&mut reader).take(RECV_LIMIT).read_until(b'\n', &mut raw).await?;
        if n == 0 {
            // Peer closed its half of the stream.
            return Ok(());
        }

        let reply = match framing::frame(&raw) {
            Ok(tokens) => engine.dispatch(&tokens).await,
            Err(code) => Reply::failed(code),
        };
        write_half.write_all(&reply.encode()).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::mock_handles;

    async fn start_server() -> SocketAddr {
        let (handles, ..) = mock_handles();
        let engine = Arc::new(Engine::new(handles, true));
        let listener = Listener::bind("127.0.0.1:0".parse().expect("loopback addr"))
            .await
            .expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(listener.serve(engine));
        addr
    }

    async fn send_line(stream: &mut TcpStream, line: &[u8]) -> String {
        stream.write_all(line).await.expect("write request");
        let mut reader = BufReader::new(stream);
        let mut reply = String::new();
        reader.read_line(&mut reply).await.expect("read reply");
        reply
    }

    #[tokio::test]
    async fn each_request_gets_one_coded_response() {
        let addr = start_server().await;
        let mut stream = TcpStream::connect(addr).await.expect("connect");

        let reply = send_line(&mut stream, b"LASER_POWER 50\r\n").await;
        assert_eq!(reply, "00 : Completed without errors\r\n");

        let reply = send_line(&mut stream, b"?LASER_POWER\r\n").await;
        assert_eq!(reply, "50\r\n");
    }

    #[tokio::test]
    async fn framing_errors_answer_without_dispatch() {
        let addr = start_server().await;
        let mut stream = TcpStream::connect(addr).await.expect("connect");

        let reply = send_line(&mut stream, b"LASER_POWER 50\n").await;
        assert!(reply.starts_with("12 : "));
    }

    #[tokio::test]
    async fn disconnect_leaves_other_connections_running() {
        let addr = start_server().await;

        let mut first = TcpStream::connect(addr).await.expect("connect first");
        let second = TcpStream::connect(addr).await.expect("connect second");
        drop(second);

        let reply = send_line(&mut first, b"?INFO_SERVER\r\n").await;
        assert!(reply.contains("laser"));
    }
}
