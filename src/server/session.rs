//! Per-connection chat session.
//!
//! Each connection gets two tasks: the session's read loop, and a writer
//! that drains the connection's outbound queue onto the socket. Only the
//! read loop ending (EOF, read error, or an oversized line) removes the
//! connection from the registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::input::{Line, LineReader};
use crate::chat::{notice, CommandDispatcher, ConnectionHandle, ConnectionId, Outbound, Registry};
use crate::config::ServerConfig;
use crate::{HuddleError, Result};

/// Per-connection resource limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Maximum line length in bytes, terminator included.
    pub max_line_bytes: usize,
    /// Outbound queue capacity in lines.
    pub outbound_queue: usize,
    /// Timeout for one socket write.
    pub write_timeout: Duration,
    /// Time allowed for the display-name handshake.
    pub handshake_timeout: Duration,
}

impl From<&ServerConfig> for SessionLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_line_bytes: config.max_line_bytes.max(1),
            outbound_queue: config.outbound_queue.max(1),
            write_timeout: config.write_timeout(),
            handshake_timeout: config.handshake_timeout(),
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// State shared by every session of one server.
#[derive(Clone)]
pub struct ChatSession {
    dispatcher: CommandDispatcher,
    limits: SessionLimits,
}

impl ChatSession {
    /// Create session state from a dispatcher and limits.
    pub fn new(dispatcher: CommandDispatcher, limits: SessionLimits) -> Self {
        Self { dispatcher, limits }
    }

    /// Get the command dispatcher.
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    fn registry(&self) -> &Arc<Registry> {
        self.dispatcher.registry()
    }

    /// Serve one connection until it closes.
    ///
    /// Returns an error if the handshake fails, in which case nothing was
    /// registered, or if the read loop ended on an error, in which case the
    /// connection has already been removed and its departure announced.
    pub async fn serve<S>(&self, stream: S, peer_addr: SocketAddr) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = LineReader::new(BufReader::new(read_half), self.limits.max_line_bytes);

        let display_name = timeout(self.limits.handshake_timeout, reader.read_display_name())
            .await
            .map_err(|_| {
                HuddleError::Handshake(format!(
                    "no display name within {:?}",
                    self.limits.handshake_timeout
                ))
            })??;

        let (tx, rx) = mpsc::channel::<Outbound>(self.limits.outbound_queue);
        let writer = tokio::spawn(write_loop(
            write_half,
            rx,
            peer_addr,
            self.limits.write_timeout,
        ));

        let id = self
            .registry()
            .register(ConnectionHandle::new(peer_addr, tx), &display_name)
            .await;
        info!("New connection: {} | {} ({})", display_name, peer_addr, id);
        self.registry()
            .broadcast_text(Some(id), &notice::joined(&display_name))
            .await;

        let result = self.read_loop(&mut reader, id, &display_name, peer_addr).await;

        self.close(id, peer_addr).await;
        // The queue closes once the registry entry is gone; let the writer
        // flush what was already queued.
        let _ = writer.await;

        result
    }

    async fn read_loop<R>(
        &self,
        reader: &mut LineReader<R>,
        id: ConnectionId,
        display_name: &str,
        peer_addr: SocketAddr,
    ) -> Result<()>
    where
        R: tokio::io::AsyncBufRead + Unpin,
    {
        loop {
            match reader.next_line().await? {
                Some(line) => self.handle_line(id, display_name, peer_addr, &line).await,
                None => {
                    debug!("{} closed the connection", peer_addr);
                    return Ok(());
                }
            }
        }
    }

    /// Relay a line, then dispatch any command it carries.
    async fn handle_line(
        &self,
        id: ConnectionId,
        display_name: &str,
        peer_addr: SocketAddr,
        line: &Line,
    ) {
        let text = line.text();
        debug!("{} | {}", text, peer_addr);

        if line.is_terminated() {
            self.registry().broadcast(Some(id), line.raw()).await;
        } else {
            // A fragment cut off by EOF still goes out as a whole line.
            let mut raw = line.raw().to_vec();
            raw.push(b'\n');
            self.registry().broadcast(Some(id), &raw).await;
        }
        self.dispatcher.dispatch(display_name, &text);
    }

    /// Remove the connection and announce the departure, once.
    async fn close(&self, id: ConnectionId, peer_addr: SocketAddr) {
        if let Some(entry) = self.registry().unregister(id).await {
            self.registry()
                .broadcast_text(None, &notice::left(&entry.display_name))
                .await;
            let duration = Utc::now().signed_duration_since(entry.joined_at);
            info!(
                "{} | {} left the room after {}s",
                entry.display_name,
                peer_addr,
                duration.num_seconds()
            );
        }
    }
}

/// Drain a connection's outbound queue onto its socket.
///
/// Stops at the first failed or timed-out write; later broadcasts to this
/// connection then fail fast and are logged by the registry.
async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<Outbound>,
    peer_addr: SocketAddr,
    write_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(payload) = rx.recv().await {
        match timeout(write_timeout, writer.write_all(&payload)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Write to {} failed: {}", peer_addr, e);
                break;
            }
            Err(_) => {
                warn!("Write to {} timed out after {:?}", peer_addr, write_timeout);
                break;
            }
        }
    }
    rx.close();
    let _ = writer.shutdown().await;
}
