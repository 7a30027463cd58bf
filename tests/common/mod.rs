//! Test helpers for E2E tests.
//!
//! Provides TestClient, TestServer, and a scripted completion service.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use huddle::config::ServerConfig;
use huddle::{AiBridge, ChatServer, ChatTurn, CompletionService, HuddleError, Registry, Role};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a client waits before deciding nothing more is coming.
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Test client speaking the line protocol.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect to the server at the given address.
    pub async fn connect(addr: SocketAddr) -> Result<Self, std::io::Error> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer,
        })
    }

    /// Connect and send the display-name handshake.
    pub async fn join(addr: SocketAddr, name: &str) -> Result<Self, std::io::Error> {
        let mut client = Self::connect(addr).await?;
        client.send_line(name).await?;
        Ok(client)
    }

    /// Send raw bytes to the server.
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<(), std::io::Error> {
        self.writer.write_all(data).await?;
        self.writer.flush().await
    }

    /// Send a line (with LF) to the server.
    pub async fn send_line(&mut self, line: &str) -> Result<(), std::io::Error> {
        self.send_raw(format!("{line}\n").as_bytes()).await
    }

    /// Close the sending side, leaving the client able to read.
    pub async fn finish(&mut self) -> Result<(), std::io::Error> {
        self.writer.shutdown().await
    }

    /// Receive one line, terminator included.
    pub async fn recv_line(&mut self) -> Result<String, std::io::Error> {
        self.recv_line_timeout(DEFAULT_TIMEOUT).await
    }

    /// Receive one line with a custom timeout.
    ///
    /// Returns an empty string at EOF.
    pub async fn recv_line_timeout(&mut self, duration: Duration) -> Result<String, std::io::Error> {
        let mut line = String::new();
        match timeout(duration, self.reader.read_line(&mut line)).await {
            Ok(Ok(_)) => Ok(line),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Timeout waiting for line",
            )),
        }
    }

    /// Receive lines until one contains `pattern`, returning all of them.
    pub async fn recv_until(&mut self, pattern: &str) -> Result<Vec<String>, std::io::Error> {
        let mut lines = Vec::new();
        loop {
            let line = self.recv_line().await?;
            if line.is_empty() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("EOF before pattern: {}", pattern),
                ));
            }
            let found = line.contains(pattern);
            lines.push(line);
            if found {
                return Ok(lines);
            }
        }
    }

    /// Check that nothing arrives within [`QUIET_PERIOD`].
    pub async fn is_quiet(&mut self) -> bool {
        self.recv_line_timeout(QUIET_PERIOD).await.is_err()
    }

    /// Check whether the server closed the connection.
    ///
    /// A reset counts as closed; the server may drop unread input.
    pub async fn is_closed(&mut self) -> bool {
        match self.recv_line().await {
            Ok(line) => line.is_empty(),
            Err(e) => e.kind() != std::io::ErrorKind::TimedOut,
        }
    }
}

/// Test server running on the current runtime.
pub struct TestServer {
    addr: SocketAddr,
    registry: Arc<Registry>,
    bridge: Arc<AiBridge>,
    handle: JoinHandle<huddle::Result<()>>,
}

impl TestServer {
    /// Start a server with no AI credential.
    pub async fn new() -> Self {
        Self::with_bridge(AiBridge::new(None, "be brief", DEFAULT_TIMEOUT)).await
    }

    /// Start a server backed by the given completion service.
    pub async fn with_service(service: Arc<dyn CompletionService>) -> Self {
        Self::with_bridge(AiBridge::new(Some(service), "be brief", DEFAULT_TIMEOUT)).await
    }

    /// Start a server with an explicit bridge.
    pub async fn with_bridge(bridge: AiBridge) -> Self {
        Self::with_config(test_config(), bridge).await
    }

    /// Start a server with custom listener configuration.
    pub async fn with_config(config: ServerConfig, bridge: AiBridge) -> Self {
        let server = ChatServer::bind_with_bridge(&config, bridge)
            .await
            .expect("Failed to bind test server");
        let addr = server.local_addr().expect("Failed to get local address");
        let registry = server.registry();
        let bridge = server.bridge();
        let handle = tokio::spawn(server.run());

        Self {
            addr,
            registry,
            bridge,
            handle,
        }
    }

    /// Get the local address of the server.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the server's registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Get the server's AI bridge.
    pub fn bridge(&self) -> &Arc<AiBridge> {
        &self.bridge
    }

    /// Wait until exactly `n` users are registered.
    pub async fn wait_for_users(&self, n: usize) {
        timeout(DEFAULT_TIMEOUT, async {
            while self.registry.len().await != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("registry never reached {} users", n));
    }

    /// Join a user and wait until it is registered.
    ///
    /// Joining one user at a time keeps the roster order predictable.
    pub async fn join(&self, name: &str) -> TestClient {
        let before = self.registry.len().await;
        let client = TestClient::join(self.addr, name)
            .await
            .expect("Failed to connect");
        self.wait_for_users(before + 1).await;
        client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Create a test listener configuration.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_connections: 64,
        ..ServerConfig::default()
    }
}

/// Scripted completion service that counts its calls.
pub struct FakeCompletion {
    calls: AtomicUsize,
    reply: Option<String>,
    delay: Duration,
    fail: bool,
}

impl FakeCompletion {
    /// Reply with `re: <latest user turn>`.
    pub fn echo() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: None,
            delay: Duration::ZERO,
            fail: false,
        })
    }

    /// Reply with fixed text.
    pub fn fixed(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Some(reply.to_string()),
            delay: Duration::ZERO,
            fail: false,
        })
    }

    /// Echo after a delay.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: None,
            delay,
            fail: false,
        })
    }

    /// Fail every request.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: None,
            delay: Duration::ZERO,
            fail: true,
        })
    }

    /// Number of requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CompletionService for FakeCompletion {
    fn complete<'a>(&'a self, transcript: &'a [ChatTurn]) -> BoxFuture<'a, huddle::Result<String>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(HuddleError::Completion("HTTP 503: unavailable".to_string()));
            }
            if let Some(reply) = &self.reply {
                return Ok(reply.clone());
            }
            let last = transcript
                .iter()
                .rev()
                .find(|turn| turn.role == Role::User)
                .map(|turn| turn.content.clone())
                .unwrap_or_default();
            Ok(format!("re: {last}"))
        })
    }
}
