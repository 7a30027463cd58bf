//! TCP listener for the chat server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use super::session::{ChatSession, SessionLimits};
use crate::ai::AiBridge;
use crate::chat::{CommandDispatcher, Registry};
use crate::config::{Config, ServerConfig};
use crate::{HuddleError, Result};

/// Chat server that accepts TCP connections into the single room.
///
/// All state lives on the instance, so several servers can run side by side.
pub struct ChatServer {
    listener: TcpListener,
    semaphore: Arc<Semaphore>,
    max_connections: usize,
    session: ChatSession,
}

impl ChatServer {
    /// Bind using the full configuration.
    pub async fn bind(config: &Config) -> Result<Self> {
        let bridge = AiBridge::from_config(&config.ai)?;
        Self::bind_with_bridge(&config.server, bridge).await
    }

    /// Bind with an explicit AI bridge.
    pub async fn bind_with_bridge(config: &ServerConfig, bridge: AiBridge) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        info!("Chat server listening on {}", local_addr);

        let dispatcher = CommandDispatcher::new(Arc::new(Registry::new()), Arc::new(bridge));
        Ok(Self {
            listener,
            semaphore: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
            session: ChatSession::new(dispatcher, SessionLimits::from(config)),
        })
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Get the shared connection registry.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(self.session.dispatcher().registry())
    }

    /// Get the shared AI bridge.
    pub fn bridge(&self) -> Arc<AiBridge> {
        Arc::clone(self.session.dispatcher().bridge())
    }

    /// Get the maximum number of connections allowed.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Wait for a free connection slot, then accept.
    async fn accept(&self) -> Result<(TcpStream, SocketAddr, OwnedSemaphorePermit)> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| HuddleError::Io(std::io::Error::other("semaphore closed")))?;

        let (stream, addr) = self.listener.accept().await?;
        debug!("Accepted connection from {}", addr);

        Ok((stream, addr, permit))
    }

    /// Accept connections forever, serving each on its own task.
    ///
    /// Accept errors are logged and never stop the loop.
    pub async fn run(self) -> Result<()> {
        loop {
            match self.accept().await {
                Ok((stream, addr, permit)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                    }
                    let session = self.session.clone();
                    tokio::spawn(async move {
                        match session.serve(stream, addr).await {
                            Ok(()) => {}
                            Err(HuddleError::Handshake(reason)) => {
                                warn!("Rejected {}: {}", addr, reason)
                            }
                            Err(e) => warn!("Connection {} ended: {}", addr, e),
                        }
                        // Releases the connection slot.
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
