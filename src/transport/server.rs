//! Accept loop.
//!
//! Binds the TCP listener, admits connections up to the configured limit,
//! and runs each one in its own task.
//!
//! # Connection Flow
//!
//! 1. `Server::bind` - Bind to the configured host and port
//! 2. `Server::spawn` - Start the accept loop in the background
//! 3. Each accepted socket gets a [`ConnectionId`] and a slot, or a `503`
//! 4. [`Connection::serve`] runs handshake, join and chat to completion
//! 5. `ServerHandle::shutdown` - Stop accepting, close every member

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::http;

use super::{Connection, Registry};

// ============================================================================
// Server
// ============================================================================

/// A bound chat server that is not accepting yet.
///
/// # Example
///
/// ```ignore
/// use websocket_chat::{Server, ServerConfig};
///
/// let server = Server::bind(ServerConfig::builder().port(0).build()?).await?;
/// println!("Listening on {}", server.ws_url());
///
/// let handle = server.spawn();
/// // ...
/// handle.shutdown().await;
/// ```
pub struct Server {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Address actually bound.
    local_addr: SocketAddr,
    /// Settings the server was bound with.
    config: ServerConfig,
    /// Joined connections.
    registry: Arc<Registry>,
    /// One permit per concurrent connection.
    slots: Arc<Semaphore>,
    /// Signals the accept loop to stop.
    shutdown: Arc<Notify>,
}

impl Server {
    /// Binds the listener described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;

        debug!(%local_addr, "Chat server bound");

        Ok(Self {
            listener,
            local_addr,
            slots: Arc::new(Semaphore::new(config.max_connections)),
            config,
            registry: Arc::new(Registry::new()),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://{ip}:{port}/`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.local_addr)
    }

    /// Returns the shared registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Starts the accept loop on a background task.
    #[must_use]
    pub fn spawn(self) -> ServerHandle {
        let local_addr = self.local_addr;
        let registry = Arc::clone(&self.registry);
        let shutdown = Arc::clone(&self.shutdown);
        let task = tokio::spawn(self.run());

        ServerHandle {
            local_addr,
            registry,
            shutdown,
            task,
        }
    }

    /// Runs the accept loop until shut down.
    ///
    /// Never waits on a connection; accept errors are logged and the loop
    /// continues.
    pub async fn run(self) {
        info!(
            local_addr = %self.local_addr,
            max_connections = self.config.max_connections,
            "Chat server listening"
        );

        loop {
            tokio::select! {
                () = self.shutdown.notified() => {
                    debug!("Accept loop shutting down");
                    break;
                }

                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.admit(stream, addr),
                        Err(e) => error!(error = %e, "Accept failed"),
                    }
                }
            }
        }

        debug!("Accept loop terminated");
    }

    /// Hands a socket to its own task, or refuses it when full.
    fn admit(&self, stream: TcpStream, addr: SocketAddr) {
        let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
            let err = Error::resource_exhausted(self.config.max_connections);
            warn!(?addr, error = %err, "Refusing connection");
            tokio::spawn(refuse(stream));
            return;
        };

        let id = ConnectionId::next();
        let registry = Arc::clone(&self.registry);
        let connection = Connection::new(id, stream, addr, self.config.max_request_bytes);

        debug!(connection_id = %id, ?addr, "Connection accepted");

        tokio::spawn(async move {
            let _permit = permit;
            match connection.serve(&registry).await {
                Ok(()) => debug!(connection_id = %id, "Connection finished"),
                Err(e) if e.is_protocol_error() => {
                    debug!(
                        connection_id = %id,
                        ?addr,
                        error = %e,
                        "Connection closed on protocol error"
                    );
                }
                Err(e) => warn!(connection_id = %id, ?addr, error = %e, "Connection failed"),
            }
        });
    }
}

/// Tells an over-limit client to go away.
async fn refuse(mut stream: TcpStream) {
    let response = http::error_response(503, "Service Unavailable");
    if let Err(e) = stream.write_all(&response).await {
        debug!(error = %e, "Failed to send refusal");
    }
    let _ = stream.shutdown().await;
}

// ============================================================================
// ServerHandle
// ============================================================================

/// Handle to a running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    registry: Arc<Registry>,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket URL for this server.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.local_addr)
    }

    /// Returns the shared registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Stops accepting and closes every joined connection.
    pub async fn shutdown(self) {
        info!("Chat server shutting down");

        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            error!(error = %e, "Accept loop panicked");
        }

        self.registry.shutdown();

        info!("Chat server shutdown complete");
    }
}

// ============================================================================
// Tests
// ============================================================================
