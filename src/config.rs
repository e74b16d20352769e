//! Server configuration.
//!
//! Provides [`ServerConfig`] and a fluent [`ServerConfigBuilder`].
//!
//! # Example
//!
//! ```no_run
//! use websocket_chat::ServerConfig;
//!
//! # fn example() -> websocket_chat::Result<()> {
//! let config = ServerConfig::builder()
//!     .port(8002)
//!     .max_connections(10)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{Error, Result};
use crate::protocol::http::DEFAULT_MAX_REQUEST_BYTES;

// ============================================================================
// Constants
// ============================================================================

/// Default bind address (all interfaces).
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Default port; the landing page and the WebSocket share it.
pub const DEFAULT_PORT: u16 = 8000;

/// Default limit on concurrent connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Smallest accepted request head limit.
const MIN_REQUEST_BYTES: usize = 256;

// ============================================================================
// ServerConfig
// ============================================================================

/// Validated server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: IpAddr,
    /// Port to bind (0 for OS-assigned).
    pub port: u16,
    /// Connections served at once; further accepts are refused.
    pub max_connections: usize,
    /// Upper bound on an HTTP request head.
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl ServerConfig {
    /// Creates a builder starting from the defaults.
    #[inline]
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Returns the socket address to bind.
    #[inline]
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// ============================================================================
// ServerConfigBuilder
// ============================================================================

/// Builder for [`ServerConfig`].
#[derive(Debug, Default, Clone)]
pub struct ServerConfigBuilder {
    host: Option<IpAddr>,
    port: Option<u16>,
    max_connections: Option<usize>,
    max_request_bytes: Option<usize>,
}

impl ServerConfigBuilder {
    /// Creates a builder with nothing overridden.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bind address.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the port (0 for OS-assigned).
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the concurrent connection limit.
    #[inline]
    #[must_use]
    pub fn max_connections(mut self, limit: usize) -> Self {
        self.max_connections = Some(limit);
        self
    }

    /// Sets the request head size limit.
    #[inline]
    #[must_use]
    pub fn max_request_bytes(mut self, limit: usize) -> Self {
        self.max_request_bytes = Some(limit);
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `max_connections` is zero
    /// - [`Error::Config`] if `max_request_bytes` is below 256
    pub fn build(self) -> Result<ServerConfig> {
        let defaults = ServerConfig::default();

        let max_connections = self.max_connections.unwrap_or(defaults.max_connections);
        if max_connections == 0 {
            return Err(Error::config(
                "max_connections must be at least 1.\n\
                 Example: ServerConfig::builder().max_connections(10)",
            ));
        }

        let max_request_bytes = self.max_request_bytes.unwrap_or(defaults.max_request_bytes);
        if max_request_bytes < MIN_REQUEST_BYTES {
            return Err(Error::config(format!(
                "max_request_bytes must be at least {MIN_REQUEST_BYTES}, got {max_request_bytes}"
            )));
        }

        Ok(ServerConfig {
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            max_connections,
            max_request_bytes,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
