//! WebSocket Chat - a small chat room over a hand-written WebSocket stack.
//!
//! This library upgrades HTTP connections to WebSocket, speaks a subset of
//! RFC 6455 framing, and relays text messages between every connected
//! client.
//!
//! # Architecture
//!
//! Leaves first:
//!
//! - **Frame codec**: read one frame from a byte stream, write text frames
//! - **Handshake**: compute `Sec-WebSocket-Accept`, send `101`
//! - **Connection**: owns a socket; handshake, join, then read loop
//! - **Registry**: shared member set; join, leave and broadcast under one lock
//! - **Server**: accept loop with a concurrent connection limit
//!
//! Key design principles:
//!
//! - One tokio task per connection; frames are handled in arrival order
//! - One writer task per connection; writes to a socket never overlap
//! - Broadcasts encode once and reach exactly the members present
//! - Per-connection failures never leave the connection's task
//!
//! # Quick Start
//!
//! ```no_run
//! use websocket_chat::{Result, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ServerConfig::builder().port(8000).build()?;
//!     let server = Server::bind(config).await?;
//!     println!("Chat on {}", server.ws_url());
//!
//!     server.run().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`chat`] | Chat message types and landing page |
//! | [`config`] | Server configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | WebSocket framing and handshake |
//! | [`transport`] | Connections, registry, accept loop |
//!
//! # Limits
//!
//! - Payloads up to 65535 bytes; the 64-bit length form is rejected
//! - No fragmentation, compression, ping/pong or TLS

// ============================================================================
// Modules
// ============================================================================

/// Chat application layer.
///
/// Classifies inbound payloads and builds outbound JSON messages.
pub mod chat;

/// Server configuration.
///
/// Use [`ServerConfig::builder()`] to create a validated configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// WebSocket protocol layer.
///
/// Frame codec, opening handshake and HTTP head parsing.
pub mod protocol;

/// Connection transport layer.
///
/// Per-socket lifecycle, broadcast registry and accept loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Chat types
pub use chat::{ClientMessage, Inbound, ServerMessage};

// Configuration
pub use config::{ServerConfig, ServerConfigBuilder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::ConnectionId;

// Protocol types
pub use protocol::{Frame, Opcode};

// Transport types
pub use transport::{Connection, ConnectionHandle, ConnectionState, Registry, Server, ServerHandle};
