//! Connection transport layer.
//!
//! Accepts TCP clients, upgrades them to WebSocket, and coordinates
//! broadcast between them.
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────────┐
//!  TCP accept ──►│    Server    │── slot? ──► 503 + close
//!                └──────┬───────┘
//!                       │ spawn (one task per socket)
//!                       ▼
//!                ┌──────────────┐   join / leave / broadcast   ┌──────────┐
//!                │  Connection  │─────────────────────────────►│ Registry │
//!                │ (read loop)  │                              └────┬─────┘
//!                └──────────────┘                                   │
//!                                  ConnectionHandle (per member) ◄──┘
//!                                         │
//!                                         ▼
//!                                   writer task ──► socket
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Per-socket lifecycle and writer handle |
//! | `registry` | Shared member set and fan-out |
//! | `server` | Accept loop and connection limit |

// ============================================================================
// Submodules
// ============================================================================

/// Per-socket lifecycle and writer handle.
pub mod connection;

/// Shared member set and fan-out.
pub mod registry;

/// Accept loop and connection limit.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionHandle, ConnectionState};
pub use registry::Registry;
pub use server::{Server, ServerHandle};
