//! Chat application layer.
//!
//! Sits on top of the WebSocket transport: classifies inbound text
//! payloads, builds outbound JSON messages, and serves the landing page.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `assets` | Embedded HTML/JS client |
//! | `message` | Client and server message types |

// ============================================================================
// Submodules
// ============================================================================

/// Embedded landing page.
pub mod assets;

/// Chat message types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{ClientMessage, Inbound, ServerMessage, validate_display_name};
