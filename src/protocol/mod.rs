//! WebSocket protocol layer.
//!
//! Everything needed to speak the RFC 6455 subset this server supports,
//! with no knowledge of chat semantics.
//!
//! | Piece | Direction | Purpose |
//! |-------|-----------|---------|
//! | HTTP request head | Client → Server | Upgrade request or page request |
//! | `101` response | Server → Client | Completes the opening handshake |
//! | Frame | Both | Text payloads; close sentinel from clients |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Frame decode/encode and masking |
//! | `handshake` | `Sec-WebSocket-Accept` negotiation |
//! | `http` | Request head parsing and simple responses |

// ============================================================================
// Submodules
// ============================================================================

/// Frame decode/encode and masking.
pub mod frame;

/// Opening handshake.
pub mod handshake;

/// Minimal HTTP/1.1 parsing.
pub mod http;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{CLOSE_SENTINEL, Frame, MAX_PAYLOAD_LEN, Opcode};
pub use handshake::{UpgradeResponse, accept_key, negotiate};
pub use http::HttpRequest;
