//! Error types for the chat server.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use websocket_chat::{Result, protocol::frame};
//!
//! fn example() -> Result<Vec<u8>> {
//!     let bytes = frame::encode_text("hello")?;
//!     Ok(bytes)
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Handshake | [`Error::HandshakeFailure`] |
//! | Framing | [`Error::UnsupportedFrameSize`], [`Error::Protocol`] |
//! | Application | [`Error::MalformedPayload`] |
//! | Connection | [`Error::ConnectionClosed`], [`Error::ResourceExhausted`] |
//! | Backpressure | [`Error::WriterQueueFull`] |
//! | External | [`Error::Io`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when server configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// HTTP upgrade handshake failed.
    ///
    /// Returned when upgrade headers or the key are missing or malformed.
    /// The connection is closed before it is registered.
    #[error("Handshake failed: {message}")]
    HandshakeFailure {
        /// Description of what was missing or malformed.
        message: String,
    },

    // ========================================================================
    // Framing Errors
    // ========================================================================
    /// Frame payload exceeds the supported length.
    ///
    /// Returned when decoding a frame that uses the 64-bit length form,
    /// or when encoding a payload above [`MAX_PAYLOAD_LEN`].
    ///
    /// [`MAX_PAYLOAD_LEN`]: crate::protocol::frame::MAX_PAYLOAD_LEN
    #[error("Unsupported frame size: {size} bytes (max {max})")]
    UnsupportedFrameSize {
        /// Requested payload size. For the 64-bit length form, which is
        /// rejected before its length is read, the smallest size that form
        /// carries.
        size: u64,
        /// Largest supported payload.
        max: usize,
    },

    /// Framing protocol violation.
    ///
    /// Returned for reserved bits set or an unknown opcode.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Application Errors
    // ========================================================================
    /// Payload could not be interpreted as a chat message.
    ///
    /// Connection-local; callers log it and keep reading.
    #[error("Malformed payload: {message}")]
    MalformedPayload {
        /// Description of the decoding problem.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection writer is gone.
    ///
    /// Returned when sending to a connection whose socket has been closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Connection's outbound queue is full.
    ///
    /// The client is not reading fast enough; the frame is dropped for
    /// that client only.
    #[error("Writer queue full: {capacity} frames pending")]
    WriterQueueFull {
        /// Queue capacity in frames.
        capacity: usize,
    },

    /// Connection limit reached.
    ///
    /// Returned by the accept loop when all slots are taken.
    #[error("Connection limit reached: {limit}")]
    ResourceExhausted {
        /// Configured maximum number of concurrent connections.
        limit: usize,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a handshake failure.
    #[inline]
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::HandshakeFailure {
            message: message.into(),
        }
    }

    /// Creates an unsupported frame size error.
    #[inline]
    pub fn unsupported_frame_size(size: u64, max: usize) -> Self {
        Self::UnsupportedFrameSize { size, max }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a malformed payload error.
    #[inline]
    pub fn malformed_payload(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Creates a writer queue full error.
    #[inline]
    pub fn writer_queue_full(capacity: usize) -> Self {
        Self::WriterQueueFull { capacity }
    }

    /// Creates a resource exhausted error.
    #[inline]
    pub fn resource_exhausted(limit: usize) -> Self {
        Self::ResourceExhausted { limit }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the peer violated the wire protocol.
    ///
    /// Protocol errors close the connection.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::HandshakeFailure { .. }
                | Self::UnsupportedFrameSize { .. }
                | Self::Protocol { .. }
        )
    }

    /// Returns `true` if this is a transport-level error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ConnectionClosed)
    }

    /// Returns `true` if the connection may keep going after this error.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedPayload { .. } | Self::Json(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
