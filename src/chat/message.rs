//! Chat message types.
//!
//! # Client → Server
//!
//! ```json
//! { "type": "new_user", "username": "alice" }
//! { "type": "user_message", "message": "hi" }
//! ```
//!
//! Text that is not a JSON object is accepted as-is: the first one names
//! the user, later ones are chat lines.
//!
//! # Server → Client
//!
//! ```json
//! { "type": "notice", "message": "alice has joined", "datetime": "2024-05-01 12:00:00" }
//! { "type": "user_message", "username": "alice", "message": "hi", "datetime": "..." }
//! { "type": "error", "message": "Invalid Message Type: foo" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Format of the `datetime` field.
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Longest accepted display name, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 32;

// ============================================================================
// ClientMessage
// ============================================================================

/// A structured message sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Choose a display name.
    NewUser {
        /// Requested display name.
        username: String,
    },
    /// Say something to the room.
    UserMessage {
        /// Chat line.
        message: String,
    },
}

impl ClientMessage {
    /// Type tags this enum understands.
    const TAGS: [&'static str; 2] = ["new_user", "user_message"];
}

// ============================================================================
// Inbound
// ============================================================================

/// A classified inbound text payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A JSON object with a known `type` tag.
    Structured(ClientMessage),
    /// Anything that is not a JSON object.
    Plain(String),
    /// A JSON object whose `type` tag is not recognised.
    UnknownType(String),
}

impl Inbound {
    /// Classifies a text payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPayload`] for a JSON object that has no
    /// string `type` tag, or whose known tag lacks required fields.
    pub fn parse(text: &str) -> Result<Self> {
        let Ok(Value::Object(object)) = serde_json::from_str::<Value>(text) else {
            return Ok(Self::Plain(text.to_string()));
        };

        let tag = object
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| Error::malformed_payload("JSON message without a string `type`"))?;

        if !ClientMessage::TAGS.contains(&tag.as_str()) {
            return Ok(Self::UnknownType(tag));
        }

        serde_json::from_value(Value::Object(object))
            .map(Self::Structured)
            .map_err(|e| Error::malformed_payload(format!("invalid `{tag}` message: {e}")))
    }
}

/// Trims and checks a requested display name.
///
/// Returns the reason as `Err` when the name cannot be used.
pub fn validate_display_name(raw: &str) -> std::result::Result<String, String> {
    let name = raw.trim();

    if name.is_empty() {
        return Err("Username must not be empty".to_string());
    }

    if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(format!(
            "Username must be at most {MAX_DISPLAY_NAME_CHARS} characters"
        ));
    }

    Ok(name.to_string())
}

// ============================================================================
// ServerMessage
// ============================================================================

/// A message the server sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// System announcement (joins, departures).
    Notice {
        /// Announcement text.
        message: String,
        /// Local time the notice was created.
        datetime: String,
    },
    /// A chat line from a user.
    UserMessage {
        /// Sender's display name.
        username: String,
        /// Chat line.
        message: String,
        /// Local time the line was received.
        datetime: String,
    },
    /// Error sent only to the offending client.
    Error {
        /// Error description.
        message: String,
    },
}

impl ServerMessage {
    /// Creates a notice stamped with the current local time.
    #[must_use]
    pub fn notice(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
            datetime: now(),
        }
    }

    /// Creates a user message stamped with the current local time.
    #[must_use]
    pub fn user_message(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UserMessage {
            username: username.into(),
            message: message.into(),
            datetime: now(),
        }
    }

    /// Creates an error message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serializes to JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn now() -> String {
    Local::now().format(DATETIME_FORMAT).to_string()
}

// ============================================================================
// Tests
// ============================================================================
