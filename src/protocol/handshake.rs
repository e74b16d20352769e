//! WebSocket opening handshake.
//!
//! Validates the client's upgrade request and produces the
//! `101 Switching Protocols` response.
//!
//! # Flow
//!
//! ```text
//! Client                                   Server
//!   │  GET / HTTP/1.1                        │
//!   │  Upgrade: websocket                    │
//!   │  Connection: Upgrade                   │
//!   │  Sec-WebSocket-Key: <key>              │
//!   │───────────────────────────────────────►│  negotiate()
//!   │                                        │
//!   │  HTTP/1.1 101 Switching Protocols      │
//!   │  Sec-WebSocket-Accept: <accept>        │
//!   │◄───────────────────────────────────────│  write_response()
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{Error, Result};

use super::http::HttpRequest;

// ============================================================================
// Constants
// ============================================================================

/// GUID appended to the client key before hashing (RFC 6455 section 1.3).
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

// ============================================================================
// UpgradeResponse
// ============================================================================

/// A successful negotiation: the `101` response to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeResponse {
    accept: String,
}

impl UpgradeResponse {
    /// Returns the computed `Sec-WebSocket-Accept` value.
    #[inline]
    #[must_use]
    pub fn accept(&self) -> &str {
        &self.accept
    }

    /// Returns the response bytes, terminated by an empty line.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for UpgradeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\
             \r\n",
            self.accept
        )
    }
}

// ============================================================================
// Negotiation
// ============================================================================

/// Computes `base64(sha1(key + GUID))`.
#[must_use]
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Validates an upgrade request.
///
/// # Errors
///
/// Returns [`Error::HandshakeFailure`] if the method is not `GET`, the
/// `Connection` header lacks `Upgrade`, the `Upgrade` header is not
/// `websocket`, or `Sec-WebSocket-Key` is missing or empty.
pub fn negotiate(request: &HttpRequest) -> Result<UpgradeResponse> {
    if !request.method.eq_ignore_ascii_case("GET") {
        return Err(Error::handshake(format!(
            "upgrade requires GET, got {}",
            request.method
        )));
    }

    if !request.header_has_token("Connection", "Upgrade") {
        return Err(Error::handshake("missing `Connection: Upgrade` header"));
    }

    let upgrade = request.header("Upgrade").unwrap_or_default();
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(Error::handshake(format!(
            "unsupported upgrade protocol: {upgrade:?}"
        )));
    }

    let key = request
        .header("Sec-WebSocket-Key")
        .filter(|key| !key.is_empty())
        .ok_or_else(|| Error::handshake("missing Sec-WebSocket-Key header"))?;

    Ok(UpgradeResponse {
        accept: accept_key(key),
    })
}

/// Writes the `101` response directly to the transport.
///
/// # Errors
///
/// Returns [`Error::Io`] if the write fails.
pub async fn write_response<W>(writer: &mut W, response: &UpgradeResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&response.to_bytes()).await?;
    writer.flush().await?;
    debug!(accept = %response.accept, "Upgrade response sent");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn request(head: &str) -> HttpRequest {
        HttpRequest::parse(head).expect("parse")
    }

    #[test]
    fn test_accept_key_rfc_example() {
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_negotiate_success() {
        let req = request(
            "GET / HTTP/1.1\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n",
        );

        let response = negotiate(&req).expect("negotiate");
        assert_eq!(response.accept(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");

        let text = response.to_string();
        assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(text.contains("Upgrade: websocket\r\n"));
        assert!(text.contains("Connection: Upgrade\r\n"));
        assert!(text.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_negotiate_is_case_insensitive() {
        let req = request(
            "GET / HTTP/1.1\r\n\
             UPGRADE: WebSocket\r\n\
             connection: keep-alive, upgrade\r\n\
             sec-websocket-key: abc\r\n",
        );
        assert!(negotiate(&req).is_ok());
    }

    #[test]
    fn test_negotiate_missing_connection_header() {
        let req = request(
            "GET / HTTP/1.1\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Key: abc\r\n",
        );
        let err = negotiate(&req).unwrap_err();
        assert!(err.to_string().contains("Connection"));
    }

    #[test]
    fn test_negotiate_wrong_upgrade_protocol() {
        let req = request(
            "GET / HTTP/1.1\r\n\
             Upgrade: h2c\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: abc\r\n",
        );
        assert!(matches!(negotiate(&req), Err(Error::HandshakeFailure { .. })));
    }

    #[test]
    fn test_negotiate_missing_key() {
        let req = request(
            "GET / HTTP/1.1\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n",
        );
        let err = negotiate(&req).unwrap_err();
        assert!(err.to_string().contains("Sec-WebSocket-Key"));
    }

    #[test]
    fn test_negotiate_rejects_post() {
        let req = request(
            "POST / HTTP/1.1\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: abc\r\n",
        );
        assert!(negotiate(&req).is_err());
    }

    #[tokio::test]
    async fn test_write_response() {
        let response = UpgradeResponse {
            accept: accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
        };
        let mut out = Vec::new();
        write_response(&mut out, &response).await.expect("write");
        assert_eq!(out, response.to_bytes());
    }
}
