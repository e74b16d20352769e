//! Minimal HTTP/1.1 request parsing and response writing.
//!
//! Only what the opening handshake and the landing page need: a request
//! line, headers, and fixed-body responses with `Connection: close`.

// ============================================================================
// Imports
// ============================================================================

use std::io::ErrorKind;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default upper bound on the size of a request head.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 8 * 1024;

// ============================================================================
// HttpRequest
// ============================================================================

/// A parsed HTTP request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method, e.g. `GET`.
    pub method: String,
    /// Request target, e.g. `/index.html`.
    pub path: String,
    /// Protocol version, e.g. `HTTP/1.1`.
    pub version: String,
    /// Headers in arrival order, names as sent.
    headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Parses a request head (request line plus header lines).
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeFailure`] if the request line or a header
    /// line is malformed.
    pub fn parse(head: &str) -> Result<Self> {
        let mut lines = head.lines().map(|line| line.trim_end_matches('\r'));

        let request_line = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| Error::handshake("empty request"))?;

        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(path), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::handshake(format!(
                "malformed request line: {request_line}"
            )));
        };

        if !version.starts_with("HTTP/") {
            return Err(Error::handshake(format!("unsupported protocol: {version}")));
        }

        let mut headers = Vec::new();
        for line in lines.filter(|line| !line.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::handshake(format!("malformed header line: {line}")))?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        Ok(Self {
            method: method.to_string(),
            path: path.to_string(),
            version: version.to_string(),
            headers,
        })
    }

    /// Returns the first value of header `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if header `name` lists `token` (comma-separated,
    /// case-insensitive).
    #[must_use]
    pub fn header_has_token(&self, name: &str, token: &str) -> bool {
        self.header(name).is_some_and(|value| {
            value
                .split(',')
                .any(|item| item.trim().eq_ignore_ascii_case(token))
        })
    }

    /// Returns `true` if the client asked to switch protocols.
    ///
    /// Only checks intent; [`negotiate`](super::handshake::negotiate)
    /// validates the rest.
    #[must_use]
    pub fn wants_upgrade(&self) -> bool {
        self.header("Upgrade").is_some() || self.header_has_token("Connection", "Upgrade")
    }

    /// Returns the path without query string or fragment.
    #[must_use]
    pub fn route(&self) -> &str {
        self.path
            .split(['?', '#'])
            .next()
            .unwrap_or(&self.path)
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Reads a request head terminated by an empty line.
///
/// Returns `Ok(None)` if the peer closes before sending anything.
///
/// # Errors
///
/// - [`Error::HandshakeFailure`] if the head exceeds `max_bytes`, is cut
///   short, or is not valid UTF-8
/// - [`Error::Io`] if the underlying read fails
pub async fn read_request<R>(reader: &mut R, max_bytes: usize) -> Result<Option<HttpRequest>>
where
    R: AsyncBufRead + Unpin,
{
    let mut limited = (&mut *reader).take(max_bytes as u64);
    let mut head = String::new();

    loop {
        let mut line = String::new();
        let read = match limited.read_line(&mut line).await {
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(Error::handshake("request head is not valid UTF-8"));
            }
            Err(e) => return Err(e.into()),
        };

        if read == 0 {
            if head.is_empty() {
                return Ok(None);
            }
            if limited.limit() == 0 {
                return Err(Error::handshake(format!(
                    "request head exceeds {max_bytes} bytes"
                )));
            }
            return Err(Error::handshake("request head truncated"));
        }

        if line == "\r\n" || line == "\n" {
            break;
        }

        // A line cut short by the limit or by end of stream is kept; the
        // next read returns 0 and reports why.
        head.push_str(&line);
    }

    HttpRequest::parse(&head).map(Some)
}

// ============================================================================
// Responses
// ============================================================================

/// Builds a complete response with a body and `Connection: close`.
#[must_use]
pub fn response(status: u16, reason: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        body.len()
    );

    let mut bytes = Vec::with_capacity(head.len() + body.len());
    bytes.extend_from_slice(head.as_bytes());
    bytes.extend_from_slice(body);
    bytes
}

/// Builds a plain-text error response.
#[must_use]
pub fn error_response(status: u16, reason: &str) -> Vec<u8> {
    response(status, reason, "text/plain; charset=utf-8", reason.as_bytes())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const UPGRADE_HEAD: &str = "GET /chat?room=1 HTTP/1.1\r\n\
        Host: localhost:8000\r\n\
        upgrade: WebSocket\r\n\
        Connection: keep-alive, Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n";

    #[test]
    fn test_parse_request_line() {
        let request = HttpRequest::parse(UPGRADE_HEAD).expect("parse");
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/chat?room=1");
        assert_eq!(request.route(), "/chat");
        assert_eq!(request.version, "HTTP/1.1");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = HttpRequest::parse(UPGRADE_HEAD).expect("parse");
        assert_eq!(request.header("UPGRADE"), Some("WebSocket"));
        assert_eq!(
            request.header("sec-websocket-key"),
            Some("dGhlIHNhbXBsZSBub25jZQ==")
        );
        assert!(request.header("Origin").is_none());
    }

    #[test]
    fn test_header_has_token() {
        let request = HttpRequest::parse(UPGRADE_HEAD).expect("parse");
        assert!(request.header_has_token("Connection", "upgrade"));
        assert!(request.header_has_token("Connection", "keep-alive"));
        assert!(!request.header_has_token("Connection", "close"));
        assert!(request.wants_upgrade());
    }

    #[test]
    fn test_parse_rejects_malformed_request_line() {
        assert!(HttpRequest::parse("").is_err());
        assert!(HttpRequest::parse("GET /\r\n").is_err());
        assert!(HttpRequest::parse("GET / FTP/1.0\r\n").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_header() {
        let err = HttpRequest::parse("GET / HTTP/1.1\r\nnot a header\r\n").unwrap_err();
        assert!(matches!(err, Error::HandshakeFailure { .. }));
    }

    #[tokio::test]
    async fn test_read_request_stops_at_blank_line() {
        let mut raw = format!("{UPGRADE_HEAD}\r\n").into_bytes();
        raw.extend_from_slice(&[0x81, 0x00]);
        let mut reader = &raw[..];

        let request = read_request(&mut reader, DEFAULT_MAX_REQUEST_BYTES)
            .await
            .expect("read")
            .expect("request");

        assert_eq!(request.route(), "/chat");
        // Bytes after the head stay in the reader.
        assert_eq!(reader, b"\x81\x00");
    }

    #[tokio::test]
    async fn test_read_request_empty_stream() {
        let mut reader: &[u8] = b"";
        let request = read_request(&mut reader, DEFAULT_MAX_REQUEST_BYTES)
            .await
            .expect("read");
        assert!(request.is_none());
    }

    #[tokio::test]
    async fn test_read_request_too_large() {
        let raw = format!("GET / HTTP/1.1\r\nX-Pad: {}\r\n\r\n", "a".repeat(200));
        let mut reader = raw.as_bytes();

        let err = read_request(&mut reader, 64).await.unwrap_err();
        assert!(err.to_string().contains("exceeds 64 bytes"));
    }

    #[tokio::test]
    async fn test_read_request_truncated() {
        let mut reader: &[u8] = b"GET / HTTP/1.1\r\nHost: x\r\n";
        let err = read_request(&mut reader, DEFAULT_MAX_REQUEST_BYTES)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_response_format() {
        let bytes = response(200, "OK", "text/html", b"<p>hi</p>");
        let text = String::from_utf8(bytes).expect("utf-8");
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 9\r\n"));
        assert!(text.ends_with("\r\n\r\n<p>hi</p>"));
    }

    #[test]
    fn test_error_response() {
        let text = String::from_utf8(error_response(404, "Not Found")).expect("utf-8");
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.ends_with("Not Found"));
    }
}
