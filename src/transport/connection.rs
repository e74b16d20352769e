//! WebSocket connection lifecycle.
//!
//! One [`Connection`] owns one client socket for its whole life: opening
//! handshake, choosing a display name, then a read loop that turns frames
//! into chat messages.
//!
//! # State Machine
//!
//! ```text
//! CONNECTING ──► HANDSHAKING ──► OPEN ──► CLOSING ──► CLOSED
//!                     │                                 ▲
//!                     └──────── handshake failed ───────┘
//! ```
//!
//! # Writes
//!
//! Outbound frames never touch the socket from the reading task. Each
//! connection has a writer task fed by a channel; a [`ConnectionHandle`]
//! is the cloneable sending side that the registry stores. Frames queued
//! on one handle are written in order, one at a time. The queue is
//! bounded by [`WRITER_QUEUE_CAPACITY`]; a client that stops reading misses
//! frames instead of growing it.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{
    AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf, split,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace, warn};

use crate::chat::assets;
use crate::chat::{ClientMessage, Inbound, ServerMessage, validate_display_name};
use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::frame::{self, Opcode, read_frame};
use crate::protocol::handshake::{negotiate, write_response};
use crate::protocol::http::{self, HttpRequest, read_request};

use super::Registry;

// ============================================================================
// Constants
// ============================================================================

/// Frames a writer task may have queued before new ones are dropped.
pub const WRITER_QUEUE_CAPACITY: usize = 1024;

/// Longest unknown type tag repeated back to the client, in characters.
const MAX_ECHOED_TAG_CHARS: usize = 64;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, nothing read yet.
    Connecting,
    /// Reading the HTTP upgrade request.
    Handshaking,
    /// Upgraded; exchanging frames.
    Open,
    /// Leaving the registry and closing the socket.
    Closing,
    /// Terminal.
    Closed,
}

// ============================================================================
// WriterCommand
// ============================================================================

/// Internal commands for the writer task.
#[derive(Debug)]
pub(crate) enum WriterCommand {
    /// Write an already encoded frame.
    Frame(Arc<[u8]>),
    /// Flush and close the write side.
    Shutdown,
}

// ============================================================================
// ConnectionHandle
// ============================================================================

/// Sending side of a connection.
///
/// Cheap to clone. All clones feed the same writer task, so writes to one
/// socket are serialized no matter how many broadcasts target it.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Connection this handle writes to.
    id: ConnectionId,
    /// Channel to the writer task.
    command_tx: mpsc::Sender<WriterCommand>,
}

impl ConnectionHandle {
    /// Spawns a writer task that owns `writer`.
    pub fn spawn<W>(id: ConnectionId, writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (handle, command_rx) = Self::detached(id);
        tokio::spawn(run_writer(id, writer, command_rx));
        handle
    }

    /// Creates a handle whose commands go to the returned receiver.
    pub(crate) fn detached(id: ConnectionId) -> (Self, mpsc::Receiver<WriterCommand>) {
        let (command_tx, command_rx) = mpsc::channel(WRITER_QUEUE_CAPACITY);
        (Self { id, command_tx }, command_rx)
    }

    /// Returns the connection this handle writes to.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `true` once the writer task has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Queues an encoded frame without waiting.
    ///
    /// # Errors
    ///
    /// - [`Error::WriterQueueFull`] if the client is not keeping up
    /// - [`Error::ConnectionClosed`] if the writer task has stopped
    pub fn send_frame(&self, frame: Arc<[u8]>) -> Result<()> {
        self.command_tx
            .try_send(WriterCommand::Frame(frame))
            .map_err(|e| match e {
                TrySendError::Full(_) => Error::writer_queue_full(WRITER_QUEUE_CAPACITY),
                TrySendError::Closed(_) => Error::ConnectionClosed,
            })
    }

    /// Encodes `text` as a text frame and queues it.
    ///
    /// Surrounding whitespace is trimmed; nothing is sent if the result
    /// is empty.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedFrameSize`] if the text is too long
    /// - See [`send_frame`](Self::send_frame)
    pub fn send_text(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let bytes = frame::encode_text(text)?;
        self.send_frame(bytes.into())
    }

    /// Serializes and queues a chat message.
    ///
    /// # Errors
    ///
    /// See [`send_text`](Self::send_text).
    pub fn send_message(&self, message: &ServerMessage) -> Result<()> {
        self.send_text(&message.to_json()?)
    }

    /// Asks the writer task to close the socket's write side.
    ///
    /// Frames queued earlier are still written first. With a full queue
    /// the request is dropped; the writer then stops once every handle is
    /// gone.
    pub fn shutdown(&self) {
        let _ = self.command_tx.try_send(WriterCommand::Shutdown);
    }
}

/// Writer task: drains the command channel into the socket.
async fn run_writer<W>(
    id: ConnectionId,
    mut writer: W,
    mut command_rx: mpsc::Receiver<WriterCommand>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = command_rx.recv().await {
        match command {
            WriterCommand::Frame(bytes) => {
                let written = async {
                    writer.write_all(&bytes).await?;
                    writer.flush().await
                }
                .await;

                if let Err(e) = written {
                    warn!(connection_id = %id, error = %e, "Write failed, closing writer");
                    break;
                }
                trace!(connection_id = %id, len = bytes.len(), "Frame written");
            }

            WriterCommand::Shutdown => {
                let _ = writer.shutdown().await;
                break;
            }
        }
    }

    debug!(connection_id = %id, "Writer terminated");
}

// ============================================================================
// Connection
// ============================================================================

/// Outcome of the HTTP phase.
enum Handshake {
    /// Switched to WebSocket framing.
    Upgraded,
    /// Answered a plain HTTP request; nothing more to do.
    Served,
}

/// One client session.
///
/// Generic over the transport so tests can drive it through in-memory
/// pipes; the server uses `TcpStream`.
pub struct Connection<S> {
    /// Identity assigned at accept time.
    id: ConnectionId,
    /// Remote address, for logging.
    peer: SocketAddr,
    /// Current lifecycle state.
    state: ConnectionState,
    /// Display name, set once when the client joins.
    display_name: Option<String>,
    /// Buffered read side.
    reader: BufReader<ReadHalf<S>>,
    /// Write side until it is handed to the writer task.
    writer: Option<WriteHalf<S>>,
    /// Request head size limit.
    max_request_bytes: usize,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wraps an accepted stream.
    #[must_use]
    pub fn new(id: ConnectionId, stream: S, peer: SocketAddr, max_request_bytes: usize) -> Self {
        let (read_half, write_half) = split(stream);

        Self {
            id,
            peer,
            state: ConnectionState::Connecting,
            display_name: None,
            reader: BufReader::new(read_half),
            writer: Some(write_half),
            max_request_bytes,
        }
    }

    /// Returns the connection identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the display name once the client has joined.
    #[inline]
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Runs the connection to completion.
    ///
    /// Leaves the registry (at most once) and closes the socket on every
    /// exit path after the handshake.
    ///
    /// # Errors
    ///
    /// - [`Error::HandshakeFailure`] if the upgrade request is invalid
    /// - [`Error::Protocol`] / [`Error::UnsupportedFrameSize`] on bad frames
    /// - [`Error::Io`] on transport failure
    pub async fn serve(mut self, registry: &Registry) -> Result<()> {
        self.transition(ConnectionState::Handshaking);

        match self.handshake().await {
            Ok(Handshake::Upgraded) => {}
            Ok(Handshake::Served) => {
                self.transition(ConnectionState::Closed);
                return Ok(());
            }
            Err(e) => {
                self.transition(ConnectionState::Closed);
                return Err(e);
            }
        }

        self.transition(ConnectionState::Open);

        let writer = self.writer.take().ok_or(Error::ConnectionClosed)?;
        let handle = ConnectionHandle::spawn(self.id, writer);

        let result = self.run_session(registry, &handle).await;

        self.transition(ConnectionState::Closing);
        if registry.leave(self.id) {
            info!(
                connection_id = %self.id,
                name = self.display_name.as_deref().unwrap_or_default(),
                "Client left"
            );
        }
        handle.shutdown();
        self.transition(ConnectionState::Closed);

        result
    }

    fn transition(&mut self, next: ConnectionState) {
        trace!(connection_id = %self.id, from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }
}

// ============================================================================
// Connection - Handshake
// ============================================================================

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Reads the HTTP request and either upgrades or serves a page.
    async fn handshake(&mut self) -> Result<Handshake> {
        let writer = self.writer.as_mut().ok_or(Error::ConnectionClosed)?;

        let request = match read_request(&mut self.reader, self.max_request_bytes).await {
            Ok(Some(request)) => request,
            Ok(None) => return Err(Error::handshake("connection closed before request")),
            Err(e) => {
                if e.is_protocol_error() {
                    let _ = writer.write_all(&http::error_response(400, "Bad Request")).await;
                }
                return Err(e);
            }
        };

        if !request.wants_upgrade() {
            serve_page(writer, &request).await?;
            debug!(
                connection_id = %self.id,
                peer = %self.peer,
                route = request.route(),
                "Served page"
            );
            return Ok(Handshake::Served);
        }

        match negotiate(&request) {
            Ok(response) => {
                write_response(writer, &response).await?;
                debug!(connection_id = %self.id, peer = %self.peer, "WebSocket upgrade complete");
                Ok(Handshake::Upgraded)
            }
            Err(e) => {
                let _ = writer.write_all(&http::error_response(400, "Bad Request")).await;
                Err(e)
            }
        }
    }
}

/// Answers a non-upgrade request from the embedded assets.
async fn serve_page<W>(writer: &mut W, request: &HttpRequest) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = if !request.method.eq_ignore_ascii_case("GET") {
        http::error_response(405, "Method Not Allowed")
    } else {
        match assets::lookup(request.route()) {
            Some(asset) => http::response(200, "OK", asset.content_type, asset.body.as_bytes()),
            None => http::error_response(404, "Not Found"),
        }
    };

    writer.write_all(&bytes).await?;
    writer.shutdown().await?;
    Ok(())
}

// ============================================================================
// Connection - Session
// ============================================================================

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Join, then relay chat lines until the client quits.
    async fn run_session(&mut self, registry: &Registry, handle: &ConnectionHandle) -> Result<()> {
        let Some(name) = self.await_join(handle).await? else {
            debug!(connection_id = %self.id, "Closed before joining");
            return Ok(());
        };

        registry.join(handle.clone(), &name)?;
        info!(connection_id = %self.id, peer = %self.peer, name = %name, "Client joined");
        self.display_name = Some(name.clone());

        while let Some(text) = self.next_text().await? {
            match Inbound::parse(&text) {
                Ok(Inbound::Structured(ClientMessage::UserMessage { message }))
                | Ok(Inbound::Plain(message)) => {
                    self.say(registry, handle, &name, &message)?;
                }
                Ok(Inbound::Structured(ClientMessage::NewUser { .. })) => {
                    self.reply_error(handle, "Username is already set")?;
                }
                Ok(Inbound::UnknownType(tag)) => {
                    self.reject_type(handle, &tag)?;
                }
                Err(e) if e.is_recoverable() => {
                    debug!(connection_id = %self.id, error = %e, "Ignoring malformed payload");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Waits for the first usable display name.
    ///
    /// Returns `Ok(None)` if the client quits first.
    async fn await_join(&mut self, handle: &ConnectionHandle) -> Result<Option<String>> {
        while let Some(text) = self.next_text().await? {
            let requested = match Inbound::parse(&text) {
                Ok(Inbound::Structured(ClientMessage::NewUser { username }))
                | Ok(Inbound::Plain(username)) => username,
                Ok(Inbound::Structured(ClientMessage::UserMessage { .. })) => {
                    self.reply_error(handle, "Choose a username before sending messages")?;
                    continue;
                }
                Ok(Inbound::UnknownType(tag)) => {
                    self.reject_type(handle, &tag)?;
                    continue;
                }
                Err(e) if e.is_recoverable() => {
                    debug!(connection_id = %self.id, error = %e, "Ignoring malformed payload");
                    continue;
                }
                Err(e) => return Err(e),
            };

            match validate_display_name(&requested) {
                Ok(name) => return Ok(Some(name)),
                Err(reason) => self.reply_error(handle, reason)?,
            }
        }

        Ok(None)
    }

    /// Reads frames until one carries text.
    ///
    /// Returns `Ok(None)` on end of stream, a close frame, or the close
    /// sentinel payload.
    async fn next_text(&mut self) -> Result<Option<String>> {
        loop {
            let Some(frame) = read_frame(&mut self.reader).await? else {
                debug!(connection_id = %self.id, "Peer closed the stream");
                return Ok(None);
            };

            if frame.is_close_sentinel() || frame.opcode == Opcode::Close {
                debug!(connection_id = %self.id, "Quit requested");
                return Ok(None);
            }

            match frame.opcode {
                Opcode::Text | Opcode::Continuation => {}
                opcode if opcode.is_control() => {
                    trace!(connection_id = %self.id, ?opcode, "Ignoring control frame");
                    continue;
                }
                opcode => {
                    debug!(connection_id = %self.id, ?opcode, "Ignoring non-text frame");
                    continue;
                }
            }

            if !frame.fin {
                trace!(connection_id = %self.id, "Fragment handled as a whole message");
            }

            match frame.as_text() {
                Ok(text) => return Ok(Some(text.to_owned())),
                Err(e) => {
                    debug!(connection_id = %self.id, error = %e, "Ignoring payload");
                }
            }
        }
    }

    /// Broadcasts one chat line from this client.
    fn say(
        &self,
        registry: &Registry,
        handle: &ConnectionHandle,
        name: &str,
        message: &str,
    ) -> Result<()> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(());
        }

        let outbound = ServerMessage::user_message(name, message);
        match registry.broadcast_message(&outbound, Some(self.id), true) {
            Ok(delivered) => {
                trace!(connection_id = %self.id, delivered, "Chat message broadcast");
            }
            Err(e) => {
                debug!(connection_id = %self.id, error = %e, "Chat message rejected");
                self.reply_error(handle, format!("Message rejected: {e}"))?;
            }
        }

        Ok(())
    }

    /// Tells the client its message type is unknown.
    fn reject_type(&self, handle: &ConnectionHandle, tag: &str) -> Result<()> {
        let shown: String = tag.chars().take(MAX_ECHOED_TAG_CHARS).collect();
        debug!(connection_id = %self.id, tag = %shown, "Unknown message type");
        self.reply_error(handle, format!("Invalid Message Type: {shown}"))
    }

    /// Sends an error to this client only.
    ///
    /// Only a stopped writer ends the session; a reply that cannot be
    /// queued is logged and dropped.
    fn reply_error(&self, handle: &ConnectionHandle, message: impl Into<String>) -> Result<()> {
        match handle.send_message(&ServerMessage::error(message)) {
            Ok(()) => Ok(()),
            Err(e) if e.is_connection_error() => Err(e),
            Err(e) => {
                debug!(connection_id = %self.id, error = %e, "Error reply dropped");
                Ok(())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, DuplexStream, duplex};
    use tokio::task::JoinHandle;

    const UPGRADE_REQUEST: &str = "GET / HTTP/1.1\r\n\
        Host: localhost\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    fn start(registry: &Arc<Registry>) -> (DuplexStream, JoinHandle<Result<()>>) {
        let (client, server) = duplex(128 * 1024);
        let connection = Connection::new(ConnectionId::next(), server, peer(), 8 * 1024);
        assert_eq!(connection.state(), ConnectionState::Connecting);
        assert!(connection.display_name().is_none());

        let registry = Arc::clone(registry);
        let task = tokio::spawn(async move { connection.serve(&registry).await });
        (client, task)
    }

    async fn read_head(client: &mut DuplexStream) -> String {
        let mut head = Vec::new();
        while !head.ends_with(b"\r\n\r\n") {
            let byte = client.read_u8().await.expect("response byte");
            head.push(byte);
        }
        String::from_utf8(head).expect("utf-8 head")
    }

    async fn send_masked(client: &mut DuplexStream, opcode: Opcode, payload: &[u8]) {
        let frame = frame::Frame {
            fin: true,
            opcode,
            mask: Some([0xA1, 0xB2, 0xC3, 0xD4]),
            payload: payload.to_vec(),
        };
        client
            .write_all(&frame.to_bytes().expect("encode"))
            .await
            .expect("write frame");
    }

    async fn next_json(client: &mut DuplexStream) -> serde_json::Value {
        let frame = read_frame(client).await.expect("decode").expect("frame");
        serde_json::from_slice(&frame.payload).expect("json payload")
    }

    #[tokio::test]
    async fn test_handshake_failure_is_not_registered() {
        let registry = Arc::new(Registry::new());
        let (mut client, task) = start(&registry);

        client
            .write_all(b"GET / HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n")
            .await
            .expect("write");

        let head = read_head(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 400 Bad Request"));

        let result = task.await.expect("task");
        assert!(matches!(result, Err(Error::HandshakeFailure { .. })));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_plain_request_serves_page() {
        let registry = Arc::new(Registry::new());
        let (mut client, task) = start(&registry);

        client
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .expect("write");

        let mut response = String::new();
        client.read_to_string(&mut response).await.expect("read");

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("<html"));
        task.await.expect("task").expect("served");
    }

    #[tokio::test]
    async fn test_unknown_page_is_404() {
        let registry = Arc::new(Registry::new());
        let (mut client, task) = start(&registry);

        client
            .write_all(b"GET /missing HTTP/1.1\r\n\r\n")
            .await
            .expect("write");

        let head = read_head(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 404 Not Found"));
        task.await.expect("task").expect("served");
    }

    #[tokio::test]
    async fn test_join_chat_and_quit() {
        let registry = Arc::new(Registry::new());
        let (mut client, task) = start(&registry);

        client.write_all(UPGRADE_REQUEST.as_bytes()).await.expect("write");
        let head = read_head(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 101 Switching Protocols"));
        assert!(head.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));

        // Plain text first frame is the display name.
        send_masked(&mut client, Opcode::Text, b"alice").await;
        let joined = next_json(&mut client).await;
        assert_eq!(joined["type"], "notice");
        assert_eq!(joined["message"], "alice has joined");
        assert_eq!(registry.names(), vec!["alice".to_string()]);

        send_masked(&mut client, Opcode::Text, br#"{"type":"user_message","message":"hi"}"#).await;
        let echoed = next_json(&mut client).await;
        assert_eq!(echoed["type"], "user_message");
        assert_eq!(echoed["username"], "alice");
        assert_eq!(echoed["message"], "hi");

        send_masked(&mut client, Opcode::Text, br#"{"type":"shout"}"#).await;
        let error = next_json(&mut client).await;
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], "Invalid Message Type: shout");

        send_masked(&mut client, Opcode::Close, &frame::CLOSE_SENTINEL).await;
        task.await.expect("task").expect("clean quit");
        assert!(registry.is_empty());

        // Socket is closed after the quit.
        assert!(read_frame(&mut client).await.expect("clean eof").is_none());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_ignored() {
        let registry = Arc::new(Registry::new());
        let (mut client, task) = start(&registry);

        client.write_all(UPGRADE_REQUEST.as_bytes()).await.expect("write");
        read_head(&mut client).await;

        send_masked(&mut client, Opcode::Text, br#"{"type":"new_user","username":"bob"}"#).await;
        next_json(&mut client).await;

        // Invalid UTF-8 and a JSON object without a type are skipped.
        send_masked(&mut client, Opcode::Text, &[0xFF, 0xFE, 0xFD]).await;
        send_masked(&mut client, Opcode::Text, br#"{"message":"x"}"#).await;
        send_masked(&mut client, Opcode::Binary, b"\x00\x01").await;
        send_masked(&mut client, Opcode::Ping, b"").await;
        send_masked(&mut client, Opcode::Text, b"still here").await;

        let message = next_json(&mut client).await;
        assert_eq!(message["message"], "still here");

        drop(client);
        task.await.expect("task").expect("eof quit");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_long_unknown_tag_keeps_connection() {
        let registry = Arc::new(Registry::new());
        let (mut client, task) = start(&registry);

        client.write_all(UPGRADE_REQUEST.as_bytes()).await.expect("write");
        read_head(&mut client).await;

        send_masked(&mut client, Opcode::Text, b"erin").await;
        next_json(&mut client).await;

        // Fits in one frame; echoing it back in full would not.
        let tag = "a".repeat(65_500);
        let payload = format!(r#"{{"type":"{tag}"}}"#);
        assert!(payload.len() <= frame::MAX_PAYLOAD_LEN);
        send_masked(&mut client, Opcode::Text, payload.as_bytes()).await;

        let error = next_json(&mut client).await;
        assert_eq!(error["type"], "error");
        let expected = format!("Invalid Message Type: {}", "a".repeat(MAX_ECHOED_TAG_CHARS));
        assert_eq!(error["message"], expected);

        send_masked(&mut client, Opcode::Text, b"still here").await;
        let message = next_json(&mut client).await;
        assert_eq!(message["message"], "still here");
        assert_eq!(registry.names(), vec!["erin".to_string()]);

        drop(client);
        task.await.expect("task").expect("eof quit");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_handle_reports_full_queue() {
        let (handle, mut command_rx) = ConnectionHandle::detached(ConnectionId::next());

        for _ in 0..WRITER_QUEUE_CAPACITY {
            handle.send_text("x").expect("queued");
        }
        assert!(matches!(
            handle.send_text("x"),
            Err(Error::WriterQueueFull { .. })
        ));

        command_rx.recv().await.expect("frame");
        handle.send_text("x").expect("room again");
    }

    #[tokio::test]
    async fn test_protocol_error_leaves_registry() {
        let registry = Arc::new(Registry::new());
        let (mut client, task) = start(&registry);

        client.write_all(UPGRADE_REQUEST.as_bytes()).await.expect("write");
        read_head(&mut client).await;

        send_masked(&mut client, Opcode::Text, b"carol").await;
        next_json(&mut client).await;
        assert_eq!(registry.len(), 1);

        // 64-bit length form.
        let mut bytes = vec![0x81, 0xFF];
        bytes.extend_from_slice(&100_000u64.to_be_bytes());
        client.write_all(&bytes).await.expect("write");

        let result = task.await.expect("task");
        assert!(matches!(result, Err(Error::UnsupportedFrameSize { .. })));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_quit_before_join_is_silent() {
        let registry = Arc::new(Registry::new());
        let (mut client, task) = start(&registry);

        client.write_all(UPGRADE_REQUEST.as_bytes()).await.expect("write");
        read_head(&mut client).await;

        send_masked(&mut client, Opcode::Text, b"   ").await;
        let error = next_json(&mut client).await;
        assert_eq!(error["type"], "error");

        send_masked(&mut client, Opcode::Binary, &frame::CLOSE_SENTINEL).await;
        task.await.expect("task").expect("clean quit");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_handle_trims_and_skips_empty_text() {
        let (handle, mut command_rx) = ConnectionHandle::detached(ConnectionId::next());

        handle.send_text("   ").expect("skip");
        handle.send_text("  hi \n").expect("send");

        match command_rx.recv().await {
            Some(WriterCommand::Frame(bytes)) => assert_eq!(&bytes[..], &[0x81, 0x02, b'h', b'i']),
            other => panic!("expected frame, got {other:?}"),
        }
        assert!(command_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handle_reports_closed_writer() {
        let (handle, command_rx) = ConnectionHandle::detached(ConnectionId::next());
        drop(command_rx);

        assert!(handle.is_closed());
        assert!(matches!(handle.send_text("hi"), Err(Error::ConnectionClosed)));
    }
}
