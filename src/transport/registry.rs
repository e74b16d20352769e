//! Broadcast registry of open connections.
//!
//! Tracks every joined connection by [`ConnectionId`] and fans chat
//! traffic out to all of them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Registry                   │
//! │         Mutex<FxHashMap<..>>            │
//! │  ┌─────────────────────────────────┐    │
//! │  │ ConnectionId=1 → "alice", tx ───┼────┼──► writer task 1 ──► socket
//! │  │ ConnectionId=2 → "bob",   tx ───┼────┼──► writer task 2 ──► socket
//! │  └─────────────────────────────────┘    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Join, leave and broadcast each run entirely under the lock. A
//! broadcast encodes its frame once and queues it on every member's
//! writer channel, so each call reaches exactly the membership it
//! observed and never interleaves with a join or leave.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace};

use crate::chat::ServerMessage;
use crate::error::Result;
use crate::identifiers::ConnectionId;
use crate::protocol::frame;

use super::ConnectionHandle;

// ============================================================================
// Types
// ============================================================================

/// A joined connection.
#[derive(Debug)]
struct Member {
    /// Display name chosen at join.
    name: String,
    /// Sending side of the connection.
    handle: ConnectionHandle,
}

type MemberMap = FxHashMap<ConnectionId, Member>;

// ============================================================================
// Registry
// ============================================================================

/// Shared set of open connections.
///
/// Thread-safe; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct Registry {
    /// Joined connections by identity.
    members: Mutex<MemberMap>,
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of joined connections.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    /// Returns `true` if nobody has joined.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    /// Returns `true` if `id` is a member.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.lock().contains_key(&id)
    }

    /// Returns members' display names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .members
            .lock()
            .values()
            .map(|member| member.name.clone())
            .collect();
        names.sort();
        names
    }
}

// ============================================================================
// Registry - Membership
// ============================================================================

impl Registry {
    /// Adds a connection and announces it to everyone, itself included.
    ///
    /// Re-joining with the same identity replaces the earlier entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the notice cannot be encoded; the connection is
    /// not added in that case.
    pub fn join(&self, handle: ConnectionHandle, name: &str) -> Result<()> {
        let notice = encode(&ServerMessage::notice(format!("{name} has joined")))?;
        let id = handle.id();

        let mut members = self.members.lock();
        members.insert(
            id,
            Member {
                name: name.to_string(),
                handle,
            },
        );
        let delivered = deliver(&members, notice, None, true);

        debug!(connection_id = %id, name, members = members.len(), delivered, "Member joined");
        Ok(())
    }

    /// Removes a connection and announces its departure to the rest.
    ///
    /// Idempotent: returns `false` and sends nothing if `id` is not a
    /// member.
    pub fn leave(&self, id: ConnectionId) -> bool {
        let mut members = self.members.lock();

        let Some(member) = members.remove(&id) else {
            trace!(connection_id = %id, "Leave for non-member ignored");
            return false;
        };

        match encode(&ServerMessage::notice(format!("{} has quit", member.name))) {
            Ok(notice) => {
                let delivered = deliver(&members, notice, None, true);
                debug!(connection_id = %id, name = %member.name, delivered, "Member left");
            }
            Err(e) => debug!(connection_id = %id, error = %e, "Departure notice not sent"),
        }

        member.handle.shutdown();
        true
    }

    /// Closes every member's writer and empties the registry.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.members.lock().drain().collect();
        let count = drained.len();

        for (_, member) in drained {
            member.handle.shutdown();
        }

        info!(count, "Registry shut down");
    }
}

// ============================================================================
// Registry - Broadcast
// ============================================================================

impl Registry {
    /// Sends `text` to every member.
    ///
    /// The frame is encoded once. When `include_sender` is `false`, the
    /// member matching `sender` is skipped. A recipient whose writer has
    /// stopped, or whose queue is full, is skipped without affecting the
    /// others. Surrounding whitespace is trimmed and an empty result is not
    /// sent.
    ///
    /// Returns the number of members the frame was queued for.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFrameSize`](crate::Error::UnsupportedFrameSize)
    /// if `text` is too long to encode.
    pub fn broadcast(
        &self,
        text: &str,
        sender: Option<ConnectionId>,
        include_sender: bool,
    ) -> Result<usize> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(0);
        }

        let bytes: Arc<[u8]> = frame::encode_text(text)?.into();
        let members = self.members.lock();
        Ok(deliver(&members, bytes, sender, include_sender))
    }

    /// Serializes `message` and [`broadcast`](Self::broadcast)s it.
    ///
    /// # Errors
    ///
    /// See [`broadcast`](Self::broadcast); also [`Error::Json`](crate::Error::Json).
    pub fn broadcast_message(
        &self,
        message: &ServerMessage,
        sender: Option<ConnectionId>,
        include_sender: bool,
    ) -> Result<usize> {
        self.broadcast(&message.to_json()?, sender, include_sender)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Encodes a server message into a shareable frame.
fn encode(message: &ServerMessage) -> Result<Arc<[u8]>> {
    Ok(frame::encode_text(&message.to_json()?)?.into())
}

/// Queues `bytes` on each selected member. Caller holds the lock.
fn deliver(
    members: &MemberMap,
    bytes: Arc<[u8]>,
    sender: Option<ConnectionId>,
    include_sender: bool,
) -> usize {
    let mut delivered = 0;

    for (id, member) in members {
        if !include_sender && sender == Some(*id) {
            continue;
        }

        match member.handle.send_frame(Arc::clone(&bytes)) {
            Ok(()) => delivered += 1,
            Err(e) => {
                trace!(connection_id = %id, error = %e, "Skipping recipient");
            }
        }
    }

    delivered
}

// ============================================================================
// Tests
// ============================================================================
