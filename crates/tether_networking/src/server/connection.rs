//! # Client Connection Tracking
//!
//! Per-connection bookkeeping the server keeps next to the avatar records.

use tether_shared::{ConnectionId, RemoteAvatarId};

/// Client connection data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConnection {
    /// Connection ID.
    pub id: ConnectionId,
    /// Nickname from the handshake. Used as the chat sender name.
    pub nickname: String,
    /// Avatar owned by this connection.
    pub avatar: RemoteAvatarId,
    /// Server tick at which the connection was accepted.
    pub connected_tick: u64,
    /// Messages received from this client, counted before dispatch.
    pub messages_received: u64,
    /// Transform updates refused by the ownership check.
    pub rejected_updates: u64,
}

impl ClientConnection {
    /// Creates a freshly accepted connection.
    #[must_use]
    pub fn new(id: ConnectionId, nickname: String, avatar: RemoteAvatarId, tick: u64) -> Self {
        Self {
            id,
            nickname,
            avatar,
            connected_tick: tick,
            messages_received: 0,
            rejected_updates: 0,
        }
    }
}
