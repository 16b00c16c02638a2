//! # Transport Boundary
//!
//! The replication core never touches sockets. It talks to a transport
//! through two narrow seams:
//!
//! - **Server**: a pair of channels. The transport pushes [`NetworkEvent`]s,
//!   the server pushes [`NetworkCommand`]s back. Both are drained only inside
//!   the server tick, so every record has a single writer
//! - **Client**: the [`ClientTransport`] trait, polled from the client update
//!
//! ## Design
//!
//! - Lifecycle messages require the reliable ordered lane
//! - Updates may go over the unreliable lane
//! - Reliability, handshakes and encryption belong to the transport

pub mod loopback;

pub use loopback::{LoopbackClient, LoopbackHub};

use crossbeam_channel::{Receiver, Sender};
use tether_shared::{ConnectionId, Delivery};

use crate::error::ConnectError;

/// Something the transport observed, queued for the server tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A client finished connecting.
    ClientConnected {
        /// Transport-assigned id.
        id: ConnectionId,
        /// Player nickname from the handshake.
        nickname: String,
    },
    /// A client left or timed out.
    ClientDisconnected(ConnectionId),
    /// Raw message bytes from a client.
    PacketReceived {
        /// Sender.
        from: ConnectionId,
        /// One encoded message.
        payload: Vec<u8>,
    },
}

/// Something the server wants the transport to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkCommand {
    /// Deliver one encoded message.
    Send {
        /// Recipient.
        to: ConnectionId,
        /// Lane to use.
        delivery: Delivery,
        /// One encoded message.
        payload: Vec<u8>,
    },
    /// Drop a connection.
    Disconnect(ConnectionId),
    /// Close every connection and stop.
    Shutdown,
}

/// Server side of the transport seam.
pub struct ServerEndpoint {
    /// Inbound events.
    pub events: Receiver<NetworkEvent>,
    /// Outbound commands.
    pub commands: Sender<NetworkCommand>,
}

/// What a client transport hands back from [`ClientTransport::poll`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// One encoded message from the server.
    Packet(Vec<u8>),
    /// The server dropped us or the link died.
    Disconnected,
}

/// Client side of the transport seam.
pub trait ClientTransport {
    /// Opens a connection. Blocks no longer than the transport's own
    /// connect timeout.
    ///
    /// # Errors
    ///
    /// Any reason the connection could not be established.
    fn connect(&mut self, host: &str, port: u16, nickname: &str) -> Result<(), ConnectError>;

    /// Closes the connection. Idempotent.
    fn disconnect(&mut self);

    /// Queues one encoded message. Returns `false` if it was not accepted.
    fn send(&mut self, delivery: Delivery, payload: &[u8]) -> bool;

    /// Next inbound event, if any. Never blocks.
    fn poll(&mut self) -> Option<ClientEvent>;

    /// True between a successful `connect` and the link going away.
    fn is_connected(&self) -> bool;
}

/// Transport statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Messages sent.
    pub packets_sent: u64,
    /// Messages received.
    pub packets_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Messages dropped because the recipient was gone.
    pub send_errors: u64,
}

impl TransportStats {
    /// Records an outbound message.
    #[inline]
    pub fn record_send(&mut self, len: usize) {
        self.packets_sent += 1;
        self.bytes_sent += len as u64;
    }

    /// Records an inbound message.
    #[inline]
    pub fn record_recv(&mut self, len: usize) {
        self.packets_received += 1;
        self.bytes_received += len as u64;
    }
}
