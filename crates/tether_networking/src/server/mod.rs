//! # Replication Server
//!
//! The authoritative side of avatar replication.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    REPLICATION SERVER                     │
//! ├───────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌───────────────┐    │
//! │  │ Event Queue │──▶│ Dispatcher  │──▶│ ServerState   │    │
//! │  │ (transport) │   │ (by id)     │   │ records/owner │    │
//! │  └─────────────┘   └─────────────┘   └───────┬───────┘    │
//! │                                              │            │
//! │                    ┌─────────────────────────▼──────┐     │
//! │                    │ Relevance → spawn / despawn    │     │
//! │                    │ Dirty records → one update     │     │
//! │                    └────────────────────────────────┘     │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - An observer receives `AvatarSpawn` before any other message for that avatar
//! - Only the owning connection can move an avatar
//! - Each avatar is broadcast at most once per tick

mod avatar;
mod connection;
mod relevance;
mod state;
mod tick;

pub use avatar::AvatarRecord;
pub use connection::ClientConnection;
pub use relevance::{AlwaysRelevant, RadiusRelevance, RelevancePolicy};
pub use state::{Rejection, ServerState};
pub use tick::{TickLoop, TickStats};

use crossbeam_channel::Receiver;
use tether_shared::protocol::{ChatMessage, Weather, WorldState};
use tether_shared::{CodecError, CodecResult, ConnectionId, Dispatcher, MessageId, NetMessage, RemoteAvatarId, Transform};

use crate::config::ReplicationConfig;
use crate::transport::{NetworkCommand, NetworkEvent, ServerEndpoint};

/// Non-avatar state pushed to every client.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
    /// Server-originated chat line.
    Chat {
        /// Displayed sender.
        sender: String,
        /// Text.
        text: String,
    },
    /// Environment change.
    WorldState {
        /// Weather.
        weather: Weather,
        /// Hours since midnight, `[0, 24)`.
        time_of_day: f32,
    },
}

impl WorldEvent {
    fn into_message(self) -> NetMessage {
        match self {
            Self::Chat { sender, text } => NetMessage::Chat(ChatMessage { sender, text }),
            Self::WorldState { weather, time_of_day } => {
                NetMessage::WorldState(WorldState::new(weather, time_of_day))
            }
        }
    }
}

type ConnectionCallback = Box<dyn FnMut(ConnectionId) + Send>;

fn handle_avatar_update(state: &mut ServerState, from: ConnectionId, message: NetMessage) {
    if let NetMessage::AvatarUpdate(avatar, body) = message {
        state.on_update_received(from, avatar, body.transform);
    }
}

fn handle_chat(state: &mut ServerState, from: ConnectionId, message: NetMessage) {
    let NetMessage::Chat(body) = message else {
        return;
    };
    // The sender name comes from the handshake, never from the client payload
    let Some(sender) = state.connection(from).map(|c| c.nickname.clone()) else {
        return;
    };
    tracing::info!("[chat] {}: {}", sender, body.text);
    state.broadcast(&NetMessage::Chat(ChatMessage { sender, text: body.text }));
}

/// Authoritative replication server.
pub struct ReplicationServer {
    config: ReplicationConfig,
    state: ServerState,
    dispatcher: Dispatcher<ServerState, ConnectionId>,
    events: Receiver<NetworkEvent>,
    connect_callbacks: Vec<ConnectionCallback>,
    disconnect_callbacks: Vec<ConnectionCallback>,
}

impl ReplicationServer {
    /// Creates a server bound to a transport endpoint.
    ///
    /// Relevance is radius-based if `relevance_radius` is set, otherwise
    /// every avatar is relevant to every connection.
    #[must_use]
    pub fn new(config: ReplicationConfig, endpoint: ServerEndpoint) -> Self {
        let relevance: Box<dyn RelevancePolicy> = match config.relevance_radius {
            Some(radius) => Box::new(RadiusRelevance::new(radius)),
            None => Box::new(AlwaysRelevant),
        };
        let state = ServerState::new(
            endpoint.commands,
            relevance,
            config.max_clients,
            config.default_spawn_profile,
        );
        let dispatcher = Dispatcher::<ServerState, ConnectionId>::new()
            .with(MessageId::AvatarUpdate, handle_avatar_update)
            .with(MessageId::Chat, handle_chat);

        tracing::info!(
            "Replication server ready: {} Hz, max {} clients",
            config.tick_rate,
            config.max_clients
        );

        Self {
            config,
            state,
            dispatcher,
            events: endpoint.events,
            connect_callbacks: Vec::new(),
            disconnect_callbacks: Vec::new(),
        }
    }

    /// Replaces the relevance policy.
    #[must_use]
    pub fn with_relevance(mut self, relevance: impl RelevancePolicy + 'static) -> Self {
        self.state.set_relevance(Box::new(relevance));
        self
    }

    /// Runs `callback` after every accepted connection.
    pub fn register_connect_callback(&mut self, callback: impl FnMut(ConnectionId) + Send + 'static) {
        self.connect_callbacks.push(Box::new(callback));
    }

    /// Runs `callback` after every disconnection of an accepted connection.
    pub fn register_disconnect_callback(&mut self, callback: impl FnMut(ConnectionId) + Send + 'static) {
        self.disconnect_callbacks.push(Box::new(callback));
    }

    /// Processes one server tick.
    ///
    /// 1. Drain transport events
    /// 2. Refresh relevance (spawns before updates)
    /// 3. Broadcast dirty records
    pub fn tick(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }
        self.state.refresh_relevance();
        self.state.broadcast_dirty();
        self.state.advance_tick();
    }

    fn handle_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::ClientConnected { id, nickname } => {
                self.on_connect(id, &nickname);
            }
            NetworkEvent::ClientDisconnected(id) => {
                self.on_disconnect(id);
            }
            NetworkEvent::PacketReceived { from, payload } => {
                if !self.state.note_message(from) {
                    tracing::debug!("Dropping message from unknown {}", from);
                    return;
                }
                self.dispatcher.dispatch(&mut self.state, from, &payload);
            }
        }
    }

    /// Accepts a connection. Returns the new avatar id, or `None` if refused.
    pub fn on_connect(&mut self, connection: ConnectionId, nickname: &str) -> Option<RemoteAvatarId> {
        let avatar = self.state.on_connect(connection, nickname).ok()?;
        for callback in &mut self.connect_callbacks {
            callback(connection);
        }
        Some(avatar)
    }

    /// Removes a connection and its avatar.
    pub fn on_disconnect(&mut self, connection: ConnectionId) -> bool {
        if !self.state.on_disconnect(connection) {
            return false;
        }
        for callback in &mut self.disconnect_callbacks {
            callback(connection);
        }
        true
    }

    /// Applies a client transform after the ownership check.
    pub fn on_update_received(&mut self, connection: ConnectionId, avatar: RemoteAvatarId, transform: Transform) -> bool {
        self.state.on_update_received(connection, avatar, transform)
    }

    /// Changes an avatar's spawn profile and notifies its observers.
    pub fn set_spawn_profile(&mut self, avatar: RemoteAvatarId, spawn_profile: u64) -> bool {
        self.state.set_spawn_profile(avatar, spawn_profile)
    }

    /// Sends a chat line or world-state change to every connection.
    ///
    /// # Errors
    ///
    /// `Invalid` if the event would be rejected by clients (blank chat,
    /// out-of-range time of day).
    pub fn broadcast_world_event(&mut self, event: WorldEvent) -> CodecResult<usize> {
        let message = event.into_message();
        if !message.is_valid() {
            return Err(CodecError::Invalid(message.id()));
        }
        Ok(self.state.broadcast(&message))
    }

    /// Disconnects everyone and asks the transport to stop.
    pub fn shutdown(&mut self) {
        for connection in self.state.connection_ids() {
            self.state.outbox.command(NetworkCommand::Disconnect(connection));
            self.on_disconnect(connection);
        }
        self.state.outbox.command(NetworkCommand::Shutdown);
        tracing::info!("Replication server shut down at tick {}", self.state.tick());
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Authoritative state.
    #[must_use]
    pub const fn state(&self) -> &ServerState {
        &self.state
    }

    /// Record for `avatar`.
    #[must_use]
    pub fn record(&self, avatar: RemoteAvatarId) -> Option<&AvatarRecord> {
        self.state.record(avatar)
    }

    /// Avatar owned by `connection`.
    #[must_use]
    pub fn avatar_of(&self, connection: ConnectionId) -> Option<RemoteAvatarId> {
        self.state.ownership().avatar_of(connection)
    }

    /// Number of connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.state.connection_count()
    }

    /// Ticks processed.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.state.tick()
    }
}
