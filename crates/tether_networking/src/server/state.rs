//! # Server State
//!
//! The authoritative avatar set plus everything needed to keep observers in
//! sync with it. Mutated only from the server tick.

use std::collections::BTreeMap;

use crossbeam_channel::Sender;
use tether_shared::protocol::{is_valid_nickname, AvatarSelfUpdate, AvatarSpawn, AvatarUpdate};
use tether_shared::{ConnectionId, NetMessage, RemoteAvatarId, Transform, WriteStream};

use super::avatar::AvatarRecord;
use super::connection::ClientConnection;
use super::relevance::RelevancePolicy;
use crate::ownership::OwnershipModel;
use crate::transport::NetworkCommand;

/// Encodes messages and hands them to the transport.
pub(crate) struct Outbox {
    commands: Sender<NetworkCommand>,
    stream: WriteStream,
    sent: u64,
}

impl Outbox {
    fn new(commands: Sender<NetworkCommand>) -> Self {
        Self {
            commands,
            stream: WriteStream::new(),
            sent: 0,
        }
    }

    /// Encodes and queues `message` for `to`.
    pub(crate) fn send(&mut self, to: ConnectionId, message: &NetMessage) {
        if let Err(error) = message.write_to(&mut self.stream) {
            tracing::warn!("Not sending {:?} to {}: {}", message.id(), to, error);
            return;
        }
        let command = NetworkCommand::Send {
            to,
            delivery: message.delivery(),
            payload: self.stream.as_slice().to_vec(),
        };
        if self.commands.send(command).is_ok() {
            self.sent += 1;
        } else {
            tracing::debug!("Transport gone, dropping {:?} for {}", message.id(), to);
        }
    }

    /// Queues a raw transport command.
    pub(crate) fn command(&self, command: NetworkCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Transport gone, command dropped");
        }
    }
}

/// Why `on_connect` did not create a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// `max_clients` reached.
    ServerFull,
    /// This connection already has an avatar.
    AlreadyConnected,
    /// Null connection id.
    InvalidConnection,
    /// Blank nickname or one too long for a chat sender field.
    InvalidNickname,
}

/// Authoritative world state.
pub struct ServerState {
    records: BTreeMap<RemoteAvatarId, AvatarRecord>,
    connections: BTreeMap<ConnectionId, ClientConnection>,
    ownership: OwnershipModel,
    relevance: Box<dyn RelevancePolicy>,
    pub(crate) outbox: Outbox,
    next_avatar_id: u64,
    max_clients: usize,
    default_spawn_profile: u64,
    tick: u64,
}

impl ServerState {
    /// Creates an empty state that sends through `commands`.
    #[must_use]
    pub fn new(
        commands: Sender<NetworkCommand>,
        relevance: Box<dyn RelevancePolicy>,
        max_clients: usize,
        default_spawn_profile: u64,
    ) -> Self {
        Self {
            records: BTreeMap::new(),
            connections: BTreeMap::new(),
            ownership: OwnershipModel::new(),
            relevance,
            outbox: Outbox::new(commands),
            next_avatar_id: 1,
            max_clients,
            default_spawn_profile: default_spawn_profile.max(1),
            tick: 0,
        }
    }

    /// Replaces the relevance policy. Takes effect at the next refresh.
    pub fn set_relevance(&mut self, relevance: Box<dyn RelevancePolicy>) {
        self.relevance = relevance;
    }

    fn allocate_avatar_id(&mut self) -> RemoteAvatarId {
        let id = RemoteAvatarId(self.next_avatar_id);
        self.next_avatar_id += 1;
        id
    }

    /// Accepts a connection: creates its avatar, tells the owner which avatar
    /// is theirs and spawns everything that is immediately relevant.
    ///
    /// # Errors
    ///
    /// The reason no record was created. A full server also disconnects the
    /// connection.
    pub fn on_connect(&mut self, connection: ConnectionId, nickname: &str) -> Result<RemoteAvatarId, Rejection> {
        if connection.is_null() {
            return Err(Rejection::InvalidConnection);
        }
        if !is_valid_nickname(nickname) {
            tracing::warn!("Refusing {}: invalid nickname {:?}", connection, nickname);
            self.outbox.command(NetworkCommand::Disconnect(connection));
            return Err(Rejection::InvalidNickname);
        }
        if self.connections.contains_key(&connection) {
            tracing::warn!("{} connected twice, ignoring", connection);
            return Err(Rejection::AlreadyConnected);
        }
        if self.connections.len() >= self.max_clients {
            tracing::warn!("Server full ({} clients), refusing {}", self.max_clients, connection);
            self.outbox.command(NetworkCommand::Disconnect(connection));
            return Err(Rejection::ServerFull);
        }

        let id = self.allocate_avatar_id();
        if let Err(error) = self.ownership.assign(id, connection) {
            // Fresh ids and an unseen connection make this unreachable in practice
            tracing::warn!("Ownership assignment failed: {}", error);
            return Err(Rejection::AlreadyConnected);
        }
        self.records
            .insert(id, AvatarRecord::new(id, connection, self.default_spawn_profile));
        self.connections
            .insert(connection, ClientConnection::new(connection, nickname.to_string(), id, self.tick));

        self.outbox.send(connection, &NetMessage::AvatarAssign(id));
        tracing::info!("{} ({}) connected, owns {}", connection, nickname, id);

        self.refresh_relevance();
        Ok(id)
    }

    /// Despawns the connection's avatar everywhere it was visible and
    /// destroys the record. Returns `false` for an unknown connection.
    pub fn on_disconnect(&mut self, connection: ConnectionId) -> bool {
        let Some(client) = self.connections.remove(&connection) else {
            return false;
        };

        if let Some(record) = self.records.remove(&client.avatar) {
            for peer in record.visible_to.iter().copied().filter(|&p| p != connection) {
                self.outbox.send(peer, &NetMessage::AvatarDespawn(record.id));
            }
        }
        self.ownership.release(client.avatar);

        // Nothing more goes to this connection
        for record in self.records.values_mut() {
            record.visible_to.remove(&connection);
        }

        tracing::info!(
            "{} ({}) disconnected after {} ticks and {} messages, {} destroyed",
            connection,
            client.nickname,
            self.tick.saturating_sub(client.connected_tick),
            client.messages_received,
            client.avatar
        );
        true
    }

    /// Counts one inbound message from `connection`. Returns `false` for an
    /// unknown connection.
    pub fn note_message(&mut self, connection: ConnectionId) -> bool {
        let Some(client) = self.connections.get_mut(&connection) else {
            return false;
        };
        client.messages_received += 1;
        true
    }

    /// Applies a client transform if `connection` owns `avatar`.
    ///
    /// Unauthorized or unknown updates are dropped without any reply.
    pub fn on_update_received(&mut self, connection: ConnectionId, avatar: RemoteAvatarId, transform: Transform) -> bool {
        if !self.ownership.is_authorized(avatar, connection) {
            if let Some(client) = self.connections.get_mut(&connection) {
                client.rejected_updates += 1;
            }
            tracing::debug!("Dropping update for {} from non-owner {}", avatar, connection);
            return false;
        }
        let Some(record) = self.records.get_mut(&avatar) else {
            return false;
        };

        record.transform = transform;
        record.dirty = true;
        true
    }

    /// Changes an avatar's profile and tells every observer, owner included.
    pub fn set_spawn_profile(&mut self, avatar: RemoteAvatarId, spawn_profile: u64) -> bool {
        if spawn_profile == 0 {
            return false;
        }
        let Some(record) = self.records.get_mut(&avatar) else {
            return false;
        };
        record.spawn_profile = spawn_profile;

        let message = NetMessage::AvatarSelfUpdate(avatar, AvatarSelfUpdate { spawn_profile });
        for &observer in &record.visible_to {
            self.outbox.send(observer, &message);
        }
        true
    }

    /// Re-evaluates every (avatar, observer) pair.
    ///
    /// Newly relevant pairs get a spawn immediately followed by the current
    /// transform; pairs that lost relevance get a despawn.
    pub fn refresh_relevance(&mut self) {
        let mut changes = Vec::new();
        for subject in self.records.values() {
            for (&observer, client) in &self.connections {
                let should_see = observer == subject.owner_connection
                    || self
                        .records
                        .get(&client.avatar)
                        .is_some_and(|viewer| self.relevance.is_relevant(subject, viewer));
                if should_see != subject.is_visible_to(observer) {
                    changes.push((subject.id, observer, should_see));
                }
            }
        }

        for (avatar, observer, visible) in changes {
            let Some(record) = self.records.get_mut(&avatar) else {
                continue;
            };
            if visible {
                record.visible_to.insert(observer);
                let spawn = NetMessage::AvatarSpawn(
                    avatar,
                    AvatarSpawn {
                        spawn_profile: record.spawn_profile,
                    },
                );
                self.outbox.send(observer, &spawn);
                if observer != record.owner_connection {
                    let update = NetMessage::AvatarUpdate(
                        avatar,
                        AvatarUpdate {
                            transform: record.transform,
                        },
                    );
                    self.outbox.send(observer, &update);
                }
                tracing::debug!("{} now relevant to {}", avatar, observer);
            } else {
                record.visible_to.remove(&observer);
                self.outbox.send(observer, &NetMessage::AvatarDespawn(avatar));
                tracing::debug!("{} no longer relevant to {}", avatar, observer);
            }
        }
    }

    /// Sends each dirty record's transform to its non-owner observers, once.
    pub fn broadcast_dirty(&mut self) -> usize {
        let mut broadcast = 0;
        for record in self.records.values_mut().filter(|r| r.dirty) {
            record.dirty = false;
            let message = NetMessage::AvatarUpdate(
                record.id,
                AvatarUpdate {
                    transform: record.transform,
                },
            );
            for observer in record.broadcast_targets() {
                self.outbox.send(observer, &message);
            }
            broadcast += 1;
        }
        broadcast
    }

    /// Sends `message` to every connection.
    pub fn broadcast(&mut self, message: &NetMessage) -> usize {
        for &connection in self.connections.keys() {
            self.outbox.send(connection, message);
        }
        self.connections.len()
    }

    /// Advances the tick counter.
    pub(crate) fn advance_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Current tick.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Record for `avatar`.
    #[must_use]
    pub fn record(&self, avatar: RemoteAvatarId) -> Option<&AvatarRecord> {
        self.records.get(&avatar)
    }

    /// All records in id order.
    pub fn records(&self) -> impl Iterator<Item = &AvatarRecord> {
        self.records.values()
    }

    /// Connection bookkeeping.
    #[must_use]
    pub fn connection(&self, connection: ConnectionId) -> Option<&ClientConnection> {
        self.connections.get(&connection)
    }

    /// Ids of every connected client.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// Number of connected clients.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Ownership table.
    #[must_use]
    pub const fn ownership(&self) -> &OwnershipModel {
        &self.ownership
    }

    /// Messages handed to the transport so far.
    #[must_use]
    pub const fn messages_sent(&self) -> u64 {
        self.outbox.sent
    }
}
