//! # Session Client
//!
//! Client-side replication and session lifecycle.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SESSION CLIENT                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Session FSM  │  │ Dispatcher   │  │ Transport    │       │
//! │  │ (lifecycle)  │  │ (by id)      │  │ (polled)     │       │
//! │  └──────────────┘  └──────┬───────┘  └──────────────┘       │
//! │                           │                                 │
//! │              ┌────────────▼────────────┐                    │
//! │              │ Replica registry        │                    │
//! │              │ local: input driven     │                    │
//! │              │ remote: interpolated    │                    │
//! │              └────────────┬────────────┘                    │
//! │                           ▼                                 │
//! │                     Entity store                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inbound messages are applied only inside [`SessionClient::update`].

pub mod replica;
pub mod session;

pub use replica::{
    Describable, Destructible, EntityReplica, ReplicaKind, ReplicaRegistry, ReplicaSettings,
};
pub use session::{
    ConnectionSession, ControlSurface, HeadlessControls, SessionHost, SessionStateKind,
    SessionStateMachine,
};

use std::collections::VecDeque;

use tether_core::EntityStore;
use tether_shared::protocol::{AvatarUpdate, ChatMessage, WorldState};
use tether_shared::{Dispatcher, MessageId, NetMessage, RemoteAvatarId, Transform, WriteStream};

use crate::error::ConnectError;
use crate::transport::{ClientEvent, ClientTransport};

/// Chat lines kept by [`ReplicationContext`].
pub const CHAT_HISTORY: usize = 64;

/// Everything inbound messages are allowed to touch.
pub struct ReplicationContext<S> {
    /// Entity storage the replicas live in.
    pub store: S,
    /// Tracked avatars.
    pub replicas: ReplicaRegistry,
    chat_log: VecDeque<ChatMessage>,
    world_state: Option<WorldState>,
}

impl<S: EntityStore> ReplicationContext<S> {
    /// Creates an empty context over `store`.
    #[must_use]
    pub fn new(store: S, settings: ReplicaSettings) -> Self {
        Self {
            store,
            replicas: ReplicaRegistry::new(settings),
            chat_log: VecDeque::with_capacity(CHAT_HISTORY),
            world_state: None,
        }
    }

    /// Most recent chat lines, oldest first.
    pub fn chat_log(&self) -> impl Iterator<Item = &ChatMessage> {
        self.chat_log.iter()
    }

    /// Last environment state received.
    #[must_use]
    pub const fn world_state(&self) -> Option<&WorldState> {
        self.world_state.as_ref()
    }

    fn push_chat(&mut self, line: ChatMessage) {
        if self.chat_log.len() == CHAT_HISTORY {
            self.chat_log.pop_front();
        }
        self.chat_log.push_back(line);
    }

    /// Drops replicas, chat and world state.
    fn reset(&mut self) {
        self.replicas.teardown(&mut self.store);
        self.chat_log.clear();
        self.world_state = None;
    }
}

fn handle_spawn<S: EntityStore>(ctx: &mut ReplicationContext<S>, _origin: (), message: NetMessage) {
    if let NetMessage::AvatarSpawn(id, body) = message {
        ctx.replicas.on_spawn(&mut ctx.store, id, body.spawn_profile);
    }
}

fn handle_despawn<S: EntityStore>(ctx: &mut ReplicationContext<S>, _origin: (), message: NetMessage) {
    if let NetMessage::AvatarDespawn(id) = message {
        ctx.replicas.on_despawn(&mut ctx.store, id);
    }
}

fn handle_update<S: EntityStore>(ctx: &mut ReplicationContext<S>, _origin: (), message: NetMessage) {
    if let NetMessage::AvatarUpdate(id, body) = message {
        ctx.replicas.on_update(&ctx.store, id, body.transform);
    }
}

fn handle_self_update<S: EntityStore>(ctx: &mut ReplicationContext<S>, _origin: (), message: NetMessage) {
    if let NetMessage::AvatarSelfUpdate(id, body) = message {
        ctx.replicas.on_self_update(&mut ctx.store, id, body.spawn_profile);
    }
}

fn handle_assign<S: EntityStore>(ctx: &mut ReplicationContext<S>, _origin: (), message: NetMessage) {
    if let NetMessage::AvatarAssign(id) = message {
        ctx.replicas.on_assign(id);
    }
}

fn handle_chat<S: EntityStore>(ctx: &mut ReplicationContext<S>, _origin: (), message: NetMessage) {
    if let NetMessage::Chat(line) = message {
        tracing::info!("[chat] {}: {}", line.sender, line.text);
        ctx.push_chat(line);
    }
}

fn handle_world_state<S: EntityStore>(ctx: &mut ReplicationContext<S>, _origin: (), message: NetMessage) {
    if let NetMessage::WorldState(state) = message {
        tracing::debug!("World state: weather {} at {:.2}h", state.weather, state.time_of_day);
        ctx.world_state = Some(state);
    }
}

/// Borrows the pieces of a [`SessionClient`] the state machine drives.
struct Host<'a, T, S, U> {
    transport: &'a mut T,
    context: &'a mut ReplicationContext<S>,
    controls: &'a mut U,
}

impl<T: ClientTransport, S: EntityStore, U: ControlSurface> SessionHost for Host<'_, T, S, U> {
    fn open_connection(&mut self, host: &str, port: u16, nickname: &str) -> Result<(), ConnectError> {
        tracing::info!("Connecting to {}:{} as {}", host, port, nickname);
        self.transport.connect(host, port, nickname)
    }

    fn close_connection(&mut self) {
        self.transport.disconnect();
    }

    fn is_link_up(&self) -> bool {
        self.transport.is_connected()
    }

    fn is_avatar_assigned(&self) -> bool {
        self.context.replicas.local_id().is_some()
    }

    fn teardown_replicas(&mut self) {
        self.context.reset();
    }

    fn controls(&mut self) -> &mut dyn ControlSurface {
        &mut *self.controls
    }
}

/// Client facade: session lifecycle plus replication.
pub struct SessionClient<T, S, U = HeadlessControls> {
    transport: T,
    context: ReplicationContext<S>,
    controls: U,
    machine: SessionStateMachine,
    dispatcher: Dispatcher<ReplicationContext<S>, ()>,
    stream: WriteStream,
}

impl<T: ClientTransport, S: EntityStore, U: ControlSurface> SessionClient<T, S, U> {
    /// Creates a client sitting in the menu.
    #[must_use]
    pub fn new(transport: T, store: S, controls: U, settings: ReplicaSettings) -> Self {
        let dispatcher = Dispatcher::<ReplicationContext<S>, ()>::new()
            .with(MessageId::AvatarSpawn, handle_spawn::<S>)
            .with(MessageId::AvatarDespawn, handle_despawn::<S>)
            .with(MessageId::AvatarUpdate, handle_update::<S>)
            .with(MessageId::AvatarSelfUpdate, handle_self_update::<S>)
            .with(MessageId::AvatarAssign, handle_assign::<S>)
            .with(MessageId::Chat, handle_chat::<S>)
            .with(MessageId::WorldState, handle_world_state::<S>);

        let mut client = Self {
            transport,
            context: ReplicationContext::new(store, settings),
            controls,
            machine: SessionStateMachine::new(),
            dispatcher,
            stream: WriteStream::new(),
        };
        client.drive_session();
        client
    }

    /// Connects and enters play.
    ///
    /// # Errors
    ///
    /// Validation errors from the request, or whatever the transport
    /// reported. The session is back in the menu afterwards.
    pub fn connect(&mut self, host: &str, port: u16, nickname: &str) -> Result<(), ConnectError> {
        self.machine.request_connect(host, port, nickname)?;
        self.drive_session();
        if self.machine.state() == SessionStateKind::Connected {
            return Ok(());
        }
        Err(self
            .machine
            .last_error()
            .cloned()
            .unwrap_or_else(|| ConnectError::Refused("connection closed during handshake".to_string())))
    }

    /// Leaves play: closes the transport and destroys every replica.
    pub fn disconnect(&mut self) {
        self.machine.request_disconnect();
        self.drive_session();
    }

    /// Applies an input-driven transform to the local avatar and sends it to
    /// the server. Does nothing outside `Connected` or before the server has
    /// assigned an avatar.
    pub fn send_local_transform(&mut self, transform: Transform) -> bool {
        if !self.is_connected() {
            return false;
        }
        let Some(id) = self.context.replicas.local_id() else {
            return false;
        };
        self.context
            .replicas
            .apply_local_transform(&mut self.context.store, transform);
        self.send(&NetMessage::AvatarUpdate(id, AvatarUpdate { transform }))
    }

    /// Sends a chat line. The server stamps the sender.
    pub fn send_chat(&mut self, text: &str) -> bool {
        if !self.is_connected() {
            return false;
        }
        let message = NetMessage::Chat(ChatMessage {
            sender: self.machine.session().nickname.clone(),
            text: text.to_string(),
        });
        self.send(&message)
    }

    fn send(&mut self, message: &NetMessage) -> bool {
        if let Err(error) = message.write_to(&mut self.stream) {
            tracing::debug!("Not sending {:?}: {}", message.id(), error);
            return false;
        }
        self.transport.send(message.delivery(), self.stream.as_slice())
    }

    /// One client frame.
    ///
    /// 1. Drain the transport through the dispatcher
    /// 2. Let the session react to requests and link loss
    /// 3. Advance remote interpolation by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        while let Some(event) = self.transport.poll() {
            match event {
                ClientEvent::Packet(bytes) => {
                    self.dispatcher.dispatch(&mut self.context, (), &bytes);
                }
                ClientEvent::Disconnected => {
                    tracing::info!("Connection to server lost");
                    break;
                }
            }
        }
        self.drive_session();
        self.context.replicas.tick(&mut self.context.store, dt);
    }

    fn drive_session(&mut self) {
        let mut host = Host {
            transport: &mut self.transport,
            context: &mut self.context,
            controls: &mut self.controls,
        };
        self.machine.settle(&mut host);
    }

    /// Current session state.
    #[must_use]
    pub const fn state(&self) -> SessionStateKind {
        self.machine.state()
    }

    /// True while playing.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.machine.state() == SessionStateKind::Connected
    }

    /// Session details.
    #[must_use]
    pub const fn session(&self) -> &ConnectionSession {
        self.machine.session()
    }

    /// Error from the last failed connect.
    #[must_use]
    pub const fn last_error(&self) -> Option<&ConnectError> {
        self.machine.last_error()
    }

    /// Tracked avatars.
    #[must_use]
    pub const fn replicas(&self) -> &ReplicaRegistry {
        &self.context.replicas
    }

    /// Server id of this client's avatar, once assigned.
    #[must_use]
    pub const fn local_avatar(&self) -> Option<RemoteAvatarId> {
        self.context.replicas.local_id()
    }

    /// Replication context (store, replicas, chat, world state).
    #[must_use]
    pub const fn context(&self) -> &ReplicationContext<S> {
        &self.context
    }

    /// Entity storage.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.context.store
    }

    /// UI side-effect sink.
    #[must_use]
    pub const fn controls(&self) -> &U {
        &self.controls
    }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably. Inbound traffic is still only applied
    /// by [`Self::update`].
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplicationConfig;
    use crate::server::ReplicationServer;
    use crate::transport::{LoopbackClient, LoopbackHub};
    use tether_core::World;

    const HOST: &str = "127.0.0.1";
    const PORT: u16 = 7777;

    type TestClient = SessionClient<LoopbackClient, World>;

    fn setup() -> (LoopbackHub, ReplicationServer) {
        let (hub, endpoint) = LoopbackHub::new(HOST, PORT);
        let server = ReplicationServer::new(ReplicationConfig::default(), endpoint);
        (hub, server)
    }

    fn client(hub: &LoopbackHub) -> TestClient {
        SessionClient::new(hub.client(), World::new(64), HeadlessControls, ReplicaSettings::default())
    }

    fn step(hub: &LoopbackHub, server: &mut ReplicationServer, clients: &mut [&mut TestClient]) {
        server.tick();
        hub.pump();
        for client in clients.iter_mut() {
            client.update(1.0 / 60.0);
        }
    }

    #[test]
    fn test_new_client_sits_in_menu() {
        let (hub, _server) = setup();
        let client = client(&hub);
        assert_eq!(client.state(), SessionStateKind::Menu);
        assert!(client.replicas().is_empty());
    }

    #[test]
    fn test_connect_spawns_local_avatar() {
        let (hub, mut server) = setup();
        let mut alice = client(&hub);
        alice.connect(HOST, PORT, "Alice").unwrap();
        step(&hub, &mut server, &mut [&mut alice]);

        let local = alice.replicas().local().unwrap();
        assert!(local.is_local());
        assert_eq!(alice.replicas().len(), 1);
        assert_eq!(alice.store().alive_count(), 1);
    }

    #[test]
    fn test_unreachable_stays_in_menu() {
        let (hub, _server) = setup();
        let mut alice = client(&hub);
        let err = alice.connect(HOST, 27015, "Alice").unwrap_err();
        assert!(matches!(err, ConnectError::Unreachable { port: 27015, .. }));
        assert_eq!(alice.state(), SessionStateKind::Menu);
        assert!(!alice.send_local_transform(Transform::at(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_send_local_transform_reaches_server() {
        let (hub, mut server) = setup();
        let mut alice = client(&hub);
        alice.connect(HOST, PORT, "Alice").unwrap();
        step(&hub, &mut server, &mut [&mut alice]);

        let avatar = alice.local_avatar().unwrap();
        assert!(alice.send_local_transform(Transform::at(3.0, 0.0, 1.0)));
        server.tick();

        assert_eq!(server.record(avatar).unwrap().transform, Transform::at(3.0, 0.0, 1.0));
    }

    #[test]
    fn test_disconnect_clears_everything() {
        let (hub, mut server) = setup();
        let mut alice = client(&hub);
        let mut bob = client(&hub);
        alice.connect(HOST, PORT, "Alice").unwrap();
        bob.connect(HOST, PORT, "Bob").unwrap();
        step(&hub, &mut server, &mut [&mut alice, &mut bob]);
        assert_eq!(alice.replicas().len(), 2);

        alice.disconnect();
        assert_eq!(alice.state(), SessionStateKind::Menu);
        assert!(alice.replicas().is_empty());
        assert_eq!(alice.store().alive_count(), 0);

        step(&hub, &mut server, &mut [&mut bob]);
        assert_eq!(server.client_count(), 1);
        assert_eq!(bob.replicas().len(), 1);
    }

    #[test]
    fn test_chat_round_trip() {
        let (hub, mut server) = setup();
        let mut alice = client(&hub);
        alice.connect(HOST, PORT, "Alice").unwrap();
        step(&hub, &mut server, &mut [&mut alice]);

        assert!(alice.send_chat("hi"));
        assert!(!alice.send_chat("   "));
        step(&hub, &mut server, &mut [&mut alice]);

        let lines: Vec<_> = alice.context().chat_log().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].sender, "Alice");
        assert_eq!(lines[0].text, "hi");
    }

    #[test]
    fn test_server_shutdown_returns_to_menu() {
        let (hub, mut server) = setup();
        let mut alice = client(&hub);
        alice.connect(HOST, PORT, "Alice").unwrap();
        step(&hub, &mut server, &mut [&mut alice]);

        server.shutdown();
        hub.pump();
        alice.update(1.0 / 60.0);

        assert_eq!(alice.state(), SessionStateKind::Menu);
        assert!(alice.replicas().is_empty());
    }
}
