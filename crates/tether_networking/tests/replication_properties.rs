//! # Replication Properties
//!
//! Randomized and multi-peer checks of the invariants every tick must keep:
//!
//! - Only the owner ever moves an avatar
//! - No client hears about an id before its spawn or after its despawn
//! - Relevance loss despawns, regaining relevance respawns
//! - A full server or a bad nickname is refused without creating records,
//!   and the refused client reports why
//!
//! Run with: cargo test --package tether_networking --test replication_properties

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tether_core::World;
use tether_networking::transport::ClientEvent;
use tether_networking::{
    ClientTransport, ConnectError, HeadlessControls, LoopbackClient, LoopbackHub, ReplicaSettings, ReplicationConfig,
    ReplicationServer, SessionClient, SessionStateKind,
};
use tether_shared::protocol::AvatarUpdate;
use tether_shared::{ConnectionId, NetMessage, RemoteAvatarId, Transform};

const HOST: &str = "127.0.0.1";
const PORT: u16 = 7777;
const TICK: f32 = 1.0 / 60.0;

/// A raw connection that checks lifecycle ordering as messages arrive.
struct Observer {
    link: LoopbackClient,
    visible: HashSet<RemoteAvatarId>,
    violations: Vec<String>,
}

impl Observer {
    fn connect(hub: &LoopbackHub, nickname: &str) -> Self {
        let mut link = hub.client();
        link.connect(HOST, PORT, nickname).unwrap();
        Self {
            link,
            visible: HashSet::new(),
            violations: Vec::new(),
        }
    }

    fn id(&self) -> ConnectionId {
        self.link.connection_id().unwrap()
    }

    fn send_move(&mut self, avatar: RemoteAvatarId, transform: Transform) {
        let message = NetMessage::AvatarUpdate(avatar, AvatarUpdate { transform });
        self.link.send(message.delivery(), &message.encode().unwrap());
    }

    fn observe(&mut self) {
        while let Some(event) = self.link.poll() {
            let ClientEvent::Packet(bytes) = event else {
                continue;
            };
            match NetMessage::decode(&bytes).unwrap() {
                NetMessage::AvatarSpawn(id, _) => {
                    if !self.visible.insert(id) {
                        self.violations.push(format!("double spawn of {id}"));
                    }
                }
                NetMessage::AvatarDespawn(id) => {
                    if !self.visible.remove(&id) {
                        self.violations.push(format!("despawn of unseen {id}"));
                    }
                }
                NetMessage::AvatarUpdate(id, _) | NetMessage::AvatarSelfUpdate(id, _) => {
                    if !self.visible.contains(&id) {
                        self.violations.push(format!("update for unseen {id}"));
                    }
                }
                _ => {}
            }
        }
    }
}

fn server(config: ReplicationConfig) -> (LoopbackHub, ReplicationServer) {
    let (hub, endpoint) = LoopbackHub::new(HOST, PORT);
    (hub, ReplicationServer::new(config, endpoint))
}

#[test]
fn verify_only_owner_moves_avatar() {
    let mut rng = StdRng::seed_from_u64(0x7e7e);
    let (hub, mut server) = server(ReplicationConfig::default());

    let mut peers: Vec<Observer> = (0..6).map(|i| Observer::connect(&hub, &format!("p{i}"))).collect();
    server.tick();
    let avatars: Vec<RemoteAvatarId> = peers.iter().map(|p| server.avatar_of(p.id()).unwrap()).collect();
    let mut expected: HashMap<RemoteAvatarId, Transform> =
        avatars.iter().map(|&a| (a, server.record(a).unwrap().transform)).collect();

    for round in 0..200 {
        let sender = rng.gen_range(0..peers.len());
        let target = avatars[rng.gen_range(0..avatars.len())];
        #[allow(clippy::cast_precision_loss)]
        let transform = Transform::at(round as f32, rng.gen_range(-10.0..10.0), 0.0);

        peers[sender].send_move(target, transform);
        server.tick();

        if avatars[sender] == target {
            expected.insert(target, transform);
        }
        for &avatar in &avatars {
            assert_eq!(server.record(avatar).unwrap().transform, expected[&avatar]);
        }
    }
}

#[test]
fn verify_no_message_before_spawn_or_after_despawn() {
    let mut rng = StdRng::seed_from_u64(42);
    let (hub, mut server) = server(ReplicationConfig {
        relevance_radius: Some(15.0),
        ..ReplicationConfig::default()
    });

    let mut peers: Vec<Option<Observer>> = Vec::new();
    for round in 0..300 {
        // Join, leave or move
        match rng.gen_range(0..10) {
            0 => peers.push(Some(Observer::connect(&hub, &format!("j{round}")))),
            1 if !peers.is_empty() => {
                let index = rng.gen_range(0..peers.len());
                if let Some(mut peer) = peers[index].take() {
                    peer.link.disconnect();
                    assert!(peer.violations.is_empty(), "{:?}", peer.violations);
                }
            }
            2 if !peers.is_empty() => {
                let index = rng.gen_range(0..peers.len());
                let avatar = peers[index]
                    .as_ref()
                    .and_then(|peer| server.avatar_of(peer.id()));
                if let Some(avatar) = avatar {
                    server.set_spawn_profile(avatar, rng.gen_range(1..5));
                }
            }
            _ => {
                for peer in peers.iter_mut().flatten() {
                    if let Some(avatar) = server.avatar_of(peer.id()) {
                        let x = rng.gen_range(-30.0..30.0);
                        peer.send_move(avatar, Transform::at(x, 0.0, 0.0));
                    }
                }
            }
        }

        server.tick();
        hub.pump();
        for peer in peers.iter_mut().flatten() {
            peer.observe();
        }
    }

    for peer in peers.iter().flatten() {
        assert!(peer.violations.is_empty(), "{:?}", peer.violations);
    }
}

#[test]
fn verify_relevance_loss_and_regain() {
    let (hub, mut server) = server(ReplicationConfig {
        relevance_radius: Some(10.0),
        ..ReplicationConfig::default()
    });
    let mut near = Observer::connect(&hub, "near");
    let mut mover = Observer::connect(&hub, "mover");
    server.tick();
    hub.pump();
    near.observe();
    mover.observe();

    let avatar = server.avatar_of(mover.id()).unwrap();
    assert!(near.visible.contains(&avatar));

    mover.send_move(avatar, Transform::at(100.0, 0.0, 0.0));
    server.tick();
    hub.pump();
    near.observe();
    assert!(!near.visible.contains(&avatar));
    assert!(!server.record(avatar).unwrap().is_visible_to(near.id()));

    mover.send_move(avatar, Transform::at(1.0, 0.0, 0.0));
    server.tick();
    hub.pump();
    near.observe();
    assert!(near.visible.contains(&avatar));
    assert!(near.violations.is_empty(), "{:?}", near.violations);
}

#[test]
fn verify_full_server_refuses_without_record() {
    let (hub, mut server) = server(ReplicationConfig {
        max_clients: 1,
        ..ReplicationConfig::default()
    });
    let settings = ReplicaSettings::default();
    let mut first = SessionClient::new(hub.client(), World::new(8), HeadlessControls, settings);
    let mut second = SessionClient::new(hub.client(), World::new(8), HeadlessControls, settings);

    first.connect(HOST, PORT, "First").unwrap();
    second.connect(HOST, PORT, "Second").unwrap();
    server.tick();
    hub.pump();
    first.update(TICK);
    second.update(TICK);

    assert_eq!(server.client_count(), 1);
    assert_eq!(server.state().records().count(), 1);
    assert_eq!(first.state(), SessionStateKind::Connected);
    assert_eq!(second.state(), SessionStateKind::Menu);
    assert!(second.replicas().is_empty());
    assert!(matches!(second.last_error(), Some(ConnectError::Refused(_))));
    assert!(first.last_error().is_none());
    assert_eq!(hub.connection_count(), 1);
}

#[test]
fn verify_bad_nickname_refused_without_record() {
    let (hub, mut server) = server(ReplicationConfig::default());
    let long = "n".repeat(tether_shared::MAX_NICKNAME_LEN + 1);
    let mut blank = Observer::connect(&hub, "");
    let mut oversized = Observer::connect(&hub, &long);
    let mut fine = Observer::connect(&hub, "Fine");

    server.tick();
    hub.pump();

    assert_eq!(server.client_count(), 1);
    assert_eq!(server.state().records().count(), 1);
    assert_eq!(hub.connection_count(), 1);
    for refused in [&mut blank, &mut oversized] {
        assert_eq!(refused.link.poll(), Some(ClientEvent::Disconnected));
        assert!(!refused.link.is_connected());
    }

    // The accepted peer never hears about the refused ones
    fine.observe();
    assert_eq!(fine.visible.len(), 1);
    assert!(fine.violations.is_empty(), "{:?}", fine.violations);
}
