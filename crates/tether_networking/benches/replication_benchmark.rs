//! # Replication Benchmark
//!
//! Hot paths of one replication tick:
//! - Encoding and decoding avatar messages
//! - Advancing remote interpolators
//! - A full server tick with every avatar dirty
//!
//! Run with: `cargo bench --package tether_networking`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use crossbeam_channel::unbounded;
use tether_core::World;
use tether_networking::transport::ServerEndpoint;
use tether_networking::{
    Easing, InterpolationState, ReplicaRegistry, ReplicaSettings, ReplicationConfig, ReplicationServer,
};
use tether_shared::protocol::AvatarUpdate;
use tether_shared::{ConnectionId, NetMessage, Quaternion, RemoteAvatarId, Transform, Vec3, WriteStream};

const TICK: f32 = 1.0 / 60.0;

fn sample(i: u64) -> Transform {
    #[allow(clippy::cast_precision_loss)]
    let f = i as f32;
    Transform::new(Vec3::new(f, f * 0.5, -f), Quaternion::from_yaw(f * 0.1))
}

fn bench_codec(c: &mut Criterion) {
    let message = NetMessage::AvatarUpdate(RemoteAvatarId(42), AvatarUpdate { transform: sample(7) });
    let bytes = message.encode().unwrap();
    let mut stream = WriteStream::new();

    c.bench_function("encode_avatar_update", |b| {
        b.iter(|| {
            black_box(&message).write_to(&mut stream).unwrap();
            black_box(stream.as_slice().len())
        });
    });

    c.bench_function("decode_avatar_update", |b| {
        b.iter(|| black_box(NetMessage::decode(black_box(&bytes)).unwrap()));
    });
}

fn bench_interpolation(c: &mut Criterion) {
    c.bench_function("interpolator_advance", |b| {
        let mut state = InterpolationState::new(Transform::IDENTITY, TICK, 1.5, Easing::SmoothStep);
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            if i % 4 == 0 {
                let rendered = state.current();
                state.set_target(sample(i), rendered, TICK);
            }
            black_box(state.advance(TICK / 4.0))
        });
    });

    let mut group = c.benchmark_group("replica_tick");
    for count in [64_u64, 512, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let capacity = usize::try_from(count).unwrap_or(usize::MAX);
            let mut world = World::new(capacity);
            let mut replicas = ReplicaRegistry::new(ReplicaSettings::default());
            for id in 1..=count {
                replicas.on_spawn(&mut world, RemoteAvatarId(id), 1);
                replicas.on_update(&world, RemoteAvatarId(id), sample(id));
            }
            b.iter(|| {
                replicas.tick(&mut world, TICK / 2.0);
                black_box(world.alive_count())
            });
        });
    }
    group.finish();
}

fn bench_server_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("server_tick_all_dirty");
    for clients in [16_u32, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(clients), &clients, |b, &clients| {
            let (_event_tx, event_rx) = unbounded();
            let (command_tx, command_rx) = unbounded();
            let config = ReplicationConfig {
                max_clients: clients as usize,
                ..ReplicationConfig::default()
            };
            let mut server = ReplicationServer::new(
                config,
                ServerEndpoint {
                    events: event_rx,
                    commands: command_tx,
                },
            );
            let avatars: Vec<_> = (1..=clients)
                .filter_map(|id| server.on_connect(ConnectionId(id), "bench").map(|a| (ConnectionId(id), a)))
                .collect();

            let mut frame = 0u64;
            b.iter(|| {
                frame += 1;
                for &(connection, avatar) in &avatars {
                    server.on_update_received(connection, avatar, sample(frame));
                }
                server.tick();
                black_box(command_rx.try_iter().count())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_codec, bench_interpolation, bench_server_tick);
criterion_main!(benches);
