//! # Replication Soak
//!
//! Runs a server and N bot clients over the loopback transport at the
//! configured tick rate, then reports traffic and convergence.
//!
//! Each bot connects through its own session state machine, walks a circle
//! around the origin and checks at the end that every peer it can see has
//! converged to the server's authoritative transform.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use tether_core::{EntityStore, World};
use tether_networking::logging::init_logging;
use tether_networking::{
    Describable, HeadlessControls, LoopbackClient, LoopbackHub, ReplicaSettings, ReplicationConfig,
    ReplicationServer, SessionClient, TickLoop, WorldEvent,
};
use tether_shared::protocol::Weather;
use tether_shared::{Quaternion, Transform, Vec3};

const HOST: &str = "127.0.0.1";
const PORT: u16 = 7777;

/// Avatar replication soak test over the in-process transport.
#[derive(Parser, Debug)]
#[command(name = "replication_soak", version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured tick rate.
    #[arg(long)]
    tick_rate: Option<u32>,

    /// Number of bot clients.
    #[arg(short, long, default_value_t = 32)]
    bots: usize,

    /// Run time in seconds.
    #[arg(short, long, default_value_t = 10)]
    duration: u64,
}

type Bot = SessionClient<LoopbackClient, World>;

const WEATHER_CYCLE: [Weather; 4] = [Weather::Clear, Weather::Clouds, Weather::Rain, Weather::Fog];

/// Weather and hour for the environment broadcast at `tick`.
fn cycle_weather(tick: u64) -> (Weather, f32) {
    let step = tick / 100;
    let weather = WEATHER_CYCLE[(step % WEATHER_CYCLE.len() as u64) as usize];
    #[allow(clippy::cast_precision_loss)]
    let hour = (step % 24) as f32;
    (weather, hour)
}

fn bot_transform(index: usize, tick: u64) -> Transform {
    #[allow(clippy::cast_precision_loss)]
    let phase = index as f32 * 0.37 + tick as f32 * 0.02;
    Transform::new(
        Vec3::new(phase.cos() * 20.0, 0.0, phase.sin() * 20.0),
        Quaternion::from_yaw(phase),
    )
}

/// Peers whose rendered transform is within tolerance of the server's.
fn converged_peers(bot: &Bot, server: &ReplicationServer) -> (usize, usize) {
    let mut seen = 0;
    let mut converged = 0;
    for replica in bot.replicas().iter().filter(|r| !r.is_local()) {
        seen += 1;
        let rendered = bot.store().transform(replica.handle);
        let authoritative = server.record(replica.server_id).map(|r| r.transform);
        if let (Some(rendered), Some(authoritative)) = (rendered, authoritative) {
            if rendered.position.distance_squared(authoritative.position) < 1e-3 {
                converged += 1;
            }
        }
    }
    (seen, converged)
}

fn load_config(args: &Args) -> Result<ReplicationConfig, tether_networking::ConfigError> {
    let mut config = match &args.config {
        Some(path) => ReplicationConfig::load(path)?,
        None => ReplicationConfig::default(),
    };
    if let Some(rate) = args.tick_rate {
        config.tick_rate = rate;
    }
    config.max_clients = config.max_clients.max(args.bots);
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("replication_soak: {error}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.log_level);

    tracing::info!(
        "Soak: {} bots, {} Hz, {}s, relevance radius {:?}",
        args.bots,
        config.tick_rate,
        args.duration,
        config.relevance_radius
    );

    let (hub, endpoint) = LoopbackHub::new(HOST, PORT);
    let settings = ReplicaSettings::from_config(&config);
    let mut server = ReplicationServer::new(config.clone(), endpoint);
    let mut tick_loop = TickLoop::new(config.tick_rate);
    let dt = tick_loop.tick_duration().as_secs_f32();

    let mut bots: Vec<Bot> = Vec::with_capacity(args.bots);
    for index in 0..args.bots {
        let mut bot = SessionClient::new(hub.client(), World::new(args.bots + 1), HeadlessControls, settings);
        if let Err(error) = bot.connect(HOST, PORT, &format!("bot{index}")) {
            tracing::warn!("bot{} failed to connect: {}", index, error);
        }
        bots.push(bot);
    }

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let started = Instant::now();
    while Instant::now() < deadline {
        if !tick_loop.should_tick() {
            tick_loop.wait_for_next_tick();
            continue;
        }
        let start = tick_loop.begin_tick();
        let tick = tick_loop.tick_count();

        for (index, bot) in bots.iter_mut().enumerate() {
            bot.send_local_transform(bot_transform(index, tick));
        }
        if tick % u64::from(config.tick_rate.saturating_mul(5)) == 0 {
            let (weather, hour) = cycle_weather(tick);
            if let Err(error) = server.broadcast_world_event(WorldEvent::WorldState {
                weather,
                time_of_day: hour,
            }) {
                tracing::warn!("World event rejected: {}", error);
            }
        }

        server.tick();
        hub.pump();
        for bot in &mut bots {
            bot.update(dt);
        }
        tick_loop.end_tick(start);
    }

    // Let the last samples settle
    for _ in 0..4 {
        server.tick();
        hub.pump();
        for bot in &mut bots {
            bot.update(dt);
        }
    }

    let (seen, converged) = bots
        .iter()
        .map(|bot| converged_peers(bot, &server))
        .fold((0, 0), |(s, c), (bs, bc)| (s + bs, c + bc));
    let stats = tick_loop.stats();
    let transport = hub.stats();

    tracing::info!(
        "Ran {} ticks in {:.1}s: avg {}us, max {}us, {} late",
        stats.total_ticks,
        started.elapsed().as_secs_f32(),
        stats.avg_tick_us,
        stats.max_tick_us,
        stats.late_ticks
    );
    tracing::info!(
        "Server queued {} messages, delivered {} ({} bytes), {} undeliverable",
        server.state().messages_sent(),
        transport.packets_sent,
        transport.bytes_sent,
        transport.send_errors
    );
    tracing::info!("Remote replicas converged: {}/{}", converged, seen);

    server.shutdown();
    hub.pump();
    for bot in &mut bots {
        bot.update(dt);
    }

    if converged == seen {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
