//! # TETHER Networking
//!
//! Avatar replication between one authoritative server and many clients,
//! plus the client session lifecycle around it.
//!
//! ## Architecture
//!
//! - **Server**: authoritative avatar records, ownership checks, relevance
//!   driven spawn/despawn and at most one transform broadcast per tick
//! - **Client**: replica registry (local avatar input driven, remote avatars
//!   interpolated) behind a session state machine
//! - **Transport**: a narrow seam. Anything that delivers whole messages on a
//!   reliable ordered lane and an unreliable lane will do
//!
//! ## Authority Model
//!
//! ```text
//! CLIENT                                SERVER
//!   |                                     |
//!   |--- AvatarUpdate (own avatar) ------>| <- owner check, else dropped
//!   |                                     |
//!   |<-- AvatarSpawn / Update / Despawn --| <- relevance decides who sees what
//!   |                                     |
//! ```
//!
//! Clients never create or destroy avatars. The server ALWAYS decides.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tether_core::World;
//! use tether_networking::{
//!     HeadlessControls, LoopbackHub, ReplicaSettings, ReplicationConfig, ReplicationServer,
//!     SessionClient,
//! };
//!
//! let (hub, endpoint) = LoopbackHub::new("127.0.0.1", 7777);
//! let mut server = ReplicationServer::new(ReplicationConfig::default(), endpoint);
//! let mut client = SessionClient::new(hub.client(), World::new(256), HeadlessControls, ReplicaSettings::default());
//!
//! client.connect("127.0.0.1", 7777, "Alice")?;
//! server.tick();
//! hub.pump();
//! client.update(1.0 / 60.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod interpolation;
pub mod logging;
pub mod ownership;
pub mod server;
pub mod transport;

// Re-exports for convenience
pub use client::{
    ConnectionSession, ControlSurface, Describable, Destructible, EntityReplica, HeadlessControls,
    ReplicaKind, ReplicaRegistry, ReplicaSettings, ReplicationContext, SessionClient,
    SessionStateKind, SessionStateMachine,
};
pub use config::ReplicationConfig;
pub use error::{ConfigError, ConnectError};
pub use interpolation::{Easing, InterpolationState};
pub use ownership::{OwnershipError, OwnershipModel};
pub use server::{
    AlwaysRelevant, AvatarRecord, RadiusRelevance, RelevancePolicy, ReplicationServer, TickLoop,
    WorldEvent,
};
pub use transport::{ClientTransport, LoopbackClient, LoopbackHub, NetworkCommand, NetworkEvent};
