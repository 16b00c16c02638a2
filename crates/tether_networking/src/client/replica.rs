//! # Entity Replicas
//!
//! Client-side mirror of the avatars the server has told us about.
//!
//! ## Lifecycle
//!
//! ```text
//! (untracked) ──spawn──▶ Tracked(Local | Remote) ──despawn──▶ (removed)
//! ```
//!
//! - The local avatar is driven by input, never by the network. Network
//!   updates and despawns aimed at it are ignored
//! - Remote avatars feed every update into their interpolator
//! - Messages for ids that are not tracked are dropped

use std::collections::HashMap;

use tether_core::{EntityId, EntityStore};
use tether_shared::{RemoteAvatarId, Transform};

use crate::config::ReplicationConfig;
use crate::interpolation::{Easing, InterpolationState};

/// What drives a replica's transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReplicaKind {
    /// This client's own avatar. Input writes the transform.
    Local,
    /// Someone else's avatar. Network samples are interpolated.
    Remote(InterpolationState),
}

/// Read-only description of a tracked avatar.
pub trait Describable {
    /// Server-assigned id.
    fn server_id(&self) -> RemoteAvatarId;

    /// True for this client's own avatar.
    fn is_local(&self) -> bool;

    /// Profile currently applied.
    fn spawn_profile(&self) -> u64;

    /// One-line summary for logs and debug overlays.
    fn describe(&self) -> String {
        let role = if self.is_local() { "local" } else { "remote" };
        format!("{} ({role}, profile {})", self.server_id(), self.spawn_profile())
    }
}

/// Something that owns an entity and can release it.
pub trait Destructible {
    /// Destroys the backing entity. Returns `false` if it was already gone.
    fn destroy(self, store: &mut dyn EntityStore) -> bool;
}

/// One tracked avatar.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityReplica {
    /// Server-assigned id.
    pub server_id: RemoteAvatarId,
    /// Local or remote behaviour.
    pub kind: ReplicaKind,
    /// Backing entity.
    pub handle: EntityId,
    /// Applied profile.
    pub spawn_profile: u64,
}

impl Describable for EntityReplica {
    fn server_id(&self) -> RemoteAvatarId {
        self.server_id
    }

    fn is_local(&self) -> bool {
        matches!(self.kind, ReplicaKind::Local)
    }

    fn spawn_profile(&self) -> u64 {
        self.spawn_profile
    }
}

impl Destructible for EntityReplica {
    fn destroy(self, store: &mut dyn EntityStore) -> bool {
        store.destroy_entity(self.handle)
    }
}

/// Interpolation parameters applied to every remote replica.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReplicaSettings {
    /// Expected seconds between server samples.
    pub tick_interval: f32,
    /// Blend overshoot factor.
    pub compensation_factor: f32,
    /// Blend curve.
    pub easing: Easing,
}

impl ReplicaSettings {
    /// Derives settings from the shared configuration.
    #[must_use]
    pub fn from_config(config: &ReplicationConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            compensation_factor: config.compensation_factor,
            easing: config.easing,
        }
    }
}

impl Default for ReplicaSettings {
    fn default() -> Self {
        Self::from_config(&ReplicationConfig::default())
    }
}

/// All replicas known to this client, keyed by server id.
#[derive(Debug, Default)]
pub struct ReplicaRegistry {
    replicas: HashMap<RemoteAvatarId, EntityReplica>,
    local_id: Option<RemoteAvatarId>,
    settings: ReplicaSettings,
}

impl ReplicaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(settings: ReplicaSettings) -> Self {
        Self {
            replicas: HashMap::new(),
            local_id: None,
            settings,
        }
    }

    /// Designates `id` as this client's own avatar.
    ///
    /// Normally arrives before the matching spawn. If the spawn came first
    /// the replica is converted to local in place.
    pub fn on_assign(&mut self, id: RemoteAvatarId) {
        if let Some(previous) = self.local_id.filter(|&p| p != id) {
            tracing::warn!("Local avatar reassigned from {} to {}, ignoring", previous, id);
            return;
        }
        self.local_id = Some(id);
        if let Some(replica) = self.replicas.get_mut(&id) {
            replica.kind = ReplicaKind::Local;
        }
        tracing::info!("Local avatar is {}", id);
    }

    /// Starts tracking a spawned avatar.
    ///
    /// Returns `false` for a duplicate spawn or when the store is full.
    pub fn on_spawn<S: EntityStore>(&mut self, store: &mut S, id: RemoteAvatarId, spawn_profile: u64) -> bool {
        if self.replicas.contains_key(&id) {
            tracing::debug!("Duplicate spawn for {}, ignoring", id);
            return false;
        }
        let Some(handle) = store.create_entity() else {
            tracing::warn!("Entity store full, cannot spawn {}", id);
            return false;
        };
        store.set_spawn_profile(handle, spawn_profile);

        let kind = if self.local_id == Some(id) {
            ReplicaKind::Local
        } else {
            let initial = store.transform(handle).unwrap_or(Transform::IDENTITY);
            ReplicaKind::Remote(InterpolationState::new(
                initial,
                self.settings.tick_interval,
                self.settings.compensation_factor,
                self.settings.easing,
            ))
        };

        let replica = EntityReplica {
            server_id: id,
            kind,
            handle,
            spawn_profile,
        };
        tracing::info!("Spawned {}", replica.describe());
        self.replicas.insert(id, replica);
        true
    }

    /// Stops tracking a remote avatar and destroys its entity.
    ///
    /// Unknown ids and the local avatar are ignored.
    pub fn on_despawn<S: EntityStore>(&mut self, store: &mut S, id: RemoteAvatarId) -> bool {
        let Some(replica) = self.replicas.get(&id) else {
            tracing::debug!("Despawn for untracked {}, ignoring", id);
            return false;
        };
        if replica.is_local() {
            tracing::warn!("Server tried to despawn the local avatar {}, ignoring", id);
            return false;
        }
        let Some(replica) = self.replicas.remove(&id) else {
            return false;
        };
        tracing::info!("Despawned {}", id);
        replica.destroy(store)
    }

    /// Feeds a transform sample to a remote avatar's interpolator.
    ///
    /// Unknown ids and the local avatar are ignored.
    pub fn on_update<S: EntityStore>(&mut self, store: &S, id: RemoteAvatarId, transform: Transform) -> bool {
        let Some(replica) = self.replicas.get_mut(&id) else {
            tracing::debug!("Update for untracked {}, ignoring", id);
            return false;
        };
        let ReplicaKind::Remote(state) = &mut replica.kind else {
            tracing::debug!("Network update for local avatar {}, ignoring", id);
            return false;
        };
        let rendered = store.transform(replica.handle).unwrap_or_else(|| state.current());
        state.set_target(transform, rendered, self.settings.tick_interval);
        true
    }

    /// Applies a new spawn profile, local or not.
    pub fn on_self_update<S: EntityStore>(&mut self, store: &mut S, id: RemoteAvatarId, spawn_profile: u64) -> bool {
        let Some(replica) = self.replicas.get_mut(&id) else {
            tracing::debug!("Self-update for untracked {}, ignoring", id);
            return false;
        };
        replica.spawn_profile = spawn_profile;
        store.set_spawn_profile(replica.handle, spawn_profile)
    }

    /// Advances every remote interpolator by `dt` seconds and writes the
    /// result into the store.
    pub fn tick<S: EntityStore>(&mut self, store: &mut S, dt: f32) {
        for replica in self.replicas.values_mut() {
            if let ReplicaKind::Remote(state) = &mut replica.kind {
                let rendered = state.advance(dt);
                store.set_transform(replica.handle, rendered);
            }
        }
    }

    /// Writes an input-driven transform into the local avatar.
    ///
    /// Returns `false` until the local avatar has spawned.
    pub fn apply_local_transform<S: EntityStore>(&mut self, store: &mut S, transform: Transform) -> bool {
        match self.local() {
            Some(replica) => store.set_transform(replica.handle, transform),
            None => false,
        }
    }

    /// Destroys every replica, the local one included, and forgets the
    /// local designation. Returns how many were removed.
    pub fn teardown<S: EntityStore>(&mut self, store: &mut S) -> usize {
        let count = self.replicas.len();
        for (_, replica) in self.replicas.drain() {
            replica.destroy(store);
        }
        self.local_id = None;
        if count > 0 {
            tracing::info!("Tore down {} replicas", count);
        }
        count
    }

    /// Replica for `id`.
    #[must_use]
    pub fn get(&self, id: RemoteAvatarId) -> Option<&EntityReplica> {
        self.replicas.get(&id)
    }

    /// This client's own replica, once spawned.
    #[must_use]
    pub fn local(&self) -> Option<&EntityReplica> {
        self.local_id.and_then(|id| self.replicas.get(&id))
    }

    /// Designated local id, spawned or not.
    #[must_use]
    pub const fn local_id(&self) -> Option<RemoteAvatarId> {
        self.local_id
    }

    /// All replicas, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityReplica> {
        self.replicas.values()
    }

    /// Number of tracked replicas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    /// True if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    /// Interpolation settings.
    #[must_use]
    pub const fn settings(&self) -> &ReplicaSettings {
        &self.settings
    }
}
