//! # Entity Store
//!
//! The narrow surface replication code uses to touch entities. Anything that
//! can create, destroy and position entities can host replicas.

use tether_shared::Transform;

use super::component::Appearance;
use super::entity::EntityId;
use super::world::World;

/// Entity storage as seen by the replication layer.
pub trait EntityStore {
    /// Creates a fresh entity. `None` if the store is full.
    fn create_entity(&mut self) -> Option<EntityId>;

    /// Destroys an entity. Returns `false` for stale or unknown handles.
    fn destroy_entity(&mut self, id: EntityId) -> bool;

    /// Whether `id` is still a live entity.
    fn is_alive(&self, id: EntityId) -> bool;

    /// Current transform of an entity.
    fn transform(&self, id: EntityId) -> Option<Transform>;

    /// Moves an entity. Returns `false` for stale or unknown handles.
    fn set_transform(&mut self, id: EntityId, transform: Transform) -> bool;

    /// Spawn profile currently applied to an entity.
    fn spawn_profile(&self, id: EntityId) -> Option<u64>;

    /// Applies a spawn profile. Returns `false` for stale or unknown handles.
    fn set_spawn_profile(&mut self, id: EntityId, spawn_profile: u64) -> bool;
}

impl EntityStore for World {
    fn create_entity(&mut self) -> Option<EntityId> {
        let id = self.spawn();
        (!id.is_null()).then_some(id)
    }

    fn destroy_entity(&mut self, id: EntityId) -> bool {
        self.despawn(id)
    }

    fn is_alive(&self, id: EntityId) -> bool {
        World::is_alive(self, id)
    }

    fn transform(&self, id: EntityId) -> Option<Transform> {
        let idx = self.live_index(id)?;
        self.transforms.get(idx).copied()
    }

    fn set_transform(&mut self, id: EntityId, transform: Transform) -> bool {
        match self.live_index(id) {
            Some(idx) => self.transforms.set(idx, transform),
            None => false,
        }
    }

    fn spawn_profile(&self, id: EntityId) -> Option<u64> {
        let idx = self.live_index(id)?;
        self.appearances.get(idx).map(|a| a.spawn_profile)
    }

    fn set_spawn_profile(&mut self, id: EntityId, spawn_profile: u64) -> bool {
        match self.live_index(id) {
            Some(idx) => self.appearances.set(idx, Appearance { spawn_profile }),
            None => false,
        }
    }
}
