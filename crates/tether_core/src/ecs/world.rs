//! # World
//!
//! Fixed-capacity container for avatar entities and their components.

use tether_shared::Transform;

use super::component::{Appearance, Component};
use super::entity::{Entity, EntityId};
use super::storage::ComponentStorage;

/// Container for all locally simulated entities.
///
/// Slots are pre-allocated. Despawned slots go back on a free list and come
/// back with a bumped generation, so stale handles fail every lookup.
pub struct World {
    entities: Box<[Entity]>,
    free_indices: Vec<u32>,
    alive_count: usize,
    capacity: usize,

    /// Transform storage.
    pub transforms: ComponentStorage<Transform>,
    /// Appearance storage.
    pub appearances: ComponentStorage<Appearance>,
}

impl World {
    /// Creates a world with room for `capacity` entities.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or exceeds `u32::MAX`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            u32::try_from(capacity).is_ok(),
            "Capacity cannot exceed u32::MAX"
        );

        let entities = (0..capacity)
            .map(|_| Entity::dead())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        #[allow(clippy::cast_possible_truncation)]
        let free_indices: Vec<u32> = (0..capacity as u32).rev().collect();

        Self {
            entities,
            free_indices,
            alive_count: 0,
            capacity,
            transforms: ComponentStorage::new(capacity),
            appearances: ComponentStorage::new(capacity),
        }
    }

    /// Maximum number of simultaneously alive entities.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Spawns an entity with a transform and an appearance attached.
    ///
    /// Returns `EntityId::NULL` when the world is full.
    pub fn spawn(&mut self) -> EntityId {
        let Some(index) = self.free_indices.pop() else {
            tracing::warn!("World full ({} entities), spawn refused", self.capacity);
            return EntityId::NULL;
        };

        let idx = index as usize;
        let generation = self.entities[idx].id.generation().wrapping_add(1);
        let id = EntityId::new(index, generation);

        let mut entity = Entity::new(id);
        entity.add_component(<Transform as Component>::ID);
        entity.add_component(Appearance::ID);
        self.entities[idx] = entity;
        self.alive_count += 1;

        id
    }

    /// Despawns an entity and frees its slot.
    ///
    /// Returns `false` if the handle was null, stale or already dead.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        let Some(idx) = self.live_index(id) else {
            return false;
        };

        let entity = &mut self.entities[idx];
        entity.alive = false;
        entity.component_mask = 0;
        self.alive_count -= 1;
        self.free_indices.push(id.index());

        self.transforms.reset(idx);
        self.appearances.reset(idx);

        true
    }

    /// Checks that `id` refers to a live entity of the current generation.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.live_index(id).is_some()
    }

    /// Gets the entity slot for a live handle.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.live_index(id).map(|idx| &self.entities[idx])
    }

    /// Iterates over the handles of all alive entities.
    pub fn iter_alive(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().filter(|e| e.alive).map(|e| e.id)
    }

    /// Slot index for a live handle.
    #[inline]
    pub(crate) fn live_index(&self, id: EntityId) -> Option<usize> {
        if id.is_null() {
            return None;
        }
        let idx = id.index() as usize;
        let entity = self.entities.get(idx)?;
        (entity.alive && entity.id.generation() == id.generation()).then_some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_spawn_despawn() {
        let mut world = World::new(8);
        let a = world.spawn();
        let b = world.spawn();
        assert!(world.is_alive(a));
        assert!(world.is_alive(b));
        assert_eq!(world.alive_count(), 2);

        assert!(world.despawn(a));
        assert!(!world.is_alive(a));
        assert!(!world.despawn(a));
        assert_eq!(world.alive_count(), 1);
    }

    #[test]
    fn test_world_reused_slot_rejects_stale_handle() {
        let mut world = World::new(1);
        let first = world.spawn();
        world.despawn(first);
        let second = world.spawn();

        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(!world.is_alive(first));
        assert!(world.is_alive(second));
    }

    #[test]
    fn test_world_capacity_limit() {
        let mut world = World::new(2);
        assert!(!world.spawn().is_null());
        assert!(!world.spawn().is_null());
        assert!(world.spawn().is_null());
    }

    #[test]
    fn test_world_spawned_entity_has_components() {
        let mut world = World::new(4);
        let id = world.spawn();
        let entity = world.get(id).unwrap();
        assert!(entity.has_component(<Transform as Component>::ID));
        assert!(entity.has_component(Appearance::ID));
        assert_eq!(world.iter_alive().count(), 1);
    }
}
