//! # Entity Handles
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into component arrays
//! - A generation counter so a reused slot never answers to an old handle

use std::fmt;

/// Opaque entity handle.
///
/// - Lower 32 bits: slot index
/// - Upper 32 bits: generation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a handle from slot index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Null/invalid handle.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this handle is null.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

/// One entity slot and the components attached to it.
#[derive(Clone, Copy, Debug)]
pub struct Entity {
    /// Current handle for this slot.
    pub id: EntityId,
    /// Bitmask of attached components (bit = `Component::ID`).
    pub component_mask: u64,
    /// Whether the slot is in use.
    pub alive: bool,
}

impl Entity {
    /// Creates a live entity with no components.
    #[inline]
    #[must_use]
    pub const fn new(id: EntityId) -> Self {
        Self {
            id,
            component_mask: 0,
            alive: true,
        }
    }

    /// Creates a free slot.
    #[inline]
    #[must_use]
    pub const fn dead() -> Self {
        Self {
            id: EntityId::NULL,
            component_mask: 0,
            alive: false,
        }
    }

    /// Checks the component bit.
    #[inline]
    #[must_use]
    pub const fn has_component(self, component_id: u8) -> bool {
        (self.component_mask & (1 << component_id)) != 0
    }

    /// Sets the component bit.
    #[inline]
    pub fn add_component(&mut self, component_id: u8) {
        self.component_mask |= 1 << component_id;
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::dead()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_roundtrip() {
        let id = EntityId::new(12345, 67890);
        assert_eq!(id.index(), 12345);
        assert_eq!(id.generation(), 67890);
        assert!(!id.is_null());
        assert!(EntityId::default().is_null());
    }

    #[test]
    fn test_component_mask() {
        let mut entity = Entity::new(EntityId::new(0, 1));
        assert!(!entity.has_component(1));
        entity.add_component(1);
        assert!(entity.has_component(1));
        assert!(!entity.has_component(0));
    }
}
