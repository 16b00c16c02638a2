//! # Component Storage
//!
//! Pre-allocated, dense component storage.
//!
//! - All slots are allocated at creation
//! - Access is O(1) via entity index

use super::component::Component;

/// Pre-allocated storage for a single component type.
pub struct ComponentStorage<C: Component> {
    data: Box<[C]>,
}

impl<C: Component> ComponentStorage<C> {
    /// Creates storage with `capacity` default-initialized slots.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        Self {
            data: vec![C::default(); capacity].into_boxed_slice(),
        }
    }

    /// Number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Gets the component at `index`, or None if out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&C> {
        self.data.get(index)
    }

    /// Overwrites the slot at `index`.
    ///
    /// Returns `false` if `index` is out of bounds.
    #[inline]
    pub fn set(&mut self, index: usize, component: C) -> bool {
        if let Some(slot) = self.data.get_mut(index) {
            *slot = component;
            true
        } else {
            false
        }
    }

    /// Resets a slot to the default value.
    #[inline]
    pub fn reset(&mut self, index: usize) {
        if let Some(slot) = self.data.get_mut(index) {
            *slot = C::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_shared::Transform;

    #[test]
    fn test_storage_get_set() {
        let mut storage: ComponentStorage<Transform> = ComponentStorage::new(100);
        let t = Transform::at(1.0, 2.0, 3.0);
        assert!(storage.set(50, t));
        assert_eq!(*storage.get(50).unwrap(), t);

        storage.reset(50);
        assert_eq!(*storage.get(50).unwrap(), Transform::IDENTITY);
    }

    #[test]
    fn test_storage_bounds() {
        let mut storage: ComponentStorage<Transform> = ComponentStorage::new(100);
        assert_eq!(storage.capacity(), 100);
        assert!(storage.get(100).is_none());
        assert!(!storage.set(100, Transform::IDENTITY));
    }
}
