//! # TETHER Core
//!
//! Entity storage used by both sides of the replication layer.
//!
//! ## Architecture Rules
//!
//! 1. **Handles, not pointers** - entities are generational ids; stale ids fail lookups
//! 2. **Pre-allocated** - component storage is sized once at world creation
//! 3. **One seam** - replication code only talks to [`EntityStore`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use tether_core::{EntityStore, World};
//! use tether_shared::Transform;
//!
//! let mut world = World::new(1024);
//! let id = world.create_entity().unwrap();
//! world.set_transform(id, Transform::at(1.0, 2.0, 3.0));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod ecs;

pub use ecs::{Appearance, Component, ComponentStorage, Entity, EntityId, EntityStore, World};
