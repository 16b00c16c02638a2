//! # Entity Component System
//!
//! Just enough ECS to host replicated avatars.
//!
//! ## Design Philosophy
//!
//! - All storage is pre-allocated at world creation
//! - Components are stored in dense arrays indexed by entity slot
//! - Entity IDs are simple indices with generation counters

mod component;
mod entity;
mod storage;
mod store;
mod world;

pub use component::{Appearance, Component};
pub use entity::{Entity, EntityId};
pub use storage::ComponentStorage;
pub use store::EntityStore;
pub use world::World;
