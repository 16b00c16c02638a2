//! # Components
//!
//! Components are pure data containers: `Copy`, fixed size, zeroable.

use bytemuck::{Pod, Zeroable};
use tether_shared::Transform;

/// Marker trait for ECS components.
pub trait Component: Copy + Pod + Zeroable + Default + Send + Sync + 'static {
    /// Bit in `Entity::component_mask` (0-63).
    const ID: u8;
}

impl Component for Transform {
    const ID: u8 = 0;
}

/// Which model/skin an avatar is rendered with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Appearance {
    /// Spawn profile from the server. Zero means "not yet applied".
    pub spawn_profile: u64,
}

impl Component for Appearance {
    const ID: u8 = 1;
}
