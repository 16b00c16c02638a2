//! Mathematical types shared between client and server.
//!
//! These are the canonical representations used in the network protocol.
//! Orientation is a quaternion everywhere, on the wire and in storage.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// 3D Vector - position, direction
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Distance squared (avoids sqrt)
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    /// Linear interpolation towards `other` by `t`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    /// True if every component is finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Quaternion for rotations
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Quaternion {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W component
    pub w: f32,
}

impl Quaternion {
    /// Creates a new quaternion
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Identity rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Rotation of `angle` radians about the vertical axis.
    #[must_use]
    pub fn from_yaw(angle: f32) -> Self {
        let half = angle * 0.5;
        Self::new(0.0, half.sin(), 0.0, half.cos())
    }

    /// Four-component dot product.
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Squared norm.
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Returns the unit quaternion, or identity for a degenerate input.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length_squared().sqrt();
        if len <= f32::EPSILON || !len.is_finite() {
            return Self::IDENTITY;
        }
        Self::new(self.x / len, self.y / len, self.z / len, self.w / len)
    }

    /// Normalized linear interpolation along the shortest arc.
    #[must_use]
    pub fn nlerp(self, other: Self, t: f32) -> Self {
        // q and -q encode the same rotation; pick the closer hemisphere
        let other = if self.dot(other) < 0.0 {
            Self::new(-other.x, -other.y, -other.z, -other.w)
        } else {
            other
        };
        let s = 1.0 - t;
        Self::new(
            self.x * s + other.x * t,
            self.y * s + other.y * t,
            self.z * s + other.z * t,
            self.w * s + other.w * t,
        )
        .normalized()
    }

    /// True if every component is finite and the norm is usable.
    #[must_use]
    pub fn is_usable(self) -> bool {
        let finite = self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite();
        finite && self.length_squared() > 1e-6
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Transform - position + rotation.
///
/// Immutable value type; copied, never referenced, across the wire.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Transform {
    /// Position
    pub position: Vec3,
    /// Rotation
    pub rotation: Quaternion,
}

impl Transform {
    /// Creates a new transform
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quaternion) -> Self {
        Self { position, rotation }
    }

    /// Transform at `position` with identity rotation.
    #[must_use]
    pub const fn at(x: f32, y: f32, z: f32) -> Self {
        Self::new(Vec3::new(x, y, z), Quaternion::IDENTITY)
    }

    /// Identity transform
    pub const IDENTITY: Self = Self::new(Vec3::ZERO, Quaternion::IDENTITY);

    /// Blends towards `other` by weight `t` in `[0, 1]`.
    ///
    /// `t >= 1` returns `other` exactly, `t <= 0` returns `self` exactly.
    #[must_use]
    pub fn blend(self, other: Self, t: f32) -> Self {
        if t >= 1.0 {
            return other;
        }
        if t <= 0.0 {
            return self;
        }
        Self::new(
            self.position.lerp(other.position, t),
            self.rotation.nlerp(other.rotation, t),
        )
    }

    /// True if the transform can be safely rendered and stored.
    #[must_use]
    pub fn is_well_formed(self) -> bool {
        self.position.is_finite() && self.rotation.is_usable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        let sum = a + b;
        assert_eq!(sum.x, 5.0);
        assert_eq!(sum.y, 7.0);
        assert_eq!(sum.z, 9.0);

        assert_eq!(a.dot(b), 32.0);
        let mid = a.lerp(b, 0.5);
        assert_eq!(mid, Vec3::new(2.5, 3.5, 4.5));
    }

    #[test]
    fn test_transform_layout() {
        // 3 + 4 floats, no padding
        assert_eq!(std::mem::size_of::<Transform>(), 28);
        let t = Transform::at(1.0, 2.0, 3.0);
        assert_eq!(bytemuck::bytes_of(&t).len(), 28);
    }

    #[test]
    fn test_blend_endpoints_are_exact() {
        let a = Transform::at(0.0, 0.0, 0.0);
        let b = Transform::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::from_yaw(1.0));
        assert_eq!(a.blend(b, 1.0), b);
        assert_eq!(a.blend(b, 0.0), a);
    }

    #[test]
    fn test_nlerp_takes_shortest_arc() {
        let a = Quaternion::IDENTITY;
        let flipped = Quaternion::new(0.0, 0.0, 0.0, -1.0);
        // Same rotation with opposite sign must not swing through 360 degrees
        let mid = a.nlerp(flipped, 0.5);
        assert!((mid.w.abs() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_well_formed() {
        assert!(Transform::IDENTITY.is_well_formed());
        assert!(!Transform::at(f32::NAN, 0.0, 0.0).is_well_formed());
        let degenerate = Transform::new(Vec3::ZERO, Quaternion::new(0.0, 0.0, 0.0, 0.0));
        assert!(!degenerate.is_well_formed());
    }
}
