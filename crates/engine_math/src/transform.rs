//! 3D transform component.
//!
//! [`Transform3D`] is the position, orientation, and scale of an entity. The
//! rendering collaborator reads it once per frame; physics and network sync
//! are the only writers.
//!
//! Axis convention: +Y is up and +Z is the entity's forward direction.

use engine_component::Component;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform3D {
    /// World-space position.
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Transform3D {
    /// World up axis.
    pub const UP: Vec3 = Vec3::Y;

    /// Local forward axis before rotation.
    pub const FORWARD: Vec3 = Vec3::Z;

    /// The identity transform: origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Position plus a heading (radians about the up axis).
    #[must_use]
    pub fn from_position_heading(position: Vec3, heading: f32) -> Self {
        Self::from_position_rotation(position, Quat::from_axis_angle(Self::UP, heading))
    }

    /// The entity's forward direction in world space.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Self::FORWARD
    }

    /// Heading about the up axis, in radians.
    #[must_use]
    pub fn heading(&self) -> f32 {
        let forward = self.forward();
        forward.x.atan2(forward.z)
    }

    /// Rotate about the up axis by `angle` radians. The result is
    /// renormalised so repeated small rotations do not drift.
    pub fn rotate_about_up(&mut self, angle: f32) {
        self.rotation = (Quat::from_axis_angle(Self::UP, angle) * self.rotation).normalize();
    }

    /// Straight-line distance from this transform's position to `point`.
    #[must_use]
    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.position.distance(point)
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Component for Transform3D {
    fn type_name() -> &'static str {
        "Transform3D"
    }
}
