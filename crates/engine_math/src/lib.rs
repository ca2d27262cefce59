//! # engine_math
//!
//! Math types for the simulation core. Re-exports [`glam`] for linear
//! algebra and defines [`Transform3D`], the spatial component every vehicle
//! and checkpoint carries.

pub mod transform;

// Re-export glam types for convenience.
pub use glam::{EulerRot, Quat, Vec3};

pub use transform::Transform3D;
