//! Proximity gates.
//!
//! A checkpoint has no collider. A vehicle "passes" when it first comes
//! within `radius` of the gate, and stays latched until it is more than
//! `1.5 × radius` away. The band between the two distances keeps a car
//! lingering at the gate from triggering it twice.

use std::collections::BTreeMap;

use engine_component::{Component, EntityId};
use engine_math::Vec3;

/// Distance multiple beyond which a latched vehicle is released.
pub const RELEASE_FACTOR: f32 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointComponent {
    /// Position in the lap sequence; 0 is the start/finish line.
    pub index: u32,
    pub is_start_finish: bool,
    pub radius: f32,
    /// Vehicles currently latched inside, with the time they entered.
    inside: BTreeMap<EntityId, f64>,
}

impl CheckpointComponent {
    #[must_use]
    pub fn new(index: u32, radius: f32) -> Self {
        Self {
            index,
            is_start_finish: index == 0,
            radius,
            inside: BTreeMap::new(),
        }
    }

    /// Test `vehicle` at `position` against a gate located at `origin`.
    ///
    /// Returns `true` exactly once per entry: when the vehicle is within the
    /// radius and not already latched.
    pub fn check_vehicle_passing(
        &mut self,
        origin: Vec3,
        vehicle: EntityId,
        position: Vec3,
        timestamp: f64,
    ) -> bool {
        let distance = origin.distance(position);
        if distance <= self.radius {
            if self.inside.contains_key(&vehicle) {
                return false;
            }
            self.inside.insert(vehicle, timestamp);
            return true;
        }
        if distance > self.radius * RELEASE_FACTOR {
            self.inside.remove(&vehicle);
        }
        false
    }

    #[must_use]
    pub fn is_latched(&self, vehicle: EntityId) -> bool {
        self.inside.contains_key(&vehicle)
    }

    /// When `vehicle` entered the gate, if it is still latched.
    #[must_use]
    pub fn entered_at(&self, vehicle: EntityId) -> Option<f64> {
        self.inside.get(&vehicle).copied()
    }

    /// Release every latched vehicle.
    pub fn reset(&mut self) {
        self.inside.clear();
    }
}

impl Component for CheckpointComponent {
    fn type_name() -> &'static str {
        "Checkpoint"
    }
}
