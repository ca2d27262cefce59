//! Entity templates for cars and gates.
//!
//! Builders return an unattached [`Entity`] so callers can add extra
//! components (a network identity, say) before queueing it.

use engine_component::Entity;
use engine_math::{Transform3D, Vec3};
use engine_world::Scene;

use crate::checkpoint::CheckpointComponent;
use crate::config::RaceConfig;
use crate::error::RaceError;
use crate::lap_counter::LapCounterComponent;
use crate::vehicle::VehicleComponent;

pub const VEHICLE_TAG: &str = "vehicle";
pub const CHECKPOINT_TAG: &str = "checkpoint";

/// A racer: transform, physics, and a lap counter sized for the track.
///
/// # Errors
///
/// Returns [`RaceError`] if the lap or checkpoint count is zero.
pub fn build_vehicle(
    scene: &mut Scene,
    config: &RaceConfig,
    transform: Transform3D,
    total_checkpoints: u32,
) -> Result<Entity, RaceError> {
    let lap_counter = LapCounterComponent::new(config.total_laps, total_checkpoints)?
        .with_policy(config.lap_policy);
    Ok(scene
        .create_entity()
        .with_tag(VEHICLE_TAG)
        .with_component(transform)
        .with_component(VehicleComponent::new(&config.vehicle))
        .with_component(lap_counter))
}

/// A gate at `position`, facing along `heading` (radians about +Y).
pub fn build_checkpoint(
    scene: &mut Scene,
    index: u32,
    radius: f32,
    position: Vec3,
    heading: f32,
) -> Entity {
    scene
        .create_entity()
        .with_tag(CHECKPOINT_TAG)
        .with_component(Transform3D::from_position_heading(position, heading))
        .with_component(CheckpointComponent::new(index, radius))
}
