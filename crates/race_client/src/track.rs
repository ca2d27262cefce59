//! The built-in oval.

use engine_math::{Transform3D, Vec3};
use engine_world::World;
use race_core::prefab::build_checkpoint;

/// Half-extent of the oval along X.
const RADIUS_X: f32 = 80.0;
/// Half-extent of the oval along Z.
const RADIUS_Z: f32 = 140.0;

/// Gate positions and headings around an ellipse, gate 0 at the origin
/// facing +Z and the rest following clockwise seen from above.
#[must_use]
pub fn oval(gate_count: u32) -> Vec<(Vec3, f32)> {
    (0..gate_count)
        .map(|index| {
            let t = std::f32::consts::TAU * index as f32 / gate_count as f32;
            let position = Vec3::new(RADIUS_X * (1.0 - t.cos()), 0.0, RADIUS_Z * t.sin());
            let tangent = Vec3::new(RADIUS_X * t.sin(), 0.0, RADIUS_Z * t.cos());
            (position, tangent.x.atan2(tangent.z))
        })
        .collect()
}

/// Queue one checkpoint entity per gate and return the gate positions in
/// index order.
pub fn build(world: &mut World, gate_count: u32, radius: f32) -> Vec<Vec3> {
    oval(gate_count)
        .into_iter()
        .enumerate()
        .map(|(index, (position, heading))| {
            let gate = build_checkpoint(world.scene_mut(), index as u32, radius, position, heading);
            world.add_entity(gate);
            position
        })
        .collect()
}

/// Starting grid behind the line, two abreast.
#[must_use]
pub fn grid_slot(slot: usize) -> Transform3D {
    let row = (slot / 2) as f32;
    let side = if slot % 2 == 0 { -3.0 } else { 3.0 };
    Transform3D::from_position(Vec3::new(side, 0.0, -20.0 - 8.0 * row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oval_starts_on_the_line() {
        let gates = oval(8);
        assert_eq!(gates.len(), 8);
        let (start, heading) = gates[0];
        assert!(start.length() < 1e-4);
        assert!(heading.abs() < 1e-6);
        // Gate 2 is a quarter turn round, out on +X.
        assert!(gates[2].0.x > RADIUS_X * 0.99);
    }

    #[test]
    fn test_gates_are_well_separated() {
        let gates = oval(8);
        for (i, (a, _)) in gates.iter().enumerate() {
            for (b, _) in &gates[i + 1..] {
                assert!(a.distance(*b) > 30.0);
            }
        }
    }

    #[test]
    fn test_grid_is_clear_of_the_start_gate() {
        for slot in 0..6 {
            let position = grid_slot(slot).position;
            assert!(position.length() > 15.0);
        }
        assert_ne!(grid_slot(0).position, grid_slot(1).position);
    }
}
