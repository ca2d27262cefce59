//! A simple autopilot that chases the next gate.

use engine_math::{Transform3D, Vec3};

/// One frame of driver input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Input {
    pub throttle: f32,
    pub brake: f32,
    pub steering: f32,
}

impl Input {
    /// Stand on the brake.
    pub const HOLD: Self = Self {
        throttle: 0.0,
        brake: 1.0,
        steering: 0.0,
    };
}

#[derive(Debug, Clone)]
pub struct Autopilot {
    target: usize,
    /// Speed the pilot will not exceed on a straight, in units/s.
    cruise_speed: f32,
}

impl Autopilot {
    #[must_use]
    pub fn new(cruise_speed: f32) -> Self {
        Self {
            target: 0,
            cruise_speed,
        }
    }

    /// Index of the gate being chased.
    #[must_use]
    pub fn target(&self) -> usize {
        self.target
    }

    /// Steer towards the next gate, moving on once within `reach` of it.
    pub fn drive(&mut self, transform: &Transform3D, speed: f32, gates: &[Vec3], reach: f32) -> Input {
        if gates.is_empty() {
            return Input::HOLD;
        }
        let mut to_target = flat(gates[self.target] - transform.position);
        if to_target.length() <= reach {
            self.target = (self.target + 1) % gates.len();
            to_target = flat(gates[self.target] - transform.position);
        }

        let forward = flat(transform.forward()).normalize_or_zero();
        let direction = to_target.normalize_or_zero();
        let side = forward.cross(direction).y;
        let error = side.atan2(forward.dot(direction));

        let steering = (error * 2.0).clamp(-1.0, 1.0);
        let corner_speed = self.cruise_speed * (1.0 - 0.6 * error.abs().min(1.0));
        let (throttle, brake) = if speed > corner_speed * 1.2 {
            (0.0, 0.5)
        } else if speed > corner_speed {
            (0.0, 0.0)
        } else {
            (1.0, 0.0)
        };
        Input {
            throttle,
            brake,
            steering,
        }
    }
}

fn flat(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steers_towards_target() {
        let mut pilot = Autopilot::new(30.0);
        let gates = [Vec3::new(50.0, 0.0, 50.0)];
        let input = pilot.drive(&Transform3D::IDENTITY, 0.0, &gates, 10.0);
        assert!(input.steering > 0.0);
        assert_eq!(input.throttle, 1.0);

        let gates = [Vec3::new(-50.0, 0.0, 50.0)];
        let input = pilot.drive(&Transform3D::IDENTITY, 0.0, &gates, 10.0);
        assert!(input.steering < 0.0);
    }

    #[test]
    fn test_straight_ahead_needs_no_steering() {
        let mut pilot = Autopilot::new(30.0);
        let gates = [Vec3::new(0.0, 0.0, 100.0)];
        let input = pilot.drive(&Transform3D::IDENTITY, 10.0, &gates, 10.0);
        assert!(input.steering.abs() < 1e-6);
        assert_eq!(input.throttle, 1.0);
    }

    #[test]
    fn test_advances_after_reaching_gate() {
        let mut pilot = Autopilot::new(30.0);
        let gates = [Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 100.0)];
        pilot.drive(&Transform3D::IDENTITY, 0.0, &gates, 10.0);
        assert_eq!(pilot.target(), 1);
    }

    #[test]
    fn test_brakes_when_overspeed() {
        let mut pilot = Autopilot::new(30.0);
        let gates = [Vec3::new(0.0, 0.0, 100.0)];
        let input = pilot.drive(&Transform3D::IDENTITY, 60.0, &gates, 10.0);
        assert_eq!(input.throttle, 0.0);
        assert!(input.brake > 0.0);
    }

    #[test]
    fn test_empty_track_holds() {
        let mut pilot = Autopilot::new(30.0);
        assert_eq!(pilot.drive(&Transform3D::IDENTITY, 0.0, &[], 10.0), Input::HOLD);
    }
}
