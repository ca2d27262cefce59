//! Arcade vehicle physics.
//!
//! [`VehicleComponent`] integrates a deliberately simplified car model once
//! per fixed tick: forces along the body axis, drag, and a bicycle-style turn
//! that keeps velocity pointing where the car points. It is an explicit Euler
//! integrator and only runs inside fixed ticks, so results depend on the
//! number of ticks and never on the frame rate.

use engine_component::{Component, Entity};
use engine_math::{Transform3D, Vec3};

use crate::config::VehicleConfig;

/// Below this squared speed the car counts as stationary: no braking
/// direction and no turning.
const MIN_MOVING_SPEED_SQ: f32 = 0.1;

/// Steering angles smaller than this (0.1°) are treated as straight ahead.
const MIN_STEERING_ANGLE: f32 = 0.1 * std::f32::consts::PI / 180.0;

/// Speed at which steering authority bottoms out.
const STEERING_FADE_SPEED: f32 = 50.0;

/// Fraction of steering authority lost at [`STEERING_FADE_SPEED`].
const STEERING_FADE: f32 = 0.5;

/// Steering authority at `speed`: 1.0 at rest, falling linearly to 0.5 at
/// 50 u/s and flat beyond.
#[must_use]
pub fn steering_authority(speed: f32) -> f32 {
    1.0 - STEERING_FADE * (speed / STEERING_FADE_SPEED).min(1.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleComponent {
    pub mass: f32,
    pub max_engine_force: f32,
    pub max_braking_force: f32,
    pub max_steering_angle: f32,
    pub wheelbase: f32,
    pub track_width: f32,
    pub drag_coefficient: f32,
    pub rolling_resistance: f32,

    velocity: Vec3,
    acceleration: Vec3,
    steering_angle: f32,
    engine_force: f32,
    braking_force: f32,

    /// In `[-1, 1]`; negative drives in reverse.
    throttle: f32,
    /// In `[0, 1]`.
    brake: f32,
    /// In `[-1, 1]`; positive turns towards +X.
    steering: f32,
}

impl VehicleComponent {
    #[must_use]
    pub fn new(config: &VehicleConfig) -> Self {
        Self {
            mass: config.mass,
            max_engine_force: config.max_engine_force,
            max_braking_force: config.max_braking_force,
            max_steering_angle: config.max_steering_angle,
            wheelbase: config.wheelbase,
            track_width: config.track_width,
            drag_coefficient: config.drag_coefficient,
            rolling_resistance: config.rolling_resistance,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            steering_angle: 0.0,
            engine_force: 0.0,
            braking_force: 0.0,
            throttle: 0.0,
            brake: 0.0,
            steering: 0.0,
        }
    }

    /// Store driver inputs. Out-of-range values are clamped, so raw
    /// controller values may be passed straight through.
    pub fn set_inputs(&mut self, throttle: f32, brake: f32, steering: f32) {
        self.throttle = clamp_input(throttle, -1.0, 1.0);
        self.brake = clamp_input(brake, 0.0, 1.0);
        self.steering = clamp_input(steering, -1.0, 1.0);
    }

    /// Returns the clamped throttle input.
    #[must_use]
    pub fn throttle(&self) -> f32 {
        self.throttle
    }

    /// Returns the clamped brake input.
    #[must_use]
    pub fn brake(&self) -> f32 {
        self.brake
    }

    /// Returns the clamped steering input.
    #[must_use]
    pub fn steering(&self) -> f32 {
        self.steering
    }

    /// Returns the world-space velocity, in units per second.
    #[must_use]
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Returns the acceleration from the last tick.
    #[must_use]
    pub fn acceleration(&self) -> Vec3 {
        self.acceleration
    }

    /// Returns the magnitude of the velocity.
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Current front wheel angle, in radians.
    #[must_use]
    pub fn steering_angle(&self) -> f32 {
        self.steering_angle
    }

    /// Returns the engine force applied on the last tick.
    #[must_use]
    pub fn engine_force(&self) -> f32 {
        self.engine_force
    }

    /// Returns the braking force applied on the last tick.
    #[must_use]
    pub fn braking_force(&self) -> f32 {
        self.braking_force
    }

    /// Overwrite the dynamic state with a peer's snapshot.
    pub fn apply_remote_state(
        &mut self,
        velocity: Vec3,
        steering_angle: f32,
        engine_force: f32,
        braking_force: f32,
    ) {
        self.velocity = velocity;
        self.steering_angle = steering_angle;
        self.engine_force = engine_force;
        self.braking_force = braking_force;
    }

    /// Bring the car to rest and release all inputs.
    pub fn reset(&mut self) {
        self.velocity = Vec3::ZERO;
        self.acceleration = Vec3::ZERO;
        self.steering_angle = 0.0;
        self.engine_force = 0.0;
        self.braking_force = 0.0;
        self.throttle = 0.0;
        self.brake = 0.0;
        self.steering = 0.0;
    }

    /// Advance the car and its transform by one step of `dt` seconds.
    pub fn integrate(&mut self, transform: &mut Transform3D, dt: f32) {
        let speed = self.velocity.length();
        self.engine_force = self.max_engine_force * self.throttle;
        self.braking_force = self.max_braking_force * self.brake;
        self.steering_angle = self.steering * self.max_steering_angle * steering_authority(speed);

        let forward = transform.forward();
        let inv_mass = 1.0 / self.mass;
        self.acceleration = forward * (self.engine_force * inv_mass);
        if self.velocity.length_squared() > MIN_MOVING_SPEED_SQ {
            let direction = self.velocity / speed;
            self.acceleration -= direction * (self.braking_force * inv_mass);
        }
        self.acceleration -= self.velocity * speed * (self.drag_coefficient * inv_mass);
        self.acceleration -= self.velocity * (self.rolling_resistance * inv_mass);

        self.velocity += self.acceleration * dt;

        let speed_sq = self.velocity.length_squared();
        if self.steering_angle.abs() > MIN_STEERING_ANGLE && speed_sq > MIN_MOVING_SPEED_SQ {
            // Signed so that a reversing car keeps reversing after the turn.
            let speed = speed_sq.sqrt();
            let travel = if self.velocity.dot(forward) < 0.0 {
                -speed
            } else {
                speed
            };
            let turn_radius = self.wheelbase / self.steering_angle.sin();
            let angular_velocity = travel / turn_radius;
            transform.rotate_about_up(angular_velocity * dt);
            self.velocity = transform.forward() * travel;
        }

        transform.position += self.velocity * dt;
    }
}

impl Default for VehicleComponent {
    fn default() -> Self {
        Self::new(&VehicleConfig::default())
    }
}

impl Component for VehicleComponent {
    fn type_name() -> &'static str {
        "Vehicle"
    }

    fn fixed_update(&mut self, entity: &mut Entity, dt: f64) {
        let Some(transform) = entity.get_mut::<Transform3D>() else {
            return;
        };
        self.integrate(transform, dt as f32);
    }
}

/// NaN input is treated as neutral.
fn clamp_input(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use engine_component::EntityId;
    use engine_world::World;

    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn drive(vehicle: &mut VehicleComponent, transform: &mut Transform3D, ticks: usize) {
        for _ in 0..ticks {
            vehicle.integrate(transform, DT);
        }
    }

    #[test]
    fn test_inputs_are_clamped() {
        let mut vehicle = VehicleComponent::default();
        vehicle.set_inputs(7.0, -3.0, -12.0);
        assert_eq!(
            (vehicle.throttle(), vehicle.brake(), vehicle.steering()),
            (1.0, 0.0, -1.0)
        );

        vehicle.set_inputs(-1.5, 1.5, 0.25);
        assert_eq!(
            (vehicle.throttle(), vehicle.brake(), vehicle.steering()),
            (-1.0, 1.0, 0.25)
        );

        vehicle.set_inputs(f32::NAN, f32::NAN, f32::NAN);
        assert_eq!(
            (vehicle.throttle(), vehicle.brake(), vehicle.steering()),
            (0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_steering_authority_curve() {
        assert_eq!(steering_authority(0.0), 1.0);
        assert_eq!(steering_authority(25.0), 0.75);
        assert_eq!(steering_authority(50.0), 0.5);
        assert_eq!(steering_authority(500.0), 0.5);
    }

    #[test]
    fn test_throttle_accelerates_along_forward() {
        let mut vehicle = VehicleComponent::default();
        let mut transform = Transform3D::IDENTITY;
        vehicle.set_inputs(1.0, 0.0, 0.0);

        drive(&mut vehicle, &mut transform, 60);

        assert!(transform.position.z > 1.0);
        assert!(transform.position.x.abs() < 1e-6);
        assert!(vehicle.velocity().z > 0.0);
        assert_eq!(vehicle.engine_force(), vehicle.max_engine_force);
    }

    #[test]
    fn test_reverse_throttle_drives_backwards() {
        let mut vehicle = VehicleComponent::default();
        let mut transform = Transform3D::IDENTITY;
        vehicle.set_inputs(-1.0, 0.0, 0.0);

        drive(&mut vehicle, &mut transform, 30);
        assert!(transform.position.z < 0.0);
    }

    #[test]
    fn test_brake_at_rest_is_inert() {
        let mut vehicle = VehicleComponent::default();
        let mut transform = Transform3D::IDENTITY;
        vehicle.set_inputs(0.0, 1.0, 1.0);

        drive(&mut vehicle, &mut transform, 10);

        assert_eq!(vehicle.velocity(), Vec3::ZERO);
        assert_eq!(transform, Transform3D::IDENTITY);
    }

    #[test]
    fn test_brake_slows_a_moving_car() {
        let mut vehicle = VehicleComponent::default();
        let mut transform = Transform3D::IDENTITY;
        vehicle.apply_remote_state(Vec3::new(0.0, 0.0, 20.0), 0.0, 0.0, 0.0);
        vehicle.set_inputs(0.0, 1.0, 0.0);

        drive(&mut vehicle, &mut transform, 30);
        assert!(vehicle.speed() < 20.0);
    }

    #[test]
    fn test_positive_steering_turns_towards_positive_x() {
        let mut vehicle = VehicleComponent::default();
        let mut transform = Transform3D::IDENTITY;
        vehicle.set_inputs(1.0, 0.0, 1.0);

        drive(&mut vehicle, &mut transform, 60);

        assert!(transform.heading() > 0.0);
        assert!(transform.position.x > 0.0);
        // Velocity stays aligned with the body.
        let along = vehicle.velocity().normalize().dot(transform.forward());
        assert!((along - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_reversing_through_a_turn_keeps_reversing() {
        let mut vehicle = VehicleComponent::default();
        let mut transform = Transform3D::IDENTITY;
        vehicle.apply_remote_state(Vec3::new(0.0, 0.0, -5.0), 0.0, 0.0, 0.0);
        vehicle.set_inputs(0.0, 0.0, 1.0);

        vehicle.integrate(&mut transform, DT);

        assert!(vehicle.velocity().dot(transform.forward()) < 0.0);
        // Reversing with positive steering swings the nose the other way.
        assert!(transform.heading() < 0.0);
    }

    #[test]
    fn test_integration_is_deterministic() {
        let run = || {
            let mut vehicle = VehicleComponent::default();
            let mut transform = Transform3D::IDENTITY;
            for tick in 0..600 {
                let steer = if (tick / 90) % 2 == 0 { 0.8 } else { -0.6 };
                vehicle.set_inputs(1.0, 0.0, steer);
                vehicle.integrate(&mut transform, DT);
            }
            (transform, vehicle.velocity())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_world_runs_are_bit_identical() {
        let run = || {
            let mut world = World::new();
            let mut vehicle = VehicleComponent::default();
            vehicle.set_inputs(1.0, 0.0, 0.4);
            let car = world
                .create_entity()
                .with_component(Transform3D::IDENTITY)
                .with_component(vehicle);
            let car = world.add_entity(car);
            for frame in 0..120 {
                world.update(f64::from(frame) * 16.0);
            }
            let transform = *world.scene().component::<Transform3D>(car).unwrap();
            let velocity = world.scene().component::<VehicleComponent>(car).unwrap().velocity();
            (transform, velocity)
        };

        let (first, first_velocity) = run();
        let (second, second_velocity) = run();
        assert!(first.position.length() > 1.0);
        assert_eq!(first.position.to_array().map(f32::to_bits), second.position.to_array().map(f32::to_bits));
        assert_eq!(first.rotation.to_array().map(f32::to_bits), second.rotation.to_array().map(f32::to_bits));
        assert_eq!(first_velocity.to_array().map(f32::to_bits), second_velocity.to_array().map(f32::to_bits));
    }

    #[test]
    fn test_fixed_update_skips_without_transform() {
        let mut entity = Entity::new(EntityId(1));
        let mut vehicle = VehicleComponent::default();
        vehicle.set_inputs(1.0, 0.0, 0.0);

        vehicle.fixed_update(&mut entity, f64::from(DT));
        assert_eq!(vehicle.velocity(), Vec3::ZERO);
    }

    #[test]
    fn test_fixed_update_moves_sibling_transform() {
        let mut vehicle = VehicleComponent::default();
        vehicle.set_inputs(1.0, 0.0, 0.0);
        let mut entity = Entity::new(EntityId(1))
            .with_component(Transform3D::IDENTITY)
            .with_component(vehicle);

        for _ in 0..10 {
            entity.fixed_update(f64::from(DT));
        }
        assert!(entity.get::<Transform3D>().unwrap().position.z > 0.0);
    }

    #[test]
    fn test_reset() {
        let mut vehicle = VehicleComponent::default();
        let mut transform = Transform3D::IDENTITY;
        vehicle.set_inputs(1.0, 0.5, 0.5);
        drive(&mut vehicle, &mut transform, 5);

        vehicle.reset();
        assert_eq!(vehicle, VehicleComponent::default());
    }
}
