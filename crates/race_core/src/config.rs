//! Race and vehicle tuning.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "total_laps": 5, "lap_policy": { "lenient_completion": true } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RaceError;
use crate::lap_counter::LapPolicy;

/// Physical parameters of a car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Mass in kilograms.
    pub mass: f32,
    /// Engine force at full throttle, in newtons.
    pub max_engine_force: f32,
    /// Braking force at full brake, in newtons.
    pub max_braking_force: f32,
    /// Front wheel angle at full lock, in radians.
    pub max_steering_angle: f32,
    /// Distance between axles, in metres.
    pub wheelbase: f32,
    pub track_width: f32,
    /// Quadratic aerodynamic drag coefficient.
    pub drag_coefficient: f32,
    /// Linear rolling resistance coefficient.
    pub rolling_resistance: f32,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            mass: 1200.0,
            max_engine_force: 8000.0,
            max_braking_force: 12000.0,
            max_steering_angle: 35f32.to_radians(),
            wheelbase: 2.5,
            track_width: 1.5,
            drag_coefficient: 0.4257,
            rolling_resistance: 12.8,
        }
    }
}

impl VehicleConfig {
    /// # Errors
    ///
    /// Returns [`RaceError::InvalidParameter`] for a non-positive mass,
    /// wheelbase, or force limit.
    pub fn validate(&self) -> Result<(), RaceError> {
        let positive = [
            ("mass", self.mass),
            ("wheelbase", self.wheelbase),
            ("max_engine_force", self.max_engine_force),
            ("max_braking_force", self.max_braking_force),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(RaceError::InvalidParameter {
                    field,
                    value: f64::from(value),
                });
            }
        }
        Ok(())
    }
}

/// Race rules and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Laps needed to finish.
    pub total_laps: u32,
    /// Length of the pre-race countdown, in seconds.
    pub countdown_seconds: f64,
    /// Lap completion rules handed to every lap counter.
    pub lap_policy: LapPolicy,
    /// Minimum wall-clock gap between outbound network flushes, in ms.
    pub sync_interval_ms: f64,
    /// Detection radius of spawned checkpoints.
    pub checkpoint_radius: f32,
    pub vehicle: VehicleConfig,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            total_laps: 3,
            countdown_seconds: 3.0,
            lap_policy: LapPolicy::default(),
            sync_interval_ms: 100.0,
            checkpoint_radius: 10.0,
            vehicle: VehicleConfig::default(),
        }
    }
}

impl RaceConfig {
    #[must_use]
    pub fn with_total_laps(mut self, total_laps: u32) -> Self {
        self.total_laps = total_laps;
        self
    }

    #[must_use]
    pub fn with_countdown_seconds(mut self, seconds: f64) -> Self {
        self.countdown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_lap_policy(mut self, policy: LapPolicy) -> Self {
        self.lap_policy = policy;
        self
    }

    /// Parse and validate a JSON config.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::Config`] for malformed JSON, or the validation
    /// error of the first bad field.
    pub fn from_json(json: &str) -> Result<Self, RaceError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::Io`] if the file cannot be read, otherwise as
    /// [`RaceConfig::from_json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RaceError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| RaceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// # Errors
    ///
    /// Returns a [`RaceError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), RaceError> {
        if self.total_laps == 0 {
            return Err(RaceError::InvalidLapCount(0));
        }
        if !(self.countdown_seconds.is_finite() && self.countdown_seconds >= 0.0) {
            return Err(RaceError::InvalidParameter {
                field: "countdown_seconds",
                value: self.countdown_seconds,
            });
        }
        if !(self.sync_interval_ms.is_finite() && self.sync_interval_ms >= 0.0) {
            return Err(RaceError::InvalidParameter {
                field: "sync_interval_ms",
                value: self.sync_interval_ms,
            });
        }
        if !(self.checkpoint_radius.is_finite() && self.checkpoint_radius > 0.0) {
            return Err(RaceError::InvalidParameter {
                field: "checkpoint_radius",
                value: f64::from(self.checkpoint_radius),
            });
        }
        self.vehicle.validate()
    }
}
