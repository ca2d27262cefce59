//! # race_core
//!
//! The racing game on top of the world scheduler:
//!
//! - [`vehicle`]: arcade car physics, integrated on fixed ticks.
//! - [`checkpoint`]: proximity gates with entry hysteresis.
//! - [`lap_counter`]: per-car lap/checkpoint state machine and lap history.
//! - [`race`]: countdown, start/finish, and standings for the whole field.
//! - [`network`]: ownership-gated state sync over a room transport.
//! - [`prefab`]: entity templates for cars and gates.
//! - [`config`] / [`error`]: tuning and configuration errors.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod lap_counter;
pub mod network;
pub mod prefab;
pub mod race;
pub mod vehicle;

pub use checkpoint::CheckpointComponent;
pub use config::{RaceConfig, VehicleConfig};
pub use error::RaceError;
pub use lap_counter::{LapCounterComponent, LapPolicy, LapRecord, LapState};
pub use network::{NetworkEvent, NetworkIdentityComponent, NetworkSystem};
pub use race::{RaceEvent, RaceState, RaceSystem};
pub use vehicle::VehicleComponent;
