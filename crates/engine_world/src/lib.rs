//! # engine_world
//!
//! The scheduler that owns every entity and system and advances them on a
//! fixed timestep.
//!
//! ## Frame sequence
//!
//! 1. Record the clock baseline on the very first frame and stop.
//! 2. Cap the frame delta, then apply queued entity additions/removals.
//! 3. Run whole fixed ticks (systems by priority, then components).
//! 4. Run one variable pass (systems by priority, then components).

pub mod error;
pub mod events;
pub mod scene;
pub mod system;
pub mod time;
pub mod world;

pub use error::WorldError;
pub use events::{EventBus, EventReceiver};
pub use scene::Scene;
pub use system::System;
pub use time::FixedTimestep;
pub use world::{World, WorldConfig};
