//! # engine_component
//!
//! The "E" and "C" of the simulation core: what an entity is and what a
//! component is.
//!
//! - [`Component`]: per-entity state plus lifecycle/update hooks.
//! - [`ComponentTypeId`]: FNV-1a tag identifying a component type.
//! - [`Entity`]: an id, a typed component bag, and string tags.
//! - [`EntityId`] / [`EntityAllocator`]: lightweight `u64` identity.
//! - [`AsAny`]: downcasting support for boxed components and systems.

pub mod component;
pub mod entity;

pub use component::{AsAny, Component, ComponentTypeId};
pub use entity::{Entity, EntityAllocator, EntityId};
