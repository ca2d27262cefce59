//! Core [`Component`] trait and component type identity.
//!
//! A component is one unit of per-entity state plus behaviour. Each entity
//! holds at most one component of a given type, keyed by its
//! [`ComponentTypeId`].
//!
//! ## Type identity
//!
//! [`ComponentTypeId`] is derived from the component's **string name** using
//! the FNV-1a 64-bit hash, so the same tag can be computed on any peer that
//! knows the component's name.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId};

/// A unique identifier for a component type, derived from its string name
/// using the FNV-1a 64-bit hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] for a component name.
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325
    /// for each byte in name.as_bytes():
    ///     hash = (hash XOR byte) * 0x00000100000001b3
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// The id of component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        T::component_type_id()
    }
}

/// Upcast helper so boxed components and systems can be downcast to their
/// concrete type.
pub trait AsAny: Any {
    /// Borrow as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Borrow as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The core component trait.
///
/// A component may keep a weak back-reference to its owner as an
/// [`EntityId`]. The owning [`Entity`] sets it on attach and clears it when
/// the component is replaced or removed.
///
/// During [`Component::update`] and [`Component::fixed_update`] the component
/// is temporarily taken out of its entity, so `entity` gives access to every
/// *sibling* component but not to `self`.
///
/// # Examples
///
/// ```rust
/// use engine_component::{Component, Entity, EntityId};
///
/// #[derive(Debug, Default)]
/// struct Fuel {
///     litres: f32,
///     owner: Option<EntityId>,
/// }
///
/// impl Component for Fuel {
///     fn type_name() -> &'static str { "Fuel" }
///     fn owner(&self) -> Option<EntityId> { self.owner }
///     fn set_owner(&mut self, owner: Option<EntityId>) { self.owner = owner; }
///     fn fixed_update(&mut self, _entity: &mut Entity, dt: f64) {
///         self.litres = (self.litres - 0.1 * dt as f32).max(0.0);
///     }
/// }
/// ```
pub trait Component: AsAny {
    /// A human-readable name for this component type.
    fn type_name() -> &'static str
    where
        Self: Sized;

    /// The [`ComponentTypeId`] for this component, FNV-1a of
    /// [`Component::type_name`].
    fn component_type_id() -> ComponentTypeId
    where
        Self: Sized,
    {
        ComponentTypeId::from_name(Self::type_name())
    }

    /// The entity this component is attached to, if the component tracks
    /// its owner.
    fn owner(&self) -> Option<EntityId> {
        None
    }

    /// Set or clear the owner back-reference. Plain-data components may
    /// ignore it.
    fn set_owner(&mut self, _owner: Option<EntityId>) {}

    /// Called once before the component is dropped from its entity.
    fn on_remove(&mut self) {}

    /// Variable-rate update, once per rendered frame.
    fn update(&mut self, _entity: &mut Entity, _dt: f64) {}

    /// Fixed-rate update, once per simulation tick.
    fn fixed_update(&mut self, _entity: &mut Entity, _dt: f64) {}
}
