//! Entity identity and the per-entity component bag.
//!
//! An [`EntityId`] is a lightweight `u64` identifier. An [`Entity`] pairs an
//! id with at most one component per [`ComponentTypeId`] and a set of string
//! tags. Entities do not know the world that owns them; the world looks them
//! up by id.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId};

/// A unique entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The null / invalid entity sentinel.
    pub const INVALID: EntityId = EntityId(0);

    /// Create an entity id from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) entity id.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Allocates monotonically increasing entity ids, starting at 1.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: u64,
}

impl EntityAllocator {
    /// Creates a new allocator. 0 is reserved for [`EntityId::INVALID`].
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Allocates a fresh entity id.
    pub fn allocate(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        EntityId(id)
    }

    /// Returns the number of ids allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// An entity: identity, a typed component bag, and string tags.
///
/// Components are kept in a map ordered by [`ComponentTypeId`], so per-entity
/// dispatch order is the same on every run.
pub struct Entity {
    id: EntityId,
    components: BTreeMap<ComponentTypeId, Box<dyn Component>>,
    tags: BTreeSet<String>,
}

impl Entity {
    /// Create an empty entity with the given id.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            components: BTreeMap::new(),
            tags: BTreeSet::new(),
        }
    }

    /// The entity's id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Builder form of [`Entity::add_component`].
    #[must_use]
    pub fn with_component<C: Component>(mut self, component: C) -> Self {
        self.add_component(component);
        self
    }

    /// Builder form of [`Entity::add_tag`].
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.add_tag(tag);
        self
    }

    /// Attach a component. A component of the same type already present is
    /// replaced; it is returned with its owner cleared.
    pub fn add_component<C: Component>(&mut self, mut component: C) -> Option<Box<dyn Component>> {
        component.set_owner(Some(self.id));
        self.components
            .insert(C::component_type_id(), Box::new(component))
            .map(|mut previous| {
                previous.set_owner(None);
                previous
            })
    }

    /// Detach the component of type `C`, firing its `on_remove` hook.
    pub fn remove_component<C: Component>(&mut self) -> Option<Box<dyn Component>> {
        let mut component = self.components.remove(&C::component_type_id())?;
        component.on_remove();
        component.set_owner(None);
        Some(component)
    }

    /// Borrow the component of type `C`.
    #[must_use]
    pub fn get<C: Component>(&self) -> Option<&C> {
        self.components
            .get(&C::component_type_id())
            .and_then(|c| (**c).as_any().downcast_ref::<C>())
    }

    /// Mutably borrow the component of type `C`.
    pub fn get_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.components
            .get_mut(&C::component_type_id())
            .and_then(|c| (**c).as_any_mut().downcast_mut::<C>())
    }

    /// Returns `true` if a component of type `C` is attached.
    #[must_use]
    pub fn has<C: Component>(&self) -> bool {
        self.components.contains_key(&C::component_type_id())
    }

    /// Number of attached components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Run every component's variable-rate update.
    pub fn update(&mut self, dt: f64) {
        self.dispatch(|component, entity| component.update(entity, dt));
    }

    /// Run every component's fixed-rate update.
    pub fn fixed_update(&mut self, dt: f64) {
        self.dispatch(|component, entity| component.fixed_update(entity, dt));
    }

    /// Fire `on_remove` on every component and drop them all. Called by the
    /// world when the entity is removed.
    pub fn detach_all(&mut self) {
        for (_, mut component) in std::mem::take(&mut self.components) {
            component.on_remove();
            component.set_owner(None);
        }
    }

    fn dispatch(&mut self, mut f: impl FnMut(&mut Box<dyn Component>, &mut Entity)) {
        let keys: Vec<ComponentTypeId> = self.components.keys().copied().collect();
        for key in keys {
            let Some(mut component) = self.components.remove(&key) else {
                continue;
            };
            f(&mut component, self);
            // A same-typed component added during the call wins.
            match self.components.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(component);
                }
                Entry::Occupied(_) => component.set_owner(None),
            }
        }
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("components", &self.components.len())
            .field("tags", &self.tags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        fixed_ticks: u32,
        frames: u32,
        owner: Option<EntityId>,
    }

    impl Component for Counter {
        fn type_name() -> &'static str {
            "Counter"
        }

        fn owner(&self) -> Option<EntityId> {
            self.owner
        }

        fn set_owner(&mut self, owner: Option<EntityId>) {
            self.owner = owner;
        }

        fn update(&mut self, _entity: &mut Entity, _dt: f64) {
            self.frames += 1;
        }

        fn fixed_update(&mut self, _entity: &mut Entity, _dt: f64) {
            self.fixed_ticks += 1;
        }
    }

    /// Reads its sibling `Counter` during fixed updates.
    #[derive(Debug, Default)]
    struct Observer {
        seen: Option<u32>,
        removed: Rc<Cell<bool>>,
        owner: Option<EntityId>,
    }

    impl Component for Observer {
        fn type_name() -> &'static str {
            "Observer"
        }

        fn owner(&self) -> Option<EntityId> {
            self.owner
        }

        fn set_owner(&mut self, owner: Option<EntityId>) {
            self.owner = owner;
        }

        fn on_remove(&mut self) {
            self.removed.set(true);
        }

        fn fixed_update(&mut self, entity: &mut Entity, _dt: f64) {
            self.seen = entity.get::<Counter>().map(|c| c.fixed_ticks);
            assert!(entity.get::<Observer>().is_none());
        }
    }

    #[test]
    fn test_entity_id_validity() {
        assert!(EntityId::from_raw(42).is_valid());
        assert!(!EntityId::INVALID.is_valid());
    }

    #[test]
    fn test_allocator_produces_unique_ids() {
        let mut alloc = EntityAllocator::new();
        assert_eq!(alloc.allocate().id(), 1);
        assert_eq!(alloc.allocate().id(), 2);
        assert_eq!(alloc.count(), 2);
    }

    #[test]
    fn test_add_sets_owner_and_replace_detaches() {
        let mut entity = Entity::new(EntityId(7));
        assert!(entity.add_component(Counter::default()).is_none());
        assert_eq!(entity.get::<Counter>().unwrap().owner(), Some(EntityId(7)));

        let replaced = entity
            .add_component(Counter {
                fixed_ticks: 9,
                ..Counter::default()
            })
            .unwrap();
        assert_eq!(replaced.owner(), None);
        assert_eq!(entity.component_count(), 1);
        assert_eq!(entity.get::<Counter>().unwrap().fixed_ticks, 9);
    }

    #[test]
    fn test_siblings_visible_during_dispatch() {
        let mut entity = Entity::new(EntityId(1))
            .with_component(Counter::default())
            .with_component(Observer::default());

        entity.fixed_update(1.0 / 60.0);
        entity.fixed_update(1.0 / 60.0);
        entity.update(0.016);

        assert_eq!(entity.get::<Counter>().unwrap().fixed_ticks, 2);
        assert_eq!(entity.get::<Counter>().unwrap().frames, 1);
        assert!(entity.get::<Observer>().unwrap().seen.is_some());
        assert_eq!(entity.component_count(), 2);
    }

    #[test]
    fn test_remove_and_detach_fire_on_remove() {
        let flag = Rc::new(Cell::new(false));
        let mut entity = Entity::new(EntityId(3)).with_component(Observer {
            removed: Rc::clone(&flag),
            ..Observer::default()
        });
        let removed = entity.remove_component::<Observer>().unwrap();
        assert!(flag.get());
        assert_eq!(removed.owner(), None);
        assert!(!entity.has::<Observer>());

        let flag = Rc::new(Cell::new(false));
        entity.add_component(Observer {
            removed: Rc::clone(&flag),
            ..Observer::default()
        });
        entity.detach_all();
        assert!(flag.get());
        assert_eq!(entity.component_count(), 0);
    }

    #[test]
    fn test_tags() {
        let mut entity = Entity::new(EntityId(2)).with_tag("vehicle");
        assert!(entity.has_tag("vehicle"));
        entity.add_tag("local");
        assert_eq!(entity.tags().count(), 2);
        assert!(entity.remove_tag("vehicle"));
        assert!(!entity.has_tag("vehicle"));
    }
}
