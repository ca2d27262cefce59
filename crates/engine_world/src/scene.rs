//! Entity registry and deferred mutation queue.
//!
//! The [`Scene`] is the part of the world that systems see. Entity additions
//! and removals are queued and only applied between frames by the owning
//! [`World`](crate::World), so iteration over "all entities" is stable for
//! the whole of a tick.

use std::collections::{BTreeMap, VecDeque};

use engine_component::{Component, Entity, EntityAllocator, EntityId};
use tracing::{debug, warn};

/// A queued structural change.
#[derive(Debug)]
enum PendingChange {
    Add(Entity),
    Remove(EntityId),
}

#[derive(Debug, Default)]
pub struct Scene {
    /// Live entities, ordered by id for deterministic iteration.
    entities: BTreeMap<EntityId, Entity>,
    /// Add/remove requests awaiting the next frame, in FIFO order.
    pending: VecDeque<PendingChange>,
    allocator: EntityAllocator,
    /// Wall-clock time of the current frame, in milliseconds.
    now_ms: f64,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh, empty entity. It is not part of the scene until it
    /// is passed to [`Scene::add_entity`].
    pub fn create_entity(&mut self) -> Entity {
        Entity::new(self.allocator.allocate())
    }

    /// Queue an entity for insertion on the next frame.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = entity.id();
        self.pending.push_back(PendingChange::Add(entity));
        id
    }

    /// Queue an entity for removal on the next frame.
    pub fn remove_entity(&mut self, id: EntityId) {
        self.pending.push_back(PendingChange::Remove(id));
    }

    /// Number of queued structural changes.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Apply every queued change in order. Removed entities fire
    /// `on_remove` on each of their components before they are dropped.
    pub(crate) fn apply_pending(&mut self) {
        while let Some(change) = self.pending.pop_front() {
            match change {
                PendingChange::Add(entity) => {
                    let id = entity.id();
                    if let Some(mut replaced) = self.entities.insert(id, entity) {
                        warn!(entity = %id, "entity re-added, replacing existing instance");
                        replaced.detach_all();
                    }
                    debug!(entity = %id, "entity added");
                }
                PendingChange::Remove(id) => match self.entities.remove(&id) {
                    Some(mut entity) => {
                        entity.detach_all();
                        debug!(entity = %id, "entity removed");
                    }
                    None => debug!(entity = %id, "remove requested for unknown entity"),
                },
            }
        }
    }

    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate over live entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    /// Ids of every live entity carrying a component of type `C`.
    #[must_use]
    pub fn ids_with<C: Component>(&self) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.has::<C>())
            .map(Entity::id)
            .collect()
    }

    /// Every live entity carrying `tag`.
    pub fn find_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities.values().filter(move |e| e.has_tag(tag))
    }

    /// Borrow the component of type `C` on entity `id`.
    #[must_use]
    pub fn component<C: Component>(&self, id: EntityId) -> Option<&C> {
        self.entities.get(&id).and_then(Entity::get::<C>)
    }

    /// Mutably borrow the component of type `C` on entity `id`.
    pub fn component_mut<C: Component>(&mut self, id: EntityId) -> Option<&mut C> {
        self.entities.get_mut(&id).and_then(Entity::get_mut::<C>)
    }

    /// Wall-clock time of the frame being processed, in milliseconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.now_ms
    }

    pub(crate) fn set_now(&mut self, now_ms: f64) {
        self.now_ms = now_ms;
    }

    pub(crate) fn fixed_update_entities(&mut self, dt: f64) {
        for entity in self.entities.values_mut() {
            entity.fixed_update(dt);
        }
    }

    pub(crate) fn update_entities(&mut self, dt: f64) {
        for entity in self.entities.values_mut() {
            entity.update(dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Default)]
    struct Marker {
        removed: Rc<Cell<u32>>,
    }

    impl Component for Marker {
        fn type_name() -> &'static str {
            "Marker"
        }

        fn on_remove(&mut self) {
            self.removed.set(self.removed.get() + 1);
        }
    }

    #[test]
    fn test_add_is_deferred() {
        let mut scene = Scene::new();
        let entity = scene.create_entity();
        let id = scene.add_entity(entity);

        assert!(!scene.contains(id));
        assert_eq!(scene.pending_count(), 1);

        scene.apply_pending();
        assert!(scene.contains(id));
        assert_eq!(scene.pending_count(), 0);
    }

    #[test]
    fn test_remove_fires_on_remove() {
        let removed = Rc::new(Cell::new(0));
        let mut scene = Scene::new();
        let entity = scene.create_entity().with_component(Marker {
            removed: Rc::clone(&removed),
        });
        let id = scene.add_entity(entity);
        scene.apply_pending();

        scene.remove_entity(id);
        assert!(scene.contains(id));
        scene.apply_pending();

        assert!(!scene.contains(id));
        assert_eq!(removed.get(), 1);
    }

    #[test]
    fn test_add_then_remove_in_same_frame() {
        let mut scene = Scene::new();
        let entity = scene.create_entity();
        let id = scene.add_entity(entity);
        scene.remove_entity(id);
        scene.apply_pending();
        assert!(scene.is_empty());
    }

    #[test]
    fn test_queries() {
        let mut scene = Scene::new();
        let tagged = scene.create_entity().with_tag("checkpoint").with_component(Marker::default());
        let plain = scene.create_entity();
        let tagged_id = scene.add_entity(tagged);
        scene.add_entity(plain);
        scene.apply_pending();

        assert_eq!(scene.ids_with::<Marker>(), vec![tagged_id]);
        assert_eq!(scene.find_by_tag("checkpoint").count(), 1);
        assert!(scene.component::<Marker>(tagged_id).is_some());
        assert!(scene.component::<Marker>(EntityId(999)).is_none());
        assert_eq!(scene.len(), 2);
    }
}
