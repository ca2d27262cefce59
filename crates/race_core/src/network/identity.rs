//! Per-entity network ownership and sync gating.

use engine_component::{Component, Entity};
use engine_math::Transform3D;

/// Marks an entity as replicated and decides when it is due for a sync.
///
/// Only the owning client ever sends state for an entity. Every other
/// client holds a non-owned copy that inbound updates overwrite.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkIdentityComponent {
    network_id: String,
    owner_id: String,
    is_local_player: bool,
    is_owner: bool,
    pub sync_position: bool,
    pub sync_rotation: bool,
    pub sync_scale: bool,
    pub sync_velocity: bool,
    /// Minimum gap between two syncs of this entity, in ms.
    pub sync_interval_ms: f64,
    last_sync: Option<f64>,
    dirty: bool,
    /// Transform as of the last frame, to notice movement.
    last_seen: Option<Transform3D>,
}

impl NetworkIdentityComponent {
    /// An entity this client simulates and broadcasts.
    #[must_use]
    pub fn owned(network_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
            owner_id: owner_id.into(),
            is_local_player: false,
            is_owner: true,
            sync_position: true,
            sync_rotation: true,
            sync_scale: false,
            sync_velocity: true,
            sync_interval_ms: 100.0,
            last_sync: None,
            dirty: true,
            last_seen: None,
        }
    }

    /// A local copy of an entity another client owns.
    #[must_use]
    pub fn remote(network_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            is_owner: false,
            dirty: false,
            ..Self::owned(network_id, owner_id)
        }
    }

    /// Flag this as the entity the local player controls.
    #[must_use]
    pub fn local_player(mut self) -> Self {
        self.is_local_player = true;
        self
    }

    #[must_use]
    pub fn with_sync_interval(mut self, interval_ms: f64) -> Self {
        self.sync_interval_ms = interval_ms;
        self
    }

    #[must_use]
    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    #[must_use]
    pub fn is_local_player(&self) -> bool {
        self.is_local_player
    }

    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether any transform channel is replicated.
    #[must_use]
    pub fn syncs_transform(&self) -> bool {
        self.sync_position || self.sync_rotation || self.sync_scale
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// `true` if the entity is dirty and its interval has elapsed at `now`
    /// (ms). A `true` answer consumes the dirty flag and restarts the
    /// interval.
    pub fn needs_sync(&mut self, now: f64) -> bool {
        if !self.dirty {
            return false;
        }
        if self
            .last_sync
            .is_some_and(|last| now - last < self.sync_interval_ms)
        {
            return false;
        }
        self.dirty = false;
        self.last_sync = Some(now);
        true
    }
}

impl Component for NetworkIdentityComponent {
    fn type_name() -> &'static str {
        "NetworkIdentity"
    }

    fn update(&mut self, entity: &mut Entity, _dt: f64) {
        let Some(transform) = entity.get::<Transform3D>().copied() else {
            return;
        };
        if self.last_seen != Some(transform) {
            if self.is_owner && self.last_seen.is_some() {
                self.dirty = true;
            }
            self.last_seen = Some(transform);
        }
    }
}

#[cfg(test)]
mod tests {
    use engine_component::EntityId;
    use engine_math::Vec3;

    use super::*;

    #[test]
    fn test_needs_sync_gates_on_dirty_and_interval() {
        let mut identity = NetworkIdentityComponent::owned("car", "me").with_sync_interval(100.0);

        // Fresh identities start dirty.
        assert!(identity.needs_sync(0.0));
        assert!(!identity.is_dirty());
        assert!(!identity.needs_sync(500.0));

        identity.mark_dirty();
        assert!(identity.needs_sync(500.0));

        identity.mark_dirty();
        assert!(!identity.needs_sync(550.0));
        assert!(identity.is_dirty());
        assert!(identity.needs_sync(600.0));
    }

    #[test]
    fn test_remote_identity_is_clean() {
        let mut identity = NetworkIdentityComponent::remote("car", "them");
        assert!(!identity.is_owner());
        assert!(!identity.needs_sync(1_000.0));
    }

    #[test]
    fn test_movement_marks_owned_entity_dirty() {
        let mut entity = Entity::new(EntityId(1))
            .with_component(Transform3D::IDENTITY)
            .with_component(NetworkIdentityComponent::owned("car", "me"));

        entity.update(0.016);
        entity
            .get_mut::<NetworkIdentityComponent>()
            .unwrap()
            .needs_sync(0.0);

        entity.update(0.016);
        assert!(!entity.get::<NetworkIdentityComponent>().unwrap().is_dirty());

        entity.get_mut::<Transform3D>().unwrap().position = Vec3::new(0.0, 0.0, 1.0);
        entity.update(0.016);
        assert!(entity.get::<NetworkIdentityComponent>().unwrap().is_dirty());
    }

    #[test]
    fn test_movement_does_not_dirty_remote_copy() {
        let mut entity = Entity::new(EntityId(1))
            .with_component(Transform3D::IDENTITY)
            .with_component(NetworkIdentityComponent::remote("car", "them"));

        entity.update(0.016);
        entity.get_mut::<Transform3D>().unwrap().position = Vec3::X;
        entity.update(0.016);
        assert!(!entity.get::<NetworkIdentityComponent>().unwrap().is_dirty());
    }
}
