//! World synchronisation over a room [`Transport`].
//!
//! Every frame the system drains the transport and applies remote state.
//! At most once per sync interval of wall-clock time it also publishes the
//! state of every owned entity that is due. It runs before gameplay
//! systems so they see this frame's remote state.

use std::collections::BTreeMap;

use engine_component::{Component, EntityId};
use engine_math::{Quat, Transform3D, Vec3};
use engine_net::{
    MessagePayload, NetworkMessage, PlayerData, TransformData, Transport, VehicleData,
};
use engine_world::{EventBus, EventReceiver, Scene, System};
use tracing::{debug, info, trace, warn};

use super::identity::NetworkIdentityComponent;
use crate::vehicle::VehicleComponent;

/// Runs ahead of every gameplay system.
pub const NETWORK_PRIORITY: i32 = -100;

/// Default gap between outbound flushes, in ms.
pub const DEFAULT_SYNC_INTERVAL_MS: f64 = 100.0;

/// Room activity that is not entity state.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    PlayerJoined { player_id: String, name: String },
    PlayerLeft { player_id: String },
    /// A race-progress notification from another client.
    RaceMessage(NetworkMessage),
}

pub struct NetworkSystem {
    transport: Box<dyn Transport>,
    /// Network id to local entity, for inbound routing.
    registered: BTreeMap<String, EntityId>,
    sync_interval_ms: f64,
    last_flush: Option<f64>,
    events: EventBus<NetworkEvent>,
}

impl NetworkSystem {
    #[must_use]
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::from_boxed(Box::new(transport))
    }

    #[must_use]
    pub fn from_boxed(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            registered: BTreeMap::new(),
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            last_flush: None,
            events: EventBus::new(),
        }
    }

    #[must_use]
    pub fn with_sync_interval(mut self, interval_ms: f64) -> Self {
        self.sync_interval_ms = interval_ms;
        self
    }

    /// This client's id on the transport.
    #[must_use]
    pub fn local_id(&self) -> &str {
        self.transport.local_id()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn subscribe(&mut self) -> EventReceiver<NetworkEvent> {
        self.events.subscribe()
    }

    /// Route inbound updates for `network_id` to `entity`.
    pub fn register_entity(&mut self, network_id: impl Into<String>, entity: EntityId) {
        let network_id = network_id.into();
        debug!(network_id, entity = %entity, "network entity registered");
        self.registered.insert(network_id, entity);
    }

    pub fn unregister_entity(&mut self, network_id: &str) -> Option<EntityId> {
        self.registered.remove(network_id)
    }

    #[must_use]
    pub fn registered_entity(&self, network_id: &str) -> Option<EntityId> {
        self.registered.get(network_id).copied()
    }

    /// Send a one-off message about `entity_id` (a network id).
    pub fn broadcast(&mut self, entity_id: impl Into<String>, payload: MessagePayload, now: f64) {
        let message = NetworkMessage::new(self.transport.local_id(), entity_id, now, payload);
        self.send(&message);
    }

    pub fn announce_join(&mut self, player_id: &str, name: &str, now: f64) {
        let payload = MessagePayload::PlayerJoin(PlayerData {
            player_id: player_id.to_string(),
            name: name.to_string(),
        });
        self.broadcast(player_id, payload, now);
    }

    pub fn announce_leave(&mut self, player_id: &str, now: f64) {
        let payload = MessagePayload::PlayerLeave(PlayerData {
            player_id: player_id.to_string(),
            name: String::new(),
        });
        self.broadcast(player_id, payload, now);
    }

    /// Fire and forget: failures are logged, never retried.
    fn send(&mut self, message: &NetworkMessage) {
        if let Err(e) = self.transport.send(message) {
            warn!(error = %e, kind = message.kind(), entity = message.entity_id, "send failed");
        }
    }

    fn apply_inbound(&mut self, scene: &mut Scene) {
        for message in self.transport.receive() {
            if message.sender_id == self.transport.local_id() {
                trace!(kind = message.kind(), "dropping own echo");
                continue;
            }
            if message.payload.is_race_notification() {
                self.events.emit(NetworkEvent::RaceMessage(message));
                continue;
            }
            match &message.payload {
                MessagePayload::TransformUpdate(data) => {
                    if let Some(transform) = self.remote_component::<Transform3D>(scene, &message) {
                        apply_transform(transform, data);
                    }
                }
                MessagePayload::VehicleUpdate(data) => {
                    if let Some(vehicle) = self.remote_component::<VehicleComponent>(scene, &message) {
                        vehicle.apply_remote_state(
                            Vec3::from(data.velocity),
                            data.steering_angle,
                            data.engine_force,
                            data.braking_force,
                        );
                    }
                }
                MessagePayload::PlayerJoin(player) => {
                    info!(player_id = player.player_id, sender = message.sender_id, "player joined");
                    self.events.emit(NetworkEvent::PlayerJoined {
                        player_id: player.player_id.clone(),
                        name: player.name.clone(),
                    });
                }
                MessagePayload::PlayerLeave(player) => {
                    info!(player_id = player.player_id, sender = message.sender_id, "player left");
                    self.events.emit(NetworkEvent::PlayerLeft {
                        player_id: player.player_id.clone(),
                    });
                }
                // Race notifications were routed above.
                _ => {}
            }
        }
    }

    /// Resolve the component `C` of the registered, non-owned entity that
    /// `message` is about.
    fn remote_component<'a, C: Component>(
        &self,
        scene: &'a mut Scene,
        message: &NetworkMessage,
    ) -> Option<&'a mut C> {
        let id = self.registered.get(&message.entity_id).copied()?;
        let entity = scene.get_mut(id)?;
        if entity
            .get::<NetworkIdentityComponent>()
            .is_some_and(NetworkIdentityComponent::is_owner)
        {
            trace!(entity = message.entity_id, "ignoring update for owned entity");
            return None;
        }
        entity.get_mut::<C>()
    }

    fn flush_outbound(&mut self, scene: &mut Scene, now: f64) {
        let sender = self.transport.local_id().to_string();
        let mut outbound = Vec::new();

        for entity in scene.iter_mut() {
            let transform = entity.get::<Transform3D>().copied();
            let vehicle = entity
                .get::<VehicleComponent>()
                .map(|v| (v.velocity(), v.steering_angle(), v.engine_force(), v.braking_force()));
            let Some(identity) = entity.get_mut::<NetworkIdentityComponent>() else {
                continue;
            };
            if !identity.is_owner() || !identity.needs_sync(now) {
                continue;
            }

            if let Some(transform) = transform.filter(|_| identity.syncs_transform()) {
                let data = TransformData {
                    position: transform.position.into(),
                    rotation: transform.rotation.into(),
                    scale: identity.sync_scale.then(|| transform.scale.into()),
                };
                outbound.push(NetworkMessage::new(
                    sender.as_str(),
                    identity.network_id(),
                    now,
                    MessagePayload::TransformUpdate(data),
                ));
            }

            if let Some((velocity, steering_angle, engine_force, braking_force)) =
                vehicle.filter(|_| identity.sync_velocity)
            {
                outbound.push(NetworkMessage::new(
                    sender.as_str(),
                    identity.network_id(),
                    now,
                    MessagePayload::VehicleUpdate(VehicleData {
                        velocity: velocity.into(),
                        steering_angle,
                        engine_force,
                        braking_force,
                    }),
                ));
            }
        }

        if !outbound.is_empty() {
            trace!(messages = outbound.len(), "flushing entity state");
        }
        for message in &outbound {
            self.send(message);
        }
    }
}

impl std::fmt::Debug for NetworkSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkSystem")
            .field("local_id", &self.transport.local_id())
            .field("registered", &self.registered)
            .field("sync_interval_ms", &self.sync_interval_ms)
            .finish_non_exhaustive()
    }
}

impl System for NetworkSystem {
    fn name(&self) -> &str {
        "network"
    }

    fn priority(&self) -> i32 {
        NETWORK_PRIORITY
    }

    fn init(&mut self, _scene: &mut Scene) {
        info!(local_id = self.transport.local_id(), "network sync attached");
    }

    fn update(&mut self, scene: &mut Scene, _dt: f64) {
        self.apply_inbound(scene);

        let now = scene.now();
        if self
            .last_flush
            .is_some_and(|last| now - last < self.sync_interval_ms)
        {
            return;
        }
        self.last_flush = Some(now);
        self.flush_outbound(scene, now);
    }

    fn shutdown(&mut self, _scene: &mut Scene) {
        self.transport.disconnect();
        info!(local_id = self.transport.local_id(), "network sync detached");
    }
}

fn apply_transform(transform: &mut Transform3D, data: &TransformData) {
    transform.position = Vec3::from(data.position);
    transform.rotation = Quat::from(data.rotation);
    if let Some(scale) = data.scale {
        transform.scale = Vec3::from(scale);
    }
}
