//! One client's race: the world, its cars, and the glue between race
//! events and the room.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use engine_component::EntityId;
use engine_math::{Transform3D, Vec3};
use engine_net::{CheckpointData, LapData, MessagePayload, RaceEndData, RaceStartData, Transport};
use engine_world::{EventReceiver, World};
use race_core::prefab::build_vehicle;
use race_core::{
    LapCounterComponent, NetworkEvent, NetworkIdentityComponent, NetworkSystem, RaceConfig, RaceEvent,
    RaceSystem, VehicleComponent,
};
use tracing::{debug, info, warn};

use crate::driver::{Autopilot, Input};
use crate::track;

/// Clock value of the first simulated frame, in ms.
pub const FIRST_FRAME_MS: f64 = 1.0;

#[derive(Debug)]
struct Racer {
    entity: EntityId,
    network_id: String,
    pilot: Autopilot,
}

pub struct Session {
    world: World,
    client_id: String,
    racers: Vec<Racer>,
    gates: Vec<Vec3>,
    gate_radius: f32,
    /// Network ids of mirrored remote cars.
    proxies: BTreeSet<String>,
    race_events: EventReceiver<RaceEvent>,
    net_events: EventReceiver<NetworkEvent>,
    finished: bool,
}

impl Session {
    /// Lay out the track and grid. Nothing is simulated until [`prime`].
    ///
    /// [`prime`]: Session::prime
    pub fn new(config: &RaceConfig, transport: Box<dyn Transport>, racers: usize, gate_count: u32) -> Result<Self> {
        let client_id = transport.local_id().to_string();
        let mut world = World::new();

        let mut race = RaceSystem::new(config).context("invalid race config")?;
        let race_events = race.subscribe();
        world.add_system(race);

        let mut network = NetworkSystem::from_boxed(transport).with_sync_interval(config.sync_interval_ms);
        let net_events = network.subscribe();

        let gates = track::build(&mut world, gate_count, config.checkpoint_radius);

        let mut grid = Vec::with_capacity(racers);
        for slot in 0..racers {
            let network_id = format!("{client_id}-car-{slot}");
            let mut identity = NetworkIdentityComponent::owned(network_id.clone(), client_id.clone())
                .with_sync_interval(config.sync_interval_ms);
            if slot == 0 {
                identity = identity.local_player();
            }
            let car = build_vehicle(world.scene_mut(), config, track::grid_slot(slot), gate_count)?
                .with_component(identity);
            let entity = world.add_entity(car);
            network.register_entity(network_id.clone(), entity);
            grid.push(Racer {
                entity,
                network_id,
                // Stagger the field so the finish order is not a dead heat.
                pilot: Autopilot::new(24.0 + 4.0 * slot as f32),
            });
        }
        world.add_system(network);

        info!(client_id, racers, gates = gate_count, laps = config.total_laps, "session created");
        Ok(Self {
            world,
            client_id,
            racers: grid,
            gates,
            gate_radius: config.checkpoint_radius,
            proxies: BTreeSet::new(),
            race_events,
            net_events,
            finished: false,
        })
    }

    /// Materialise the track, register the gates, announce the cars, and
    /// start the countdown.
    pub fn prime(&mut self) -> Result<()> {
        self.world.update(0.0);
        self.world.update(FIRST_FRAME_MS);

        let gates = self
            .world
            .with_system::<RaceSystem, _>(|race, scene| race.register_checkpoints(scene))
            .context("race system missing")??;
        debug!(gates, "track ready");

        self.announce(FIRST_FRAME_MS);
        self.world
            .system_mut::<RaceSystem>()
            .context("race system missing")?
            .start_countdown();
        Ok(())
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Run one frame at `now` (ms since the session started).
    pub fn frame(&mut self, now: f64) {
        self.drive();
        self.world.update(now);
        self.handle_race_events(now);
        self.handle_network_events(now);
    }

    /// Log the results, leave the room, and detach the network.
    pub fn shutdown(&mut self, now: f64) {
        for racer in &self.racers {
            let Some(lap) = self.world.scene().component::<LapCounterComponent>(racer.entity) else {
                continue;
            };
            info!(
                car = racer.network_id,
                laps = lap.laps().len(),
                best_lap_ms = lap.best_lap_time(),
                race_time_ms = lap.total_race_time(),
                finished = lap.is_finished(),
                "result"
            );
        }

        if let Some(network) = self.world.system_mut::<NetworkSystem>() {
            for racer in &self.racers {
                network.announce_leave(&racer.network_id, now);
            }
        }
        self.world.remove_system::<NetworkSystem>();
    }

    fn drive(&mut self) {
        let racing = self.world.system::<RaceSystem>().is_some_and(RaceSystem::is_racing);
        let scene = self.world.scene_mut();
        for racer in &mut self.racers {
            let done = scene
                .component::<LapCounterComponent>(racer.entity)
                .is_none_or(LapCounterComponent::is_finished);
            let Some(transform) = scene.component::<Transform3D>(racer.entity).copied() else {
                continue;
            };
            let Some(vehicle) = scene.component_mut::<VehicleComponent>(racer.entity) else {
                continue;
            };
            let input = if racing && !done {
                racer.pilot.drive(&transform, vehicle.speed(), &self.gates, self.gate_radius)
            } else {
                Input::HOLD
            };
            vehicle.set_inputs(input.throttle, input.brake, input.steering);
        }
    }

    fn network_id(&self, entity: EntityId) -> Option<&str> {
        self.racers
            .iter()
            .find(|r| r.entity == entity)
            .map(|r| r.network_id.as_str())
    }

    fn broadcast(&mut self, entity_id: &str, payload: MessagePayload, now: f64) {
        if let Some(network) = self.world.system_mut::<NetworkSystem>() {
            network.broadcast(entity_id, payload, now);
        }
    }

    fn announce(&mut self, now: f64) {
        let Some(network) = self.world.system_mut::<NetworkSystem>() else {
            return;
        };
        for racer in &self.racers {
            network.announce_join(&racer.network_id, &self.client_id, now);
        }
    }

    fn handle_race_events(&mut self, now: f64) {
        while let Ok(event) = self.race_events.try_recv() {
            match event {
                RaceEvent::StateChanged(state) => debug!(?state, "race state"),
                RaceEvent::CountdownTick(seconds) => info!(seconds, "countdown"),
                RaceEvent::RaceStarted => {
                    info!("race started");
                    let total_laps = self.world.system::<RaceSystem>().map_or(0, RaceSystem::total_laps);
                    let client_id = self.client_id.clone();
                    self.broadcast(&client_id, MessagePayload::RaceStart(RaceStartData { total_laps }), now);
                }
                RaceEvent::CheckpointPassed { entity, checkpoint } => {
                    let Some(id) = self.network_id(entity).map(str::to_string) else {
                        continue;
                    };
                    debug!(car = id, checkpoint, "checkpoint");
                    let payload = MessagePayload::CheckpointPassed(CheckpointData {
                        checkpoint_index: checkpoint,
                    });
                    self.broadcast(&id, payload, now);
                }
                RaceEvent::LapCompleted {
                    entity,
                    lap,
                    duration_ms,
                } => {
                    let Some(id) = self.network_id(entity).map(str::to_string) else {
                        continue;
                    };
                    info!(car = id, lap, duration_ms, "lap completed");
                    let payload = MessagePayload::LapCompleted(LapData {
                        lap,
                        lap_time: duration_ms,
                    });
                    self.broadcast(&id, payload, now);
                }
                RaceEvent::PositionUpdated {
                    entity,
                    position,
                    total,
                } => debug!(entity = %entity, position, total, "standings"),
                RaceEvent::PlayerFinished { entity, position } => {
                    info!(car = self.network_id(entity), position, "car finished");
                }
                RaceEvent::RaceFinished { finish_order } => {
                    let finish_order: Vec<String> = finish_order
                        .into_iter()
                        .filter_map(|entity| self.network_id(entity).map(str::to_string))
                        .collect();
                    info!(?finish_order, "race finished");
                    let client_id = self.client_id.clone();
                    self.broadcast(&client_id, MessagePayload::RaceEnd(RaceEndData { finish_order }), now);
                    self.finished = true;
                }
            }
        }
    }

    fn handle_network_events(&mut self, now: f64) {
        while let Ok(event) = self.net_events.try_recv() {
            match event {
                NetworkEvent::PlayerJoined { player_id, name } => self.add_proxy(player_id, name, now),
                NetworkEvent::PlayerLeft { player_id } => self.remove_proxy(&player_id),
                NetworkEvent::RaceMessage(message) => {
                    info!(kind = message.kind(), sender = message.sender_id, car = message.entity_id, "room");
                }
            }
        }
    }

    /// Mirror a car announced by another client.
    fn add_proxy(&mut self, network_id: String, owner_id: String, now: f64) {
        let known = self
            .world
            .system::<NetworkSystem>()
            .and_then(|network| network.registered_entity(&network_id))
            .is_some();
        if owner_id == self.client_id || known {
            return;
        }
        let proxy = self
            .world
            .create_entity()
            .with_component(Transform3D::IDENTITY)
            .with_component(NetworkIdentityComponent::remote(network_id.clone(), owner_id.clone()));
        let entity = self.world.add_entity(proxy);
        let Some(network) = self.world.system_mut::<NetworkSystem>() else {
            warn!(car = network_id, "no network system for remote car");
            return;
        };
        network.register_entity(network_id.clone(), entity);
        info!(car = network_id, owner = owner_id, "remote car joined");
        self.proxies.insert(network_id);

        // Late joiners missed our first announcement.
        self.announce(now);
    }

    fn remove_proxy(&mut self, network_id: &str) {
        if !self.proxies.remove(network_id) {
            return;
        }
        let entity = self
            .world
            .system_mut::<NetworkSystem>()
            .and_then(|network| network.unregister_entity(network_id));
        if let Some(entity) = entity {
            self.world.remove_entity(entity);
        }
        info!(car = network_id, "remote car left");
    }
}

#[cfg(test)]
mod tests {
    use engine_net::RelayHub;

    use super::*;

    fn offline(hub: &RelayHub, client_id: &str, racers: usize) -> Session {
        let config = RaceConfig::default().with_total_laps(1).with_countdown_seconds(0.0);
        let transport = Box::new(hub.join("test", client_id));
        let mut session = Session::new(&config, transport, racers, 6).unwrap();
        session.prime().unwrap();
        session
    }

    #[test]
    fn test_prime_registers_track_and_starts() {
        let hub = RelayHub::new();
        let mut session = offline(&hub, "solo", 2);
        assert_eq!(session.world.system::<RaceSystem>().unwrap().checkpoints().len(), 6);

        session.frame(FIRST_FRAME_MS + 16.0);
        assert!(session.world.system::<RaceSystem>().unwrap().is_racing());
        assert!(!session.is_finished());
    }

    #[test]
    fn test_sessions_mirror_each_others_cars() {
        let hub = RelayHub::new();
        let mut a = offline(&hub, "a", 1);
        let mut b = offline(&hub, "b", 2);

        let mut now = FIRST_FRAME_MS;
        for _ in 0..4 {
            now += 16.0;
            a.frame(now);
            b.frame(now);
        }

        assert_eq!(a.proxies.iter().cloned().collect::<Vec<_>>(), vec!["b-car-0", "b-car-1"]);
        assert_eq!(b.proxies.iter().cloned().collect::<Vec<_>>(), vec!["a-car-0"]);

        b.shutdown(now);
        now += 16.0;
        a.frame(now);
        assert!(a.proxies.is_empty());
    }

    #[test]
    fn test_autopilot_moves_cars_once_racing() {
        let hub = RelayHub::new();
        let mut session = offline(&hub, "solo", 1);
        let car = session.racers[0].entity;
        let start = session.world.scene().component::<Transform3D>(car).unwrap().position;

        let mut now = FIRST_FRAME_MS;
        for _ in 0..60 {
            now += 16.0;
            session.frame(now);
        }
        let position = session.world.scene().component::<Transform3D>(car).unwrap().position;
        assert!(position.distance(start) > 1.0);
    }
}
