//! Race orchestration.
//!
//! [`RaceSystem`] drives the whole field through
//!
//! ```text
//! Idle --start_countdown--> Countdown --timer--> Racing --all finished--> Finished
//! ```
//!
//! Each variable-rate update it tests every racer against every registered
//! checkpoint, feeds detected passes into the racer's lap counter, and keeps
//! the standings current. It only holds entity ids; every access goes back
//! through the [`Scene`] and tolerates entities that have disappeared.
//!
//! Notifications go out on an [`EventBus`]; consumers poll their receiver.

use std::collections::BTreeMap;

use engine_component::EntityId;
use engine_math::Transform3D;
use engine_world::{EventBus, EventReceiver, Scene, System};
use tracing::{debug, info};

use crate::checkpoint::CheckpointComponent;
use crate::config::RaceConfig;
use crate::error::RaceError;
use crate::lap_counter::{LapCounterComponent, LapPolicy};
use crate::vehicle::VehicleComponent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RaceState {
    #[default]
    Idle,
    Countdown,
    Racing,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    StateChanged(RaceState),
    /// Whole seconds left before the start.
    CountdownTick(u32),
    RaceStarted,
    CheckpointPassed {
        entity: EntityId,
        checkpoint: u32,
    },
    LapCompleted {
        entity: EntityId,
        /// The lap that was just finished, 1-based.
        lap: u32,
        duration_ms: f64,
    },
    PositionUpdated {
        entity: EntityId,
        /// 1-based rank.
        position: usize,
        total: usize,
    },
    PlayerFinished {
        entity: EntityId,
        position: usize,
    },
    RaceFinished {
        finish_order: Vec<EntityId>,
    },
}

#[derive(Debug)]
pub struct RaceSystem {
    state: RaceState,
    total_laps: u32,
    countdown_seconds: f64,
    countdown_remaining: f64,
    last_countdown_tick: Option<u32>,
    lap_policy: LapPolicy,
    /// Checkpoint entities sorted by index.
    checkpoints: Vec<EntityId>,
    /// Current standings, best first.
    rankings: Vec<EntityId>,
    /// Finished racers in finishing order.
    finished: Vec<EntityId>,
    /// Last position announced per racer.
    announced: BTreeMap<EntityId, usize>,
    events: EventBus<RaceEvent>,
}

impl RaceSystem {
    /// # Errors
    ///
    /// Returns the first problem [`RaceConfig::validate`] finds.
    pub fn new(config: &RaceConfig) -> Result<Self, RaceError> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    /// `config` must already be valid.
    fn from_config(config: &RaceConfig) -> Self {
        Self {
            state: RaceState::Idle,
            total_laps: config.total_laps,
            countdown_seconds: config.countdown_seconds,
            countdown_remaining: 0.0,
            last_countdown_tick: None,
            lap_policy: config.lap_policy,
            checkpoints: Vec::new(),
            rankings: Vec::new(),
            finished: Vec::new(),
            announced: BTreeMap::new(),
            events: EventBus::new(),
        }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&mut self) -> EventReceiver<RaceEvent> {
        self.events.subscribe()
    }

    /// Set the lap target. Lap counters pick it up when the race starts.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::InvalidLapCount`] for zero.
    pub fn configure(&mut self, total_laps: u32) -> Result<(), RaceError> {
        if total_laps == 0 {
            return Err(RaceError::InvalidLapCount(total_laps));
        }
        self.total_laps = total_laps;
        Ok(())
    }

    /// Collect every checkpoint in the scene, sort them by index, and
    /// retarget existing lap counters to the new count. Returns the number
    /// of checkpoints.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::InvalidCheckpointCount`] if the scene has no
    /// checkpoints.
    pub fn register_checkpoints(&mut self, scene: &mut Scene) -> Result<u32, RaceError> {
        let mut gates: Vec<(u32, EntityId)> = scene
            .ids_with::<CheckpointComponent>()
            .into_iter()
            .filter_map(|id| scene.component::<CheckpointComponent>(id).map(|c| (c.index, id)))
            .collect();
        gates.sort_unstable();

        let count = u32::try_from(gates.len()).unwrap_or(u32::MAX);
        if count == 0 {
            return Err(RaceError::InvalidCheckpointCount(0));
        }
        self.checkpoints = gates.into_iter().map(|(_, id)| id).collect();

        for id in scene.ids_with::<LapCounterComponent>() {
            if let Some(lap) = scene.component_mut::<LapCounterComponent>(id) {
                lap.set_total_checkpoints(count)?;
            }
        }
        info!(checkpoints = count, "checkpoints registered");
        Ok(count)
    }

    /// Begin the pre-race countdown. Ignored while counting down or racing.
    pub fn start_countdown(&mut self) {
        if matches!(self.state, RaceState::Countdown | RaceState::Racing) {
            return;
        }
        self.set_state(RaceState::Countdown);
        self.countdown_remaining = self.countdown_seconds;
        self.last_countdown_tick = None;
        let seconds = self.countdown_remaining.ceil();
        if seconds > 0.0 {
            self.emit_countdown_tick(seconds as u32);
        }
        info!(seconds = self.countdown_seconds, "countdown started");
    }

    /// Finish the race now, in whatever order racers have finished so far.
    pub fn end_race(&mut self) {
        if self.state == RaceState::Finished {
            return;
        }
        self.set_state(RaceState::Finished);
        info!(finishers = self.finished.len(), "race finished");
        self.events.emit(RaceEvent::RaceFinished {
            finish_order: self.finished.clone(),
        });
    }

    /// Return to `Idle`, clearing standings, gates, and lap counters.
    pub fn reset(&mut self, scene: &mut Scene) {
        self.countdown_remaining = 0.0;
        self.last_countdown_tick = None;
        self.rankings.clear();
        self.finished.clear();
        self.announced.clear();
        self.reset_checkpoints(scene);
        for id in scene.ids_with::<LapCounterComponent>() {
            if let Some(lap) = scene.component_mut::<LapCounterComponent>(id) {
                lap.reset();
            }
        }
        self.set_state(RaceState::Idle);
    }

    /// Mark `entity` as finished. Repeated calls are ignored. Ends the race
    /// once every known racer has finished.
    pub fn player_finish(&mut self, scene: &Scene, entity: EntityId) {
        if self.finished.contains(&entity) {
            return;
        }
        self.finished.push(entity);
        let position = self.finished.len();
        info!(entity = %entity, position, "racer finished");
        self.events.emit(RaceEvent::PlayerFinished { entity, position });

        self.update_rankings(scene);
        if self.rankings.iter().all(|id| self.finished.contains(id)) {
            self.end_race();
        }
    }

    /// 1-based standing of `entity`; racers not in the standings rank last.
    #[must_use]
    pub fn get_player_position(&self, entity: EntityId) -> usize {
        self.rankings
            .iter()
            .position(|&id| id == entity)
            .map_or(self.rankings.len() + 1, |index| index + 1)
    }

    #[must_use]
    pub fn state(&self) -> RaceState {
        self.state
    }

    #[must_use]
    pub fn is_racing(&self) -> bool {
        self.state == RaceState::Racing
    }

    #[must_use]
    pub fn total_laps(&self) -> u32 {
        self.total_laps
    }

    #[must_use]
    pub fn countdown_remaining(&self) -> f64 {
        self.countdown_remaining
    }

    #[must_use]
    pub fn checkpoints(&self) -> &[EntityId] {
        &self.checkpoints
    }

    #[must_use]
    pub fn rankings(&self) -> &[EntityId] {
        &self.rankings
    }

    #[must_use]
    pub fn finished(&self) -> &[EntityId] {
        &self.finished
    }

    fn set_state(&mut self, state: RaceState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "race state changed");
            self.state = state;
            self.events.emit(RaceEvent::StateChanged(state));
        }
    }

    fn emit_countdown_tick(&mut self, seconds: u32) {
        self.last_countdown_tick = Some(seconds);
        self.events.emit(RaceEvent::CountdownTick(seconds));
    }

    fn advance_countdown(&mut self, scene: &mut Scene, dt: f64) {
        self.countdown_remaining -= dt;
        let seconds = self.countdown_remaining.ceil();
        if seconds <= 0.0 {
            self.countdown_remaining = 0.0;
            self.start_race(scene);
        } else if self.last_countdown_tick != Some(seconds as u32) {
            self.emit_countdown_tick(seconds as u32);
        }
    }

    fn start_race(&mut self, scene: &mut Scene) {
        let now = scene.now();
        self.reset_checkpoints(scene);
        self.finished.clear();
        self.announced.clear();
        self.rankings = racer_ids(scene);

        let checkpoint_count = u32::try_from(self.checkpoints.len()).unwrap_or(u32::MAX);
        for &id in &self.rankings {
            if let Some(lap) = scene.component_mut::<LapCounterComponent>(id) {
                // Both counts are already validated non-zero.
                let _ = lap.set_total_laps(self.total_laps);
                if checkpoint_count > 0 {
                    let _ = lap.set_total_checkpoints(checkpoint_count);
                }
                lap.set_policy(self.lap_policy);
                lap.start_race(now);
            }
        }

        self.set_state(RaceState::Racing);
        info!(racers = self.rankings.len(), laps = self.total_laps, "race started");
        self.events.emit(RaceEvent::RaceStarted);
    }

    fn reset_checkpoints(&self, scene: &mut Scene) {
        for &id in &self.checkpoints {
            if let Some(gate) = scene.component_mut::<CheckpointComponent>(id) {
                gate.reset();
            }
        }
    }

    /// Test every racer against every gate and feed the lap counters.
    fn process_racers(&mut self, scene: &mut Scene) {
        let now = scene.now();
        let checkpoint_count = u32::try_from(self.checkpoints.len()).unwrap_or(u32::MAX);
        let mut finishers = Vec::new();

        for racer in racer_ids(scene) {
            let Some(position) = scene.component::<Transform3D>(racer).map(|t| t.position) else {
                continue;
            };

            let mut passed = Vec::new();
            for &gate_id in &self.checkpoints {
                let Some(origin) = scene.component::<Transform3D>(gate_id).map(|t| t.position) else {
                    continue;
                };
                let Some(gate) = scene.component_mut::<CheckpointComponent>(gate_id) else {
                    continue;
                };
                if gate.check_vehicle_passing(origin, racer, position, now) {
                    passed.push(gate.index);
                }
            }

            let Some(lap) = scene.component_mut::<LapCounterComponent>(racer) else {
                continue;
            };
            if checkpoint_count > 0 && lap.total_checkpoints() != checkpoint_count {
                let _ = lap.set_total_checkpoints(checkpoint_count);
            }

            for index in passed {
                let lap_before = lap.current_lap();
                if !lap.pass_checkpoint(index, now) {
                    continue;
                }
                self.events.emit(RaceEvent::CheckpointPassed {
                    entity: racer,
                    checkpoint: index,
                });
                if lap.current_lap() > lap_before {
                    let duration_ms = lap.last_lap().map_or(0.0, |record| record.duration);
                    debug!(entity = %racer, lap = lap_before, duration_ms, "lap completed");
                    self.events.emit(RaceEvent::LapCompleted {
                        entity: racer,
                        lap: lap_before,
                        duration_ms,
                    });
                    if lap_before >= self.total_laps {
                        finishers.push(racer);
                    }
                }
            }
        }

        for racer in finishers {
            self.player_finish(scene, racer);
        }
    }

    /// Finished racers first in finishing order, then active racers by lap
    /// and checkpoint, both descending. Ties keep their previous order.
    fn update_rankings(&mut self, scene: &Scene) {
        let mut active: Vec<EntityId> = self
            .rankings
            .iter()
            .copied()
            .filter(|id| !self.finished.contains(id))
            .collect();
        for id in racer_ids(scene) {
            if !self.finished.contains(&id) && !active.contains(&id) {
                active.push(id);
            }
        }

        let mut keyed: Vec<(EntityId, u32, u32)> = active
            .into_iter()
            .filter_map(|id| {
                scene
                    .component::<LapCounterComponent>(id)
                    .map(|lap| (id, lap.current_lap(), lap.current_checkpoint()))
            })
            .collect();
        keyed.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)));

        self.rankings = self.finished.clone();
        self.rankings.extend(keyed.into_iter().map(|(id, _, _)| id));

        let total = self.rankings.len();
        for (index, &entity) in self.rankings.iter().enumerate() {
            let position = index + 1;
            if self.announced.insert(entity, position) != Some(position) {
                self.events.emit(RaceEvent::PositionUpdated {
                    entity,
                    position,
                    total,
                });
            }
        }
    }
}

impl Default for RaceSystem {
    fn default() -> Self {
        Self::from_config(&RaceConfig::default())
    }
}

impl System for RaceSystem {
    fn name(&self) -> &str {
        "race"
    }

    fn update(&mut self, scene: &mut Scene, dt: f64) {
        if self.state == RaceState::Countdown {
            self.advance_countdown(scene, dt);
        }
        self.process_racers(scene);
        if self.state == RaceState::Racing {
            self.update_rankings(scene);
        }
    }
}

/// Entities that carry everything a racer needs, in id order.
fn racer_ids(scene: &Scene) -> Vec<EntityId> {
    scene
        .iter()
        .filter(|e| {
            e.has::<VehicleComponent>() && e.has::<Transform3D>() && e.has::<LapCounterComponent>()
        })
        .map(|e| e.id())
        .collect()
}
