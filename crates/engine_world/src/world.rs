//! The fixed-timestep world scheduler.
//!
//! One call to [`World::update`] per rendered frame drives the whole
//! simulation:
//!
//! 1. The first call only records the clock baseline.
//! 2. The wall-clock delta is converted to seconds and capped.
//! 3. Queued entity additions/removals are applied.
//! 4. Zero or more fixed ticks run: every system's `fixed_update` in priority
//!    order, then every component's `fixed_update`.
//! 5. Exactly one variable pass runs: every system's `update`, then every
//!    component's `update`.

use engine_component::{Entity, EntityId};
use tracing::{debug, trace, warn};

use crate::error::WorldError;
use crate::scene::Scene;
use crate::system::System;
use crate::time::FixedTimestep;

/// Configuration for the world's clock.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    /// Duration of one fixed tick, in seconds.
    pub fixed_time_step: f64,
    /// Cap applied to each frame's delta, in seconds.
    pub max_frame_delta: f64,
}

impl WorldConfig {
    /// Override the fixed time step.
    #[must_use]
    pub fn with_fixed_time_step(mut self, step: f64) -> Self {
        self.fixed_time_step = step;
        self
    }

    /// Override the frame delta cap.
    #[must_use]
    pub fn with_max_frame_delta(mut self, max: f64) -> Self {
        self.max_frame_delta = max;
        self
    }

    /// Check that the step is positive and the cap admits at least one step.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), WorldError> {
        if !self.fixed_time_step.is_finite() || self.fixed_time_step <= 0.0 {
            return Err(WorldError::InvalidTimeStep(self.fixed_time_step));
        }
        if !self.max_frame_delta.is_finite() || self.max_frame_delta < self.fixed_time_step {
            return Err(WorldError::InvalidFrameDelta {
                max_frame_delta: self.max_frame_delta,
                fixed_time_step: self.fixed_time_step,
            });
        }
        Ok(())
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            fixed_time_step: 1.0 / 60.0,
            max_frame_delta: 0.25,
        }
    }
}

/// Owns every entity (through its [`Scene`]) and every [`System`].
pub struct World {
    config: WorldConfig,
    scene: Scene,
    /// Sorted ascending by priority.
    systems: Vec<Box<dyn System>>,
    clock: FixedTimestep,
    /// Timestamp of the previous `update` call, in milliseconds.
    last_time: Option<f64>,
    tick_count: u64,
    frame_count: u64,
}

impl World {
    /// Create a world with the default 60 Hz configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(WorldConfig::default())
    }

    /// Create a world with a custom clock configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] if the configuration is invalid.
    pub fn with_config(config: WorldConfig) -> Result<Self, WorldError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        Self {
            clock: FixedTimestep::new(config.fixed_time_step, config.max_frame_delta),
            config,
            scene: Scene::new(),
            systems: Vec::new(),
            last_time: None,
            tick_count: 0,
            frame_count: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Allocate a fresh entity (not yet added).
    pub fn create_entity(&mut self) -> Entity {
        self.scene.create_entity()
    }

    /// Queue an entity for insertion at the start of the next update.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        self.scene.add_entity(entity)
    }

    /// Queue an entity for removal at the start of the next update.
    pub fn remove_entity(&mut self, id: EntityId) {
        self.scene.remove_entity(id);
    }

    #[must_use]
    pub fn get_entity(&self, id: EntityId) -> Option<&Entity> {
        self.scene.get(id)
    }

    pub fn get_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.scene.get_mut(id)
    }

    /// Add a system, call its `init`, and keep the list sorted by priority.
    pub fn add_system<S: System>(&mut self, system: S) {
        let mut system: Box<dyn System> = Box::new(system);
        system.init(&mut self.scene);
        let priority = system.priority();
        let index = self.systems.partition_point(|s| s.priority() <= priority);
        debug!(system = system.name(), priority, index, "system added");
        self.systems.insert(index, system);
    }

    /// Remove the system of type `S`, calling its `shutdown`. Returns `true`
    /// if one was found.
    pub fn remove_system<S: System>(&mut self) -> bool {
        let Some(index) = self
            .systems
            .iter()
            .position(|s| (**s).as_any().is::<S>())
        else {
            return false;
        };
        let mut system = self.systems.remove(index);
        system.shutdown(&mut self.scene);
        debug!(system = system.name(), "system removed");
        true
    }

    /// Borrow the system of type `S`.
    #[must_use]
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems
            .iter()
            .find_map(|s| (**s).as_any().downcast_ref::<S>())
    }

    /// Mutably borrow the system of type `S`.
    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems
            .iter_mut()
            .find_map(|s| (**s).as_any_mut().downcast_mut::<S>())
    }

    /// Run `f` with the system of type `S` and the scene borrowed together.
    pub fn with_system<S: System, R>(&mut self, f: impl FnOnce(&mut S, &mut Scene) -> R) -> Option<R> {
        let scene = &mut self.scene;
        self.systems
            .iter_mut()
            .find_map(|s| (**s).as_any_mut().downcast_mut::<S>())
            .map(|system| f(system, scene))
    }

    /// System names in execution order.
    #[must_use]
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    /// Advance the world to `current_time` (milliseconds, monotonic).
    ///
    /// Returns the number of fixed ticks that ran this frame.
    pub fn update(&mut self, current_time: f64) -> u32 {
        self.scene.set_now(current_time);
        let Some(last_time) = self.last_time.replace(current_time) else {
            debug!(current_time, "world clock baseline recorded");
            return 0;
        };

        let raw_delta = (current_time - last_time) / 1000.0;
        let dt = self.clock.clamp_delta(raw_delta);
        if raw_delta > dt {
            warn!(raw_delta, capped_delta = dt, "frame delta capped");
        }

        self.scene.apply_pending();

        self.clock.accumulate(dt);
        let step = self.clock.step();
        let mut ticks = 0;
        while self.clock.consume_step() {
            for system in &mut self.systems {
                system.fixed_update(&mut self.scene, step);
            }
            self.scene.fixed_update_entities(step);
            ticks += 1;
            self.tick_count += 1;
        }

        for system in &mut self.systems {
            system.update(&mut self.scene, dt);
        }
        self.scene.update_entities(dt);

        self.frame_count += 1;
        trace!(frame = self.frame_count, ticks, dt, "frame complete");
        ticks
    }

    /// Total fixed ticks run since creation.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Total simulated frames (excludes the baseline call).
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Leftover fraction of a fixed step, for render interpolation.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.clock.alpha()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use engine_component::Component;

    use super::*;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        priority: i32,
        log: Log,
    }

    impl System for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn fixed_update(&mut self, _scene: &mut Scene, _dt: f64) {
            self.log.borrow_mut().push(format!("fixed:{}", self.name));
        }

        fn update(&mut self, _scene: &mut Scene, _dt: f64) {
            self.log.borrow_mut().push(format!("update:{}", self.name));
        }
    }

    #[derive(Default)]
    struct Tally {
        log: Log,
        fixed_dt: Vec<f64>,
    }

    impl Component for Tally {
        fn type_name() -> &'static str {
            "Tally"
        }

        fn fixed_update(&mut self, _entity: &mut Entity, dt: f64) {
            self.fixed_dt.push(dt);
            self.log.borrow_mut().push("fixed:component".to_string());
        }

        fn update(&mut self, _entity: &mut Entity, _dt: f64) {
            self.log.borrow_mut().push("update:component".to_string());
        }
    }

    const STEP: f64 = 1.0 / 64.0;
    /// One fixed step in milliseconds (15.625 ms, exact in binary).
    const STEP_MS: f64 = 1000.0 / 64.0;

    fn world_with_step() -> World {
        World::with_config(WorldConfig::default().with_fixed_time_step(STEP)).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad_step = WorldConfig::default().with_fixed_time_step(0.0);
        assert_eq!(World::with_config(bad_step).err(), Some(WorldError::InvalidTimeStep(0.0)));

        let bad_cap = WorldConfig::default().with_max_frame_delta(0.001);
        assert!(matches!(
            World::with_config(bad_cap),
            Err(WorldError::InvalidFrameDelta { .. })
        ));
    }

    #[test]
    fn test_first_update_only_records_baseline() {
        let log = Log::default();
        let mut world = world_with_step();
        world.add_system(Recorder {
            name: "a",
            priority: 0,
            log: Rc::clone(&log),
        });

        assert_eq!(world.update(5_000.0), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(world.frame_count(), 0);
    }

    #[test]
    fn test_entities_materialise_on_next_update() {
        let mut world = world_with_step();
        let entity = world.create_entity();
        let id = world.add_entity(entity);
        assert!(world.get_entity(id).is_none());

        // The baseline frame applies nothing.
        world.update(0.0);
        assert!(world.get_entity(id).is_none());
        world.update(STEP_MS);
        assert!(world.get_entity(id).is_some());

        world.remove_entity(id);
        assert!(world.get_entity(id).is_some());
        world.update(2.0 * STEP_MS);
        assert!(world.get_entity(id).is_none());
    }

    #[test]
    fn test_systems_run_in_priority_order_before_components() {
        let log = Log::default();
        let mut world = world_with_step();
        world.add_system(Recorder {
            name: "race",
            priority: 0,
            log: Rc::clone(&log),
        });
        world.add_system(Recorder {
            name: "network",
            priority: -100,
            log: Rc::clone(&log),
        });
        world.add_system(Recorder {
            name: "late",
            priority: 0,
            log: Rc::clone(&log),
        });
        assert_eq!(world.system_names(), vec!["network", "race", "late"]);

        let entity = world.create_entity().with_component(Tally {
            log: Rc::clone(&log),
            ..Tally::default()
        });
        world.add_entity(entity);

        world.update(0.0);
        world.update(STEP_MS);

        assert_eq!(
            *log.borrow(),
            vec![
                "fixed:network",
                "fixed:race",
                "fixed:late",
                "fixed:component",
                "update:network",
                "update:race",
                "update:late",
                "update:component",
            ]
        );
    }

    #[test]
    fn test_variable_pass_runs_without_fixed_ticks() {
        let log = Log::default();
        let mut world = world_with_step();
        world.add_system(Recorder {
            name: "a",
            priority: 0,
            log: Rc::clone(&log),
        });

        world.update(0.0);
        assert_eq!(world.update(STEP_MS / 2.0), 0);
        assert_eq!(*log.borrow(), vec!["update:a"]);
    }

    #[test]
    fn test_accumulator_conservation() {
        let mut world = world_with_step();
        world.update(0.0);

        // Deltas in ms, each a multiple of 1/8 ms so every sum is exact.
        let deltas = [7.5, 31.25, 3.125, 15.625, 50.0, 0.0, 12.5, 100.0];
        let mut now = 0.0;
        let mut total_ticks = 0u64;
        for delta in deltas {
            now += delta;
            total_ticks += u64::from(world.update(now));

            let elapsed = now / 1000.0;
            let ticked = total_ticks as f64 * STEP;
            assert!(ticked <= elapsed);
            assert!(elapsed < ticked + STEP);
        }
        assert_eq!(world.tick_count(), total_ticks);
    }

    #[test]
    fn test_frame_delta_is_capped() {
        let mut world = world_with_step();
        let entity = world.create_entity().with_component(Tally::default());
        let id = world.add_entity(entity);

        world.update(0.0);
        // Ten seconds of stall only simulates the 0.25 s cap.
        assert_eq!(world.update(10_000.0), 16);

        let tally = world.get_entity(id).unwrap().get::<Tally>().unwrap();
        assert_eq!(tally.fixed_dt.len(), 16);
        assert!(tally.fixed_dt.iter().all(|&dt| dt == STEP));
    }

    #[test]
    fn test_system_lookup_and_removal() {
        let mut world = world_with_step();
        world.add_system(Recorder {
            name: "a",
            priority: 0,
            log: Log::default(),
        });

        assert_eq!(world.system::<Recorder>().map(|r| r.name), Some("a"));
        world.system_mut::<Recorder>().unwrap().priority = 5;
        let name = world.with_system::<Recorder, _>(|r, scene| {
            assert!(scene.is_empty());
            r.name
        });
        assert_eq!(name, Some("a"));

        assert!(world.remove_system::<Recorder>());
        assert!(!world.remove_system::<Recorder>());
        assert!(world.system::<Recorder>().is_none());
    }
}
