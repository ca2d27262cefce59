//! World-scoped logic.

use engine_component::AsAny;

use crate::scene::Scene;

/// A system runs once per fixed tick and once per frame, before any
/// component of the same pass.
///
/// Systems are kept sorted ascending by [`System::priority`]; lower values
/// run first, ties keep insertion order. Systems hold entity ids rather than
/// references and must re-resolve them through the [`Scene`] on every
/// access, tolerating ids that no longer exist.
pub trait System: AsAny {
    /// Human-readable system name, used in logs.
    fn name(&self) -> &str;

    /// Execution order key (lower runs first).
    fn priority(&self) -> i32 {
        0
    }

    /// Called once when the system is added to a world.
    fn init(&mut self, _scene: &mut Scene) {}

    /// Called at the fixed simulation rate.
    fn fixed_update(&mut self, _scene: &mut Scene, _dt: f64) {}

    /// Called once per frame with the capped frame delta.
    fn update(&mut self, _scene: &mut Scene, _dt: f64) {}

    /// Called when the system is removed from the world.
    fn shutdown(&mut self, _scene: &mut Scene) {}
}
