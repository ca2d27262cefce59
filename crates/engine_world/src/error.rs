//! World-level error types.

/// Errors raised while configuring a [`World`](crate::World).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    /// The fixed time step must be positive and finite.
    #[error("invalid fixed time step: {0} s")]
    InvalidTimeStep(f64),

    /// The frame delta cap must be at least one fixed step.
    #[error("invalid max frame delta {max_frame_delta} s for fixed step {fixed_time_step} s")]
    InvalidFrameDelta {
        /// The configured cap.
        max_frame_delta: f64,
        /// The configured fixed step.
        fixed_time_step: f64,
    },
}
