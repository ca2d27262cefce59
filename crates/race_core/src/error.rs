//! Race-layer error types.

use std::path::PathBuf;

/// Errors raised while configuring a race.
#[derive(Debug, thiserror::Error)]
pub enum RaceError {
    /// A race needs at least one lap.
    #[error("invalid lap count {0}: a race needs at least one lap")]
    InvalidLapCount(u32),

    /// A track needs at least one checkpoint (the start/finish line).
    #[error("invalid checkpoint count {0}: a track needs at least one checkpoint")]
    InvalidCheckpointCount(u32),

    /// A tuning value is out of range.
    #[error("invalid {field}: {value}")]
    InvalidParameter {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// The race config file could not be read.
    #[error("failed to read race config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The race config file is not valid JSON of the expected shape.
    #[error("malformed race config: {0}")]
    Config(#[from] serde_json::Error),
}
