//! Error types for cantus-core.

use thiserror::Error;

/// Error type for cantus-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid tempo: {0}. Must be between 1.0 and 999.0 BPM")]
    InvalidTempo(f32),

    #[error("Invalid loop range: start={start}, end={end}")]
    InvalidLoopRange { start: u64, end: u64 },

    #[error("Invalid time position: {0:?}")]
    InvalidTimePos(String),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
