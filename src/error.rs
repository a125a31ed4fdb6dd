//! Centralized error type for the cantus umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] cantus_core::Error),

    #[error("MIDI: {0}")]
    Midi(#[from] cantus_midi::Error),

    #[error("Source: {0}")]
    Source(#[from] cantus_source::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
