//! Error types for MIDI sources.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing {property} property on {node}")]
    MissingProperty {
        node: &'static str,
        property: &'static str,
    },

    #[error("Invalid {property} \"{value}\" on {node}")]
    InvalidProperty {
        node: &'static str,
        property: &'static str,
        value: String,
    },

    #[error("No model attached during {operation}")]
    NoModel { operation: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("MIDI: {0}")]
    Midi(#[from] cantus_midi::Error),

    #[error(transparent)]
    Core(#[from] cantus_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
