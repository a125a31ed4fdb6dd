//! Error types for the MIDI subsystem.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI parse error: {0}")]
    MidiFileParse(String),

    #[error("Unsupported MIDI timing format")]
    MidiUnsupportedTiming,

    #[error("Malformed MIDI event: {0:02X?}")]
    MalformedEvent(Vec<u8>),

    #[error("Unknown parameter symbol: {0}")]
    UnknownParameter(String),

    #[error("Invalid value '{value}' for {kind}")]
    InvalidValue { kind: &'static str, value: String },
}

impl From<midly::Error> for Error {
    fn from(e: midly::Error) -> Self {
        Error::MidiFileParse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
