//! Session configuration.

use crate::tempo_map::{MAX_BPM, MIN_BPM};
use crate::{Error, Result};

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sample_rate: f64,
    pub tempo_bpm: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            tempo_bpm: 120.0,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 8000.0 || self.sample_rate > 384000.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if !(MIN_BPM..=MAX_BPM).contains(&self.tempo_bpm) {
            return Err(Error::InvalidTempo(self.tempo_bpm));
        }
        Ok(())
    }
}
