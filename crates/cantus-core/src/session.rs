//! Session clock shared by every source in a project.
//!
//! Holds the tempo map and the transport's rolling state. RT readers grab the
//! current [`TempoMapSnapshot`] with a single atomic load.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::config::SessionConfig;
use crate::lockfree::AtomicFlag;
use crate::tempo_map::{TempoMap, TempoMapSnapshot};
use crate::Result;

pub struct Session {
    tempo_map: Mutex<TempoMap>,
    snapshot: ArcSwap<TempoMapSnapshot>,
    rolling: AtomicFlag,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn new(config: &SessionConfig) -> Result<Self> {
        config.validate()?;
        let tempo_map = TempoMap::new(config.tempo_bpm, config.sample_rate);
        let snapshot = ArcSwap::new(tempo_map.snapshot());
        Ok(Self {
            tempo_map: Mutex::new(tempo_map),
            snapshot,
            rolling: AtomicFlag::new(false),
        })
    }

    /// Current tempo snapshot. Cheap enough to call from the audio thread.
    #[inline]
    pub fn tempo(&self) -> Arc<TempoMapSnapshot> {
        self.snapshot.load_full()
    }

    /// Edit the tempo map and publish a new snapshot.
    pub fn edit_tempo_map<R>(&self, f: impl FnOnce(&mut TempoMap) -> R) -> R {
        let mut map = self.tempo_map.lock();
        let result = f(&mut map);
        self.snapshot.store(map.snapshot());
        result
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.snapshot.load().sample_rate()
    }

    #[inline]
    pub fn transport_rolling(&self) -> bool {
        self.rolling.get()
    }

    pub fn set_transport_rolling(&self, rolling: bool) {
        self.rolling.set(rolling);
    }
}

impl Default for Session {
    fn default() -> Self {
        let tempo_map = TempoMap::default();
        let snapshot = ArcSwap::new(tempo_map.snapshot());
        Self {
            tempo_map: Mutex::new(tempo_map),
            snapshot,
            rolling: AtomicFlag::new(false),
        }
    }
}

/// Builder for [`Session`].
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    pub fn tempo(mut self, bpm: f32) -> Self {
        self.config.tempo_bpm = bpm;
        self
    }

    pub fn build(self) -> Result<Session> {
        Session::new(&self.config)
    }
}
