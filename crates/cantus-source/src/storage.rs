//! Backing storage for a source's events.
//!
//! Storage holds beat-timed events relative to the source start. It is what a
//! model is loaded from, what capture appends to, and what gets flushed to
//! disk on save.

use std::path::{Path, PathBuf};

use cantus_midi::{Event, SmfFile, DEFAULT_PPQN};
use tracing::debug;

use crate::Result;

pub trait MidiStorage: Send + Sync {
    /// Events in time order.
    fn events(&self) -> &[Event<f64>];

    /// Insert an event after any existing events with the same time.
    fn append_event(&mut self, event: Event<f64>);

    fn clear(&mut self);

    /// Persist buffered changes. A no-op for purely in-memory storage.
    fn flush(&mut self) -> Result<()>;

    fn path(&self) -> Option<&Path> {
        None
    }

    fn is_empty(&self) -> bool {
        self.events().is_empty()
    }

    fn len(&self) -> usize {
        self.events().len()
    }
}

/// Storage that persists as a single-track Standard MIDI File.
#[derive(Debug, Clone)]
pub struct SmfStorage {
    path: Option<PathBuf>,
    ppqn: u16,
    events: Vec<Event<f64>>,
    dirty: bool,
}

impl SmfStorage {
    /// Storage that never touches disk.
    pub fn in_memory() -> Self {
        Self::in_memory_at(DEFAULT_PPQN)
    }

    pub fn in_memory_at(ppqn: u16) -> Self {
        Self {
            path: None,
            ppqn,
            events: Vec::new(),
            dirty: false,
        }
    }

    /// Empty storage bound to `path`. The file is written on the first flush.
    pub fn create(path: impl Into<PathBuf>, ppqn: u16) -> Self {
        Self {
            path: Some(path.into()),
            ppqn,
            events: Vec::new(),
            dirty: true,
        }
    }

    /// Load an existing file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = SmfFile::load(&path)?;
        debug!("Opened {} with {} events", path.display(), file.events.len());
        Ok(Self {
            path: Some(path),
            ppqn: file.ticks_per_beat,
            events: file.events,
            dirty: false,
        })
    }

    pub fn with_events(events: Vec<Event<f64>>) -> Self {
        let mut storage = Self::in_memory();
        for event in events {
            storage.append_event(event);
        }
        storage
    }

    #[inline]
    pub fn ppqn(&self) -> u16 {
        self.ppqn
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl Default for SmfStorage {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl MidiStorage for SmfStorage {
    #[inline]
    fn events(&self) -> &[Event<f64>] {
        &self.events
    }

    fn append_event(&mut self, event: Event<f64>) {
        let time = event.time();
        let idx = self.events.partition_point(|e| e.time() <= time);
        self.events.insert(idx, event);
        self.dirty = true;
    }

    fn clear(&mut self) {
        self.events.clear();
        self.dirty = true;
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let Some(path) = self.path.as_deref() else {
            self.dirty = false;
            return Ok(());
        };

        let file = SmfFile::with_events(self.ppqn, std::mem::take(&mut self.events));
        let saved = file.save(path);
        self.events = file.events;
        saved?;

        self.dirty = false;
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
