//! Destinations for timed MIDI data.

use crate::event::{Event, EventType};

/// Anything that accepts timed MIDI messages.
///
/// Returns the number of bytes accepted; a sink that is full returns 0.
pub trait EventSink<T> {
    fn write(&mut self, time: T, event_type: EventType, buf: &[u8]) -> usize;
}

/// Growable, time-ordered event buffer.
#[derive(Debug, Clone)]
pub struct MidiBuffer<T> {
    events: Vec<Event<T>>,
}

impl<T: Copy> MidiBuffer<T> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn events(&self) -> &[Event<T>] {
        &self.events
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn times(&self) -> Vec<T> {
        self.events.iter().map(|e| e.time()).collect()
    }
}

impl<T: Copy> Default for MidiBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> EventSink<T> for MidiBuffer<T> {
    fn write(&mut self, time: T, event_type: EventType, buf: &[u8]) -> usize {
        self.events.push(Event::with_type(time, event_type, buf));
        buf.len()
    }
}
