//! Sounding-note bookkeeping.
//!
//! A [`NoteTracker`] watches a stream of MIDI messages and counts note-ons per
//! (channel, note). It is used by readers to know which notes are held at a
//! given point, and by writers to close notes that were left open.

use crate::event::{EventType, NOTE_OFF, NOTE_ON};
use crate::sink::EventSink;

#[derive(Clone)]
pub struct NoteTracker {
    active: [[u8; 128]; 16],
    on: usize,
}

impl NoteTracker {
    pub fn new() -> Self {
        Self {
            active: [[0; 128]; 16],
            on: 0,
        }
    }

    /// Feed one message. Anything other than a note on/off is ignored.
    pub fn track(&mut self, buf: &[u8]) {
        if buf.len() < 3 {
            return;
        }
        let channel = (buf[0] & 0x0F) as usize;
        let note = (buf[1] & 0x7F) as usize;
        match buf[0] & 0xF0 {
            NOTE_ON if buf[2] > 0 => {
                let count = &mut self.active[channel][note];
                *count = count.saturating_add(1);
                self.on += 1;
            }
            NOTE_ON | NOTE_OFF => {
                let count = &mut self.active[channel][note];
                if *count > 0 {
                    *count -= 1;
                    self.on -= 1;
                }
            }
            _ => {}
        }
    }

    #[inline]
    pub fn active(&self, channel: u8, note: u8) -> bool {
        self.active[(channel & 0x0F) as usize][(note & 0x7F) as usize] > 0
    }

    /// Number of note-ons still waiting for a note-off.
    #[inline]
    pub fn on(&self) -> usize {
        self.on
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.on == 0
    }

    /// (channel, note) pairs currently sounding, in channel then note order.
    pub fn active_notes(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.active.iter().enumerate().flat_map(|(channel, notes)| {
            notes
                .iter()
                .enumerate()
                .filter(|&(_, &count)| count > 0)
                .map(move |(note, _)| (channel as u8, note as u8))
        })
    }

    pub fn reset(&mut self) {
        self.active = [[0; 128]; 16];
        self.on = 0;
    }

    /// Write a note-off at `time` for every held note (once per stacked
    /// note-on), then forget them.
    pub fn resolve_notes<T: Copy>(&mut self, dst: &mut dyn EventSink<T>, time: T) {
        if self.on == 0 {
            return;
        }
        for channel in 0..16u8 {
            for note in 0..128u8 {
                let count = self.active[channel as usize][note as usize];
                for _ in 0..count {
                    let off = [NOTE_OFF | channel, note, 0];
                    dst.write(time, EventType::Midi, &off);
                }
            }
        }
        tracing::debug!("resolved {} stuck notes", self.on);
        self.reset();
    }
}

impl Default for NoteTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for NoteTracker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NoteTracker")
            .field("on", &self.on)
            .field("active", &self.active_notes().collect::<Vec<_>>())
            .finish()
    }
}
