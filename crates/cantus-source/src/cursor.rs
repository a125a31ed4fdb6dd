//! Per-consumer read position.

use cantus_core::TimePos;
use cantus_midi::NoteTracker;

/// Identity of the source object and model state a cursor position was taken
/// from. `instance` is per live source, not the saved id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CursorBinding {
    pub instance: u64,
    pub generation: u64,
    pub revision: u64,
}

/// Cached read state for one playback consumer.
///
/// A cursor lets contiguous reads resume where the previous one stopped
/// instead of searching the model again. It is bound to one source; reading a
/// different source, invalidating the source or editing its model all force
/// the next read to search afresh. Never share a cursor between readers.
#[derive(Debug, Default)]
pub struct MidiCursor {
    pub(crate) binding: Option<CursorBinding>,
    pub(crate) iter: Option<usize>,
    pub(crate) last_read_end: Option<TimePos>,
    pub(crate) active_notes: NoteTracker,
}

impl MidiCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// End of the previous read, if there was one.
    #[inline]
    pub fn last_read_end(&self) -> Option<TimePos> {
        self.last_read_end
    }

    /// Index of the next model event to be read.
    #[inline]
    pub fn position(&self) -> Option<usize> {
        self.iter
    }

    /// Notes the cursor has passed a note-on for without the matching note-off.
    #[inline]
    pub fn active_notes(&self) -> &NoteTracker {
        &self.active_notes
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.iter.is_some()
    }

    /// Drop the cached position. The next read searches the model again.
    pub fn invalidate(&mut self) {
        self.iter = None;
        self.binding = None;
    }

    pub(crate) fn resume_point(&self, binding: CursorBinding) -> Option<usize> {
        match self.binding {
            Some(b) if b == binding => self.iter,
            _ => None,
        }
    }
}
