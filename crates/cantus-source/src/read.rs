//! Windowed playback reads.

use std::collections::HashSet;

use smallvec::SmallVec;
use tracing::{debug, trace};

use cantus_core::{LoopRange, TempoMapSnapshot, TimePos};
use cantus_midi::{ChannelFilter, Event, EventSink, NoteTracker, Parameter};

use crate::cursor::{CursorBinding, MidiCursor};
use crate::source::{MidiSource, ReaderLock};

/// Window of a read in absolute beats, plus its start and end positions.
struct Window {
    source_start_beats: f64,
    start_beats: f64,
    end_beats: f64,
    start: TimePos,
    end: TimePos,
}

impl Window {
    fn new(source_start: TimePos, start: TimePos, cnt: TimePos, tempo: &TempoMapSnapshot) -> Self {
        let window_start = source_start.offset_by(start, tempo);
        let window_end = window_start.offset_by(cnt, tempo);
        Self {
            source_start_beats: source_start.beats(tempo),
            start_beats: window_start.beats(tempo),
            end_beats: window_end.beats(tempo),
            start: window_start,
            end: window_end,
        }
    }
}

impl MidiSource {
    /// Write every event in `[start, start + cnt)` to `dst`.
    ///
    /// `start` is relative to the source; `source_start` is where the source
    /// begins on the timeline, and emitted times are absolute sample positions
    /// (folded into `loop_range` when given). A read that starts where the
    /// cursor's previous read ended resumes from the cached position instead
    /// of searching the model. Events for parameters in `filtered` are skipped.
    ///
    /// Returns `cnt`. Without a model the raw storage is read and the covered
    /// length is returned in samples.
    #[allow(clippy::too_many_arguments)]
    pub fn midi_read(
        &self,
        lock: &ReaderLock<'_>,
        dst: &mut dyn EventSink<u64>,
        source_start: TimePos,
        start: TimePos,
        cnt: TimePos,
        loop_range: Option<&LoopRange>,
        cursor: &mut MidiCursor,
        mut tracker: Option<&mut NoteTracker>,
        filter: Option<&ChannelFilter>,
        filtered: &HashSet<Parameter>,
    ) -> TimePos {
        self.check_read(lock);
        debug!(
            "midi_read {} sstart {} start {} cnt {}",
            self.name, source_start, start, cnt
        );

        let Some(model) = lock.model() else {
            let covered = self.read_unlocked(
                lock,
                dst,
                source_start,
                start,
                cnt,
                loop_range,
                tracker,
                filter,
                filtered,
            );
            return TimePos::Samples(covered);
        };

        let tempo = self.session.tempo();
        let model = model.read();
        let binding = CursorBinding {
            instance: self.instance,
            generation: lock.generation(),
            revision: model.revision(),
        };

        let linear_read = cursor.last_read_end == Some(start);
        let resumed = if linear_read {
            cursor.resume_point(binding)
        } else {
            None
        };
        let mut idx = match resumed {
            Some(idx) => idx,
            None => {
                cursor.binding = Some(binding);
                cursor.active_notes.reset();
                model.seek(start.beats(&tempo))
            }
        };

        cursor.last_read_end = Some(start.offset_by(cnt, &tempo));

        let window = Window::new(source_start, start, cnt, &tempo);

        while let Some(ev) = model.event(idx) {
            let session_event_beats = window.source_start_beats + ev.time();

            if session_event_beats < window.start_beats {
                trace!(
                    "{}: skip event, too early @ {} for {}",
                    self.name,
                    session_event_beats,
                    window.start_beats
                );
                idx += 1;
                continue;
            }
            if session_event_beats >= window.end_beats {
                trace!(
                    "{}: reached end ({}) with event @ {}",
                    self.name,
                    window.end_beats,
                    session_event_beats
                );
                break;
            }
            idx += 1;

            cursor.active_notes.track(ev.buffer());
            if is_filtered(ev, filtered) {
                continue;
            }

            let mut time_samples = tempo.beats_to_samples(session_event_beats);
            if let Some(range) = loop_range {
                time_samples = range.squish(time_samples);
            }

            self.emit(dst, time_samples, ev, filter, tracker.as_deref_mut());
        }

        cursor.iter = Some(idx);
        cnt
    }

    /// Read straight from storage when no model is loaded.
    ///
    /// No cursor is involved; each call searches the stored events.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn read_unlocked(
        &self,
        lock: &ReaderLock<'_>,
        dst: &mut dyn EventSink<u64>,
        source_start: TimePos,
        start: TimePos,
        cnt: TimePos,
        loop_range: Option<&LoopRange>,
        mut tracker: Option<&mut NoteTracker>,
        filter: Option<&ChannelFilter>,
        filtered: &HashSet<Parameter>,
    ) -> u64 {
        let tempo = self.session.tempo();
        let window = Window::new(source_start, start, cnt, &tempo);
        let events = lock.storage().events();

        let first = events
            .partition_point(|e| window.source_start_beats + e.time() < window.start_beats);

        for ev in &events[first..] {
            let session_event_beats = window.source_start_beats + ev.time();
            if session_event_beats >= window.end_beats {
                break;
            }
            if is_filtered(ev, filtered) {
                continue;
            }

            let mut time_samples = tempo.beats_to_samples(session_event_beats);
            if let Some(range) = loop_range {
                time_samples = range.squish(time_samples);
            }

            self.emit(dst, time_samples, ev, filter, tracker.as_deref_mut());
        }

        window
            .end
            .samples(&tempo)
            .saturating_sub(window.start.samples(&tempo))
    }

    /// Channel events pass through a copy when a filter is set, so the stored
    /// bytes are never touched.
    fn emit(
        &self,
        dst: &mut dyn EventSink<u64>,
        time: u64,
        ev: &Event<f64>,
        filter: Option<&ChannelFilter>,
        tracker: Option<&mut NoteTracker>,
    ) {
        let bytes: SmallVec<[u8; 3]> = match filter {
            Some(filter) if ev.is_channel_event() => {
                let mut copy: SmallVec<[u8; 3]> = SmallVec::from_slice(ev.buffer());
                if filter.filter(&mut copy) {
                    trace!(
                        "{}: filter event @ {} type {:?} size {}",
                        self.name,
                        time,
                        ev.event_type(),
                        ev.size()
                    );
                    return;
                }
                copy
            }
            _ => {
                dst.write(time, ev.event_type(), ev.buffer());
                if let Some(tracker) = tracker {
                    tracker.track(ev.buffer());
                }
                return;
            }
        };

        dst.write(time, ev.event_type(), &bytes);
        if let Some(tracker) = tracker {
            tracker.track(&bytes);
        }
    }
}

fn is_filtered(ev: &Event<f64>, filtered: &HashSet<Parameter>) -> bool {
    !filtered.is_empty() && ev.parameter().is_some_and(|p| filtered.contains(&p))
}
