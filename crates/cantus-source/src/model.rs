//! The editable, beat-timed event sequence behind a source.
//!
//! A [`MidiModel`] is shared between the source that loaded it and any editors
//! through [`SharedModel`]. Readers hold positions into it as plain indices and
//! check [`MidiModel::revision`] to know whether those indices still hold.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use cantus_core::MAX_BEATS;
use cantus_midi::{Event, InterpolationStyle, MidiBuffer, NoteTracker, Parameter};

use crate::storage::MidiStorage;

pub type SharedModel = Arc<RwLock<MidiModel>>;

/// What to do with notes still held when a write ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StuckNotePolicy {
    /// Drop the note-on.
    #[default]
    DeleteStuckNotes,
    /// Close the note at the end of the write, or drop it if it starts there.
    ResolveStuckNotes,
}

/// Recorded values for one automation parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlList {
    pub interpolation: InterpolationStyle,
    /// (beats, value), in time order.
    pub points: Vec<(f64, f64)>,
}

impl ControlList {
    fn new(parameter: &Parameter) -> Self {
        Self {
            interpolation: parameter.default_interpolation(),
            points: Vec::new(),
        }
    }

    fn add(&mut self, time: f64, value: f64) {
        let idx = self.points.partition_point(|&(t, _)| t <= time);
        self.points.insert(idx, (time, value));
    }
}

#[derive(Debug, Default)]
pub struct MidiModel {
    events: Vec<Event<f64>>,
    controls: BTreeMap<Parameter, ControlList>,
    written_controls: BTreeSet<Parameter>,
    writing: bool,
    edited: bool,
    revision: u64,
    seeks: AtomicUsize,
}

impl MidiModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: impl IntoIterator<Item = Event<f64>>) -> Self {
        let mut model = Self::new();
        for event in events {
            model.insert_sorted(event);
        }
        model.rebuild_controls();
        model
    }

    pub fn from_storage(storage: &dyn MidiStorage) -> Self {
        Self::from_events(storage.events().iter().cloned())
    }

    pub fn into_shared(self) -> SharedModel {
        Arc::new(RwLock::new(self))
    }

    #[inline]
    pub fn events(&self) -> &[Event<f64>] {
        &self.events
    }

    #[inline]
    pub fn event(&self, idx: usize) -> Option<&Event<f64>> {
        self.events.get(idx)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Index of the first event at or after `beats`.
    pub fn seek(&self, beats: f64) -> usize {
        self.seeks.fetch_add(1, Ordering::Relaxed);
        self.events.partition_point(|e| e.time() < beats)
    }

    /// Number of [`seek`](Self::seek) calls since the model was created.
    #[inline]
    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::Relaxed)
    }

    /// Bumped on every change that can move events to new indices.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub fn edited(&self) -> bool {
        self.edited
    }

    pub fn set_edited(&mut self, edited: bool) {
        self.edited = edited;
    }

    #[inline]
    pub fn is_writing(&self) -> bool {
        self.writing
    }

    pub fn controls(&self) -> &BTreeMap<Parameter, ControlList> {
        &self.controls
    }

    pub fn control(&self, parameter: &Parameter) -> Option<&ControlList> {
        self.controls.get(parameter)
    }

    /// Parameters that received data since the last [`start_write`](Self::start_write).
    pub fn written_controls(&self) -> &BTreeSet<Parameter> {
        &self.written_controls
    }

    pub fn set_interpolation(&mut self, parameter: &Parameter, style: InterpolationStyle) {
        if let Some(list) = self.controls.get_mut(parameter) {
            list.interpolation = style;
        }
    }

    // Capture

    pub fn start_write(&mut self) {
        self.writing = true;
        self.written_controls.clear();
        debug!("model write started ({} events)", self.events.len());
    }

    /// Append a captured event. Time is in beats from the source start.
    pub fn append(&mut self, event: Event<f64>) {
        if let Some(parameter) = event.parameter().filter(|p| p.is_automatable()) {
            if let Some(value) = parameter.value_of(event.buffer()) {
                self.controls
                    .entry(parameter)
                    .or_insert_with(|| ControlList::new(&parameter))
                    .add(event.time(), value);
            }
            self.written_controls.insert(parameter);
        }
        self.insert_sorted(event);
    }

    /// Close the write transaction, handling notes that never saw a note-off.
    ///
    /// `when` is the end of the write in beats from the source start. Returns
    /// how many stuck notes were found.
    pub fn end_write(&mut self, policy: StuckNotePolicy, when: f64) -> usize {
        let stuck = self.stuck_notes();
        let count = stuck.len();

        let mut remove = Vec::new();
        let mut closing = Vec::new();
        for idx in stuck {
            let ev = &self.events[idx];
            match policy {
                StuckNotePolicy::ResolveStuckNotes if when > ev.time() => {
                    let note = ev.note().unwrap_or(0);
                    closing.push(Event::note_off(when, ev.channel(), note, 0));
                }
                _ => remove.push(idx),
            }
        }

        remove.sort_unstable();
        for idx in remove.into_iter().rev() {
            self.events.remove(idx);
        }
        for ev in closing {
            self.insert_sorted(ev);
        }

        self.writing = false;
        self.revision += 1;
        if count > 0 {
            debug!("model write ended with {} stuck notes ({:?})", count, policy);
        }
        count
    }

    /// Indices of note-ons with no matching note-off after them.
    fn stuck_notes(&self) -> Vec<usize> {
        let mut open: BTreeMap<(u8, u8), Vec<usize>> = BTreeMap::new();
        for (idx, ev) in self.events.iter().enumerate() {
            let Some(note) = ev.note() else { continue };
            let key = (ev.channel(), note);
            if ev.is_note_on() {
                open.entry(key).or_default().push(idx);
            } else if ev.is_note_off() {
                if let Some(stack) = open.get_mut(&key) {
                    stack.pop();
                }
            }
        }
        open.into_values().flatten().collect()
    }

    // Edits

    pub fn insert_event(&mut self, event: Event<f64>) {
        self.insert_sorted(event);
        self.rebuild_controls();
        self.edited = true;
    }

    pub fn remove_event(&mut self, idx: usize) -> Option<Event<f64>> {
        if idx >= self.events.len() {
            return None;
        }
        let event = self.events.remove(idx);
        self.revision += 1;
        self.rebuild_controls();
        self.edited = true;
        Some(event)
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.controls.clear();
        self.written_controls.clear();
        self.revision += 1;
        self.edited = true;
    }

    /// Replace the contents with what `storage` holds.
    pub fn reload_from(&mut self, storage: &dyn MidiStorage) {
        self.events = storage.events().to_vec();
        self.revision += 1;
        self.rebuild_controls();
        self.edited = false;
    }

    // Output

    /// Overwrite `storage` with every event in the model.
    pub fn write_to(&self, storage: &mut dyn MidiStorage) {
        storage.clear();
        for ev in &self.events {
            storage.append_event(ev.clone());
        }
    }

    /// Overwrite `storage` with the events in `[begin, end)`.
    ///
    /// Note-offs whose note-on falls before `begin` are dropped, and notes
    /// still held at the end of the section are closed at `end` (or at the
    /// last copied event for an open-ended section). With `offset_events` the
    /// copied events are shifted so the section starts at zero.
    pub fn write_section_to(
        &self,
        storage: &mut dyn MidiStorage,
        begin: f64,
        end: f64,
        offset_events: bool,
    ) -> usize {
        storage.clear();

        let offset = if offset_events { begin } else { 0.0 };
        let start = self.events.partition_point(|e| e.time() < begin);
        let mut tracker = NoteTracker::new();
        let mut last = begin;
        let mut written = 0;

        for ev in self.events[start..].iter().take_while(|e| e.time() < end) {
            if ev.is_note_off() {
                let note = ev.note().unwrap_or(0);
                if !tracker.active(ev.channel(), note) {
                    continue;
                }
            }
            tracker.track(ev.buffer());
            storage.append_event(ev.with_time(ev.time() - offset));
            last = ev.time();
            written += 1;
        }

        if !tracker.is_empty() {
            let close = if end < MAX_BEATS { end } else { last };
            let mut closing = MidiBuffer::new();
            tracker.resolve_notes(&mut closing, close - offset);
            for ev in closing.events() {
                storage.append_event(ev.clone());
            }
        }

        written
    }

    /// Push the model's contents into `storage` and mark it clean.
    pub fn sync_to_source(&mut self, storage: &mut dyn MidiStorage) {
        self.write_to(storage);
        self.edited = false;
    }

    fn insert_sorted(&mut self, event: Event<f64>) {
        let time = event.time();
        let idx = self.events.partition_point(|e| e.time() <= time);
        self.events.insert(idx, event);
        self.revision += 1;
    }

    fn rebuild_controls(&mut self) {
        let mut controls: BTreeMap<Parameter, ControlList> = BTreeMap::new();
        for ev in &self.events {
            let Some(parameter) = ev.parameter().filter(|p| p.is_automatable()) else {
                continue;
            };
            let Some(value) = parameter.value_of(ev.buffer()) else {
                continue;
            };
            let list = controls
                .entry(parameter)
                .or_insert_with(|| ControlList::new(&parameter));
            if let Some(old) = self.controls.get(&parameter) {
                list.interpolation = old.interpolation;
            }
            list.add(ev.time(), value);
        }
        self.controls = controls;
    }
}
