//! Capture: streaming recorded events into a source.

use tracing::{debug, trace};

use cantus_core::TimePos;
use cantus_midi::{CaptureConsumer, Event, InterpolationStyle};

use crate::model::StuckNotePolicy;
use crate::source::{MidiSource, WriterLock};

/// How much of the capture ring a write should take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCount {
    /// Events stamped before `source_start + n` samples.
    Samples(u64),
    /// Everything pending. Used to drain the ring, not to measure capture.
    Unbounded,
}

impl MidiSource {
    /// Open a capture. Must run before any captured data is written.
    pub fn mark_write_started(&self, lock: &mut WriterLock<'_>) {
        self.check_write(lock);
        if let Some(model) = lock.model() {
            model.write().start_write();
        }
        lock.writing = true;
    }

    /// Move captured events from `ring` into the source.
    ///
    /// A bounded count also advances the capture length; an unbounded one
    /// leaves it alone and invalidates instead. Returns the number of samples
    /// covered by the transfer.
    pub fn midi_write(
        &self,
        lock: &mut WriterLock<'_>,
        ring: &mut CaptureConsumer,
        source_start: TimePos,
        cnt: CaptureCount,
    ) -> u64 {
        self.check_write(lock);
        let written = self.write_unlocked(lock, ring, source_start, cnt);

        match cnt {
            CaptureCount::Unbounded => self.invalidate(lock),
            CaptureCount::Samples(n) => lock.capture_length += n,
        }

        written
    }

    /// Drain `ring` into storage and, while a model write is open, the model.
    ///
    /// Events stamped before the natural position are dropped; the rest are
    /// stored in beats relative to it.
    fn write_unlocked(
        &self,
        lock: &mut WriterLock<'_>,
        ring: &mut CaptureConsumer,
        source_start: TimePos,
        cnt: CaptureCount,
    ) -> u64 {
        let tempo = self.session.tempo();
        let start = source_start.samples(&tempo);
        let limit = match cnt {
            CaptureCount::Samples(n) => Some(start.saturating_add(n)),
            CaptureCount::Unbounded => None,
        };
        let natural = lock.natural_position.samples(&tempo);
        let natural_beats = lock.natural_position.beats(&tempo);

        let model = lock.model.clone();
        let mut model = model.as_ref().map(|m| m.write());
        let mut transferred = 0usize;
        let mut last_time = None;

        loop {
            let next = match limit {
                Some(end) => ring.pop_before(end),
                None => ring.pop(),
            };
            let Some(raw) = next else { break };

            if raw.time < natural {
                trace!(
                    "{}: dropping event @ {} before source start {}",
                    self.name,
                    raw.time,
                    natural
                );
                continue;
            }

            let beats = tempo.samples_to_beats(raw.time) - natural_beats;
            let event = Event::new(beats, raw.bytes());
            if let Some(model) = model.as_mut().filter(|m| m.is_writing()) {
                model.append(event.clone());
            }
            lock.storage.append_event(event);

            transferred += 1;
            last_time = Some(raw.time);
        }

        if transferred > 0 {
            trace!("{}: captured {} events", self.name, transferred);
        }

        match cnt {
            CaptureCount::Samples(n) => n,
            CaptureCount::Unbounded => last_time.map_or(0, |t| t.saturating_sub(start) + 1),
        }
    }

    /// Record the real start of a capture once the transport knows it.
    ///
    /// The length is re-derived in beats anchored at `position`.
    pub fn mark_write_starting_now(
        &self,
        lock: &mut WriterLock<'_>,
        position: TimePos,
        capture_length: u64,
    ) {
        self.check_write(lock);
        let tempo = self.session.tempo();

        lock.natural_position = position;
        lock.capture_length = capture_length;

        let start_beats = position.beats(&tempo);
        let end_beats = position
            .offset_by(TimePos::Samples(capture_length), &tempo)
            .beats(&tempo);
        lock.length = TimePos::Beats(end_beats - start_beats);
    }

    /// Close a capture.
    ///
    /// Stuck notes are handled per `policy`, every controller recorded during
    /// the capture switches to Discrete so it plays back as performed, and all
    /// cursors are invalidated.
    pub fn mark_write_completed(
        &self,
        lock: &mut WriterLock<'_>,
        policy: StuckNotePolicy,
        duration: TimePos,
    ) {
        self.check_write(lock);

        if let Some(model) = lock.model.clone() {
            let tempo = self.session.tempo();
            let natural = lock.natural_position;
            let when = natural.offset_by(duration, &tempo).beats(&tempo) - natural.beats(&tempo);

            let mut model = model.write();
            model.end_write(policy, when);

            let recorded: Vec<_> = model.written_controls().iter().copied().collect();
            for parameter in recorded {
                model.set_interpolation(&parameter, InterpolationStyle::Discrete);
                lock.metadata
                    .set_interpolation_of(parameter, InterpolationStyle::Discrete);
            }
            debug!("{}: write completed, {} events", self.name, model.len());
        }

        self.invalidate(lock);
        lock.writing = false;
    }

    pub fn mark_streaming_write_completed(&self, lock: &mut WriterLock<'_>, duration: TimePos) {
        self.mark_write_completed(lock, StuckNotePolicy::DeleteStuckNotes, duration);
    }
}
