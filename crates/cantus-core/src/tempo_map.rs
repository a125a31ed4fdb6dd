//! Tempo map for converting between the beat and sample domains.
//!
//! Writers edit a [`TempoMap`]; RT readers hold an `Arc<TempoMapSnapshot>` that
//! never changes underneath them.

use std::sync::Arc;

pub const MIN_BPM: f32 = 1.0;
pub const MAX_BPM: f32 = 999.0;

/// Points closer than this (in beats) are the same tempo change.
const SAME_BEAT: f64 = 1e-3;

/// Constant-tempo stretch starting at `beat`, with its start precomputed in
/// seconds so lookups never walk earlier sections.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TempoSection {
    beat: f64,
    bpm: f32,
    start_seconds: f64,
}

impl TempoSection {
    #[inline]
    fn seconds_per_beat(&self) -> f64 {
        60.0 / f64::from(self.bpm)
    }

    #[inline]
    fn end_seconds(&self, next_beat: f64) -> f64 {
        self.start_seconds + (next_beat - self.beat) * self.seconds_per_beat()
    }
}

/// Immutable view of the tempo map. Never empty: the first section starts at
/// beat zero.
#[derive(Debug, Clone)]
pub struct TempoMapSnapshot {
    sections: Vec<TempoSection>,
    sample_rate: f64,
}

impl TempoMapSnapshot {
    fn build(points: &[(f64, f32)], sample_rate: f64) -> Self {
        let mut sections: Vec<TempoSection> = Vec::with_capacity(points.len());
        for &(beat, bpm) in points {
            let start_seconds = sections.last().map_or(0.0, |prev| prev.end_seconds(beat));
            sections.push(TempoSection {
                beat,
                bpm,
                start_seconds,
            });
        }
        Self {
            sections,
            sample_rate,
        }
    }

    /// Section in effect at `beats`.
    #[inline]
    fn section_at_beat(&self, beats: f64) -> &TempoSection {
        let idx = self.sections.partition_point(|s| s.beat <= beats);
        &self.sections[idx.saturating_sub(1)]
    }

    #[inline]
    fn section_at_second(&self, seconds: f64) -> &TempoSection {
        let idx = self.sections.partition_point(|s| s.start_seconds <= seconds);
        &self.sections[idx.saturating_sub(1)]
    }

    #[inline]
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        let section = self.section_at_beat(beats);
        section.start_seconds + (beats - section.beat) * section.seconds_per_beat()
    }

    #[inline]
    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        let section = self.section_at_second(seconds);
        section.beat + (seconds - section.start_seconds) / section.seconds_per_beat()
    }

    /// Truncates toward zero, so a beat that lands between samples maps to the earlier one.
    #[inline]
    pub fn beats_to_samples(&self, beats: f64) -> u64 {
        (self.beats_to_seconds(beats.max(0.0)) * self.sample_rate) as u64
    }

    #[inline]
    pub fn samples_to_beats(&self, samples: u64) -> f64 {
        self.seconds_to_beats(samples as f64 / self.sample_rate)
    }

    /// Samples per beat at the start of the timeline.
    #[inline]
    pub fn samples_per_beat(&self) -> f64 {
        self.sample_rate * self.sections[0].seconds_per_beat()
    }

    /// Tempo at the start of the timeline.
    #[inline]
    pub fn tempo(&self) -> f32 {
        self.sections[0].bpm
    }

    #[inline]
    pub fn tempo_at(&self, beats: f64) -> f32 {
        self.section_at_beat(beats).bpm
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

/// Editable tempo map. Every edit publishes a fresh snapshot; snapshots
/// already handed out keep the old tempo.
#[derive(Debug, Clone)]
pub struct TempoMap {
    /// `(beat, bpm)` sorted by beat, first at beat zero.
    points: Vec<(f64, f32)>,
    sample_rate: f64,
    snapshot: Arc<TempoMapSnapshot>,
}

impl TempoMap {
    pub fn new(initial_bpm: f32, sample_rate: f64) -> Self {
        let points = vec![(0.0, initial_bpm.clamp(MIN_BPM, MAX_BPM))];
        let snapshot = Arc::new(TempoMapSnapshot::build(&points, sample_rate));
        Self {
            points,
            sample_rate,
            snapshot,
        }
    }

    pub fn snapshot(&self) -> Arc<TempoMapSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Replace the whole map with one constant tempo.
    pub fn set_tempo(&mut self, bpm: f32) {
        self.points = vec![(0.0, bpm.clamp(MIN_BPM, MAX_BPM))];
        self.publish();
    }

    pub fn tempo(&self) -> f32 {
        self.snapshot.tempo()
    }

    /// Change tempo at `beat`. A change at (or next to) an existing point
    /// replaces it.
    pub fn add_tempo_point(&mut self, beat: f64, bpm: f32) {
        let beat = beat.max(0.0);
        let bpm = bpm.clamp(MIN_BPM, MAX_BPM);

        self.points.retain(|&(b, _)| (b - beat).abs() > SAME_BEAT);
        let idx = self.points.partition_point(|&(b, _)| b < beat);
        self.points.insert(idx, (beat, bpm));
        if self.points[0].0 > 0.0 {
            self.points.insert(0, (0.0, bpm));
        }
        self.publish();
    }

    /// Remove the change at `beat`. The initial tempo cannot be removed.
    pub fn remove_tempo_point(&mut self, beat: f64) {
        if beat <= SAME_BEAT {
            return;
        }
        self.points.retain(|&(b, _)| (b - beat).abs() > SAME_BEAT);
        self.publish();
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.publish();
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn publish(&mut self) {
        self.snapshot = Arc::new(TempoMapSnapshot::build(&self.points, self.sample_rate));
    }

    #[inline]
    pub fn beats_to_samples(&self, beats: f64) -> u64 {
        self.snapshot.beats_to_samples(beats)
    }

    #[inline]
    pub fn samples_to_beats(&self, samples: u64) -> f64 {
        self.snapshot.samples_to_beats(samples)
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(120.0, 48000.0)
    }
}
