//! Timeline positions and loop ranges.
//!
//! A [`TimePos`] lives in one of two domains: audio time (samples) or music time
//! (beats). Conversions go through a [`TempoMapSnapshot`], so the same position
//! can be compared or offset regardless of the domain it was created in.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tempo_map::TempoMapSnapshot;
use crate::{Error, Result};

/// Largest representable beat time. Used as the open upper bound of a range.
pub const MAX_BEATS: f64 = f64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeDomain {
    Audio,
    Beats,
}

/// A position (or a distance, when used as a count) on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TimePos {
    Samples(u64),
    Beats(f64),
}

impl TimePos {
    pub const ZERO: TimePos = TimePos::Samples(0);

    #[inline]
    pub fn domain(&self) -> TimeDomain {
        match self {
            TimePos::Samples(_) => TimeDomain::Audio,
            TimePos::Beats(_) => TimeDomain::Beats,
        }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        match *self {
            TimePos::Samples(s) => s == 0,
            TimePos::Beats(b) => b == 0.0,
        }
    }

    #[inline]
    pub fn samples(&self, tempo: &TempoMapSnapshot) -> u64 {
        match *self {
            TimePos::Samples(s) => s,
            TimePos::Beats(b) => tempo.beats_to_samples(b),
        }
    }

    #[inline]
    pub fn beats(&self, tempo: &TempoMapSnapshot) -> f64 {
        match *self {
            TimePos::Samples(s) => tempo.samples_to_beats(s),
            TimePos::Beats(b) => b,
        }
    }

    /// Move this position forward by `distance`, staying in this position's domain.
    pub fn offset_by(self, distance: TimePos, tempo: &TempoMapSnapshot) -> TimePos {
        match (self, distance) {
            (TimePos::Samples(a), TimePos::Samples(b)) => TimePos::Samples(a.saturating_add(b)),
            (TimePos::Beats(a), TimePos::Beats(b)) => TimePos::Beats(a + b),
            (TimePos::Samples(a), TimePos::Beats(b)) => {
                let end = tempo.samples_to_beats(a) + b;
                TimePos::Samples(tempo.beats_to_samples(end))
            }
            (TimePos::Beats(a), TimePos::Samples(b)) => {
                let start = tempo.beats_to_samples(a);
                TimePos::Beats(tempo.samples_to_beats(start.saturating_add(b)))
            }
        }
    }

    /// Re-express this position in `domain`.
    pub fn to_domain(self, domain: TimeDomain, tempo: &TempoMapSnapshot) -> TimePos {
        match domain {
            TimeDomain::Audio => TimePos::Samples(self.samples(tempo)),
            TimeDomain::Beats => TimePos::Beats(self.beats(tempo)),
        }
    }
}

impl Default for TimePos {
    fn default() -> Self {
        TimePos::ZERO
    }
}

/// `a<samples>` for audio time, `b<beats>` for music time.
impl fmt::Display for TimePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimePos::Samples(s) => write!(f, "a{}", s),
            TimePos::Beats(b) => write!(f, "b{}", b),
        }
    }
}

impl FromStr for TimePos {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidTimePos(s.to_string());
        if let Some(rest) = s.strip_prefix('a') {
            rest.parse().map(TimePos::Samples).map_err(|_| invalid())
        } else if let Some(rest) = s.strip_prefix('b') {
            rest.parse().map(TimePos::Beats).map_err(|_| invalid())
        } else {
            // bare integers are sample positions
            s.parse().map(TimePos::Samples).map_err(|_| invalid())
        }
    }
}

/// A transport loop, in samples.
///
/// Positions past the end are "squished" back into the loop so that events read
/// ahead of a loop boundary land where they will actually be heard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopRange {
    start: u64,
    end: u64,
}

impl LoopRange {
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if end <= start {
            return Err(Error::InvalidLoopRange { start, end });
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn squish(&self, pos: u64) -> u64 {
        if pos >= self.end {
            self.start + (pos - self.start) % self.length()
        } else {
            pos
        }
    }
}
