//! # Cantus - MIDI Source Engine
//!
//! Recorded and imported MIDI takes, built from modular subsystems.
//!
//! ## Architecture
//!
//! Cantus is an umbrella crate that coordinates:
//! - **cantus-core** - Timeline runtime (TimePos, LoopRange, tempo map, Session)
//! - **cantus-midi** - MIDI events (parameters, note tracking, channel filter, SMF codec, capture ring)
//! - **cantus-source** - MIDI sources (playback reads, capture, automation metadata, persistence)
//!
//! ## Quick Start
//!
//! ```
//! use std::collections::HashSet;
//! use std::sync::Arc;
//!
//! use cantus::prelude::*;
//!
//! let session = Arc::new(Session::default());
//! let source = MidiSource::new(session, "take 1", SourceFlags::CAPTURE);
//!
//! let model = MidiModel::from_events([Event::note_on(0.5, 0, 60, 100)]);
//! source.set_model(&mut source.write_lock(), model.into_shared());
//!
//! let mut out = MidiBuffer::new();
//! let mut cursor = MidiCursor::new();
//! source.midi_read(
//!     &source.read_lock(),
//!     &mut out,
//!     TimePos::ZERO,
//!     TimePos::Beats(0.0),
//!     TimePos::Beats(1.0),
//!     None,
//!     &mut cursor,
//!     None,
//!     None,
//!     &HashSet::new(),
//! );
//! assert_eq!(out.times(), vec![12000]);
//! ```

/// Re-export of cantus-core for direct access
pub use cantus_core as core;

/// Re-export of cantus-midi for direct access
pub use cantus_midi as midi;

/// Re-export of cantus-source for direct access
pub use cantus_source as source;

// Timeline types
pub use cantus_core::{
    AtomicFlag, LoopRange, Session, SessionBuilder, SessionConfig, TempoMap, TempoMapSnapshot,
    TimeDomain, TimePos, MAX_BEATS,
};

// MIDI types
pub use cantus_midi::{
    capture_channel, AutoState, CaptureConsumer, CaptureProducer, ChannelFilter, ChannelMode,
    Event, EventSink, InterpolationStyle, MidiBuffer, NoteTracker, Parameter, ParameterType,
    RawMidiEvent, SmfFile,
};

// Sources
pub use cantus_source::{
    CaptureCount, MidiCursor, MidiModel, MidiSource, MidiStorage, ReaderLock, SharedModel,
    SmfStorage, SourceConfig, SourceEvent, SourceFlags, SourceState, StateNode,
    StuckNotePolicy, WriterLock,
};

mod error;
pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    // Timeline
    pub use crate::{LoopRange, Session, TimePos, MAX_BEATS};

    // MIDI
    pub use crate::{
        AutoState, ChannelFilter, ChannelMode, Event, EventSink, InterpolationStyle, MidiBuffer,
        NoteTracker, Parameter, RawMidiEvent,
    };

    // Sources
    pub use crate::{
        CaptureCount, MidiCursor, MidiModel, MidiSource, MidiStorage, SmfStorage, SourceEvent,
        SourceFlags, StateNode, StuckNotePolicy,
    };
}
