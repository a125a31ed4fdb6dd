//! MIDI sources for cantus.
//!
//! A [`MidiSource`] is one recorded or imported take. It owns backing storage,
//! optionally shares an editable [`MidiModel`], and serves:
//!
//! - **Playback reads** ([`MidiSource::midi_read`]): windowed, cursor-cached
//!   extraction into any [`EventSink`](cantus_midi::EventSink)
//! - **Capture** ([`MidiSource::midi_write`] and the `mark_write_*` calls)
//! - **Automation metadata**: per-parameter interpolation and automation-state
//!   overrides with change notifications
//! - **Persistence**: [`StateNode`] save/restore, clone and export between sources
//!
//! Every operation takes a [`ReaderLock`] or [`WriterLock`] obtained from the
//! source itself.
//!
//! # Example
//!
//! ```
//! use std::collections::HashSet;
//! use std::sync::Arc;
//!
//! use cantus_core::{Session, TimePos};
//! use cantus_midi::{Event, MidiBuffer};
//! use cantus_source::{MidiCursor, MidiModel, MidiSource, SourceFlags};
//!
//! let session = Arc::new(Session::default());
//! let source = MidiSource::new(session, "take 1", SourceFlags::CAPTURE);
//!
//! let model = MidiModel::from_events([
//!     Event::note_on(0.0, 0, 60, 100),
//!     Event::note_off(1.0, 0, 60, 0),
//! ]);
//! source.set_model(&mut source.write_lock(), model.into_shared());
//!
//! let mut out = MidiBuffer::new();
//! let mut cursor = MidiCursor::new();
//! source.midi_read(
//!     &source.read_lock(),
//!     &mut out,
//!     TimePos::ZERO,
//!     TimePos::Beats(0.0),
//!     TimePos::Beats(2.0),
//!     None,
//!     &mut cursor,
//!     None,
//!     None,
//!     &HashSet::new(),
//! );
//! assert_eq!(out.times(), vec![0, 24000]);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::SourceConfig;

mod cursor;
pub use cursor::MidiCursor;

pub mod metadata;
pub use metadata::{AutomationStateMap, InterpolationStyleMap, ParameterMetadata};

pub mod model;
pub use model::{ControlList, MidiModel, SharedModel, StuckNotePolicy};

mod persist;
mod read;

mod signals;
pub use signals::SourceEvent;

mod source;
pub use source::{MidiSource, ReaderLock, SourceFlags, SourceState, WriterLock};

pub mod state;
pub use state::StateNode;

pub mod storage;
pub use storage::{MidiStorage, SmfStorage};

mod write;
pub use write::CaptureCount;
