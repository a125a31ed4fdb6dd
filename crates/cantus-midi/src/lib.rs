//! MIDI building blocks for cantus sources.
//!
//! Provides the event types, automation parameters, note tracking, channel
//! filtering, event sinks, the lock-free capture ring and SMF encoding that the
//! source layer is assembled from.
//!
//! # Example
//!
//! ```
//! use cantus_midi::{Event, MidiBuffer, EventSink, NoteTracker};
//!
//! let on = Event::note_on(0u64, 0, 60, 100);
//! let mut buffer = MidiBuffer::new();
//! buffer.write(on.time(), on.event_type(), on.buffer());
//!
//! let mut tracker = NoteTracker::new();
//! tracker.track(on.buffer());
//! assert_eq!(tracker.on(), 1);
//!
//! tracker.resolve_notes(&mut buffer, 480u64);
//! assert_eq!(buffer.len(), 2);
//! ```

// Error types
pub mod error;
pub use error::{Error, Result};

pub mod capture;
pub mod channel_filter;
pub mod event;
pub mod file;
pub mod note_tracker;
pub mod parameter;
pub mod sink;

pub use capture::{
    capture_channel, capture_channel_with_capacity, CaptureConsumer, CaptureProducer,
    DEFAULT_CAPTURE_CAPACITY,
};
pub use channel_filter::{ChannelFilter, ChannelMode};
pub use event::{Event, EventBytes, EventType, RawMidiEvent};
pub use file::{SmfFile, DEFAULT_PPQN};
pub use note_tracker::NoteTracker;
pub use parameter::{AutoState, InterpolationStyle, Parameter, ParameterType};
pub use sink::{EventSink, MidiBuffer};

// Re-export midi-msg types used to build events
pub use midi_msg::{Channel, ChannelVoiceMsg, ControlChange, MidiMsg};
