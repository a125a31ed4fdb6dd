//! Timed MIDI events.
//!
//! [`Event`] is the storage type used by models and files: a timestamp in any
//! domain plus the raw message bytes kept inline for short messages.
//! [`RawMidiEvent`] is the fixed-size, `Copy` form pushed through the capture
//! ring from the audio thread.

use midi_msg::{Channel, ChannelVoiceMsg, ControlChange, MidiMsg};
use smallvec::SmallVec;

use crate::parameter::Parameter;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const POLY_PRESSURE: u8 = 0xA0;
pub const CONTROLLER: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_PRESSURE: u8 = 0xD0;
pub const PITCH_BEND: u8 = 0xE0;
pub const SYSEX: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

pub type EventBytes = SmallVec<[u8; 3]>;

/// Kind of payload carried by an event, passed through to sinks untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Midi,
    Sysex,
}

impl EventType {
    #[inline]
    pub fn from_status(status: u8) -> Self {
        if status == SYSEX {
            EventType::Sysex
        } else {
            EventType::Midi
        }
    }
}

/// True for messages addressed to a channel (status 0x80..=0xEF).
#[inline]
pub fn is_channel_status(status: u8) -> bool {
    (NOTE_OFF..=0xEF).contains(&status)
}

/// Expected length of a short message, `None` for sysex or invalid status bytes.
#[inline]
pub fn message_len(status: u8) -> Option<usize> {
    match status & 0xF0 {
        NOTE_OFF | NOTE_ON | POLY_PRESSURE | CONTROLLER | PITCH_BEND => Some(3),
        PROGRAM_CHANGE | CHANNEL_PRESSURE => Some(2),
        0xF0 => match status {
            0xF1 | 0xF3 => Some(2),
            0xF2 => Some(3),
            0xF6 | 0xF8..=0xFF => Some(1),
            _ => None,
        },
        _ => None,
    }
}

/// A MIDI message with a timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<T> {
    time: T,
    event_type: EventType,
    bytes: EventBytes,
}

impl<T: Copy> Event<T> {
    pub fn new(time: T, bytes: &[u8]) -> Self {
        let event_type = bytes
            .first()
            .map(|&s| EventType::from_status(s))
            .unwrap_or(EventType::Midi);
        Self {
            time,
            event_type,
            bytes: SmallVec::from_slice(bytes),
        }
    }

    pub fn with_type(time: T, event_type: EventType, bytes: &[u8]) -> Self {
        Self {
            time,
            event_type,
            bytes: SmallVec::from_slice(bytes),
        }
    }

    fn from_msg(time: T, msg: MidiMsg) -> Self {
        Self::new(time, &msg.to_midi())
    }

    fn channel_voice(time: T, channel: u8, msg: ChannelVoiceMsg) -> Self {
        Self::from_msg(
            time,
            MidiMsg::ChannelVoice {
                channel: Channel::from_u8(channel),
                msg,
            },
        )
    }

    #[inline]
    pub fn note_on(time: T, channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel_voice(time, channel, ChannelVoiceMsg::NoteOn { note, velocity })
    }

    #[inline]
    pub fn note_off(time: T, channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel_voice(time, channel, ChannelVoiceMsg::NoteOff { note, velocity })
    }

    #[inline]
    pub fn control_change(time: T, channel: u8, control: u8, value: u8) -> Self {
        Self::channel_voice(
            time,
            channel,
            ChannelVoiceMsg::ControlChange {
                control: ControlChange::CC { control, value },
            },
        )
    }

    #[inline]
    pub fn program_change(time: T, channel: u8, program: u8) -> Self {
        Self::channel_voice(time, channel, ChannelVoiceMsg::ProgramChange { program })
    }

    #[inline]
    pub fn channel_pressure(time: T, channel: u8, pressure: u8) -> Self {
        Self::channel_voice(time, channel, ChannelVoiceMsg::ChannelPressure { pressure })
    }

    #[inline]
    pub fn poly_pressure(time: T, channel: u8, note: u8, pressure: u8) -> Self {
        Self::channel_voice(time, channel, ChannelVoiceMsg::PolyPressure { note, pressure })
    }

    #[inline]
    pub fn pitch_bend(time: T, channel: u8, bend: u16) -> Self {
        Self::channel_voice(time, channel, ChannelVoiceMsg::PitchBend { bend })
    }

    #[inline]
    pub fn time(&self) -> T {
        self.time
    }

    #[inline]
    pub fn set_time(&mut self, time: T) {
        self.time = time;
    }

    /// Same message, different clock.
    #[inline]
    pub fn with_time<U: Copy>(&self, time: U) -> Event<U> {
        Event {
            time,
            event_type: self.event_type,
            bytes: self.bytes.clone(),
        }
    }
}

impl<T> Event<T> {
    #[inline]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.bytes.first().copied().unwrap_or(0)
    }

    #[inline]
    pub fn message_type(&self) -> u8 {
        self.status() & 0xF0
    }

    #[inline]
    pub fn channel(&self) -> u8 {
        self.status() & 0x0F
    }

    #[inline]
    pub fn is_channel_event(&self) -> bool {
        is_channel_status(self.status())
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        self.message_type() == NOTE_ON && self.bytes.get(2).is_some_and(|&v| v > 0)
    }

    #[inline]
    pub fn is_note_off(&self) -> bool {
        match self.message_type() {
            NOTE_OFF => true,
            NOTE_ON => self.bytes.get(2) == Some(&0),
            _ => false,
        }
    }

    #[inline]
    pub fn is_note(&self) -> bool {
        self.is_note_on() || self.is_note_off()
    }

    #[inline]
    pub fn note(&self) -> Option<u8> {
        match self.message_type() {
            NOTE_OFF | NOTE_ON | POLY_PRESSURE => self.bytes.get(1).copied(),
            _ => None,
        }
    }

    #[inline]
    pub fn velocity(&self) -> Option<u8> {
        match self.message_type() {
            NOTE_OFF | NOTE_ON => self.bytes.get(2).copied(),
            _ => None,
        }
    }

    #[inline]
    pub fn is_sysex(&self) -> bool {
        self.status() == SYSEX
    }

    /// The automation parameter this event drives, if any.
    #[inline]
    pub fn parameter(&self) -> Option<Parameter> {
        Parameter::from_event(&self.bytes)
    }
}

/// Fixed-size event for the capture path. Time is an absolute sample position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawMidiEvent {
    pub time: u64,
    pub data: [u8; 3],
    /// Valid bytes in `data` (1-3).
    pub len: u8,
}

impl RawMidiEvent {
    #[inline]
    pub fn new(time: u64, data: [u8; 3], len: u8) -> Self {
        Self {
            time,
            data,
            len: len.min(3),
        }
    }

    /// Build from a short message. Returns `None` for sysex or truncated input.
    pub fn from_bytes(time: u64, bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        let len = message_len(status)?;
        if bytes.len() < len {
            return None;
        }
        let mut data = [0u8; 3];
        data[..len].copy_from_slice(&bytes[..len]);
        Some(Self {
            time,
            data,
            len: len as u8,
        })
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.data[0] & 0xF0
    }

    #[inline]
    pub fn channel(&self) -> u8 {
        self.data[0] & 0x0F
    }

    pub fn to_event(&self) -> Event<u64> {
        Event::new(self.time, self.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on() {
        let event = Event::note_on(100u64, 0, 60, 100);
        assert!(event.is_note_on());
        assert!(!event.is_note_off());
        assert_eq!(event.note(), Some(60));
        assert_eq!(event.velocity(), Some(100));
        assert_eq!(event.channel(), 0);
        assert_eq!(event.buffer(), &[0x90, 60, 100]);
        assert_eq!(event.time(), 100);
    }

    #[test]
    fn test_note_on_zero_velocity_is_note_off() {
        let event = Event::new(0.0f64, &[0x93, 60, 0]);
        assert!(event.is_note_off());
        assert!(!event.is_note_on());
        assert_eq!(event.channel(), 3);
    }

    #[test]
    fn test_control_change_bytes() {
        let event = Event::control_change(0u64, 5, 7, 127);
        assert_eq!(event.buffer(), &[0xB5, 7, 127]);
        assert!(event.is_channel_event());
        assert_eq!(event.note(), None);
    }

    #[test]
    fn test_pitch_bend_bytes() {
        let event = Event::pitch_bend(0u64, 0, 8192);
        assert_eq!(event.buffer(), &[0xE0, 0x00, 0x40]);
    }

    #[test]
    fn test_sysex_type() {
        let event = Event::new(0u64, &[0xF0, 0x7E, 0x00, 0xF7]);
        assert_eq!(event.event_type(), EventType::Sysex);
        assert!(event.is_sysex());
        assert!(!event.is_channel_event());
        assert_eq!(event.size(), 4);
    }

    #[test]
    fn test_with_time_keeps_payload() {
        let event = Event::note_off(1.5f64, 2, 64, 0);
        let moved = event.with_time(48000u64);
        assert_eq!(moved.time(), 48000);
        assert_eq!(moved.buffer(), event.buffer());
    }

    #[test]
    fn test_raw_midi_event() {
        let raw = RawMidiEvent::from_bytes(100, &[0x91, 60, 100]).unwrap();
        assert_eq!(raw.status(), 0x90);
        assert_eq!(raw.channel(), 1);
        assert_eq!(raw.bytes(), &[0x91, 60, 100]);

        let back = raw.to_event();
        assert_eq!(back.time(), 100);
        assert!(back.is_note_on());
    }

    #[test]
    fn test_raw_midi_event_rejects_sysex_and_truncated() {
        assert!(RawMidiEvent::from_bytes(0, &[0xF0, 0x01, 0xF7]).is_none());
        assert!(RawMidiEvent::from_bytes(0, &[0x90, 60]).is_none());
        assert!(RawMidiEvent::from_bytes(0, &[]).is_none());
    }

    #[test]
    fn test_message_len() {
        assert_eq!(message_len(0x90), Some(3));
        assert_eq!(message_len(0xC4), Some(2));
        assert_eq!(message_len(0xF8), Some(1));
        assert_eq!(message_len(0xF0), None);
        assert_eq!(message_len(0x40), None);
    }
}
