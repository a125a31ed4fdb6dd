//! Standard MIDI File encoding.
//!
//! Sources persist as single-track, metrically timed SMF. Event times are kept
//! in beats on the Rust side and quantized to ticks only at the file boundary.

use std::path::Path;

use midly::num::{u14, u15, u28, u4, u7};
use midly::{
    Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, Track, TrackEvent,
    TrackEventKind,
};
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::{
    Event, EventType, CHANNEL_PRESSURE, CONTROLLER, NOTE_OFF, NOTE_ON, PITCH_BEND, POLY_PRESSURE,
    PROGRAM_CHANGE, SYSEX,
};

/// Ticks per quarter note used when none is given.
pub const DEFAULT_PPQN: u16 = 1920;

/// A decoded SMF: beat-timed events, sorted, plus the file's resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SmfFile {
    pub ticks_per_beat: u16,
    pub events: Vec<Event<f64>>,
}

impl SmfFile {
    pub fn new(ticks_per_beat: u16) -> Self {
        Self {
            ticks_per_beat,
            events: Vec::new(),
        }
    }

    pub fn with_events(ticks_per_beat: u16, events: Vec<Event<f64>>) -> Self {
        Self {
            ticks_per_beat,
            events,
        }
    }

    /// Load and parse a MIDI file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::parse(&data)
    }

    /// Parse MIDI file from bytes. All tracks are merged into one sequence.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let smf = Smf::parse(data)?;

        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(tpb) => tpb.as_int(),
            Timing::Timecode(_, _) => return Err(Error::MidiUnsupportedTiming),
        };
        if ticks_per_beat == 0 {
            return Err(Error::MidiUnsupportedTiming);
        }

        let mut events = Vec::new();
        for track in smf.tracks.iter() {
            let mut tick = 0u64;
            for event in track.iter() {
                tick += event.delta.as_int() as u64;
                let beats = tick as f64 / ticks_per_beat as f64;
                if let Some(ev) = Self::decode(&event.kind, beats) {
                    events.push(ev);
                }
            }
        }

        // Stable, so same-tick events keep file order.
        events.sort_by(|a: &Event<f64>, b: &Event<f64>| a.time().total_cmp(&b.time()));

        debug!(
            "Parsed SMF: {} tracks, {} ticks per beat, {} events",
            smf.tracks.len(),
            ticks_per_beat,
            events.len()
        );

        Ok(Self {
            ticks_per_beat,
            events,
        })
    }

    /// Encode as a format 0 file.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let tpb = self.ticks_per_beat.max(1);
        let mut track: Track = Vec::with_capacity(self.events.len() + 1);
        let mut last_tick = 0u64;

        for ev in &self.events {
            let tick = (ev.time().max(0.0) * tpb as f64).round() as u64;
            let Some(kind) = Self::encode(ev)? else {
                continue;
            };
            let delta = tick.saturating_sub(last_tick);
            last_tick = last_tick.max(tick);
            track.push(TrackEvent {
                delta: u28::new(delta.min(u28::max_value().as_int() as u64) as u32),
                kind,
            });
        }
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(tpb)),
        ));
        smf.tracks.push(track);

        let mut out = Vec::new();
        smf.write_std(&mut out)?;
        Ok(out)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), bytes)?;
        debug!(
            "Wrote {} events to {}",
            self.events.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Time of the last event in beats.
    pub fn duration_beats(&self) -> f64 {
        self.events.last().map(|e| e.time()).unwrap_or(0.0)
    }

    fn decode(kind: &TrackEventKind, beats: f64) -> Option<Event<f64>> {
        match kind {
            TrackEventKind::Midi { channel, message } => {
                let ch = channel.as_int();
                let bytes: [u8; 3] = match *message {
                    MidiMessage::NoteOff { key, vel } => {
                        [NOTE_OFF | ch, key.as_int(), vel.as_int()]
                    }
                    MidiMessage::NoteOn { key, vel } => [NOTE_ON | ch, key.as_int(), vel.as_int()],
                    MidiMessage::Aftertouch { key, vel } => {
                        [POLY_PRESSURE | ch, key.as_int(), vel.as_int()]
                    }
                    MidiMessage::Controller { controller, value } => {
                        [CONTROLLER | ch, controller.as_int(), value.as_int()]
                    }
                    MidiMessage::ProgramChange { program } => {
                        return Some(Event::new(beats, &[PROGRAM_CHANGE | ch, program.as_int()]));
                    }
                    MidiMessage::ChannelAftertouch { vel } => {
                        return Some(Event::new(beats, &[CHANNEL_PRESSURE | ch, vel.as_int()]));
                    }
                    MidiMessage::PitchBend { bend } => {
                        let raw = bend.0.as_int();
                        [PITCH_BEND | ch, (raw & 0x7F) as u8, (raw >> 7) as u8]
                    }
                };
                Some(Event::new(beats, &bytes))
            }
            TrackEventKind::SysEx(data) => {
                let mut buf = Vec::with_capacity(data.len() + 1);
                buf.push(SYSEX);
                buf.extend_from_slice(data);
                Some(Event::with_type(beats, EventType::Sysex, &buf))
            }
            // Tempo and other meta events belong to the session, not the source.
            _ => None,
        }
    }

    fn encode(ev: &Event<f64>) -> Result<Option<TrackEventKind<'_>>> {
        let buf = ev.buffer();
        let Some(&status) = buf.first() else {
            return Ok(None);
        };
        if status == SYSEX {
            return Ok(Some(TrackEventKind::SysEx(&buf[1..])));
        }
        if !crate::event::is_channel_status(status) {
            // System realtime/common messages have no place in a track.
            return Ok(None);
        }

        let data = |i: usize| -> Result<u7> {
            buf.get(i)
                .map(|&b| u7::new(b))
                .ok_or_else(|| Error::MalformedEvent(buf.to_vec()))
        };
        let message = match status & 0xF0 {
            NOTE_OFF => MidiMessage::NoteOff {
                key: data(1)?,
                vel: data(2)?,
            },
            NOTE_ON => MidiMessage::NoteOn {
                key: data(1)?,
                vel: data(2)?,
            },
            POLY_PRESSURE => MidiMessage::Aftertouch {
                key: data(1)?,
                vel: data(2)?,
            },
            CONTROLLER => MidiMessage::Controller {
                controller: data(1)?,
                value: data(2)?,
            },
            PROGRAM_CHANGE => MidiMessage::ProgramChange { program: data(1)? },
            CHANNEL_PRESSURE => MidiMessage::ChannelAftertouch { vel: data(1)? },
            _ => {
                let lsb = data(1)?.as_int() as u16;
                let msb = data(2)?.as_int() as u16;
                MidiMessage::PitchBend {
                    bend: PitchBend(u14::new((msb << 7) | lsb)),
                }
            }
        };

        Ok(Some(TrackEventKind::Midi {
            channel: u4::new(status & 0x0F),
            message,
        }))
    }
}

impl Default for SmfFile {
    fn default() -> Self {
        Self::new(DEFAULT_PPQN)
    }
}
