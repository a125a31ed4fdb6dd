//! Automation parameters carried by MIDI events.
//!
//! A [`Parameter`] names one automatable stream within a MIDI source (e.g.
//! "CC 7 on channel 1"). Parameters have a stable string symbol used in saved
//! state, and a per-type default [`InterpolationStyle`].

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::event::{
    CHANNEL_PRESSURE, CONTROLLER, PITCH_BEND, POLY_PRESSURE, PROGRAM_CHANGE, SYSEX,
};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    Controller,
    ProgramChange,
    ChannelPressure,
    NotePressure,
    PitchBend,
    SystemExclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Parameter {
    kind: ParameterType,
    channel: u8,
    /// Controller number for CCs, note number for note pressure, 0 otherwise.
    id: u8,
}

impl Parameter {
    pub const fn new(kind: ParameterType, channel: u8, id: u8) -> Self {
        Self {
            kind,
            channel: channel & 0x0F,
            id: id & 0x7F,
        }
    }

    pub const fn controller(channel: u8, cc: u8) -> Self {
        Self::new(ParameterType::Controller, channel, cc)
    }

    pub const fn program_change(channel: u8) -> Self {
        Self::new(ParameterType::ProgramChange, channel, 0)
    }

    pub const fn channel_pressure(channel: u8) -> Self {
        Self::new(ParameterType::ChannelPressure, channel, 0)
    }

    pub const fn note_pressure(channel: u8, note: u8) -> Self {
        Self::new(ParameterType::NotePressure, channel, note)
    }

    pub const fn pitch_bend(channel: u8) -> Self {
        Self::new(ParameterType::PitchBend, channel, 0)
    }

    pub const fn system_exclusive() -> Self {
        Self::new(ParameterType::SystemExclusive, 0, 0)
    }

    #[inline]
    pub fn kind(&self) -> ParameterType {
        self.kind
    }

    #[inline]
    pub fn channel(&self) -> u8 {
        self.channel
    }

    #[inline]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Sysex carries no continuous value and cannot be automated.
    #[inline]
    pub fn is_automatable(&self) -> bool {
        self.kind != ParameterType::SystemExclusive
    }

    /// The parameter driven by a raw MIDI message. Notes and system messages
    /// other than sysex map to `None`.
    pub fn from_event(buf: &[u8]) -> Option<Self> {
        let status = *buf.first()?;
        if status == SYSEX {
            return Some(Self::system_exclusive());
        }
        let channel = status & 0x0F;
        match status & 0xF0 {
            CONTROLLER => buf.get(1).map(|&cc| Self::controller(channel, cc)),
            PROGRAM_CHANGE => Some(Self::program_change(channel)),
            CHANNEL_PRESSURE => Some(Self::channel_pressure(channel)),
            POLY_PRESSURE => buf.get(1).map(|&n| Self::note_pressure(channel, n)),
            PITCH_BEND => Some(Self::pitch_bend(channel)),
            _ => None,
        }
    }

    /// Control value carried by a message for this parameter's type.
    pub fn value_of(&self, buf: &[u8]) -> Option<f64> {
        let byte = |i: usize| buf.get(i).map(|&b| b as f64);
        match self.kind {
            ParameterType::Controller | ParameterType::NotePressure => byte(2),
            ParameterType::ProgramChange | ParameterType::ChannelPressure => byte(1),
            ParameterType::PitchBend => {
                let lsb = *buf.get(1)? as u16;
                let msb = *buf.get(2)? as u16;
                Some(((msb << 7) | lsb) as f64)
            }
            ParameterType::SystemExclusive => None,
        }
    }

    /// Interpolation a parameter of this type uses when nothing overrides it.
    pub fn default_interpolation(&self) -> InterpolationStyle {
        match self.kind {
            ParameterType::Controller => match self.id {
                // bank select MSB/LSB, switch controllers, channel mode messages
                0 | 32 | 64..=69 | 120..=127 => InterpolationStyle::Discrete,
                _ => InterpolationStyle::Linear,
            },
            ParameterType::ProgramChange | ParameterType::SystemExclusive => {
                InterpolationStyle::Discrete
            }
            ParameterType::ChannelPressure
            | ParameterType::NotePressure
            | ParameterType::PitchBend => InterpolationStyle::Linear,
        }
    }

    pub fn to_symbol(&self) -> String {
        match self.kind {
            ParameterType::Controller => format!("midicc-{}-{}", self.channel, self.id),
            ParameterType::ProgramChange => format!("midi-pgm-change-{}", self.channel),
            ParameterType::ChannelPressure => format!("midi-channel-pressure-{}", self.channel),
            ParameterType::NotePressure => {
                format!("midi-note-pressure-{}-{}", self.channel, self.id)
            }
            ParameterType::PitchBend => format!("midi-pitch-bender-{}", self.channel),
            ParameterType::SystemExclusive => "midi-sysex".to_string(),
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        fn num(s: &str, max: u8) -> Option<u8> {
            s.parse::<u8>().ok().filter(|&v| v <= max)
        }
        fn pair(s: &str) -> Option<(u8, u8)> {
            let (a, b) = s.split_once('-')?;
            Some((num(a, 15)?, num(b, 127)?))
        }

        if symbol == "midi-sysex" {
            return Some(Self::system_exclusive());
        }
        if let Some(rest) = symbol.strip_prefix("midicc-") {
            let (channel, cc) = pair(rest)?;
            return Some(Self::controller(channel, cc));
        }
        if let Some(rest) = symbol.strip_prefix("midi-note-pressure-") {
            let (channel, note) = pair(rest)?;
            return Some(Self::note_pressure(channel, note));
        }
        if let Some(rest) = symbol.strip_prefix("midi-pgm-change-") {
            return num(rest, 15).map(Self::program_change);
        }
        if let Some(rest) = symbol.strip_prefix("midi-channel-pressure-") {
            return num(rest, 15).map(Self::channel_pressure);
        }
        if let Some(rest) = symbol.strip_prefix("midi-pitch-bender-") {
            return num(rest, 15).map(Self::pitch_bend);
        }
        None
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_symbol())
    }
}

impl FromStr for Parameter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_symbol(s).ok_or_else(|| Error::UnknownParameter(s.to_string()))
    }
}

/// How values are interpolated between recorded control points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterpolationStyle {
    /// Step: hold each value until the next point.
    Discrete,
    /// Ramp linearly between points.
    Linear,
}

impl InterpolationStyle {
    #[inline]
    pub fn toggled(self) -> Self {
        match self {
            InterpolationStyle::Discrete => InterpolationStyle::Linear,
            InterpolationStyle::Linear => InterpolationStyle::Discrete,
        }
    }
}

impl fmt::Display for InterpolationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InterpolationStyle::Discrete => "Discrete",
            InterpolationStyle::Linear => "Linear",
        })
    }
}

impl FromStr for InterpolationStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Discrete" => Ok(InterpolationStyle::Discrete),
            "Linear" => Ok(InterpolationStyle::Linear),
            _ => Err(Error::InvalidValue {
                kind: "interpolation style",
                value: s.to_string(),
            }),
        }
    }
}

/// Playback policy for a parameter's recorded automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AutoState {
    Off,
    Manual,
    #[default]
    Play,
    Write,
    Touch,
    Latch,
}

impl fmt::Display for AutoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AutoState::Off => "Off",
            AutoState::Manual => "Manual",
            AutoState::Play => "Play",
            AutoState::Write => "Write",
            AutoState::Touch => "Touch",
            AutoState::Latch => "Latch",
        })
    }
}

impl FromStr for AutoState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Off" => Ok(AutoState::Off),
            "Manual" => Ok(AutoState::Manual),
            "Play" => Ok(AutoState::Play),
            "Write" => Ok(AutoState::Write),
            "Touch" => Ok(AutoState::Touch),
            "Latch" => Ok(AutoState::Latch),
            _ => Err(Error::InvalidValue {
                kind: "automation state",
                value: s.to_string(),
            }),
        }
    }
}
