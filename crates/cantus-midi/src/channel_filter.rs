//! Per-track MIDI channel filtering and remapping.
//!
//! Mode and mask are packed into a single atomic so the GUI thread can change
//! them while the audio thread is reading without tearing.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::event::is_channel_status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Pass every channel through untouched.
    AllChannels,
    /// Pass only channels whose bit is set in the mask.
    FilterChannels,
    /// Rewrite every channel message onto the lowest channel in the mask.
    ForceChannel,
}

impl ChannelMode {
    fn to_bits(self) -> u32 {
        match self {
            ChannelMode::AllChannels => 0,
            ChannelMode::FilterChannels => 1,
            ChannelMode::ForceChannel => 2,
        }
    }

    fn from_bits(bits: u32) -> Self {
        match bits {
            1 => ChannelMode::FilterChannels,
            2 => ChannelMode::ForceChannel,
            _ => ChannelMode::AllChannels,
        }
    }
}

#[derive(Debug)]
pub struct ChannelFilter {
    mode_mask: AtomicU32,
}

impl ChannelFilter {
    pub fn new() -> Self {
        Self::with_mode(ChannelMode::AllChannels, 0xFFFF)
    }

    pub fn with_mode(mode: ChannelMode, mask: u16) -> Self {
        let filter = Self {
            mode_mask: AtomicU32::new(0),
        };
        filter.set_channel_mode(mode, mask);
        filter
    }

    /// Force mode keeps only the lowest set bit; an empty mask selects channel 0.
    pub fn set_channel_mode(&self, mode: ChannelMode, mask: u16) {
        let mask = match mode {
            ChannelMode::ForceChannel if mask == 0 => 1,
            ChannelMode::ForceChannel => 1 << mask.trailing_zeros(),
            _ => mask,
        };
        self.mode_mask
            .store((mode.to_bits() << 16) | mask as u32, Ordering::Release);
    }

    #[inline]
    pub fn channel_mode(&self) -> ChannelMode {
        ChannelMode::from_bits(self.mode_mask.load(Ordering::Acquire) >> 16)
    }

    #[inline]
    pub fn channel_mask(&self) -> u16 {
        (self.mode_mask.load(Ordering::Acquire) & 0xFFFF) as u16
    }

    /// Apply the filter to a message in place.
    ///
    /// Returns `true` if the message should be dropped. Non-channel messages
    /// always pass untouched.
    pub fn filter(&self, buf: &mut [u8]) -> bool {
        let Some(status) = buf.first().copied() else {
            return false;
        };
        if !is_channel_status(status) {
            return false;
        }

        let packed = self.mode_mask.load(Ordering::Acquire);
        let mask = (packed & 0xFFFF) as u16;
        let channel = status & 0x0F;

        match ChannelMode::from_bits(packed >> 16) {
            ChannelMode::AllChannels => false,
            ChannelMode::FilterChannels => mask & (1 << channel) == 0,
            ChannelMode::ForceChannel => {
                buf[0] = (status & 0xF0) | mask.trailing_zeros() as u8;
                false
            }
        }
    }
}

impl Default for ChannelFilter {
    fn default() -> Self {
        Self::new()
    }
}
