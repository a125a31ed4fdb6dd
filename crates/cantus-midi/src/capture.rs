//! Lock-free capture path from the audio thread to the disk writer.
//!
//! The audio thread pushes [`RawMidiEvent`]s stamped with absolute sample time;
//! the writer drains them in time order, stopping at the end of the span it
//! is currently committing.

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

use crate::event::RawMidiEvent;

/// Default capacity for the capture ring buffer
pub const DEFAULT_CAPTURE_CAPACITY: usize = 1024;

/// Producer side, owned by the audio thread.
pub struct CaptureProducer {
    producer: HeapProd<RawMidiEvent>,
}

impl CaptureProducer {
    /// Push a captured event.
    ///
    /// Returns false if the buffer is full and the event was dropped.
    #[inline]
    pub fn push(&mut self, event: RawMidiEvent) -> bool {
        self.producer.try_push(event).is_ok()
    }

    #[inline]
    pub fn push_slice(&mut self, events: &[RawMidiEvent]) -> usize {
        self.producer.push_slice(events)
    }

    #[inline]
    pub fn free_space(&self) -> usize {
        self.producer.vacant_len()
    }
}

/// Consumer side, drained under the source's writer lock.
pub struct CaptureConsumer {
    consumer: HeapCons<RawMidiEvent>,
}

impl CaptureConsumer {
    #[inline]
    pub fn pop(&mut self) -> Option<RawMidiEvent> {
        self.consumer.try_pop()
    }

    /// Time of the oldest pending event.
    #[inline]
    pub fn peek_time(&self) -> Option<u64> {
        self.consumer.try_peek().map(|e| e.time)
    }

    /// Pop the oldest event if it is stamped before `end`.
    #[inline]
    pub fn pop_before(&mut self, end: u64) -> Option<RawMidiEvent> {
        match self.peek_time() {
            Some(time) if time < end => self.consumer.try_pop(),
            _ => None,
        }
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.consumer.is_empty()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.consumer.occupied_len()
    }
}

/// Create a capture channel with the default capacity.
pub fn capture_channel() -> (CaptureProducer, CaptureConsumer) {
    capture_channel_with_capacity(DEFAULT_CAPTURE_CAPACITY)
}

/// Create a capture channel with specified capacity
pub fn capture_channel_with_capacity(capacity: usize) -> (CaptureProducer, CaptureConsumer) {
    let rb = HeapRb::new(capacity);
    let (producer, consumer) = rb.split();
    (CaptureProducer { producer }, CaptureConsumer { consumer })
}
