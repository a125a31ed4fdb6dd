//! Change notifications published by a source.
//!
//! Subscribers receive a [`crossbeam_channel::Receiver`]; dropping it is the
//! only way to unsubscribe. Emission never blocks.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use cantus_midi::{AutoState, InterpolationStyle, Parameter};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceEvent {
    /// A model was attached, detached or rebuilt.
    ModelChanged,
    InterpolationChanged {
        parameter: Parameter,
        style: InterpolationStyle,
    },
    AutomationStateChanged {
        parameter: Parameter,
        state: AutoState,
    },
    /// Cached read positions are stale and must be dropped before the next read.
    Invalidated { transport_rolling: bool },
}

#[derive(Default)]
pub(crate) struct Signals {
    subscribers: Mutex<Vec<Sender<SourceEvent>>>,
}

impl Signals {
    pub(crate) fn subscribe(&self) -> Receiver<SourceEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: SourceEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event).is_ok());
        tracing::trace!(?event, receivers = subscribers.len(), "source event");
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
