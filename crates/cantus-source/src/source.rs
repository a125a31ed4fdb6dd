//! The MIDI source: state, lock tokens and model lifecycle.
//!
//! All mutable state lives in [`SourceState`] behind the source's
//! [`RwLock`]. Callers take a [`ReaderLock`] or [`WriterLock`] through
//! [`MidiSource::read_lock`] / [`MidiSource::write_lock`] and pass it to every
//! operation, so holding the right lock is checked by the compiler and several
//! operations can run under one acquisition.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use cantus_core::{Session, TimePos};
use cantus_midi::{AutoState, InterpolationStyle, Parameter};

use crate::config::SourceConfig;
use crate::metadata::{AutomationStateMap, InterpolationStyleMap, ParameterMetadata};
use crate::model::{MidiModel, SharedModel};
use crate::signals::{Signals, SourceEvent};
use crate::storage::{MidiStorage, SmfStorage};

/// Shared access to a source's state.
pub type ReaderLock<'a> = RwLockReadGuard<'a, SourceState>;
/// Exclusive access to a source's state.
pub type WriterLock<'a> = RwLockWriteGuard<'a, SourceState>;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_source_id() -> u64 {
    NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Distinguishes live source objects, including two restored with the same id.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Keep freshly allocated ids clear of one restored from saved state.
pub(crate) fn reserve_source_id(id: u64) {
    NEXT_SOURCE_ID.fetch_max(id.saturating_add(1), Ordering::Relaxed);
}

/// File-level properties of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceFlags {
    pub writable: bool,
    pub removable: bool,
    pub removable_if_empty: bool,
}

impl SourceFlags {
    /// Flags of a fresh capture target: writable and disposable.
    pub const CAPTURE: SourceFlags = SourceFlags {
        writable: true,
        removable: true,
        removable_if_empty: true,
    };
}

impl fmt::Display for SourceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::with_capacity(3);
        if self.writable {
            names.push("Writable");
        }
        if self.removable {
            names.push("Removable");
        }
        if self.removable_if_empty {
            names.push("RemovableIfEmpty");
        }
        f.write_str(&names.join(","))
    }
}

impl FromStr for SourceFlags {
    type Err = cantus_midi::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = SourceFlags::default();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match name {
                "Writable" => flags.writable = true,
                "Removable" => flags.removable = true,
                "RemovableIfEmpty" => flags.removable_if_empty = true,
                _ => {
                    return Err(cantus_midi::Error::InvalidValue {
                        kind: "source flag",
                        value: name.to_string(),
                    })
                }
            }
        }
        Ok(flags)
    }
}

/// Everything about a source that changes after construction.
pub struct SourceState {
    pub(crate) natural_position: TimePos,
    pub(crate) length: TimePos,
    pub(crate) capture_length: u64,
    pub(crate) writing: bool,
    pub(crate) captured_for: String,
    pub(crate) flags: SourceFlags,
    pub(crate) model: Option<SharedModel>,
    pub(crate) storage: Box<dyn MidiStorage>,
    pub(crate) metadata: ParameterMetadata,
    /// Bumped by every invalidation; cursors compare against it.
    pub(crate) generation: u64,
}

impl SourceState {
    fn new(flags: SourceFlags, storage: Box<dyn MidiStorage>) -> Self {
        Self {
            natural_position: TimePos::ZERO,
            length: TimePos::Beats(0.0),
            capture_length: 0,
            writing: false,
            captured_for: String::new(),
            flags,
            model: None,
            storage,
            metadata: ParameterMetadata::new(),
            generation: 0,
        }
    }

    /// Where the source sits on the timeline when first placed.
    #[inline]
    pub fn natural_position(&self) -> TimePos {
        self.natural_position
    }

    /// Length in beats, as set when capture starts.
    #[inline]
    pub fn length(&self) -> TimePos {
        self.length
    }

    /// Samples written so far by the current capture.
    #[inline]
    pub fn capture_length(&self) -> u64 {
        self.capture_length
    }

    #[inline]
    pub fn is_writing(&self) -> bool {
        self.writing
    }

    #[inline]
    pub fn captured_for(&self) -> &str {
        &self.captured_for
    }

    #[inline]
    pub fn flags(&self) -> SourceFlags {
        self.flags
    }

    #[inline]
    pub fn model(&self) -> Option<&SharedModel> {
        self.model.as_ref()
    }

    #[inline]
    pub fn storage(&self) -> &dyn MidiStorage {
        &*self.storage
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn interpolation_of(&self, parameter: &Parameter) -> InterpolationStyle {
        self.metadata.interpolation_of(parameter)
    }

    pub fn automation_state_of(&self, parameter: &Parameter) -> AutoState {
        self.metadata.automation_state_of(parameter)
    }

    pub fn interpolation_overrides(&self) -> &InterpolationStyleMap {
        self.metadata.interpolation_overrides()
    }

    pub fn automation_overrides(&self) -> &AutomationStateMap {
        self.metadata.automation_overrides()
    }
}

impl fmt::Debug for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceState")
            .field("natural_position", &self.natural_position)
            .field("length", &self.length)
            .field("capture_length", &self.capture_length)
            .field("writing", &self.writing)
            .field("captured_for", &self.captured_for)
            .field("flags", &self.flags)
            .field("has_model", &self.model.is_some())
            .field("stored_events", &self.storage.len())
            .field("generation", &self.generation)
            .finish()
    }
}

/// A unit of recorded or imported MIDI data.
pub struct MidiSource {
    pub(crate) id: u64,
    pub(crate) instance: u64,
    pub(crate) name: String,
    pub(crate) session: Arc<Session>,
    pub(crate) state: RwLock<SourceState>,
    pub(crate) signals: Signals,
}

impl MidiSource {
    /// A source backed by in-memory storage.
    pub fn new(session: Arc<Session>, name: impl Into<String>, flags: SourceFlags) -> Self {
        Self::with_storage(session, name, flags, Box::new(SmfStorage::in_memory()))
    }

    pub fn with_storage(
        session: Arc<Session>,
        name: impl Into<String>,
        flags: SourceFlags,
        storage: Box<dyn MidiStorage>,
    ) -> Self {
        Self::from_parts(session, next_source_id(), name.into(), flags, storage)
    }

    /// A source with storage built from `config`, which is validated first.
    pub fn with_config(
        session: Arc<Session>,
        name: impl Into<String>,
        flags: SourceFlags,
        config: &SourceConfig,
    ) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self::with_storage(
            session,
            name,
            flags,
            Box::new(config.storage()),
        ))
    }

    pub(crate) fn from_parts(
        session: Arc<Session>,
        id: u64,
        name: String,
        flags: SourceFlags,
        storage: Box<dyn MidiStorage>,
    ) -> Self {
        Self {
            id,
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            name,
            session,
            state: RwLock::new(SourceState::new(flags, storage)),
            signals: Signals::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn read_lock(&self) -> ReaderLock<'_> {
        self.state.read()
    }

    pub fn write_lock(&self) -> WriterLock<'_> {
        self.state.write()
    }

    /// Receive every notification this source emits from now on.
    pub fn subscribe(&self) -> Receiver<SourceEvent> {
        self.signals.subscribe()
    }

    #[inline]
    pub(crate) fn check_read(&self, lock: &ReaderLock<'_>) {
        debug_assert!(
            std::ptr::eq(RwLockReadGuard::rwlock(lock), &self.state),
            "reader lock belongs to another source"
        );
    }

    #[inline]
    pub(crate) fn check_write(&self, lock: &WriterLock<'_>) {
        debug_assert!(
            std::ptr::eq(RwLockWriteGuard::rwlock(lock), &self.state),
            "writer lock belongs to another source"
        );
    }

    /// Tell every cursor that its cached position is stale.
    pub fn invalidate(&self, lock: &mut WriterLock<'_>) {
        self.check_write(lock);
        lock.generation += 1;
        self.signals.emit(SourceEvent::Invalidated {
            transport_rolling: self.session.transport_rolling(),
        });
    }

    pub fn set_natural_position(&self, lock: &mut WriterLock<'_>, position: TimePos) {
        self.check_write(lock);
        lock.natural_position = position;
    }

    pub fn set_captured_for(&self, lock: &mut WriterLock<'_>, label: impl Into<String>) {
        self.check_write(lock);
        lock.captured_for = label.into();
    }

    // Model lifecycle

    pub fn set_model(&self, lock: &mut WriterLock<'_>, model: SharedModel) {
        self.check_write(lock);
        lock.model = Some(model);
        debug!("Source {} switched to a new model", self.name);
        self.invalidate(lock);
        self.signals.emit(SourceEvent::ModelChanged);
    }

    pub fn drop_model(&self, lock: &mut WriterLock<'_>) {
        self.check_write(lock);
        lock.model = None;
        self.invalidate(lock);
        self.signals.emit(SourceEvent::ModelChanged);
    }

    /// Detach the model ahead of rebuilding it from storage.
    pub fn destroy_model(&self, lock: &mut WriterLock<'_>) {
        self.check_write(lock);
        debug!("Source {} destroying model", self.name);
        lock.model = None;
        self.invalidate(lock);
    }

    /// Build the model from storage.
    ///
    /// Does nothing while capturing, or when a model is attached and
    /// `force_reload` is false. A forced load refills the attached model in
    /// place so everyone sharing it sees the new contents.
    pub fn load_model(&self, lock: &mut WriterLock<'_>, force_reload: bool) {
        self.check_write(lock);
        if lock.writing {
            return;
        }
        if lock.model.is_some() && !force_reload {
            return;
        }

        match lock.model.clone() {
            Some(model) => {
                model.write().reload_from(&*lock.storage);
            }
            None => {
                lock.model = Some(MidiModel::from_storage(&*lock.storage).into_shared());
            }
        }
        debug!(
            "Source {} loaded model with {} events",
            self.name,
            lock.storage.len()
        );

        self.invalidate(lock);
        self.signals.emit(SourceEvent::ModelChanged);
    }

    /// Write buffered storage to its backing file.
    pub fn flush_midi(&self, lock: &mut WriterLock<'_>) -> crate::Result<()> {
        self.check_write(lock);
        lock.storage.flush()
    }

    /// Mark the source as a kept asset: it may still be edited, never removed.
    pub fn prevent_deletion(&self, lock: &mut WriterLock<'_>) {
        self.check_write(lock);
        lock.flags.removable = false;
        lock.flags.removable_if_empty = false;
    }

    // Parameter metadata

    pub fn set_interpolation_of(
        &self,
        lock: &mut WriterLock<'_>,
        parameter: Parameter,
        style: InterpolationStyle,
    ) {
        self.check_write(lock);
        if lock.metadata.set_interpolation_of(parameter, style) {
            self.signals
                .emit(SourceEvent::InterpolationChanged { parameter, style });
        }
    }

    pub fn set_automation_state_of(
        &self,
        lock: &mut WriterLock<'_>,
        parameter: Parameter,
        state: AutoState,
    ) {
        self.check_write(lock);
        if lock.metadata.set_automation_state_of(parameter, state) {
            self.signals
                .emit(SourceEvent::AutomationStateChanged { parameter, state });
        }
    }

    /// Replace every interpolation override with `other`'s. Emits nothing.
    pub fn copy_interpolation_from(&self, lock: &mut WriterLock<'_>, other: &SourceState) {
        self.check_write(lock);
        let map = other.interpolation_overrides().clone();
        lock.metadata.replace_interpolation(map);
    }

    /// Replace every automation-state override with `other`'s. Emits nothing.
    pub fn copy_automation_state_from(&self, lock: &mut WriterLock<'_>, other: &SourceState) {
        self.check_write(lock);
        let map = other.automation_overrides().clone();
        lock.metadata.replace_automation(map);
    }
}

impl fmt::Debug for MidiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidiSource")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Drop for MidiSource {
    fn drop(&mut self) {
        self.signals.emit(SourceEvent::Invalidated {
            transport_rolling: false,
        });
    }
}
