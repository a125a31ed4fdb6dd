//! Saved state, copying between sources and session-save flushes.

use std::sync::Arc;

use tracing::{debug, error, warn};

use cantus_core::{Session, TimePos, MAX_BEATS};
use cantus_midi::{AutoState, InterpolationStyle, Parameter};

use crate::source::{
    next_source_id, reserve_source_id, MidiSource, ReaderLock, SourceFlags, SourceState, WriterLock,
};
use crate::state::StateNode;
use crate::storage::MidiStorage;
use crate::{Error, Result};

const SOURCE_NODE: &str = "Source";
const INTERPOLATION_NODE: &str = "InterpolationStyle";
const AUTOMATION_NODE: &str = "AutomationState";

fn missing(node: &'static str, property: &'static str) -> Error {
    error!("Missing {} property on {}", property, node);
    Error::MissingProperty { node, property }
}

fn invalid(node: &'static str, property: &'static str, value: &str) -> Error {
    error!("Invalid {} property \"{}\" on {}", property, value, node);
    Error::InvalidProperty {
        node,
        property,
        value: value.to_string(),
    }
}

impl MidiSource {
    /// Rebuild a source from saved state. Any malformed entry fails the whole
    /// construction.
    pub fn from_state(
        session: Arc<Session>,
        node: &StateNode,
        storage: Box<dyn MidiStorage>,
    ) -> Result<Self> {
        let name = node
            .property("name")
            .ok_or_else(|| missing(SOURCE_NODE, "name"))?
            .to_string();
        let id = match node.parsed_property::<u64>("id") {
            Some(id) => {
                reserve_source_id(id);
                id
            }
            None => next_source_id(),
        };
        let flags = node
            .parsed_property::<SourceFlags>("flags")
            .unwrap_or_default();

        let source = Self::from_parts(session, id, name, flags, storage);
        {
            let mut lock = source.write_lock();
            if let Some(position) = node.parsed_property::<TimePos>("natural-position") {
                lock.natural_position = position;
            }
            source.set_state(&mut lock, node)?;
        }
        Ok(source)
    }

    pub fn get_state(&self, state: &SourceState) -> StateNode {
        let mut node = StateNode::new(SOURCE_NODE)
            .with_property("name", &self.name)
            .with_property("type", "midi")
            .with_property("id", self.id)
            .with_property("flags", state.flags())
            .with_property("natural-position", state.natural_position());

        if !state.captured_for().is_empty() {
            node.set_property("captured-for", state.captured_for());
        }

        for (parameter, style) in state.interpolation_overrides() {
            node.add_child(
                StateNode::new(INTERPOLATION_NODE)
                    .with_property("parameter", parameter.to_symbol())
                    .with_property("style", style),
            );
        }

        for (parameter, auto_state) in state.automation_overrides() {
            node.add_child(
                StateNode::new(AUTOMATION_NODE)
                    .with_property("parameter", parameter.to_symbol())
                    .with_property("state", auto_state),
            );
        }

        node
    }

    /// Apply saved metadata to this source.
    ///
    /// Entries naming unknown or non-automatable parameters are skipped. An
    /// empty style (older sessions) toggles away from the parameter's default
    /// and an empty state means Off. A missing or unreadable style or state
    /// fails the whole restore.
    pub fn set_state(&self, lock: &mut WriterLock<'_>, node: &StateNode) -> Result<()> {
        self.check_write(lock);

        if let Some(captured_for) = node.property("captured-for") {
            lock.captured_for = captured_for.to_string();
        }

        for child in node.children_named(INTERPOLATION_NODE) {
            let symbol = child
                .property("parameter")
                .ok_or_else(|| missing(INTERPOLATION_NODE, "parameter"))?;
            let Some(parameter) = automatable(symbol) else {
                continue;
            };
            let style = match child.property("style") {
                None => return Err(missing(INTERPOLATION_NODE, "style")),
                Some("") => parameter.default_interpolation().toggled(),
                Some(value) => value
                    .parse::<InterpolationStyle>()
                    .map_err(|_| invalid(INTERPOLATION_NODE, "style", value))?,
            };
            self.set_interpolation_of(lock, parameter, style);
        }

        for child in node.children_named(AUTOMATION_NODE) {
            let symbol = child
                .property("parameter")
                .ok_or_else(|| missing(AUTOMATION_NODE, "parameter"))?;
            let Some(parameter) = automatable(symbol) else {
                continue;
            };
            let state = match child.property("state") {
                None => return Err(missing(AUTOMATION_NODE, "state")),
                Some("") => AutoState::Off,
                Some(value) => value
                    .parse::<AutoState>()
                    .map_err(|_| invalid(AUTOMATION_NODE, "state", value))?,
            };
            self.set_automation_state_of(lock, parameter, state);
        }

        Ok(())
    }

    /// Write `[begin, end)` (beats) of the model into `target`, shifted to
    /// start at zero, and flush it. Held notes are closed at `end - begin`.
    pub fn export_write_to(
        &self,
        lock: &ReaderLock<'_>,
        target: &MidiSource,
        begin: f64,
        end: f64,
    ) -> Result<()> {
        self.check_read(lock);
        debug_assert!(!std::ptr::eq(self, target), "cannot export a source into itself");
        let mut target_lock = target.write_lock();

        let Some(model) = lock.model() else {
            error!("programming error: no model for {} during export", self.name);
            return Err(Error::NoModel {
                operation: "export",
            });
        };

        model
            .read()
            .write_section_to(&mut *target_lock.storage, begin, end, true);
        target.flush_midi(&mut target_lock)
    }

    /// Make `target` a copy of `[begin, end)` (beats) of this source.
    ///
    /// Position and metadata overrides are copied without notifications. A
    /// full range (`0..MAX_BEATS`) rebuilds the target's model from scratch;
    /// a partial one refills it in place. The target is no longer removable
    /// afterwards.
    ///
    /// Notes still sounding at `end` get a note-off at exactly `end`, so a
    /// partial copy can hold events stamped `end` itself.
    pub fn write_to(
        &self,
        lock: &ReaderLock<'_>,
        target: &MidiSource,
        begin: f64,
        end: f64,
    ) -> Result<()> {
        self.check_read(lock);
        debug_assert!(!std::ptr::eq(self, target), "cannot clone a source into itself");
        let mut target_lock = target.write_lock();

        target.set_natural_position(&mut target_lock, lock.natural_position());
        target.copy_interpolation_from(&mut target_lock, lock);
        target.copy_automation_state_from(&mut target_lock, lock);

        let Some(model) = lock.model() else {
            error!("programming error: no model for {} during clone", self.name);
            return Err(Error::NoModel { operation: "clone" });
        };

        let full_range = begin == 0.0 && end == MAX_BEATS;
        {
            let model = model.read();
            let storage = &mut *target_lock.storage;
            if full_range {
                model.write_to(storage);
            } else {
                model.write_section_to(storage, begin, end, false);
            }
        }

        target.flush_midi(&mut target_lock)?;

        if full_range {
            target.destroy_model(&mut target_lock);
            target.load_model(&mut target_lock, false);
        } else {
            target.load_model(&mut target_lock, true);
        }

        target.prevent_deletion(&mut target_lock);
        debug!("{} written to {} ({}..{})", self.name, target.name, begin, end);
        Ok(())
    }

    /// Bring storage up to date at session save.
    ///
    /// An edited model is detached while its contents are synced into
    /// storage, then reattached.
    pub fn session_saved(&self) -> Result<()> {
        let mut lock = self.write_lock();

        let edited = lock.model().is_some_and(|m| m.read().edited());
        if !edited {
            return self.flush_midi(&mut lock);
        }

        let model = lock.model.take();
        if let Some(model) = &model {
            model.write().sync_to_source(&mut *lock.storage);
        }
        let flushed = lock.storage.flush();
        lock.model = model;
        flushed
    }
}

/// Resolve a saved parameter symbol, skipping ones that cannot carry automation.
fn automatable(symbol: &str) -> Option<Parameter> {
    match Parameter::from_symbol(symbol) {
        Some(p) if p.is_automatable() => Some(p),
        Some(_) => {
            warn!("Parameter \"{}\" is system exclusive - no automation possible", symbol);
            None
        }
        None => {
            warn!("Parameter \"{}\" is not a MIDI automation parameter; ignoring", symbol);
            None
        }
    }
}
