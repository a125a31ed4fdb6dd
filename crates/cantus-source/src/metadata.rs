//! Per-parameter interpolation and automation-state overrides.
//!
//! Both maps only hold values that differ from the parameter's default, so an
//! absent key always means "use the default".

use std::collections::BTreeMap;

use cantus_midi::{AutoState, InterpolationStyle, Parameter};

pub type InterpolationStyleMap = BTreeMap<Parameter, InterpolationStyle>;
pub type AutomationStateMap = BTreeMap<Parameter, AutoState>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterMetadata {
    interpolation: InterpolationStyleMap,
    automation: AutomationStateMap,
}

impl ParameterMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interpolation_of(&self, parameter: &Parameter) -> InterpolationStyle {
        self.interpolation
            .get(parameter)
            .copied()
            .unwrap_or_else(|| parameter.default_interpolation())
    }

    pub fn automation_state_of(&self, parameter: &Parameter) -> AutoState {
        self.automation
            .get(parameter)
            .copied()
            .unwrap_or_default()
    }

    /// Returns false when `style` is already in effect and nothing changed.
    pub fn set_interpolation_of(&mut self, parameter: Parameter, style: InterpolationStyle) -> bool {
        if self.interpolation_of(&parameter) == style {
            return false;
        }
        if parameter.default_interpolation() == style {
            self.interpolation.remove(&parameter);
        } else {
            self.interpolation.insert(parameter, style);
        }
        true
    }

    /// Returns false when `state` is already in effect and nothing changed.
    pub fn set_automation_state_of(&mut self, parameter: Parameter, state: AutoState) -> bool {
        if self.automation_state_of(&parameter) == state {
            return false;
        }
        if state == AutoState::default() {
            self.automation.remove(&parameter);
        } else {
            self.automation.insert(parameter, state);
        }
        true
    }

    #[inline]
    pub fn interpolation_overrides(&self) -> &InterpolationStyleMap {
        &self.interpolation
    }

    #[inline]
    pub fn automation_overrides(&self) -> &AutomationStateMap {
        &self.automation
    }

    pub fn replace_interpolation(&mut self, map: InterpolationStyleMap) {
        self.interpolation = map;
    }

    pub fn replace_automation(&mut self, map: AutomationStateMap) {
        self.automation = map;
    }

    pub fn is_empty(&self) -> bool {
        self.interpolation.is_empty() && self.automation.is_empty()
    }
}
