//! Scenario blueprints: states and the transitions between them.
//!
//! A scenario is immutable once published and shared read-only by every
//! process instantiated from it. Besides its explicit states it always
//! carries three implicit terminal states (`:success`, `:failed`,
//! `:cancelled`); those are regenerated on load and omitted from
//! serialized output.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::dynamic::{self, Dynamic};
use crate::error::ModelError;
use crate::key_map::KeyMap;
use crate::validation::ValidationResult;

/// Every scenario starts here.
pub const INITIAL_STATE: &str = ":initial";
pub const SUCCESS_STATE: &str = ":success";
pub const FAILED_STATE: &str = ":failed";
pub const CANCELLED_STATE: &str = ":cancelled";

/// The implicit terminal states of every scenario.
pub const TERMINAL_STATES: [&str; 3] = [SUCCESS_STATE, FAILED_STATE, CANCELLED_STATE];

/// Wildcard action/response key in a transition: matches anything.
pub const WILDCARD: &str = "*";

/// Whether and how often a state or response is shown to participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Always,
    Once,
    Never,
}

/// A rule mapping (action, response, condition) to a target state.
///
/// `action`/`response` of `None` (or the `*` wildcard) match anything.
/// Transitions are tried in declaration order; the first whose condition
/// resolves truthy wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default = "dynamic::truth")]
    pub condition: Dynamic<bool>,
    #[serde(rename = "transition", alias = "goto")]
    pub target: String,
}

impl StateTransition {
    pub fn matches_action(&self, key: &str) -> bool {
        match self.action.as_deref() {
            None | Some(WILDCARD) => true,
            Some(action) => action == key,
        }
    }

    pub fn matches_response(&self, key: &str) -> bool {
        match self.response.as_deref() {
            None | Some(WILDCARD) => true,
            Some(response) => response == key,
        }
    }
}

/// A state definition within a scenario.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Dynamic<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Dynamic<String>>,
    /// Per-actor instructions shown while the state is current.
    #[serde(default, skip_serializing_if = "KeyMap::is_empty")]
    pub instructions: KeyMap<Dynamic<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<StateTransition>,
    /// ISO-8601 duration after which the state is overdue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default)]
    pub display: DisplayMode,
}

impl State {
    /// Ordered, de-duplicated action keys referenced by this state's
    /// transitions. The wildcard is not an action.
    pub fn action_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for transition in &self.transitions {
            if let Some(action) = transition.action.as_deref() {
                if action != WILDCARD && !keys.iter().any(|k| k == action) {
                    keys.push(action.to_string());
                }
            }
        }
        keys
    }
}

/// An immutable workflow blueprint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Actor shapes (JSON-Schema-like), keyed by actor key. Shape
    /// validation is a host concern; the model carries them opaquely.
    #[serde(default, skip_serializing_if = "KeyMap::is_empty")]
    pub actors: KeyMap<serde_json::Value>,
    #[serde(default, skip_serializing_if = "KeyMap::is_empty")]
    pub actions: KeyMap<Action>,
    #[serde(default)]
    pub states: KeyMap<State>,
    #[serde(default, skip_serializing_if = "KeyMap::is_empty")]
    pub assets: KeyMap<serde_json::Value>,
    #[serde(default, skip_serializing_if = "KeyMap::is_empty")]
    pub definitions: KeyMap<serde_json::Value>,
    /// Action keys invocable from any state.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_actions: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl Scenario {
    /// Load a scenario from its wire shape, regenerating the implicit
    /// terminal states.
    pub fn from_data(data: serde_json::Value) -> Result<Scenario, ModelError> {
        let mut scenario: Scenario =
            serde_json::from_value(data).map_err(ModelError::invalid_data)?;
        scenario.ensure_implicit_states();
        Ok(scenario)
    }

    /// Serialize to the wire shape. The implicit terminal states are
    /// omitted; `:initial` is always present.
    pub fn to_data(&self) -> serde_json::Value {
        let mut data = serde_json::to_value(self).unwrap_or_default();
        if let Some(states) = data.get_mut("states").and_then(|s| s.as_object_mut()) {
            for key in TERMINAL_STATES {
                states.remove(key);
            }
        }
        data
    }

    /// Insert any missing implicit terminal states.
    pub fn ensure_implicit_states(&mut self) {
        for key in TERMINAL_STATES {
            if !self.states.contains_key(key) {
                self.states.insert(key, State::default());
            }
        }
    }

    pub fn get_state(&self, key: &str) -> Result<&State, ModelError> {
        self.states.get(key).ok_or_else(|| ModelError::UnknownState {
            key: key.to_string(),
        })
    }

    pub fn get_action(&self, key: &str) -> Result<&Action, ModelError> {
        self.actions
            .get(key)
            .ok_or_else(|| ModelError::UnknownAction {
                key: key.to_string(),
            })
    }

    /// Structural validation: required states, terminal states without
    /// actions, response defaults, and referential integrity of
    /// transitions.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::ok();

        if !self.states.contains_key(INITIAL_STATE) {
            result.add("states", format!("scenario must declare an '{INITIAL_STATE}' state"));
        }
        for key in TERMINAL_STATES {
            if let Some(state) = self.states.get(key) {
                if !state.transitions.is_empty() {
                    result.add(
                        format!("states.{key}"),
                        "terminal states must not declare transitions",
                    );
                }
            }
        }

        for (key, action) in self.actions.iter() {
            if !action.responses.contains_key(&action.default_response) {
                result.add(
                    format!("actions.{key}"),
                    format!(
                        "action '{}' must declare its default response '{}'",
                        key, action.default_response
                    ),
                );
            }
        }

        for (state_key, state) in self.states.iter() {
            for (index, transition) in state.transitions.iter().enumerate() {
                let field = format!("states.{state_key}.transitions.{index}");
                if !self.states.contains_key(&transition.target) {
                    result.add(
                        field.as_str(),
                        format!("unknown target state '{}'", transition.target),
                    );
                }
                if let Some(action) = transition.action.as_deref() {
                    if action != WILDCARD && !self.actions.contains_key(action) {
                        result.add(field.as_str(), format!("unknown action '{action}'"));
                    }
                }
            }
        }

        for key in &self.allow_actions {
            if !self.actions.contains_key(key) {
                result.add("allow_actions", format!("unknown action '{key}'"));
            }
        }

        result
    }
}
