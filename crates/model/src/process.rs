//! Running process instances: actors, current state, response history,
//! and the predicted path ahead.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::action::{Action, DEFAULT_RESPONSE};
use crate::error::ModelError;
use crate::key_map::KeyMap;
use crate::scenario::{DisplayMode, Scenario, StateTransition};
use crate::validation::ValidationResult;

/// A participant in a process.
///
/// The declared fields are what the engine itself reads; anything else an
/// actor shape defines rides along in `properties`. Patching a declared
/// field to `null` unsets it to its implicit default, while a `null` on a
/// dynamic property removes the key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Actor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(flatten)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Trimmed embed of the action a response was given for: the definition
/// minus its `responses` and `actors` (stripped to avoid circular bulk).
///
/// Deserializes from either a bare key string or a full object.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ActionRef {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ActionRef {
    pub fn key(key: impl Into<String>) -> Self {
        ActionRef {
            key: key.into(),
            ..ActionRef::default()
        }
    }
}

impl<'de> Deserialize<'de> for ActionRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Full {
            key: String,
            #[serde(default)]
            title: Option<String>,
            #[serde(default)]
            label: Option<String>,
            #[serde(default)]
            description: Option<String>,
        }

        let raw = serde_json::Value::deserialize(deserializer)?;
        if let Some(key) = raw.as_str() {
            return Ok(ActionRef::key(key));
        }
        let full: Full = serde_json::from_value(raw).map_err(serde::de::Error::custom)?;
        Ok(ActionRef {
            key: full.key,
            title: full.title,
            label: full.label,
            description: full.description,
        })
    }
}

/// The actor a response came from: key plus the full actor object once
/// the response has been expanded. Deserializes from a bare key string
/// or a full object.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ActorRef {
    pub key: String,
    #[serde(flatten)]
    pub detail: Actor,
}

impl ActorRef {
    pub fn key(key: impl Into<String>) -> Self {
        ActorRef {
            key: key.into(),
            detail: Actor::default(),
        }
    }
}

impl<'de> Deserialize<'de> for ActorRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if let Some(key) = raw.as_str() {
            return Ok(ActorRef::key(key));
        }
        let key = raw
            .get("key")
            .and_then(|k| k.as_str())
            .unwrap_or_default()
            .to_string();
        let mut raw = raw;
        if let Some(map) = raw.as_object_mut() {
            map.remove("key");
        }
        let detail: Actor = serde_json::from_value(raw).map_err(serde::de::Error::custom)?;
        Ok(ActorRef { key, detail })
    }
}

fn default_response_key() -> String {
    DEFAULT_RESPONSE.to_string()
}

/// The outcome of performing an action.
///
/// Created skeletal by the caller (or a trigger handler), expanded with
/// the full action/response definitions by the stepper, and appended to
/// `previous` once a state commit succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub action: ActionRef,
    #[serde(default = "default_response_key")]
    pub key: String,
    pub actor: ActorRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub display: DisplayMode,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<serde_json::Value>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<OffsetDateTime>,
}

impl Response {
    /// A skeletal response as a caller submits it: keys and payload only.
    pub fn new(
        action: impl Into<String>,
        key: Option<&str>,
        actor: impl Into<String>,
        data: serde_json::Value,
    ) -> Response {
        Response {
            action: ActionRef::key(action),
            key: key.unwrap_or(DEFAULT_RESPONSE).to_string(),
            actor: ActorRef::key(actor),
            title: None,
            display: DisplayMode::default(),
            data,
            receipt: None,
            timestamp: None,
        }
    }
}

/// The live instantiation of a state: enriched fields, the actions
/// currently available (filtered by eligibility), and the response being
/// processed, if any.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CurrentState {
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "KeyMap::is_empty")]
    pub instructions: KeyMap<String>,
    #[serde(default, skip_serializing_if = "KeyMap::is_empty")]
    pub actions: KeyMap<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<StateTransition>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub display: DisplayMode,
    /// The response currently being processed. Transient: set by the
    /// stepper, consumed by the updater.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
}

/// A non-persisted projection of a future state, used only for
/// `process.next`; discarded and recomputed on every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextState {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The raw state timeout, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Actor keys expected to act in this state.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<String>,
}

impl NextState {
    pub fn key(key: impl Into<String>) -> Self {
        NextState {
            key: key.into(),
            title: None,
            description: None,
            duration: None,
            actors: Vec::new(),
        }
    }
}

/// A running instance of a scenario.
///
/// The scenario is shared read-only; the process exclusively owns its
/// `current`, `previous` and `next`. A clone is a fully independent copy
/// (the simulator relies on this).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Process {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,
    #[serde(default)]
    pub title: String,
    pub scenario: Arc<Scenario>,
    #[serde(default, skip_serializing_if = "KeyMap::is_empty")]
    pub actors: KeyMap<Actor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous: Vec<Response>,
    #[serde(default)]
    pub current: CurrentState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next: Vec<NextState>,
    #[serde(default, skip_serializing_if = "KeyMap::is_empty")]
    pub assets: KeyMap<serde_json::Value>,
    #[serde(default, skip_serializing_if = "KeyMap::is_empty")]
    pub definitions: KeyMap<serde_json::Value>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl Process {
    pub fn get_actor(&self, key: &str) -> Result<&Actor, ModelError> {
        self.actors.get(key).ok_or_else(|| ModelError::UnknownActor {
            key: key.to_string(),
        })
    }

    /// Validate the whole process, recursing into every actor.
    ///
    /// Runs after every patch; a failure here aborts the state transition
    /// (the already-applied patch is not rolled back -- the caller must
    /// discard the mutated process).
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::ok();

        if self.id.is_empty() {
            result.add("id", "process id must not be empty");
        }
        if !self.scenario.states.contains_key(&self.current.key) {
            result.add(
                "current",
                format!("state '{}' is not part of the scenario", self.current.key),
            );
        }
        for (key, actor) in self.actors.iter() {
            if !self.scenario.actors.is_empty() && !self.scenario.actors.contains_key(key) {
                result.add(
                    format!("actors.{key}"),
                    format!("actor '{key}' is not defined in the scenario"),
                );
            }
            result.merge(&format!("actors.{key}"), actor.validate());
        }

        result
    }
}

impl Actor {
    /// Shape validation proper is delegated to the host's JSON-Schema
    /// layer; the model only rejects structurally impossible values.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if let Some(identity) = &self.identity {
            if identity.is_empty() {
                result.add("identity", "identity must not be empty");
            }
        }
        result
    }
}
