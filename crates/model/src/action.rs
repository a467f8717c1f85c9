//! Action definitions: operations performable in a state, gated by
//! eligible actors and a condition, yielding one of a declared set of
//! responses.

use serde::{Deserialize, Serialize};

use crate::dynamic::{self, Dynamic};
use crate::key_map::KeyMap;
use crate::scenario::DisplayMode;

/// Response key assumed when none is given.
pub const DEFAULT_RESPONSE: &str = "ok";

fn default_response_key() -> String {
    DEFAULT_RESPONSE.to_string()
}

/// An operation performable in a state.
///
/// `actors` lists the actor keys eligible to perform the action; an empty
/// list means any process actor may. `condition` gates availability and
/// may be a deferred expression -- one referencing the acting actor is
/// evaluated once per candidate actor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Dynamic<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Dynamic<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Dynamic<String>>,
    #[serde(default)]
    pub actors: Dynamic<Vec<String>>,
    #[serde(default = "dynamic::truth")]
    pub condition: Dynamic<bool>,
    #[serde(default)]
    pub responses: KeyMap<AvailableResponse>,
    #[serde(default = "default_response_key")]
    pub default_response: String,
}

/// A response an action may yield, with the update instructions applied
/// to the process when it does.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AvailableResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Dynamic<String>>,
    #[serde(default)]
    pub display: DisplayMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<UpdateInstruction>,
}

/// A declarative patch applied to the process when a response comes in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateInstruction {
    /// Dot-path into the process (e.g. `assets.quote.total`).
    pub select: String,
    /// Explicit value; when absent the response payload is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Optional JMESPath expression applied to the data before use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<String>,
    /// Merge into the target instead of replacing it.
    #[serde(default)]
    pub patch: bool,
}
