//! Generic JSON patch/merge over process data.
//!
//! Update instructions address the process through dot-paths
//! (`assets.quote.total`). The first segment picks the owning process
//! field; typed containers (actors) are patched through a value
//! round-trip so that declared fields and dynamic properties behave
//! uniformly.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use waymark_model::{KeyMap, Process, UpdateInstruction};

use crate::error::EngineError;

/// The external JMESPath runtime, consumed as a callable.
pub trait PathRuntime: Send + Sync {
    /// Apply an expression to the data, returning the projected value.
    fn project(&self, expr: &str, data: &Value) -> Result<Value, ProjectionError>;
}

/// A syntax or runtime failure from the path runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("projection '{expr}' failed: {message}")]
pub struct ProjectionError {
    pub expr: String,
    pub message: String,
}

impl ProjectionError {
    pub fn new(expr: impl Into<String>, message: impl Into<String>) -> Self {
        ProjectionError {
            expr: expr.into(),
            message: message.into(),
        }
    }
}

/// Applies update instructions to a process. Pure and stateless apart
/// from the injected path runtime.
#[derive(Clone)]
pub struct DataPatcher {
    runtime: Arc<dyn PathRuntime>,
}

impl DataPatcher {
    pub fn new(runtime: Arc<dyn PathRuntime>) -> Self {
        DataPatcher { runtime }
    }

    /// Project data through the path runtime.
    pub fn project(&self, expr: &str, data: &Value) -> Result<Value, EngineError> {
        Ok(self.runtime.project(expr, data)?)
    }

    /// Apply a single update instruction. The data is the instruction's
    /// explicit value when present, else the response payload; an
    /// optional projection is applied before the set.
    pub fn apply(
        &self,
        process: &mut Process,
        instruction: &UpdateInstruction,
        payload: &Value,
    ) -> Result<(), EngineError> {
        let mut data = match &instruction.data {
            Some(value) => value.clone(),
            None => payload.clone(),
        };
        if let Some(expr) = &instruction.projection {
            data = self.project(expr, &data)?;
        }
        self.set_on_process(process, &instruction.select, data, instruction.patch)
    }

    /// Set a value at a dot-path into the process.
    pub fn set_on_process(
        &self,
        process: &mut Process,
        selector: &str,
        value: Value,
        patch: bool,
    ) -> Result<(), EngineError> {
        let segments: Vec<&str> = selector.split('.').filter(|s| !s.is_empty()).collect();
        let Some((&head, rest)) = segments.split_first() else {
            return Err(EngineError::invalid_argument("empty selector"));
        };

        match head {
            "title" => match value {
                Value::String(title) => {
                    process.title = title;
                    Ok(())
                }
                Value::Null => {
                    process.title = String::new();
                    Ok(())
                }
                other => Err(EngineError::invalid_argument(format!(
                    "process title must be a string, got {other}"
                ))),
            },
            "actors" => set_in_key_map(&mut process.actors, rest, value, patch),
            "assets" => set_in_key_map(&mut process.assets, rest, value, patch),
            "definitions" => set_in_key_map(&mut process.definitions, rest, value, patch),
            "meta" => {
                set_in_value(&mut process.meta, rest, value, patch);
                Ok(())
            }
            other => Err(EngineError::invalid_argument(format!(
                "process field '{other}' cannot be patched"
            ))),
        }
    }

    /// Replace or merge at a path inside a plain JSON value.
    pub fn set(&self, target: &mut Value, selector: &str, value: Value, patch: bool) {
        let segments: Vec<&str> = selector.split('.').filter(|s| !s.is_empty()).collect();
        set_in_value(target, &segments, value, patch);
    }
}

/// Patch an entry of a typed ordered map through a value round-trip.
///
/// The round-trip is what gives declared fields their "unset to implicit
/// default" behavior on `null`, while dynamic keys are removed outright.
fn set_in_key_map<T: Serialize + DeserializeOwned>(
    map: &mut KeyMap<T>,
    segments: &[&str],
    value: Value,
    patch: bool,
) -> Result<(), EngineError> {
    let Some((&key, rest)) = segments.split_first() else {
        // Addressing the whole container: replace it outright.
        if patch {
            return Err(EngineError::invalid_argument(
                "cannot merge into a container without a key",
            ));
        }
        *map = serde_json::from_value(value)
            .map_err(|e| EngineError::invalid_argument(e.to_string()))?;
        return Ok(());
    };

    if rest.is_empty() && value.is_null() && !patch {
        map.remove(key);
        return Ok(());
    }

    let mut entry = match map.get(key) {
        Some(existing) => serde_json::to_value(existing)
            .map_err(|e| EngineError::invalid_argument(e.to_string()))?,
        None => Value::Null,
    };
    set_in_value(&mut entry, rest, value, patch);
    let typed: T = serde_json::from_value(entry)
        .map_err(|e| EngineError::invalid_argument(e.to_string()))?;
    map.insert(key, typed);
    Ok(())
}

/// Walk to the addressed slot, autocreating intermediate objects, then
/// replace or merge.
fn set_in_value(root: &mut Value, segments: &[&str], value: Value, patch: bool) {
    let Some((&last, parents)) = segments.split_last() else {
        if patch {
            merge(root, value);
        } else {
            *root = value;
        }
        return;
    };

    let mut cursor = root;
    for segment in parents {
        cursor = object_entry(cursor, segment);
    }

    if value.is_null() && !patch {
        if let Value::Object(map) = cursor {
            map.remove(last);
        }
        return;
    }
    let slot = object_entry(cursor, last);
    if patch {
        merge(slot, value);
    } else {
        *slot = value;
    }
}

/// Entry into an object, coercing non-objects into fresh objects.
fn object_entry<'a>(value: &'a mut Value, key: &str) -> &'a mut Value {
    if !value.is_object() {
        *value = Value::Object(serde_json::Map::new());
    }
    match value {
        Value::Object(map) => map.entry(key.to_string()).or_insert(Value::Null),
        other => other,
    }
}

/// The merge algorithm used when an update instruction sets `patch`.
///
/// An empty or sequential target treats the value as a new element; a
/// map target merges an incoming map key-by-key, with `null` removing
/// the key; everything else replaces the target wholesale.
pub(crate) fn merge(target: &mut Value, value: Value) {
    match (target, value) {
        (slot @ Value::Null, value) => *slot = Value::Array(vec![value]),
        (Value::Array(items), value) => items.push(value),
        (Value::Object(map), Value::Object(incoming)) => {
            for (key, item) in incoming {
                if item.is_null() {
                    map.remove(&key);
                } else if let Some(slot) = map.get_mut(&key) {
                    merge(slot, item);
                } else {
                    map.insert(key, item);
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
