//! Deferred-expression values (data instructions).
//!
//! Scenario definitions may place an expression wherever a value is
//! expected -- a title, a condition, an actor list. On the wire such a
//! placeholder is an object whose single key starts with `<`, for example
//! `{"<eval>": "assets.quote.total"}`. The engine resolves these against
//! the process through its injected evaluator before use; the model only
//! distinguishes "known value" from "expression to resolve".

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A value that is either known statically or computed against the
/// process at instantiation time.
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic<T> {
    /// A plain, final value.
    Value(T),
    /// An expression to be resolved by the external evaluator. Never
    /// itself a final value.
    Expr(String),
}

impl<T> Dynamic<T> {
    /// The resolved value, if this is not a deferred expression.
    pub fn value(&self) -> Option<&T> {
        match self {
            Dynamic::Value(v) => Some(v),
            Dynamic::Expr(_) => None,
        }
    }

    /// The deferred expression, if any.
    pub fn expr(&self) -> Option<&str> {
        match self {
            Dynamic::Value(_) => None,
            Dynamic::Expr(e) => Some(e),
        }
    }

    pub fn is_expr(&self) -> bool {
        matches!(self, Dynamic::Expr(_))
    }
}

impl<T: Default> Default for Dynamic<T> {
    fn default() -> Self {
        Dynamic::Value(T::default())
    }
}

/// Serde default for conditions: absent means `true`.
pub fn truth() -> Dynamic<bool> {
    Dynamic::Value(true)
}

impl<T: Serialize> Serialize for Dynamic<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Dynamic::Value(v) => v.serialize(serializer),
            Dynamic::Expr(e) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("<eval>", e)?;
                map.end()
            }
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Dynamic<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if let serde_json::Value::Object(map) = &raw {
            if map.len() == 1 {
                if let Some((key, value)) = map.iter().next() {
                    if key.starts_with('<') {
                        let expr = value.as_str().ok_or_else(|| {
                            serde::de::Error::custom(format!(
                                "instruction '{key}' must hold a string expression"
                            ))
                        })?;
                        return Ok(Dynamic::Expr(expr.to_string()));
                    }
                }
            }
        }
        let value = T::deserialize(raw).map_err(serde::de::Error::custom)?;
        Ok(Dynamic::Value(value))
    }
}
