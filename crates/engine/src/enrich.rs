//! The enrichment boundary: resolving deferred expressions against a
//! process.
//!
//! The expression runtime itself is external (host-provided); the engine
//! consumes it through [`Enricher`] and never interprets expression text
//! beyond spotting the acting-actor reference.

use serde::de::DeserializeOwned;

use waymark_model::{Dynamic, Process};

/// Marker an expression uses to refer to the actor it is being evaluated
/// for. Conditions mentioning it are evaluated once per candidate actor.
pub const ACTOR_REF: &str = "current.actor";

/// A failure raised by the external expression evaluator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to evaluate '{expr}': {message}")]
pub struct EnrichError {
    pub expr: String,
    pub message: String,
}

impl EnrichError {
    pub fn new(expr: impl Into<String>, message: impl Into<String>) -> Self {
        EnrichError {
            expr: expr.into(),
            message: message.into(),
        }
    }
}

/// The external condition/expression evaluator.
///
/// Assumed synchronous and side-effect-free; the simulator's clone
/// isolation is the only protection if it is not.
pub trait Enricher: Send + Sync {
    /// Resolve an expression against the process.
    fn evaluate(&self, expr: &str, process: &Process) -> Result<serde_json::Value, EnrichError>;

    /// Resolve an expression with a specific actor bound as the acting
    /// actor. Defaults to plain evaluation for runtimes without actor
    /// context.
    fn evaluate_for_actor(
        &self,
        expr: &str,
        process: &Process,
        actor_key: &str,
    ) -> Result<serde_json::Value, EnrichError> {
        let _ = actor_key;
        self.evaluate(expr, process)
    }
}

/// JSON truthiness as conditions use it: `null`, `false`, `0`, empty
/// strings and empty containers are falsy.
pub fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::Object(map) => !map.is_empty(),
    }
}

/// Resolve a dynamic value into its concrete type.
pub fn resolve<T: DeserializeOwned + Clone>(
    value: &Dynamic<T>,
    enricher: &dyn Enricher,
    process: &Process,
) -> Result<T, EnrichError> {
    match value {
        Dynamic::Value(v) => Ok(v.clone()),
        Dynamic::Expr(expr) => {
            let raw = enricher.evaluate(expr, process)?;
            serde_json::from_value(raw).map_err(|e| EnrichError::new(expr, e.to_string()))
        }
    }
}

/// Resolve an optional dynamic value.
pub fn resolve_opt<T: DeserializeOwned + Clone>(
    value: &Option<Dynamic<T>>,
    enricher: &dyn Enricher,
    process: &Process,
) -> Result<Option<T>, EnrichError> {
    match value {
        Some(v) => resolve(v, enricher, process).map(Some),
        None => Ok(None),
    }
}

/// Resolve a condition, applying truthiness to expression results.
pub fn resolve_condition(
    condition: &Dynamic<bool>,
    enricher: &dyn Enricher,
    process: &Process,
) -> Result<bool, EnrichError> {
    match condition {
        Dynamic::Value(b) => Ok(*b),
        Dynamic::Expr(expr) => Ok(truthy(&enricher.evaluate(expr, process)?)),
    }
}
