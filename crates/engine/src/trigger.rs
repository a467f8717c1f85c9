//! Automated actions: producing responses on behalf of a process
//! without a human actor submitting them.
//!
//! Handlers are registered per scenario schema (or for every schema)
//! and asked in order; the first one that produces a response wins. A
//! handler failure never propagates as an error: it becomes an
//! `error`-keyed response so the failure is recorded in the process
//! history like any other outcome.

use std::sync::Arc;

use serde_json::json;

use waymark_model::{Process, Response, ValidationError};

use crate::error::EngineError;
use crate::hook::{Event, EventHook};
use crate::instantiate::{action_allows, eligible_actors};

/// What a trigger handler did with an invocation.
pub enum TriggerOutcome {
    /// The handler performed the action and produced this response.
    Response(Response),
    /// Not this handler's job; ask the next one.
    Unhandled,
}

/// An automation backend capable of performing actions.
pub trait TriggerHandler: Send + Sync {
    fn invoke(
        &self,
        process: &Process,
        action_key: &str,
        actor_key: &str,
    ) -> Result<TriggerOutcome, Box<dyn std::error::Error + Send + Sync>>;
}

/// Dispatches trigger invocations to registered handlers.
#[derive(Clone, Default)]
pub struct TriggerManager {
    handlers: Vec<(Option<String>, Arc<dyn TriggerHandler>)>,
    hook: Option<Arc<dyn EventHook>>,
}

impl TriggerManager {
    pub fn new() -> Self {
        TriggerManager::default()
    }

    /// Immutable builder: a copy with the handler registered. A `None`
    /// schema matches every scenario.
    pub fn with(&self, schema: Option<&str>, handler: Arc<dyn TriggerHandler>) -> TriggerManager {
        let mut handlers = self.handlers.clone();
        handlers.push((schema.map(str::to_string), handler));
        TriggerManager {
            handlers,
            hook: self.hook.clone(),
        }
    }

    pub fn with_hook(&self, hook: Arc<dyn EventHook>) -> TriggerManager {
        TriggerManager {
            handlers: self.handlers.clone(),
            hook: Some(hook),
        }
    }

    /// Invoke an action on the process.
    ///
    /// With no action given, the state's default action (the first one
    /// currently available) is used; with no actor given, the first
    /// eligible actor acts. Returns `None` when no handler claims the
    /// invocation.
    pub fn invoke(
        &self,
        process: &Process,
        action_key: Option<&str>,
        actor_key: Option<&str>,
    ) -> Result<Option<Response>, EngineError> {
        let action_key = match action_key {
            Some(key) => key.to_string(),
            None => match process.current.actions.keys().next() {
                Some(key) => key.to_string(),
                None => {
                    return Err(EngineError::invalid_argument(format!(
                        "state '{}' has no action to trigger",
                        process.current.key
                    )))
                }
            },
        };
        let action = process.current.actions.get(&action_key).ok_or_else(|| {
            EngineError::invalid_argument(format!(
                "action '{}' is not allowed in state '{}'",
                action_key, process.current.key
            ))
        })?;

        let actor_key = match actor_key {
            Some(key) => {
                process.get_actor(key)?;
                if !action_allows(action, key) {
                    return Err(EngineError::invalid_argument(format!(
                        "actor '{key}' may not perform action '{action_key}'"
                    )));
                }
                key.to_string()
            }
            None => eligible_actors(action, process)
                .into_iter()
                .next()
                .ok_or_else(|| {
                    EngineError::invalid_argument(format!(
                        "action '{action_key}' has no eligible actor"
                    ))
                })?,
        };

        if let Some(hook) = &self.hook {
            hook.dispatch(
                Event::Trigger,
                json!({
                    "process": process.id,
                    "action": action_key,
                    "actor": actor_key,
                }),
            );
        }

        for (schema, handler) in &self.handlers {
            if let Some(schema) = schema {
                if *schema != process.scenario.schema {
                    continue;
                }
            }
            match handler.invoke(process, &action_key, &actor_key) {
                Ok(TriggerOutcome::Response(response)) => return Ok(Some(response)),
                Ok(TriggerOutcome::Unhandled) => continue,
                Err(e) => {
                    tracing::warn!(
                        process = %process.id,
                        action = %action_key,
                        "trigger handler failed: {e}"
                    );
                    return Ok(Some(error_response(&action_key, &actor_key, e)));
                }
            }
        }
        Ok(None)
    }
}

/// A response recording a handler failure instead of an outcome.
/// Validation failures additionally carry their field errors.
fn error_response(
    action_key: &str,
    actor_key: &str,
    error: Box<dyn std::error::Error + Send + Sync>,
) -> Response {
    let mut data = json!({"message": error.to_string()});
    if let Some(validation) = error.downcast_ref::<ValidationError>() {
        data["errors"] = serde_json::to_value(&validation.errors).unwrap_or_default();
    }
    Response::new(action_key, Some("error"), actor_key, data)
}
