//! Stepping a process: validating a submitted response against the
//! current state, expanding it, and handing it to the updater.

use std::sync::Arc;

use serde_json::json;
use time::OffsetDateTime;

use waymark_model::{Process, Response, ValidationResult};

use crate::enrich::Enricher;
use crate::error::EngineError;
use crate::hook::{Event, EventHook};
use crate::instantiate::action_allows;
use crate::update::ProcessUpdater;

/// Accepts responses on behalf of a process.
///
/// Rejections are accumulated into a [`ValidationResult`] and never
/// mutate the process; only a response that passes every check reaches
/// the updater.
#[derive(Clone)]
pub struct ProcessStepper {
    updater: ProcessUpdater,
    hook: Arc<dyn EventHook>,
}

impl ProcessStepper {
    pub fn new(updater: ProcessUpdater, hook: Arc<dyn EventHook>) -> Self {
        ProcessStepper { updater, hook }
    }

    /// Submit a skeletal response. On success the process has moved (or
    /// recorded the response in place) and the result is clean; a failed
    /// result lists every reason the response was refused.
    pub fn step(
        &self,
        process: &mut Process,
        response: Response,
    ) -> Result<ValidationResult, EngineError> {
        let result = self.check(process, &response);
        if result.failed() {
            tracing::debug!(
                process = %process.id,
                action = %response.action.key,
                "response refused: {result:?}"
            );
            return Ok(result);
        }

        let expanded = self.expand(process, response)?;
        let payload = json!({
            "process": process.id,
            "state": process.current.key,
            "action": expanded.action.key,
            "response": expanded.key,
            "actor": expanded.actor.key,
        });

        process.current.response = Some(expanded);
        let result = self.updater.update(process)?;
        if result.succeeded() {
            self.hook.dispatch(Event::Step, payload);
        }
        Ok(result)
    }

    fn check(&self, process: &Process, response: &Response) -> ValidationResult {
        let mut result = ValidationResult::ok();
        let action_key = response.action.key.as_str();
        let actor_key = response.actor.key.as_str();

        let definition = process.scenario.get_action(action_key).ok();
        if definition.is_none() {
            result.add("action", format!("unknown action '{action_key}'"));
        }

        let instantiated = process.current.actions.get(action_key);
        if definition.is_some() && instantiated.is_none() {
            result.add(
                "action",
                format!(
                    "action '{}' is not allowed in state '{}'",
                    action_key, process.current.key
                ),
            );
        }

        if process.get_actor(actor_key).is_err() {
            result.add("actor", format!("unknown actor '{actor_key}'"));
        } else if let Some(action) = instantiated {
            if !action_allows(action, actor_key) {
                result.add(
                    "actor",
                    format!("actor '{actor_key}' may not perform action '{action_key}'"),
                );
            }
        }

        if let Some(definition) = definition {
            if !definition.responses.is_empty() && !definition.responses.contains_key(&response.key)
            {
                result.add(
                    "response",
                    format!(
                        "invalid response '{}' for action '{}'",
                        response.key, action_key
                    ),
                );
            }
        }

        result
    }

    /// Fill in the definition-derived parts of a skeletal response. Only
    /// called after `check` passed, so the lookups cannot miss.
    fn expand(&self, process: &Process, mut response: Response) -> Result<Response, EngineError> {
        let action = process
            .current
            .actions
            .get(&response.action.key)
            .cloned()
            .unwrap_or_default();

        response.action.title = flatten(&action.title);
        response.action.label = flatten(&action.label);
        response.action.description = flatten(&action.description);

        if let Some(available) = action.responses.get(&response.key) {
            response.title = flatten(&available.title);
            response.display = available.display;
        }

        if let Ok(actor) = process.get_actor(&response.actor.key) {
            response.actor.detail = actor.clone();
        }

        if response.timestamp.is_none() {
            response.timestamp = Some(OffsetDateTime::now_utc());
        }

        Ok(response)
    }
}

/// An instantiated dynamic string, if it resolved to a value.
fn flatten(value: &Option<waymark_model::Dynamic<String>>) -> Option<String> {
    value.as_ref().and_then(|d| d.value().cloned())
}

/// Builds the standard stepper wiring from its collaborators.
pub fn stepper(
    enricher: Arc<dyn Enricher>,
    patcher: crate::patch::DataPatcher,
    hook: Arc<dyn EventHook>,
) -> ProcessStepper {
    let updater = ProcessUpdater::new(enricher, patcher, hook.clone());
    ProcessStepper::new(updater, hook)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::hook::NoopHook;
    use crate::instantiate::StateInstantiator;
    use crate::patch::{DataPatcher, PathRuntime};
    use crate::testutil::{golden_process, DotRuntime, TableEnricher};

    fn test_stepper() -> ProcessStepper {
        let enricher: Arc<dyn Enricher> = Arc::new(TableEnricher::default());
        let runtime: Arc<dyn PathRuntime> = Arc::new(DotRuntime);
        stepper(enricher, DataPatcher::new(runtime), Arc::new(NoopHook))
    }

    fn ready_process() -> Process {
        let mut process = golden_process();
        let states = StateInstantiator::new(Arc::new(TableEnricher::default()));
        process.current = states.instantiate(":initial", &process).unwrap();
        process
    }

    #[test]
    fn happy_path_to_success() {
        let mut process = ready_process();
        let stepper = test_stepper();

        let result = stepper
            .step(
                &mut process,
                Response::new("first", None, "client", serde_json::Value::Null),
            )
            .unwrap();
        assert!(result.succeeded());
        assert_eq!(process.current.key, "basic_step");

        let result = stepper
            .step(
                &mut process,
                Response::new("second", None, "manager", serde_json::Value::Null),
            )
            .unwrap();
        assert!(result.succeeded());
        assert_eq!(process.current.key, ":success");
        assert_eq!(process.previous.len(), 2);
        assert!(process.next.is_empty());
    }

    #[test]
    fn committed_responses_carry_their_definition_fields() {
        let mut process = ready_process();
        test_stepper()
            .step(
                &mut process,
                Response::new("first", None, "client", serde_json::Value::Null),
            )
            .unwrap();

        let recorded = &process.previous[0];
        assert_eq!(recorded.action.title.as_deref(), Some("First step"));
        assert_eq!(recorded.actor.detail.title.as_deref(), Some("Client"));
        assert!(recorded.timestamp.is_some());
    }

    #[test]
    fn rejections_accumulate_every_failure() {
        let mut process = ready_process();
        let result = test_stepper()
            .step(
                &mut process,
                Response::new("second", Some("bogus"), "stranger", serde_json::Value::Null),
            )
            .unwrap();
        assert!(result.failed());
        let messages: Vec<&str> = result.errors().iter().map(|e| e.message.as_str()).collect();
        assert!(messages
            .iter()
            .any(|m| m.contains("is not allowed in state ':initial'")));
        assert!(messages.iter().any(|m| m.contains("unknown actor 'stranger'")));
        assert!(messages
            .iter()
            .any(|m| m.contains("invalid response 'bogus'")));
        // Nothing was mutated.
        assert_eq!(process.current.key, ":initial");
        assert!(process.previous.is_empty());
        assert!(process.current.response.is_none());
    }

    #[test]
    fn unknown_action_is_refused_outright() {
        let mut process = ready_process();
        let result = test_stepper()
            .step(
                &mut process,
                Response::new("vanish", None, "client", serde_json::Value::Null),
            )
            .unwrap();
        assert!(result.failed());
        assert_eq!(result.errors().len(), 1);
        assert!(result.errors()[0].message.contains("unknown action 'vanish'"));
    }

    #[test]
    fn unknown_action_and_actor_are_both_reported() {
        let mut process = ready_process();
        let result = test_stepper()
            .step(
                &mut process,
                Response::new("vanish", None, "stranger", serde_json::Value::Null),
            )
            .unwrap();
        assert!(result.failed());
        let messages: Vec<&str> = result.errors().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().any(|m| m.contains("unknown action 'vanish'")));
        assert!(messages
            .iter()
            .any(|m| m.contains("unknown actor 'stranger'")));
    }

    #[test]
    fn ineligible_actor_is_refused() {
        let mut process = ready_process();
        let stepper = test_stepper();
        stepper
            .step(
                &mut process,
                Response::new("first", None, "client", serde_json::Value::Null),
            )
            .unwrap();

        // "second" is reserved for the manager.
        let result = stepper
            .step(
                &mut process,
                Response::new("second", None, "client", serde_json::Value::Null),
            )
            .unwrap();
        assert!(result.failed());
        assert!(result.errors()[0]
            .message
            .contains("actor 'client' may not perform action 'second'"));
    }
}
