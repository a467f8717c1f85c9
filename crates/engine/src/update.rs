//! Committing a response to a process: apply its update instructions,
//! re-validate, and resolve the resulting transition.

use std::sync::Arc;

use serde_json::json;
use waymark_model::{Process, ValidationResult};

use crate::enrich::Enricher;
use crate::error::EngineError;
use crate::hook::{Event, EventHook};
use crate::instantiate::StateInstantiator;
use crate::patch::DataPatcher;
use crate::simulate::ProcessSimulator;
use crate::transition::match_transition;

/// Applies the pending response of a process.
///
/// Patches are applied before validation and never rolled back: when
/// validation fails the caller gets a failed result and must discard the
/// mutated process instead of persisting it.
#[derive(Clone)]
pub struct ProcessUpdater {
    patcher: DataPatcher,
    states: StateInstantiator,
    simulator: ProcessSimulator,
    hook: Arc<dyn EventHook>,
}

impl ProcessUpdater {
    pub fn new(
        enricher: Arc<dyn Enricher>,
        patcher: DataPatcher,
        hook: Arc<dyn EventHook>,
    ) -> Self {
        ProcessUpdater {
            patcher,
            states: StateInstantiator::new(enricher.clone()),
            simulator: ProcessSimulator::new(enricher),
            hook,
        }
    }

    /// Commit `process.current.response`.
    ///
    /// Returns the validation outcome; a failed result means the process
    /// was left mid-update and must not be persisted. Errors are reserved
    /// for evaluation and lookup failures.
    pub fn update(&self, process: &mut Process) -> Result<ValidationResult, EngineError> {
        let response = process
            .current
            .response
            .clone()
            .ok_or_else(|| EngineError::invalid_argument("process has no response to commit"))?;

        let scenario = process.scenario.clone();
        let action_key = response.action.key.clone();
        let definition = scenario.get_action(&action_key)?;

        // Refresh eligibility before touching any data, so an enrichment
        // failure aborts with the process unmodified.
        self.states.recalc_actions(process)?;

        if let Some(available) = definition.responses.get(&response.key) {
            for instruction in &available.update {
                self.patcher.apply(process, instruction, &response.data)?;
            }
        }

        let result = process.validate();
        if result.failed() {
            tracing::debug!(
                process = %process.id,
                action = %action_key,
                "response rejected by validation"
            );
            self.refresh_next(process);
            return Ok(result);
        }

        self.hook.dispatch(
            Event::Update,
            json!({
                "process": process.id,
                "action": action_key,
                "response": response.key,
            }),
        );

        // Patches may have shifted transition conditions.
        self.states.recalc_transitions(process)?;

        let target = match_transition(&process.current.transitions, &action_key, &response.key)
            .map(|transition| transition.target.clone());

        process.previous.push(response);
        match target {
            Some(state_key) => {
                tracing::debug!(
                    process = %process.id,
                    from = %process.current.key,
                    to = %state_key,
                    "state transition"
                );
                process.current = self.states.instantiate(&state_key, process)?;
            }
            // No transition matched: the response is recorded and the
            // process stays put.
            None => {
                process.current.response = None;
            }
        }

        self.refresh_next(process);
        Ok(ValidationResult::ok())
    }

    fn refresh_next(&self, process: &mut Process) {
        process.next = self.simulator.simulate(process).next;
    }
}
