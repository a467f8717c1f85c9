//! Golden-flow prediction: walking the scenario graph forward from the
//! process's current state, assuming every state resolves through its
//! default action and default response.
//!
//! The walk operates on a clone of the process; nothing it does is
//! observable on the original. Evaluation failures are soft: they stop
//! the walk and leave a note, never an error.

use std::collections::BTreeSet;
use std::sync::Arc;

use waymark_model::{Action, NextState, Process, StateTransition, TERMINAL_STATES};

use crate::enrich::{resolve_condition, resolve_opt, Enricher};
use crate::instantiate::{eligible_actors, state_action_defs, ActionInstantiator};
use crate::transition::match_transition;

/// The outcome of a simulation: the predicted chain of states and any
/// notes about where prediction had to give up.
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    pub next: Vec<NextState>,
    pub notes: Vec<String>,
}

/// Predicts the remaining flow of a process.
#[derive(Clone)]
pub struct ProcessSimulator {
    enricher: Arc<dyn Enricher>,
    actions: ActionInstantiator,
}

impl ProcessSimulator {
    pub fn new(enricher: Arc<dyn Enricher>) -> Self {
        let actions = ActionInstantiator::new(enricher.clone());
        ProcessSimulator { enricher, actions }
    }

    /// Walk forward from the current state until a terminal state, a
    /// dead end, a revisit, or an evaluation failure.
    pub fn simulate(&self, process: &Process) -> Simulation {
        let process = process.clone();
        let scenario = process.scenario.clone();

        let mut simulation = Simulation::default();
        let mut visited: BTreeSet<String> = BTreeSet::new();
        visited.insert(process.current.key.clone());

        let mut state_key = process.current.key.clone();
        loop {
            let state = match scenario.get_state(&state_key) {
                Ok(state) => state,
                Err(e) => {
                    simulation.note(&state_key, e);
                    break;
                }
            };
            if TERMINAL_STATES.contains(&state_key.as_str()) {
                break;
            }

            // The default action is the first available one in scenario
            // declaration order.
            let mut default_action: Option<(&str, Action)> = None;
            let mut halted = false;
            for (key, definition) in state_action_defs(&scenario, state) {
                match self.actions.instantiate_one(definition, &process) {
                    Ok(Some(action)) => {
                        default_action = Some((key, action));
                        break;
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        simulation.note(&state_key, e);
                        halted = true;
                        break;
                    }
                }
            }
            if halted {
                break;
            }
            let (action_key, action) = match default_action {
                Some(found) => found,
                // No action available: the process waits here.
                None => break,
            };
            if let Some(entry) = simulation.next.last_mut() {
                if entry.key == state_key {
                    entry.actors = eligible_actors(&action, &process);
                }
            }

            let mut transitions: Vec<StateTransition> = Vec::new();
            for transition in &state.transitions {
                let mut resolved = transition.clone();
                match resolve_condition(&transition.condition, self.enricher.as_ref(), &process) {
                    Ok(value) => {
                        resolved.condition = waymark_model::Dynamic::Value(value);
                    }
                    Err(e) => {
                        simulation.note(&state_key, e);
                        halted = true;
                        break;
                    }
                }
                transitions.push(resolved);
            }
            if halted {
                break;
            }

            let target =
                match match_transition(&transitions, action_key, &action.default_response) {
                    Some(transition) => transition.target.clone(),
                    None => break,
                };

            if !visited.insert(target.clone()) {
                break;
            }

            let target_state = match scenario.get_state(&target) {
                Ok(state) => state,
                Err(e) => {
                    simulation.note(&state_key, e);
                    break;
                }
            };
            let title = match resolve_opt(&target_state.title, self.enricher.as_ref(), &process) {
                Ok(title) => title,
                Err(e) => {
                    simulation.note(&target, e);
                    break;
                }
            };
            let description =
                match resolve_opt(&target_state.description, self.enricher.as_ref(), &process) {
                    Ok(description) => description,
                    Err(e) => {
                        simulation.note(&target, e);
                        break;
                    }
                };
            simulation.next.push(NextState {
                key: target.clone(),
                title,
                description,
                duration: target_state.timeout.clone(),
                actors: Vec::new(),
            });
            state_key = target;
        }

        simulation
    }
}

impl Simulation {
    fn note(&mut self, state_key: &str, cause: impl std::fmt::Display) {
        let message = format!("prediction stopped at state '{state_key}': {cause}");
        tracing::warn!(state = state_key, "{message}");
        self.notes.push(message);
    }
}
