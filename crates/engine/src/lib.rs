//! The workflow engine: instantiates processes from scenarios, steps
//! them through responses, and predicts their remaining flow.
//!
//! The engine owns no I/O. Expressions are resolved through a
//! host-provided [`Enricher`], data projections through a
//! [`PathRuntime`], and lifecycle notifications go through an
//! [`EventHook`]; persistence lives in the storage crate.

pub mod enrich;
pub mod error;
pub mod hook;
pub mod instantiate;
pub mod patch;
pub mod simulate;
pub mod step;
pub mod transition;
pub mod trigger;
pub mod update;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;

use serde_json::json;

use waymark_model::{Actor, KeyMap, Process, Response, Scenario, ValidationResult, INITIAL_STATE};

pub use enrich::{truthy, EnrichError, Enricher, ACTOR_REF};
pub use error::EngineError;
pub use hook::{Event, EventHandler, EventHook, HandlerChain, NoopHook};
pub use instantiate::{action_allows, eligible_actors, ActionInstantiator, StateInstantiator};
pub use patch::{DataPatcher, PathRuntime, ProjectionError};
pub use simulate::{ProcessSimulator, Simulation};
pub use step::ProcessStepper;
pub use trigger::{TriggerHandler, TriggerManager, TriggerOutcome};
pub use update::ProcessUpdater;

/// The assembled engine: one enricher, one path runtime, one event
/// hook, shared by every component.
#[derive(Clone)]
pub struct Engine {
    hook: Arc<dyn EventHook>,
    states: StateInstantiator,
    stepper: ProcessStepper,
    simulator: ProcessSimulator,
}

impl Engine {
    pub fn new(enricher: Arc<dyn Enricher>, runtime: Arc<dyn PathRuntime>) -> Engine {
        Engine::assemble(enricher, runtime, Arc::new(NoopHook))
    }

    pub fn with_hook(
        enricher: Arc<dyn Enricher>,
        runtime: Arc<dyn PathRuntime>,
        hook: Arc<dyn EventHook>,
    ) -> Engine {
        Engine::assemble(enricher, runtime, hook)
    }

    fn assemble(
        enricher: Arc<dyn Enricher>,
        runtime: Arc<dyn PathRuntime>,
        hook: Arc<dyn EventHook>,
    ) -> Engine {
        let patcher = DataPatcher::new(runtime);
        let updater = ProcessUpdater::new(enricher.clone(), patcher, hook.clone());
        Engine {
            hook: hook.clone(),
            states: StateInstantiator::new(enricher.clone()),
            stepper: ProcessStepper::new(updater, hook),
            simulator: ProcessSimulator::new(enricher),
        }
    }

    /// Start a process from a scenario.
    ///
    /// The scenario and the assembled process are both validated; either
    /// failing aborts the instantiation.
    pub fn instantiate(
        &self,
        scenario: Arc<Scenario>,
        id: impl Into<String>,
        actors: KeyMap<Actor>,
    ) -> Result<Process, EngineError> {
        scenario.validate().must_succeed()?;

        let mut process = Process {
            id: id.into(),
            schema: scenario.schema.clone(),
            title: scenario.title.clone(),
            scenario,
            actors,
            ..Process::default()
        };
        process.current = self.states.instantiate(INITIAL_STATE, &process)?;
        process.validate().must_succeed()?;
        process.next = self.simulator.simulate(&process).next;

        self.hook.dispatch(
            Event::Instantiate,
            json!({"process": process.id, "scenario": process.scenario.id}),
        );
        tracing::info!(
            process = %process.id,
            scenario = %process.scenario.id,
            "process instantiated"
        );
        Ok(process)
    }

    /// Submit a response to a process. See [`ProcessStepper::step`].
    pub fn step(
        &self,
        process: &mut Process,
        response: Response,
    ) -> Result<ValidationResult, EngineError> {
        self.stepper.step(process, response)
    }

    /// Predict the remaining flow of a process without mutating it.
    pub fn simulate(&self, process: &Process) -> Simulation {
        self.simulator.simulate(process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutil::{golden_scenario, DotRuntime, TableEnricher};

    fn engine() -> Engine {
        Engine::new(Arc::new(TableEnricher::default()), Arc::new(DotRuntime))
    }

    fn actors() -> KeyMap<Actor> {
        let mut actors = KeyMap::new();
        actors.insert(
            "client",
            Actor {
                title: Some("Client".to_string()),
                ..Actor::default()
            },
        );
        actors.insert(
            "manager",
            Actor {
                title: Some("Manager".to_string()),
                ..Actor::default()
            },
        );
        actors
    }

    #[test]
    fn instantiate_starts_at_initial_with_a_prediction() {
        let process = engine()
            .instantiate(Arc::new(golden_scenario()), "proc-9", actors())
            .unwrap();
        assert_eq!(process.current.key, ":initial");
        assert_eq!(process.schema, "https://example.org/scenario/v1");
        let next: Vec<&str> = process.next.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(next, vec!["basic_step", ":success"]);
    }

    #[test]
    fn invalid_scenario_is_rejected() {
        let mut scenario = golden_scenario();
        scenario.states.remove(INITIAL_STATE);
        let err = engine()
            .instantiate(Arc::new(scenario), "proc-9", actors())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn undeclared_actor_is_rejected() {
        let mut extra = actors();
        extra.insert("stranger", Actor::default());
        let err = engine()
            .instantiate(Arc::new(golden_scenario()), "proc-9", extra)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
