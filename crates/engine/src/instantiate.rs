//! Instantiating state and action definitions into their live,
//! enriched forms.

use std::sync::Arc;

use time::OffsetDateTime;

use waymark_model::duration::parse_duration;
use waymark_model::{
    Action, CurrentState, Dynamic, KeyMap, Process, Scenario, State, StateTransition,
};

use crate::enrich::{
    resolve, resolve_condition, resolve_opt, truthy, EnrichError, Enricher, ACTOR_REF,
};
use crate::error::EngineError;

/// Whether an actor is eligible for an (instantiated) action. An empty
/// actor list means any process actor may perform it.
pub fn action_allows(action: &Action, actor_key: &str) -> bool {
    match &action.actors {
        Dynamic::Value(actors) => actors.is_empty() || actors.iter().any(|a| a == actor_key),
        // Unresolved expressions never grant eligibility.
        Dynamic::Expr(_) => false,
    }
}

/// The actor keys eligible for an instantiated action, with the empty
/// list expanded to every process actor.
pub fn eligible_actors(action: &Action, process: &Process) -> Vec<String> {
    match &action.actors {
        Dynamic::Value(actors) if actors.is_empty() => {
            process.actors.keys().map(|k| k.to_string()).collect()
        }
        Dynamic::Value(actors) => actors
            .iter()
            .filter(|key| process.actors.contains_key(key))
            .cloned()
            .collect(),
        Dynamic::Expr(_) => Vec::new(),
    }
}

/// Instantiates action definitions against a process: clones them,
/// resolves their dynamic fields, and filters out actions left with no
/// eligible actor.
#[derive(Clone)]
pub struct ActionInstantiator {
    enricher: Arc<dyn Enricher>,
}

impl ActionInstantiator {
    pub fn new(enricher: Arc<dyn Enricher>) -> Self {
        ActionInstantiator { enricher }
    }

    /// Instantiate the given definitions. Operates on clones; the
    /// definitions are untouched.
    pub fn instantiate<'a, I>(
        &self,
        definitions: I,
        process: &Process,
    ) -> Result<KeyMap<Action>, EnrichError>
    where
        I: IntoIterator<Item = (&'a str, &'a Action)>,
    {
        let mut actions = KeyMap::new();
        for (key, definition) in definitions {
            if let Some(action) = self.instantiate_one(definition, process)? {
                actions.insert(key, action);
            }
        }
        Ok(actions)
    }

    pub(crate) fn instantiate_one(
        &self,
        definition: &Action,
        process: &Process,
    ) -> Result<Option<Action>, EnrichError> {
        let enricher = self.enricher.as_ref();
        let mut action = definition.clone();

        action.title = resolve_opt(&definition.title, enricher, process)?
            .map(Dynamic::Value);
        action.label = resolve_opt(&definition.label, enricher, process)?
            .map(Dynamic::Value);
        action.description = resolve_opt(&definition.description, enricher, process)?
            .map(Dynamic::Value);

        let declared: Vec<String> = resolve(&definition.actors, enricher, process)?;

        // A condition referencing the acting actor is evaluated once per
        // candidate actor, dropping those for which it resolves falsy.
        // Any other condition gates the action as a whole.
        match definition.condition.expr() {
            Some(expr) if expr.contains(ACTOR_REF) => {
                let candidates: Vec<String> = if declared.is_empty() {
                    process.actors.keys().map(|k| k.to_string()).collect()
                } else {
                    declared
                };
                let mut remaining = Vec::new();
                for actor_key in candidates {
                    let value = self
                        .enricher
                        .evaluate_for_actor(expr, process, &actor_key)?;
                    if truthy(&value) {
                        remaining.push(actor_key);
                    }
                }
                if remaining.is_empty() {
                    return Ok(None);
                }
                action.actors = Dynamic::Value(remaining);
                action.condition = Dynamic::Value(true);
            }
            _ => {
                if !resolve_condition(&definition.condition, enricher, process)? {
                    return Ok(None);
                }
                action.actors = Dynamic::Value(declared);
                action.condition = Dynamic::Value(true);
            }
        }

        Ok(Some(action))
    }
}

/// Instantiates a state definition into a `CurrentState`: enriches its
/// fields, computes the due date, and populates the available actions.
#[derive(Clone)]
pub struct StateInstantiator {
    enricher: Arc<dyn Enricher>,
    actions: ActionInstantiator,
}

impl StateInstantiator {
    pub fn new(enricher: Arc<dyn Enricher>) -> Self {
        let actions = ActionInstantiator::new(enricher.clone());
        StateInstantiator { enricher, actions }
    }

    /// Instantiate the named scenario state for the process. Any failure
    /// during enrichment is fatal for this call and wrapped with the
    /// state key and process id.
    pub fn instantiate(
        &self,
        state_key: &str,
        process: &Process,
    ) -> Result<CurrentState, EngineError> {
        let scenario = process.scenario.clone();
        let state = scenario.get_state(state_key)?;
        self.build(state_key, state, &scenario, process)
            .map_err(|e| EngineError::Instantiate {
                state: state_key.to_string(),
                process: process.id.clone(),
                message: e.to_string(),
            })
    }

    /// Re-run action enrichment against the process's existing current
    /// state, in place -- actor or asset patches may have changed
    /// eligibility.
    pub fn recalc_actions(&self, process: &mut Process) -> Result<(), EngineError> {
        let scenario = process.scenario.clone();
        let state = scenario.get_state(&process.current.key)?;
        let actions = self
            .actions
            .instantiate(state_action_defs(&scenario, state), process)
            .map_err(|e| self.wrap(&process.current.key, process, e))?;
        process.current.actions = actions;
        Ok(())
    }

    /// Re-resolve the current state's transition conditions in place.
    pub fn recalc_transitions(&self, process: &mut Process) -> Result<(), EngineError> {
        let scenario = process.scenario.clone();
        let state = scenario.get_state(&process.current.key)?;
        let transitions = self
            .enrich_transitions(&state.transitions, process)
            .map_err(|e| self.wrap(&process.current.key, process, e))?;
        process.current.transitions = transitions;
        Ok(())
    }

    fn wrap(&self, state_key: &str, process: &Process, source: EnrichError) -> EngineError {
        EngineError::Instantiate {
            state: state_key.to_string(),
            process: process.id.clone(),
            message: source.to_string(),
        }
    }

    fn build(
        &self,
        state_key: &str,
        state: &State,
        scenario: &Scenario,
        process: &Process,
    ) -> Result<CurrentState, EnrichError> {
        let enricher = self.enricher.as_ref();

        let mut instructions = KeyMap::new();
        for (actor_key, instruction) in state.instructions.iter() {
            instructions.insert(actor_key, resolve(instruction, enricher, process)?);
        }

        let due_date = match &state.timeout {
            Some(timeout) => {
                let duration = parse_duration(timeout)
                    .map_err(|e| EnrichError::new(timeout.clone(), e.to_string()))?;
                Some(OffsetDateTime::now_utc() + duration)
            }
            None => None,
        };

        Ok(CurrentState {
            key: state_key.to_string(),
            title: resolve_opt(&state.title, enricher, process)?,
            description: resolve_opt(&state.description, enricher, process)?,
            instructions,
            actions: self
                .actions
                .instantiate(state_action_defs(scenario, state), process)?,
            transitions: self.enrich_transitions(&state.transitions, process)?,
            due_date,
            display: state.display,
            response: None,
        })
    }

    fn enrich_transitions(
        &self,
        transitions: &[StateTransition],
        process: &Process,
    ) -> Result<Vec<StateTransition>, EnrichError> {
        transitions
            .iter()
            .map(|transition| {
                let mut enriched = transition.clone();
                enriched.condition = Dynamic::Value(resolve_condition(
                    &transition.condition,
                    self.enricher.as_ref(),
                    process,
                )?);
                Ok(enriched)
            })
            .collect()
    }
}

/// The action definitions available in a state: the scenario's actions
/// referenced by the state's transitions plus the scenario-wide
/// `allow_actions`, in scenario declaration order.
pub(crate) fn state_action_defs<'a>(
    scenario: &'a Scenario,
    state: &State,
) -> Vec<(&'a str, &'a Action)> {
    let state_keys = state.action_keys();
    scenario
        .actions
        .iter()
        .filter(|(key, _)| {
            state_keys.iter().any(|k| k == key) || scenario.allow_actions.iter().any(|k| k == key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{golden_process, golden_scenario, TableEnricher};

    #[test]
    fn instantiate_initial_state() {
        let process = golden_process();
        let instantiator = StateInstantiator::new(Arc::new(TableEnricher::default()));
        let current = instantiator.instantiate(":initial", &process).unwrap();
        assert_eq!(current.key, ":initial");
        // :initial only offers "first".
        let keys: Vec<&str> = current.actions.keys().collect();
        assert_eq!(keys, vec!["first"]);
        assert!(current.response.is_none());
    }

    #[test]
    fn due_date_follows_timeout() {
        let mut process = golden_process();
        let mut scenario = (*process.scenario).clone();
        scenario.states.get_mut("basic_step").unwrap().timeout = Some("P1D".to_string());
        process.scenario = Arc::new(scenario);

        let instantiator = StateInstantiator::new(Arc::new(TableEnricher::default()));
        let current = instantiator.instantiate("basic_step", &process).unwrap();
        let due = current.due_date.unwrap();
        let delta = due - OffsetDateTime::now_utc();
        assert!(delta > time::Duration::hours(23));
        assert!(delta <= time::Duration::hours(24));
    }

    #[test]
    fn invalid_timeout_is_wrapped_with_context() {
        let mut process = golden_process();
        let mut scenario = (*process.scenario).clone();
        scenario.states.get_mut("basic_step").unwrap().timeout = Some("whenever".to_string());
        process.scenario = Arc::new(scenario);

        let instantiator = StateInstantiator::new(Arc::new(TableEnricher::default()));
        let err = instantiator.instantiate("basic_step", &process).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("basic_step"));
        assert!(text.contains(&process.id));
    }

    #[test]
    fn expression_fields_resolve_through_the_evaluator() {
        let mut process = golden_process();
        let mut scenario = (*process.scenario).clone();
        scenario.states.get_mut("basic_step").unwrap().title =
            Some(Dynamic::Expr("meta.step_title".to_string()));
        process.scenario = Arc::new(scenario);

        let enricher = TableEnricher::default()
            .with_value("meta.step_title", serde_json::json!("Collect documents"));
        let instantiator = StateInstantiator::new(Arc::new(enricher));
        let current = instantiator.instantiate("basic_step", &process).unwrap();
        assert_eq!(current.title.as_deref(), Some("Collect documents"));
    }

    #[test]
    fn action_condition_false_excludes_it() {
        let mut process = golden_process();
        let mut scenario = (*process.scenario).clone();
        scenario.actions.get_mut("second").unwrap().condition = Dynamic::Value(false);
        process.scenario = Arc::new(scenario);

        let instantiator = StateInstantiator::new(Arc::new(TableEnricher::default()));
        let current = instantiator.instantiate("basic_step", &process).unwrap();
        assert!(!current.actions.contains_key("second"));
        assert!(current.actions.contains_key("alt"));
    }

    #[test]
    fn per_actor_condition_drops_failing_actors() {
        let mut process = golden_process();
        let mut scenario = (*process.scenario).clone();
        scenario.actions.get_mut("alt").unwrap().condition =
            Dynamic::Expr(format!("{ACTOR_REF}.role == 'vip'"));
        process.scenario = Arc::new(scenario);
        process.actors.get_mut("client").unwrap().role = Some("vip".to_string());

        let enricher = TableEnricher::default().with_actor_rule(|_expr, process, actor| {
            let role = process
                .actors
                .get(actor)
                .and_then(|a| a.role.as_deref())
                .unwrap_or_default();
            serde_json::json!(role == "vip")
        });
        let instantiator = StateInstantiator::new(Arc::new(enricher));
        let current = instantiator.instantiate("alt_step", &process).unwrap();
        let alt = current.actions.get("alt").unwrap();
        assert_eq!(
            alt.actors,
            Dynamic::Value(vec!["client".to_string()])
        );
    }

    #[test]
    fn action_with_no_eligible_actor_is_dropped() {
        let mut process = golden_process();
        let mut scenario = (*process.scenario).clone();
        scenario.actions.get_mut("alt").unwrap().condition =
            Dynamic::Expr(format!("{ACTOR_REF}.role == 'vip'"));
        process.scenario = Arc::new(scenario);

        let enricher =
            TableEnricher::default().with_actor_rule(|_expr, _process, _actor| serde_json::json!(false));
        let instantiator = StateInstantiator::new(Arc::new(enricher));
        let current = instantiator.instantiate("alt_step", &process).unwrap();
        assert!(!current.actions.contains_key("alt"));
    }

    #[test]
    fn allow_actions_are_available_everywhere() {
        let mut process = golden_process();
        let mut scenario = (*process.scenario).clone();
        scenario.actions.insert(
            "comment",
            serde_json::from_value(serde_json::json!({"responses": {"ok": {}}})).unwrap(),
        );
        scenario.allow_actions.push("comment".to_string());
        process.scenario = Arc::new(scenario);

        let instantiator = StateInstantiator::new(Arc::new(TableEnricher::default()));
        let current = instantiator.instantiate("basic_step", &process).unwrap();
        assert!(current.actions.contains_key("comment"));
    }

    #[test]
    fn eligibility_helpers() {
        let process = golden_process();
        let scenario = golden_scenario();
        let second = scenario.get_action("second").unwrap();
        assert!(action_allows(second, "manager"));
        assert!(!action_allows(second, "client"));
        assert_eq!(eligible_actors(second, &process), vec!["manager".to_string()]);

        let first = scenario.get_action("first").unwrap();
        assert!(action_allows(first, "client"));
        assert_eq!(
            eligible_actors(first, &process),
            vec!["client".to_string(), "manager".to_string()]
        );
    }
}
