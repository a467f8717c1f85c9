//! Shared fixtures for engine unit tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use waymark_model::{Actor, CurrentState, Process, Scenario};

use crate::enrich::{EnrichError, Enricher};
use crate::patch::{PathRuntime, ProjectionError};

/// A small two-branch scenario used across the engine tests: a happy
/// path through `basic_step` to `:success`, and an alternate loop
/// through `alt_step` that can retry or cancel.
pub(crate) fn golden_scenario() -> Scenario {
    Scenario::from_data(json!({
        "id": "golden",
        "schema": "https://example.org/scenario/v1",
        "title": "Golden flow",
        "actors": {
            "client": {"title": "Client"},
            "manager": {"title": "Manager"}
        },
        "actions": {
            "first": {
                "title": "First step",
                "responses": {"ok": {}}
            },
            "second": {
                "title": "Second step",
                "actors": ["manager"],
                "responses": {"ok": {}}
            },
            "alt": {
                "title": "Take the alternate route",
                "responses": {"retry": {}, "cancel": {}},
                "default_response": "retry"
            },
            "skip": {
                "title": "Skip ahead",
                "responses": {"ok": {}}
            }
        },
        "states": {
            ":initial": {
                "transitions": [
                    {"action": "first", "transition": "basic_step"}
                ]
            },
            "basic_step": {
                "title": "Basic step",
                "transitions": [
                    {"action": "second", "transition": ":success"},
                    {"action": "alt", "transition": "alt_step"}
                ]
            },
            "alt_step": {
                "title": "Alternate step",
                "transitions": [
                    {"action": "alt", "response": "cancel", "transition": ":cancelled"},
                    {"action": "alt", "response": "retry", "transition": "basic_step"},
                    {"action": "skip", "transition": ":success"}
                ]
            }
        }
    }))
    .expect("golden scenario must parse")
}

/// A fresh process over [`golden_scenario`], parked at `:initial`
/// without instantiation.
pub(crate) fn golden_process() -> Process {
    let scenario = Arc::new(golden_scenario());
    let mut process = Process {
        id: "proc-1".to_string(),
        schema: scenario.schema.clone(),
        title: scenario.title.clone(),
        scenario,
        current: CurrentState {
            key: ":initial".to_string(),
            ..CurrentState::default()
        },
        ..Process::default()
    };
    process.actors.insert(
        "client",
        Actor {
            title: Some("Client".to_string()),
            ..Actor::default()
        },
    );
    process.actors.insert(
        "manager",
        Actor {
            title: Some("Manager".to_string()),
            ..Actor::default()
        },
    );
    process
}

type ActorRule = dyn Fn(&str, &Process, &str) -> Value + Send + Sync;

/// Table-driven test evaluator: expressions resolve through a fixed
/// lookup table, with an optional per-actor rule.
#[derive(Default, Clone)]
pub(crate) struct TableEnricher {
    values: BTreeMap<String, Value>,
    actor_rule: Option<Arc<ActorRule>>,
}

impl TableEnricher {
    pub(crate) fn with_value(mut self, expr: impl Into<String>, value: Value) -> Self {
        self.values.insert(expr.into(), value);
        self
    }

    pub(crate) fn with_actor_rule(
        mut self,
        rule: impl Fn(&str, &Process, &str) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.actor_rule = Some(Arc::new(rule));
        self
    }
}

impl Enricher for TableEnricher {
    fn evaluate(&self, expr: &str, _process: &Process) -> Result<Value, EnrichError> {
        self.values
            .get(expr)
            .cloned()
            .ok_or_else(|| EnrichError::new(expr, "unknown expression"))
    }

    fn evaluate_for_actor(
        &self,
        expr: &str,
        process: &Process,
        actor_key: &str,
    ) -> Result<Value, EnrichError> {
        match &self.actor_rule {
            Some(rule) => Ok(rule(expr, process, actor_key)),
            None => self.evaluate(expr, process),
        }
    }
}

/// Dot-path projection runtime: `a.b.c` walks object keys, missing
/// segments project to null.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DotRuntime;

impl PathRuntime for DotRuntime {
    fn project(&self, expr: &str, data: &Value) -> Result<Value, ProjectionError> {
        let mut cursor = data;
        for segment in expr.split('.') {
            match cursor.get(segment) {
                Some(next) => cursor = next,
                None => return Ok(Value::Null),
            }
        }
        Ok(cursor.clone())
    }
}
