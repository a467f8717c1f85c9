//! Waymark data model -- scenarios (workflow blueprints) and processes
//! (running instances).
//!
//! A `Scenario` declares states, the actions available in each state, the
//! responses an action may yield, and the transitions those responses
//! trigger. A `Process` is a live instantiation: its current state, its
//! actors, its data assets, and its history of responses.
//!
//! This crate is pure data: types, (de)serialization, and structural
//! validation. The execution engine that drives a process through its
//! scenario lives in `waymark-engine`.

pub mod action;
pub mod duration;
pub mod dynamic;
pub mod error;
pub mod key_map;
pub mod process;
pub mod scenario;
pub mod validation;

pub use action::{Action, AvailableResponse, UpdateInstruction, DEFAULT_RESPONSE};
pub use dynamic::Dynamic;
pub use error::ModelError;
pub use key_map::KeyMap;
pub use process::{
    ActionRef, Actor, ActorRef, CurrentState, NextState, Process, Response,
};
pub use scenario::{
    DisplayMode, Scenario, State, StateTransition, CANCELLED_STATE, FAILED_STATE, INITIAL_STATE,
    SUCCESS_STATE, TERMINAL_STATES, WILDCARD,
};
pub use validation::{FieldError, ValidationError, ValidationResult};
