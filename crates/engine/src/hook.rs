//! Lifecycle event dispatch.
//!
//! Each process/scenario host may register a chain of handlers that
//! observe or transform lifecycle payloads. A handler reports explicitly
//! whether it handled the event; the chain stops at the first handler
//! that does.

use std::sync::Arc;

/// Engine lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Entity loaded/cast by the host persistence layer.
    Cast,
    /// Entity validated by the host.
    Validate,
    /// A process was instantiated from a scenario.
    Instantiate,
    /// A response was stepped through successfully.
    Step,
    /// Update instructions were applied to a process.
    Update,
    /// An automated action is being invoked.
    Trigger,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Cast => "cast",
            Event::Validate => "validate",
            Event::Instantiate => "instantiate",
            Event::Step => "step",
            Event::Update => "update",
            Event::Trigger => "trigger",
        }
    }
}

/// A single handler in an event chain.
pub trait EventHandler: Send + Sync {
    /// Observe or transform the payload. The boolean reports whether the
    /// event was handled; a handled event stops the chain.
    fn handle(&self, event: Event, payload: serde_json::Value) -> (serde_json::Value, bool);
}

/// The event hook a process dispatches its lifecycle events through.
pub trait EventHook: Send + Sync {
    /// Run the payload through the handler chain and return the result.
    fn dispatch(&self, event: Event, payload: serde_json::Value) -> serde_json::Value;
}

/// Hook that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl EventHook for NoopHook {
    fn dispatch(&self, _event: Event, payload: serde_json::Value) -> serde_json::Value {
        payload
    }
}

/// An ordered chain of handlers, each free to transform the payload.
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        HandlerChain::default()
    }

    /// Immutable builder: returns a copy with the handler appended.
    pub fn with(&self, handler: Arc<dyn EventHandler>) -> HandlerChain {
        let mut handlers = self.handlers.clone();
        handlers.push(handler);
        HandlerChain { handlers }
    }
}

impl EventHook for HandlerChain {
    fn dispatch(&self, event: Event, payload: serde_json::Value) -> serde_json::Value {
        let mut payload = payload;
        for handler in &self.handlers {
            let (next, handled) = handler.handle(event, payload);
            payload = next;
            if handled {
                break;
            }
        }
        payload
    }
}
