//! State-machine definitions: states, ordered transitions, triggers.
//!
//! Definitions are plain data and can be authored in Rust with the builders
//! below or loaded from TOML/JSON, as long as they use no custom guards or
//! effects:
//!
//! ```toml
//! id = "trap-door"
//! initial_state = "closed"
//!
//! [states.closed]
//! [[states.closed.transitions]]
//! target = "open"
//! trigger = { type = "event", event_type = "if.event.opened", filter = { target = "$door" } }
//! effects = [{ type = "message", message_id = "trap_door.creaks" }]
//!
//! [states.open]
//! terminal = true
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{Bindings, Effect, Guard};
use crate::error::DefinitionError;
use crate::events::SemanticEvent;

/// What makes a transition eligible.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionTrigger {
    /// An event of `event_type` whose fields match every `filter` entry.
    Event {
        event_type: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        filter: Map<String, Value>,
    },

    /// A world-state predicate, checked on state-check passes.
    State { condition: Guard },
}

impl TransitionTrigger {
    /// Does `event` match this trigger for an instance with `bindings`?
    ///
    /// Filter keys are looked up in the event's `data`, then its `entities`.
    pub fn matches_event(&self, event: &SemanticEvent, bindings: &Bindings) -> bool {
        let TransitionTrigger::Event { event_type, filter } = self else {
            return false;
        };
        if *event_type != event.event_type {
            return false;
        }
        filter
            .iter()
            .all(|(key, expected)| event.field(key).as_ref() == Some(&bindings.resolve_value(expected)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub target: String,
    pub trigger: TransitionTrigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<Guard>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,
}

impl Transition {
    /// Fire on events of `event_type`.
    pub fn on_event(event_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            trigger: TransitionTrigger::Event {
                event_type: event_type.into(),
                filter: Map::new(),
            },
            guard: None,
            effects: Vec::new(),
        }
    }

    /// Fire on a state check when `condition` holds.
    pub fn on_state(condition: Guard, target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            trigger: TransitionTrigger::State { condition },
            guard: None,
            effects: Vec::new(),
        }
    }

    /// Require an event field to equal `value`. No effect on state triggers.
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let TransitionTrigger::Event { filter, .. } = &mut self.trigger {
            filter.insert(key.into(), value.into());
        }
        self
    }

    pub fn when(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// A terminal state accepts no further transitions.
    #[serde(default)]
    pub terminal: bool,

    /// Checked in order; the first match wins.
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl StateDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terminal() -> Self {
        Self {
            terminal: true,
            ..Self::default()
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMachineDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub initial_state: String,
    pub states: BTreeMap<String, StateDef>,
}

impl StateMachineDefinition {
    pub fn new(id: impl Into<String>, initial_state: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            initial_state: initial_state.into(),
            states: BTreeMap::new(),
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_state(mut self, name: impl Into<String>, state: StateDef) -> Self {
        self.states.insert(name.into(), state);
        self
    }

    pub fn state(&self, name: &str) -> Option<&StateDef> {
        self.states.get(name)
    }

    pub fn is_terminal(&self, name: &str) -> bool {
        self.states.get(name).map_or(false, |state| state.terminal)
    }

    /// Parse and validate a definition from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, DefinitionError> {
        let definition: Self = toml::from_str(content)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Check that the id is set and every referenced state exists.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.id.trim().is_empty() {
            return Err(DefinitionError::EmptyId);
        }
        if !self.states.contains_key(&self.initial_state) {
            return Err(DefinitionError::UnknownInitialState {
                machine: self.id.clone(),
                state: self.initial_state.clone(),
            });
        }
        for (name, state) in &self.states {
            for transition in &state.transitions {
                if !self.states.contains_key(&transition.target) {
                    return Err(DefinitionError::UnknownTarget {
                        machine: self.id.clone(),
                        from: name.clone(),
                        target: transition.target.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
