//! Live state-machine instances and their placeholder bindings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use world_model::EntityId;

/// Placeholder name → concrete entity id.
///
/// Definitions refer to entities either as `$placeholder` or by a bare
/// placeholder name; anything that is not bound is taken as a literal id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bindings(BTreeMap<String, EntityId>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, placeholder: impl Into<String>, id: impl Into<EntityId>) -> Self {
        self.0.insert(placeholder.into(), id.into());
        self
    }

    pub fn get(&self, placeholder: &str) -> Option<&EntityId> {
        self.0.get(placeholder)
    }

    /// Resolve an entity reference from a definition.
    pub fn resolve(&self, reference: &str) -> EntityId {
        let key = reference.strip_prefix('$').unwrap_or(reference);
        self.0
            .get(key)
            .cloned()
            .unwrap_or_else(|| EntityId::new(reference))
    }

    /// Resolve a JSON value: strings starting with `$` go through the
    /// bindings, everything else is returned unchanged.
    pub fn resolve_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) if s.starts_with('$') => Value::String(self.resolve(s).0),
            other => other.clone(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntityId)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<EntityId>> FromIterator<(K, V)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub turn: u64,
    pub from: String,
    pub to: String,
    /// Event type that fired the transition, `None` for a state check.
    pub event_type: Option<String>,
}

/// A definition bound to concrete entities, with its own current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachineInstance {
    pub instance_id: String,
    pub definition_id: String,
    pub bindings: Bindings,
    pub current_state: String,
    pub history: Vec<StateChange>,
}

impl StateMachineInstance {
    pub(crate) fn new(
        instance_id: String,
        definition_id: String,
        bindings: Bindings,
        initial_state: String,
    ) -> Self {
        Self {
            instance_id,
            definition_id,
            bindings,
            current_state: initial_state,
            history: Vec::new(),
        }
    }

    /// Append a state change, keeping at most `limit` of the newest.
    pub(crate) fn record(&mut self, change: StateChange, limit: usize) {
        self.history.push(change);
        trim_history(&mut self.history, limit);
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            instance_id: self.instance_id.clone(),
            definition_id: self.definition_id.clone(),
            bindings: self.bindings.clone(),
            current_state: self.current_state.clone(),
            history: self.history.clone(),
        }
    }
}

/// Persisted state of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub instance_id: String,
    pub definition_id: String,
    pub bindings: Bindings,
    pub current_state: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<StateChange>,
}

pub(crate) fn trim_history(history: &mut Vec<StateChange>, limit: usize) {
    if history.len() > limit {
        let excess = history.len() - limit;
        history.drain(..excess);
    }
}
