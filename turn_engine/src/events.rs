//! Semantic events and narration descriptors.
//!
//! Events are the only channel between the scheduler, the state-machine
//! engine and the outside world. The core never looks at wall-clock time:
//! `timestamp` is the turn the event was produced on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;
use world_model::EntityId;

/// Namespace for ids derived from `(turn, emitter, index)`.
const EVENT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93b7_4d52_a0e8_5c7d_1b3f_9e04);

/// Unique identifier for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Create a new random event ID (for events raised outside the core).
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The placeholder id of an event that has not been stamped yet.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Deterministic id for the `index`-th event produced by `emitter` on `turn`.
    ///
    /// Replaying the same turns yields the same ids.
    pub fn derived(turn: u64, emitter: &str, index: usize) -> Self {
        let name = format!("{turn}:{emitter}:{index}");
        Self(Uuid::new_v5(&EVENT_NAMESPACE, name.as_bytes()))
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::nil()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A semantic event: something that happened in the story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticEvent {
    pub id: EventId,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Turn on which the event was produced.
    pub timestamp: u64,

    /// Entities by role (`actor`, `target`, `location`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<String, EntityId>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl SemanticEvent {
    /// Create an unstamped event of the given type.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            id: EventId::nil(),
            event_type: event_type.into(),
            timestamp: 0,
            entities: BTreeMap::new(),
            data: Map::new(),
        }
    }

    /// Attach an entity under a role.
    pub fn with_entity(mut self, role: impl Into<String>, id: impl Into<EntityId>) -> Self {
        self.entities.insert(role.into(), id.into());
        self
    }

    /// Attach one data field.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Merge a whole data object.
    pub fn with_data_map(mut self, data: Map<String, Value>) -> Self {
        self.data.extend(data);
        self
    }

    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    pub fn at_turn(mut self, turn: u64) -> Self {
        self.timestamp = turn;
        self
    }

    /// Look up a field by name: `data` first, then `entities`.
    pub fn field(&self, key: &str) -> Option<Value> {
        self.data
            .get(key)
            .cloned()
            .or_else(|| self.entities.get(key).map(|id| Value::String(id.0.clone())))
    }

    /// Give an unstamped event its deterministic id and turn.
    pub fn stamp(&mut self, turn: u64, emitter: &str, index: usize) {
        if self.id.is_nil() {
            self.id = EventId::derived(turn, emitter, index);
            self.timestamp = turn;
        }
    }
}

/// Stamp every event in a batch produced by one emitter.
pub fn stamp_events(events: &mut [SemanticEvent], turn: u64, emitter: &str) {
    for (index, event) in events.iter_mut().enumerate() {
        event.stamp(turn, emitter, index);
    }
}

/// A request for the narration layer to print a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    pub message_id: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl MessageDescriptor {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}
