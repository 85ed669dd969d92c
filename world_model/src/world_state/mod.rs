//! World state management - the central structure holding all story data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::entities::{Entity, EntityId};
use crate::error::WorldError;
use crate::model::WorldModel;

/// Flag value types for global state.
///
/// Untagged so story content can write `value = true` or `value = 3`
/// directly in TOML/JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl FlagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FlagValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a JSON value (used when flags end up in event payloads).
    pub fn to_json(&self) -> Value {
        match self {
            FlagValue::Bool(b) => Value::Bool(*b),
            FlagValue::Int(i) => Value::from(*i),
            FlagValue::Float(f) => Value::from(*f),
            FlagValue::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        FlagValue::Int(value)
    }
}

impl From<i32> for FlagValue {
    fn from(value: i32) -> Self {
        FlagValue::Int(value as i64)
    }
}

impl From<f64> for FlagValue {
    fn from(value: f64) -> Self {
        FlagValue::Float(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::String(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        FlagValue::String(value)
    }
}

/// The complete state of the story world at any point in time.
///
/// Maps are ordered so that anything iterating the world (queries, contents
/// listings) sees the same order on every run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorldState {
    /// All entities by id.
    pub entities: BTreeMap<EntityId, Entity>,

    /// Current container/room of each entity.
    pub entity_locations: BTreeMap<EntityId, EntityId>,

    /// Global flags and variables.
    pub global_flags: BTreeMap<String, FlagValue>,

    /// Named structured records shared between story systems.
    pub capabilities: BTreeMap<String, Value>,

    /// The entity the player controls.
    pub player: Option<EntityId>,
}

impl WorldState {
    /// Create a new empty world state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity to the world.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = entity.id.clone();
        self.entities.insert(id.clone(), entity);
        id
    }

    /// Mark an entity as the player.
    pub fn set_player(&mut self, id: impl Into<EntityId>) {
        self.player = Some(id.into());
    }

    /// Set entity location without existence checks (world setup).
    pub fn set_entity_location(&mut self, entity_id: impl Into<EntityId>, location_id: impl Into<EntityId>) {
        self.entity_locations
            .insert(entity_id.into(), location_id.into());
    }

    /// Get all entities at a specific location.
    pub fn entities_at_location(&self, location_id: &EntityId) -> Vec<EntityId> {
        self.entity_locations
            .iter()
            .filter(|(_, loc)| *loc == location_id)
            .map(|(entity, _)| entity.clone())
            .collect()
    }

    /// Where the player currently is.
    pub fn player_location(&self) -> Option<&EntityId> {
        self.player
            .as_ref()
            .and_then(|p| self.entity_locations.get(p))
    }
}

impl WorldModel for WorldState {
    fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    fn entity_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.keys().cloned().collect()
    }

    fn state(&self, key: &str) -> Option<&FlagValue> {
        self.global_flags.get(key)
    }

    fn set_state(&mut self, key: &str, value: FlagValue) -> Option<FlagValue> {
        self.global_flags.insert(key.to_string(), value)
    }

    fn capability(&self, name: &str) -> Option<&Value> {
        self.capabilities.get(name)
    }

    fn capability_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.capabilities.get_mut(name)
    }

    fn register_capability(&mut self, name: &str, data: Value) {
        self.capabilities.insert(name.to_string(), data);
    }

    fn location_of(&self, id: &EntityId) -> Option<&EntityId> {
        self.entity_locations.get(id)
    }

    fn contents(&self, container: &EntityId) -> Vec<EntityId> {
        self.entities_at_location(container)
    }

    fn move_entity(&mut self, id: &EntityId, destination: &EntityId) -> Result<(), WorldError> {
        if !self.entities.contains_key(id) {
            return Err(WorldError::MissingEntity(id.clone()));
        }
        if !self.entities.contains_key(destination) {
            return Err(WorldError::MissingEntity(destination.clone()));
        }
        tracing::trace!(entity = %id, destination = %destination, "moving entity");
        self.entity_locations.insert(id.clone(), destination.clone());
        Ok(())
    }

    fn player(&self) -> Option<&EntityId> {
        self.player.as_ref()
    }
}
