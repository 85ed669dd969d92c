//! Trait data attached to entities.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Well-known trait names used by the core and by most stories.
pub mod names {
    pub const IDENTITY: &str = "identity";
    pub const OPENABLE: &str = "openable";
    pub const LOCKABLE: &str = "lockable";
    pub const LIGHT_SOURCE: &str = "light_source";
    pub const ROOM: &str = "room";
}

/// A named bag of properties on one entity (for example `openable.is_open`).
///
/// Properties are JSON values so story content can attach whatever it needs
/// without the world model knowing the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct TraitData {
    properties: BTreeMap<String, Value>,
}

impl TraitData {
    /// Create an empty trait.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style property setter.
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(property.into(), value.into());
        self
    }

    /// Get a property value.
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    /// Get a property as a bool, if present and boolean.
    pub fn get_bool(&self, property: &str) -> Option<bool> {
        self.get(property).and_then(Value::as_bool)
    }

    /// Set a property, returning the previous value.
    pub fn set(&mut self, property: impl Into<String>, value: Value) -> Option<Value> {
        self.properties.insert(property.into(), value)
    }

    /// Iterate over all properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
