//! Entity definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{EntityId, EntityKind, TraitData};

/// An entity with its traits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,

    /// Traits by name, each a bag of properties.
    #[serde(default)]
    pub traits: BTreeMap<String, TraitData>,
}

impl Entity {
    /// Create a new entity with the given id and display name.
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntityKind::default(),
            traits: BTreeMap::new(),
        }
    }

    /// Set the entity kind.
    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = kind;
        self
    }

    /// Attach a trait.
    pub fn with_trait(mut self, name: impl Into<String>, data: TraitData) -> Self {
        self.traits.insert(name.into(), data);
        self
    }

    /// Check if the entity carries a specific trait.
    pub fn has_trait(&self, name: &str) -> bool {
        self.traits.contains_key(name)
    }

    pub fn get_trait(&self, name: &str) -> Option<&TraitData> {
        self.traits.get(name)
    }

    pub fn get_trait_mut(&mut self, name: &str) -> Option<&mut TraitData> {
        self.traits.get_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::traits::names;

    #[test]
    fn test_new_entity() {
        let entity = Entity::new("lantern", "brass lantern");
        assert_eq!(entity.id, EntityId::new("lantern"));
        assert_eq!(entity.name, "brass lantern");
        assert_eq!(entity.kind, EntityKind::Item);
        assert!(entity.traits.is_empty());
    }

    #[test]
    fn test_entity_traits() {
        let mut door = Entity::new("trap-door", "trap door")
            .with_kind(EntityKind::Scenery)
            .with_trait(names::OPENABLE, TraitData::new().with("is_open", false));

        assert!(door.has_trait(names::OPENABLE));
        assert!(!door.has_trait(names::LOCKABLE));

        door.get_trait_mut(names::OPENABLE)
            .unwrap()
            .set("is_open", serde_json::json!(true));
        assert_eq!(
            door.get_trait(names::OPENABLE).unwrap().get_bool("is_open"),
            Some(true)
        );
    }
}
