//! The `WorldModel` trait - the boundary the turn engine talks to.
//!
//! Schedulers and state machines never reach into a concrete world type.
//! They read and write through this trait, so a story can plug in its own
//! store as long as it provides:
//!
//! - entity lookup by id and enumeration of all ids
//! - a global keyed scalar store (the shared blackboard)
//! - trait property get/set per entity
//! - named capabilities (structured blackboard records)
//! - containment: where an entity is and moving it elsewhere
//! - the player entity

use serde_json::Value;

use crate::entities::{Entity, EntityId, TraitData};
use crate::error::WorldError;
use crate::world_state::FlagValue;

pub trait WorldModel {
    fn entity(&self, id: &EntityId) -> Option<&Entity>;

    fn entity_mut(&mut self, id: &EntityId) -> Option<&mut Entity>;

    /// All entity ids in a stable order.
    fn entity_ids(&self) -> Vec<EntityId>;

    /// Read a global keyed value.
    fn state(&self, key: &str) -> Option<&FlagValue>;

    /// Write a global keyed value, returning the previous one.
    fn set_state(&mut self, key: &str, value: FlagValue) -> Option<FlagValue>;

    fn capability(&self, name: &str) -> Option<&Value>;

    fn capability_mut(&mut self, name: &str) -> Option<&mut Value>;

    /// Register (or replace) a named capability record.
    fn register_capability(&mut self, name: &str, data: Value);

    /// The container or room currently holding `id`.
    fn location_of(&self, id: &EntityId) -> Option<&EntityId>;

    /// Entities directly inside `container`, in id order.
    fn contents(&self, container: &EntityId) -> Vec<EntityId>;

    /// Move `id` into `destination`. Both must exist.
    fn move_entity(&mut self, id: &EntityId, destination: &EntityId) -> Result<(), WorldError>;

    fn player(&self) -> Option<&EntityId>;

    fn has_entity(&self, id: &EntityId) -> bool {
        self.entity(id).is_some()
    }

    fn get_trait(&self, id: &EntityId, trait_name: &str) -> Option<&TraitData> {
        self.entity(id).and_then(|e| e.get_trait(trait_name))
    }

    fn trait_property(&self, id: &EntityId, trait_name: &str, property: &str) -> Option<&Value> {
        self.get_trait(id, trait_name).and_then(|t| t.get(property))
    }

    /// Set one property on one trait of one entity.
    ///
    /// Fails with `MissingEntity` or `MissingTrait`; traits are never created
    /// implicitly.
    fn set_trait_property(
        &mut self,
        id: &EntityId,
        trait_name: &str,
        property: &str,
        value: Value,
    ) -> Result<Option<Value>, WorldError> {
        let entity = self
            .entity_mut(id)
            .ok_or_else(|| WorldError::MissingEntity(id.clone()))?;
        let data = entity
            .get_trait_mut(trait_name)
            .ok_or_else(|| WorldError::MissingTrait {
                entity: id.clone(),
                trait_name: trait_name.to_string(),
            })?;
        Ok(data.set(property, value))
    }

    /// True when the keyed value exists and is `Bool(true)`.
    fn flag(&self, key: &str) -> bool {
        matches!(self.state(key), Some(FlagValue::Bool(true)))
    }
}
