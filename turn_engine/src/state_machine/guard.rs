//! Guards - read-only predicates gating transitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use world_model::{EntityId, FlagValue, WorldModel};

use super::Bindings;
use crate::error::BehaviorError;

/// A story-supplied predicate for [`Guard::Custom`].
pub trait GuardPredicate {
    fn evaluate(
        &self,
        world: &dyn WorldModel,
        bindings: &Bindings,
        player: &EntityId,
    ) -> Result<bool, BehaviorError>;
}

impl<F> GuardPredicate for F
where
    F: Fn(&dyn WorldModel, &Bindings, &EntityId) -> Result<bool, BehaviorError>,
{
    fn evaluate(
        &self,
        world: &dyn WorldModel,
        bindings: &Bindings,
        player: &EntityId,
    ) -> Result<bool, BehaviorError> {
        self(world, bindings, player)
    }
}

/// Shared handle to a custom predicate.
#[derive(Clone)]
pub struct CustomGuard(Rc<dyn GuardPredicate>);

impl CustomGuard {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&dyn WorldModel, &Bindings, &EntityId) -> Result<bool, BehaviorError> + 'static,
    {
        Self(Rc::new(predicate))
    }

    pub fn from_predicate(predicate: impl GuardPredicate + 'static) -> Self {
        Self(Rc::new(predicate))
    }
}

impl fmt::Debug for CustomGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomGuard(..)")
    }
}

/// Transition guard. Entity references are resolved through the instance's
/// bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Guard {
    /// Global keyed state equals `value`.
    State { key: String, value: FlagValue },

    /// A trait property on an entity equals `value`.
    Trait {
        entity: String,
        #[serde(rename = "trait")]
        trait_name: String,
        property: String,
        value: Value,
    },

    /// `entity` is directly inside `container`.
    Location { entity: String, container: String },

    All { guards: Vec<Guard> },

    Any { guards: Vec<Guard> },

    Not { guard: Box<Guard> },

    #[serde(skip)]
    Custom(CustomGuard),
}

impl Guard {
    pub fn state(key: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        Guard::State {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn trait_equals(
        entity: impl Into<String>,
        trait_name: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Guard::Trait {
            entity: entity.into(),
            trait_name: trait_name.into(),
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn location(entity: impl Into<String>, container: impl Into<String>) -> Self {
        Guard::Location {
            entity: entity.into(),
            container: container.into(),
        }
    }

    pub fn all(guards: Vec<Guard>) -> Self {
        Guard::All { guards }
    }

    pub fn any(guards: Vec<Guard>) -> Self {
        Guard::Any { guards }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(guard: Guard) -> Self {
        Guard::Not {
            guard: Box::new(guard),
        }
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&dyn WorldModel, &Bindings, &EntityId) -> Result<bool, BehaviorError> + 'static,
    {
        Guard::Custom(CustomGuard::new(predicate))
    }

    /// Evaluate against the world. Only a custom predicate can fail; the
    /// first failure short-circuits the whole guard.
    pub fn evaluate(
        &self,
        world: &dyn WorldModel,
        bindings: &Bindings,
        player: &EntityId,
    ) -> Result<bool, BehaviorError> {
        match self {
            Guard::State { key, value } => Ok(world.state(key) == Some(value)),
            Guard::Trait {
                entity,
                trait_name,
                property,
                value,
            } => {
                let entity = bindings.resolve(entity);
                Ok(world.trait_property(&entity, trait_name, property) == Some(value))
            }
            Guard::Location { entity, container } => {
                let entity = bindings.resolve(entity);
                let container = bindings.resolve(container);
                Ok(world.location_of(&entity) == Some(&container))
            }
            Guard::All { guards } => {
                for guard in guards {
                    if !guard.evaluate(world, bindings, player)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Guard::Any { guards } => {
                for guard in guards {
                    if guard.evaluate(world, bindings, player)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Guard::Not { guard } => Ok(!guard.evaluate(world, bindings, player)?),
            Guard::Custom(custom) => custom.0.evaluate(world, bindings, player),
        }
    }
}
