//! Effects - the declarative mutations a transition performs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};
use world_model::{EntityId, FlagValue, WorldModel};

use super::Bindings;
use crate::error::BehaviorError;
use crate::events::{MessageDescriptor, SemanticEvent};

/// Messages and events produced while executing effects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectOutput {
    pub messages: Vec<MessageDescriptor>,
    pub events: Vec<SemanticEvent>,
}

impl EffectOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: MessageDescriptor) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_event(mut self, event: SemanticEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn extend(&mut self, other: EffectOutput) {
        self.messages.extend(other.messages);
        self.events.extend(other.events);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.events.is_empty()
    }
}

/// A story-supplied mutation for [`Effect::Custom`].
pub trait EffectHandler {
    fn apply(
        &self,
        world: &mut dyn WorldModel,
        bindings: &Bindings,
        player: &EntityId,
    ) -> Result<EffectOutput, BehaviorError>;
}

impl<F> EffectHandler for F
where
    F: Fn(&mut dyn WorldModel, &Bindings, &EntityId) -> Result<EffectOutput, BehaviorError>,
{
    fn apply(
        &self,
        world: &mut dyn WorldModel,
        bindings: &Bindings,
        player: &EntityId,
    ) -> Result<EffectOutput, BehaviorError> {
        self(world, bindings, player)
    }
}

/// Shared handle to a custom effect.
#[derive(Clone)]
pub struct CustomEffect(Rc<dyn EffectHandler>);

impl CustomEffect {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&mut dyn WorldModel, &Bindings, &EntityId) -> Result<EffectOutput, BehaviorError> + 'static,
    {
        Self(Rc::new(handler))
    }

    pub fn from_handler(handler: impl EffectHandler + 'static) -> Self {
        Self(Rc::new(handler))
    }
}

impl fmt::Debug for CustomEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomEffect(..)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Write a global keyed value.
    SetState { key: String, value: FlagValue },

    /// Set one trait property. A missing entity or trait is skipped.
    SetTrait {
        entity: String,
        #[serde(rename = "trait")]
        trait_name: String,
        property: String,
        value: Value,
    },

    /// Relocate an entity. A missing entity or destination is skipped.
    Move { entity: String, destination: String },

    /// Ask the narration layer to print a message. `$placeholder` string
    /// params are resolved through the bindings.
    Message {
        message_id: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        params: Map<String, Value>,
    },

    /// Emit an event, dispatched on the next processing pass.
    EmitEvent {
        event_type: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        data: Map<String, Value>,
    },

    #[serde(skip)]
    Custom(CustomEffect),
}

impl Effect {
    pub fn set_state(key: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        Effect::SetState {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn set_trait(
        entity: impl Into<String>,
        trait_name: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Effect::SetTrait {
            entity: entity.into(),
            trait_name: trait_name.into(),
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn move_to(entity: impl Into<String>, destination: impl Into<String>) -> Self {
        Effect::Move {
            entity: entity.into(),
            destination: destination.into(),
        }
    }

    pub fn message(message_id: impl Into<String>) -> Self {
        Effect::Message {
            message_id: message_id.into(),
            params: Map::new(),
        }
    }

    pub fn message_with(message_id: impl Into<String>, params: Map<String, Value>) -> Self {
        Effect::Message {
            message_id: message_id.into(),
            params,
        }
    }

    pub fn emit_event(event_type: impl Into<String>, data: Map<String, Value>) -> Self {
        Effect::EmitEvent {
            event_type: event_type.into(),
            data,
        }
    }

    pub fn custom<F>(handler: F) -> Self
    where
        F: Fn(&mut dyn WorldModel, &Bindings, &EntityId) -> Result<EffectOutput, BehaviorError> + 'static,
    {
        Effect::Custom(CustomEffect::new(handler))
    }

    /// Execute against the world, appending messages and events to `out`.
    ///
    /// Missing entities are soft failures: logged and skipped. Only a custom
    /// effect returns an error.
    pub fn apply(
        &self,
        world: &mut dyn WorldModel,
        bindings: &Bindings,
        player: &EntityId,
        out: &mut EffectOutput,
    ) -> Result<(), BehaviorError> {
        match self {
            Effect::SetState { key, value } => {
                debug!(key = %key, ?value, "set_state");
                world.set_state(key, value.clone());
            }
            Effect::SetTrait {
                entity,
                trait_name,
                property,
                value,
            } => {
                let entity = bindings.resolve(entity);
                if let Err(err) = world.set_trait_property(&entity, trait_name, property, value.clone()) {
                    warn!(error = %err, property = %property, "set_trait skipped");
                }
            }
            Effect::Move {
                entity,
                destination,
            } => {
                let entity = bindings.resolve(entity);
                let destination = bindings.resolve(destination);
                if let Err(err) = world.move_entity(&entity, &destination) {
                    warn!(error = %err, "move skipped");
                }
            }
            Effect::Message { message_id, params } => {
                out.messages.push(MessageDescriptor {
                    message_id: message_id.clone(),
                    params: resolve_map(bindings, params),
                });
            }
            Effect::EmitEvent { event_type, data } => {
                let mut event = SemanticEvent::new(event_type.clone()).with_data_map(resolve_map(bindings, data));
                for (role, id) in bindings.iter() {
                    event.entities.insert(role.clone(), id.clone());
                }
                out.events.push(event);
            }
            Effect::Custom(custom) => {
                let produced = custom.0.apply(world, bindings, player)?;
                out.extend(produced);
            }
        }
        Ok(())
    }
}

fn resolve_map(bindings: &Bindings, map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), bindings.resolve_value(value)))
        .collect()
}
