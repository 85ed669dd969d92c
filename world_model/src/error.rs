//! Errors raised by world model mutations.

use thiserror::Error;

use crate::entities::EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("no entity with id `{0}`")]
    MissingEntity(EntityId),

    #[error("entity `{entity}` has no `{trait_name}` trait")]
    MissingTrait { entity: EntityId, trait_name: String },
}
