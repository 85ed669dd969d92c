//! # World Model
//!
//! The in-memory story world: entities with traits, a global keyed state
//! store, named capabilities, and containment. This crate holds data only;
//! all turn logic lives in `turn_engine`, which talks to the world through
//! the [`WorldModel`] trait.

pub mod entities;
pub mod error;
pub mod model;
pub mod world_state;

pub use entities::*;
pub use error::*;
pub use model::*;
pub use world_state::*;
