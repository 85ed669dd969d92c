//! # Turn Engine
//!
//! The turn-based core of the interactive-fiction runtime. This crate decides
//! *when* story behavior runs; what the world looks like lives in
//! `world_model`, which this crate reads and writes through the
//! [`WorldModel`](world_model::WorldModel) trait.
//!
//! ## Core Components
//!
//! - **scheduler**: Daemons (recurring behaviors) and fuses (countdown timers), run once per turn
//! - **state_machine**: Declarative state machines driven by events and world-state checks
//! - **session**: Owns a scheduler and an engine and runs the per-turn data flow
//! - **events**: Semantic events and narration descriptors
//! - **random**: Seeded deterministic random source
//! - **config**: Engine configuration loaded from TOML
//!
//! ## Design Philosophy
//!
//! - **Deterministic**: Same actions and same seed produce the same events, ids included
//! - **Turn-Based**: No wall-clock time; multi-turn processes are state carried in fuses and instances
//! - **Fault-Tolerant**: A failing behavior is recorded and skipped, the turn always completes

pub mod config;
pub mod error;
pub mod events;
pub mod random;
pub mod scheduler;
pub mod session;
pub mod state_machine;

pub use config::*;
pub use error::*;
pub use events::*;
pub use random::*;
pub use scheduler::*;
pub use session::*;
pub use state_machine::*;
