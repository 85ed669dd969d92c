//! Error and fault types.
//!
//! Two families live here. Registration errors (`SchedulerError`,
//! `DefinitionError`) are returned to story setup code and fail fast.
//! Runtime faults (`BehaviorError` coming out of a daemon, fuse, guard or
//! effect) never escape a turn; they are recorded as [`FaultRecord`]s and
//! logged.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use world_model::WorldError;

/// Errors from daemon and fuse registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("a daemon with id `{0}` is already registered")]
    DuplicateId(String),

    #[error("fuse `{id}` must run for at least one turn (got {turns})")]
    InvalidFuseDuration { id: String, turns: u32 },
}

/// Authoring defects in state-machine definitions, rejected before play.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("state machine id must not be empty")]
    EmptyId,

    #[error("state machine `{0}` is already defined")]
    DuplicateId(String),

    #[error("state machine `{machine}` starts in unknown state `{state}`")]
    UnknownInitialState { machine: String, state: String },

    #[error("state machine `{machine}`: transition from `{from}` targets unknown state `{target}`")]
    UnknownTarget {
        machine: String,
        from: String,
        target: String,
    },

    #[error("no state machine definition with id `{0}`")]
    UnknownDefinition(String),

    #[error("could not parse state machine definition: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A fault raised by story behavior at runtime.
#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("bad payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl BehaviorError {
    pub fn failed(message: impl Into<String>) -> Self {
        BehaviorError::Failed(message.into())
    }
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Categories of runtime faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// A daemon `run` or fuse `trigger` returned an error.
    DaemonOrFuseFault,
    /// A fuse `on_cancel` hook returned an error.
    CancelHookFault,
    /// A custom guard returned an error; the guard counted as false.
    GuardEvaluationFault,
    /// An effect returned an error; the rest of its list was skipped.
    EffectExecutionFault,
}

/// One recorded runtime fault, keyed by the id of the behavior that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultRecord {
    pub turn: u64,
    pub kind: FaultKind,
    /// Daemon id, fuse id, or state-machine instance id.
    pub source: String,
    pub message: String,
}

impl FaultRecord {
    pub fn new(turn: u64, kind: FaultKind, source: impl Into<String>, error: &BehaviorError) -> Self {
        Self {
            turn,
            kind,
            source: source.into(),
            message: error.to_string(),
        }
    }
}
