//! Daemons - recurring behaviors that run every turn their condition holds.

use serde::{Deserialize, Serialize};

use super::SchedulerContext;
use crate::error::BehaviorError;
use crate::events::SemanticEvent;

type Condition = Box<dyn Fn(&SchedulerContext<'_>) -> bool>;
type Run = Box<dyn FnMut(&mut SchedulerContext<'_>) -> Result<Vec<SemanticEvent>, BehaviorError>>;

/// A recurring, priority-ordered, condition-gated behavior.
///
/// Daemons are re-evaluated every turn for the rest of the session, so
/// `run` must guard itself with world flags when it should only react once
/// per situation.
pub struct Daemon {
    pub(crate) id: String,
    pub(crate) name: Option<String>,
    pub(crate) priority: i32,
    pub(crate) run_once: bool,
    pub(crate) paused: bool,
    pub(crate) run_count: u32,
    pub(crate) condition: Option<Condition>,
    pub(crate) run: Run,
    pub(crate) seq: u64,
}

impl Daemon {
    pub fn new<F>(id: impl Into<String>, run: F) -> Self
    where
        F: FnMut(&mut SchedulerContext<'_>) -> Result<Vec<SemanticEvent>, BehaviorError> + 'static,
    {
        Self {
            id: id.into(),
            name: None,
            priority: 0,
            run_once: false,
            paused: false,
            run_count: 0,
            condition: None,
            run: Box::new(run),
            seq: 0,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Higher priority daemons run earlier in the turn.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Only run on turns where `condition` holds.
    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&SchedulerContext<'_>) -> bool + 'static,
    {
        self.condition = Some(Box::new(condition));
        self
    }

    /// Remove the daemon after the first run that produces events.
    pub fn run_once(mut self) -> Self {
        self.run_once = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn run_count(&self) -> u32 {
        self.run_count
    }

    pub(crate) fn should_run(&self, ctx: &SchedulerContext<'_>) -> bool {
        !self.paused && self.condition.as_ref().map_or(true, |cond| cond(ctx))
    }

    pub(crate) fn info(&self) -> DaemonInfo {
        DaemonInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            priority: self.priority,
            paused: self.paused,
            run_count: self.run_count,
        }
    }

    pub(crate) fn state(&self) -> DaemonState {
        DaemonState {
            id: self.id.clone(),
            paused: self.paused,
            run_count: self.run_count,
        }
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("run_once", &self.run_once)
            .field("paused", &self.paused)
            .field("run_count", &self.run_count)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a registered daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonInfo {
    pub id: String,
    pub name: Option<String>,
    pub priority: i32,
    pub paused: bool,
    pub run_count: u32,
}

/// Persisted runtime state of one daemon. Behavior is code and is
/// re-registered by story setup; only this is saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonState {
    pub id: String,
    pub paused: bool,
    pub run_count: u32,
}
