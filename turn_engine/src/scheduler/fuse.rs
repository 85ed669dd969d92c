//! Fuses - countdown timers that fire once when they reach zero.

use serde::{Deserialize, Serialize};
use world_model::EntityId;

use super::SchedulerContext;
use crate::error::BehaviorError;
use crate::events::SemanticEvent;

type TickCondition = Box<dyn Fn(&SchedulerContext<'_>) -> bool>;
type Trigger = Box<dyn FnMut(&mut SchedulerContext<'_>) -> Result<FuseOutcome, BehaviorError>>;
type CancelHook = Box<dyn FnMut(&mut SchedulerContext<'_>) -> Result<Vec<SemanticEvent>, BehaviorError>>;

/// What a fuse trigger produces: this stage's events and, optionally, the
/// fuse for the next stage.
///
/// The continuation is registered only after the firing fuse has been
/// removed, so a stage may reuse its own id.
#[derive(Debug, Default)]
pub struct FuseOutcome {
    pub events: Vec<SemanticEvent>,
    pub continuation: Option<Box<Fuse>>,
}

impl FuseOutcome {
    /// Nothing to report.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn events(events: Vec<SemanticEvent>) -> Self {
        Self {
            events,
            continuation: None,
        }
    }

    pub fn event(event: SemanticEvent) -> Self {
        Self::events(vec![event])
    }

    /// Chain the next stage.
    pub fn then(mut self, next: Fuse) -> Self {
        self.continuation = Some(Box::new(next));
        self
    }
}

impl From<Vec<SemanticEvent>> for FuseOutcome {
    fn from(events: Vec<SemanticEvent>) -> Self {
        Self::events(events)
    }
}

/// A one-shot (or repeating) countdown timer.
pub struct Fuse {
    pub(crate) id: String,
    pub(crate) name: Option<String>,
    pub(crate) turns: u32,
    pub(crate) original_turns: u32,
    pub(crate) entity: Option<EntityId>,
    pub(crate) priority: i32,
    pub(crate) repeat: bool,
    pub(crate) paused: bool,
    pub(crate) tick_condition: Option<TickCondition>,
    pub(crate) trigger: Trigger,
    pub(crate) on_cancel: Option<CancelHook>,
    /// Registration order, assigned by the scheduler.
    pub(crate) seq: u64,
}

impl Fuse {
    /// Create a fuse that fires `trigger` after `turns` ticks.
    pub fn new<F>(id: impl Into<String>, turns: u32, trigger: F) -> Self
    where
        F: FnMut(&mut SchedulerContext<'_>) -> Result<FuseOutcome, BehaviorError> + 'static,
    {
        Self {
            id: id.into(),
            name: None,
            turns,
            original_turns: turns,
            entity: None,
            priority: 0,
            repeat: false,
            paused: false,
            tick_condition: None,
            trigger: Box::new(trigger),
            on_cancel: None,
            seq: 0,
        }
    }

    /// Human-readable name for diagnostics.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Higher priority fuses tick earlier in the turn.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Bind the fuse to an entity, so that cleaning up the entity cancels it.
    pub fn bound_to(mut self, entity: impl Into<EntityId>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Only count down on turns where `condition` holds.
    pub fn with_tick_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&SchedulerContext<'_>) -> bool + 'static,
    {
        self.tick_condition = Some(Box::new(condition));
        self
    }

    /// Reset to the original count after firing instead of being removed.
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Hook run when the fuse is cancelled before firing.
    pub fn on_cancel<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut SchedulerContext<'_>) -> Result<Vec<SemanticEvent>, BehaviorError> + 'static,
    {
        self.on_cancel = Some(Box::new(hook));
        self
    }

    /// Start paused.
    pub fn paused(mut self) -> Self {
        self.paused = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn turns_remaining(&self) -> u32 {
        self.turns
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn entity(&self) -> Option<&EntityId> {
        self.entity.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_repeating(&self) -> bool {
        self.repeat
    }

    pub(crate) fn should_tick(&self, ctx: &SchedulerContext<'_>) -> bool {
        !self.paused && self.tick_condition.as_ref().map_or(true, |cond| cond(ctx))
    }

    /// Apply a signed adjustment, saturating at zero.
    pub(crate) fn adjust(&mut self, delta: i64) {
        let adjusted = (self.turns as i64).saturating_add(delta);
        self.turns = adjusted.clamp(0, u32::MAX as i64) as u32;
    }

    pub(crate) fn info(&self) -> FuseInfo {
        FuseInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            turns_remaining: self.turns,
            paused: self.paused,
            entity: self.entity.clone(),
            priority: self.priority,
            repeat: self.repeat,
        }
    }

    pub(crate) fn state(&self) -> FuseState {
        FuseState {
            id: self.id.clone(),
            turns_remaining: self.turns,
            paused: self.paused,
            entity: self.entity.clone(),
        }
    }
}

impl std::fmt::Debug for Fuse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fuse")
            .field("id", &self.id)
            .field("turns", &self.turns)
            .field("priority", &self.priority)
            .field("entity", &self.entity)
            .field("repeat", &self.repeat)
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a registered fuse, for debug tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuseInfo {
    pub id: String,
    pub name: Option<String>,
    pub turns_remaining: u32,
    pub paused: bool,
    pub entity: Option<EntityId>,
    pub priority: i32,
    pub repeat: bool,
}

/// Persisted runtime state of one fuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuseState {
    pub id: String,
    pub turns_remaining: u32,
    pub paused: bool,
    pub entity: Option<EntityId>,
}
