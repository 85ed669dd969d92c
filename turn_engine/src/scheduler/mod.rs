//! Scheduler - daemons and fuses driven one turn at a time.
//!
//! Every turn runs in two fixed phases:
//! 1. **Fuses**: each registered, non-paused fuse whose tick condition holds
//!    counts down by one; fuses reaching zero fire their trigger.
//! 2. **Daemons**: each non-paused daemon whose condition holds runs.
//!
//! Within a phase the order is priority (descending), then registration
//! order. Behaviors that fail are recorded as faults and skipped; a turn is
//! never aborted.

mod context;
mod daemon;
mod fuse;
mod registry;

pub use context::*;
pub use daemon::*;
pub use fuse::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};
use world_model::{EntityId, WorldModel};

use crate::error::{BehaviorError, FaultKind, FaultRecord, SchedulerError};
use crate::events::{stamp_events, SemanticEvent};
use crate::random::{RandomState, SeededRandom};
use registry::Registry;

/// Everything one call to [`Scheduler::advance_turn`] produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnReport {
    pub turn: u64,
    /// Output events in execution order.
    pub events: Vec<SemanticEvent>,
    pub fuses_triggered: Vec<String>,
    pub daemons_run: Vec<String>,
    pub faults: Vec<FaultRecord>,
}

impl TurnReport {
    fn new(turn: u64) -> Self {
        Self {
            turn,
            ..Self::default()
        }
    }
}

/// Persisted runtime state of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub turn: u64,
    pub random: RandomState,
    pub daemons: Vec<DaemonState>,
    pub fuses: Vec<FuseState>,
}

/// Owns every daemon and fuse of one session.
#[derive(Debug)]
pub struct Scheduler {
    daemons: Registry<Daemon>,
    fuses: Registry<Fuse>,
    random: SeededRandom,
    faults: Vec<FaultRecord>,
    current_turn: u64,
}

impl Scheduler {
    /// Create an empty scheduler whose random source starts from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            daemons: Registry::default(),
            fuses: Registry::default(),
            random: SeededRandom::new(seed),
            faults: Vec::new(),
            current_turn: 0,
        }
    }

    pub fn register_daemon(&mut self, daemon: Daemon) -> Result<(), SchedulerError> {
        if self.daemons.contains(daemon.id()) {
            return Err(SchedulerError::DuplicateId(daemon.id().to_string()));
        }
        debug!(daemon = daemon.id(), priority = daemon.priority(), "daemon registered");
        self.daemons.insert(daemon);
        Ok(())
    }

    /// Remove a daemon. Returns whether it was registered.
    pub fn remove_daemon(&mut self, id: &str) -> bool {
        self.daemons.remove(id).is_some()
    }

    pub fn pause_daemon(&mut self, id: &str) {
        if let Some(daemon) = self.daemons.get_mut(id) {
            daemon.paused = true;
        }
    }

    pub fn resume_daemon(&mut self, id: &str) {
        if let Some(daemon) = self.daemons.get_mut(id) {
            daemon.paused = false;
        }
    }

    pub fn has_daemon(&self, id: &str) -> bool {
        self.daemons.contains(id)
    }

    /// Insert or replace a fuse by id. A fuse must run for at least one turn.
    pub fn set_fuse(&mut self, fuse: Fuse) -> Result<(), SchedulerError> {
        insert_fuse(&mut self.fuses, fuse)
    }

    /// Cancel a fuse before it fires, running its `on_cancel` hook.
    ///
    /// Requests the hook queues on its context are applied before returning.
    pub fn cancel_fuse(&mut self, world: &mut dyn WorldModel, id: &str) -> Vec<SemanticEvent> {
        let player = world.player().cloned().unwrap_or_default();
        let mut ctx = SchedulerContext::new(world, &self.random, self.current_turn, player);
        let mut report = TurnReport::new(self.current_turn);
        report.events = cancel_fuse_with(&mut self.fuses, id, &mut ctx, &mut report.faults);
        apply_requests(&mut self.fuses, &mut self.daemons, &mut ctx, &mut report, id);
        self.faults.extend(report.faults);
        report.events
    }

    /// Cancel every fuse bound to `entity` (the entity left play).
    pub fn cleanup_entity(&mut self, world: &mut dyn WorldModel, entity: &EntityId) -> Vec<SemanticEvent> {
        let bound = self
            .fuses
            .ids_where(|fuse| fuse.entity.as_ref() == Some(entity));
        let mut events = Vec::new();
        for id in bound {
            debug!(fuse = %id, entity = %entity, "cancelling fuse bound to removed entity");
            events.extend(self.cancel_fuse(world, &id));
        }
        events
    }

    pub fn get_fuse_remaining(&self, id: &str) -> Option<u32> {
        self.fuses.get(id).map(Fuse::turns_remaining)
    }

    /// Add `delta` turns to a fuse (negative shortens it, saturating at zero).
    pub fn adjust_fuse(&mut self, id: &str, delta: i64) {
        if let Some(fuse) = self.fuses.get_mut(id) {
            fuse.adjust(delta);
        }
    }

    pub fn pause_fuse(&mut self, id: &str) {
        if let Some(fuse) = self.fuses.get_mut(id) {
            fuse.paused = true;
        }
    }

    pub fn resume_fuse(&mut self, id: &str) {
        if let Some(fuse) = self.fuses.get_mut(id) {
            fuse.paused = false;
        }
    }

    pub fn has_fuse(&self, id: &str) -> bool {
        self.fuses.contains(id)
    }

    /// Run one turn: all due fuses, then all daemons.
    pub fn advance_turn(
        &mut self,
        world: &mut dyn WorldModel,
        turn: u64,
        player_id: &EntityId,
    ) -> TurnReport {
        self.current_turn = turn;
        debug!(turn, fuses = self.fuses.len(), daemons = self.daemons.len(), "advancing turn");
        let mut report = TurnReport::new(turn);
        let mut ctx = SchedulerContext::new(world, &self.random, turn, player_id.clone());

        // Fuses added during this phase wait for the next turn.
        for handle in self.fuses.run_order() {
            let Some(fuse) = self.fuses.resolve(&handle) else {
                continue;
            };
            if !fuse.should_tick(&ctx) {
                continue;
            }

            fuse.turns = fuse.turns.saturating_sub(1);
            debug!(turn, fuse = %handle.id, remaining = fuse.turns, "fuse ticked");
            if fuse.turns > 0 {
                continue;
            }

            match (fuse.trigger)(&mut ctx) {
                Ok(outcome) => {
                    let mut events = outcome.events;
                    stamp_events(&mut events, turn, &format!("fuse:{}", handle.id));
                    report.events.extend(events);
                    report.fuses_triggered.push(handle.id.clone());

                    if fuse.repeat {
                        fuse.turns = fuse.original_turns;
                    } else {
                        self.fuses.remove(&handle.id);
                    }
                    debug!(turn, fuse = %handle.id, "fuse fired");

                    if let Some(next) = outcome.continuation {
                        debug!(turn, fuse = %handle.id, next = next.id(), "fuse chained");
                        if let Err(err) = insert_fuse(&mut self.fuses, *next) {
                            record_fault(&mut report, FaultKind::DaemonOrFuseFault, &handle.id, err.into());
                        }
                    }
                }
                Err(err) => {
                    self.fuses.remove(&handle.id);
                    record_fault(&mut report, FaultKind::DaemonOrFuseFault, &handle.id, err);
                }
            }

            apply_requests(&mut self.fuses, &mut self.daemons, &mut ctx, &mut report, &handle.id);
        }

        for handle in self.daemons.run_order() {
            let Some(daemon) = self.daemons.resolve(&handle) else {
                continue;
            };
            if !daemon.should_run(&ctx) {
                continue;
            }

            match (daemon.run)(&mut ctx) {
                Ok(mut events) => {
                    daemon.run_count += 1;
                    report.daemons_run.push(handle.id.clone());
                    let produced = !events.is_empty();
                    stamp_events(&mut events, turn, &format!("daemon:{}", handle.id));
                    report.events.extend(events);

                    if daemon.run_once && produced {
                        debug!(turn, daemon = %handle.id, "run-once daemon retired");
                        self.daemons.remove(&handle.id);
                    }
                }
                Err(err) => {
                    record_fault(&mut report, FaultKind::DaemonOrFuseFault, &handle.id, err);
                }
            }

            apply_requests(&mut self.fuses, &mut self.daemons, &mut ctx, &mut report, &handle.id);
        }

        debug!(
            turn,
            events = report.events.len(),
            fuses = report.fuses_triggered.len(),
            daemons = report.daemons_run.len(),
            "scheduler turn complete"
        );
        self.faults.extend(report.faults.iter().cloned());
        report
    }

    /// Registered daemons in run order.
    pub fn active_daemons(&self) -> Vec<DaemonInfo> {
        self.daemons.ordered().into_iter().map(Daemon::info).collect()
    }

    /// Registered fuses in run order.
    pub fn active_fuses(&self) -> Vec<FuseInfo> {
        self.fuses.ordered().into_iter().map(Fuse::info).collect()
    }

    pub fn random(&self) -> &SeededRandom {
        &self.random
    }

    /// Every fault recorded this session, oldest first.
    pub fn faults(&self) -> &[FaultRecord] {
        &self.faults
    }

    pub fn current_turn(&self) -> u64 {
        self.current_turn
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            turn: self.current_turn,
            random: self.random.snapshot(),
            daemons: self.daemons.ordered().into_iter().map(Daemon::state).collect(),
            fuses: self.fuses.ordered().into_iter().map(Fuse::state).collect(),
        }
    }

    /// Apply saved runtime state onto the daemons and fuses that story setup
    /// has registered again.
    ///
    /// Registered entries missing from the snapshot had already fired or been
    /// removed when the game was saved, so they are dropped. Saved entries
    /// with no registered behavior are skipped.
    pub fn restore(&mut self, snapshot: &SchedulerSnapshot) {
        self.current_turn = snapshot.turn;
        self.random.restore(snapshot.random);

        let saved_daemons: HashSet<&str> = snapshot.daemons.iter().map(|d| d.id.as_str()).collect();
        self.daemons.retain(|daemon| saved_daemons.contains(daemon.id()));
        for state in &snapshot.daemons {
            match self.daemons.get_mut(&state.id) {
                Some(daemon) => {
                    daemon.paused = state.paused;
                    daemon.run_count = state.run_count;
                }
                None => warn!(daemon = %state.id, "saved daemon is not registered; skipping"),
            }
        }

        let saved_fuses: HashSet<&str> = snapshot.fuses.iter().map(|f| f.id.as_str()).collect();
        self.fuses.retain(|fuse| saved_fuses.contains(fuse.id()));
        for state in &snapshot.fuses {
            match self.fuses.get_mut(&state.id) {
                Some(fuse) => {
                    fuse.turns = state.turns_remaining;
                    fuse.paused = state.paused;
                    fuse.entity = state.entity.clone();
                }
                None => warn!(fuse = %state.id, "saved fuse is not registered; skipping"),
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(0)
    }
}

fn insert_fuse(fuses: &mut Registry<Fuse>, fuse: Fuse) -> Result<(), SchedulerError> {
    if fuse.turns == 0 {
        return Err(SchedulerError::InvalidFuseDuration {
            id: fuse.id.clone(),
            turns: fuse.turns,
        });
    }
    debug!(fuse = fuse.id(), turns = fuse.turns, priority = fuse.priority, "fuse set");
    fuses.insert(fuse);
    Ok(())
}

fn cancel_fuse_with(
    fuses: &mut Registry<Fuse>,
    id: &str,
    ctx: &mut SchedulerContext<'_>,
    faults: &mut Vec<FaultRecord>,
) -> Vec<SemanticEvent> {
    let Some(mut fuse) = fuses.remove(id) else {
        return Vec::new();
    };
    debug!(fuse = id, remaining = fuse.turns, "fuse cancelled");

    let Some(hook) = fuse.on_cancel.as_mut() else {
        return Vec::new();
    };
    match hook(ctx) {
        Ok(mut events) => {
            stamp_events(&mut events, ctx.turn, &format!("cancel:{id}"));
            events
        }
        Err(err) => {
            warn!(fuse = id, error = %err, "fuse cancel hook failed");
            faults.push(FaultRecord::new(ctx.turn, FaultKind::CancelHookFault, id, &err));
            Vec::new()
        }
    }
}

fn record_fault(report: &mut TurnReport, kind: FaultKind, source: &str, err: BehaviorError) {
    warn!(turn = report.turn, source, error = %err, ?kind, "behavior fault isolated");
    report
        .faults
        .push(FaultRecord::new(report.turn, kind, source, &err));
}

/// Drain and apply the requests queued by the behavior `source`.
fn apply_requests(
    fuses: &mut Registry<Fuse>,
    daemons: &mut Registry<Daemon>,
    ctx: &mut SchedulerContext<'_>,
    report: &mut TurnReport,
    source: &str,
) {
    loop {
        let requests = ctx.take_requests();
        if requests.is_empty() {
            break;
        }
        for request in requests {
            match request {
                SchedulerRequest::SetFuse(fuse) => {
                    if let Err(err) = insert_fuse(fuses, fuse) {
                        record_fault(report, FaultKind::DaemonOrFuseFault, source, err.into());
                    }
                }
                SchedulerRequest::PauseFuse(id) => {
                    if let Some(fuse) = fuses.get_mut(&id) {
                        fuse.paused = true;
                    }
                }
                SchedulerRequest::ResumeFuse(id) => {
                    if let Some(fuse) = fuses.get_mut(&id) {
                        fuse.paused = false;
                    }
                }
                SchedulerRequest::CancelFuse(id) => {
                    let events = cancel_fuse_with(fuses, &id, ctx, &mut report.faults);
                    report.events.extend(events);
                }
                SchedulerRequest::AdjustFuse { id, delta } => {
                    if let Some(fuse) = fuses.get_mut(&id) {
                        fuse.adjust(delta);
                    }
                }
                SchedulerRequest::PauseDaemon(id) => {
                    if let Some(daemon) = daemons.get_mut(&id) {
                        daemon.paused = true;
                    }
                }
                SchedulerRequest::ResumeDaemon(id) => {
                    if let Some(daemon) = daemons.get_mut(&id) {
                        daemon.paused = false;
                    }
                }
                SchedulerRequest::RemoveDaemon(id) => {
                    daemons.remove(&id);
                }
            }
        }
    }
}
