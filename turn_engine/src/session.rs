//! Session - one scheduler and one state-machine engine driving one play
//! session.
//!
//! A turn:
//! 1. action events from the parser/action layer are stamped
//! 2. the scheduler runs due fuses, then daemons
//! 3. the engine processes action events followed by scheduler events,
//!    plus whatever its own effects emit on later passes
//! 4. with [`StateCheckPolicy::EveryTurn`], a state-check pass follows
//!
//! Everything produced is returned for the narration layer.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use world_model::{EntityId, WorldModel};

use crate::config::{EngineConfig, StateCheckPolicy};
use crate::error::FaultRecord;
use crate::events::{stamp_events, MessageDescriptor, SemanticEvent};
use crate::scheduler::{Scheduler, SchedulerSnapshot};
use crate::state_machine::{EngineReport, FiredTransition, InstanceSnapshot, StateMachineEngine};

/// Everything one turn produced, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub turn: u64,
    /// Action events, then scheduler events, then events emitted by effects.
    pub events: Vec<SemanticEvent>,
    pub messages: Vec<MessageDescriptor>,
    pub transitions: Vec<FiredTransition>,
    pub faults: Vec<FaultRecord>,
}

/// Saved runtime state of a whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub turn: u64,
    pub scheduler: SchedulerSnapshot,
    pub instances: Vec<InstanceSnapshot>,
}

#[derive(Debug)]
pub struct Session {
    config: EngineConfig,
    scheduler: Scheduler,
    engine: StateMachineEngine,
    turn: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        info!(seed = config.seed, max_event_passes = config.max_event_passes, "session created");
        Self {
            scheduler: Scheduler::new(config.seed),
            engine: StateMachineEngine::with_config(&config),
            config,
            turn: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Turns completed so far.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn engine(&self) -> &StateMachineEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut StateMachineEngine {
        &mut self.engine
    }

    /// Advance one turn.
    pub fn run_turn(&mut self, world: &mut dyn WorldModel, mut action_events: Vec<SemanticEvent>) -> TurnOutcome {
        self.turn += 1;
        let turn = self.turn;
        let player = world.player().cloned().unwrap_or_default();
        stamp_events(&mut action_events, turn, "action");

        let scheduled = self.scheduler.advance_turn(world, turn, &player);

        let mut batch = action_events;
        batch.extend(scheduled.events);

        self.engine.set_turn(turn);
        let mut report = self.engine.process(world, &batch, &player);
        if self.config.state_check == StateCheckPolicy::EveryTurn {
            report.extend(self.check_states(world, &player));
        }

        batch.extend(report.events);
        let mut faults = scheduled.faults;
        faults.extend(report.faults);

        debug!(
            turn,
            events = batch.len(),
            messages = report.messages.len(),
            transitions = report.transitions.len(),
            faults = faults.len(),
            "turn complete"
        );
        TurnOutcome {
            turn,
            events: batch,
            messages: report.messages,
            transitions: report.transitions,
            faults,
        }
    }

    /// Run a state-check pass outside the turn loop, for
    /// [`StateCheckPolicy::Manual`].
    pub fn run_state_check(&mut self, world: &mut dyn WorldModel) -> EngineReport {
        let player = world.player().cloned().unwrap_or_default();
        self.engine.set_turn(self.turn);
        self.check_states(world, &player)
    }

    fn check_states(&mut self, world: &mut dyn WorldModel, player: &EntityId) -> EngineReport {
        let mut report = self.engine.on_state_check(world, player);
        let follow_up = self.engine.process(world, &report.events, player);
        report.extend(follow_up);
        report
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            turn: self.turn,
            scheduler: self.scheduler.snapshot(),
            instances: self.engine.snapshot(),
        }
    }

    /// Restore onto a session whose story setup has already registered its
    /// daemons, fuses and definitions.
    pub fn restore(&mut self, snapshot: &SessionSnapshot) {
        self.turn = snapshot.turn;
        self.scheduler.restore(&snapshot.scheduler);
        self.engine.restore(&snapshot.instances);
        self.engine.set_turn(snapshot.turn);
        info!(turn = snapshot.turn, instances = snapshot.instances.len(), "session restored");
    }
}
