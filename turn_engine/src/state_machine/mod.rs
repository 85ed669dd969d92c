//! Declarative state machines.
//!
//! A [`StateMachineDefinition`] names states and, per state, an ordered list
//! of transitions. Definitions are instantiated with [`Bindings`] that map
//! placeholders to concrete entities, so one definition can drive many
//! instances (every door in the house, say).
//!
//! Dispatch rules:
//! - instances are visited in instantiation order
//! - for each instance the transitions of its current state are scanned in
//!   declared order and the first one whose trigger matches and whose guard
//!   holds fires; at most one transition per instance per event
//! - firing runs the effects in order, then moves to the target state
//! - an instance in a terminal state is never dispatched again

mod definition;
mod effect;
mod guard;
mod instance;

pub use definition::*;
pub use effect::*;
pub use guard::*;
pub use instance::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use world_model::{EntityId, WorldModel};

use crate::config::EngineConfig;
use crate::error::{DefinitionError, FaultKind, FaultRecord};
use crate::events::{MessageDescriptor, SemanticEvent};

/// One transition that fired during dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredTransition {
    pub instance_id: String,
    pub from: String,
    pub to: String,
    pub event_type: Option<String>,
}

/// Output of one dispatch call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineReport {
    pub transitions: Vec<FiredTransition>,
    pub messages: Vec<MessageDescriptor>,
    /// Events emitted by effects, stamped, in emission order.
    pub events: Vec<SemanticEvent>,
    pub faults: Vec<FaultRecord>,
    /// Emitted events left unprocessed when the pass limit was reached.
    pub dropped_events: usize,
}

impl EngineReport {
    pub fn extend(&mut self, other: EngineReport) {
        self.transitions.extend(other.transitions);
        self.messages.extend(other.messages);
        self.events.extend(other.events);
        self.faults.extend(other.faults);
        self.dropped_events += other.dropped_events;
    }
}

/// Owns definitions and live instances for one session.
#[derive(Debug)]
pub struct StateMachineEngine {
    definitions: BTreeMap<String, StateMachineDefinition>,
    instances: Vec<StateMachineInstance>,
    next_instance: u64,
    max_event_passes: usize,
    history_limit: usize,
    turn: u64,
    emitted: usize,
    faults: Vec<FaultRecord>,
}

impl Default for StateMachineEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachineEngine {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            definitions: BTreeMap::new(),
            instances: Vec::new(),
            next_instance: 0,
            max_event_passes: config.max_event_passes.max(1),
            history_limit: config.history_limit,
            turn: 0,
            emitted: 0,
            faults: Vec::new(),
        }
    }

    /// Validate and store a definition.
    pub fn define(&mut self, definition: StateMachineDefinition) -> Result<(), DefinitionError> {
        definition.validate()?;
        if self.definitions.contains_key(&definition.id) {
            return Err(DefinitionError::DuplicateId(definition.id));
        }
        debug!(machine = %definition.id, states = definition.states.len(), "state machine defined");
        self.definitions.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Create a live instance in the definition's initial state. Returns the
    /// new instance id.
    pub fn instantiate(&mut self, definition_id: &str, bindings: Bindings) -> Result<String, DefinitionError> {
        let definition = self
            .definitions
            .get(definition_id)
            .ok_or_else(|| DefinitionError::UnknownDefinition(definition_id.to_string()))?;

        let mut instance_id = format!("{}#{}", definition_id, self.next_instance);
        while self.instances.iter().any(|i| i.instance_id == instance_id) {
            self.next_instance += 1;
            instance_id = format!("{}#{}", definition_id, self.next_instance);
        }
        self.next_instance += 1;

        debug!(instance = %instance_id, state = %definition.initial_state, "state machine instantiated");
        self.instances.push(StateMachineInstance::new(
            instance_id.clone(),
            definition_id.to_string(),
            bindings,
            definition.initial_state.clone(),
        ));
        Ok(instance_id)
    }

    /// Define and instantiate in one step.
    pub fn register(
        &mut self,
        definition: StateMachineDefinition,
        bindings: Bindings,
    ) -> Result<String, DefinitionError> {
        let definition_id = definition.id.clone();
        self.define(definition)?;
        self.instantiate(&definition_id, bindings)
    }

    /// Set the turn used for fault records and event ids.
    pub fn set_turn(&mut self, turn: u64) {
        if turn != self.turn {
            self.turn = turn;
            self.emitted = 0;
        }
    }

    /// Dispatch one event to every live instance.
    ///
    /// Events emitted by effects are returned in the report but not
    /// dispatched; use [`process`](Self::process) for that.
    pub fn on_event(&mut self, world: &mut dyn WorldModel, event: &SemanticEvent, player: &EntityId) -> EngineReport {
        let mut report = EngineReport::default();
        self.dispatch(world, player, Some(event), &mut report);
        self.faults.extend(report.faults.iter().cloned());
        report
    }

    /// Evaluate `State` triggers for every live instance.
    pub fn on_state_check(&mut self, world: &mut dyn WorldModel, player: &EntityId) -> EngineReport {
        let mut report = EngineReport::default();
        self.dispatch(world, player, None, &mut report);
        self.faults.extend(report.faults.iter().cloned());
        report
    }

    /// Dispatch a batch of events, then the events their effects emit, pass
    /// after pass, up to the configured pass limit.
    pub fn process(&mut self, world: &mut dyn WorldModel, events: &[SemanticEvent], player: &EntityId) -> EngineReport {
        let mut report = EngineReport::default();
        let mut pending = events.to_vec();
        let mut passes = 0;

        while !pending.is_empty() {
            if passes == self.max_event_passes {
                warn!(
                    turn = self.turn,
                    dropped = pending.len(),
                    limit = self.max_event_passes,
                    "event pass limit reached; dropping emitted events"
                );
                report.dropped_events = pending.len();
                break;
            }
            passes += 1;

            let mut emitted = Vec::new();
            for event in &pending {
                let before = report.events.len();
                self.dispatch(world, player, Some(event), &mut report);
                emitted.extend_from_slice(&report.events[before..]);
            }
            pending = emitted;
        }

        self.faults.extend(report.faults.iter().cloned());
        report
    }

    fn dispatch(
        &mut self,
        world: &mut dyn WorldModel,
        player: &EntityId,
        event: Option<&SemanticEvent>,
        report: &mut EngineReport,
    ) {
        let Self {
            definitions,
            instances,
            history_limit,
            turn,
            emitted,
            ..
        } = self;
        let turn = *turn;
        let history_limit = *history_limit;

        for instance in instances.iter_mut() {
            let Some(definition) = definitions.get(&instance.definition_id) else {
                continue;
            };
            let Some(state) = definition.state(&instance.current_state) else {
                continue;
            };
            if state.terminal {
                continue;
            }

            let mut selected = None;
            for transition in &state.transitions {
                let triggered = match (&transition.trigger, event) {
                    (TransitionTrigger::Event { .. }, Some(event)) => {
                        transition.trigger.matches_event(event, &instance.bindings)
                    }
                    (TransitionTrigger::State { condition }, None) => {
                        check_guard(condition, &*world, instance, player, turn, report)
                    }
                    _ => false,
                };
                if !triggered {
                    continue;
                }
                let allowed = transition
                    .guard
                    .as_ref()
                    .map_or(true, |guard| check_guard(guard, &*world, instance, player, turn, report));
                if allowed {
                    selected = Some(transition);
                    break;
                }
            }
            let Some(transition) = selected else {
                continue;
            };

            let mut output = EffectOutput::new();
            for effect in &transition.effects {
                if let Err(err) = effect.apply(world, &instance.bindings, player, &mut output) {
                    warn!(instance = %instance.instance_id, error = %err, "effect failed; skipping remaining effects");
                    report.faults.push(FaultRecord::new(
                        turn,
                        FaultKind::EffectExecutionFault,
                        instance.instance_id.as_str(),
                        &err,
                    ));
                    break;
                }
            }

            let emitter = format!("machine:{}", instance.instance_id);
            for mut emitted_event in output.events {
                emitted_event.stamp(turn, &emitter, *emitted);
                *emitted += 1;
                report.events.push(emitted_event);
            }
            report.messages.extend(output.messages);

            let from = std::mem::replace(&mut instance.current_state, transition.target.clone());
            let event_type = event.map(|e| e.event_type.clone());
            debug!(
                turn,
                instance = %instance.instance_id,
                from = %from,
                to = %transition.target,
                "state machine transition"
            );
            instance.record(
                StateChange {
                    turn,
                    from: from.clone(),
                    to: transition.target.clone(),
                    event_type: event_type.clone(),
                },
                history_limit,
            );
            report.transitions.push(FiredTransition {
                instance_id: instance.instance_id.clone(),
                from,
                to: transition.target.clone(),
                event_type,
            });
        }
    }

    pub fn instance(&self, instance_id: &str) -> Option<&StateMachineInstance> {
        self.instances.iter().find(|i| i.instance_id == instance_id)
    }

    pub fn current_state(&self, instance_id: &str) -> Option<&str> {
        self.instance(instance_id).map(|i| i.current_state.as_str())
    }

    /// All instances in instantiation order.
    pub fn instances(&self) -> &[StateMachineInstance] {
        &self.instances
    }

    pub fn definition(&self, definition_id: &str) -> Option<&StateMachineDefinition> {
        self.definitions.get(definition_id)
    }

    /// True when the instance exists and sits in a terminal state.
    pub fn is_terminal(&self, instance_id: &str) -> bool {
        self.instance(instance_id).map_or(false, |instance| {
            self.definitions
                .get(&instance.definition_id)
                .map_or(false, |d| d.is_terminal(&instance.current_state))
        })
    }

    /// Every fault recorded by guards and effects, oldest first.
    pub fn faults(&self) -> &[FaultRecord] {
        &self.faults
    }

    pub fn snapshot(&self) -> Vec<InstanceSnapshot> {
        self.instances.iter().map(StateMachineInstance::snapshot).collect()
    }

    /// Replace the live instances with saved ones. Snapshots naming an
    /// unknown definition or state are skipped.
    pub fn restore(&mut self, snapshots: &[InstanceSnapshot]) {
        let mut restored = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let Some(definition) = self.definitions.get(&snapshot.definition_id) else {
                warn!(instance = %snapshot.instance_id, definition = %snapshot.definition_id, "saved instance has no definition; skipping");
                continue;
            };
            if definition.state(&snapshot.current_state).is_none() {
                warn!(instance = %snapshot.instance_id, state = %snapshot.current_state, "saved instance is in an unknown state; skipping");
                continue;
            }
            restored.push(StateMachineInstance {
                instance_id: snapshot.instance_id.clone(),
                definition_id: snapshot.definition_id.clone(),
                bindings: snapshot.bindings.clone(),
                current_state: snapshot.current_state.clone(),
                history: snapshot.history.clone(),
            });
        }
        for instance in &mut restored {
            trim_history(&mut instance.history, self.history_limit);
        }
        self.instances = restored;
        self.next_instance = self.next_instance.max(self.instances.len() as u64);
    }
}

fn check_guard(
    guard: &Guard,
    world: &dyn WorldModel,
    instance: &StateMachineInstance,
    player: &EntityId,
    turn: u64,
    report: &mut EngineReport,
) -> bool {
    match guard.evaluate(world, &instance.bindings, player) {
        Ok(holds) => holds,
        Err(err) => {
            warn!(instance = %instance.instance_id, error = %err, "guard failed; treating as false");
            report.faults.push(FaultRecord::new(
                turn,
                FaultKind::GuardEvaluationFault,
                instance.instance_id.as_str(),
                &err,
            ));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BehaviorError;
    use serde_json::{json, Map};
    use world_model::{Entity, TraitData, WorldState};

    fn world() -> WorldState {
        let mut world = WorldState::new();
        world.add_entity(Entity::new("player", "yourself"));
        world.add_entity(Entity::new("living-room", "Living Room"));
        world.add_entity(Entity::new("cellar", "Cellar"));
        world.add_entity(
            Entity::new("trap-door", "trap door").with_trait("openable", TraitData::new().with("open", false)),
        );
        world.add_entity(
            Entity::new("front-door", "front door").with_trait("openable", TraitData::new().with("open", false)),
        );
        world.set_player("player");
        world.set_entity_location("player", "living-room");
        world
    }

    fn player() -> EntityId {
        EntityId::new("player")
    }

    /// A → B on X when F is set; B → C (terminal) on Y.
    fn abc() -> StateMachineDefinition {
        StateMachineDefinition::new("abc", "A")
            .with_state(
                "A",
                StateDef::new().with_transition(
                    Transition::on_event("X", "B")
                        .when(Guard::state("F", true))
                        .with_effect(Effect::message("went.b")),
                ),
            )
            .with_state(
                "B",
                StateDef::new().with_transition(Transition::on_event("Y", "C").with_effect(Effect::message("went.c"))),
            )
            .with_state(
                "C",
                StateDef::terminal().with_transition(Transition::on_event("Y", "A")),
            )
    }

    #[test]
    fn test_guarded_chain_to_terminal() {
        let mut engine = StateMachineEngine::new();
        let mut world = world();
        let id = engine.register(abc(), Bindings::new()).unwrap();
        assert_eq!(engine.current_state(&id), Some("A"));

        let report = engine.on_event(&mut world, &SemanticEvent::new("X"), &player());
        assert!(report.transitions.is_empty());
        assert_eq!(engine.current_state(&id), Some("A"));

        world.global_flags.insert("F".to_string(), true.into());
        let report = engine.on_event(&mut world, &SemanticEvent::new("X"), &player());
        assert_eq!(engine.current_state(&id), Some("B"));
        assert_eq!(report.messages[0].message_id, "went.b");

        engine.on_event(&mut world, &SemanticEvent::new("Y"), &player());
        assert_eq!(engine.current_state(&id), Some("C"));
        assert!(engine.is_terminal(&id));

        for event_type in ["X", "Y", "Y"] {
            let report = engine.on_event(&mut world, &SemanticEvent::new(event_type), &player());
            assert!(report.transitions.is_empty());
        }
        assert_eq!(engine.current_state(&id), Some("C"));
        assert_eq!(engine.instance(&id).unwrap().history.len(), 2);
    }

    #[test]
    fn test_first_matching_transition_wins() {
        let definition = StateMachineDefinition::new("race", "start")
            .with_state(
                "start",
                StateDef::new()
                    .with_transition(Transition::on_event("go", "blocked").when(Guard::state("never", true)))
                    .with_transition(Transition::on_event("go", "first").with_effect(Effect::set_state("first", true)))
                    .with_transition(Transition::on_event("go", "second").with_effect(Effect::set_state("second", true))),
            )
            .with_state("blocked", StateDef::terminal())
            .with_state("first", StateDef::new())
            .with_state("second", StateDef::new());
        let mut engine = StateMachineEngine::new();
        let mut world = world();
        let id = engine.register(definition, Bindings::new()).unwrap();

        let report = engine.on_event(&mut world, &SemanticEvent::new("go"), &player());

        assert_eq!(report.transitions.len(), 1);
        assert_eq!(engine.current_state(&id), Some("first"));
        assert!(world.flag("first"));
        assert!(!world.flag("second"));
    }

    #[test]
    fn test_one_definition_many_instances() {
        let definition = StateMachineDefinition::new("door", "closed")
            .with_state(
                "closed",
                StateDef::new().with_transition(
                    Transition::on_event("if.event.opened", "open")
                        .with_filter("target", "$door")
                        .with_effect(Effect::set_trait("$door", "openable", "open", true)),
                ),
            )
            .with_state("open", StateDef::new());
        let mut engine = StateMachineEngine::new();
        let mut world = world();
        engine.define(definition).unwrap();
        let trap = engine.instantiate("door", Bindings::new().with("door", "trap-door")).unwrap();
        let front = engine.instantiate("door", Bindings::new().with("door", "front-door")).unwrap();
        assert_ne!(trap, front);

        let event = SemanticEvent::new("if.event.opened").with_entity("target", "trap-door");
        engine.on_event(&mut world, &event, &player());

        assert_eq!(engine.current_state(&trap), Some("open"));
        assert_eq!(engine.current_state(&front), Some("closed"));
        assert_eq!(
            world.trait_property(&EntityId::new("trap-door"), "openable", "open"),
            Some(&json!(true))
        );
        assert_eq!(
            world.trait_property(&EntityId::new("front-door"), "openable", "open"),
            Some(&json!(false))
        );
    }

    #[test]
    fn test_registration_errors() {
        let mut engine = StateMachineEngine::new();
        engine.define(abc()).unwrap();

        assert!(matches!(engine.define(abc()), Err(DefinitionError::DuplicateId(id)) if id == "abc"));
        assert!(matches!(
            engine.instantiate("missing", Bindings::new()),
            Err(DefinitionError::UnknownDefinition(_))
        ));
        assert!(engine.instances().is_empty());
    }

    #[test]
    fn test_state_check() {
        let definition = StateMachineDefinition::new("flood", "dry")
            .with_state(
                "dry",
                StateDef::new().with_transition(
                    Transition::on_state(Guard::state("dam_open", true), "flooded")
                        .with_effect(Effect::message("water.rises")),
                ),
            )
            .with_state("flooded", StateDef::terminal());
        let mut engine = StateMachineEngine::new();
        let mut world = world();
        let id = engine.register(definition, Bindings::new()).unwrap();

        let report = engine.on_event(&mut world, &SemanticEvent::new("dam_open"), &player());
        assert!(report.transitions.is_empty());

        assert!(engine.on_state_check(&mut world, &player()).transitions.is_empty());

        world.global_flags.insert("dam_open".to_string(), true.into());
        let report = engine.on_state_check(&mut world, &player());
        assert_eq!(report.transitions[0].event_type, None);
        assert_eq!(engine.current_state(&id), Some("flooded"));
    }

    #[test]
    fn test_guard_fault_counts_as_false() {
        let definition = StateMachineDefinition::new("fragile", "idle")
            .with_state(
                "idle",
                StateDef::new()
                    .with_transition(
                        Transition::on_event("poke", "broken")
                            .when(Guard::custom(|_, _, _| Err(BehaviorError::failed("guard blew up")))),
                    )
                    .with_transition(Transition::on_event("poke", "poked")),
            )
            .with_state("broken", StateDef::new())
            .with_state("poked", StateDef::new());
        let mut engine = StateMachineEngine::new();
        let mut world = world();
        let id = engine.register(definition, Bindings::new()).unwrap();

        let report = engine.on_event(&mut world, &SemanticEvent::new("poke"), &player());

        assert_eq!(engine.current_state(&id), Some("poked"));
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].kind, FaultKind::GuardEvaluationFault);
        assert_eq!(report.faults[0].source, id);
        assert_eq!(engine.faults().len(), 1);
    }

    #[test]
    fn test_effect_fault_skips_rest_but_commits() {
        let definition = StateMachineDefinition::new("sparks", "idle")
            .with_state(
                "idle",
                StateDef::new().with_transition(
                    Transition::on_event("zap", "zapped")
                        .with_effect(Effect::set_state("before", true))
                        .with_effect(Effect::custom(|_, _, _| Err(BehaviorError::failed("short circuit"))))
                        .with_effect(Effect::set_state("after", true)),
                ),
            )
            .with_state("zapped", StateDef::new());
        let mut engine = StateMachineEngine::new();
        let mut world = world();
        let id = engine.register(definition, Bindings::new()).unwrap();

        let report = engine.on_event(&mut world, &SemanticEvent::new("zap"), &player());

        assert_eq!(engine.current_state(&id), Some("zapped"));
        assert!(world.flag("before"));
        assert!(!world.flag("after"));
        assert_eq!(report.faults[0].kind, FaultKind::EffectExecutionFault);
    }

    fn relay() -> StateMachineDefinition {
        StateMachineDefinition::new("relay", "waiting")
            .with_state(
                "waiting",
                StateDef::new().with_transition(
                    Transition::on_event("ping", "waiting")
                        .with_effect(Effect::emit_event("ping", Map::new()))
                        .with_effect(Effect::message("pinged")),
                ),
            )
    }

    #[test]
    fn test_process_dispatches_emitted_events_on_later_passes() {
        let definition = StateMachineDefinition::new("bell", "silent")
            .with_state(
                "silent",
                StateDef::new().with_transition(
                    Transition::on_event("rope.pulled", "ringing").with_effect(Effect::emit_event("bell.rang", Map::new())),
                ),
            )
            .with_state(
                "ringing",
                StateDef::new().with_transition(Transition::on_event("bell.rang", "echoing")),
            )
            .with_state("echoing", StateDef::terminal());
        let mut engine = StateMachineEngine::new();
        let mut world = world();
        let id = engine.register(definition, Bindings::new()).unwrap();
        engine.set_turn(4);

        let report = engine.process(&mut world, &[SemanticEvent::new("rope.pulled")], &player());

        assert_eq!(engine.current_state(&id), Some("echoing"));
        assert_eq!(report.transitions.len(), 2);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].timestamp, 4);
        assert!(!report.events[0].id.is_nil());
        assert_eq!(report.dropped_events, 0);
    }

    #[test]
    fn test_process_stops_at_pass_limit() {
        let config = EngineConfig {
            max_event_passes: 3,
            ..EngineConfig::default()
        };
        let mut engine = StateMachineEngine::with_config(&config);
        let mut world = world();
        engine.register(relay(), Bindings::new()).unwrap();

        let report = engine.process(&mut world, &[SemanticEvent::new("ping")], &player());

        assert_eq!(report.messages.len(), 3);
        assert_eq!(report.events.len(), 3);
        assert_eq!(report.dropped_events, 1);
    }

    #[test]
    fn test_zero_pass_limit_still_dispatches_first_batch() {
        let config = EngineConfig {
            max_event_passes: 0,
            ..EngineConfig::default()
        };
        let mut engine = StateMachineEngine::with_config(&config);
        let mut world = world();
        engine.register(relay(), Bindings::new()).unwrap();

        let report = engine.process(&mut world, &[SemanticEvent::new("ping")], &player());

        assert_eq!(report.transitions.len(), 1);
        assert_eq!(report.messages.len(), 1);
        assert_eq!(report.dropped_events, 1);
    }

    #[test]
    fn test_history_keeps_newest_changes_up_to_limit() {
        let config = EngineConfig {
            max_event_passes: 5,
            history_limit: 2,
            ..EngineConfig::default()
        };
        let mut engine = StateMachineEngine::with_config(&config);
        let mut world = world();
        let id = engine.register(relay(), Bindings::new()).unwrap();
        engine.set_turn(7);

        let report = engine.process(&mut world, &[SemanticEvent::new("ping")], &player());

        assert_eq!(report.transitions.len(), 5);
        let history = &engine.instance(&id).unwrap().history;
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|change| change.turn == 7 && change.to == "waiting"));

        let snapshot = engine.snapshot();
        assert_eq!(snapshot[0].history.len(), 2);

        let mut unrecorded = StateMachineEngine::with_config(&EngineConfig {
            history_limit: 0,
            ..EngineConfig::default()
        });
        unrecorded.define(relay()).unwrap();
        unrecorded.restore(&snapshot);
        assert!(unrecorded.instance(&id).unwrap().history.is_empty());
    }

    #[test]
    fn test_emitted_event_ids_are_unique_within_a_turn() {
        let config = EngineConfig {
            max_event_passes: 3,
            ..EngineConfig::default()
        };
        let mut engine = StateMachineEngine::with_config(&config);
        let mut world = world();
        engine.register(relay(), Bindings::new()).unwrap();
        engine.set_turn(1);

        let report = engine.process(&mut world, &[SemanticEvent::new("ping")], &player());
        let mut ids: Vec<_> = report.events.iter().map(|e| e.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_snapshot_and_restore() {
        let mut engine = StateMachineEngine::new();
        let mut world = world();
        world.global_flags.insert("F".to_string(), true.into());
        let id = engine.register(abc(), Bindings::new()).unwrap();
        engine.on_event(&mut world, &SemanticEvent::new("X"), &player());

        let json = serde_json::to_string(&engine.snapshot()).unwrap();
        let saved: Vec<InstanceSnapshot> = serde_json::from_str(&json).unwrap();

        let mut fresh = StateMachineEngine::new();
        let fresh_id = fresh.register(abc(), Bindings::new()).unwrap();
        assert_eq!(fresh_id, id);
        fresh.restore(&saved);

        assert_eq!(fresh.current_state(&id), Some("B"));
        fresh.on_event(&mut world, &SemanticEvent::new("Y"), &player());
        assert!(fresh.is_terminal(&id));
    }

    #[test]
    fn test_restore_skips_unknown_definitions_and_states() {
        let mut engine = StateMachineEngine::new();
        engine.define(abc()).unwrap();

        engine.restore(&[
            InstanceSnapshot {
                instance_id: "ghost#0".to_string(),
                definition_id: "ghost".to_string(),
                bindings: Bindings::new(),
                current_state: "A".to_string(),
                history: Vec::new(),
            },
            InstanceSnapshot {
                instance_id: "abc#0".to_string(),
                definition_id: "abc".to_string(),
                bindings: Bindings::new(),
                current_state: "Z".to_string(),
                history: Vec::new(),
            },
            InstanceSnapshot {
                instance_id: "abc#1".to_string(),
                definition_id: "abc".to_string(),
                bindings: Bindings::new(),
                current_state: "C".to_string(),
                history: Vec::new(),
            },
        ]);

        assert_eq!(engine.instances().len(), 1);
        assert!(engine.is_terminal("abc#1"));

        let next = engine.instantiate("abc", Bindings::new()).unwrap();
        assert_ne!(next, "abc#1");
    }
}
