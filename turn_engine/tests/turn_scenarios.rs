//! Whole-turn scenarios run through a `Session`.

use turn_engine::{
    Bindings, BehaviorError, Daemon, Effect, EngineConfig, FaultKind, Fuse, FuseOutcome, Guard, SemanticEvent,
    Session, StateDef, StateMachineDefinition, Transition,
};
use world_model::{Entity, EntityId, TraitData, WorldModel, WorldState};

fn house() -> WorldState {
    let mut world = WorldState::new();
    world.add_entity(Entity::new("player", "yourself"));
    world.add_entity(Entity::new("living-room", "Living Room"));
    world.add_entity(Entity::new("cellar", "Cellar"));
    world.add_entity(Entity::new("troll", "troll"));
    world.add_entity(
        Entity::new("trap-door", "trap door").with_trait("openable", TraitData::new().with("open", false)),
    );
    world.set_player("player");
    world.set_entity_location("player", "living-room");
    world.set_entity_location("troll", "cellar");
    world
}

fn types(events: &[SemanticEvent]) -> Vec<&str> {
    events.iter().map(|e| e.event_type.as_str()).collect()
}

#[test]
fn test_three_turn_fuse_fires_once() {
    let mut session = Session::default();
    let mut world = house();
    session
        .scheduler_mut()
        .set_fuse(Fuse::new("match", 3, |_| Ok(FuseOutcome::event(SemanticEvent::new("match.out")))))
        .unwrap();

    let outcomes: Vec<_> = (0..5).map(|_| session.run_turn(&mut world, Vec::new())).collect();

    let fired: Vec<u64> = outcomes
        .iter()
        .filter(|o| types(&o.events).contains(&"match.out"))
        .map(|o| o.turn)
        .collect();
    assert_eq!(fired, vec![3]);
    assert!(!session.scheduler().has_fuse("match"));
}

#[test]
fn test_chained_stages_fire_at_five_eight_ten() {
    let mut session = Session::default();
    let mut world = house();
    session
        .scheduler_mut()
        .set_fuse(Fuse::new("flood.stage1", 5, |ctx| {
            ctx.world_mut().set_state("flood_stage", 1.into());
            Ok(FuseOutcome::event(SemanticEvent::new("flood.stage1")).then(Fuse::new(
                "flood.stage2",
                3,
                |ctx| {
                    ctx.world_mut().set_state("flood_stage", 2.into());
                    Ok(FuseOutcome::event(SemanticEvent::new("flood.stage2")).then(Fuse::new(
                        "flood.stage3",
                        2,
                        |ctx| {
                            ctx.world_mut().set_state("flood_stage", 3.into());
                            Ok(FuseOutcome::event(SemanticEvent::new("flood.stage3")))
                        },
                    )))
                },
            )))
        }))
        .unwrap();

    let mut fired = Vec::new();
    for _ in 0..12 {
        let outcome = session.run_turn(&mut world, Vec::new());
        for event in &outcome.events {
            fired.push((outcome.turn, event.event_type.clone()));
        }
    }

    assert_eq!(
        fired,
        vec![
            (5, "flood.stage1".to_string()),
            (8, "flood.stage2".to_string()),
            (10, "flood.stage3".to_string()),
        ]
    );
    assert_eq!(world.state("flood_stage").and_then(|v| v.as_int()), Some(3));
}

#[test]
fn test_guarded_machine_reaches_terminal_state() {
    let mut session = Session::default();
    let mut world = house();
    let id = session
        .engine_mut()
        .register(
            StateMachineDefinition::new("trap-door", "hidden")
                .with_state(
                    "hidden",
                    StateDef::new().with_transition(
                        Transition::on_event("if.event.opened", "open")
                            .with_filter("target", "$door")
                            .when(Guard::state("rug_moved", true))
                            .with_effect(Effect::set_trait("$door", "openable", "open", true))
                            .with_effect(Effect::message("trap_door.opens")),
                    ),
                )
                .with_state(
                    "open",
                    StateDef::new().with_transition(
                        Transition::on_event("if.event.entered", "used").with_effect(Effect::move_to("player", "cellar")),
                    ),
                )
                .with_state("used", StateDef::terminal()),
            Bindings::new().with("door", "trap-door"),
        )
        .unwrap();
    let open_door = || SemanticEvent::new("if.event.opened").with_entity("target", "trap-door");

    let outcome = session.run_turn(&mut world, vec![open_door()]);
    assert!(outcome.messages.is_empty());
    assert_eq!(session.engine().current_state(&id), Some("hidden"));

    world.set_state("rug_moved", true.into());
    let outcome = session.run_turn(&mut world, vec![open_door()]);
    assert_eq!(outcome.messages[0].message_id, "trap_door.opens");
    assert_eq!(session.engine().current_state(&id), Some("open"));

    session.run_turn(&mut world, vec![SemanticEvent::new("if.event.entered")]);
    assert!(session.engine().is_terminal(&id));
    assert_eq!(world.location_of(&EntityId::new("player")), Some(&EntityId::new("cellar")));

    let outcome = session.run_turn(&mut world, vec![open_door(), SemanticEvent::new("if.event.entered")]);
    assert!(outcome.transitions.is_empty());
    assert_eq!(session.engine().current_state(&id), Some("used"));
}

#[test]
fn test_higher_priority_daemon_event_comes_first() {
    let mut session = Session::default();
    let mut world = house();
    session
        .scheduler_mut()
        .register_daemon(Daemon::new("low", |_| Ok(vec![SemanticEvent::new("low")])).with_priority(1))
        .unwrap();
    session
        .scheduler_mut()
        .register_daemon(Daemon::new("high", |_| Ok(vec![SemanticEvent::new("high")])).with_priority(10))
        .unwrap();

    let outcome = session.run_turn(&mut world, vec![SemanticEvent::new("if.event.waited")]);

    assert_eq!(types(&outcome.events), vec!["if.event.waited", "high", "low"]);
}

#[test]
fn test_daemon_reacts_once_per_visit_via_handled_flag() {
    let mut session = Session::default();
    let mut world = house();
    let cellar = EntityId::new("cellar");
    session
        .scheduler_mut()
        .register_daemon(Daemon::new("troll.notices", |ctx| {
            if !ctx.player_is_in(&EntityId::new("cellar")) {
                ctx.world_mut().set_state("troll_noticed", false.into());
                return Ok(Vec::new());
            }
            if ctx.world().flag("troll_noticed") {
                return Ok(Vec::new());
            }
            ctx.world_mut().set_state("troll_noticed", true.into());
            Ok(vec![SemanticEvent::new("troll.growls").with_entity("actor", "troll")])
        }))
        .unwrap();
    fn growls(session: &mut Session, world: &mut WorldState) -> usize {
        let outcome = session.run_turn(world, Vec::new());
        outcome.events.iter().filter(|e| e.event_type == "troll.growls").count()
    }

    let mut counts = vec![growls(&mut session, &mut world)];
    world.move_entity(&EntityId::new("player"), &cellar).unwrap();
    counts.extend((0..3).map(|_| growls(&mut session, &mut world)));
    world.move_entity(&EntityId::new("player"), &EntityId::new("living-room")).unwrap();
    counts.push(growls(&mut session, &mut world));
    assert!(!world.flag("troll_noticed"));
    world.move_entity(&EntityId::new("player"), &cellar).unwrap();
    counts.extend((0..3).map(|_| growls(&mut session, &mut world)));

    assert_eq!(counts, vec![0, 1, 0, 0, 0, 1, 0, 0]);
    assert_eq!(counts.iter().sum::<usize>(), 2);
    assert!(session.scheduler().has_daemon("troll.notices"));
}

#[test]
fn test_faults_do_not_abort_the_turn() {
    let mut session = Session::default();
    let mut world = house();
    session
        .scheduler_mut()
        .register_daemon(Daemon::new("broken", |_| Err(BehaviorError::failed("broken daemon"))).with_priority(5))
        .unwrap();
    session
        .scheduler_mut()
        .register_daemon(Daemon::new("steady", |_| Ok(vec![SemanticEvent::new("tick")])))
        .unwrap();

    let outcome = session.run_turn(&mut world, Vec::new());

    assert_eq!(types(&outcome.events), vec!["tick"]);
    assert_eq!(outcome.faults.len(), 1);
    assert_eq!(outcome.faults[0].kind, FaultKind::DaemonOrFuseFault);
    assert_eq!(outcome.faults[0].source, "broken");
}

fn random_story(seed: u64) -> Vec<SemanticEvent> {
    let mut session = Session::new(EngineConfig::default().with_seed(seed));
    let mut world = house();
    session
        .scheduler_mut()
        .register_daemon(
            Daemon::new("troll.wanders", |ctx| {
                let rooms = ["living-room", "cellar"];
                let Some(room) = ctx.random().pick(&rooms) else {
                    return Ok(Vec::new());
                };
                let room = EntityId::new(*room);
                ctx.world_mut().move_entity(&EntityId::new("troll"), &room)?;
                ctx.set_fuse(Fuse::new("troll.rests", ctx.random().int(1, 3) as u32, |_| {
                    Ok(FuseOutcome::event(SemanticEvent::new("troll.rests")))
                }));
                Ok(vec![SemanticEvent::new("troll.moved").with_entity("destination", room)])
            })
            .with_condition(|ctx| ctx.random().chance(0.6)),
        )
        .unwrap();

    (0..25)
        .flat_map(|turn| session.run_turn(&mut world, vec![SemanticEvent::new("if.event.waited").with_data("n", turn)]).events)
        .collect()
}

#[test]
fn test_same_seed_replays_identically() {
    let first = random_story(2024);
    let second = random_story(2024);

    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert!(first.iter().all(|e| !e.id.is_nil()));
}

#[test]
fn test_definition_loaded_from_toml() {
    let definition = StateMachineDefinition::from_toml_str(
        r#"
        id = "lamp"
        initial_state = "off"

        [states.off]
        [[states.off.transitions]]
        target = "on"
        trigger = { type = "event", event_type = "if.event.switched_on", filter = { target = "$lamp" } }
        effects = [
            { type = "set_state", key = "lamp_lit", value = true },
            { type = "message", message_id = "lamp.on", params = { lamp = "$lamp" } },
        ]

        [states.on]
        [[states.on.transitions]]
        target = "off"
        trigger = { type = "event", event_type = "if.event.switched_off", filter = { target = "$lamp" } }
        effects = [{ type = "set_state", key = "lamp_lit", value = false }]
        "#,
    )
    .unwrap();

    let mut session = Session::default();
    let mut world = house();
    world.add_entity(Entity::new("lamp", "brass lamp"));
    let id = session
        .engine_mut()
        .register(definition, Bindings::new().with("lamp", "lamp"))
        .unwrap();

    let outcome = session.run_turn(
        &mut world,
        vec![SemanticEvent::new("if.event.switched_on").with_entity("target", "lamp")],
    );

    assert_eq!(session.engine().current_state(&id), Some("on"));
    assert!(world.flag("lamp_lit"));
    assert_eq!(outcome.messages[0].params["lamp"], "lamp");
}
