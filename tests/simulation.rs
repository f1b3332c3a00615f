//! End-to-end simulation tests through the public `World` API

use std::cell::RefCell;
use std::rc::Rc;

use databus::game::behavior::BehaviorState;
use databus::game::collision::CollisionResponse;
use databus::game::events::SimEventData;
use databus::game::NpcArchetypeProfile;
use databus::{Collider, CollisionLayers, Entity, EntityId, EntityKind, PhysicsBody, Vec2, World};
use proptest::prelude::*;

const FRAME: f64 = 16.0;

fn hero_id() -> EntityId {
    EntityId::new("hero")
}

/// Hero resting on a wide floor whose top is y = 200.
fn floor_world() -> World {
    let mut world = World::default();
    world.set_world_size(4000.0, 400.0).unwrap();
    let floor = Entity::new("floor", EntityKind::Object, Vec2::new(0.0, 200.0))
        .with_collider(Collider::new(Vec2::new(4000.0, 40.0)).with_layer(CollisionLayers::WORLD));
    world.spawn_entity(floor).unwrap();
    let hero = Entity::new("hero", EntityKind::Player, Vec2::new(2000.0, 176.0))
        .with_collider(Collider::new(Vec2::new(16.0, 24.0)).with_layer(CollisionLayers::PLAYER))
        .with_body(PhysicsBody::platformer());
    world.spawn_entity(hero).unwrap();
    world.set_player(&hero_id()).unwrap();
    world
}

fn top_down_npc(world: &mut World, id: &str, position: Vec2, profile: NpcArchetypeProfile) -> EntityId {
    let entity = Entity::new(id, EntityKind::Npc, position).with_body(PhysicsBody::top_down());
    world.spawn_entity(entity).unwrap();
    let id = EntityId::new(id);
    assert!(world.set_npc_profile(&id, profile));
    id
}

#[test]
fn test_scene_json_player_lands_on_world_bound() {
    let json = r#"{
        "world_size": {"x": 640, "y": 360},
        "world_bounds_enabled": true,
        "player_id": "hero",
        "entities": [
            {"id": "hero", "type": "player", "position": {"x": 32, "y": 300},
             "collider": {"size": {"x": 16, "y": 24}, "layer": 2},
             "physics_body": {"affected_by_gravity": true},
             "sprite": "hero.png"}
        ]
    }"#;
    let mut world = World::default();
    world.load_scene_json(json).unwrap();
    assert_eq!(world.player().unwrap().visual.get("sprite"), Some(&serde_json::json!("hero.png")));

    for _ in 0..60 {
        world.step_physics(FRAME);
    }
    let hero = world.player().unwrap();
    assert!((hero.position.y - 336.0).abs() < 1e-9);
    assert_eq!(hero.velocity().y, 0.0);
    assert!(world.is_grounded(&hero_id()));
}

#[test]
fn test_worlds_are_independent() {
    let mut a = floor_world();
    let mut b = floor_world();
    a.pause_world("menu");
    b.set_move_input(1.0);

    for _ in 0..10 {
        a.step_physics(FRAME);
        b.step_physics(FRAME);
    }
    assert_eq!(a.now_ms(), 0);
    assert_eq!(b.now_ms(), 160);
    assert_eq!(a.player().unwrap().position.x, 2000.0);
    assert!(b.player().unwrap().position.x > 2000.0);
}

#[test]
fn test_pause_hooks_fire_on_edges() {
    let mut world = floor_world();
    let log = Rc::new(RefCell::new(Vec::new()));
    let l = log.clone();
    world.on_pause(move |e| l.borrow_mut().push(("pause", e.reasons.clone())));
    let l = log.clone();
    world.on_resume(move |e| l.borrow_mut().push(("resume", e.reasons.clone())));

    world.pause_world("inventory");
    world.pause_world("dialog");
    world.resume_world("inventory");
    world.resume_world("dialog");
    world.pause_world("");
    world.clear_pause_reasons();

    let log = log.borrow();
    assert_eq!(log.len(), 4);
    assert_eq!(log[0], ("pause", vec!["inventory".to_string()]));
    assert_eq!(log[1], ("resume", vec![]));
    assert_eq!(log[2], ("pause", vec!["manual".to_string()]));
    assert_eq!(log[3].0, "resume");
}

#[test]
fn test_waypoint_npc_cycles() {
    let mut world = World::default();
    let profile = NpcArchetypeProfile::waypoints(vec![Vec2::new(100.0, 100.0), Vec2::new(140.0, 100.0)], 60.0);
    let npc = top_down_npc(&mut world, "walker", Vec2::new(100.0, 100.0), profile);

    let mut went_right = false;
    let mut went_left = false;
    for _ in 0..120 {
        world.step_physics(FRAME);
        let walker = world.entity(&npc).unwrap();
        assert!(walker.position.x > 95.0 && walker.position.x < 145.0);
        assert_eq!(walker.behavior_state, BehaviorState::Patrol);
        went_right |= walker.velocity().x > 0.0;
        went_left |= walker.velocity().x < 0.0;
    }
    assert!(went_right && went_left);
}

#[test]
fn test_roam_is_centred_on_anchor_whenever_attached() {
    let mut world = World::default();
    let entity = Entity::new("moth", EntityKind::Npc, Vec2::new(500.0, 100.0)).with_body(PhysicsBody::top_down());
    world.spawn_entity(entity).unwrap();
    let moth = EntityId::new("moth");

    // Attach mid-run so the clock is not at a cycle boundary
    world.step_physics(250.0);
    assert_eq!(world.now_ms(), 250);
    assert!(world.set_npc_profile(&moth, NpcArchetypeProfile::roam(40.0, 1.0)));

    let (mut min, mut max) = (Vec2::new(f64::MAX, f64::MAX), Vec2::new(f64::MIN, f64::MIN));
    for _ in 0..63 {
        world.step_physics(FRAME);
        let p = world.entity(&moth).unwrap().position;
        min = Vec2::new(min.x.min(p.x), min.y.min(p.y));
        max = Vec2::new(max.x.max(p.x), max.y.max(p.y));
        assert_eq!(world.behavior_state(&moth), Some(&BehaviorState::Patrol));
    }

    assert!(((min.x + max.x) / 2.0 - 500.0).abs() < 5.0);
    assert!(((min.y + max.y) / 2.0 - 100.0).abs() < 5.0);
    assert!(max.x - min.x > 70.0);
    assert!(max.y - min.y > 30.0);
}

#[test]
fn test_chase_window() {
    let mut world = World::default();
    world.spawn_entity(Entity::new("hero", EntityKind::Player, Vec2::new(300.0, 100.0))).unwrap();
    world.set_player(&hero_id()).unwrap();
    let npc = top_down_npc(&mut world, "hound", Vec2::new(150.0, 100.0), NpcArchetypeProfile::chase(200.0, 20.0, 80.0));

    world.step_physics(FRAME);
    let hound = world.entity(&npc).unwrap();
    assert_eq!(hound.behavior_state, BehaviorState::Chase);
    assert!((hound.velocity().x - 80.0).abs() < 1e-9);

    world.player_mut().unwrap().position = Vec2::new(1000.0, 100.0);
    world.step_physics(FRAME);
    let hound = world.entity(&npc).unwrap();
    assert_eq!(hound.behavior_state, BehaviorState::Idle);
    assert_eq!(hound.velocity(), Vec2::ZERO);
}

#[test]
fn test_boss_phase_suppresses_ai() {
    let mut world = World::default();
    let boss = top_down_npc(&mut world, "boss", Vec2::new(400.0, 100.0), NpcArchetypeProfile::patrol(400.0, 50.0, 60.0));
    assert!(world.set_entity_boss_phase(&boss, "enraged"));

    for _ in 0..10 {
        assert!(!world.step_physics(FRAME));
    }
    let entity = world.entity(&boss).unwrap();
    assert_eq!(entity.position, Vec2::new(400.0, 100.0));
    assert_eq!(entity.behavior_state, BehaviorState::Custom("enraged".into()));

    // Interrupts pre-empt the phase label, which comes back on expiry
    assert!(world.mark_entity_damaged(&boss, 50.0));
    for _ in 0..5 {
        world.step_physics(FRAME);
    }
    assert_eq!(world.behavior_state(&boss), Some(&BehaviorState::Custom("enraged".into())));
}

#[test]
fn test_stunned_npc_resumes_patrol() {
    let mut world = World::default();
    let guard = top_down_npc(&mut world, "guard", Vec2::new(180.0, 100.0), NpcArchetypeProfile::patrol(180.0, 48.0, 60.0));
    world.step_physics(FRAME);
    assert!(world.mark_entity_stunned(&guard, 100.0));
    assert_eq!(world.behavior_state(&guard), Some(&BehaviorState::Stunned));

    for _ in 0..10 {
        world.step_physics(FRAME);
    }
    assert_eq!(world.behavior_state(&guard), Some(&BehaviorState::Patrol));

    let history = world.behavior_history(Some(&guard), 10);
    let labels: Vec<(BehaviorState, BehaviorState)> = history.into_iter().map(|t| (t.from, t.to)).collect();
    assert_eq!(
        labels,
        vec![
            (BehaviorState::Idle, BehaviorState::Patrol),
            (BehaviorState::Patrol, BehaviorState::Stunned),
            (BehaviorState::Stunned, BehaviorState::Idle),
            (BehaviorState::Idle, BehaviorState::Patrol),
        ]
    );
}

#[test]
fn test_overlap_trigger_is_reported_not_blocking() {
    let mut world = World::default();
    let hero = Entity::new("hero", EntityKind::Player, Vec2::new(100.0, 100.0))
        .with_collider(Collider::new(Vec2::new(16.0, 16.0)).with_layer(CollisionLayers::PLAYER))
        .with_body(PhysicsBody::top_down());
    world.spawn_entity(hero).unwrap();
    let coin = Entity::new("coin", EntityKind::Object, Vec2::new(110.0, 104.0)).with_collider(
        Collider::new(Vec2::new(8.0, 8.0))
            .with_layer(CollisionLayers::PICKUP)
            .with_mask(CollisionLayers::PLAYER)
            .with_response(CollisionResponse::Overlap),
    );
    world.spawn_entity(coin).unwrap();

    assert_eq!(world.overlapping(&hero_id()), vec![EntityId::new("coin")]);

    world.set_entity_velocity(&hero_id(), Vec2::new(2000.0, 0.0));
    world.step_physics(FRAME);
    assert_eq!(world.entity(&hero_id()).unwrap().position.x, 132.0);
    assert!(world.overlapping(&hero_id()).is_empty());
}

#[test]
fn test_events_are_drained_in_order() {
    let mut world = floor_world();
    let id = hero_id();
    world.apply_burn(&id, 2000.0, 1.0);
    world.apply_regen(&id, 1000.0, 2.0);
    for _ in 0..25 {
        world.step_physics(100.0);
    }

    let events = world.take_events();
    assert!(!events.is_empty());
    assert!(events.windows(2).all(|w| w[0].at_ms <= w[1].at_ms));
    let regen_expiry = events
        .iter()
        .find(|e| matches!(&e.data, SimEventData::StatusExpired { effect_type, .. } if effect_type.as_str() == "regen"))
        .unwrap();
    assert_eq!(regen_expiry.at_ms, 1000);
    assert!(world.take_events().is_empty());
}

proptest! {
    #[test]
    fn prop_short_steps_never_mutate(delta in -100.0f64..1.0) {
        let mut world = floor_world();
        world.set_move_input(1.0);
        let before = world.snapshot();
        prop_assert!(!world.step_physics(delta));
        prop_assert_eq!(world.snapshot(), before);
    }

    #[test]
    fn prop_clock_advances_by_whole_ms(deltas in proptest::collection::vec(1.0f64..100.0, 1..50)) {
        let mut world = floor_world();
        let mut expected = 0u64;
        for delta in &deltas {
            world.step_physics(*delta);
            expected += delta.floor() as u64;
        }
        prop_assert_eq!(world.now_ms(), expected);
    }

    #[test]
    fn prop_hero_never_sinks_into_floor(
        inputs in proptest::collection::vec((-1.0f64..1.0, any::<bool>()), 1..120),
    ) {
        let mut world = floor_world();
        for (move_x, jump) in inputs {
            world.set_move_input(move_x);
            if jump {
                world.jump_player(400.0);
            }
            world.step_physics(FRAME);
            let hero = world.player().unwrap();
            prop_assert!(hero.position.y + 24.0 <= 200.0 + 1e-6);
            prop_assert!(hero.position.x.is_finite());
        }
    }

    #[test]
    fn prop_same_inputs_same_hash(moves in proptest::collection::vec(-1.0f64..1.0, 1..60)) {
        let run = |moves: &[f64]| {
            let mut world = floor_world();
            for m in moves {
                world.set_move_input(*m);
                world.step_physics(FRAME);
            }
            world.compute_hash()
        };
        prop_assert_eq!(run(&moves), run(&moves));
    }
}
