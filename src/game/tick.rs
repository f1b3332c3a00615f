//! Simulation Tick
//!
//! The fixed-step loop behind [`World::step_physics`]. Deterministic for a
//! given `delta_ms` sequence and input stream.
//!
//! ```text
//! 1. clock + status ledger      5. integrate x then y against blockers
//! 2. player control + NPC AI    6. ground probe, buffered jumps
//! 3. gravity                    7. timed-state expiry, move intent
//! 4. force zones + drag         8. camera follow and clamp
//! ```

use std::collections::BTreeMap;

use crate::core::hash::StateHash;
use crate::core::vec2::{Vec2, move_towards};
use crate::game::archetype::{ArchetypeContext, evaluate};
use crate::game::behavior::{
    BehaviorState, BehaviorTransition, ambient_state, expire_timed_state, set_behavior,
};
use crate::game::collision::{Axis, probe_below, sweep_axis};
use crate::game::events::SimEvent;
use crate::game::input::{InputRecording, normalize_move};
use crate::game::state::{EntityId, GameState, PhysicsBody};
use crate::game::world::World;

/// Result of a step.
#[derive(Debug, Default)]
pub struct StepResult {
    /// Some entity's position, velocity or behavior state changed
    pub changed: bool,
    /// Events generated this step, ordered
    pub events: Vec<SimEvent>,
}

type MotionSnapshot = BTreeMap<EntityId, (Vec2, Vec2, BehaviorState)>;

fn motion_snapshot(state: &GameState) -> MotionSnapshot {
    state
        .entities
        .iter()
        .map(|(id, e)| (id.clone(), (e.position, e.velocity(), e.behavior_state.clone())))
        .collect()
}

fn has_pending_work(world: &World) -> bool {
    !world.ledger.is_empty()
        || world.state.entities.values().any(|e| {
            e.physics_body.is_some() || e.timed_state.is_some() || e.npc_profile.is_some()
        })
}

fn transition_event(t: BehaviorTransition) -> SimEvent {
    SimEvent::behavior_changed(t.at_ms, t.entity_id, t.from, t.to)
}

/// Advance `world` by `floor(delta_ms)` milliseconds.
///
/// Does nothing (and reports no change) for steps shorter than 1 ms, while
/// paused, or when nothing in the world needs simulating.
pub fn step(world: &mut World, delta_ms: f64) -> StepResult {
    if !delta_ms.is_finite() || delta_ms.floor() < 1.0 {
        return StepResult::default();
    }
    if world.state.is_paused() || !has_pending_work(world) {
        return StepResult::default();
    }

    let step_ms = delta_ms.floor() as u64;
    let dt = step_ms as f64 / 1000.0;
    let before = motion_snapshot(&world.state);

    // 1. Clock and status effects
    world.state.now_ms = world.state.now_ms.saturating_add(step_ms);
    let mut events = world.ledger.tick(step_ms as f64);

    // 2. Control
    drive_player(world, dt);
    drive_npcs(world, step_ms, &mut events);

    // 3-4. Forces
    apply_gravity(world, dt);
    apply_force_zones(world, step_ms, dt);

    // 5-6. Motion and ground contact
    integrate(world, dt);
    resolve_jumps(world, &mut events);

    // 7. Behavior
    update_behavior(world, &mut events);

    // 8. Camera
    world.refresh_camera();

    let changed = world.state.entities.iter().any(|(id, e)| {
        before
            .get(id)
            .is_some_and(|(position, velocity, behavior)| {
                *position != e.position || *velocity != e.velocity() || *behavior != e.behavior_state
            })
    });

    events.sort();
    world.pending_events.extend(events.iter().cloned());

    #[cfg(feature = "debug-tracing")]
    tracing::trace!(
        "Step {} ms -> now {} (changed: {}, events: {})",
        step_ms,
        world.state.now_ms,
        changed,
        events.len()
    );

    StepResult { changed, events }
}

/// Approach the input-driven target speed.
fn drive_player(world: &mut World, dt: f64) {
    let Some(id) = world.state.player_id.clone() else {
        return;
    };
    let input = normalize_move(world.state.move_input);
    let scale = world.ledger.speed_scale(&id);
    let grounded = world.jumps.get(&id).is_some_and(|j| j.grounded);
    let config = &world.config;

    let Some(entity) = world.state.entities.get_mut(&id) else {
        return;
    };
    let stunned = entity.behavior_state == BehaviorState::Stunned;
    let Some(body) = entity.physics_body.as_mut() else {
        return;
    };

    let target = if stunned {
        0.0
    } else {
        input * config.player_max_speed_px_per_sec * scale
    };
    let rate = match (grounded, input != 0.0) {
        (true, true) => config.ground_accel_px_per_sec2,
        (true, false) => config.ground_decel_px_per_sec2,
        (false, true) => config.air_accel_px_per_sec2,
        (false, false) => config.air_decel_px_per_sec2,
    };
    body.velocity.x = move_towards(body.velocity.x, target, rate * dt);
}

/// Run archetype profiles on free non-player entities.
fn drive_npcs(world: &mut World, step_ms: u64, events: &mut Vec<SimEvent>) {
    let now_ms = world.state.now_ms;
    let player_id = world.state.player_id.clone();
    let player_position = world.state.player().map(|p| p.position);

    for (id, entity) in world.state.entities.iter_mut() {
        if player_id.as_ref() == Some(id) || entity.manual_state.is_some() {
            continue;
        }

        let top_down = entity.physics_body.map_or(true, |b| !b.affected_by_gravity);

        // AI is suspended while an interrupt runs; the entity holds still
        if entity.timed_state.is_some() {
            if entity.npc_profile.is_some() {
                if let Some(body) = entity.physics_body.as_mut() {
                    body.velocity.x = 0.0;
                    if top_down {
                        body.velocity.y = 0.0;
                    }
                }
            }
            continue;
        }

        let ctx = ArchetypeContext {
            step_ms,
            player_position,
            speed_scale: world.ledger.speed_scale(id),
        };
        let position = entity.position;
        let Some(decision) = entity
            .npc_profile
            .as_mut()
            .and_then(|profile| evaluate(profile, position, top_down, &ctx))
        else {
            continue;
        };

        let body = entity.physics_body.get_or_insert_with(PhysicsBody::top_down);
        body.velocity.x = decision.velocity_x;
        if let Some(vy) = decision.velocity_y {
            body.velocity.y = vy;
        }
        if let Some(t) = set_behavior(entity, decision.state, now_ms, &mut world.history) {
            events.push(transition_event(t));
        }
    }
}

fn apply_gravity(world: &mut World, dt: f64) {
    let gravity = world.config.gravity_px_per_sec2;
    let max_fall = world.config.max_fall_speed_px_per_sec;

    for body in world.state.entities.values_mut().filter_map(|e| e.physics_body.as_mut()) {
        if body.affected_by_gravity {
            let vy = body.velocity.y + body.gravity_scale * gravity * dt;
            body.velocity.y = match max_fall {
                Some(cap) => vy.min(cap),
                None => vy,
            };
        }
    }
}

fn apply_force_zones(world: &mut World, step_ms: u64, dt: f64) {
    for entity in world.state.entities.values_mut() {
        let position = entity.position;
        let kind = &entity.kind;
        let Some(body) = entity.physics_body.as_mut() else {
            continue;
        };
        let sample = world.forces.sample(kind.as_str(), position, step_ms as f64);
        body.velocity += sample.velocity_delta;
        if body.drag_x > 0.0 {
            body.velocity.x *= (1.0 - body.drag_x * sample.drag_scale * dt).max(0.0);
        }
    }
}

/// Move every body, x then y, against blocking colliders.
///
/// Obstacles are refreshed as each body moves so later bodies see the new
/// positions. A hit zeroes the velocity on that axis.
fn integrate(world: &mut World, dt: f64) {
    let movers: Vec<EntityId> = world
        .state
        .entities
        .iter()
        .filter(|(_, e)| e.physics_body.is_some())
        .map(|(id, _)| id.clone())
        .collect();
    let mut obstacles = world.state.obstacles();

    for id in movers {
        let Some(entity) = world.state.entities.get_mut(&id) else {
            continue;
        };
        let Some(body) = entity.physics_body.as_mut() else {
            continue;
        };
        body.velocity = body.velocity.finite_or_zero();
        let delta = body.velocity * dt;

        let Some(collider) = entity.collider else {
            entity.position += delta;
            continue;
        };

        let sweep = sweep_axis(&id, collider.aabb(entity.position), &collider, delta.x, Axis::X, &obstacles);
        entity.position.x += sweep.moved;
        if sweep.hit.is_some() {
            body.velocity.x = 0.0;
        }

        let sweep = sweep_axis(&id, collider.aabb(entity.position), &collider, delta.y, Axis::Y, &obstacles);
        entity.position.y += sweep.moved;
        if sweep.hit.is_some() {
            body.velocity.y = 0.0;
        }

        if let Some(obstacle) = obstacles.iter_mut().find(|o| o.id == id) {
            obstacle.aabb = collider.aabb(entity.position);
        }
    }
}

/// Probe ground under every body with a collider and fire buffered jumps.
fn resolve_jumps(world: &mut World, events: &mut Vec<SimEvent>) {
    let now_ms = world.state.now_ms;
    let probe_px = world.config.ground_probe_px;
    let buffer_ms = world.config.jump_buffer_ms;
    let obstacles = world.state.obstacles();

    for (id, entity) in world.state.entities.iter_mut() {
        let (Some(collider), Some(body)) = (entity.collider, entity.physics_body.as_mut()) else {
            continue;
        };
        let grounded = probe_below(id, collider.aabb(entity.position), &collider, probe_px, &obstacles);
        let jump = world.jumps.entry(id.clone()).or_default();
        if let Some(request) = jump.land(grounded, now_ms, buffer_ms) {
            body.velocity.y = -request.velocity;
            events.push(SimEvent::jumped(now_ms, id.clone(), request.velocity, true));
        }
    }
}

/// Expire timed interrupts and apply the player's move intent.
fn update_behavior(world: &mut World, events: &mut Vec<SimEvent>) {
    let now_ms = world.state.now_ms;
    let player_id = world.state.player_id.clone();
    let moving = normalize_move(world.state.move_input) != 0.0;

    for (id, entity) in world.state.entities.iter_mut() {
        let is_player = player_id.as_ref() == Some(id);
        let ambient = ambient_state(entity, is_player && moving);

        if let Some(t) = expire_timed_state(entity, now_ms, ambient.clone(), &mut world.history) {
            events.push(transition_event(t));
        }
        if is_player && entity.timed_state.is_none() && entity.manual_state.is_none() {
            if let Some(t) = set_behavior(entity, ambient, now_ms, &mut world.history) {
                events.push(transition_event(t));
            }
        }
    }
}

/// Re-drive a world from recorded player input.
///
/// Each tick applies the frame in effect (move scalar, then any jump) and
/// steps by `delta_ms`. Returns the final hash and every event.
pub fn replay(
    world: &mut World,
    recording: &InputRecording,
    delta_ms: f64,
    ticks: u32,
) -> (StateHash, Vec<SimEvent>) {
    let mut all_events = Vec::new();

    for t in 0..ticks {
        let frame = recording.input_at(recording.start_tick.saturating_add(t));
        world.set_move_input(frame.move_x);
        if let Some(velocity) = frame.jump_velocity {
            world.jump_player(velocity);
        }
        let result = step(world, delta_ms);
        all_events.extend(result.events);
    }

    (world.compute_hash(), all_events)
}
