//! DataBus Demo
//!
//! Builds a small platformer scene, runs a few seconds of simulation with
//! scripted input, then replays the recording and checks the state hash.
//!
//! Usage: `databus-demo [config.json]`

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use databus::{
    DEFAULT_STEP_MS, VERSION,
    game::{
        events::SimEventData,
        input::{InputFrame, InputRecording},
        tick::replay,
        NpcArchetypeProfile, Scene, World,
    },
    Collider, CollisionLayers, Entity, EntityId, EntityKind, PhysicsBody, SimConfig, Vec2,
};

/// Demo length in ticks (5 seconds at 16 ms)
const DEMO_TICKS: u32 = 300;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("DataBus Demo v{}", VERSION);

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading config from {}", path);
            SimConfig::load(&path).with_context(|| format!("Failed to load config {}", path))?
        }
        None => SimConfig::default(),
    };
    info!(
        "Gravity: {} px/s^2, max run speed: {} px/s",
        config.gravity_px_per_sec2, config.player_max_speed_px_per_sec
    );

    demo_run(config)
}

fn demo_scene() -> Scene {
    let hero = Entity::new("hero", EntityKind::Player, Vec2::new(64.0, 280.0))
        .with_collider(Collider::new(Vec2::new(16.0, 24.0)).with_layer(CollisionLayers::PLAYER))
        .with_body(PhysicsBody::platformer())
        .with_visual("sprite", serde_json::json!("hero.png"));
    let floor = Entity::new("floor", EntityKind::Object, Vec2::new(0.0, 328.0))
        .with_collider(Collider::new(Vec2::new(640.0, 32.0)).with_layer(CollisionLayers::WORLD));
    let guard = Entity::new("guard", EntityKind::Npc, Vec2::new(320.0, 304.0))
        .with_collider(Collider::new(Vec2::new(16.0, 24.0)).with_layer(CollisionLayers::NPC))
        .with_body(PhysicsBody::platformer())
        .with_profile(NpcArchetypeProfile::patrol(320.0, 48.0, 60.0).with_flee(40.0, 120.0));

    Scene {
        world_size: Some(Vec2::new(640.0, 360.0)),
        world_bounds_enabled: true,
        player_id: Some(EntityId::new("hero")),
        entities: vec![hero, floor, guard],
        camera: None,
        force_zones: Vec::new(),
    }
}

/// Scripted input: run right, jump, back off, idle.
fn scripted_input(tick: u32) -> InputFrame {
    match tick {
        0..=89 => InputFrame::with_movement(1.0),
        90 => InputFrame::with_movement(1.0).with_jump(480.0),
        91..=179 => InputFrame::with_movement(-0.5),
        _ => InputFrame::IDLE,
    }
}

fn demo_run(config: SimConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Run ===");

    let mut world = World::from_scene(config.clone(), demo_scene())?;
    let hero = EntityId::new("hero");
    world.on_status_event(|event| info!("Status signal: {:?}", event.data));
    world.apply_burn(&hero, 1500.0, 2.0);

    let mut recording = InputRecording::new();
    let mut total_events = 0;

    for t in 0..DEMO_TICKS {
        let frame = scripted_input(t);
        recording.record(t, frame);

        world.set_move_input(frame.move_x);
        if let Some(velocity) = frame.jump_velocity {
            if !world.jump_player(velocity) {
                info!("Jump buffered at tick {}", t);
            }
        }
        let result = world.step(DEFAULT_STEP_MS);
        total_events += result.events.len();

        for event in &result.events {
            if let SimEventData::BehaviorChanged { from, to } = &event.data {
                info!("{} {} -> {} at {} ms", event.entity_id, from, to, event.at_ms);
            }
        }

        // Report every second
        if t % 60 == 0 {
            if let Some(player) = world.player() {
                info!(
                    "Tick {}: hero at ({:.1}, {:.1}), state {}",
                    t, player.position.x, player.position.y, player.behavior_state
                );
            }
        }
    }

    info!("=== Run Results ===");
    let hash = world.compute_hash();
    info!("Final State Hash: {}", hex::encode(hash));
    info!("Input deltas: {} over {} ticks", recording.delta_count(), recording.tick_count());
    info!("Total events: {}", total_events);

    // Verify determinism by replaying
    info!("=== Verifying Determinism ===");
    let mut replay_world = World::from_scene(config, demo_scene())?;
    replay_world.apply_burn(&hero, 1500.0, 2.0);
    let (replay_hash, _) = replay(&mut replay_world, &recording, DEFAULT_STEP_MS, DEMO_TICKS);

    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash == replay_hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
    } else {
        warn!("DETERMINISM FAILURE: Hashes differ!");
    }

    Ok(())
}
