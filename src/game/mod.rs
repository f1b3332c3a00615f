//! Game Logic Module
//!
//! All simulation code. Deterministic for a given step and input sequence.
//!
//! ## Module Structure
//!
//! - `state`: Game state, entities, physics bodies
//! - `world`: The `World` facade (queries, mutators, hooks)
//! - `tick`: Fixed-step simulation loop and replay
//! - `collision`: AABB colliders, layers, axis sweeps
//! - `status`: Status effect ledger
//! - `force_field`: Rectangular force zones
//! - `behavior`: Behavior states, timed interrupts, transition history
//! - `archetype`: NPC AI profiles
//! - `jump`: Coyote time and jump buffering
//! - `camera`: Follow/clamp camera
//! - `pause`: Reason-counted pause gate
//! - `input`: Input frames and recordings
//! - `events`: Simulation events
//! - `config`: Tunables

pub mod archetype;
pub mod behavior;
pub mod camera;
pub mod collision;
pub mod config;
pub mod events;
pub mod force_field;
pub mod input;
pub mod jump;
pub mod pause;
pub mod state;
pub mod status;
pub mod tick;
pub mod world;

// Re-export key types
pub use archetype::{ArchetypeMode, NpcArchetypeProfile};
pub use behavior::{BehaviorState, BehaviorTransition, TimedInterrupt};
pub use camera::{Camera, CameraMode, Viewport};
pub use collision::{Collider, CollisionLayers, CollisionResponse};
pub use config::{ConfigError, SimConfig};
pub use events::{HookId, SimEvent, SimEventData};
pub use force_field::ForceZone;
pub use input::{InputFrame, InputRecording};
pub use pause::PauseEvent;
pub use state::{Entity, EntityId, EntityKind, GameState, PhysicsBody, PhysicsBodyPatch};
pub use status::{StatusEffect, StatusEffectKind, StatusEffectSpec};
pub use tick::StepResult;
pub use world::{Scene, World, WorldError};
