//! # DataBus Simulation Core
//!
//! Deterministic 2D game simulation: physics, collisions, behavior states,
//! NPC archetypes, status effects, force zones and camera, all owned by one
//! [`World`] value and advanced by a fixed-step tick.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DATABUS CORE                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Primitives                              │
//! │  ├── vec2.rs       - f64 2D vector                           │
//! │  ├── rect.rs       - Axis-aligned rectangle                  │
//! │  └── hash.rs       - State hashing for verification          │
//! │                                                              │
//! │  game/             - Simulation                              │
//! │  ├── state.rs      - Game state, entities, bodies            │
//! │  ├── world.rs      - World facade: queries and mutators      │
//! │  ├── tick.rs       - Fixed-step loop and replay              │
//! │  ├── collision.rs  - Layers, colliders, sweeps               │
//! │  ├── status.rs     - Status effect ledger                    │
//! │  ├── force_field.rs- Force zones                             │
//! │  ├── behavior.rs   - Behavior state machine                  │
//! │  ├── archetype.rs  - NPC AI                                  │
//! │  ├── jump.rs       - Coyote time, jump buffer                │
//! │  ├── camera.rs     - Camera follow and clamp                 │
//! │  ├── pause.rs      - Reason-counted pause                    │
//! │  ├── input.rs      - Input frames and recordings             │
//! │  ├── events.rs     - Simulation events                       │
//! │  └── config.rs     - Tunables                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Given the same initial state, `delta_ms` sequence and inputs, a world
//! produces identical states and events:
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies (the clock is `now_ms`, advanced by ticks)
//! - No randomness (roaming NPCs are a function of the clock)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;

// Re-export commonly used types
pub use crate::core::hash::StateHash;
pub use crate::core::rect::Rect;
pub use crate::core::vec2::Vec2;
pub use game::collision::{Collider, CollisionLayers};
pub use game::config::{ConfigError, SimConfig};
pub use game::input::{InputFrame, InputRecording};
pub use game::state::{Entity, EntityId, EntityKind, GameState, PhysicsBody, PhysicsBodyPatch};
pub use game::tick::StepResult;
pub use game::world::{World, WorldError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default fixed step (ms), one frame at ~60 Hz
pub const DEFAULT_STEP_MS: f64 = 16.0;
