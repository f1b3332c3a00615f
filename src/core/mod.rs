//! Core primitives.
//!
//! Geometry and hashing shared by every simulation module.

pub mod vec2;
pub mod rect;
pub mod hash;

// Re-export core types
pub use vec2::Vec2;
pub use rect::Rect;
pub use hash::{StateHash, StateHasher, compute_state_hash};
