//! Jump Assist
//!
//! Coyote time and input buffering for platformer jumps.
//!
//! ```text
//! ground contact ──► last_grounded_at_ms = now
//! jump request   ──► grounded or now - last_grounded <= coyote ? jump : buffer
//! grounded frame ──► buffered and now - requested_at <= buffer ? jump : drop
//! ```

use serde::{Serialize, Deserialize};

/// A jump waiting for ground contact.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JumpRequest {
    /// Launch speed (applied as `vy = -velocity`)
    pub velocity: f64,
    /// Clock value of the request
    pub requested_at_ms: u64,
}

/// Per-entity jump bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JumpState {
    /// Result of the last ground probe
    pub grounded: bool,
    /// Last clock value with ground contact
    pub last_grounded_at_ms: Option<u64>,
    /// Request waiting for ground contact
    pub buffered: Option<JumpRequest>,
}

impl JumpState {
    /// True while grounded or inside the coyote window.
    pub fn can_jump(&self, now_ms: u64, coyote_ms: u64) -> bool {
        self.grounded
            || self
                .last_grounded_at_ms
                .is_some_and(|at| now_ms.saturating_sub(at) <= coyote_ms)
    }

    /// Try to jump right now.
    ///
    /// On success the ground/coyote state is consumed so one contact gives
    /// one jump. On failure the request is buffered.
    pub fn request(&mut self, velocity: f64, now_ms: u64, coyote_ms: u64) -> bool {
        if self.can_jump(now_ms, coyote_ms) {
            self.grounded = false;
            self.last_grounded_at_ms = None;
            self.buffered = None;
            return true;
        }
        self.buffered = Some(JumpRequest {
            velocity,
            requested_at_ms: now_ms,
        });
        false
    }

    /// Record the probe result after movement.
    ///
    /// Returns a buffered request to execute on this grounded frame.
    pub fn land(&mut self, grounded: bool, now_ms: u64, buffer_ms: u64) -> Option<JumpRequest> {
        self.grounded = grounded;

        let fresh = self
            .buffered
            .filter(|r| now_ms.saturating_sub(r.requested_at_ms) <= buffer_ms);
        if fresh.is_none() {
            self.buffered = None;
        }

        if !grounded {
            return None;
        }
        self.last_grounded_at_ms = Some(now_ms);

        let request = fresh?;
        self.buffered = None;
        self.grounded = false;
        self.last_grounded_at_ms = None;
        Some(request)
    }
}
