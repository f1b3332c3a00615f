//! Pause Gate
//!
//! Reason-counted pause. Independent pausers each hold a token; the
//! simulation runs only while the set is empty. Hooks fire on the
//! empty <-> non-empty edge only.

use std::collections::BTreeSet;
use std::fmt;
use serde::{Serialize, Deserialize};
use tracing::info;

use crate::game::events::HookId;

/// Reason used when a caller passes an empty token.
pub const DEFAULT_PAUSE_REASON: &str = "manual";

/// Payload handed to pause/resume hooks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseEvent {
    /// Token that caused the edge
    pub reason: String,
    /// Reasons held after the change, sorted
    pub reasons: Vec<String>,
    /// Paused after the change
    pub paused: bool,
}

type PauseHook = Box<dyn FnMut(&PauseEvent)>;

/// Which edge a hook listens to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PauseEdge {
    /// Empty -> non-empty
    Pause,
    /// Non-empty -> empty
    Resume,
}

/// Hook registry. The reason set itself lives in
/// [`GameState::pause_reasons`](crate::game::state::GameState).
#[derive(Default)]
pub struct PauseGate {
    hooks: Vec<(HookId, PauseEdge, PauseHook)>,
}

impl fmt::Debug for PauseGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PauseGate")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

fn normalize_reason(reason: &str) -> String {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        DEFAULT_PAUSE_REASON.to_string()
    } else {
        trimmed.to_string()
    }
}

impl PauseGate {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook under a caller-allocated id.
    pub fn subscribe<F>(&mut self, id: HookId, edge: PauseEdge, hook: F) -> HookId
    where
        F: FnMut(&PauseEvent) + 'static,
    {
        self.hooks.push((id, edge, Box::new(hook)));
        id
    }

    /// Remove a hook. Returns false if it was not registered here.
    pub fn unsubscribe(&mut self, id: HookId) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|(hook, _, _)| *hook != id);
        self.hooks.len() != before
    }

    /// Add `reason`. Returns true if this paused a running simulation.
    pub fn pause(&mut self, reasons: &mut BTreeSet<String>, reason: &str) -> bool {
        let reason = normalize_reason(reason);
        let was_paused = !reasons.is_empty();
        reasons.insert(reason.clone());

        if was_paused {
            return false;
        }
        info!("Simulation paused ({})", reason);
        self.fire(PauseEdge::Pause, reason, reasons);
        true
    }

    /// Drop `reason`. Returns true if this resumed the simulation.
    pub fn resume(&mut self, reasons: &mut BTreeSet<String>, reason: &str) -> bool {
        let reason = normalize_reason(reason);
        if !reasons.remove(&reason) || !reasons.is_empty() {
            return false;
        }
        info!("Simulation resumed ({})", reason);
        self.fire(PauseEdge::Resume, reason, reasons);
        true
    }

    /// Drop every reason. Returns true if this resumed the simulation.
    pub fn clear(&mut self, reasons: &mut BTreeSet<String>) -> bool {
        if reasons.is_empty() {
            return false;
        }
        let last = reasons.iter().next_back().cloned().unwrap_or_default();
        reasons.clear();
        info!("Simulation resumed (all reasons cleared)");
        self.fire(PauseEdge::Resume, last, reasons);
        true
    }

    fn fire(&mut self, edge: PauseEdge, reason: String, reasons: &BTreeSet<String>) {
        let event = PauseEvent {
            reason,
            reasons: reasons.iter().cloned().collect(),
            paused: !reasons.is_empty(),
        };
        for (_, hook_edge, hook) in self.hooks.iter_mut() {
            if *hook_edge == edge {
                hook(&event);
            }
        }
    }
}
