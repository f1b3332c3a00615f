//! Behavior State Machine
//!
//! Every entity carries one discrete behavior label, mirrored into its
//! `current_animation`. Labels change from three sources:
//!
//! - continuous intent (player move input -> idle/moving),
//! - timed interrupts (damaged, attacking, stunned, dodge, block) that revert
//!   to the ambient state once `now_ms >= expires_at_ms`,
//! - manual states (boss phases) that persist until replaced.
//!
//! Timed interrupts follow an explicit total precedence, see
//! [`TimedInterrupt::priority`].

use std::collections::VecDeque;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::game::state::{Entity, EntityId};

// =============================================================================
// STATES
// =============================================================================

/// Discrete behavior label.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BehaviorState {
    /// Standing still
    #[default]
    Idle,
    /// Moving under input
    Moving,
    /// Hit reaction
    Damaged,
    /// Attack animation
    Attacking,
    /// Cannot act
    Stunned,
    /// Evading
    Dodge,
    /// Guarding
    Block,
    /// NPC patrolling (anchor, waypoint or roam)
    Patrol,
    /// NPC running from the player
    Flee,
    /// NPC pursuing the player
    Chase,
    /// Any other label, e.g. a boss phase
    Custom(String),
}

impl BehaviorState {
    /// Canonical label (also the animation name).
    pub fn as_str(&self) -> &str {
        match self {
            BehaviorState::Idle => "idle",
            BehaviorState::Moving => "moving",
            BehaviorState::Damaged => "damaged",
            BehaviorState::Attacking => "attacking",
            BehaviorState::Stunned => "stunned",
            BehaviorState::Dodge => "dodge",
            BehaviorState::Block => "block",
            BehaviorState::Patrol => "patrol",
            BehaviorState::Flee => "flee",
            BehaviorState::Chase => "chase",
            BehaviorState::Custom(name) => name,
        }
    }
}

impl From<String> for BehaviorState {
    fn from(name: String) -> Self {
        match name.as_str() {
            "idle" => BehaviorState::Idle,
            "moving" => BehaviorState::Moving,
            "damaged" => BehaviorState::Damaged,
            "attacking" => BehaviorState::Attacking,
            "stunned" => BehaviorState::Stunned,
            "dodge" => BehaviorState::Dodge,
            "block" => BehaviorState::Block,
            "patrol" => BehaviorState::Patrol,
            "flee" => BehaviorState::Flee,
            "chase" => BehaviorState::Chase,
            _ => BehaviorState::Custom(name),
        }
    }
}

impl From<&str> for BehaviorState {
    fn from(name: &str) -> Self {
        BehaviorState::from(name.to_string())
    }
}

impl From<BehaviorState> for String {
    fn from(state: BehaviorState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// TIMED INTERRUPTS
// =============================================================================

/// Interrupt kinds that set a state for a limited time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimedInterrupt {
    /// Hit reaction
    Damaged,
    /// Attack swing
    Attacking,
    /// Stun lock
    Stunned,
    /// Dodge roll
    Dodging,
    /// Guard
    Blocking,
}

impl TimedInterrupt {
    /// Total precedence: a new interrupt replaces the running one iff its
    /// priority is greater than or equal to the running one's.
    ///
    /// Damaged 5 > Stunned 4 > Blocking 3 > Dodging 2 > Attacking 1.
    pub const fn priority(self) -> u8 {
        match self {
            TimedInterrupt::Damaged => 5,
            TimedInterrupt::Stunned => 4,
            TimedInterrupt::Blocking => 3,
            TimedInterrupt::Dodging => 2,
            TimedInterrupt::Attacking => 1,
        }
    }

    /// State shown while the interrupt runs.
    pub fn state(self) -> BehaviorState {
        match self {
            TimedInterrupt::Damaged => BehaviorState::Damaged,
            TimedInterrupt::Attacking => BehaviorState::Attacking,
            TimedInterrupt::Stunned => BehaviorState::Stunned,
            TimedInterrupt::Dodging => BehaviorState::Dodge,
            TimedInterrupt::Blocking => BehaviorState::Block,
        }
    }
}

/// Fallback durations used when a caller passes an invalid one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimedStateDefaults {
    /// Damaged duration
    pub damaged_ms: u64,
    /// Attacking duration
    pub attacking_ms: u64,
    /// Stunned duration
    pub stunned_ms: u64,
    /// Dodge duration
    pub dodging_ms: u64,
    /// Block duration
    pub blocking_ms: u64,
}

impl Default for TimedStateDefaults {
    fn default() -> Self {
        Self {
            damaged_ms: 300,
            attacking_ms: 250,
            stunned_ms: 800,
            dodging_ms: 350,
            blocking_ms: 500,
        }
    }
}

impl TimedStateDefaults {
    /// Default for one interrupt kind.
    pub fn duration_for(&self, interrupt: TimedInterrupt) -> u64 {
        match interrupt {
            TimedInterrupt::Damaged => self.damaged_ms,
            TimedInterrupt::Attacking => self.attacking_ms,
            TimedInterrupt::Stunned => self.stunned_ms,
            TimedInterrupt::Dodging => self.dodging_ms,
            TimedInterrupt::Blocking => self.blocking_ms,
        }
    }

    /// Whole-ms duration from caller input, falling back to the default.
    pub fn resolve(&self, interrupt: TimedInterrupt, duration_ms: f64) -> u64 {
        if duration_ms.is_finite() && duration_ms >= 1.0 {
            duration_ms.floor() as u64
        } else {
            self.duration_for(interrupt).max(1)
        }
    }
}

/// A running timed interrupt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedState {
    /// Interrupt kind
    pub interrupt: TimedInterrupt,
    /// State shown while running
    pub state: BehaviorState,
    /// Reverts when the clock reaches this
    pub expires_at_ms: u64,
    /// Copy of `interrupt.priority()`
    pub priority: u8,
}

impl TimedState {
    /// True while the clock is before expiry.
    pub fn is_running(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}

// =============================================================================
// TRANSITION HISTORY
// =============================================================================

/// One recorded state change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BehaviorTransition {
    /// Entity that changed
    pub entity_id: EntityId,
    /// Previous state
    pub from: BehaviorState,
    /// New state
    pub to: BehaviorState,
    /// Simulation time of the change
    pub at_ms: u64,
}

/// Bounded ring buffer of transitions, oldest first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionHistory {
    capacity: usize,
    entries: VecDeque<BehaviorTransition>,
}

impl TransitionHistory {
    /// Default ring size.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Create with a capacity (0 disables recording).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Append, dropping the oldest entry when full.
    pub fn record(&mut self, transition: BehaviorTransition) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(transition);
    }

    /// The most recent `limit` transitions (optionally for one entity), in
    /// chronological order.
    pub fn recent(&self, entity: Option<&EntityId>, limit: usize) -> Vec<BehaviorTransition> {
        let mut out: Vec<BehaviorTransition> = self
            .entries
            .iter()
            .rev()
            .filter(|t| entity.map_or(true, |id| &t.entity_id == id))
            .take(limit)
            .cloned()
            .collect();
        out.reverse();
        out
    }

    /// Change the ring size (at least 1), trimming the oldest entries.
    pub fn set_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        self.capacity = capacity;
        while self.entries.len() > capacity {
            self.entries.pop_front();
        }
    }

    /// Current ring size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget all transitions. Entity states are untouched.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for TransitionHistory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

// =============================================================================
// TRANSITIONS
// =============================================================================

/// Write `state` into both behavior and animation; record if it changed.
pub fn set_behavior(
    entity: &mut Entity,
    state: BehaviorState,
    now_ms: u64,
    history: &mut TransitionHistory,
) -> Option<BehaviorTransition> {
    if entity.behavior_state == state {
        // Keep the animation mirror honest even for no-op writes
        if entity.current_animation != state.as_str() {
            entity.current_animation = state.as_str().to_string();
        }
        return None;
    }

    let transition = BehaviorTransition {
        entity_id: entity.id.clone(),
        from: entity.behavior_state.clone(),
        to: state.clone(),
        at_ms: now_ms,
    };
    entity.current_animation = state.as_str().to_string();
    entity.behavior_state = state;
    history.record(transition.clone());
    Some(transition)
}

/// Outcome of [`start_interrupt`].
#[derive(Clone, Debug, PartialEq)]
pub enum InterruptOutcome {
    /// The interrupt is running; carries the transition if the label changed.
    Started(Option<BehaviorTransition>),
    /// A higher-priority interrupt is still running.
    Rejected,
}

impl InterruptOutcome {
    /// True if the interrupt took effect.
    pub fn is_started(&self) -> bool {
        matches!(self, InterruptOutcome::Started(_))
    }
}

/// Start a timed interrupt unless a higher-priority one is still running.
pub fn start_interrupt(
    entity: &mut Entity,
    interrupt: TimedInterrupt,
    duration_ms: u64,
    now_ms: u64,
    history: &mut TransitionHistory,
) -> InterruptOutcome {
    if let Some(running) = &entity.timed_state {
        if running.is_running(now_ms) && interrupt.priority() < running.priority {
            return InterruptOutcome::Rejected;
        }
    }

    entity.timed_state = Some(TimedState {
        interrupt,
        state: interrupt.state(),
        expires_at_ms: now_ms.saturating_add(duration_ms),
        priority: interrupt.priority(),
    });
    InterruptOutcome::Started(set_behavior(entity, interrupt.state(), now_ms, history))
}

/// State an entity returns to once no timed state is running.
///
/// Manual states win; otherwise `moving` reflects player intent.
pub fn ambient_state(entity: &Entity, moving_intent: bool) -> BehaviorState {
    if let Some(manual) = &entity.manual_state {
        return manual.clone();
    }
    if moving_intent {
        BehaviorState::Moving
    } else {
        BehaviorState::Idle
    }
}

/// Clear an expired timed state and revert to `ambient`.
pub fn expire_timed_state(
    entity: &mut Entity,
    now_ms: u64,
    ambient: BehaviorState,
    history: &mut TransitionHistory,
) -> Option<BehaviorTransition> {
    match &entity.timed_state {
        Some(timed) if !timed.is_running(now_ms) => {
            entity.timed_state = None;
            set_behavior(entity, ambient, now_ms, history)
        }
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================
