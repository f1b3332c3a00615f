//! Simulation Events
//!
//! Fire-and-forget signals produced during a tick, consumed by effect and UI
//! layers outside the core.

use serde::{Serialize, Deserialize};
use crate::game::behavior::BehaviorState;
use crate::game::state::EntityId;
use crate::game::status::StatusEffectKind;

/// Handle returned by every subscription; pass it back to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookId(pub u64);

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Periodic status ticks first (damage/heal before removal)
    StatusTick = 0,
    /// Then expiries
    StatusExpiry = 1,
    /// Then behavior changes
    Behavior = 2,
    /// Then movement signals
    Movement = 3,
}

/// Event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimEventData {
    /// An interval status effect crossed a tick boundary
    StatusTicked {
        effect_id: u64,
        effect_type: StatusEffectKind,
        magnitude: f64,
        source: Option<String>,
    },

    /// A status effect ran out and was removed
    StatusExpired {
        effect_id: u64,
        effect_type: StatusEffectKind,
        source: Option<String>,
    },

    /// Behavior state changed
    BehaviorChanged {
        from: BehaviorState,
        to: BehaviorState,
    },

    /// A jump was applied
    Jumped {
        velocity: f64,
        buffered: bool,
    },
}

/// A simulation event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimEvent {
    /// Simulation time the event refers to (ms)
    pub at_ms: u64,

    /// Processing priority
    pub priority: EventPriority,

    /// Entity involved
    pub entity_id: EntityId,

    /// Event data
    pub data: SimEventData,
}

impl SimEvent {
    /// Create a new event; the priority follows from the data.
    pub fn new(at_ms: u64, entity_id: EntityId, data: SimEventData) -> Self {
        let priority = match &data {
            SimEventData::StatusTicked { .. } => EventPriority::StatusTick,
            SimEventData::StatusExpired { .. } => EventPriority::StatusExpiry,
            SimEventData::BehaviorChanged { .. } => EventPriority::Behavior,
            SimEventData::Jumped { .. } => EventPriority::Movement,
        };

        Self {
            at_ms,
            priority,
            entity_id,
            data,
        }
    }

    /// Create status tick event.
    pub fn status_ticked(
        at_ms: u64,
        entity_id: EntityId,
        effect_id: u64,
        effect_type: StatusEffectKind,
        magnitude: f64,
        source: Option<String>,
    ) -> Self {
        Self::new(
            at_ms,
            entity_id,
            SimEventData::StatusTicked {
                effect_id,
                effect_type,
                magnitude,
                source,
            },
        )
    }

    /// Create status expiry event.
    pub fn status_expired(
        at_ms: u64,
        entity_id: EntityId,
        effect_id: u64,
        effect_type: StatusEffectKind,
        source: Option<String>,
    ) -> Self {
        Self::new(
            at_ms,
            entity_id,
            SimEventData::StatusExpired {
                effect_id,
                effect_type,
                source,
            },
        )
    }

    /// Create behavior change event.
    pub fn behavior_changed(at_ms: u64, entity_id: EntityId, from: BehaviorState, to: BehaviorState) -> Self {
        Self::new(at_ms, entity_id, SimEventData::BehaviorChanged { from, to })
    }

    /// Create jump event.
    pub fn jumped(at_ms: u64, entity_id: EntityId, velocity: f64, buffered: bool) -> Self {
        Self::new(at_ms, entity_id, SimEventData::Jumped { velocity, buffered })
    }

    /// Effect id for status events.
    pub fn effect_id(&self) -> Option<u64> {
        match &self.data {
            SimEventData::StatusTicked { effect_id, .. }
            | SimEventData::StatusExpired { effect_id, .. } => Some(*effect_id),
            _ => None,
        }
    }
}

impl PartialEq for SimEvent {
    fn eq(&self, other: &Self) -> bool {
        self.at_ms == other.at_ms
            && self.priority == other.priority
            && self.entity_id == other.entity_id
    }
}

impl Eq for SimEvent {}

impl PartialOrd for SimEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: time, then priority, then entity
        self.at_ms
            .cmp(&other.at_ms)
            .then(self.priority.cmp(&other.priority))
            .then(self.entity_id.cmp(&other.entity_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ordering() {
        let a = EntityId::new("a");
        let b = EntityId::new("b");

        let tick_a = SimEvent::status_ticked(500, a.clone(), 1, StatusEffectKind::Burn, 2.0, None);
        let expire_a = SimEvent::status_expired(500, a.clone(), 1, StatusEffectKind::Burn, None);
        let tick_b = SimEvent::status_ticked(500, b, 2, StatusEffectKind::Burn, 2.0, None);
        let later = SimEvent::jumped(400, a, 300.0, false);

        // Same time, but tick < expiry
        assert!(tick_a < expire_a);

        // Same time and priority, but a < b
        assert!(tick_a < tick_b);

        // Earlier time always first
        assert!(later < tick_a);
    }

    #[test]
    fn test_effect_id_accessor() {
        let e = SimEvent::status_expired(10, EntityId::new("x"), 7, StatusEffectKind::Slow, None);
        assert_eq!(e.effect_id(), Some(7));
        let j = SimEvent::jumped(10, EntityId::new("x"), 1.0, true);
        assert_eq!(j.effect_id(), None);
    }
}
