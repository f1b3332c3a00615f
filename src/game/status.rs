//! Status Effect Ledger
//!
//! Per-entity timed modifiers (slow, haste, burn, regen, custom).
//!
//! ## Policies
//!
//! | Type        | Tick policy         | Stack policy |
//! |-------------|---------------------|--------------|
//! | slow, haste | none                | stack        |
//! | burn, regen | interval @ 1000 ms  | refresh      |
//! | custom      | none                | stack        |
//!
//! - **stack**: append, evicting the oldest same-type instance once
//!   `max_stacks` is reached.
//! - **refresh**: overwrite the most recently applied same-type instance in
//!   place (magnitude, source, duration, timers).
//! - **replace**: drop every same-type instance, then insert.
//!
//! The ledger owns its own monotonic clock, advanced by [`StatusLedger::tick`]
//! in whole milliseconds.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::game::events::{HookId, SimEvent};
use crate::game::state::EntityId;

/// Default interval between periodic ticks.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Default stack cap.
pub const DEFAULT_MAX_STACKS: usize = 99;

// =============================================================================
// EFFECT TYPES
// =============================================================================

/// Kind of status effect.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusEffectKind {
    /// Reduces movement speed by `magnitude`
    Slow,
    /// Increases movement speed by `magnitude`
    Haste,
    /// Periodic damage signal
    Burn,
    /// Periodic heal signal
    Regen,
    /// Any other effect, carried by name
    Custom(String),
}

impl StatusEffectKind {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &str {
        match self {
            StatusEffectKind::Slow => "slow",
            StatusEffectKind::Haste => "haste",
            StatusEffectKind::Burn => "burn",
            StatusEffectKind::Regen => "regen",
            StatusEffectKind::Custom(name) => name,
        }
    }

    /// Default tick policy for this type.
    pub fn default_tick_policy(&self) -> TickPolicy {
        match self {
            StatusEffectKind::Burn | StatusEffectKind::Regen => TickPolicy::Interval,
            _ => TickPolicy::None,
        }
    }

    /// Default stack policy for this type.
    pub fn default_stack_policy(&self) -> StackPolicy {
        match self {
            StatusEffectKind::Burn | StatusEffectKind::Regen => StackPolicy::Refresh,
            _ => StackPolicy::Stack,
        }
    }
}

impl From<String> for StatusEffectKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "slow" => StatusEffectKind::Slow,
            "haste" => StatusEffectKind::Haste,
            "burn" => StatusEffectKind::Burn,
            "regen" => StatusEffectKind::Regen,
            _ => StatusEffectKind::Custom(name),
        }
    }
}

impl From<StatusEffectKind> for String {
    fn from(kind: StatusEffectKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for StatusEffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an effect emits periodic tick events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPolicy {
    /// No periodic events
    None,
    /// One event per elapsed interval
    Interval,
}

/// How a new application combines with existing same-type instances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackPolicy {
    /// Append (FIFO eviction at the cap)
    Stack,
    /// Overwrite the latest instance in place
    Refresh,
    /// Drop all, then insert
    Replace,
}

/// Parameters of a single application. Unset fields use the type defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectSpec {
    /// Effect type
    pub kind: StatusEffectKind,
    /// Lifetime in ms (must be >= 1)
    pub duration_ms: f64,
    /// Strength (speed fraction for slow/haste, amount for burn/regen)
    pub magnitude: f64,
    /// Who applied it
    #[serde(default)]
    pub source: Option<String>,
    /// Override of the type's tick policy
    #[serde(default)]
    pub tick_policy: Option<TickPolicy>,
    /// Interval for periodic ticks (implies `Interval` when set)
    #[serde(default)]
    pub tick_interval_ms: Option<f64>,
    /// Override of the type's stack policy
    #[serde(default)]
    pub stack_policy: Option<StackPolicy>,
    /// Stack cap (default 99, minimum 1)
    #[serde(default)]
    pub max_stacks: Option<usize>,
}

impl StatusEffectSpec {
    /// Spec with type defaults.
    pub fn new(kind: StatusEffectKind, duration_ms: f64, magnitude: f64) -> Self {
        Self {
            kind,
            duration_ms,
            magnitude,
            source: None,
            tick_policy: None,
            tick_interval_ms: None,
            stack_policy: None,
            max_stacks: None,
        }
    }

    /// Set the source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Emit periodic ticks every `interval_ms`.
    pub fn with_tick_interval(mut self, interval_ms: f64) -> Self {
        self.tick_policy = Some(TickPolicy::Interval);
        self.tick_interval_ms = Some(interval_ms);
        self
    }

    /// Override the tick policy.
    pub fn with_tick_policy(mut self, policy: TickPolicy) -> Self {
        self.tick_policy = Some(policy);
        self
    }

    /// Override the stack policy.
    pub fn with_stack_policy(mut self, policy: StackPolicy) -> Self {
        self.stack_policy = Some(policy);
        self
    }

    /// Override the stack cap.
    pub fn with_max_stacks(mut self, max_stacks: usize) -> Self {
        self.max_stacks = Some(max_stacks);
        self
    }
}

/// An active effect instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Ledger-unique id (monotonic counter)
    pub id: u64,
    /// Effect type
    pub kind: StatusEffectKind,
    /// Strength
    pub magnitude: f64,
    /// Who applied it
    pub source: Option<String>,
    /// Clock value at (re)application
    pub applied_at_ms: u64,
    /// Clock value at which it is removed
    pub expires_at_ms: u64,
    /// Periodic interval, if ticking
    pub tick_interval_ms: Option<u64>,
    /// Next boundary that emits a tick
    pub next_tick_at_ms: Option<u64>,
    /// Ticks emitted so far
    pub ticks_fired: u32,
}

impl StatusEffect {
    /// True while `now_ms` is before expiry.
    pub fn is_active(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }

    fn reset_timers(&mut self, now_ms: u64, duration_ms: u64, interval: Option<u64>) {
        self.applied_at_ms = now_ms;
        self.expires_at_ms = now_ms.saturating_add(duration_ms);
        self.tick_interval_ms = interval;
        self.next_tick_at_ms = interval.map(|i| now_ms.saturating_add(i));
        self.ticks_fired = 0;
    }
}

// =============================================================================
// LEDGER
// =============================================================================

type Listener = Box<dyn FnMut(&SimEvent)>;

/// Owner of every status effect instance and of the signal observer list.
pub struct StatusLedger {
    now_ms: u64,
    next_effect_id: u64,
    next_hook_id: u64,
    effects: BTreeMap<EntityId, Vec<StatusEffect>>,
    listeners: Vec<(HookId, Listener)>,
}

impl fmt::Debug for StatusLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusLedger")
            .field("now_ms", &self.now_ms)
            .field("effects", &self.effects)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for StatusLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusLedger {
    /// Empty ledger with the clock at zero.
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_effect_id: 1,
            next_hook_id: 1,
            effects: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    /// True if no entity carries an effect.
    pub fn is_empty(&self) -> bool {
        self.effects.values().all(|v| v.is_empty())
    }

    /// Active effects on an entity, oldest first.
    pub fn effects(&self, entity: &EntityId) -> &[StatusEffect] {
        self.effects.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Apply an effect. Returns the instance id, or `None` for an invalid
    /// duration.
    pub fn apply(&mut self, entity: &EntityId, spec: StatusEffectSpec) -> Option<u64> {
        if !spec.duration_ms.is_finite() || spec.duration_ms < 1.0 {
            debug!("Rejected {} on {}: invalid duration {}", spec.kind, entity, spec.duration_ms);
            return None;
        }
        let duration_ms = spec.duration_ms.floor() as u64;
        let magnitude = if spec.magnitude.is_finite() { spec.magnitude } else { 0.0 };
        let tick_policy = spec.tick_policy.unwrap_or_else(|| spec.kind.default_tick_policy());
        let interval = match tick_policy {
            TickPolicy::None => None,
            TickPolicy::Interval => Some(
                spec.tick_interval_ms
                    .filter(|ms| ms.is_finite() && *ms >= 1.0)
                    .map(|ms| ms.floor() as u64)
                    .unwrap_or(DEFAULT_TICK_INTERVAL_MS),
            ),
        };
        let stack_policy = spec.stack_policy.unwrap_or_else(|| spec.kind.default_stack_policy());
        let max_stacks = spec.max_stacks.unwrap_or(DEFAULT_MAX_STACKS).max(1);
        let now_ms = self.now_ms;

        let list = self.effects.entry(entity.clone()).or_default();

        if stack_policy == StackPolicy::Refresh {
            let latest = list
                .iter()
                .enumerate()
                .filter(|(_, e)| e.kind == spec.kind)
                .max_by_key(|(i, e)| (e.applied_at_ms, *i))
                .map(|(i, _)| i);
            if let Some(index) = latest {
                let effect = &mut list[index];
                effect.magnitude = magnitude;
                effect.source = spec.source;
                effect.reset_timers(now_ms, duration_ms, interval);
                return Some(effect.id);
            }
        }

        match stack_policy {
            StackPolicy::Replace => list.retain(|e| e.kind != spec.kind),
            StackPolicy::Stack => {
                // FIFO eviction: the list is in application order
                while list.iter().filter(|e| e.kind == spec.kind).count() >= max_stacks {
                    match list.iter().position(|e| e.kind == spec.kind) {
                        Some(oldest) => {
                            list.remove(oldest);
                        }
                        None => break,
                    }
                }
            }
            StackPolicy::Refresh => {}
        }

        let id = self.next_effect_id;
        self.next_effect_id += 1;

        let mut effect = StatusEffect {
            id,
            kind: spec.kind,
            magnitude,
            source: spec.source,
            applied_at_ms: now_ms,
            expires_at_ms: now_ms,
            tick_interval_ms: None,
            next_tick_at_ms: None,
            ticks_fired: 0,
        };
        effect.reset_timers(now_ms, duration_ms, interval);
        list.push(effect);

        Some(id)
    }

    /// Advance the clock by `floor(delta_ms)` and process ticks/expiries.
    ///
    /// Returns the emitted events in order; listeners see the same sequence.
    pub fn tick(&mut self, delta_ms: f64) -> Vec<SimEvent> {
        let step = if delta_ms.is_finite() && delta_ms > 0.0 {
            delta_ms.floor() as u64
        } else {
            0
        };
        self.now_ms = self.now_ms.saturating_add(step);
        let now_ms = self.now_ms;

        let mut events = Vec::new();

        for (entity, list) in self.effects.iter_mut() {
            for effect in list.iter_mut() {
                let (Some(interval), Some(mut next)) = (effect.tick_interval_ms, effect.next_tick_at_ms) else {
                    continue;
                };
                let horizon = now_ms.min(effect.expires_at_ms);
                while next <= horizon {
                    events.push(SimEvent::status_ticked(
                        next,
                        entity.clone(),
                        effect.id,
                        effect.kind.clone(),
                        effect.magnitude,
                        effect.source.clone(),
                    ));
                    effect.ticks_fired += 1;
                    next = next.saturating_add(interval);
                }
                effect.next_tick_at_ms = Some(next);
            }

            list.retain(|effect| {
                if effect.is_active(now_ms) {
                    return true;
                }
                events.push(SimEvent::status_expired(
                    effect.expires_at_ms,
                    entity.clone(),
                    effect.id,
                    effect.kind.clone(),
                    effect.source.clone(),
                ));
                false
            });
        }

        self.effects.retain(|_, list| !list.is_empty());

        // Stable: same-key events keep per-entity insertion order
        events.sort();

        for event in &events {
            for (_, listener) in self.listeners.iter_mut() {
                listener(event);
            }
        }

        events
    }

    /// Movement speed multiplier: `max(0, 1 + sum(haste) - sum(slow))`.
    pub fn speed_scale(&self, entity: &EntityId) -> f64 {
        let now_ms = self.now_ms;
        let delta: f64 = self
            .effects(entity)
            .iter()
            .filter(|e| e.is_active(now_ms))
            .map(|e| match e.kind {
                StatusEffectKind::Haste => e.magnitude,
                StatusEffectKind::Slow => -e.magnitude,
                _ => 0.0,
            })
            .sum();
        (1.0 + delta).max(0.0)
    }

    /// Remove every effect on an entity (no expiry events).
    pub fn clear_entity(&mut self, entity: &EntityId) -> bool {
        self.effects.remove(entity).is_some()
    }

    /// Drop every effect and restart the clock at `now_ms`. Listeners stay.
    pub fn reset(&mut self, now_ms: u64) {
        self.effects.clear();
        self.now_ms = now_ms;
    }

    /// Subscribe to tick/expiry signals.
    pub fn subscribe<F>(&mut self, listener: F) -> HookId
    where
        F: FnMut(&SimEvent) + 'static,
    {
        let id = HookId(self.next_hook_id);
        self.next_hook_id += 1;
        self.subscribe_as(id, listener)
    }

    /// Subscribe under an id allocated by the caller (the world shares one
    /// id space between its hook kinds).
    pub fn subscribe_as<F>(&mut self, id: HookId, listener: F) -> HookId
    where
        F: FnMut(&SimEvent) + 'static,
    {
        self.next_hook_id = self.next_hook_id.max(id.0.saturating_add(1));
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a subscription. Returns false if it was not registered here.
    pub fn unsubscribe(&mut self, id: HookId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(hook, _)| *hook != id);
        self.listeners.len() != before
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use crate::game::events::SimEventData;
    use proptest::prelude::*;

    fn hero() -> EntityId {
        EntityId::new("hero")
    }

    #[test]
    fn test_slow_and_haste_speed_scale() {
        let mut ledger = StatusLedger::new();
        ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Slow, 2000.0, 0.5));
        assert_eq!(ledger.speed_scale(&hero()), 0.5);

        ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Haste, 2000.0, 0.3));
        assert!((ledger.speed_scale(&hero()) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_speed_scale_never_negative() {
        let mut ledger = StatusLedger::new();
        for _ in 0..5 {
            ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Slow, 1000.0, 0.6));
        }
        assert_eq!(ledger.speed_scale(&hero()), 0.0);
        assert_eq!(ledger.speed_scale(&EntityId::new("nobody")), 1.0);
    }

    #[test]
    fn test_burn_ticks_and_single_expiry() {
        let mut ledger = StatusLedger::new();
        let id = ledger
            .apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Burn, 1200.0, 3.0).with_tick_interval(500.0))
            .unwrap();

        let mut ticks = Vec::new();
        let mut expiries = Vec::new();
        for _ in 0..100 {
            for event in ledger.tick(16.0) {
                match event.data {
                    SimEventData::StatusTicked { effect_id, .. } => {
                        assert_eq!(effect_id, id);
                        ticks.push(event.at_ms);
                    }
                    SimEventData::StatusExpired { .. } => expiries.push(event.at_ms),
                    _ => unreachable!(),
                }
            }
        }

        assert_eq!(ticks, vec![500, 1000]);
        assert_eq!(expiries, vec![1200]);
        assert!(ledger.effects(&hero()).is_empty());
    }

    #[test]
    fn test_tick_at_expiry_boundary_included() {
        let mut ledger = StatusLedger::new();
        ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Regen, 1000.0, 1.0).with_tick_interval(500.0));

        let events = ledger.tick(1000.0);
        let ticks: Vec<_> = events
            .iter()
            .filter(|e| matches!(e.data, SimEventData::StatusTicked { .. }))
            .map(|e| e.at_ms)
            .collect();
        assert_eq!(ticks, vec![500, 1000]);
        // Ticks come before the expiry at the same instant
        assert!(matches!(events.last().unwrap().data, SimEventData::StatusExpired { .. }));
    }

    #[test]
    fn test_refresh_overwrites_in_place() {
        let mut ledger = StatusLedger::new();
        let first = ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Burn, 1000.0, 1.0)).unwrap();
        ledger.tick(600.0);
        let second = ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Burn, 1000.0, 4.0)).unwrap();

        assert_eq!(first, second);
        let effects = ledger.effects(&hero());
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].magnitude, 4.0);
        assert_eq!(effects[0].expires_at_ms, 1600);
        assert_eq!(effects[0].next_tick_at_ms, Some(1600));
    }

    #[test]
    fn test_replace_discards_existing() {
        let mut ledger = StatusLedger::new();
        ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Slow, 1000.0, 0.2));
        ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Slow, 1000.0, 0.2));
        ledger.apply(
            &hero(),
            StatusEffectSpec::new(StatusEffectKind::Slow, 1000.0, 0.7).with_stack_policy(StackPolicy::Replace),
        );

        let effects = ledger.effects(&hero());
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].magnitude, 0.7);
    }

    #[test]
    fn test_stack_evicts_oldest() {
        let mut ledger = StatusLedger::new();
        let spec = |m: f64| StatusEffectSpec::new(StatusEffectKind::Slow, 1000.0, m).with_max_stacks(2);
        let a = ledger.apply(&hero(), spec(0.1)).unwrap();
        let b = ledger.apply(&hero(), spec(0.2)).unwrap();
        let c = ledger.apply(&hero(), spec(0.3)).unwrap();

        let ids: Vec<u64> = ledger.effects(&hero()).iter().map(|e| e.id).collect();
        assert!(!ids.contains(&a));
        assert_eq!(ids, vec![b, c]);
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let mut ledger = StatusLedger::new();
        assert!(ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Slow, 0.0, 0.5)).is_none());
        assert!(ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Slow, f64::NAN, 0.5)).is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_listeners_receive_in_order() {
        let mut ledger = StatusLedger::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let hook = ledger.subscribe(move |event| sink.borrow_mut().push(event.at_ms));

        ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Burn, 1500.0, 1.0).with_tick_interval(500.0));
        ledger.tick(2000.0);
        assert_eq!(*seen.borrow(), vec![500, 1000, 1500, 1500]);

        assert!(ledger.unsubscribe(hook));
        assert!(!ledger.unsubscribe(hook));
    }

    #[test]
    fn test_kind_serde_names() {
        let json = serde_json::to_string(&StatusEffectKind::Haste).unwrap();
        assert_eq!(json, "\"haste\"");
        let custom: StatusEffectKind = serde_json::from_str("\"poison\"").unwrap();
        assert_eq!(custom, StatusEffectKind::Custom("poison".into()));
    }

    proptest! {
        #[test]
        fn prop_speed_scale_non_negative(
            slows in proptest::collection::vec(0.0f64..2.0, 0..8),
            hastes in proptest::collection::vec(0.0f64..2.0, 0..8),
        ) {
            let mut ledger = StatusLedger::new();
            for m in &slows {
                ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Slow, 500.0, *m));
            }
            for m in &hastes {
                ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Haste, 500.0, *m));
            }
            prop_assert!(ledger.speed_scale(&hero()) >= 0.0);
        }

        #[test]
        fn prop_expiry_fires_once(duration in 1u32..5000, step in 1u32..200) {
            let mut ledger = StatusLedger::new();
            ledger.apply(&hero(), StatusEffectSpec::new(StatusEffectKind::Haste, duration as f64, 0.1));
            let mut expiries = 0;
            for _ in 0..(duration / step + 2) {
                expiries += ledger
                    .tick(step as f64)
                    .iter()
                    .filter(|e| matches!(e.data, SimEventData::StatusExpired { .. }))
                    .count();
            }
            prop_assert_eq!(expiries, 1);
        }
    }
}
