//! World Facade
//!
//! [`World`] owns the [`GameState`] plus every component ledger and exposes
//! the queries and named mutators callers use between ticks. The tick itself
//! lives in [`crate::game::tick`].
//!
//! ## Error Policy
//!
//! - Bad numbers are clamped or defaulted.
//! - Missing ids are no-ops returning `false` / `None`.
//! - Setup-time violations (scene loading, spawning) return [`WorldError`].

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::core::hash::{StateHash, compute_state_hash};
use crate::core::vec2::{Vec2, finite_or};
use crate::game::archetype::NpcArchetypeProfile;
use crate::game::behavior::{
    BehaviorState, BehaviorTransition, InterruptOutcome, TimedInterrupt, TransitionHistory,
    set_behavior, start_interrupt,
};
use crate::game::camera::{Camera, CameraMode, Viewport};
use crate::game::collision::{CollisionLayers, overlapping_ids};
use crate::game::config::SimConfig;
use crate::game::events::{HookId, SimEvent};
use crate::game::force_field::{ForceField, ForceZone};
use crate::game::input::normalize_move;
use crate::game::jump::{JumpRequest, JumpState};
use crate::game::pause::{PauseEdge, PauseEvent, PauseGate};
use crate::game::state::{
    Entity, EntityId, GameState, PhysicsBody, PhysicsBodyPatch, is_world_bound_id,
};
use crate::game::status::{StatusEffect, StatusEffectKind, StatusEffectSpec, StatusLedger};
use crate::game::tick::{self, StepResult};

/// World setup errors.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// `player_id` names an entity that does not exist.
    #[error("Unknown player id: {0}")]
    UnknownPlayer(EntityId),

    /// A scene used an id reserved for world bounds.
    #[error("Reserved entity id: {0}")]
    ReservedId(EntityId),

    /// Spawning an id that already exists.
    #[error("Duplicate entity id: {0}")]
    DuplicateEntity(EntityId),

    /// World size must be finite and non-negative.
    #[error("Invalid world size: {width} x {height}")]
    InvalidWorldSize {
        /// Requested width
        width: f64,
        /// Requested height
        height: f64,
    },

    /// Malformed scene JSON.
    #[error("Invalid scene JSON: {0}")]
    Scene(#[from] serde_json::Error),
}

/// Scene payload produced by worldgen or editors.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    /// World extent
    pub world_size: Option<Vec2>,
    /// Synthesize bound colliders
    pub world_bounds_enabled: bool,
    /// Player entity id
    pub player_id: Option<EntityId>,
    /// Entities (world bounds are synthesized, not listed)
    pub entities: Vec<Entity>,
    /// Initial camera
    pub camera: Option<Camera>,
    /// Force zones
    pub force_zones: Vec<ForceZone>,
}

/// The simulation context: state plus component ledgers.
///
/// Many worlds can coexist; nothing is global.
#[derive(Debug)]
pub struct World {
    pub(crate) state: GameState,
    pub(crate) config: SimConfig,
    pub(crate) ledger: StatusLedger,
    pub(crate) forces: ForceField,
    pub(crate) history: TransitionHistory,
    pub(crate) jumps: BTreeMap<EntityId, JumpState>,
    pub(crate) pending_events: Vec<SimEvent>,
    pause: PauseGate,
    next_hook_id: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl World {
    /// Empty world with the given tunables.
    pub fn new(config: SimConfig) -> Self {
        let config = config.sanitized();
        Self {
            state: GameState::default(),
            ledger: StatusLedger::new(),
            forces: ForceField::new(),
            history: TransitionHistory::new(config.history_capacity),
            jumps: BTreeMap::new(),
            pending_events: Vec::new(),
            pause: PauseGate::new(),
            next_hook_id: 1,
            config,
        }
    }

    /// World built from a scene.
    pub fn from_scene(config: SimConfig, scene: Scene) -> Result<Self, WorldError> {
        let mut world = Self::new(config);
        world.apply_scene(scene)?;
        Ok(world)
    }

    // =========================================================================
    // SIMULATION
    // =========================================================================

    /// Advance by `delta_ms`. Returns true iff an entity's position,
    /// velocity or behavior state changed.
    pub fn step_physics(&mut self, delta_ms: f64) -> bool {
        tick::step(self, delta_ms).changed
    }

    /// Advance by `delta_ms`, returning the change flag and the events.
    pub fn step(&mut self, delta_ms: f64) -> StepResult {
        tick::step(self, delta_ms)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Borrow the full state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Owned copy of the state.
    pub fn snapshot(&self) -> GameState {
        self.state.clone()
    }

    /// Active tunables.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Live player entity.
    pub fn player(&self) -> Option<&Entity> {
        self.state.player()
    }

    /// Live player entity, mutable.
    pub fn player_mut(&mut self) -> Option<&mut Entity> {
        self.state.player_mut()
    }

    /// Entity by id.
    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.state.entity(id)
    }

    /// Entity by id, mutable.
    pub fn entity_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.state.entity_mut(id)
    }

    /// Simulation clock.
    pub fn now_ms(&self) -> u64 {
        self.state.now_ms
    }

    /// True while any pause reason is held.
    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    /// Held pause reasons, sorted.
    pub fn pause_reasons(&self) -> Vec<String> {
        self.state.pause_reasons.iter().cloned().collect()
    }

    /// Behavior state of an entity.
    pub fn behavior_state(&self, id: &EntityId) -> Option<&BehaviorState> {
        self.state.entity(id).map(|e| &e.behavior_state)
    }

    /// Up to `limit` most recent transitions, oldest first, optionally for
    /// one entity.
    pub fn behavior_history(&self, entity: Option<&EntityId>, limit: usize) -> Vec<BehaviorTransition> {
        self.history.recent(entity, limit)
    }

    /// Status-effect speed multiplier (1.0 without effects).
    pub fn movement_speed_scale(&self, id: &EntityId) -> f64 {
        self.ledger.speed_scale(id)
    }

    /// Active status effects on an entity.
    pub fn status_effects(&self, id: &EntityId) -> &[StatusEffect] {
        self.ledger.effects(id)
    }

    /// NPC profile of an entity.
    pub fn npc_profile(&self, id: &EntityId) -> Option<&NpcArchetypeProfile> {
        self.state.entity(id).and_then(|e| e.npc_profile.as_ref())
    }

    /// Registered force zones in id order.
    pub fn force_zones(&self) -> impl Iterator<Item = &ForceZone> {
        self.forces.zones()
    }

    /// Camera state.
    pub fn camera(&self) -> &Camera {
        &self.state.camera
    }

    /// Ids of entities whose colliders overlap this one's and can collide,
    /// including `overlap`-response triggers.
    pub fn overlapping(&self, id: &EntityId) -> Vec<EntityId> {
        let Some(entity) = self.state.entity(id) else {
            return Vec::new();
        };
        let (Some(collider), Some(aabb)) = (entity.collider, entity.aabb()) else {
            return Vec::new();
        };
        overlapping_ids(id, aabb, &collider, &self.state.obstacles())
    }

    /// Ground contact from the last tick.
    pub fn is_grounded(&self, id: &EntityId) -> bool {
        self.jumps.get(id).is_some_and(|j| j.grounded)
    }

    /// Digest of the state and status effects.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.state.now_ms, |hasher| {
            self.state.hash_into(hasher);
            for id in self.state.entities.keys() {
                for effect in self.ledger.effects(id) {
                    hasher.update_u64(effect.id);
                    hasher.update_str(effect.kind.as_str());
                    hasher.update_f64(effect.magnitude);
                    hasher.update_u64(effect.expires_at_ms);
                }
            }
        })
    }

    /// Drain events emitted since the last call (ticks and mutators).
    pub fn take_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // =========================================================================
    // SETUP
    // =========================================================================

    /// Replace the whole state.
    ///
    /// World bounds are rebuilt from the new size and flag. Status effects,
    /// jump bookkeeping and history are reset. Pause hooks do not fire.
    pub fn set_state(&mut self, state: GameState) -> Result<(), WorldError> {
        let mut state = state;
        validate_world_size(state.world_size)?;

        // Bounds are synthesized from the size and flag below
        state.world_bounds_ids.clear();
        state.entities.retain(|id, _| !is_world_bound_id(id));
        if let Some(player_id) = &state.player_id {
            if !state.entities.contains_key(player_id) {
                return Err(WorldError::UnknownPlayer(player_id.clone()));
            }
        }

        state.entities = std::mem::take(&mut state.entities)
            .into_iter()
            .map(|(id, entity)| {
                let mut entity = entity.sanitized();
                entity.id = id.clone();
                (id, entity)
            })
            .collect();
        state.move_input = normalize_move(state.move_input);
        state
            .saved_bound_masks
            .retain(|id, _| state.entities.contains_key(id));
        state.rebuild_world_bounds(self.config.world_bound_thickness_px);

        self.ledger.reset(state.now_ms);
        self.jumps.clear();
        self.history.clear();
        self.state = state;
        self.refresh_camera();

        debug!(
            "World state replaced: {} entities, bounds {}",
            self.state.entities.len(),
            self.state.world_bounds_enabled
        );
        Ok(())
    }

    /// Parse and apply a [`Scene`] JSON document.
    pub fn load_scene_json(&mut self, json: &str) -> Result<(), WorldError> {
        let scene: Scene = serde_json::from_str(json)?;
        self.apply_scene(scene)
    }

    /// Replace the state with a scene.
    pub fn apply_scene(&mut self, scene: Scene) -> Result<(), WorldError> {
        let world_size = scene.world_size.unwrap_or(self.state.world_size);
        validate_world_size(world_size)?;
        let mut state = GameState::new(world_size);
        state.world_bounds_enabled = scene.world_bounds_enabled;
        state.player_id = scene.player_id;
        if let Some(camera) = scene.camera {
            state.camera = camera;
        }

        for entity in scene.entities {
            if is_world_bound_id(&entity.id) {
                return Err(WorldError::ReservedId(entity.id));
            }
            if state.entities.contains_key(&entity.id) {
                return Err(WorldError::DuplicateEntity(entity.id));
            }
            state.insert(entity);
        }

        self.set_state(state)?;

        self.forces = ForceField::new();
        for zone in scene.force_zones {
            self.forces.set_zone(zone);
        }
        Ok(())
    }

    /// Add one entity.
    pub fn spawn_entity(&mut self, entity: Entity) -> Result<(), WorldError> {
        if is_world_bound_id(&entity.id) {
            return Err(WorldError::ReservedId(entity.id));
        }
        if self.state.entities.contains_key(&entity.id) {
            return Err(WorldError::DuplicateEntity(entity.id));
        }
        let entity = entity.sanitized();
        debug!("Spawned {} ({})", entity.id, entity.kind);
        self.state.insert(entity);
        Ok(())
    }

    /// Remove an entity and everything attached to it. World bounds cannot
    /// be removed this way.
    pub fn remove_entity(&mut self, id: &EntityId) -> Option<Entity> {
        if is_world_bound_id(id) {
            debug!("Refused to remove world bound {}", id);
            return None;
        }
        let removed = self.state.entities.remove(id)?;
        self.ledger.clear_entity(id);
        self.jumps.remove(id);
        self.state.saved_bound_masks.remove(id);
        if self.state.player_id.as_ref() == Some(id) {
            self.state.player_id = None;
        }
        if self.state.camera.follow_target_id.as_ref() == Some(id) {
            self.state.camera.follow_target_id = None;
        }
        Some(removed)
    }

    /// Mark an existing entity as the player.
    pub fn set_player(&mut self, id: &EntityId) -> Result<(), WorldError> {
        if !self.state.entities.contains_key(id) {
            return Err(WorldError::UnknownPlayer(id.clone()));
        }
        self.state.player_id = Some(id.clone());
        self.refresh_camera();
        Ok(())
    }

    /// Resize the world; bounds are rebuilt and the camera re-clamped.
    pub fn set_world_size(&mut self, width: f64, height: f64) -> Result<(), WorldError> {
        let size = Vec2::new(width, height);
        validate_world_size(size)?;
        self.state.world_size = size;
        self.rebuild_world_bounds();
        self.refresh_camera();
        Ok(())
    }

    /// Toggle the synthesized world bounds.
    pub fn set_world_bounds_enabled(&mut self, enabled: bool) {
        if self.state.world_bounds_enabled == enabled {
            return;
        }
        self.state.world_bounds_enabled = enabled;
        self.rebuild_world_bounds();
    }

    fn rebuild_world_bounds(&mut self) {
        self.state.rebuild_world_bounds(self.config.world_bound_thickness_px);
        debug!(
            "World bounds rebuilt: {} x {} ({} colliders)",
            self.state.world_size.x,
            self.state.world_size.y,
            self.state.world_bounds_ids.len()
        );
    }

    /// Let the player pass through world bounds (mask toggle).
    pub fn set_player_can_pass_world_bounds(&mut self, can_pass: bool) -> bool {
        match self.state.player_id.clone() {
            Some(id) => self.set_entity_can_pass_world_bounds(&id, can_pass),
            None => false,
        }
    }

    /// Remove WORLD from the entity's mask, or restore the saved mask.
    pub fn set_entity_can_pass_world_bounds(&mut self, id: &EntityId, can_pass: bool) -> bool {
        let Some(collider) = self.state.entities.get_mut(id).and_then(|e| e.collider.as_mut()) else {
            debug!("Bound passthrough ignored: {} has no collider", id);
            return false;
        };

        if can_pass {
            if !self.state.saved_bound_masks.contains_key(id) {
                self.state.saved_bound_masks.insert(id.clone(), collider.collides_with);
            }
            collider.collides_with = collider.collides_with.without(CollisionLayers::WORLD);
        } else if let Some(mask) = self.state.saved_bound_masks.remove(id) {
            collider.collides_with = mask;
        }
        true
    }

    /// Entity currently passes world bounds.
    pub fn can_pass_world_bounds(&self, id: &EntityId) -> bool {
        self.state
            .entity(id)
            .and_then(|e| e.collider)
            .is_some_and(|c| !c.collides_with.intersects(CollisionLayers::WORLD))
    }

    // =========================================================================
    // PAUSE
    // =========================================================================

    /// Hold a pause reason. Returns true if this paused the simulation.
    pub fn pause_world(&mut self, reason: &str) -> bool {
        self.pause.pause(&mut self.state.pause_reasons, reason)
    }

    /// Release a pause reason. Returns true if the simulation resumed.
    pub fn resume_world(&mut self, reason: &str) -> bool {
        self.pause.resume(&mut self.state.pause_reasons, reason)
    }

    /// Release every reason. Returns true if the simulation resumed.
    pub fn clear_pause_reasons(&mut self) -> bool {
        self.pause.clear(&mut self.state.pause_reasons)
    }

    fn allocate_hook(&mut self) -> HookId {
        let id = HookId(self.next_hook_id);
        self.next_hook_id += 1;
        id
    }

    /// Called on the running -> paused edge.
    pub fn on_pause<F>(&mut self, hook: F) -> HookId
    where
        F: FnMut(&PauseEvent) + 'static,
    {
        let id = self.allocate_hook();
        self.pause.subscribe(id, PauseEdge::Pause, hook)
    }

    /// Called on the paused -> running edge.
    pub fn on_resume<F>(&mut self, hook: F) -> HookId
    where
        F: FnMut(&PauseEvent) + 'static,
    {
        let id = self.allocate_hook();
        self.pause.subscribe(id, PauseEdge::Resume, hook)
    }

    /// Called for every status tick/expiry, in order.
    pub fn on_status_event<F>(&mut self, hook: F) -> HookId
    where
        F: FnMut(&SimEvent) + 'static,
    {
        let id = self.allocate_hook();
        self.ledger.subscribe_as(id, hook)
    }

    /// Unsubscribe any hook.
    pub fn remove_hook(&mut self, id: HookId) -> bool {
        self.pause.unsubscribe(id) || self.ledger.unsubscribe(id)
    }

    // =========================================================================
    // PHYSICS MUTATORS
    // =========================================================================

    /// Give the player a body (gravity on by default) and apply `patch`.
    pub fn enable_player_physics(&mut self, patch: PhysicsBodyPatch) -> bool {
        match self.state.player_id.clone() {
            Some(id) => self.enable_entity_physics(&id, patch),
            None => false,
        }
    }

    /// Give an entity a body (gravity on by default) and apply `patch`.
    /// An existing body keeps every field the patch leaves out.
    pub fn enable_entity_physics(&mut self, id: &EntityId, patch: PhysicsBodyPatch) -> bool {
        let Some(entity) = self.state.entity_mut(id) else {
            debug!("enable_entity_physics: unknown entity {}", id);
            return false;
        };
        let base = entity.physics_body.unwrap_or_else(PhysicsBody::platformer);
        entity.physics_body = Some(base.merge(&patch));
        true
    }

    /// Remove the player's body.
    pub fn disable_player_physics(&mut self) -> bool {
        match self.state.player_id.clone() {
            Some(id) => self.disable_entity_physics(&id),
            None => false,
        }
    }

    /// Remove an entity's body.
    pub fn disable_entity_physics(&mut self, id: &EntityId) -> bool {
        let removed = self
            .state
            .entity_mut(id)
            .and_then(|e| e.physics_body.take())
            .is_some();
        if removed {
            self.jumps.remove(id);
        }
        removed
    }

    /// Toggle gravity on an existing body.
    pub fn set_entity_gravity(&mut self, id: &EntityId, enabled: bool) -> bool {
        match self.state.entity_mut(id).and_then(|e| e.physics_body.as_mut()) {
            Some(body) => {
                body.affected_by_gravity = enabled;
                true
            }
            None => false,
        }
    }

    /// Player move scalar; clamped to [-1, 1], NaN -> 0.
    pub fn set_move_input(&mut self, value: f64) {
        self.state.move_input = normalize_move(value);
    }

    /// Set velocity components directly. Non-finite components are kept.
    /// Ignored while paused.
    pub fn set_entity_velocity(&mut self, id: &EntityId, velocity: Vec2) -> bool {
        if self.state.is_paused() {
            return false;
        }
        match self.state.entity_mut(id).and_then(|e| e.physics_body.as_mut()) {
            Some(body) => {
                body.velocity = Vec2::new(
                    finite_or(velocity.x, body.velocity.x),
                    finite_or(velocity.y, body.velocity.y),
                );
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // JUMPS
    // =========================================================================

    /// Jump the player now if grounded or inside coyote time, else buffer.
    pub fn jump_player(&mut self, velocity: f64) -> bool {
        match self.state.player_id.clone() {
            Some(id) => self.jump_entity(&id, velocity),
            None => false,
        }
    }

    /// Jump an entity now if grounded or inside coyote time, else buffer the
    /// request. Does nothing while paused.
    pub fn jump_entity(&mut self, id: &EntityId, velocity: f64) -> bool {
        if self.state.is_paused() || !velocity.is_finite() {
            return false;
        }
        let now_ms = self.state.now_ms;
        let coyote_ms = self.config.coyote_time_ms;
        let Some(body) = self.state.entities.get_mut(id).and_then(|e| e.physics_body.as_mut()) else {
            return false;
        };

        let jump = self.jumps.entry(id.clone()).or_default();
        if !jump.request(velocity, now_ms, coyote_ms) {
            return false;
        }
        body.velocity.y = -velocity;
        self.pending_events.push(SimEvent::jumped(now_ms, id.clone(), velocity, false));
        true
    }

    /// Buffer a player jump for the next grounded frame without trying it
    /// now. Ignored while paused.
    pub fn request_jump(&mut self, velocity: f64) -> bool {
        if self.state.is_paused() || !velocity.is_finite() {
            return false;
        }
        let Some(id) = self.state.player_id.clone() else {
            return false;
        };
        let now_ms = self.state.now_ms;
        self.jumps.entry(id).or_default().buffered = Some(JumpRequest {
            velocity,
            requested_at_ms: now_ms,
        });
        true
    }

    // =========================================================================
    // BEHAVIOR
    // =========================================================================

    fn mark(&mut self, id: &EntityId, interrupt: TimedInterrupt, duration_ms: f64) -> bool {
        let now_ms = self.state.now_ms;
        let duration = self.config.timed_state_defaults.resolve(interrupt, duration_ms);
        let Some(entity) = self.state.entities.get_mut(id) else {
            debug!("{:?} ignored: unknown entity {}", interrupt, id);
            return false;
        };

        match start_interrupt(entity, interrupt, duration, now_ms, &mut self.history) {
            InterruptOutcome::Started(transition) => {
                if let Some(t) = transition {
                    self.pending_events.push(SimEvent::behavior_changed(t.at_ms, t.entity_id, t.from, t.to));
                }
                true
            }
            InterruptOutcome::Rejected => {
                debug!("{:?} on {} rejected by a higher-priority state", interrupt, id);
                false
            }
        }
    }

    fn mark_player(&mut self, interrupt: TimedInterrupt, duration_ms: f64) -> bool {
        match self.state.player_id.clone() {
            Some(id) => self.mark(&id, interrupt, duration_ms),
            None => false,
        }
    }

    /// Damaged reaction on the player.
    pub fn mark_player_damaged(&mut self, duration_ms: f64) -> bool {
        self.mark_player(TimedInterrupt::Damaged, duration_ms)
    }

    /// Attack swing on the player.
    pub fn mark_player_attacking(&mut self, duration_ms: f64) -> bool {
        self.mark_player(TimedInterrupt::Attacking, duration_ms)
    }

    /// Stun the player (no horizontal control while it runs).
    pub fn mark_player_stunned(&mut self, duration_ms: f64) -> bool {
        self.mark_player(TimedInterrupt::Stunned, duration_ms)
    }

    /// Dodge on the player.
    pub fn mark_player_dodging(&mut self, duration_ms: f64) -> bool {
        self.mark_player(TimedInterrupt::Dodging, duration_ms)
    }

    /// Block on the player.
    pub fn mark_player_blocking(&mut self, duration_ms: f64) -> bool {
        self.mark_player(TimedInterrupt::Blocking, duration_ms)
    }

    /// Damaged reaction on an entity.
    pub fn mark_entity_damaged(&mut self, id: &EntityId, duration_ms: f64) -> bool {
        self.mark(id, TimedInterrupt::Damaged, duration_ms)
    }

    /// Attack swing on an entity.
    pub fn mark_entity_attacking(&mut self, id: &EntityId, duration_ms: f64) -> bool {
        self.mark(id, TimedInterrupt::Attacking, duration_ms)
    }

    /// Stun an entity.
    pub fn mark_entity_stunned(&mut self, id: &EntityId, duration_ms: f64) -> bool {
        self.mark(id, TimedInterrupt::Stunned, duration_ms)
    }

    /// Dodge on an entity.
    pub fn mark_entity_dodging(&mut self, id: &EntityId, duration_ms: f64) -> bool {
        self.mark(id, TimedInterrupt::Dodging, duration_ms)
    }

    /// Block on an entity.
    pub fn mark_entity_blocking(&mut self, id: &EntityId, duration_ms: f64) -> bool {
        self.mark(id, TimedInterrupt::Blocking, duration_ms)
    }

    /// Untimed manual state (boss phase). Clears any timed state.
    pub fn set_entity_boss_phase(&mut self, id: &EntityId, phase: impl Into<BehaviorState>) -> bool {
        let now_ms = self.state.now_ms;
        let Some(entity) = self.state.entities.get_mut(id) else {
            return false;
        };
        let phase = phase.into();
        entity.timed_state = None;
        entity.manual_state = Some(phase.clone());
        if let Some(t) = set_behavior(entity, phase, now_ms, &mut self.history) {
            self.pending_events.push(SimEvent::behavior_changed(t.at_ms, t.entity_id, t.from, t.to));
        }
        true
    }

    /// Drop the manual state; the entity returns to idle until the next
    /// tick recomputes it.
    pub fn clear_entity_boss_phase(&mut self, id: &EntityId) -> bool {
        let now_ms = self.state.now_ms;
        let Some(entity) = self.state.entities.get_mut(id) else {
            return false;
        };
        if entity.manual_state.take().is_none() {
            return false;
        }
        if entity.timed_state.is_none() {
            if let Some(t) = set_behavior(entity, BehaviorState::Idle, now_ms, &mut self.history) {
                self.pending_events.push(SimEvent::behavior_changed(t.at_ms, t.entity_id, t.from, t.to));
            }
        }
        true
    }

    /// Resize the transition ring buffer (values below 1 become 1).
    pub fn set_history_capacity(&mut self, capacity: usize) {
        self.history.set_capacity(capacity);
    }

    /// Forget recorded transitions; states are untouched.
    pub fn clear_behavior_history(&mut self) {
        self.history.clear();
    }

    // =========================================================================
    // NPC ARCHETYPES
    // =========================================================================

    /// Attach an NPC profile. Missing anchors come from the entity's
    /// position; entities without a body get a top-down one. The player
    /// cannot carry a profile.
    pub fn set_npc_profile(&mut self, id: &EntityId, profile: NpcArchetypeProfile) -> bool {
        if self.state.player_id.as_ref() == Some(id) || is_world_bound_id(id) {
            debug!("set_npc_profile refused for {}", id);
            return false;
        }
        let Some(entity) = self.state.entities.get_mut(id) else {
            return false;
        };
        entity.npc_profile = Some(profile.prepared(entity.position));
        if entity.physics_body.is_none() {
            entity.physics_body = Some(PhysicsBody::top_down());
        }
        true
    }

    /// Detach and return an NPC profile.
    pub fn clear_npc_profile(&mut self, id: &EntityId) -> Option<NpcArchetypeProfile> {
        self.state.entity_mut(id).and_then(|e| e.npc_profile.take())
    }

    // =========================================================================
    // FORCE ZONES
    // =========================================================================

    /// Insert or replace a zone by id.
    pub fn set_force_zone(&mut self, zone: ForceZone) -> Option<ForceZone> {
        self.forces.set_zone(zone)
    }

    /// Remove a zone.
    pub fn clear_force_zone(&mut self, id: &str) -> bool {
        self.forces.clear_zone(id)
    }

    // =========================================================================
    // STATUS EFFECTS
    // =========================================================================

    /// Apply an effect to an existing entity. Returns the effect id.
    pub fn apply_status_effect(&mut self, id: &EntityId, spec: StatusEffectSpec) -> Option<u64> {
        if !self.state.entities.contains_key(id) {
            debug!("Status {} ignored: unknown entity {}", spec.kind, id);
            return None;
        }
        self.ledger.apply(id, spec)
    }

    /// Slow by `magnitude` (0.5 halves speed).
    pub fn apply_slow(&mut self, id: &EntityId, duration_ms: f64, magnitude: f64) -> Option<u64> {
        self.apply_status_effect(id, StatusEffectSpec::new(StatusEffectKind::Slow, duration_ms, magnitude))
    }

    /// Speed up by `magnitude`.
    pub fn apply_haste(&mut self, id: &EntityId, duration_ms: f64, magnitude: f64) -> Option<u64> {
        self.apply_status_effect(id, StatusEffectSpec::new(StatusEffectKind::Haste, duration_ms, magnitude))
    }

    /// Periodic damage signal.
    pub fn apply_burn(&mut self, id: &EntityId, duration_ms: f64, magnitude: f64) -> Option<u64> {
        self.apply_status_effect(id, StatusEffectSpec::new(StatusEffectKind::Burn, duration_ms, magnitude))
    }

    /// Periodic heal signal.
    pub fn apply_regen(&mut self, id: &EntityId, duration_ms: f64, magnitude: f64) -> Option<u64> {
        self.apply_status_effect(id, StatusEffectSpec::new(StatusEffectKind::Regen, duration_ms, magnitude))
    }

    // =========================================================================
    // CAMERA
    // =========================================================================

    /// Switch camera mode (follow modes snap immediately).
    pub fn set_camera_mode(&mut self, mode: CameraMode) {
        self.state.camera.mode = mode;
        self.refresh_camera();
    }

    /// Move the camera. In follow modes the next update overrides this.
    pub fn set_camera_position(&mut self, x: f64, y: f64) {
        let world_size = self.state.world_size;
        self.state.camera.set_position(Vec2::new(x, y), world_size);
    }

    /// Resize the viewport.
    pub fn set_camera_viewport(&mut self, width: f64, height: f64) {
        self.state.camera.viewport = Viewport::new(width, height);
        self.refresh_camera();
    }

    /// Toggle clamping to the world.
    pub fn set_camera_clamp(&mut self, clamp_to_world: bool) {
        self.state.camera.clamp_to_world = clamp_to_world;
        self.refresh_camera();
    }

    /// Follow an entity (`FollowTarget` mode), or go manual with `None`.
    pub fn set_camera_follow_target(&mut self, id: Option<EntityId>) -> bool {
        match id {
            Some(id) if self.state.entities.contains_key(&id) => {
                self.state.camera.follow_target_id = Some(id);
                self.state.camera.mode = CameraMode::FollowTarget;
                self.refresh_camera();
                true
            }
            Some(id) => {
                warn!("Camera follow target {} does not exist", id);
                false
            }
            None => {
                self.state.camera.follow_target_id = None;
                self.state.camera.mode = CameraMode::Manual;
                true
            }
        }
    }

    /// Pan by a delta; follow modes keep following with an offset.
    pub fn pan_camera(&mut self, dx: f64, dy: f64) {
        let world_size = self.state.world_size;
        self.state.camera.pan(Vec2::new(dx, dy), world_size);
    }

    /// Re-run the camera follow/clamp against the current state.
    pub(crate) fn refresh_camera(&mut self) -> bool {
        let target = self
            .state
            .camera
            .target_id(self.state.player_id.as_ref())
            .and_then(|id| self.state.entities.get(id))
            .map(|e| e.position);
        let world_size = self.state.world_size;
        self.state.camera.update(target, world_size)
    }
}

fn validate_world_size(size: Vec2) -> Result<(), WorldError> {
    if size.x.is_finite() && size.y.is_finite() && size.x >= 0.0 && size.y >= 0.0 {
        Ok(())
    } else {
        Err(WorldError::InvalidWorldSize {
            width: size.x,
            height: size.y,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
