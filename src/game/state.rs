//! Game State Definitions
//!
//! The single mutable record owned by a [`World`](crate::game::world::World).
//! Uses BTreeMap for deterministic iteration order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::core::rect::Rect;
use crate::core::vec2::{Vec2, finite_or};
use crate::game::archetype::NpcArchetypeProfile;
use crate::game::behavior::{BehaviorState, TimedState};
use crate::game::camera::Camera;
use crate::game::collision::{Collider, CollisionLayers, Obstacle};

// =============================================================================
// ENTITY ID
// =============================================================================

/// Unique entity identifier.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Create from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Ids of the four synthetic world-bound colliders (top, bottom, left, right).
pub const WORLD_BOUND_IDS: [&str; 4] = [
    "__world_bound_top",
    "__world_bound_bottom",
    "__world_bound_left",
    "__world_bound_right",
];

/// True for ids reserved for world-bound entities.
pub fn is_world_bound_id(id: &EntityId) -> bool {
    WORLD_BOUND_IDS.contains(&id.as_str())
}

// =============================================================================
// ENTITY KIND
// =============================================================================

/// Entity type tag. Also keys force-zone drag overrides.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    /// The controllable character
    Player,
    /// Hostile actor
    Enemy,
    /// Non-hostile actor
    Npc,
    /// Props, crates, platforms
    #[default]
    Object,
    /// Synthetic world edge
    WorldBound,
    /// Anything else, carried by name
    Custom(String),
}

impl EntityKind {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &str {
        match self {
            EntityKind::Player => "player",
            EntityKind::Enemy => "enemy",
            EntityKind::Npc => "npc",
            EntityKind::Object => "object",
            EntityKind::WorldBound => "world_bound",
            EntityKind::Custom(name) => name,
        }
    }
}

impl From<String> for EntityKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "player" => EntityKind::Player,
            "enemy" => EntityKind::Enemy,
            "npc" => EntityKind::Npc,
            "object" => EntityKind::Object,
            "world_bound" => EntityKind::WorldBound,
            _ => EntityKind::Custom(s),
        }
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PHYSICS BODY
// =============================================================================

/// Dynamic part of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsBody {
    /// px/s
    pub velocity: Vec2,
    /// Falls under gravity
    pub affected_by_gravity: bool,
    /// Gravity multiplier
    pub gravity_scale: f64,
    /// Horizontal drag coefficient, per second
    pub drag_x: f64,
}

impl Default for PhysicsBody {
    fn default() -> Self {
        Self {
            velocity: Vec2::ZERO,
            affected_by_gravity: false,
            gravity_scale: 1.0,
            drag_x: 0.0,
        }
    }
}

impl PhysicsBody {
    /// Body that falls under gravity.
    pub fn platformer() -> Self {
        Self {
            affected_by_gravity: true,
            ..Self::default()
        }
    }

    /// Top-down body (no gravity).
    pub fn top_down() -> Self {
        Self::default()
    }

    /// Apply a patch; fields the patch leaves out keep their value.
    pub fn merge(&self, patch: &PhysicsBodyPatch) -> PhysicsBody {
        PhysicsBody {
            velocity: Vec2::new(
                patch.velocity_x.filter(|v| v.is_finite()).unwrap_or(self.velocity.x),
                patch.velocity_y.filter(|v| v.is_finite()).unwrap_or(self.velocity.y),
            ),
            affected_by_gravity: patch.affected_by_gravity.unwrap_or(self.affected_by_gravity),
            gravity_scale: patch
                .gravity_scale
                .filter(|g| g.is_finite())
                .unwrap_or(self.gravity_scale),
            drag_x: patch
                .drag_x
                .filter(|d| d.is_finite())
                .map(|d| d.max(0.0))
                .unwrap_or(self.drag_x),
        }
    }

    /// Clamp non-finite numbers.
    pub fn sanitized(mut self) -> Self {
        self.velocity = self.velocity.finite_or_zero();
        self.gravity_scale = finite_or(self.gravity_scale, 1.0);
        self.drag_x = finite_or(self.drag_x, 0.0).max(0.0);
        self
    }
}

/// Partial override for [`PhysicsBody`]. `None` means "keep".
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsBodyPatch {
    /// New horizontal velocity
    pub velocity_x: Option<f64>,
    /// New vertical velocity
    pub velocity_y: Option<f64>,
    /// Toggle gravity
    pub affected_by_gravity: Option<bool>,
    /// New gravity multiplier
    pub gravity_scale: Option<f64>,
    /// New drag coefficient
    pub drag_x: Option<f64>,
}

impl PhysicsBodyPatch {
    /// Patch that only sets gravity on/off.
    pub fn gravity(enabled: bool) -> Self {
        Self {
            affected_by_gravity: Some(enabled),
            ..Self::default()
        }
    }

    /// Patch that sets both velocity components.
    pub fn velocity(velocity: Vec2) -> Self {
        Self {
            velocity_x: Some(velocity.x),
            velocity_y: Some(velocity.y),
            ..Self::default()
        }
    }
}

// =============================================================================
// ENTITY
// =============================================================================

fn idle_animation() -> String {
    BehaviorState::Idle.as_str().to_string()
}

/// A simulated object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique id
    pub id: EntityId,

    /// Type tag
    #[serde(rename = "type", default)]
    pub kind: EntityKind,

    /// World position (collider top-left minus offset)
    #[serde(default)]
    pub position: Vec2,

    /// Optional AABB collider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collider: Option<Collider>,

    /// Optional dynamics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physics_body: Option<PhysicsBody>,

    /// Current behavior label
    #[serde(default)]
    pub behavior_state: BehaviorState,

    /// Mirrors `behavior_state`
    #[serde(default = "idle_animation")]
    pub current_animation: String,

    /// Running timed interrupt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timed_state: Option<TimedState>,

    /// Untimed state (boss phases)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_state: Option<BehaviorState>,

    /// NPC AI configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npc_profile: Option<NpcArchetypeProfile>,

    /// Sprite and other render fields, opaque to the simulation
    #[serde(flatten)]
    pub visual: BTreeMap<String, serde_json::Value>,
}

impl Entity {
    /// Entity with no collider, body or profile.
    pub fn new(id: impl Into<EntityId>, kind: EntityKind, position: Vec2) -> Self {
        Self {
            id: id.into(),
            kind,
            position: position.finite_or_zero(),
            collider: None,
            physics_body: None,
            behavior_state: BehaviorState::Idle,
            current_animation: idle_animation(),
            timed_state: None,
            manual_state: None,
            npc_profile: None,
            visual: BTreeMap::new(),
        }
    }

    /// Attach a collider.
    pub fn with_collider(mut self, collider: Collider) -> Self {
        self.collider = Some(collider.sanitized());
        self
    }

    /// Attach a physics body.
    pub fn with_body(mut self, body: PhysicsBody) -> Self {
        self.physics_body = Some(body.sanitized());
        self
    }

    /// Attach an NPC profile (anchors filled from the position).
    pub fn with_profile(mut self, profile: NpcArchetypeProfile) -> Self {
        self.npc_profile = Some(profile.prepared(self.position));
        self
    }

    /// Set an opaque visual field.
    pub fn with_visual(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.visual.insert(key.into(), value);
        self
    }

    /// World-space collider box.
    pub fn aabb(&self) -> Option<Rect> {
        self.collider.as_ref().map(|c| c.aabb(self.position))
    }

    /// Current velocity (zero without a body).
    pub fn velocity(&self) -> Vec2 {
        self.physics_body.map(|b| b.velocity).unwrap_or(Vec2::ZERO)
    }

    /// Collision snapshot for sweeps.
    pub fn obstacle(&self) -> Option<Obstacle> {
        self.collider.map(|collider| Obstacle {
            id: self.id.clone(),
            aabb: collider.aabb(self.position),
            collider,
        })
    }

    /// Clamp everything loaded from outside.
    pub fn sanitized(mut self) -> Self {
        self.position = self.position.finite_or_zero();
        self.collider = self.collider.map(Collider::sanitized);
        self.physics_body = self.physics_body.map(PhysicsBody::sanitized);
        self.current_animation = self.behavior_state.as_str().to_string();
        let position = self.position;
        self.npc_profile = self.npc_profile.map(|p| p.prepared(position));
        self
    }

    /// Add simulation-relevant fields to a hasher.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_str(self.id.as_str());
        hasher.update_str(self.kind.as_str());
        hasher.update_vec2(self.position);
        match &self.physics_body {
            Some(body) => {
                hasher.update_bool(true);
                hasher.update_vec2(body.velocity);
                hasher.update_bool(body.affected_by_gravity);
            }
            None => hasher.update_bool(false),
        }
        if let Some(collider) = &self.collider {
            hasher.update_u32(collider.layer.bits());
            hasher.update_u32(collider.collides_with.bits());
        }
        hasher.update_str(self.behavior_state.as_str());
        match &self.timed_state {
            Some(timed) => hasher.update_u64(timed.expires_at_ms),
            None => hasher.update_u64(0),
        }
    }
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Complete simulation state.
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameState {
    /// All entities, including world bounds
    pub entities: BTreeMap<EntityId, Entity>,

    /// Reference to the player entity
    pub player_id: Option<EntityId>,

    /// World extent in px
    pub world_size: Vec2,

    /// Synthesize bound colliders around the world
    pub world_bounds_enabled: bool,

    /// Ids of the synthesized bounds (empty when disabled)
    pub world_bounds_ids: Vec<EntityId>,

    /// Camera
    pub camera: Camera,

    /// Paused iff non-empty
    pub pause_reasons: BTreeSet<String>,

    /// Simulation clock
    pub now_ms: u64,

    /// Player move scalar in [-1, 1]
    pub move_input: f64,

    /// Masks saved by bound passthrough, restored when it is turned off
    pub saved_bound_masks: BTreeMap<EntityId, CollisionLayers>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(Vec2::new(1280.0, 720.0))
    }
}

impl GameState {
    /// Empty state with bounds disabled.
    pub fn new(world_size: Vec2) -> Self {
        Self {
            entities: BTreeMap::new(),
            player_id: None,
            world_size: world_size.non_negative(),
            world_bounds_enabled: false,
            world_bounds_ids: Vec::new(),
            camera: Camera::default(),
            pause_reasons: BTreeSet::new(),
            now_ms: 0,
            move_input: 0.0,
            saved_bound_masks: BTreeMap::new(),
        }
    }

    /// Insert or replace an entity.
    pub fn insert(&mut self, entity: Entity) -> Option<Entity> {
        self.entities.insert(entity.id.clone(), entity)
    }

    /// Get an entity by id.
    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Get an entity mutably by id.
    pub fn entity_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// The player entity, if set and present.
    pub fn player(&self) -> Option<&Entity> {
        self.player_id.as_ref().and_then(|id| self.entities.get(id))
    }

    /// The player entity mutably.
    pub fn player_mut(&mut self) -> Option<&mut Entity> {
        let id = self.player_id.clone()?;
        self.entities.get_mut(&id)
    }

    /// True if any pause reason is held.
    pub fn is_paused(&self) -> bool {
        !self.pause_reasons.is_empty()
    }

    /// Remove old bound entities and, if enabled, insert four new ones
    /// `thickness` px thick just outside the world rectangle.
    pub fn rebuild_world_bounds(&mut self, thickness: f64) {
        for id in std::mem::take(&mut self.world_bounds_ids) {
            self.entities.remove(&id);
        }
        if !self.world_bounds_enabled {
            return;
        }

        let t = finite_or(thickness, 0.0).max(1.0);
        let (w, h) = (self.world_size.x, self.world_size.y);
        let rects = [
            Rect::new(-t, -t, w + 2.0 * t, t),
            Rect::new(-t, h, w + 2.0 * t, t),
            Rect::new(-t, 0.0, t, h),
            Rect::new(w, 0.0, t, h),
        ];

        for (name, rect) in WORLD_BOUND_IDS.iter().zip(rects) {
            let collider = Collider::new(Vec2::new(rect.width, rect.height))
                .with_layer(CollisionLayers::WORLD)
                .with_mask(CollisionLayers::ALL);
            let entity = Entity::new(*name, EntityKind::WorldBound, Vec2::new(rect.x, rect.y))
                .with_collider(collider);
            self.world_bounds_ids.push(entity.id.clone());
            self.insert(entity);
        }
    }

    /// Collision snapshots of every entity with a collider.
    pub fn obstacles(&self) -> Vec<Obstacle> {
        self.entities.values().filter_map(Entity::obstacle).collect()
    }

    /// Add everything but the clock to a hasher.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        // Hash all entities in sorted order (BTreeMap guarantees this)
        hasher.update_u64(self.entities.len() as u64);
        for entity in self.entities.values() {
            entity.hash_into(hasher);
        }

        hasher.update_vec2(self.world_size);
        hasher.update_bool(self.world_bounds_enabled);

        for reason in &self.pause_reasons {
            hasher.update_str(reason);
        }

        hasher.update_vec2(self.camera.position());
        hasher.update_f64(self.move_input);
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.now_ms, |hasher| self.hash_into(hasher))
    }
}

// =============================================================================
// TESTS
// =============================================================================
