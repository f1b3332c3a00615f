//! Collision Detection
//!
//! Axis-aligned box colliders with bitmask layers.
//!
//! A pair of colliders interacts only when each one's layer is in the other's
//! mask. A pair *blocks* movement when it interacts and both colliders use
//! [`CollisionResponse::Block`]; otherwise overlaps are merely observable
//! (pickups, triggers).

use std::ops::{BitAnd, BitOr, Not};
use serde::{Serialize, Deserialize};

use crate::core::rect::Rect;
use crate::core::vec2::Vec2;
use crate::game::state::EntityId;

// =============================================================================
// LAYERS
// =============================================================================

/// Bit-flag collision layer set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollisionLayers(pub u32);

impl CollisionLayers {
    /// No layers
    pub const NONE: Self = Self(0);
    /// Static world geometry and world bounds
    pub const WORLD: Self = Self(1 << 0);
    /// The player
    pub const PLAYER: Self = Self(1 << 1);
    /// Hostile entities
    pub const ENEMY: Self = Self(1 << 2);
    /// Props, crates, platforms
    pub const OBJECT: Self = Self(1 << 3);
    /// Collectibles
    pub const PICKUP: Self = Self(1 << 4);
    /// Trigger volumes
    pub const TRIGGER: Self = Self(1 << 5);
    /// Non-hostile NPCs
    pub const NPC: Self = Self(1 << 6);
    /// Every layer
    pub const ALL: Self = Self(u32::MAX);

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if any bit is shared with `other`.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True if every bit of `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set with `other` added.
    #[inline]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Set with `other` removed.
    #[inline]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for CollisionLayers {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

impl BitAnd for CollisionLayers {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for CollisionLayers {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

// =============================================================================
// COLLIDER
// =============================================================================

/// What happens when two interacting colliders overlap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionResponse {
    /// Movement is stopped at the contact surface.
    #[default]
    Block,
    /// Overlap is reported but never blocks.
    Overlap,
}

/// Axis-aligned box collider attached to an entity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    /// Box size (never negative)
    pub size: Vec2,
    /// Offset from the entity position to the box's top-left corner
    #[serde(default)]
    pub offset: Vec2,
    /// Layers this collider occupies
    #[serde(default = "default_layer")]
    pub layer: CollisionLayers,
    /// Layers this collider interacts with
    #[serde(default = "default_mask")]
    pub collides_with: CollisionLayers,
    /// Block or overlap
    #[serde(default)]
    pub response: CollisionResponse,
}

fn default_layer() -> CollisionLayers {
    CollisionLayers::OBJECT
}

fn default_mask() -> CollisionLayers {
    CollisionLayers::ALL
}

impl Collider {
    /// Blocking collider on the OBJECT layer that interacts with everything.
    pub fn new(size: Vec2) -> Self {
        Self {
            size: size.non_negative(),
            offset: Vec2::ZERO,
            layer: default_layer(),
            collides_with: default_mask(),
            response: CollisionResponse::Block,
        }
    }

    /// Set the offset.
    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset.finite_or_zero();
        self
    }

    /// Set the layer.
    pub fn with_layer(mut self, layer: CollisionLayers) -> Self {
        self.layer = layer;
        self
    }

    /// Set the mask.
    pub fn with_mask(mut self, mask: CollisionLayers) -> Self {
        self.collides_with = mask;
        self
    }

    /// Set the response.
    pub fn with_response(mut self, response: CollisionResponse) -> Self {
        self.response = response;
        self
    }

    /// Re-apply the size/offset clamps (for deserialized values).
    pub fn sanitized(mut self) -> Self {
        self.size = self.size.non_negative();
        self.offset = self.offset.finite_or_zero();
        self
    }

    /// World-space AABB for an entity at `position`.
    #[inline]
    pub fn aabb(&self, position: Vec2) -> Rect {
        Rect::from_corner(position + self.offset, self.size)
    }
}

// =============================================================================
// PREDICATES
// =============================================================================

/// AABB intersection test on resolved world-space rectangles.
#[inline]
pub fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.intersects(b)
}

/// Symmetric layer/mask test.
#[inline]
pub fn can_collide(a: &Collider, b: &Collider) -> bool {
    a.layer.intersects(b.collides_with) && b.layer.intersects(a.collides_with)
}

/// True if an overlapping pair stops movement.
#[inline]
pub fn blocks(a: &Collider, b: &Collider) -> bool {
    can_collide(a, b)
        && a.response == CollisionResponse::Block
        && b.response == CollisionResponse::Block
}

// =============================================================================
// SWEEPS
// =============================================================================

/// Snapshot of a collider in world space, used while resolving motion.
#[derive(Clone, Debug)]
pub struct Obstacle {
    /// Owning entity
    pub id: EntityId,
    /// World-space box
    pub aabb: Rect,
    /// Collider settings
    pub collider: Collider,
}

/// Movement axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    /// Horizontal
    X,
    /// Vertical
    Y,
}

/// Result of moving a box along one axis.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisSweep {
    /// Distance actually travelled (same sign as requested, or zero)
    pub moved: f64,
    /// First blocker hit, if the motion was cut short
    pub hit: Option<EntityId>,
}

/// Slack for float round-off at contact surfaces.
pub const CONTACT_EPSILON: f64 = 1e-6;

fn span_overlap(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> f64 {
    a_max.min(b_max) - a_min.max(b_min)
}

/// Move `aabb` by `delta` along `axis`, stopping at the first blocking
/// obstacle ahead of it.
///
/// Every obstacle between the leading edge and `leading edge + delta` is
/// considered, so a fast body cannot skip a thin wall within one step.
/// Obstacles that already overlap the start box are ignored, letting a body
/// escape from inside. Contact within [`CONTACT_EPSILON`] counts as touching.
pub fn sweep_axis(
    mover_id: &EntityId,
    aabb: Rect,
    collider: &Collider,
    delta: f64,
    axis: Axis,
    obstacles: &[Obstacle],
) -> AxisSweep {
    if delta == 0.0 || !delta.is_finite() {
        return AxisSweep { moved: 0.0, hit: None };
    }

    let forward = delta > 0.0;
    let mut allowed = delta;
    let mut hit = None;

    for obstacle in obstacles {
        if &obstacle.id == mover_id || !blocks(collider, &obstacle.collider) {
            continue;
        }
        let o = &obstacle.aabb;

        // Must overlap on the other axis by more than round-off
        let perpendicular = match axis {
            Axis::X => span_overlap(aabb.y, aabb.bottom(), o.y, o.bottom()),
            Axis::Y => span_overlap(aabb.x, aabb.right(), o.x, o.right()),
        };
        if perpendicular <= CONTACT_EPSILON {
            continue;
        }

        // Signed gap from the leading edge to the obstacle's facing edge
        let gap = match (axis, forward) {
            (Axis::X, true) => o.x - aabb.right(),
            (Axis::X, false) => o.right() - aabb.x,
            (Axis::Y, true) => o.y - aabb.bottom(),
            (Axis::Y, false) => o.bottom() - aabb.y,
        };

        if forward {
            if gap < -CONTACT_EPSILON {
                continue;
            }
            let contact = gap.max(0.0);
            if contact < allowed {
                allowed = contact;
                hit = Some(obstacle.id.clone());
            }
        } else {
            if gap > CONTACT_EPSILON {
                continue;
            }
            let contact = gap.min(0.0);
            if contact > allowed {
                allowed = contact;
                hit = Some(obstacle.id.clone());
            }
        }
    }

    AxisSweep { moved: allowed, hit }
}

/// True if a `probe_px` tall strip directly under `aabb` touches a blocker.
pub fn probe_below(
    mover_id: &EntityId,
    aabb: Rect,
    collider: &Collider,
    probe_px: f64,
    obstacles: &[Obstacle],
) -> bool {
    let probe_px = probe_px.max(CONTACT_EPSILON);
    obstacles.iter().any(|obstacle| {
        let o = &obstacle.aabb;
        &obstacle.id != mover_id
            && blocks(collider, &obstacle.collider)
            && span_overlap(aabb.x, aabb.right(), o.x, o.right()) > CONTACT_EPSILON
            && o.y < aabb.bottom() + probe_px
            && o.bottom() > aabb.bottom() - CONTACT_EPSILON
    })
}

/// Ids of every obstacle that can collide with and overlaps `aabb`,
/// regardless of response.
pub fn overlapping_ids(
    mover_id: &EntityId,
    aabb: Rect,
    collider: &Collider,
    obstacles: &[Obstacle],
) -> Vec<EntityId> {
    obstacles
        .iter()
        .filter(|o| &o.id != mover_id && can_collide(collider, &o.collider) && overlaps(&aabb, &o.aabb))
        .map(|o| o.id.clone())
        .collect()
}
