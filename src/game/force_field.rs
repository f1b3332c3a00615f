//! Environmental Force Fields
//!
//! Static rectangular zones (wind, currents, conveyor belts) that push
//! entities and scale their drag.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::rect::Rect;
use crate::core::vec2::{Vec2, finite_or};

/// A rectangular force zone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForceZone {
    /// Zone id (setting the same id replaces the zone)
    pub id: String,
    /// Area of effect (inclusive)
    #[serde(default)]
    pub bounds: Rect,
    /// Acceleration applied to entities inside, px/s per second
    #[serde(default)]
    pub force_px_per_sec: Vec2,
    /// Drag multiplier per entity type tag (missing = 1)
    #[serde(default)]
    pub drag_scale_by_type: BTreeMap<String, f64>,
}

impl ForceZone {
    /// Zone with no drag overrides.
    pub fn new(id: impl Into<String>, bounds: Rect, force_px_per_sec: Vec2) -> Self {
        Self {
            id: id.into(),
            bounds,
            force_px_per_sec,
            drag_scale_by_type: BTreeMap::new(),
        }
        .sanitized()
    }

    /// Add a drag multiplier for an entity type tag.
    pub fn with_drag_scale(mut self, type_tag: impl Into<String>, scale: f64) -> Self {
        self.drag_scale_by_type.insert(type_tag.into(), sanitize_drag(scale));
        self
    }

    /// Clamp geometry and vectors to finite values, sizes to non-negative.
    pub fn sanitized(mut self) -> Self {
        self.bounds = self.bounds.sanitized();
        self.force_px_per_sec = self.force_px_per_sec.finite_or_zero();
        for scale in self.drag_scale_by_type.values_mut() {
            *scale = sanitize_drag(*scale);
        }
        self
    }

    /// Drag multiplier for a type tag.
    pub fn drag_scale_for(&self, type_tag: &str) -> f64 {
        self.drag_scale_by_type.get(type_tag).copied().unwrap_or(1.0)
    }
}

fn sanitize_drag(scale: f64) -> f64 {
    finite_or(scale, 1.0).max(0.0)
}

/// Combined effect of every zone covering a point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceSample {
    /// Velocity delta to add this tick
    pub velocity_delta: Vec2,
    /// Product of the zones' drag multipliers
    pub drag_scale: f64,
}

impl ForceSample {
    /// No zones: zero delta, unit drag.
    pub const NEUTRAL: Self = Self {
        velocity_delta: Vec2::ZERO,
        drag_scale: 1.0,
    };
}

/// Set of force zones keyed by id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ForceField {
    zones: BTreeMap<String, ForceZone>,
}

impl ForceField {
    /// Empty field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a zone. Returns the previous zone with that id.
    pub fn set_zone(&mut self, zone: ForceZone) -> Option<ForceZone> {
        let zone = zone.sanitized();
        self.zones.insert(zone.id.clone(), zone)
    }

    /// Remove a zone by id.
    pub fn clear_zone(&mut self, id: &str) -> bool {
        self.zones.remove(id).is_some()
    }

    /// All zones in id order.
    pub fn zones(&self) -> impl Iterator<Item = &ForceZone> {
        self.zones.values()
    }

    /// True if no zones are registered.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Accumulate every zone containing `position` over `delta_ms`.
    pub fn sample(&self, type_tag: &str, position: Vec2, delta_ms: f64) -> ForceSample {
        if !delta_ms.is_finite() || delta_ms <= 0.0 {
            return ForceSample::NEUTRAL;
        }
        let dt = delta_ms / 1000.0;

        self.zones
            .values()
            .filter(|zone| zone.bounds.contains_point(position))
            .fold(ForceSample::NEUTRAL, |acc, zone| ForceSample {
                velocity_delta: acc.velocity_delta + zone.force_px_per_sec * dt,
                drag_scale: acc.drag_scale * zone.drag_scale_for(type_tag),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_zones_sum_and_multiply() {
        let mut field = ForceField::new();
        field.set_zone(
            ForceZone::new("wind", Rect::new(0.0, 0.0, 100.0, 100.0), Vec2::new(100.0, 0.0))
                .with_drag_scale("player", 0.5),
        );
        field.set_zone(
            ForceZone::new("updraft", Rect::new(50.0, 0.0, 100.0, 100.0), Vec2::new(0.0, -200.0))
                .with_drag_scale("player", 0.5),
        );

        let sample = field.sample("player", Vec2::new(60.0, 10.0), 500.0);
        assert_eq!(sample.velocity_delta, Vec2::new(50.0, -100.0));
        assert_eq!(sample.drag_scale, 0.25);

        // Enemy type has no override
        let sample = field.sample("enemy", Vec2::new(60.0, 10.0), 500.0);
        assert_eq!(sample.drag_scale, 1.0);
    }

    #[test]
    fn test_bounds_inclusive() {
        let mut field = ForceField::new();
        field.set_zone(ForceZone::new("z", Rect::new(0.0, 0.0, 10.0, 10.0), Vec2::new(10.0, 0.0)));
        let sample = field.sample("object", Vec2::new(10.0, 10.0), 1000.0);
        assert_eq!(sample.velocity_delta, Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_non_positive_delta_is_neutral() {
        let mut field = ForceField::new();
        field.set_zone(ForceZone::new("z", Rect::new(0.0, 0.0, 10.0, 10.0), Vec2::new(10.0, 0.0)).with_drag_scale("player", 3.0));
        assert_eq!(field.sample("player", Vec2::new(5.0, 5.0), 0.0), ForceSample::NEUTRAL);
        assert_eq!(field.sample("player", Vec2::new(5.0, 5.0), -16.0), ForceSample::NEUTRAL);
    }

    #[test]
    fn test_same_id_replaces() {
        let mut field = ForceField::new();
        field.set_zone(ForceZone::new("z", Rect::new(0.0, 0.0, 10.0, 10.0), Vec2::new(10.0, 0.0)));
        let previous = field.set_zone(ForceZone::new("z", Rect::new(0.0, 0.0, 10.0, 10.0), Vec2::new(-10.0, 0.0)));
        assert!(previous.is_some());
        assert_eq!(field.zones().count(), 1);
        assert_eq!(field.zones().find(|z| z.id == "z").unwrap().force_px_per_sec.x, -10.0);
        assert!(field.clear_zone("z"));
        assert!(field.is_empty());
    }

    #[test]
    fn test_garbage_sanitized() {
        let zone = ForceZone {
            id: "bad".into(),
            bounds: Rect { x: f64::NAN, y: 0.0, width: -5.0, height: 3.0 },
            force_px_per_sec: Vec2::new(f64::INFINITY, 2.0),
            drag_scale_by_type: [("player".to_string(), f64::NAN)].into_iter().collect(),
        }
        .sanitized();

        assert_eq!(zone.bounds.x, 0.0);
        assert_eq!(zone.bounds.width, 0.0);
        assert_eq!(zone.force_px_per_sec, Vec2::new(0.0, 2.0));
        assert_eq!(zone.drag_scale_for("player"), 1.0);
    }
}
