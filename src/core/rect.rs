//! Axis-Aligned Rectangles
//!
//! World-space AABBs for colliders, probes, force zones and world bounds.

use serde::{Serialize, Deserialize};

use super::vec2::{Vec2, finite_or};

/// Axis-aligned rectangle: top-left corner plus non-negative size.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    #[serde(default)]
    pub x: f64,
    /// Top edge
    #[serde(default)]
    pub y: f64,
    /// Width (never negative)
    #[serde(default)]
    pub width: f64,
    /// Height (never negative)
    #[serde(default)]
    pub height: f64,
}

impl Rect {
    /// Create a rectangle, clamping the size to finite and non-negative.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: finite_or(x, 0.0),
            y: finite_or(y, 0.0),
            width: finite_or(width, 0.0).max(0.0),
            height: finite_or(height, 0.0).max(0.0),
        }
    }

    /// Create from a corner and a size vector.
    pub fn from_corner(corner: Vec2, size: Vec2) -> Self {
        Self::new(corner.x, corner.y, size.x, size.y)
    }

    /// Re-apply the construction clamps (for deserialized values).
    pub fn sanitized(self) -> Self {
        Self::new(self.x, self.y, self.width, self.height)
    }

    /// Right edge.
    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Strict intersection test. Rectangles that only share an edge do not
    /// intersect, so a body resting on a surface can slide along it.
    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Inclusive point containment.
    #[inline]
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }

    /// Translate by a delta.
    #[inline]
    pub fn translated(&self, delta: Vec2) -> Rect {
        Rect {
            x: self.x + delta.x,
            y: self.y + delta.y,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersects_strict() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        let touching = Rect::new(10.0, 0.0, 10.0, 10.0);

        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&touching));
    }

    #[test]
    fn test_rect_contains_inclusive() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains_point(Vec2::new(0.0, 0.0)));
        assert!(r.contains_point(Vec2::new(10.0, 10.0)));
        assert!(!r.contains_point(Vec2::new(10.1, 5.0)));
    }

    #[test]
    fn test_rect_size_clamped() {
        let r = Rect::new(f64::NAN, 2.0, -4.0, f64::INFINITY);
        assert_eq!(r.x, 0.0);
        assert_eq!(r.width, 0.0);
        assert_eq!(r.height, 0.0);
    }
}
