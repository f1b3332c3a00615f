//! Camera
//!
//! Manual or following camera, optionally clamped so the viewport never
//! leaves the world.

use serde::{Serialize, Deserialize};

use crate::core::vec2::{Vec2, finite_or};
use crate::game::state::EntityId;

/// How the camera picks its position each tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraMode {
    /// Static unless panned or set
    #[default]
    Manual,
    /// Tracks the player entity
    FollowPlayer,
    /// Tracks `follow_target_id`
    FollowTarget,
}

/// Visible area size in world pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 320.0,
            height: 180.0,
        }
    }
}

impl Viewport {
    /// Viewport with finite, non-negative dimensions.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: finite_or(width, 0.0).max(0.0),
            height: finite_or(height, 0.0).max(0.0),
        }
    }
}

/// Camera state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    /// Manual or following
    pub mode: CameraMode,
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Visible area
    pub viewport: Viewport,
    /// Keep the view inside the world
    pub clamp_to_world: bool,
    /// Entity tracked in `FollowTarget` mode
    pub follow_target_id: Option<EntityId>,
    /// Added to the followed position; `pan_camera` shifts it in follow modes
    pub follow_offset: Vec2,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            mode: CameraMode::Manual,
            x: 0.0,
            y: 0.0,
            viewport: Viewport::default(),
            clamp_to_world: true,
            follow_target_id: None,
            follow_offset: Vec2::ZERO,
        }
    }
}

impl Camera {
    /// Top-left corner of the view.
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// True in either follow mode.
    pub fn is_following(&self) -> bool {
        self.mode != CameraMode::Manual
    }

    /// Entity the camera should track this tick.
    pub fn target_id<'a>(&'a self, player_id: Option<&'a EntityId>) -> Option<&'a EntityId> {
        match self.mode {
            CameraMode::Manual => None,
            CameraMode::FollowPlayer => player_id,
            CameraMode::FollowTarget => self.follow_target_id.as_ref(),
        }
    }

    /// Move to `position` (non-finite components are ignored), then clamp.
    pub fn set_position(&mut self, position: Vec2, world_size: Vec2) {
        self.x = finite_or(position.x, self.x);
        self.y = finite_or(position.y, self.y);
        self.clamp(world_size);
    }

    /// Shift by `delta`. In follow modes the offset moves instead, so the
    /// mode survives the pan.
    pub fn pan(&mut self, delta: Vec2, world_size: Vec2) {
        let delta = delta.finite_or_zero();
        if self.is_following() {
            self.follow_offset += delta;
        }
        self.x += delta.x;
        self.y += delta.y;
        self.clamp(world_size);
    }

    /// Per-tick update: follow `target` if given, then clamp.
    ///
    /// Returns true if the position moved.
    pub fn update(&mut self, target: Option<Vec2>, world_size: Vec2) -> bool {
        let before = self.position();
        if let Some(target) = target.filter(|_| self.is_following()) {
            let desired = target + self.follow_offset;
            self.x = finite_or(desired.x, self.x);
            self.y = finite_or(desired.y, self.y);
        }
        self.clamp(world_size);
        self.position() != before
    }

    /// Keep the view inside `[0, world - viewport]` when clamping is on.
    pub fn clamp(&mut self, world_size: Vec2) {
        if !self.clamp_to_world {
            return;
        }
        let max_x = (world_size.x - self.viewport.width).max(0.0);
        let max_y = (world_size.y - self.viewport.height).max(0.0);
        self.x = finite_or(self.x, 0.0).clamp(0.0, max_x);
        self.y = finite_or(self.y, 0.0).clamp(0.0, max_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORLD: Vec2 = Vec2::new(1000.0, 500.0);

    #[test]
    fn test_clamp_to_world() {
        let mut camera = Camera::default();
        camera.set_position(Vec2::new(900.0, -20.0), WORLD);
        assert_eq!(camera.position(), Vec2::new(680.0, 0.0));

        camera.clamp_to_world = false;
        camera.set_position(Vec2::new(-50.0, 900.0), WORLD);
        assert_eq!(camera.position(), Vec2::new(-50.0, 900.0));
    }

    #[test]
    fn test_viewport_larger_than_world_pins_to_origin() {
        let mut camera = Camera {
            viewport: Viewport::new(2000.0, 2000.0),
            ..Camera::default()
        };
        camera.set_position(Vec2::new(40.0, 40.0), WORLD);
        assert_eq!(camera.position(), Vec2::ZERO);
    }

    #[test]
    fn test_follow_and_pan_keep_mode() {
        let mut camera = Camera {
            mode: CameraMode::FollowPlayer,
            ..Camera::default()
        };
        assert!(camera.update(Some(Vec2::new(100.0, 50.0)), WORLD));
        assert_eq!(camera.position(), Vec2::new(100.0, 50.0));

        camera.pan(Vec2::new(10.0, 5.0), WORLD);
        assert_eq!(camera.mode, CameraMode::FollowPlayer);
        camera.update(Some(Vec2::new(100.0, 50.0)), WORLD);
        assert_eq!(camera.position(), Vec2::new(110.0, 55.0));
    }

    #[test]
    fn test_manual_ignores_target() {
        let mut camera = Camera::default();
        camera.set_position(Vec2::new(30.0, 30.0), WORLD);
        assert!(!camera.update(Some(Vec2::new(500.0, 300.0)), WORLD));
        assert_eq!(camera.position(), Vec2::new(30.0, 30.0));

        camera.pan(Vec2::new(5.0, f64::NAN), WORLD);
        assert_eq!(camera.position(), Vec2::new(35.0, 30.0));
        assert_eq!(camera.follow_offset, Vec2::ZERO);
    }

    #[test]
    fn test_target_id_by_mode() {
        let player = EntityId::new("hero");
        let mut camera = Camera {
            follow_target_id: Some(EntityId::new("boss")),
            ..Camera::default()
        };
        assert_eq!(camera.target_id(Some(&player)), None);
        camera.mode = CameraMode::FollowPlayer;
        assert_eq!(camera.target_id(Some(&player)), Some(&player));
        camera.mode = CameraMode::FollowTarget;
        assert_eq!(camera.target_id(Some(&player)).map(|id| id.as_str()), Some("boss"));
    }

    #[test]
    fn test_mode_serde_names() {
        assert_eq!(serde_json::to_string(&CameraMode::FollowPlayer).unwrap(), "\"follow-player\"");
        let mode: CameraMode = serde_json::from_str("\"manual\"").unwrap();
        assert_eq!(mode, CameraMode::Manual);
    }
}
