//! NPC Archetype Driver
//!
//! Lightweight per-tick AI for non-player entities.
//!
//! ## Precedence
//!
//! ```text
//! flee   (player closer than flee_distance_px)
//!  > chase  (mode chase; distance in (stop, chase_distance_px])
//!  > patrol (mode patrol | waypoint | roam)
//!  > idle
//! ```
//!
//! A branch whose thresholds are missing is disabled. Gravity-affected
//! bodies only get `vx` driven; top-down bodies get both axes.

use std::f64::consts::TAU;
use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::behavior::BehaviorState;

/// Default flee speed when a profile sets a flee distance but no speed.
pub const DEFAULT_FLEE_SPEED_PX_PER_SEC: f64 = 90.0;

/// Default chase speed.
pub const DEFAULT_CHASE_SPEED_PX_PER_SEC: f64 = 90.0;

/// Default waypoint arrival radius.
pub const DEFAULT_WAYPOINT_TOLERANCE_PX: f64 = 4.0;

/// How hard a roamer is pulled back onto its path, per second of error.
const ROAM_CORRECTION_GAIN: f64 = 8.0;

/// Base behavior of a profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchetypeMode {
    /// Stand still
    #[default]
    Idle,
    /// Oscillate around `anchor_x`
    Patrol,
    /// Walk a waypoint loop
    Waypoint,
    /// Sinusoidal wander around the anchor
    Roam,
    /// Pursue the player inside a distance window
    Chase,
    /// Scripted externally (boss phases); the driver does nothing
    Manual,
}

/// Mutable per-profile bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeRuntime {
    /// +1 or -1
    pub patrol_direction: f64,
    /// Index of the waypoint being approached
    pub waypoint_index: usize,
    /// Elapsed roam time, scaled by the speed multiplier
    #[serde(default)]
    pub roam_phase_s: f64,
}

impl Default for ArchetypeRuntime {
    fn default() -> Self {
        Self {
            patrol_direction: 1.0,
            waypoint_index: 0,
            roam_phase_s: 0.0,
        }
    }
}

/// Configuration driving an NPC's per-tick decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpcArchetypeProfile {
    /// Base behavior
    pub mode: ArchetypeMode,
    /// Patrol/roam centre; filled from the entity position when missing
    pub anchor_x: Option<f64>,
    /// Vertical anchor
    pub anchor_y: Option<f64>,
    /// Half-width of the patrol swing
    pub patrol_distance_px: f64,
    /// Patrol and waypoint speed
    pub patrol_speed_px_per_sec: f64,
    /// Waypoint loop
    pub waypoints: Vec<Vec2>,
    /// Arrival radius for waypoints
    pub waypoint_tolerance_px: f64,
    /// Roam amplitude
    pub roam_radius_px: f64,
    /// Roam cycles per second
    pub roam_frequency_hz: f64,
    /// Must be explicit; `None` disables fleeing
    pub flee_distance_px: Option<f64>,
    /// Flee speed
    pub flee_speed_px_per_sec: f64,
    /// Must be explicit; `None` disables chasing
    pub chase_distance_px: Option<f64>,
    /// Chase stops inside this distance
    pub chase_stop_distance_px: f64,
    /// Chase speed
    pub chase_speed_px_per_sec: f64,
    /// Driver bookkeeping
    pub runtime: ArchetypeRuntime,
}

impl Default for NpcArchetypeProfile {
    fn default() -> Self {
        Self {
            mode: ArchetypeMode::Idle,
            anchor_x: None,
            anchor_y: None,
            patrol_distance_px: 0.0,
            patrol_speed_px_per_sec: 0.0,
            waypoints: Vec::new(),
            waypoint_tolerance_px: DEFAULT_WAYPOINT_TOLERANCE_PX,
            roam_radius_px: 0.0,
            roam_frequency_hz: 0.0,
            flee_distance_px: None,
            flee_speed_px_per_sec: DEFAULT_FLEE_SPEED_PX_PER_SEC,
            chase_distance_px: None,
            chase_stop_distance_px: 0.0,
            chase_speed_px_per_sec: DEFAULT_CHASE_SPEED_PX_PER_SEC,
            runtime: ArchetypeRuntime::default(),
        }
    }
}

impl NpcArchetypeProfile {
    /// Anchor oscillation between `anchor_x +/- distance`.
    pub fn patrol(anchor_x: f64, distance_px: f64, speed_px_per_sec: f64) -> Self {
        Self {
            mode: ArchetypeMode::Patrol,
            anchor_x: Some(anchor_x),
            patrol_distance_px: distance_px,
            patrol_speed_px_per_sec: speed_px_per_sec,
            ..Self::default()
        }
    }

    /// Loop over explicit waypoints.
    pub fn waypoints(points: Vec<Vec2>, speed_px_per_sec: f64) -> Self {
        Self {
            mode: ArchetypeMode::Waypoint,
            waypoints: points,
            patrol_speed_px_per_sec: speed_px_per_sec,
            ..Self::default()
        }
    }

    /// Deterministic wander of `radius_px` at `frequency_hz`.
    pub fn roam(radius_px: f64, frequency_hz: f64) -> Self {
        Self {
            mode: ArchetypeMode::Roam,
            roam_radius_px: radius_px,
            roam_frequency_hz: frequency_hz,
            ..Self::default()
        }
    }

    /// Pursue the player inside `(stop_px, distance_px]`.
    pub fn chase(distance_px: f64, stop_px: f64, speed_px_per_sec: f64) -> Self {
        Self {
            mode: ArchetypeMode::Chase,
            chase_distance_px: Some(distance_px),
            chase_stop_distance_px: stop_px,
            chase_speed_px_per_sec: speed_px_per_sec,
            ..Self::default()
        }
    }

    /// Scripted profile; the driver leaves the entity alone.
    pub fn manual() -> Self {
        Self {
            mode: ArchetypeMode::Manual,
            ..Self::default()
        }
    }

    /// Add a flee trigger.
    pub fn with_flee(mut self, distance_px: f64, speed_px_per_sec: f64) -> Self {
        self.flee_distance_px = Some(distance_px);
        self.flee_speed_px_per_sec = speed_px_per_sec;
        self
    }

    /// Fill missing anchors from `position` and clamp garbage numbers.
    pub fn prepared(mut self, position: Vec2) -> Self {
        self.anchor_x = Some(self.anchor_x.filter(|x| x.is_finite()).unwrap_or(position.x));
        self.anchor_y = Some(self.anchor_y.filter(|y| y.is_finite()).unwrap_or(position.y));
        self.patrol_distance_px = non_negative(self.patrol_distance_px);
        self.patrol_speed_px_per_sec = non_negative(self.patrol_speed_px_per_sec);
        self.waypoint_tolerance_px = non_negative(self.waypoint_tolerance_px);
        self.roam_radius_px = non_negative(self.roam_radius_px);
        self.roam_frequency_hz = non_negative(self.roam_frequency_hz);
        self.flee_distance_px = self.flee_distance_px.filter(|d| d.is_finite() && *d > 0.0);
        self.flee_speed_px_per_sec = non_negative(self.flee_speed_px_per_sec);
        self.chase_distance_px = self.chase_distance_px.filter(|d| d.is_finite() && *d > 0.0);
        self.chase_stop_distance_px = non_negative(self.chase_stop_distance_px);
        self.chase_speed_px_per_sec = non_negative(self.chase_speed_px_per_sec);
        self.waypoints.retain(|p| p.x.is_finite() && p.y.is_finite());
        if self.runtime.patrol_direction != -1.0 {
            self.runtime.patrol_direction = 1.0;
        }
        if self.runtime.waypoint_index >= self.waypoints.len() {
            self.runtime.waypoint_index = 0;
        }
        if !self.runtime.roam_phase_s.is_finite() || self.runtime.roam_phase_s < 0.0 {
            self.runtime.roam_phase_s = 0.0;
        }
        self
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

// =============================================================================
// DRIVER
// =============================================================================

/// Inputs the driver reads besides the profile.
#[derive(Clone, Copy, Debug)]
pub struct ArchetypeContext {
    /// Length of the current step
    pub step_ms: u64,
    /// Player position, if there is a player
    pub player_position: Option<Vec2>,
    /// Status-effect speed multiplier
    pub speed_scale: f64,
}

/// What the driver wants for this tick.
#[derive(Clone, Debug, PartialEq)]
pub struct ArchetypeDecision {
    /// Horizontal velocity
    pub velocity_x: f64,
    /// Vertical velocity; `None` leaves it to gravity
    pub velocity_y: Option<f64>,
    /// Behavior label
    pub state: BehaviorState,
}

/// Evaluate one profile. Returns `None` for manual profiles.
///
/// `top_down` is true when the body ignores gravity, letting the driver
/// steer both axes.
pub fn evaluate(
    profile: &mut NpcArchetypeProfile,
    position: Vec2,
    top_down: bool,
    ctx: &ArchetypeContext,
) -> Option<ArchetypeDecision> {
    if profile.mode == ArchetypeMode::Manual {
        return None;
    }

    let scale = if ctx.speed_scale.is_finite() { ctx.speed_scale.max(0.0) } else { 1.0 };
    let steer = |direction: Vec2, speed: f64, state: BehaviorState| {
        let v = if top_down {
            direction.normalize() * (speed * scale)
        } else {
            Vec2::new(horizontal_sign(direction.x) * speed * scale, 0.0)
        };
        ArchetypeDecision {
            velocity_x: v.x,
            velocity_y: top_down.then_some(v.y),
            state,
        }
    };

    // Flee
    if let (Some(player), Some(flee_distance)) = (ctx.player_position, profile.flee_distance_px) {
        if position.distance(player) < flee_distance {
            let mut away = position - player;
            if away.length_squared() == 0.0 {
                away = Vec2::new(1.0, 0.0);
            }
            return Some(steer(away, profile.flee_speed_px_per_sec, BehaviorState::Flee));
        }
    }

    // Chase
    if profile.mode == ArchetypeMode::Chase {
        let window = match (ctx.player_position, profile.chase_distance_px) {
            (Some(player), Some(max)) => {
                let distance = position.distance(player);
                (distance > profile.chase_stop_distance_px && distance <= max).then_some(player)
            }
            _ => None,
        };
        return Some(match window {
            Some(player) => steer(player - position, profile.chase_speed_px_per_sec, BehaviorState::Chase),
            None => idle(top_down),
        });
    }

    let decision = match profile.mode {
        ArchetypeMode::Patrol => patrol_anchor(profile, position, top_down, scale),
        ArchetypeMode::Waypoint => patrol_waypoints(profile, position, scale).map(|d| steer(d, profile.patrol_speed_px_per_sec, BehaviorState::Patrol)),
        ArchetypeMode::Roam => roam(profile, position, top_down, scale, ctx.step_ms),
        _ => None,
    };

    Some(decision.unwrap_or_else(|| idle(top_down)))
}

fn idle(top_down: bool) -> ArchetypeDecision {
    ArchetypeDecision {
        velocity_x: 0.0,
        velocity_y: top_down.then_some(0.0),
        state: BehaviorState::Idle,
    }
}

fn horizontal_sign(x: f64) -> f64 {
    if x < 0.0 {
        -1.0
    } else if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

fn patrol_anchor(
    profile: &mut NpcArchetypeProfile,
    position: Vec2,
    top_down: bool,
    scale: f64,
) -> Option<ArchetypeDecision> {
    let distance = profile.patrol_distance_px;
    let speed = profile.patrol_speed_px_per_sec;
    if distance <= 0.0 || speed <= 0.0 {
        return None;
    }
    let anchor = profile.anchor_x.unwrap_or(position.x);

    if position.x >= anchor + distance {
        profile.runtime.patrol_direction = -1.0;
    } else if position.x <= anchor - distance {
        profile.runtime.patrol_direction = 1.0;
    }

    Some(ArchetypeDecision {
        velocity_x: profile.runtime.patrol_direction * speed * scale,
        velocity_y: top_down.then_some(0.0),
        state: BehaviorState::Patrol,
    })
}

/// Direction toward the current waypoint, advancing past reached ones.
fn patrol_waypoints(profile: &mut NpcArchetypeProfile, position: Vec2, scale: f64) -> Option<Vec2> {
    if profile.waypoints.is_empty() || profile.patrol_speed_px_per_sec <= 0.0 || scale == 0.0 {
        return None;
    }
    let count = profile.waypoints.len();
    let tolerance = profile.waypoint_tolerance_px;

    // At most one full lap, so a loop of coincident points cannot spin
    for _ in 0..count {
        let target = profile.waypoints[profile.runtime.waypoint_index % count];
        if position.distance(target) > tolerance {
            return Some(target - position);
        }
        profile.runtime.waypoint_index = (profile.runtime.waypoint_index + 1) % count;
    }
    None
}

fn roam(
    profile: &mut NpcArchetypeProfile,
    position: Vec2,
    top_down: bool,
    scale: f64,
    step_ms: u64,
) -> Option<ArchetypeDecision> {
    let radius = profile.roam_radius_px;
    let frequency = profile.roam_frequency_hz;
    if radius <= 0.0 || frequency <= 0.0 {
        return None;
    }

    // Path: anchor + (R sin(wt), R/2 sin(2wt)), a figure-eight
    let omega = TAU * frequency;
    let phase = omega * profile.runtime.roam_phase_s;
    let anchor = Vec2::new(
        profile.anchor_x.unwrap_or(position.x),
        profile.anchor_y.unwrap_or(position.y),
    );
    let target = anchor + Vec2::new(radius * phase.sin(), 0.5 * radius * (2.0 * phase).sin());
    let along = Vec2::new(radius * omega * phase.cos(), radius * omega * (2.0 * phase).cos());

    // Pull back onto the path after being blocked or pushed
    let mut error = target - position;
    if !top_down {
        error.y = 0.0;
    }
    let mut correction = error * ROAM_CORRECTION_GAIN;
    let max_correction = radius * omega;
    if correction.length() > max_correction {
        correction = correction.normalize() * max_correction;
    }
    let v = (along + correction) * scale;

    profile.runtime.roam_phase_s += step_ms as f64 / 1000.0 * scale;

    Some(ArchetypeDecision {
        velocity_x: v.x,
        velocity_y: top_down.then_some(v.y),
        state: BehaviorState::Patrol,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(step_ms: u64, player: Option<Vec2>) -> ArchetypeContext {
        ArchetypeContext {
            step_ms,
            player_position: player,
            speed_scale: 1.0,
        }
    }

    #[test]
    fn test_patrol_starts_right_and_turns() {
        let mut profile = NpcArchetypeProfile::patrol(180.0, 24.0, 120.0).prepared(Vec2::new(180.0, 0.0));
        let far = Some(Vec2::new(2000.0, 0.0));

        let d = evaluate(&mut profile, Vec2::new(180.0, 0.0), false, &ctx(16, far)).unwrap();
        assert_eq!(d.velocity_x, 120.0);
        assert_eq!(d.state, BehaviorState::Patrol);
        assert_eq!(d.velocity_y, None);

        let d = evaluate(&mut profile, Vec2::new(204.0, 0.0), false, &ctx(32, far)).unwrap();
        assert_eq!(d.velocity_x, -120.0);

        let d = evaluate(&mut profile, Vec2::new(190.0, 0.0), false, &ctx(48, far)).unwrap();
        assert_eq!(d.velocity_x, -120.0);

        let d = evaluate(&mut profile, Vec2::new(156.0, 0.0), false, &ctx(64, far)).unwrap();
        assert_eq!(d.velocity_x, 120.0);
    }

    #[test]
    fn test_flee_beats_patrol() {
        let mut profile = NpcArchetypeProfile::patrol(180.0, 24.0, 120.0)
            .with_flee(64.0, 150.0)
            .prepared(Vec2::new(180.0, 0.0));

        let d = evaluate(&mut profile, Vec2::new(180.0, 0.0), false, &ctx(16, Some(Vec2::new(220.0, 0.0)))).unwrap();
        assert_eq!(d.state, BehaviorState::Flee);
        assert_eq!(d.velocity_x, -150.0);
    }

    #[test]
    fn test_flee_requires_explicit_distance() {
        let mut profile = NpcArchetypeProfile::patrol(0.0, 10.0, 50.0).prepared(Vec2::ZERO);
        let d = evaluate(&mut profile, Vec2::ZERO, false, &ctx(0, Some(Vec2::new(1.0, 0.0)))).unwrap();
        assert_eq!(d.state, BehaviorState::Patrol);
    }

    #[test]
    fn test_chase_window() {
        let mut profile = NpcArchetypeProfile::chase(100.0, 10.0, 80.0).prepared(Vec2::ZERO);

        // Inside window: toward player
        let d = evaluate(&mut profile, Vec2::ZERO, true, &ctx(0, Some(Vec2::new(0.0, 50.0)))).unwrap();
        assert_eq!(d.state, BehaviorState::Chase);
        assert_eq!(d.velocity_y, Some(80.0));

        // Inclusive outer edge
        let d = evaluate(&mut profile, Vec2::ZERO, false, &ctx(0, Some(Vec2::new(-100.0, 0.0)))).unwrap();
        assert_eq!(d.velocity_x, -80.0);

        // Too close: idle
        let d = evaluate(&mut profile, Vec2::ZERO, true, &ctx(0, Some(Vec2::new(10.0, 0.0)))).unwrap();
        assert_eq!(d.state, BehaviorState::Idle);
        assert_eq!(d.velocity_x, 0.0);

        // Too far: idle
        let d = evaluate(&mut profile, Vec2::ZERO, true, &ctx(0, Some(Vec2::new(101.0, 0.0)))).unwrap();
        assert_eq!(d.state, BehaviorState::Idle);
    }

    #[test]
    fn test_waypoints_advance() {
        let points = vec![Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0)];
        let mut profile = NpcArchetypeProfile::waypoints(points, 50.0).prepared(Vec2::ZERO);

        let d = evaluate(&mut profile, Vec2::new(1.0, 0.0), true, &ctx(0, None)).unwrap();
        assert_eq!(profile.runtime.waypoint_index, 1);
        assert_eq!(d.velocity_x, 50.0);
        assert_eq!(d.state, BehaviorState::Patrol);

        evaluate(&mut profile, Vec2::new(98.0, 0.0), true, &ctx(0, None)).unwrap();
        assert_eq!(profile.runtime.waypoint_index, 0);
    }

    #[test]
    fn test_roam_is_deterministic() {
        let mut a = NpcArchetypeProfile::roam(20.0, 0.5).prepared(Vec2::ZERO);
        let mut b = a.clone();
        for _ in 0..120 {
            let da = evaluate(&mut a, Vec2::ZERO, true, &ctx(16, None));
            let db = evaluate(&mut b, Vec2::ZERO, true, &ctx(16, None));
            assert_eq!(da, db);
        }
        assert_eq!(a.runtime.roam_phase_s, b.runtime.roam_phase_s);
    }

    #[test]
    fn test_roam_starts_on_anchor_and_steers_back() {
        let mut profile = NpcArchetypeProfile::roam(40.0, 1.0).prepared(Vec2::new(500.0, 100.0));

        // On the path at phase zero: pure figure-eight velocity
        let d = evaluate(&mut profile, Vec2::new(500.0, 100.0), true, &ctx(16, None)).unwrap();
        let peak = 40.0 * TAU;
        assert!((d.velocity_x - peak).abs() < 1e-9);
        assert!((d.velocity_y.unwrap() - peak).abs() < 1e-9);
        assert_eq!(d.state, BehaviorState::Patrol);

        // Pushed far left of the path: correction points back right
        let mut displaced = NpcArchetypeProfile::roam(40.0, 1.0).prepared(Vec2::new(500.0, 100.0));
        displaced.runtime.roam_phase_s = 0.25;
        let d = evaluate(&mut displaced, Vec2::new(300.0, 100.0), false, &ctx(16, None)).unwrap();
        assert!(d.velocity_x > 0.0);
        assert_eq!(d.velocity_y, None);
    }

    #[test]
    fn test_manual_and_idle() {
        let mut manual = NpcArchetypeProfile::manual();
        assert!(evaluate(&mut manual, Vec2::ZERO, true, &ctx(0, None)).is_none());

        let mut idle_profile = NpcArchetypeProfile::default().prepared(Vec2::ZERO);
        let d = evaluate(&mut idle_profile, Vec2::ZERO, true, &ctx(0, None)).unwrap();
        assert_eq!(d, ArchetypeDecision { velocity_x: 0.0, velocity_y: Some(0.0), state: BehaviorState::Idle });
    }

    #[test]
    fn test_speed_scale_applies() {
        let mut profile = NpcArchetypeProfile::patrol(0.0, 10.0, 100.0).prepared(Vec2::ZERO);
        let c = ArchetypeContext { step_ms: 16, player_position: None, speed_scale: 0.5 };
        let d = evaluate(&mut profile, Vec2::ZERO, false, &c).unwrap();
        assert_eq!(d.velocity_x, 50.0);
    }

    #[test]
    fn test_prepared_fills_anchor() {
        let profile = NpcArchetypeProfile {
            mode: ArchetypeMode::Patrol,
            ..NpcArchetypeProfile::default()
        }
        .prepared(Vec2::new(42.0, 7.0));
        assert_eq!(profile.anchor_x, Some(42.0));
        assert_eq!(profile.anchor_y, Some(7.0));
    }
}
