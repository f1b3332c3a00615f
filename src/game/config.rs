//! Simulation Configuration
//!
//! Tunables for the integrator. Every field has a default, so a JSON file
//! only needs the values it changes.

use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::game::behavior::{TimedStateDefaults, TransitionHistory};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the file.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON.
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Integrator tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Downward acceleration, px/s^2
    pub gravity_px_per_sec2: f64,
    /// Optional terminal fall speed, px/s. Unset means falls keep accelerating.
    pub max_fall_speed_px_per_sec: Option<f64>,
    /// Player run speed at full input, px/s
    pub player_max_speed_px_per_sec: f64,
    /// Acceleration toward target speed on the ground
    pub ground_accel_px_per_sec2: f64,
    /// Deceleration with no input on the ground
    pub ground_decel_px_per_sec2: f64,
    /// Acceleration toward target speed in the air
    pub air_accel_px_per_sec2: f64,
    /// Deceleration with no input in the air
    pub air_decel_px_per_sec2: f64,
    /// Grace period after leaving ground
    pub coyote_time_ms: u64,
    /// How long an early jump request is kept
    pub jump_buffer_ms: u64,
    /// Height of the grounded probe strip
    pub ground_probe_px: f64,
    /// Thickness of the synthesized world bounds
    pub world_bound_thickness_px: f64,
    /// Transition history ring size
    pub history_capacity: usize,
    /// Fallback timed-state durations
    pub timed_state_defaults: TimedStateDefaults,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            gravity_px_per_sec2: 1800.0,
            max_fall_speed_px_per_sec: None,
            player_max_speed_px_per_sec: 180.0,
            ground_accel_px_per_sec2: 1800.0,
            ground_decel_px_per_sec2: 2200.0,
            air_accel_px_per_sec2: 900.0,
            air_decel_px_per_sec2: 400.0,
            coyote_time_ms: 100,
            jump_buffer_ms: 120,
            ground_probe_px: 2.0,
            world_bound_thickness_px: 64.0,
            history_capacity: TransitionHistory::DEFAULT_CAPACITY,
            timed_state_defaults: TimedStateDefaults::default(),
        }
    }
}

fn non_negative_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        fallback
    }
}

impl SimConfig {
    /// Parse from JSON text (sanitized).
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Load from a JSON file (sanitized).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Replace non-finite or negative values with defaults.
    pub fn sanitized(self) -> Self {
        let d = SimConfig::default();
        Self {
            gravity_px_per_sec2: non_negative_or(self.gravity_px_per_sec2, d.gravity_px_per_sec2),
            max_fall_speed_px_per_sec: self
                .max_fall_speed_px_per_sec
                .filter(|cap| cap.is_finite() && *cap >= 0.0),
            player_max_speed_px_per_sec: non_negative_or(self.player_max_speed_px_per_sec, d.player_max_speed_px_per_sec),
            ground_accel_px_per_sec2: non_negative_or(self.ground_accel_px_per_sec2, d.ground_accel_px_per_sec2),
            ground_decel_px_per_sec2: non_negative_or(self.ground_decel_px_per_sec2, d.ground_decel_px_per_sec2),
            air_accel_px_per_sec2: non_negative_or(self.air_accel_px_per_sec2, d.air_accel_px_per_sec2),
            air_decel_px_per_sec2: non_negative_or(self.air_decel_px_per_sec2, d.air_decel_px_per_sec2),
            ground_probe_px: non_negative_or(self.ground_probe_px, d.ground_probe_px),
            world_bound_thickness_px: if self.world_bound_thickness_px.is_finite() && self.world_bound_thickness_px >= 1.0 {
                self.world_bound_thickness_px
            } else {
                d.world_bound_thickness_px
            },
            history_capacity: self.history_capacity.max(1),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SimConfig::from_json_str(r#"{"gravity_px_per_sec2": 1000, "coyote_time_ms": 80}"#).unwrap();
        assert_eq!(config.gravity_px_per_sec2, 1000.0);
        assert_eq!(config.coyote_time_ms, 80);
        assert_eq!(config.jump_buffer_ms, SimConfig::default().jump_buffer_ms);
    }

    #[test]
    fn test_negative_values_sanitized() {
        let config = SimConfig {
            gravity_px_per_sec2: -5.0,
            ground_probe_px: f64::NAN,
            history_capacity: 0,
            world_bound_thickness_px: 0.0,
            ..SimConfig::default()
        }
        .sanitized();
        let d = SimConfig::default();
        assert_eq!(config.gravity_px_per_sec2, d.gravity_px_per_sec2);
        assert_eq!(config.ground_probe_px, d.ground_probe_px);
        assert_eq!(config.history_capacity, 1);
        assert_eq!(config.world_bound_thickness_px, d.world_bound_thickness_px);
    }

    #[test]
    fn test_fall_cap_parsed_and_sanitized() {
        let config = SimConfig::from_json_str(r#"{"max_fall_speed_px_per_sec": 750}"#).unwrap();
        assert_eq!(config.max_fall_speed_px_per_sec, Some(750.0));

        let config = SimConfig::from_json_str(r#"{"max_fall_speed_px_per_sec": -1}"#).unwrap();
        assert_eq!(config.max_fall_speed_px_per_sec, None);
    }

    #[test]
    fn test_bad_json_is_error() {
        let err = SimConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SimConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
