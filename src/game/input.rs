//! Input Capture and Recording
//!
//! Player input is a horizontal move scalar plus an optional jump request.
//! Recordings store only the ticks where the frame changed, which is enough
//! to re-drive a world tick-by-tick.

use serde::{Serialize, Deserialize};

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Clamp a move scalar to [-1, 1]; NaN becomes 0.
#[inline]
pub fn normalize_move(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

// =============================================================================
// INPUT TYPES
// =============================================================================

/// Input state for a single tick.
///
/// NO tick field - tick is stored separately for compression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Horizontal move scalar, -1 (left) to +1 (right)
    #[serde(default)]
    pub move_x: f64,

    /// Jump requested this tick, with its launch velocity
    #[serde(default)]
    pub jump_velocity: Option<f64>,
}

impl InputFrame {
    /// No movement, no jump.
    pub const IDLE: Self = Self {
        move_x: 0.0,
        jump_velocity: None,
    };

    /// Frame with a move scalar (normalized).
    pub fn with_movement(move_x: f64) -> Self {
        Self {
            move_x: normalize_move(move_x),
            jump_velocity: None,
        }
    }

    /// Add a jump request.
    pub fn with_jump(mut self, velocity: f64) -> Self {
        self.jump_velocity = Some(velocity);
        self
    }

    /// True if nothing is pressed.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.move_x == 0.0 && self.jump_velocity.is_none()
    }
}

/// Delta-compressed input entry.
///
/// Only stored when input CHANGES (not every tick).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputDelta {
    /// Tick when this input state began
    pub tick: u32,
    /// The new input state
    pub frame: InputFrame,
}

// =============================================================================
// RECORDING
// =============================================================================

/// Input recording for the player over a run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InputRecording {
    /// Starting tick (usually 0)
    pub start_tick: u32,

    /// Last recorded tick
    pub end_tick: u32,

    /// Only ticks where input changed
    deltas: Vec<InputDelta>,

    #[serde(skip)]
    last_frame: InputFrame,
}

impl InputRecording {
    /// Empty recording starting at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record input for a tick.
    ///
    /// Only stores if input changed from previous frame.
    pub fn record(&mut self, tick: u32, frame: InputFrame) {
        self.end_tick = self.end_tick.max(tick);

        if self.deltas.is_empty() && frame.is_idle() {
            return;
        }
        if frame != self.last_frame {
            self.deltas.push(InputDelta { tick, frame });
            self.last_frame = frame;
        }
    }

    /// Input in effect at `tick`. Binary search over the deltas.
    pub fn input_at(&self, tick: u32) -> InputFrame {
        let idx = self.deltas.partition_point(|d| d.tick <= tick);
        if idx == 0 {
            InputFrame::IDLE
        } else {
            self.deltas[idx - 1].frame
        }
    }

    /// All stored deltas.
    pub fn deltas(&self) -> &[InputDelta] {
        &self.deltas
    }

    /// Number of stored deltas.
    pub fn delta_count(&self) -> usize {
        self.deltas.len()
    }

    /// Number of ticks covered (inclusive of both ends).
    pub fn tick_count(&self) -> u32 {
        self.end_tick.saturating_sub(self.start_tick) + 1
    }

    /// Iterate every tick from start to end with the frame in effect.
    pub fn replay_iter(&self) -> ReplayIterator<'_> {
        ReplayIterator {
            recording: self,
            current_tick: self.start_tick,
            delta_idx: 0,
            current_frame: InputFrame::IDLE,
            done: false,
        }
    }
}

/// Iterator for replaying inputs tick-by-tick.
pub struct ReplayIterator<'a> {
    recording: &'a InputRecording,
    current_tick: u32,
    delta_idx: usize,
    current_frame: InputFrame,
    done: bool,
}

impl Iterator for ReplayIterator<'_> {
    type Item = (u32, InputFrame);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.current_tick > self.recording.end_tick {
            return None;
        }

        while let Some(delta) = self.recording.deltas.get(self.delta_idx) {
            if delta.tick > self.current_tick {
                break;
            }
            self.current_frame = delta.frame;
            self.delta_idx += 1;
        }

        let result = (self.current_tick, self.current_frame);
        match self.current_tick.checked_add(1) {
            Some(next) => self.current_tick = next,
            None => self.done = true,
        }
        Some(result)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_move() {
        assert_eq!(normalize_move(0.5), 0.5);
        assert_eq!(normalize_move(3.0), 1.0);
        assert_eq!(normalize_move(-7.0), -1.0);
        assert_eq!(normalize_move(f64::NAN), 0.0);
        assert_eq!(normalize_move(f64::NEG_INFINITY), -1.0);
    }

    #[test]
    fn test_delta_compression() {
        let mut recording = InputRecording::new();

        let frame = InputFrame::with_movement(1.0);
        for tick in 0..4 {
            recording.record(tick, frame);
        }
        assert_eq!(recording.delta_count(), 1);

        recording.record(4, InputFrame::with_movement(-1.0));
        assert_eq!(recording.delta_count(), 2);
        assert_eq!(recording.end_tick, 4);
    }

    #[test]
    fn test_leading_idle_not_stored() {
        let mut recording = InputRecording::new();
        recording.record(0, InputFrame::IDLE);
        recording.record(1, InputFrame::IDLE);
        assert_eq!(recording.delta_count(), 0);
        assert_eq!(recording.tick_count(), 2);
    }

    #[test]
    fn test_input_at() {
        let mut recording = InputRecording::new();
        let a = InputFrame::with_movement(0.5);
        let b = InputFrame::with_movement(-0.5).with_jump(400.0);
        let c = InputFrame::with_movement(0.0);

        recording.record(10, a);
        recording.record(20, b);
        recording.record(30, c);

        assert!(recording.input_at(5).is_idle());
        assert_eq!(recording.input_at(10), a);
        assert_eq!(recording.input_at(15), a);
        assert_eq!(recording.input_at(25), b);
        assert_eq!(recording.input_at(30), c);
        assert_eq!(recording.input_at(100), c);
    }

    #[test]
    fn test_replay_iterator() {
        let mut recording = InputRecording::new();
        recording.record(0, InputFrame::with_movement(0.25));
        recording.record(3, InputFrame::with_movement(0.75));
        recording.record(5, InputFrame::with_movement(0.75));

        let frames: Vec<_> = recording.replay_iter().collect();

        assert_eq!(frames.len(), 6);
        assert_eq!(frames[0].1.move_x, 0.25);
        assert_eq!(frames[2].1.move_x, 0.25);
        assert_eq!(frames[3].1.move_x, 0.75);
        assert_eq!(frames[5], (5, InputFrame::with_movement(0.75)));
    }

    #[test]
    fn test_recording_serde() {
        let mut recording = InputRecording::new();
        recording.record(2, InputFrame::with_movement(1.0).with_jump(300.0));
        recording.record(6, InputFrame::IDLE);

        let json = serde_json::to_string(&recording).unwrap();
        let back: InputRecording = serde_json::from_str(&json).unwrap();
        assert_eq!(back.deltas(), recording.deltas());
        assert_eq!(back.end_tick, 6);
    }
}
