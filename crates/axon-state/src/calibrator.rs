//! [`Calibrator`] – learns the gyro zero-reference while the robot is
//! stationary.
//!
//! A sliding window of raw orientation readings is kept for
//! `window_seconds`.  Once the window is essentially full and the per-axis
//! spread (max − min) stays within the stability thresholds, the per-axis
//! mean becomes the new [`CalibrationOffsets`] – unless it is within
//! `offset_tolerance` of the offsets already applied, in which case nothing
//! is re-announced.
//!
//! This is a pure sliding-window statistic: no I/O, never errors.  An
//! incomplete or unstable window simply yields no update.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::info;

use axon_types::{CalibrationOffsets, SensorSample, SharedOffsets};

/// Fraction of the window that must be spanned before offsets are derived.
const WINDOW_FILL_RATIO: f64 = 0.95;

/// Tunables for the drift-calibration window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibratorConfig {
    /// Sliding-window duration in seconds.
    pub window_seconds: f64,
    /// Maximum roll spread (max − min) across the window, degrees.
    pub roll_stability: f64,
    /// Maximum pitch spread across the window, degrees.
    pub pitch_stability: f64,
    /// Maximum yaw spread across the window, degrees.
    pub yaw_stability: f64,
    /// Minimum per-axis change before new offsets replace the applied ones.
    pub offset_tolerance: f64,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            window_seconds: 3.0,
            roll_stability: 1.0,
            pitch_stability: 1.0,
            yaw_stability: 2.0,
            offset_tolerance: 0.2,
        }
    }
}

/// Stateful drift-estimation engine.  Owns its window exclusively; publishes
/// offset updates through the [`SharedOffsets`] handle it was built with.
pub struct Calibrator {
    config: CalibratorConfig,
    offsets: SharedOffsets,
    /// (timestamp_secs, roll, pitch, yaw), oldest first.
    window: VecDeque<(f64, f64, f64, f64)>,
    applied: Option<CalibrationOffsets>,
}

impl Calibrator {
    pub fn new(config: CalibratorConfig, offsets: SharedOffsets) -> Self {
        Self {
            config,
            offsets,
            window: VecDeque::new(),
            applied: None,
        }
    }

    /// Record `sample` at monotonic time `now` (seconds) and apply new
    /// offsets when the robot has rested for the whole window.
    ///
    /// Returns `true` iff new offsets were just applied.
    pub fn observe(&mut self, sample: &SensorSample, now: f64) -> bool {
        self.window
            .push_back((now, sample.roll, sample.pitch, sample.yaw));
        self.prune(now);

        if !self.has_full_window(now) || !self.is_stable() {
            return false;
        }

        let candidate = self.window_mean();
        if let Some(current) = self.applied
            && candidate.within_tolerance(&current, self.config.offset_tolerance)
        {
            return false;
        }

        info!(
            roll = candidate.roll,
            pitch = candidate.pitch,
            yaw = candidate.yaw,
            "calibration offsets applied"
        );
        self.applied = Some(candidate);
        self.offsets.set(candidate);
        true
    }

    /// Clear the window so a fresh baseline can be captured; with
    /// `forget_offsets` the applied offsets are discarded too, forcing any
    /// future update to be re-derived from scratch.
    pub fn reset(&mut self, forget_offsets: bool) {
        self.window.clear();
        if forget_offsets {
            self.applied = None;
        }
    }

    /// Offsets this calibrator has applied, if any.
    pub fn current_offsets(&self) -> Option<CalibrationOffsets> {
        self.applied
    }

    /// Diagnostic: seconds remaining before the window is full.  Equals the
    /// window duration when empty; clamped to zero once the window spans it.
    pub fn seconds_to_window_completion(&self, now: f64) -> f64 {
        match self.window.front() {
            None => self.config.window_seconds,
            Some(&(oldest, ..)) => {
                (self.config.window_seconds - (now - oldest).max(0.0)).max(0.0)
            }
        }
    }

    fn prune(&mut self, now: f64) {
        while let Some(&(ts, ..)) = self.window.front() {
            if now - ts > self.config.window_seconds {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn has_full_window(&self, now: f64) -> bool {
        match self.window.front() {
            None => false,
            Some(&(oldest, ..)) => {
                now - oldest >= self.config.window_seconds * WINDOW_FILL_RATIO
            }
        }
    }

    fn is_stable(&self) -> bool {
        let spread = |pick: fn(&(f64, f64, f64, f64)) -> f64| {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for entry in &self.window {
                let v = pick(entry);
                min = min.min(v);
                max = max.max(v);
            }
            max - min
        };
        spread(|e| e.1) <= self.config.roll_stability
            && spread(|e| e.2) <= self.config.pitch_stability
            && spread(|e| e.3) <= self.config.yaw_stability
    }

    fn window_mean(&self) -> CalibrationOffsets {
        let n = self.window.len() as f64;
        let (mut roll, mut pitch, mut yaw) = (0.0, 0.0, 0.0);
        for &(_, r, p, y) in &self.window {
            roll += r;
            pitch += p;
            yaw += y;
        }
        CalibrationOffsets::new(roll / n, pitch / n, yaw / n)
    }
}
