//! [`SensorSample`] – one telemetry reading from the onboard controller.
//!
//! The micro-controller streams newline-delimited JSON with short field keys:
//!
//! ```text
//! {"T":1001,"L":0,"R":0,"r":15.58,"p":-19.38,"y":126.92,"temp":47.7,"v":12.20}
//! ```
//!
//! Some firmwares prepend `"Received: "` to the line; [`SensorSample::parse`]
//! strips that automatically.  A sample is immutable once constructed and is
//! read many times during one processing cycle (plus one more cycle when the
//! state engine retains it as the previous sample).

use serde::Deserialize;

use crate::AxonError;
use crate::offsets::CalibrationOffsets;

/// Optional textual prefix some firmwares put before the JSON payload.
const LINE_PREFIX: &str = "Received:";

/// Wrap an angle in degrees into `[-180, 180]`.
///
/// The boundary case of exactly `-180` produced from a positive input angle
/// is normalised to `+180` so that `wrap_angle(180.0) == 180.0`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && angle > 0.0 {
        180.0
    } else {
        wrapped
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Device payload
// ─────────────────────────────────────────────────────────────────────────────

/// Short-key JSON payload as streamed by the controller firmware.
///
/// The frame-type tag `T` is mandatory; every other field defaults to `0.0`
/// when absent so partial firmware frames still parse.
#[derive(Deserialize)]
struct DeviceFrame {
    #[serde(rename = "T")]
    message_type: i64,
    #[serde(rename = "L", default)]
    left_speed: f64,
    #[serde(rename = "R", default)]
    right_speed: f64,
    #[serde(rename = "r", default)]
    roll: f64,
    #[serde(rename = "p", default)]
    pitch: f64,
    #[serde(rename = "y", default)]
    yaw: f64,
    #[serde(rename = "temp", default)]
    temperature_c: f64,
    #[serde(rename = "v", default)]
    voltage_v: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// SensorSample
// ─────────────────────────────────────────────────────────────────────────────

/// One telemetry reading: frame-type tag, motor speeds, raw orientation in
/// degrees, temperature and battery voltage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub message_type: i64,
    pub left_speed: f64,
    pub right_speed: f64,
    /// Raw roll in degrees, uncorrected for drift.
    pub roll: f64,
    /// Raw pitch in degrees, uncorrected for drift.
    pub pitch: f64,
    /// Raw yaw in degrees, uncorrected for drift.
    pub yaw: f64,
    pub temperature_c: f64,
    pub voltage_v: f64,
}

impl SensorSample {
    /// Parse one sensor line, tolerating the optional `Received:` prefix.
    ///
    /// A missing or non-integer frame-type tag is an error; every other
    /// missing numeric field defaults to `0.0`.
    pub fn parse(line: &str) -> Result<Self, AxonError> {
        let payload = line.trim();
        let payload = payload
            .strip_prefix(LINE_PREFIX)
            .map(str::trim)
            .unwrap_or(payload);

        let frame: DeviceFrame = serde_json::from_str(payload)
            .map_err(|e| AxonError::Parse(format!("{payload}: {e}")))?;

        Ok(Self {
            message_type: frame.message_type,
            left_speed: frame.left_speed,
            right_speed: frame.right_speed,
            roll: frame.roll,
            pitch: frame.pitch,
            yaw: frame.yaw,
            temperature_c: frame.temperature_c,
            voltage_v: frame.voltage_v,
        })
    }

    // ── Calibrated orientation ──────────────────────────────────────────────

    /// Roll corrected by the current zero-reference.
    pub fn calibrated_roll(&self, offsets: &CalibrationOffsets) -> f64 {
        self.roll - offsets.roll
    }

    /// Pitch corrected by the current zero-reference.
    pub fn calibrated_pitch(&self, offsets: &CalibrationOffsets) -> f64 {
        self.pitch - offsets.pitch
    }

    /// Yaw corrected by the current zero-reference, wrapped into
    /// `[-180, 180]`.
    pub fn calibrated_yaw(&self, offsets: &CalibrationOffsets) -> f64 {
        wrap_angle(self.yaw - offsets.yaw)
    }

    /// Orientation for display: calibrated, deadbanded, with roll
    /// sign-inverted to match the consumer's handedness.  The stored sample
    /// is untouched.
    pub fn display_orientation(
        &self,
        offsets: &CalibrationOffsets,
        thresholds: &MotionThresholds,
    ) -> Orientation {
        Orientation {
            roll: -deadband(self.calibrated_roll(offsets), thresholds.deadband_roll),
            pitch: deadband(self.calibrated_pitch(offsets), thresholds.deadband_pitch),
            yaw: deadband(self.calibrated_yaw(offsets), thresholds.deadband_yaw),
        }
    }

    // ── Motion classification ───────────────────────────────────────────────

    /// True when the calibrated orientation sits inside the rest box and, if
    /// a previous sample exists, the per-axis deltas are below the secondary
    /// rest thresholds.
    pub fn is_resting(
        &self,
        previous: Option<&SensorSample>,
        offsets: &CalibrationOffsets,
        t: &MotionThresholds,
    ) -> bool {
        let within_box = self.calibrated_roll(offsets).abs() <= t.rest_roll
            && self.calibrated_pitch(offsets).abs() <= t.rest_pitch
            && self.calibrated_yaw(offsets).abs() <= t.rest_yaw;
        if !within_box {
            return false;
        }
        match previous {
            None => true,
            Some(prev) => {
                let (dr, dp, dy) = self.orientation_deltas(prev);
                dr <= t.rest_delta_roll && dp <= t.rest_delta_pitch && dy <= t.rest_delta_yaw
            }
        }
    }

    /// Stricter than resting: requires a previous sample, bounds the
    /// orientation deltas, and additionally bounds motor-speed magnitudes on
    /// both samples.
    pub fn is_steady(&self, previous: Option<&SensorSample>, t: &MotionThresholds) -> bool {
        let Some(prev) = previous else {
            return false;
        };
        let (dr, dp, dy) = self.orientation_deltas(prev);
        dr < t.steady_delta_roll
            && dp < t.steady_delta_pitch
            && dy < t.steady_delta_yaw
            && self.left_speed.abs() < t.steady_speed
            && self.right_speed.abs() < t.steady_speed
            && prev.left_speed.abs() < t.steady_speed
            && prev.right_speed.abs() < t.steady_speed
    }

    /// True when any orientation or motor-speed delta exceeds the major
    /// thresholds.  With no previous sample the motion is unknown, which
    /// counts as movement.
    pub fn has_major_movement(
        &self,
        previous: Option<&SensorSample>,
        t: &MotionThresholds,
    ) -> bool {
        let Some(prev) = previous else {
            return true;
        };
        let (dr, dp, dy) = self.orientation_deltas(prev);
        dr > t.major_delta_roll
            || dp > t.major_delta_pitch
            || dy > t.major_delta_yaw
            || (self.left_speed - prev.left_speed).abs() > t.major_delta_speed
            || (self.right_speed - prev.right_speed).abs() > t.major_delta_speed
    }

    /// Absolute per-axis deltas versus `prev`.  Calibration offsets cancel,
    /// so deltas are taken on the raw values; the yaw delta is wrapped so a
    /// 179° → −179° transition reads as 2°, not 358°.
    fn orientation_deltas(&self, prev: &SensorSample) -> (f64, f64, f64) {
        (
            (self.roll - prev.roll).abs(),
            (self.pitch - prev.pitch).abs(),
            wrap_angle(self.yaw - prev.yaw).abs(),
        )
    }
}

fn deadband(value: f64, band: f64) -> f64 {
    if value.abs() < band { 0.0 } else { value }
}

/// Calibrated, deadbanded orientation triple reported to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Thresholds
// ─────────────────────────────────────────────────────────────────────────────

/// Named configuration constants for the three motion classifications and the
/// display deadband.  All angles in degrees, speeds in firmware motor units.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MotionThresholds {
    /// Rest box half-widths on the calibrated axes.
    pub rest_roll: f64,
    pub rest_pitch: f64,
    pub rest_yaw: f64,
    /// Secondary per-axis delta bounds applied when a previous sample exists.
    pub rest_delta_roll: f64,
    pub rest_delta_pitch: f64,
    pub rest_delta_yaw: f64,
    /// Steadiness delta bounds (stricter than rest: also bounds motor speed).
    pub steady_delta_roll: f64,
    pub steady_delta_pitch: f64,
    pub steady_delta_yaw: f64,
    pub steady_speed: f64,
    /// Major-movement delta bounds.
    pub major_delta_roll: f64,
    pub major_delta_pitch: f64,
    pub major_delta_yaw: f64,
    pub major_delta_speed: f64,
    /// Per-axis display deadband; magnitudes below collapse to exactly 0.0.
    pub deadband_roll: f64,
    pub deadband_pitch: f64,
    pub deadband_yaw: f64,
}

impl Default for MotionThresholds {
    fn default() -> Self {
        Self {
            rest_roll: 3.0,
            rest_pitch: 3.0,
            rest_yaw: 5.0,
            rest_delta_roll: 0.5,
            rest_delta_pitch: 0.5,
            rest_delta_yaw: 1.0,
            steady_delta_roll: 0.8,
            steady_delta_pitch: 0.8,
            steady_delta_yaw: 1.5,
            steady_speed: 0.5,
            major_delta_roll: 8.0,
            major_delta_pitch: 8.0,
            major_delta_yaw: 12.0,
            major_delta_speed: 20.0,
            deadband_roll: 1.0,
            deadband_pitch: 1.0,
            deadband_yaw: 1.5,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(roll: f64, pitch: f64, yaw: f64) -> SensorSample {
        SensorSample {
            message_type: 1001,
            left_speed: 0.0,
            right_speed: 0.0,
            roll,
            pitch,
            yaw,
            temperature_c: 25.0,
            voltage_v: 12.0,
        }
    }

    // ── wrap_angle ──────────────────────────────────────────────────────────

    #[test]
    fn wrap_angle_stays_in_range() {
        for deg in (-1080..=1080).map(f64::from) {
            let w = wrap_angle(deg);
            assert!((-180.0..=180.0).contains(&w), "wrap({deg}) = {w}");
        }
    }

    #[test]
    fn wrap_angle_is_idempotent() {
        for deg in [-720.0, -360.5, -180.0, -0.1, 0.0, 179.9, 180.0, 540.0] {
            assert_eq!(wrap_angle(wrap_angle(deg)), wrap_angle(deg));
        }
    }

    #[test]
    fn wrap_angle_positive_boundary_maps_to_plus_180() {
        assert_eq!(wrap_angle(180.0), 180.0);
        assert_eq!(wrap_angle(540.0), 180.0);
        assert_eq!(wrap_angle(-180.0), -180.0);
    }

    #[test]
    fn wrap_angle_folds_over() {
        assert!((wrap_angle(190.0) - (-170.0)).abs() < 1e-9);
        assert!((wrap_angle(-190.0) - 170.0).abs() < 1e-9);
        assert!((wrap_angle(360.0)).abs() < 1e-9);
    }

    // ── parse ───────────────────────────────────────────────────────────────

    #[test]
    fn parse_full_line() {
        let line = r#"{"T":1001,"L":10,"R":10,"r":1.0,"p":1.0,"y":1.0,"temp":25.0,"v":12.0}"#;
        let s = SensorSample::parse(line).expect("parse");
        assert_eq!(s.message_type, 1001);
        assert_eq!(s.left_speed, 10.0);
        assert_eq!(s.right_speed, 10.0);
        assert_eq!(s.roll, 1.0);
        assert_eq!(s.temperature_c, 25.0);
        assert_eq!(s.voltage_v, 12.0);
    }

    #[test]
    fn parse_tolerates_received_prefix() {
        let line = r#"Received: {"T":1002,"r":2.5}"#;
        let s = SensorSample::parse(line).expect("parse");
        assert_eq!(s.message_type, 1002);
        assert_eq!(s.roll, 2.5);
    }

    #[test]
    fn parse_defaults_missing_fields_to_zero() {
        let s = SensorSample::parse(r#"{"T":1001}"#).expect("parse");
        assert_eq!(s.left_speed, 0.0);
        assert_eq!(s.yaw, 0.0);
        assert_eq!(s.voltage_v, 0.0);
    }

    #[test]
    fn parse_requires_frame_type_tag() {
        let err = SensorSample::parse(r#"{"L":10,"r":1.0}"#).unwrap_err();
        assert!(matches!(err, AxonError::Parse(_)));
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(SensorSample::parse("garbage line").is_err());
        assert!(SensorSample::parse("").is_err());
    }

    // ── calibrated orientation ──────────────────────────────────────────────

    #[test]
    fn calibrated_axes_subtract_offsets() {
        let s = sample(10.0, -5.0, 170.0);
        let offsets = CalibrationOffsets {
            roll: 2.0,
            pitch: -1.0,
            yaw: -20.0,
        };
        assert_eq!(s.calibrated_roll(&offsets), 8.0);
        assert_eq!(s.calibrated_pitch(&offsets), -4.0);
        // 170 - (-20) = 190, wrapped to -170.
        assert!((s.calibrated_yaw(&offsets) - (-170.0)).abs() < 1e-9);
    }

    #[test]
    fn display_orientation_applies_deadband_and_inverts_roll() {
        let t = MotionThresholds::default();
        let offsets = CalibrationOffsets::default();

        let quiet = sample(0.4, -0.9, 1.2);
        let o = quiet.display_orientation(&offsets, &t);
        assert_eq!(o.roll, 0.0);
        assert_eq!(o.pitch, 0.0);
        assert_eq!(o.yaw, 0.0);

        let tilted = sample(5.0, -4.0, 30.0);
        let o = tilted.display_orientation(&offsets, &t);
        assert_eq!(o.roll, -5.0);
        assert_eq!(o.pitch, -4.0);
        assert_eq!(o.yaw, 30.0);
    }

    // ── classification ──────────────────────────────────────────────────────

    #[test]
    fn resting_with_no_previous_uses_rest_box_only() {
        let t = MotionThresholds::default();
        let offsets = CalibrationOffsets::default();
        assert!(sample(1.0, 1.0, 2.0).is_resting(None, &offsets, &t));
        assert!(!sample(4.0, 1.0, 2.0).is_resting(None, &offsets, &t));
    }

    #[test]
    fn resting_bounds_deltas_against_previous() {
        let t = MotionThresholds::default();
        let offsets = CalibrationOffsets::default();
        let prev = sample(1.0, 1.0, 2.0);
        assert!(sample(1.2, 1.1, 2.3).is_resting(Some(&prev), &offsets, &t));
        // Inside the rest box but moving too fast.
        assert!(!sample(2.0, 1.0, 2.0).is_resting(Some(&prev), &offsets, &t));
    }

    #[test]
    fn steady_requires_previous_sample() {
        let t = MotionThresholds::default();
        assert!(!sample(0.0, 0.0, 0.0).is_steady(None, &t));
    }

    #[test]
    fn steady_bounds_motor_speed_on_both_samples() {
        let t = MotionThresholds::default();
        let prev = sample(1.0, 1.0, 2.0);
        assert!(sample(1.1, 1.0, 2.1).is_steady(Some(&prev), &t));

        let mut driving = sample(1.1, 1.0, 2.1);
        driving.left_speed = 10.0;
        assert!(!driving.is_steady(Some(&prev), &t));

        let mut prev_driving = prev;
        prev_driving.right_speed = 10.0;
        assert!(!sample(1.1, 1.0, 2.1).is_steady(Some(&prev_driving), &t));
    }

    #[test]
    fn unknown_previous_counts_as_major_movement() {
        let t = MotionThresholds::default();
        assert!(sample(0.0, 0.0, 0.0).has_major_movement(None, &t));
    }

    #[test]
    fn major_movement_on_orientation_or_speed_jump() {
        let t = MotionThresholds::default();
        let prev = sample(0.0, 0.0, 0.0);
        assert!(!sample(1.0, 1.0, 1.0).has_major_movement(Some(&prev), &t));
        assert!(sample(9.0, 0.0, 0.0).has_major_movement(Some(&prev), &t));

        let mut accelerating = sample(0.0, 0.0, 0.0);
        accelerating.left_speed = 30.0;
        assert!(accelerating.has_major_movement(Some(&prev), &t));
    }

    #[test]
    fn yaw_delta_wraps_across_the_seam() {
        let t = MotionThresholds::default();
        let prev = sample(0.0, 0.0, 179.0);
        // 179 -> -179 is a 2 degree move, not 358.
        assert!(!sample(0.0, 0.0, -179.0).has_major_movement(Some(&prev), &t));
    }
}
