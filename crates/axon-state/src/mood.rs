//! [`MoodPolicy`] – pure decision function mapping a sample to a mood label.
//!
//! Ordering matters: alert conditions are checked first, tilt second, then a
//! hysteresis rule returns to the default mood once alert/tilt conditions
//! clear, and finally the current mood is kept unchanged.

use serde::{Deserialize, Serialize};

use axon_types::{CalibrationOffsets, SensorSample};

/// Mood labels the decision engine can announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Fearful,
    Curious,
    Surprised,
    Sleepy,
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mood::Happy => "happy",
            Mood::Fearful => "fearful",
            Mood::Curious => "curious",
            Mood::Surprised => "surprised",
            Mood::Sleepy => "sleepy",
        };
        write!(f, "{name}")
    }
}

/// Stateless, referentially transparent mood selector.  Thresholds are
/// degrees on the calibrated axes; each rule is independently tunable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodPolicy {
    pub default_mood: Mood,
    pub alert_mood: Mood,
    pub tilt_mood: Mood,
    /// Alert when |calibrated pitch| exceeds this.
    pub pitch_alert: f64,
    /// Alert when |calibrated roll| exceeds this.
    pub roll_alert: f64,
    /// Alert when the roll delta versus the previous sample exceeds this.
    pub roll_alert_delta: f64,
    /// Tilt when |calibrated roll| exceeds this (below the alert level).
    pub roll_tilt: f64,
    /// Tilt when |calibrated yaw| exceeds this.
    pub yaw_tilt: f64,
    /// Tilt when the roll delta exceeds this (below the alert delta).
    pub roll_tilt_delta: f64,
}

impl Default for MoodPolicy {
    fn default() -> Self {
        Self {
            default_mood: Mood::Happy,
            alert_mood: Mood::Fearful,
            tilt_mood: Mood::Curious,
            pitch_alert: 20.0,
            roll_alert: 25.0,
            roll_alert_delta: 18.0,
            roll_tilt: 12.0,
            yaw_tilt: 35.0,
            roll_tilt_delta: 6.0,
        }
    }
}

impl MoodPolicy {
    /// Return the mood that should be shown for `sample`.
    ///
    /// Pure: identical `(sample, current, previous)` inputs always produce
    /// identical output.
    pub fn choose(
        &self,
        sample: &SensorSample,
        offsets: &CalibrationOffsets,
        current: Option<Mood>,
        previous: Option<&SensorSample>,
    ) -> Mood {
        let roll = sample.calibrated_roll(offsets).abs();
        let pitch = sample.calibrated_pitch(offsets).abs();
        let yaw = sample.calibrated_yaw(offsets).abs();
        let roll_delta = previous
            .map(|p| (sample.roll - p.roll).abs())
            .unwrap_or(0.0);

        if pitch > self.pitch_alert || roll > self.roll_alert || roll_delta > self.roll_alert_delta
        {
            return self.alert_mood;
        }
        if roll > self.roll_tilt || yaw > self.yaw_tilt || roll_delta > self.roll_tilt_delta {
            return self.tilt_mood;
        }
        // Hysteresis: don't linger in alert/tilt once conditions clear.
        if current == Some(self.alert_mood) || current == Some(self.tilt_mood) {
            return self.default_mood;
        }
        current.unwrap_or(self.default_mood)
    }
}
