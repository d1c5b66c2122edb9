//! Bridge wire codec.
//!
//! The TCP bridge does not forward the short device keys; samples cross the
//! wire as a JSON object with explicit field names so the wire format stays
//! decoupled from the firmware payload:
//!
//! ```text
//! telemetry {"message_type":1001,"left_speed":10.0,...}
//! ```
//!
//! [`encode`] and [`decode`] are pure and round-trip exactly.

use serde::{Deserialize, Serialize};

use crate::AxonError;
use crate::sample::SensorSample;

/// Long-key telemetry payload carried in bridge `telemetry` frames.
///
/// `message_type` is mandatory on decode; the remaining fields default to
/// `0.0` when a client submits a partial payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub message_type: i64,
    #[serde(default)]
    pub left_speed: f64,
    #[serde(default)]
    pub right_speed: f64,
    #[serde(default)]
    pub roll: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub temperature_c: f64,
    #[serde(default)]
    pub voltage_v: f64,
}

impl From<&SensorSample> for TelemetryFrame {
    fn from(s: &SensorSample) -> Self {
        Self {
            message_type: s.message_type,
            left_speed: s.left_speed,
            right_speed: s.right_speed,
            roll: s.roll,
            pitch: s.pitch,
            yaw: s.yaw,
            temperature_c: s.temperature_c,
            voltage_v: s.voltage_v,
        }
    }
}

impl From<TelemetryFrame> for SensorSample {
    fn from(f: TelemetryFrame) -> Self {
        Self {
            message_type: f.message_type,
            left_speed: f.left_speed,
            right_speed: f.right_speed,
            roll: f.roll,
            pitch: f.pitch,
            yaw: f.yaw,
            temperature_c: f.temperature_c,
            voltage_v: f.voltage_v,
        }
    }
}

/// Encode a sample as the long-key JSON payload.
pub fn encode(sample: &SensorSample) -> String {
    // Serialising a plain struct of numbers cannot fail.
    serde_json::to_string(&TelemetryFrame::from(sample))
        .unwrap_or_else(|_| String::from("{}"))
}

/// Decode a long-key JSON payload back into a sample.
pub fn decode(payload: &str) -> Result<SensorSample, AxonError> {
    let frame: TelemetryFrame = serde_json::from_str(payload)
        .map_err(|e| AxonError::Decode(format!("{payload}: {e}")))?;
    Ok(frame.into())
}
