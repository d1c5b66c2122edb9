//! Shared data model for the Axon telemetry core.
//!
//! This crate holds the value types every other Axon crate speaks in:
//! [`SensorSample`] (one telemetry reading plus its motion-classification
//! queries), the [`wire`] codec used on the TCP bridge, the
//! [`CalibrationOffsets`] zero-reference shared between the calibration and
//! classification paths, and the crate-spanning [`AxonError`] type.

use thiserror::Error;

pub mod offsets;
pub mod sample;
pub mod wire;

pub use offsets::{CalibrationOffsets, SharedOffsets};
pub use sample::{MotionThresholds, Orientation, SensorSample, wrap_angle};
pub use wire::TelemetryFrame;

/// Global error type spanning sensor parsing, transport failures, and bridge
/// I/O.
#[derive(Error, Debug)]
pub enum AxonError {
    /// A sensor line could not be parsed into a [`SensorSample`].
    #[error("malformed sensor line: {0}")]
    Parse(String),

    /// A structured telemetry payload could not be decoded.
    #[error("malformed telemetry payload: {0}")]
    Decode(String),

    /// The sensor transport failed; the link is no longer streaming.
    #[error("sensor transport failure: {0}")]
    Transport(String),

    /// The bridge server could not bind or serve.
    #[error("bridge error: {0}")]
    Bridge(String),

    /// An internal event channel was closed or rejected a message.
    #[error("channel error: {0}")]
    Channel(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_failure() {
        let err = AxonError::Parse("bad json".to_string());
        assert!(err.to_string().contains("malformed sensor line"));

        let err = AxonError::Transport("device unplugged".to_string());
        assert!(err.to_string().contains("device unplugged"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: AxonError = io.into();
        assert!(matches!(err, AxonError::Io(_)));
    }
}
