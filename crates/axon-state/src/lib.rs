//! Motion-state core: drift calibration, mood selection, and the rest/sleep
//! state machine that turns a stream of sensor samples into orientation and
//! mood updates.

pub mod calibrator;
pub mod engine;
pub mod mood;

pub use calibrator::{Calibrator, CalibratorConfig};
pub use engine::{EngineConfig, StateEngine, StateUpdate};
pub use mood::{Mood, MoodPolicy};
