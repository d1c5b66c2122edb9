//! Calibration zero-reference shared between the calibration and
//! classification paths.
//!
//! Exactly one writer (the calibrator, when the robot has been stationary
//! long enough) and many readers (every calibrated-orientation computation).
//! [`SharedOffsets`] hands readers a copied snapshot under a reader-writer
//! lock so a reader can never observe a partially written triple.

use std::sync::{Arc, PoisonError, RwLock};

/// Per-axis correction subtracted from raw orientation so the rest pose
/// reads near zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationOffsets {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl CalibrationOffsets {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// True when every axis differs from `other` by at most `tolerance`.
    pub fn within_tolerance(&self, other: &CalibrationOffsets, tolerance: f64) -> bool {
        (self.roll - other.roll).abs() <= tolerance
            && (self.pitch - other.pitch).abs() <= tolerance
            && (self.yaw - other.yaw).abs() <= tolerance
    }
}

/// Cheaply cloneable handle to the process-wide calibration offsets.
///
/// All clones share the same underlying triple.
#[derive(Debug, Clone, Default)]
pub struct SharedOffsets {
    inner: Arc<RwLock<CalibrationOffsets>>,
}

impl SharedOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current offsets.
    pub fn get(&self) -> CalibrationOffsets {
        *self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the current offsets atomically with respect to readers.
    pub fn set(&self, offsets: CalibrationOffsets) {
        *self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner) = offsets;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn snapshot_reflects_latest_write() {
        let shared = SharedOffsets::new();
        assert_eq!(shared.get(), CalibrationOffsets::default());

        shared.set(CalibrationOffsets::new(1.0, 2.0, 3.0));
        assert_eq!(shared.get(), CalibrationOffsets::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn clones_share_the_same_triple() {
        let a = SharedOffsets::new();
        let b = a.clone();
        a.set(CalibrationOffsets::new(0.5, 0.0, -0.5));
        assert_eq!(b.get(), CalibrationOffsets::new(0.5, 0.0, -0.5));
    }

    #[test]
    fn concurrent_readers_never_see_a_torn_triple() {
        // The writer only ever stores triples whose components are equal, so
        // any mixed read would prove a torn snapshot.
        let shared = SharedOffsets::new();
        let writer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    let v = f64::from(i);
                    shared.set(CalibrationOffsets::new(v, v, v));
                }
            })
        };
        let reader = {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    let o = shared.get();
                    assert_eq!(o.roll, o.pitch);
                    assert_eq!(o.pitch, o.yaw);
                }
            })
        };
        writer.join().expect("writer");
        reader.join().expect("reader");
    }

    #[test]
    fn within_tolerance_checks_every_axis() {
        let a = CalibrationOffsets::new(1.0, 1.0, 1.0);
        let b = CalibrationOffsets::new(1.1, 0.9, 1.05);
        assert!(a.within_tolerance(&b, 0.2));
        assert!(!a.within_tolerance(&CalibrationOffsets::new(1.0, 1.0, 1.5), 0.2));
    }
}
