//! [`StateEngine`] – stateful orchestrator over {Active, Steady-accumulating,
//! Sleeping}.
//!
//! Each incoming sample is classified against the previous one; sustained
//! steadiness puts the robot to sleep after `rest_delay_seconds`, major
//! movement wakes it, and while awake the [`MoodPolicy`] picks the mood.
//! Output per sample: the deadbanded display orientation (always) and a mood
//! label only when it changed.

use tracing::debug;

use axon_types::{MotionThresholds, Orientation, SensorSample, SharedOffsets};

use crate::mood::{Mood, MoodPolicy};

/// Tunables for the rest/sleep state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Sustained steadiness required before entering sleep, seconds.
    pub rest_delay_seconds: f64,
    /// Mood announced while sleeping.
    pub sleep_mood: Mood,
    /// Mood labels the consumer can display.  Empty means unrestricted;
    /// otherwise unsupported labels fall back to the policy default, then to
    /// the first supported label.
    pub supported_moods: Vec<Mood>,
    pub thresholds: MotionThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rest_delay_seconds: 3.0,
            sleep_mood: Mood::Sleepy,
            supported_moods: Vec::new(),
            thresholds: MotionThresholds::default(),
        }
    }
}

/// What one processed sample produced: orientation for display, plus a mood
/// label when it just changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateUpdate {
    pub orientation: Orientation,
    pub mood: Option<Mood>,
}

/// Single-owner state machine; must not be driven from more than one thread.
pub struct StateEngine {
    policy: MoodPolicy,
    config: EngineConfig,
    offsets: SharedOffsets,
    current: Option<Mood>,
    steady_since: Option<f64>,
    sleeping: bool,
    previous: Option<SensorSample>,
}

impl StateEngine {
    pub fn new(policy: MoodPolicy, config: EngineConfig, offsets: SharedOffsets) -> Self {
        Self {
            policy,
            config,
            offsets,
            current: None,
            steady_since: None,
            sleeping: false,
            previous: None,
        }
    }

    pub fn current_mood(&self) -> Option<Mood> {
        self.current
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Override the active mood from outside the engine (e.g. an operator
    /// preset).  The next sample resumes normal selection from this label.
    pub fn force_mood(&mut self, mood: Option<Mood>) {
        self.current = mood;
    }

    /// Process one sample observed at monotonic time `now` (seconds).
    pub fn apply_sample(&mut self, sample: &SensorSample, now: f64) -> StateUpdate {
        let offsets = self.offsets.get();
        let previous = self.previous.as_ref();
        let major = sample.has_major_movement(previous, &self.config.thresholds);
        let steady = sample.is_steady(previous, &self.config.thresholds);
        let orientation = sample.display_orientation(&offsets, &self.config.thresholds);

        let candidate = if self.sleeping {
            if major {
                debug!("major movement, leaving sleep");
                self.sleeping = false;
                self.steady_since = None;
                self.policy.default_mood
            } else {
                self.config.sleep_mood
            }
        } else {
            if major {
                self.steady_since = None;
            }
            let mut entered_sleep = false;
            if steady {
                match self.steady_since {
                    None => self.steady_since = Some(now),
                    Some(since) if now - since >= self.config.rest_delay_seconds => {
                        debug!(steady_for = now - since, "rest delay elapsed, sleeping");
                        self.sleeping = true;
                        entered_sleep = true;
                    }
                    Some(_) => {}
                }
            }
            if entered_sleep {
                self.config.sleep_mood
            } else {
                let chosen = self.policy.choose(sample, &offsets, self.current, previous);
                // A transient non-default mood re-announced unchanged means
                // the inputs stopped changing; reset to the default instead
                // of announcing it forever.
                if Some(chosen) == self.current
                    && chosen != self.policy.default_mood
                    && chosen != self.policy.alert_mood
                    && chosen != self.policy.tilt_mood
                {
                    self.policy.default_mood
                } else {
                    chosen
                }
            }
        };

        self.previous = Some(*sample);

        let mood = match self.resolve_supported(candidate) {
            Some(resolved) if Some(resolved) != self.current => {
                self.current = Some(resolved);
                Some(resolved)
            }
            _ => None,
        };

        StateUpdate { orientation, mood }
    }

    fn resolve_supported(&self, candidate: Mood) -> Option<Mood> {
        let supported = &self.config.supported_moods;
        if supported.is_empty() || supported.contains(&candidate) {
            Some(candidate)
        } else if supported.contains(&self.policy.default_mood) {
            Some(self.policy.default_mood)
        } else {
            supported.first().copied()
        }
    }
}

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

    fn engine() -> StateEngine {
        StateEngine::new(
            MoodPolicy::default(),
            EngineConfig::default(),
            SharedOffsets::new(),
        )
    }

    fn engine_with(config: EngineConfig) -> StateEngine {
        StateEngine::new(MoodPolicy::default(), config, SharedOffsets::new())
    }

    /// Drive the engine with a level, motionless sample every 100 ms,
    /// collecting every emitted mood.
    fn run_steady(engine: &mut StateEngine, from: f64, to: f64) -> Vec<Mood> {
        let mut moods = Vec::new();
        let mut t = from;
        while t <= to {
            if let Some(m) = engine.apply_sample(&sample(0.0, 0.0, 0.0), t).mood {
                moods.push(m);
            }
            t += 0.1;
        }
        moods
    }

    #[test]
    fn first_sample_announces_the_default_mood() {
        let mut engine = engine();
        let update = engine.apply_sample(&sample(0.0, 0.0, 0.0), 0.0);
        assert_eq!(update.mood, Some(Mood::Happy));
        assert!(!engine.is_sleeping());
    }

    #[test]
    fn sustained_steadiness_sleeps_exactly_once() {
        let mut engine = engine();
        let moods = run_steady(&mut engine, 0.0, 8.0);
        assert_eq!(
            moods,
            vec![Mood::Happy, Mood::Sleepy],
            "default once, then sleep exactly once"
        );
        assert!(engine.is_sleeping());
    }

    #[test]
    fn major_movement_wakes_the_engine() {
        let mut engine = engine();
        run_steady(&mut engine, 0.0, 8.0);
        assert!(engine.is_sleeping());

        // A large roll jump wakes it and re-announces the default.
        let update = engine.apply_sample(&sample(20.0, 0.0, 0.0), 8.1);
        assert!(!engine.is_sleeping());
        assert_eq!(update.mood, Some(Mood::Happy));
    }

    #[test]
    fn small_movement_does_not_wake_the_engine() {
        let mut engine = engine();
        run_steady(&mut engine, 0.0, 8.0);
        let update = engine.apply_sample(&sample(0.5, 0.2, 0.0), 8.1);
        assert!(engine.is_sleeping());
        assert_eq!(update.mood, None, "sleep mood already announced");
        assert_eq!(engine.current_mood(), Some(Mood::Sleepy));
    }

    #[test]
    fn major_movement_resets_the_steady_timer() {
        let mut engine = engine();
        run_steady(&mut engine, 0.0, 2.0);
        // Jolt right before the rest delay would have elapsed.
        engine.apply_sample(&sample(20.0, 0.0, 0.0), 2.1);
        let moods = run_steady(&mut engine, 2.2, 4.5);
        assert!(
            !engine.is_sleeping(),
            "timer must restart after the jolt, 2.3 s of steadiness is not enough"
        );
        assert!(!moods.contains(&Mood::Sleepy));
    }

    #[test]
    fn tilt_mood_appears_and_clears_with_hysteresis() {
        let mut engine = engine();
        engine.apply_sample(&sample(0.0, 0.0, 0.0), 0.0);

        let update = engine.apply_sample(&sample(15.0, 0.0, 0.0), 0.1);
        assert_eq!(update.mood, Some(Mood::Curious));

        // Tilt persists without re-announcement.
        let update = engine.apply_sample(&sample(15.1, 0.0, 0.0), 0.2);
        assert_eq!(update.mood, None);

        // Conditions clear: back to the default.
        let update = engine.apply_sample(&sample(10.0, 0.0, 0.0), 0.3);
        assert_eq!(update.mood, Some(Mood::Happy));
    }

    #[test]
    fn transient_mood_reannounced_unchanged_resets_to_default() {
        let mut engine = engine();
        engine.apply_sample(&sample(0.0, 0.0, 0.0), 0.0);
        engine.force_mood(Some(Mood::Surprised));

        // The policy keeps a level sample's mood unchanged, which would pin
        // Surprised forever; the engine forces the default instead.
        let update = engine.apply_sample(&sample(0.0, 0.0, 0.05), 0.1);
        assert_eq!(update.mood, Some(Mood::Happy));
    }

    #[test]
    fn forced_sleep_mood_while_awake_resets_to_default() {
        let mut engine = engine();
        engine.apply_sample(&sample(0.0, 0.0, 0.0), 0.0);
        engine.force_mood(Some(Mood::Sleepy));

        // The engine is not sleeping, so a lingering sleep label is just
        // another transient mood and clears like one.
        let update = engine.apply_sample(&sample(0.0, 0.0, 0.05), 0.1);
        assert_eq!(update.mood, Some(Mood::Happy));
        assert!(!engine.is_sleeping());
    }

    #[test]
    fn unsupported_mood_falls_back_to_default() {
        let mut engine = engine_with(EngineConfig {
            supported_moods: vec![Mood::Happy, Mood::Fearful],
            ..EngineConfig::default()
        });
        // Sleep would be entered, but Sleepy is unsupported; the consumer
        // sees the default instead.
        let moods = run_steady(&mut engine, 0.0, 8.0);
        assert_eq!(moods, vec![Mood::Happy]);
        assert!(engine.is_sleeping(), "state machine still sleeps internally");
    }

    #[test]
    fn unsupported_default_falls_back_to_first_supported() {
        let mut engine = engine_with(EngineConfig {
            supported_moods: vec![Mood::Curious],
            ..EngineConfig::default()
        });
        let update = engine.apply_sample(&sample(0.0, 0.0, 0.0), 0.0);
        assert_eq!(update.mood, Some(Mood::Curious));
    }

    #[test]
    fn orientation_is_always_reported() {
        let mut engine = engine();
        let update = engine.apply_sample(&sample(5.0, -4.0, 30.0), 0.0);
        assert_eq!(update.orientation.roll, -5.0);
        assert_eq!(update.orientation.pitch, -4.0);
        assert_eq!(update.orientation.yaw, 30.0);
    }
}
