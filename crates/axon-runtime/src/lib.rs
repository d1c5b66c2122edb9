//! Fixed-period telemetry loop.
//!
//! [`TelemetryLoop`] polls a [`SampleSource`] at a fixed cadence on its own
//! thread, drives the calibrator and the state engine with every sample it
//! drains, and publishes the results as [`EngineEvent`]s on a broadcast
//! channel.  When the source delivers nothing for a configured number of
//! consecutive ticks the loop announces a stall, and announces recovery as
//! soon as samples resume.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use axon_link::SampleSource;
use axon_state::{Calibrator, Mood, StateEngine};
use axon_types::Orientation;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Cadence tunables for the telemetry loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Time between source polls.
    pub poll_interval: Duration,
    /// Consecutive empty polls before the stream is declared stalled.
    pub stall_ticks: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(40),
            stall_ticks: 10,
        }
    }
}

/// Whether the sensor stream is currently delivering samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Streaming,
    Stalled,
}

/// One published outcome of the telemetry loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// A sample was processed: display orientation, plus the mood label when
    /// it just changed.
    Update {
        orientation: Orientation,
        mood: Option<Mood>,
    },
    /// The stream stalled or recovered.  Each transition is announced once.
    Stream(StreamStatus),
}

/// Handle to the running loop thread.  Dropping it stops the loop.
pub struct TelemetryLoop {
    events: broadcast::Sender<EngineEvent>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryLoop {
    /// Spawn the loop thread.  The calibrator and engine are owned by the
    /// thread from here on; observe their effects through [`subscribe`] and
    /// the shared offsets handle.
    ///
    /// [`subscribe`]: TelemetryLoop::subscribe
    pub fn start(
        config: RuntimeConfig,
        source: Arc<dyn SampleSource>,
        calibrator: Calibrator,
        engine: StateEngine,
    ) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));

        let thread_events = events.clone();
        let thread_running = Arc::clone(&running);
        let handle = std::thread::Builder::new()
            .name("axon-telemetry".to_string())
            .spawn(move || {
                poll_loop(
                    config,
                    source,
                    calibrator,
                    engine,
                    thread_events,
                    thread_running,
                );
            })
            .expect("spawn telemetry thread");

        Self {
            events,
            running,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Stop the loop and join its thread.  Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let taken = lock(&self.handle).take();
        if let Some(handle) = taken
            && handle.join().is_err()
        {
            warn!("telemetry loop thread panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for TelemetryLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn poll_loop(
    config: RuntimeConfig,
    source: Arc<dyn SampleSource>,
    mut calibrator: Calibrator,
    mut engine: StateEngine,
    events: broadcast::Sender<EngineEvent>,
    running: Arc<AtomicBool>,
) {
    let started = Instant::now();
    let mut empty_ticks = 0u32;
    let mut stalled = false;

    info!(
        poll_ms = config.poll_interval.as_millis() as u64,
        stall_ticks = config.stall_ticks,
        "telemetry loop started"
    );

    while running.load(Ordering::SeqCst) {
        let next_tick = Instant::now() + config.poll_interval;

        match source.pop_latest() {
            Some(sample) => {
                if stalled {
                    stalled = false;
                    info!("sensor stream recovered");
                    let _ = events.send(EngineEvent::Stream(StreamStatus::Streaming));
                }
                empty_ticks = 0;

                let now = started.elapsed().as_secs_f64();
                calibrator.observe(&sample, now);
                let update = engine.apply_sample(&sample, now);
                if let Some(mood) = update.mood {
                    debug!(%mood, "mood changed");
                }
                let _ = events.send(EngineEvent::Update {
                    orientation: update.orientation,
                    mood: update.mood,
                });
            }
            None => {
                empty_ticks = empty_ticks.saturating_add(1);
                if !stalled && empty_ticks >= config.stall_ticks {
                    stalled = true;
                    warn!(empty_ticks, "sensor stream stalled");
                    let _ = events.send(EngineEvent::Stream(StreamStatus::Stalled));
                }
            }
        }

        let remaining = next_tick.saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }

    info!("telemetry loop stopped");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
