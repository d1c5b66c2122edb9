//! [`SensorLink`] – background reader for the device transport.
//!
//! One OS thread owns the read half exclusively: it accumulates bytes,
//! splits them on newlines, publishes every complete raw line on the
//! [`SensorBus`], parses each into a [`SensorSample`] (non-parseable lines
//! are logged and dropped), publishes the sample, and stores it in the
//! latest-sample slot for pollers.
//!
//! The write half sits behind its own lock so one command is fully written
//! before the next begins, no matter how many bridge clients relay commands
//! concurrently.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use tracing::{debug, error, info};

use axon_types::{AxonError, SensorSample};

use crate::bus::SensorBus;
use crate::transport::LineTransport;
use crate::{CommandSink, SampleSource};

/// Lifecycle state of a [`SensorLink`], queryable at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// The read loop is consuming the transport.
    Running,
    /// `stop()` was called and the read loop exited cleanly.
    Stopped,
    /// The transport failed; the read loop has exited and will not resume.
    Errored(String),
}

/// Line-oriented sensor link over an opaque transport.
pub struct SensorLink {
    bus: SensorBus,
    latest: Arc<Mutex<Option<SensorSample>>>,
    writer: Mutex<Box<dyn Write + Send>>,
    status: Arc<Mutex<LinkStatus>>,
    running: Arc<AtomicBool>,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SensorLink {
    /// Split `transport` and start the background read loop, publishing onto
    /// `bus`.
    pub fn start(
        transport: Box<dyn LineTransport>,
        bus: SensorBus,
    ) -> Result<Arc<Self>, AxonError> {
        let (reader, writer) = transport
            .split()
            .map_err(|e| AxonError::Transport(e.to_string()))?;

        let link = Arc::new(Self {
            bus: bus.clone(),
            latest: Arc::new(Mutex::new(None)),
            writer: Mutex::new(writer),
            status: Arc::new(Mutex::new(LinkStatus::Running)),
            running: Arc::new(AtomicBool::new(true)),
            reader_handle: Mutex::new(None),
        });

        let handle = {
            let latest = Arc::clone(&link.latest);
            let status = Arc::clone(&link.status);
            let running = Arc::clone(&link.running);
            std::thread::Builder::new()
                .name("axon-sensor-link".to_string())
                .spawn(move || read_loop(reader, bus, latest, status, running))
                .map_err(|e| AxonError::Transport(e.to_string()))?
        };
        *lock(&link.reader_handle) = Some(handle);

        Ok(link)
    }

    /// The bus this link publishes on.
    pub fn bus(&self) -> &SensorBus {
        &self.bus
    }

    /// Current lifecycle state.
    pub fn status(&self) -> LinkStatus {
        lock(&self.status).clone()
    }

    /// Stop the read loop and join it.  Idempotent; safe to call from any
    /// thread.  The reader unblocks within one transport read timeout.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = lock(&self.reader_handle).take()
            && handle.join().is_err()
        {
            error!("sensor link reader thread panicked");
        }
    }
}

impl Drop for SensorLink {
    fn drop(&mut self) {
        self.stop();
    }
}

impl CommandSink for SensorLink {
    fn send_command(&self, command: &str) -> Result<(), AxonError> {
        let mut writer = lock(&self.writer);
        writer
            .write_all(command.trim_end_matches(['\r', '\n']).as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush())
            .map_err(|e| AxonError::Transport(format!("command write failed: {e}")))
    }
}

impl SampleSource for SensorLink {
    fn pop_latest(&self) -> Option<SensorSample> {
        lock(&self.latest).take()
    }

    fn is_streaming(&self) -> bool {
        self.status() == LinkStatus::Running
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// Read loop
// ─────────────────────────────────────────────────────────────────────────────

fn read_loop(
    mut reader: Box<dyn Read + Send>,
    bus: SensorBus,
    latest: Arc<Mutex<Option<SensorSample>>>,
    status: Arc<Mutex<LinkStatus>>,
    running: Arc<AtomicBool>,
) {
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 512];

    while running.load(Ordering::SeqCst) {
        match reader.read(&mut chunk) {
            Ok(0) => {
                // EOF: the device went away.
                if running.load(Ordering::SeqCst) {
                    error!("sensor transport closed");
                    *lock(&status) = LinkStatus::Errored("transport closed".to_string());
                }
                break;
            }
            Ok(n) => {
                pending.extend_from_slice(&chunk[..n]);
                drain_lines(&mut pending, &bus, &latest);
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    error!(error = %e, "sensor transport failure");
                    *lock(&status) = LinkStatus::Errored(e.to_string());
                }
                break;
            }
        }
    }

    let mut status = lock(&status);
    if *status == LinkStatus::Running {
        info!("sensor link stopped");
        *status = LinkStatus::Stopped;
    }
}

fn drain_lines(pending: &mut Vec<u8>, bus: &SensorBus, latest: &Mutex<Option<SensorSample>>) {
    while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = pending.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        bus.publish_line(line.to_string());

        match SensorSample::parse(line) {
            Ok(sample) => {
                *lock(latest) = Some(sample);
                bus.publish_sample(sample);
            }
            Err(e) => debug!(%line, error = %e, "dropping unparseable sensor line"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
