//! [`BridgeServer`] – TCP fan-out for live telemetry plus command relay.
//!
//! Every client receives a welcome line, then a stream of newline-delimited
//! frames: raw forwarded sensor lines and `telemetry <payload>` frames with
//! the long-key wire encoding.  Lines a client sends are commands, relayed
//! verbatim to the sensor write path and acknowledged to that client only
//! with `echo: <command>` or `error: <message>`.
//!
//! Each connection task holds its own bounded [`broadcast`] subscriptions to
//! the sensor bus, so a client that stops reading lags its receivers and
//! sheds the oldest frames instead of buffering without limit.  The
//! mutex-guarded registry only tracks who is connected; it is never held
//! across a socket write, and one stuck client cannot delay the rest.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Duration, timeout};
use tracing::{info, warn};

use axon_link::{CommandSink, SensorBus};
use axon_types::{AxonError, SensorSample, wire};

/// How long `stop()` waits for connection handlers before aborting them.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Bridge listener configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    /// Sent as the first line of every connection.
    pub welcome: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            welcome: "Axon serial bridge ready".to_string(),
        }
    }
}

type ClientSet = Arc<Mutex<HashSet<u64>>>;

struct Running {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept: JoinHandle<()>,
}

/// Multi-client telemetry bridge.  `start()` and `stop()` are idempotent and
/// safe to call from any task.
pub struct BridgeServer {
    config: BridgeConfig,
    sink: Arc<dyn CommandSink>,
    bus: SensorBus,
    clients: ClientSet,
    running: tokio::sync::Mutex<Option<Running>>,
}

impl BridgeServer {
    pub fn new(config: BridgeConfig, sink: Arc<dyn CommandSink>, bus: SensorBus) -> Self {
        Self {
            config,
            sink,
            bus,
            clients: Arc::new(Mutex::new(HashSet::new())),
            running: tokio::sync::Mutex::new(None),
        }
    }

    /// Bind the listener and start accepting connections.  Calling `start`
    /// on a running server is a no-op.
    pub async fn start(&self) -> Result<(), AxonError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }

        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| {
                AxonError::Bridge(format!(
                    "bind {}:{} failed: {e}",
                    self.config.host, self.config.port
                ))
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AxonError::Bridge(e.to_string()))?;
        info!(%local_addr, "bridge listening");

        let (shutdown, shutdown_rx) = watch::channel(false);

        let accept = tokio::spawn(accept_loop(
            listener,
            self.bus.clone(),
            Arc::clone(&self.clients),
            Arc::clone(&self.sink),
            self.config.welcome.clone(),
            shutdown_rx,
        ));

        *running = Some(Running {
            local_addr,
            shutdown,
            accept,
        });
        Ok(())
    }

    /// Unblock the accept loop, close every client connection, and join all
    /// handlers with a bounded timeout.  Calling `stop` on a stopped server
    /// is a no-op.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        let Some(server) = running.take() else {
            return;
        };
        let _ = server.shutdown.send(true);

        let mut accept = server.accept;
        if timeout(SHUTDOWN_TIMEOUT, &mut accept).await.is_err() {
            warn!("bridge accept loop did not exit in time, aborting");
            accept.abort();
        }
        lock(&self.clients).clear();
        info!("bridge stopped");
    }

    /// Address the listener is bound to, while running.  Useful when the
    /// configured port is 0.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.local_addr)
    }

    /// Number of currently registered clients.
    pub fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// Accept loop
// ─────────────────────────────────────────────────────────────────────────────

async fn accept_loop(
    listener: TcpListener,
    bus: SensorBus,
    clients: ClientSet,
    sink: Arc<dyn CommandSink>,
    welcome: String,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();
    let mut next_id = 0u64;

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    next_id += 1;
                    let id = next_id;
                    // Subscribe before registering so a frame published the
                    // moment the client appears in the set is never missed.
                    let samples = bus.subscribe_samples();
                    let raw_lines = bus.subscribe_lines();
                    lock(&clients).insert(id);
                    info!(%peer, id, "bridge client connected");
                    connections.spawn(handle_client(
                        id,
                        stream,
                        peer,
                        samples,
                        raw_lines,
                        Arc::clone(&clients),
                        Arc::clone(&sink),
                        welcome.clone(),
                        shutdown.clone(),
                    ));
                }
                Err(e) => warn!(error = %e, "bridge accept error"),
            },
            _ = shutdown.changed() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    // Listener closes here, unblocking any pending connect attempts.
    drop(listener);

    let drain = async {
        while connections.join_next().await.is_some() {}
    };
    if timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
        warn!("bridge clients did not exit in time, aborting");
        connections.abort_all();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-connection handler
// ─────────────────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
async fn handle_client(
    id: u64,
    stream: TcpStream,
    peer: SocketAddr,
    mut samples: broadcast::Receiver<SensorSample>,
    mut raw_lines: broadcast::Receiver<String>,
    clients: ClientSet,
    sink: Arc<dyn CommandSink>,
    welcome: String,
    mut shutdown: watch::Receiver<bool>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    if write_half
        .write_all(format!("{welcome}\n").as_bytes())
        .await
        .is_err()
    {
        lock(&clients).remove(&id);
        return;
    }

    loop {
        tokio::select! {
            received = samples.recv() => match received {
                Ok(sample) => {
                    let frame = format!("telemetry {}\n", wire::encode(&sample));
                    if write_half.write_all(frame.as_bytes()).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(id, lagged_by = n, "slow bridge client, dropping oldest telemetry");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            received = raw_lines.recv() => match received {
                Ok(line) => {
                    if write_half.write_all(format!("{line}\n").as_bytes()).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(id, lagged_by = n, "slow bridge client, dropping oldest raw lines");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !relay_command(&line, &sink, &mut write_half).await {
                        break;
                    }
                }
                Ok(None) | Err(_) => break,
            },
            _ = shutdown.changed() => break,
        }
    }

    lock(&clients).remove(&id);
    info!(%peer, id, "bridge client disconnected");
}

/// Forward one command line to the sensor write path and acknowledge it to
/// the originating client.  Returns false when the ack write fails.
///
/// The sink write is a blocking serial operation, so it is moved off the
/// executor thread.
async fn relay_command(
    line: &str,
    sink: &Arc<dyn CommandSink>,
    write_half: &mut OwnedWriteHalf,
) -> bool {
    let command = line.trim().to_string();
    if command.is_empty() {
        return true;
    }
    let relayed = {
        let sink = Arc::clone(sink);
        let command = command.clone();
        tokio::task::spawn_blocking(move || sink.send_command(&command)).await
    };
    let ack = match relayed {
        Ok(Ok(())) => format!("echo: {command}\n"),
        Ok(Err(e)) => format!("error: {e}\n"),
        Err(e) => format!("error: {e}\n"),
    };
    write_half.write_all(ack.as_bytes()).await.is_ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
