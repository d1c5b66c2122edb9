//! `axond` – the Axon telemetry daemon.
//!
//! Wires the whole stack together:
//!
//! 1. Loads `~/.axon/config.toml` (writing the defaults on first run) and
//!    applies `AXON_*` environment overrides.
//! 2. Opens the serial link to the sensor board and starts the background
//!    read loop.
//! 3. Starts the TCP bridge so tools on the network can watch telemetry and
//!    inject commands.
//! 4. Runs the fixed-period telemetry loop: calibration, motion
//!    classification, mood selection.
//! 5. Intercepts **Ctrl-C** for a graceful shutdown.

mod config;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use tracing::{error, info, warn};

use axon_bridge::BridgeServer;
use axon_link::{SensorBus, SensorLink, SerialTransport};
use axon_runtime::{EngineEvent, StreamStatus, TelemetryLoop};
use axon_state::{Calibrator, StateEngine};
use axon_types::SharedOffsets;

#[tokio::main]
async fn main() {
    init_tracing();
    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => info!(path = %config::config_path().display(), "wrote default config"),
                Err(e) => warn!(error = %e, "could not persist default config"),
            }
            cfg
        }
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };
    info!(?cfg, "configuration loaded");

    // ── Serial link ───────────────────────────────────────────────────────
    let bus = SensorBus::default();
    let transport = match SerialTransport::open(&cfg.serial_port, cfg.baud_rate) {
        Ok(t) => t,
        Err(e) => {
            error!(port = %cfg.serial_port, error = %e, "failed to open serial port");
            std::process::exit(1);
        }
    };
    let link = match SensorLink::start(Box::new(transport), bus.clone()) {
        Ok(link) => link,
        Err(e) => {
            error!(error = %e, "failed to start sensor link");
            std::process::exit(1);
        }
    };
    println!("  {} sensor link on {}", "✓".green(), cfg.serial_port.bold());

    // ── Bridge server ─────────────────────────────────────────────────────
    let bridge = Arc::new(BridgeServer::new(cfg.bridge(), link.clone(), bus.clone()));
    if let Err(e) = bridge.start().await {
        error!(error = %e, "failed to start bridge");
        std::process::exit(1);
    }
    println!(
        "  {} bridge listening on {}:{}",
        "✓".green(),
        cfg.bridge_host.bold(),
        cfg.bridge_port.to_string().bold()
    );

    // ── Telemetry loop ────────────────────────────────────────────────────
    let offsets = SharedOffsets::default();
    let calibrator = Calibrator::new(cfg.calibrator(), offsets.clone());
    let engine = StateEngine::new(cfg.policy(), cfg.engine(), offsets);
    let telemetry = TelemetryLoop::start(cfg.runtime(), link.clone(), calibrator, engine);

    let mut events = telemetry.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                EngineEvent::Update { mood: Some(mood), .. } => info!(%mood, "mood changed"),
                EngineEvent::Update { .. } => {}
                EngineEvent::Stream(StreamStatus::Stalled) => warn!("sensor stream stalled"),
                EngineEvent::Stream(StreamStatus::Streaming) => info!("sensor stream recovered"),
            }
        }
    });

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    while !shutdown.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    telemetry.stop();
    bridge.stop().await;
    link.stop();
    println!("{}", "  ✓ Axon stopped.".green());
}

fn init_tracing() {
    // RUST_LOG selects the filter (defaults to "info"); AXON_LOG_FORMAT=json
    // switches to newline-delimited JSON for log aggregators.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if std::env::var("AXON_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___   _  _____  _  __"#.bold().cyan());
    println!("{}", r#"  / _ | | |/_/ _ \/ |/ /"#.bold().cyan());
    println!("{}", r#" / __ |_>  </ // /    / "#.bold().cyan());
    println!("{}", r#"/_/ |_/_/|_|\____/_/|_/ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Axon".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Companion robot telemetry daemon");
    println!();
}
