//! Daemon configuration – reads/writes `~/.axon/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use axon_bridge::BridgeConfig;
use axon_runtime::RuntimeConfig;
use axon_state::{CalibratorConfig, EngineConfig, Mood, MoodPolicy};
use axon_types::MotionThresholds;

/// Persisted daemon configuration stored in `~/.axon/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Serial device the sensor board is attached to.
    #[serde(default = "default_serial_port")]
    pub serial_port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Bind address for the telemetry bridge.
    #[serde(default = "default_bridge_host")]
    pub bridge_host: String,

    #[serde(default = "default_bridge_port")]
    pub bridge_port: u16,

    /// Telemetry poll period in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive empty polls before the stream is declared stalled.
    #[serde(default = "default_stall_ticks")]
    pub stall_ticks: u32,

    /// Sustained steadiness required before entering sleep, seconds.
    #[serde(default = "default_rest_delay_seconds")]
    pub rest_delay_seconds: f64,

    /// Mood labels the face hardware can display.  Empty means unrestricted.
    #[serde(default)]
    pub supported_moods: Vec<Mood>,

    /// `[calibration]` – drift window duration and stability thresholds.
    #[serde(default)]
    pub calibration: CalibratorConfig,

    /// `[mood_policy]` – mood labels and decision thresholds.
    #[serde(default)]
    pub mood_policy: MoodPolicy,

    /// `[thresholds]` – motion classification and display deadbands.
    #[serde(default)]
    pub thresholds: MotionThresholds,
}

fn default_serial_port() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_baud_rate() -> u32 {
    115200
}
fn default_bridge_host() -> String {
    "0.0.0.0".to_string()
}
fn default_bridge_port() -> u16 {
    8765
}
fn default_poll_interval_ms() -> u64 {
    40
}
fn default_stall_ticks() -> u32 {
    10
}
fn default_rest_delay_seconds() -> f64 {
    3.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: default_serial_port(),
            baud_rate: default_baud_rate(),
            bridge_host: default_bridge_host(),
            bridge_port: default_bridge_port(),
            poll_interval_ms: default_poll_interval_ms(),
            stall_ticks: default_stall_ticks(),
            rest_delay_seconds: default_rest_delay_seconds(),
            supported_moods: Vec::new(),
            calibration: CalibratorConfig::default(),
            mood_policy: MoodPolicy::default(),
            thresholds: MotionThresholds::default(),
        }
    }
}

impl Config {
    pub fn bridge(&self) -> BridgeConfig {
        BridgeConfig {
            host: self.bridge_host.clone(),
            port: self.bridge_port,
            ..BridgeConfig::default()
        }
    }

    pub fn runtime(&self) -> RuntimeConfig {
        RuntimeConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            stall_ticks: self.stall_ticks,
        }
    }

    pub fn calibrator(&self) -> CalibratorConfig {
        self.calibration
    }

    pub fn policy(&self) -> MoodPolicy {
        self.mood_policy
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            rest_delay_seconds: self.rest_delay_seconds,
            supported_moods: self.supported_moods.clone(),
            thresholds: self.thresholds,
            ..EngineConfig::default()
        }
    }
}

/// Return the path to `~/.axon/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".axon").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `AXON_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `AXON_SERIAL_PORT` | `serial_port` |
/// | `AXON_BAUD_RATE` | `baud_rate` |
/// | `AXON_BRIDGE_HOST` | `bridge_host` |
/// | `AXON_BRIDGE_PORT` | `bridge_port` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("AXON_SERIAL_PORT") {
        cfg.serial_port = v;
    }
    if let Ok(v) = std::env::var("AXON_BAUD_RATE")
        && let Ok(baud) = v.parse::<u32>()
    {
        cfg.baud_rate = baud;
    }
    if let Ok(v) = std::env::var("AXON_BRIDGE_HOST") {
        cfg.bridge_host = v;
    }
    if let Ok(v) = std::env::var("AXON_BRIDGE_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.bridge_port = port;
    }
}

/// Save the config to disk, creating `~/.axon/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
