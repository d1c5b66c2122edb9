//! TCP bridge: republishes live sensor telemetry to any number of network
//! observers and relays their command lines back to the sensor link.

pub mod server;

pub use server::{BridgeConfig, BridgeServer};
