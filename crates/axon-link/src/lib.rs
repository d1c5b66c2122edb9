//! Sensor-link adapter glue: the line-oriented transport seam, the background
//! read loop that turns device lines into [`axon_types::SensorSample`]
//! values, and the typed broadcast bus they are published on.

pub mod bus;
pub mod link;
pub mod transport;

pub use bus::SensorBus;
pub use link::{LinkStatus, SensorLink};
pub use transport::{LineTransport, SerialTransport, TcpTransport};

use axon_types::AxonError;

/// Write-side seam of the sensor link: anything that can relay a command
/// string to the device.  The bridge server depends on this trait rather
/// than on [`SensorLink`] directly.
pub trait CommandSink: Send + Sync {
    /// Write one command line to the device, appending the trailing newline.
    fn send_command(&self, command: &str) -> Result<(), AxonError>;
}

/// Read-side seam of the sensor link: a "latest sample, consumed at most
/// once" slot for pollers that prefer dropping intermediate samples over
/// buffering them.
pub trait SampleSource: Send + Sync {
    /// Take the most recent unconsumed sample, if any.
    fn pop_latest(&self) -> Option<axon_types::SensorSample>;

    /// True while the underlying transport is still delivering data.
    fn is_streaming(&self) -> bool;
}
