//! Transport seam between the sensor link and the physical device.
//!
//! The link only needs a byte source and a byte sink; [`LineTransport`]
//! splits a device handle into the two halves so the read loop can own its
//! half exclusively while writes go through a separate lock.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use axon_types::AxonError;

/// Read timeout applied to transports so the read loop can observe its stop
/// flag between blocking reads.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// An opaque line-oriented byte source/sink.
///
/// Implementations must arrange for reads to return periodically (with
/// [`io::ErrorKind::TimedOut`] or [`io::ErrorKind::WouldBlock`]) rather than
/// blocking indefinitely, so that stopping the link can unblock the reader.
pub trait LineTransport: Send {
    /// Split into an exclusively owned read half and a write half.
    fn split(self: Box<Self>) -> io::Result<(Box<dyn Read + Send>, Box<dyn Write + Send>)>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Serial device
// ─────────────────────────────────────────────────────────────────────────────

/// Serial-port transport for the onboard controller.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    /// Open `path` at `baud_rate` with the link's standard read timeout.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, AxonError> {
        let port = serialport::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| AxonError::Transport(format!("unable to open {path}: {e}")))?;
        Ok(Self { port })
    }
}

impl LineTransport for SerialTransport {
    fn split(self: Box<Self>) -> io::Result<(Box<dyn Read + Send>, Box<dyn Write + Send>)> {
        let writer = self.port.try_clone().map_err(io::Error::other)?;
        Ok((Box::new(self.port), Box::new(writer)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TCP-attached device
// ─────────────────────────────────────────────────────────────────────────────

/// Transport for controllers exposed over a serial-to-TCP adapter.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to `addr` (e.g. `"192.168.1.169:23"`).
    pub fn connect(addr: &str) -> Result<Self, AxonError> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| AxonError::Transport(format!("unable to connect {addr}: {e}")))?;
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| AxonError::Transport(e.to_string()))?;
        Ok(Self { stream })
    }

    /// Wrap an already connected stream (used by tests and local loops).
    pub fn from_stream(stream: TcpStream) -> Result<Self, AxonError> {
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| AxonError::Transport(e.to_string()))?;
        Ok(Self { stream })
    }
}

impl LineTransport for TcpTransport {
    fn split(self: Box<Self>) -> io::Result<(Box<dyn Read + Send>, Box<dyn Write + Send>)> {
        let writer = self.stream.try_clone()?;
        Ok((Box::new(self.stream), Box::new(writer)))
    }
}
