//! [`SensorBus`] – typed broadcast channels for parsed samples and raw
//! device lines.
//!
//! Built on [`tokio::sync::broadcast`] so every subscriber receives every
//! message without any single subscriber blocking the others; a slow
//! subscriber lags (dropping its oldest messages) instead of stalling the
//! sensor-read loop.

use tokio::sync::broadcast;

use axon_types::SensorSample;

/// Buffered messages per channel before the oldest are dropped for slow
/// subscribers.
const DEFAULT_CAPACITY: usize = 256;

/// Shared telemetry bus.  Clone it cheaply; all clones share the same
/// underlying channels.
#[derive(Clone, Debug)]
pub struct SensorBus {
    samples: broadcast::Sender<SensorSample>,
    lines: broadcast::Sender<String>,
}

impl SensorBus {
    /// Create a bus whose channels each buffer `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        let (samples, _) = broadcast::channel(capacity);
        let (lines, _) = broadcast::channel(capacity);
        Self { samples, lines }
    }

    /// Publish a parsed sample.  Returns the number of subscribers that were
    /// handed the sample; zero subscribers is a normal condition.
    pub fn publish_sample(&self, sample: SensorSample) -> usize {
        self.samples.send(sample).unwrap_or(0)
    }

    /// Publish a raw device line (without its trailing newline).
    pub fn publish_line(&self, line: String) -> usize {
        self.lines.send(line).unwrap_or(0)
    }

    /// Subscribe to parsed samples published from now on.
    pub fn subscribe_samples(&self) -> broadcast::Receiver<SensorSample> {
        self.samples.subscribe()
    }

    /// Subscribe to raw device lines published from now on.
    pub fn subscribe_lines(&self) -> broadcast::Receiver<String> {
        self.lines.subscribe()
    }
}

impl Default for SensorBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SensorSample {
        SensorSample {
            message_type: 1001,
            left_speed: 0.0,
            right_speed: 0.0,
            roll: 1.0,
            pitch: 2.0,
            yaw: 3.0,
            temperature_c: 25.0,
            voltage_v: 12.0,
        }
    }

    #[tokio::test]
    async fn every_subscriber_receives_every_sample() {
        let bus = SensorBus::default();
        let mut rx1 = bus.subscribe_samples();
        let mut rx2 = bus.subscribe_samples();

        assert_eq!(bus.publish_sample(sample()), 2);

        assert_eq!(rx1.recv().await.expect("rx1"), sample());
        assert_eq!(rx2.recv().await.expect("rx2"), sample());
    }

    #[test]
    fn publishing_without_subscribers_is_not_an_error() {
        let bus = SensorBus::default();
        assert_eq!(bus.publish_sample(sample()), 0);
        assert_eq!(bus.publish_line("raw".to_string()), 0);
    }

    #[tokio::test]
    async fn sample_and_line_channels_are_independent() {
        let bus = SensorBus::default();
        let mut lines = bus.subscribe_lines();

        bus.publish_sample(sample());
        bus.publish_line("{\"T\":1}".to_string());

        // Only the raw line arrives on the line channel.
        assert_eq!(lines.recv().await.expect("line"), "{\"T\":1}");
        assert!(lines.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let bus = SensorBus::new(4);
        let mut rx = bus.subscribe_samples();
        for _ in 0..64 {
            bus.publish_sample(sample());
        }
        let result = rx.recv().await;
        assert!(matches!(
            result,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_))
        ));
    }
}
