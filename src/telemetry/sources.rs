//! # Collaborator Interfaces
//!
//! Capabilities the poller consumes. Sensor and GPS drivers and the
//! collector client live outside this crate and plug in through these
//! traits.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::Result;
use crate::serial::SharedTransceiver;

/// Onboard environmental sensor board
///
/// Each getter returns one JSON-serializable reading.
pub trait SensorSource: Send + Sync {
    fn get_temperature(&self) -> Result<Value>;
    fn get_pressure(&self) -> Result<Value>;
    fn get_humidity(&self) -> Result<Value>;
    fn get_acceleration(&self) -> Result<Value>;
    fn get_orientation(&self) -> Result<Value>;
    /// Every quantity in one reading
    fn get_all(&self) -> Result<Value>;
}

impl<T: SensorSource + ?Sized> SensorSource for Box<T> {
    fn get_temperature(&self) -> Result<Value> {
        (**self).get_temperature()
    }
    fn get_pressure(&self) -> Result<Value> {
        (**self).get_pressure()
    }
    fn get_humidity(&self) -> Result<Value> {
        (**self).get_humidity()
    }
    fn get_acceleration(&self) -> Result<Value> {
        (**self).get_acceleration()
    }
    fn get_orientation(&self) -> Result<Value> {
        (**self).get_orientation()
    }
    fn get_all(&self) -> Result<Value> {
        (**self).get_all()
    }
}

/// GPS receiver
pub trait LocationSource: Send + Sync {
    fn get_geolocation(&self) -> Result<Value>;
}

/// Destination for serialized readings (LAN collector, radio, ...)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkSink: Send + Sync {
    /// Deliver one serialized reading. Any error is fatal to the caller.
    async fn forward(&self, payload: &str) -> Result<()>;
}

#[async_trait]
impl<T: NetworkSink + ?Sized> NetworkSink for Arc<T> {
    async fn forward(&self, payload: &str) -> Result<()> {
        (**self).forward(payload).await
    }
}

/// The poller's suspension point between cycles
#[async_trait]
pub trait Pacer: Send {
    /// Block until the next cycle may start; an error ends the poll loop.
    async fn wait(&mut self) -> Result<()>;
}

/// Fixed-duration sleep with no jitter or backoff
#[derive(Debug, Clone, Copy)]
pub struct FixedPacer {
    period: Duration,
}

impl FixedPacer {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

#[async_trait]
impl Pacer for FixedPacer {
    async fn wait(&mut self) -> Result<()> {
        tokio::time::sleep(self.period).await;
        Ok(())
    }
}

/// Sink that writes each payload as a frame on a shared radio link
pub struct RadioSink<S = tokio_serial::SerialStream> {
    radio: SharedTransceiver<S>,
}

impl<S> RadioSink<S> {
    pub fn new(radio: SharedTransceiver<S>) -> Self {
        Self { radio }
    }
}

#[async_trait]
impl<S> NetworkSink for RadioSink<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    async fn forward(&self, payload: &str) -> Result<()> {
        self.radio.lock().await.send_line(payload).await
    }
}

/// Sink that only records payloads in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NetworkSink for LogSink {
    async fn forward(&self, payload: &str) -> Result<()> {
        info!(target: "station", "{}", payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::Transceiver;
    use tokio_test::io::Builder;

    #[tokio::test(start_paused = true)]
    async fn test_fixed_pacer_sleeps_for_period() {
        let mut pacer = FixedPacer::new(Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        pacer.wait().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_radio_sink_writes_payload_as_frame() {
        let mock = Builder::new().write(b"{\"key\":\"gps\"}\n").build();
        let sink = RadioSink::new(Transceiver::from_stream(mock, "mock").into_shared());

        sink.forward("{\"key\":\"gps\"}").await.unwrap();
    }

    #[tokio::test]
    async fn test_arc_sink_delegates() {
        let mut mock = MockNetworkSink::new();
        mock.expect_forward()
            .withf(|payload: &str| payload == "42")
            .times(1)
            .returning(|_| Ok(()));

        let sink = Arc::new(mock);
        sink.forward("42").await.unwrap();
    }

    #[tokio::test]
    async fn test_log_sink_accepts_everything() {
        assert!(LogSink.forward("anything").await.is_ok());
    }
}
