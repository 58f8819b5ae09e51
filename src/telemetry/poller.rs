//! # Telemetry Poller
//!
//! Repeats sample → serialize → forward over a fixed list of probes, with a
//! wait step as the only suspension point.
//!
//! ## Failure Semantics
//!
//! Nothing is caught inside the loop. A failing sample, encode, forward or
//! wait ends the loop and the error goes to the caller, which is expected to
//! exit so a process supervisor can restart it.

use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use tracing::{debug, info};

use super::sources::{LocationSource, NetworkSink, Pacer, SensorSource};
use crate::error::Result;

/// Renders a reading as the text handed to the sink
pub type Encoder = fn(&Value) -> Result<String>;

/// Default encoder: compact single-line JSON
pub fn compact_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Where the wait step falls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// One wait after every probe in the cycle has been forwarded
    #[default]
    PerCycle,
    /// A wait after each individual forward
    PerReading,
}

/// One named sampling function
pub struct Probe<'a> {
    quantity: &'static str,
    sample: Box<dyn FnMut() -> Result<Value> + Send + 'a>,
}

impl<'a> Probe<'a> {
    pub fn new<F>(quantity: &'static str, sample: F) -> Self
    where
        F: FnMut() -> Result<Value> + Send + 'a,
    {
        Self {
            quantity,
            sample: Box::new(sample),
        }
    }

    pub fn quantity(&self) -> &'static str {
        self.quantity
    }

    pub fn sample(&mut self) -> Result<Value> {
        (self.sample)()
    }
}

impl std::fmt::Debug for Probe<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Probe")
            .field("quantity", &self.quantity)
            .finish_non_exhaustive()
    }
}

/// Sensor board probes in forwarding order
///
/// temperature, pressure, humidity, acceleration, orientation, then the
/// combined reading.
pub fn sensor_probes<'a>(source: &'a dyn SensorSource) -> Vec<Probe<'a>> {
    vec![
        Probe::new("temperature", move || source.get_temperature()),
        Probe::new("pressure", move || source.get_pressure()),
        Probe::new("humidity", move || source.get_humidity()),
        Probe::new("acceleration", move || source.get_acceleration()),
        Probe::new("orientation", move || source.get_orientation()),
        Probe::new("all", move || source.get_all()),
    ]
}

/// The single geolocation probe
pub fn location_probes<'a>(source: &'a dyn LocationSource) -> Vec<Probe<'a>> {
    vec![Probe::new("geolocation", move || source.get_geolocation())]
}

/// Wait-gated poll loop
///
/// Owns its sink and pacer; probes are lent per call.
pub struct Poller<K, P> {
    sink: K,
    pacer: P,
    cadence: Cadence,
    encode: Encoder,
}

impl<K, P> Poller<K, P>
where
    K: NetworkSink,
    P: Pacer,
{
    pub fn new(sink: K, pacer: P) -> Self {
        Self {
            sink,
            pacer,
            cadence: Cadence::default(),
            encode: compact_json,
        }
    }

    pub fn with_cadence(mut self, cadence: Cadence) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn with_encoder(mut self, encode: Encoder) -> Self {
        self.encode = encode;
        self
    }

    /// Run one iteration over `probes` in order
    ///
    /// Forward `i + 1` does not start until forward `i` has returned. The
    /// iteration ends with the wait step (per cycle) or interleaves it (per
    /// reading).
    ///
    /// # Errors
    ///
    /// The first error from a probe, the encoder, the sink or the pacer,
    /// unchanged. Later probes are not sampled.
    pub async fn run_cycle(&mut self, probes: &mut [Probe<'_>]) -> Result<()> {
        for probe in probes.iter_mut() {
            let reading = probe.sample()?;
            let payload = (self.encode)(&reading)?;

            debug!(target: "poller", "Forwarding {}: {}", probe.quantity(), payload);
            self.sink.forward(&payload).await?;

            if self.cadence == Cadence::PerReading {
                self.pacer.wait().await?;
            }
        }

        if self.cadence == Cadence::PerCycle {
            self.pacer.wait().await?;
        }

        Ok(())
    }

    /// Loop until something fails
    ///
    /// Only returns with an error; that is the shutdown path.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fieldlink::telemetry::poller::{location_probes, Poller};
    /// use fieldlink::telemetry::sources::{FixedPacer, LocationSource, LogSink};
    /// use std::time::Duration;
    ///
    /// # async fn run(gps: &dyn LocationSource) -> fieldlink::error::Result<()> {
    /// let mut poller = Poller::new(LogSink, FixedPacer::new(Duration::from_secs(1)));
    /// let mut probes = location_probes(gps);
    /// poller.run_forever(&mut probes).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_forever(&mut self, probes: &mut [Probe<'_>]) -> Result<Infallible> {
        let quantities: Vec<&str> = probes.iter().map(|p| p.quantity()).collect();
        info!(target: "poller", "Polling {:?} ({:?})", quantities, self.cadence);

        loop {
            self.run_cycle(probes).await?;
        }
    }
}
