//! # Station Dispatch
//!
//! Selects what this board does at startup. The role is an explicit value
//! handed in by the entry point:
//!
//! | Mode   | Config value | Role                                   |
//! |--------|--------------|----------------------------------------|
//! | Comm   | `commPi`     | Radio link to the base station         |
//! | Sense  | `sensePi`    | Polls the sensor board                 |
//! | Gps    | `gpsPi`      | Polls the GPS receiver                 |
//! | Local  | empty/other  | Nothing; development on a workstation  |

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{PollerConfig, SensorWiring};
use crate::error::Result;
use crate::telemetry::poller::{location_probes, sensor_probes, Poller};
use crate::telemetry::sources::{FixedPacer, LocationSource, NetworkSink, SensorSource};

/// Station role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Comm,
    Sense,
    Gps,
    Local,
}

/// Error for an unrecognised mode string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown station mode '{}'", self.0)
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "commPi" => Ok(Mode::Comm),
            "sensePi" => Ok(Mode::Sense),
            "gpsPi" => Ok(Mode::Gps),
            "" | "local" => Ok(Mode::Local),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

impl Mode {
    /// Parse a configured mode, treating anything unrecognised as local
    pub fn from_config(value: &str) -> Self {
        value.parse().unwrap_or_else(|e: UnknownMode| {
            warn!(target: "station", "{}, running local", e);
            Mode::Local
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Comm => "commPi",
            Mode::Sense => "sensePi",
            Mode::Gps => "gpsPi",
            Mode::Local => "local",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry point per station role
#[async_trait]
pub trait Handlers: Send {
    async fn comm(&mut self) -> Result<()>;
    async fn sense(&mut self) -> Result<()>;
    async fn gps(&mut self) -> Result<()>;
    async fn local(&mut self) -> Result<()>;
}

/// Run exactly the handler for `mode`
///
/// # Errors
///
/// Whatever the handler returns; nothing is retried here.
pub async fn dispatch<H: Handlers + ?Sized>(mode: Mode, handlers: &mut H) -> Result<()> {
    info!(target: "station", "Starting in {} mode", mode);

    match mode {
        Mode::Comm => handlers.comm().await,
        Mode::Sense => handlers.sense().await,
        Mode::Gps => handlers.gps().await,
        Mode::Local => handlers.local().await,
    }
}

/// Quantity name to sensor id, as handed to a sensor board driver
pub type WiringTable = BTreeMap<&'static str, u8>;

/// Sensor station: build the sensor source from `wiring`, then poll every
/// sensor quantity into `sink`
///
/// `connect` receives the wiring table once, before the first sample.
///
/// # Errors
///
/// Returns the error from `connect`, or the first sample, serialization or
/// forward failure.
pub async fn run_sensors<S, F, K>(
    connect: F,
    wiring: &SensorWiring,
    sink: K,
    config: &PollerConfig,
) -> Result<Infallible>
where
    S: SensorSource,
    F: FnOnce(&WiringTable) -> Result<S>,
    K: NetworkSink,
{
    let table = wiring.to_map();
    info!(target: "station", "Sensor wiring: {:?}", table);
    let source = connect(&table)?;

    let pacer = FixedPacer::new(Duration::from_millis(config.interval_ms));
    let mut poller = Poller::new(sink, pacer).with_cadence(config.cadence);
    let mut probes = sensor_probes(&source);
    poller.run_forever(&mut probes).await
}

/// GPS station: poll geolocation into `sink`
///
/// # Errors
///
/// Returns the first sample, serialization or forward failure.
pub async fn run_gps<K: NetworkSink>(
    source: &dyn LocationSource,
    sink: K,
    config: &PollerConfig,
) -> Result<Infallible> {
    let pacer = FixedPacer::new(Duration::from_millis(config.interval_ms));
    let mut poller = Poller::new(sink, pacer).with_cadence(config.cadence);
    poller.run_forever(&mut location_probes(source)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldlinkError;
    use crate::telemetry::poller::Cadence;
    use crate::telemetry::sources::MockNetworkSink;
    use serde_json::{json, Value};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        fail: bool,
    }

    impl Recorder {
        fn record(&mut self, name: &'static str) -> Result<()> {
            self.calls.push(name);
            if self.fail {
                return Err(FieldlinkError::Sink(name.to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Handlers for Recorder {
        async fn comm(&mut self) -> Result<()> {
            self.record("comm")
        }
        async fn sense(&mut self) -> Result<()> {
            self.record("sense")
        }
        async fn gps(&mut self) -> Result<()> {
            self.record("gps")
        }
        async fn local(&mut self) -> Result<()> {
            self.record("local")
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("commPi".parse::<Mode>(), Ok(Mode::Comm));
        assert_eq!("sensePi".parse::<Mode>(), Ok(Mode::Sense));
        assert_eq!("gpsPi".parse::<Mode>(), Ok(Mode::Gps));
        assert_eq!("".parse::<Mode>(), Ok(Mode::Local));
        assert_eq!("local".parse::<Mode>(), Ok(Mode::Local));
        assert_eq!("GPSPI".parse::<Mode>(), Err(UnknownMode("GPSPI".to_string())));
    }

    #[test]
    fn test_unknown_config_mode_falls_back_to_local() {
        assert_eq!(Mode::from_config("basePi"), Mode::Local);
        assert_eq!(Mode::from_config("commPi"), Mode::Comm);
    }

    #[test]
    fn test_mode_display_round_trips() {
        for mode in [Mode::Comm, Mode::Sense, Mode::Gps, Mode::Local] {
            assert_eq!(mode.to_string().parse::<Mode>(), Ok(mode));
        }
    }

    #[tokio::test]
    async fn test_dispatch_calls_only_the_selected_handler() {
        for (mode, expected) in [
            (Mode::Comm, "comm"),
            (Mode::Sense, "sense"),
            (Mode::Gps, "gps"),
            (Mode::Local, "local"),
        ] {
            let mut recorder = Recorder::default();
            dispatch(mode, &mut recorder).await.unwrap();
            assert_eq!(recorder.calls, vec![expected]);
        }
    }

    struct StubSensors;

    impl SensorSource for StubSensors {
        fn get_temperature(&self) -> Result<Value> {
            Ok(json!({"key": "temp"}))
        }
        fn get_pressure(&self) -> Result<Value> {
            Ok(json!({"key": "pres"}))
        }
        fn get_humidity(&self) -> Result<Value> {
            Ok(json!({"key": "hum"}))
        }
        fn get_acceleration(&self) -> Result<Value> {
            Ok(json!({"key": "acc"}))
        }
        fn get_orientation(&self) -> Result<Value> {
            Ok(json!({"key": "orient"}))
        }
        fn get_all(&self) -> Result<Value> {
            Ok(json!({"key": "all"}))
        }
    }

    struct StubGps;

    impl LocationSource for StubGps {
        fn get_geolocation(&self) -> Result<Value> {
            Ok(json!({"lat": 43.07, "lon": -89.4}))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sensors_sleeps_between_cycles() {
        let mut sink = MockNetworkSink::new();
        let mut calls = 0;
        sink.expect_forward().times(7).returning(move |_| {
            calls += 1;
            if calls == 7 {
                return Err(FieldlinkError::Sink("collector down".to_string()));
            }
            Ok(())
        });

        let config = PollerConfig {
            interval_ms: 2000,
            cadence: Cadence::PerCycle,
        };
        let started = tokio::time::Instant::now();
        let result = run_sensors(|_| Ok(StubSensors), &SensorWiring::default(), sink, &config).await;

        assert!(matches!(result, Err(FieldlinkError::Sink(_))));
        // One full cycle, one sleep, then the first forward of cycle two fails
        assert_eq!(started.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_gps_forwards_each_interval() {
        let mut sink = MockNetworkSink::new();
        let mut calls = 0;
        sink.expect_forward()
            .withf(|p: &str| p == "{\"lat\":43.07,\"lon\":-89.4}")
            .times(3)
            .returning(move |_| {
                calls += 1;
                if calls == 3 {
                    return Err(FieldlinkError::Sink("collector down".to_string()));
                }
                Ok(())
            });

        let config = PollerConfig::default();
        let started = tokio::time::Instant::now();
        let result = run_gps(&StubGps, sink, &config).await;

        assert!(matches!(result, Err(FieldlinkError::Sink(_))));
        assert_eq!(started.elapsed(), Duration::from_millis(2 * config.interval_ms));
    }

    #[tokio::test]
    async fn test_run_sensors_hands_wiring_table_to_source() {
        let wiring = SensorWiring {
            temperature: 12,
            ..Default::default()
        };
        let mut seen = None;
        let result = run_sensors(
            |table: &WiringTable| {
                seen = Some(table.clone());
                Err::<StubSensors, _>(FieldlinkError::Source("board absent".to_string()))
            },
            &wiring,
            MockNetworkSink::new(),
            &PollerConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(FieldlinkError::Source(_))));
        assert_eq!(
            seen,
            Some(BTreeMap::from([
                ("temperature", 12),
                ("pressure", 3),
                ("humidity", 4),
                ("acceleration", 5),
                ("orientation", 6),
            ]))
        );
    }

    #[tokio::test]
    async fn test_dispatch_propagates_handler_error() {
        let mut recorder = Recorder {
            fail: true,
            ..Default::default()
        };
        let result = dispatch(Mode::Sense, &mut recorder).await;
        assert!(matches!(result, Err(FieldlinkError::Sink(_))));
    }
}
