//! # Fieldlink
//!
//! Field telemetry agent for single-board computers.
//!
//! Loads configuration, installs logging and starts the station role
//! selected by `[station] mode` (or `HARDWARE_TYPE`).
//!
//! # Errors
//!
//! Any failure inside a station loop ends the process with a non-zero exit
//! status. The agent is meant to run under a supervisor (systemd, runit)
//! that restarts it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use fieldlink::config::Config;
use fieldlink::error::FieldlinkError;
use fieldlink::logging;
use fieldlink::serial::discovery::SystemPorts;
use fieldlink::serial::Transceiver;
use fieldlink::station::{dispatch, run_sensors, Handlers, WiringTable};
use fieldlink::telemetry::relay::relay;
use fieldlink::telemetry::sources::{LogSink, SensorSource};

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable overriding `[station] mode`
const MODE_ENV: &str = "HARDWARE_TYPE";

/// Environment variable overriding `[radio] port`
const PORT_ENV: &str = "RADIO_TRANSMITTER_PORT";

/// Sensor board driver hook
///
/// No driver is linked into this build, so this always fails with the
/// wiring it was asked for.
fn connect_sensor_board(wiring: &WiringTable) -> fieldlink::error::Result<Box<dyn SensorSource>> {
    Err(FieldlinkError::Config(format!(
        "sensePi needs a sensor board driver (wiring {:?}); none is linked into this build",
        wiring
    )))
}

/// Station roles as run by this binary
struct Station {
    config: Config,
}

#[async_trait]
impl Handlers for Station {
    /// Open the radio and log every frame it receives until Ctrl+C
    async fn comm(&mut self) -> fieldlink::error::Result<()> {
        let radio = Transceiver::open(
            self.config.radio.explicit_port(),
            &self.config.radio.filter(),
            &SystemPorts,
        )?;
        info!("Radio link open at: {}", radio.device_path());

        let radio = radio.into_shared();
        tokio::select! {
            result = relay(&radio, &LogSink) => {
                result?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
            }
        }

        Ok(())
    }

    /// Poll the sensor board into the log; fails at connect without a driver
    async fn sense(&mut self) -> fieldlink::error::Result<()> {
        let never = run_sensors(
            connect_sensor_board,
            &self.config.sensors,
            LogSink,
            &self.config.poller,
        )
        .await?;
        match never {}
    }

    async fn gps(&mut self) -> fieldlink::error::Result<()> {
        Err(FieldlinkError::Config(
            "gpsPi needs a GPS driver; none is linked into this build".to_string(),
        ))
    }

    async fn local(&mut self) -> fieldlink::error::Result<()> {
        info!("Local mode: no hardware role, exiting");
        Ok(())
    }
}

/// Load the config file, falling back to defaults when the default path is absent
fn load_config(path: Option<String>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path))?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::load(DEFAULT_CONFIG_PATH).with_context(|| format!("loading {}", DEFAULT_CONFIG_PATH))?
        }
        None => Config::default(),
    };

    Ok(config.with_overrides(std::env::var(MODE_ENV).ok(), std::env::var(PORT_ENV).ok()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config(std::env::args().nth(1))?;

    // Held until exit so buffered file records are flushed
    let _log_guard = logging::init(&config.logging)?;

    info!("Fieldlink v{} starting...", env!("CARGO_PKG_VERSION"));

    let mode = config.mode();
    let mut station = Station { config };
    dispatch(mode, &mut station).await?;

    Ok(())
}
