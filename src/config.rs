//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Library components never read the environment. The binary applies its
//! environment overrides through [`Config::with_overrides`].

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{FieldlinkError, Result};
use crate::serial::discovery::SerialDescriptorFilter;
use crate::station::Mode;
use crate::telemetry::poller::Cadence;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub station: StationConfig,

    #[serde(default)]
    pub radio: RadioConfig,

    #[serde(default)]
    pub poller: PollerConfig,

    #[serde(default)]
    pub sensors: SensorWiring,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Station role
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StationConfig {
    /// `commPi`, `sensePi`, `gpsPi`, `local` or empty
    #[serde(default)]
    pub mode: String,
}

/// Radio port selection
///
/// An explicit `port` wins; otherwise the descriptor fields pick a device.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RadioConfig {
    #[serde(default)]
    pub port: String,

    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub manufacturer: Option<String>,
    pub serial_number: Option<String>,
    pub interface: Option<String>,
}

/// Poll loop timing
#[derive(Debug, Deserialize, Clone)]
pub struct PollerConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default)]
    pub cadence: Cadence,
}

/// Sensor board wiring table: quantity name to numeric identifier
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SensorWiring {
    #[serde(default = "default_temperature_id")]
    pub temperature: u8,

    #[serde(default = "default_pressure_id")]
    pub pressure: u8,

    #[serde(default = "default_humidity_id")]
    pub humidity: u8,

    #[serde(default = "default_acceleration_id")]
    pub acceleration: u8,

    #[serde(default = "default_orientation_id")]
    pub orientation: u8,
}

/// Log sink configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Directory for the log file; stdout only when unset
    pub directory: Option<String>,

    #[serde(default = "default_log_file_name")]
    pub file_name: String,

    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_interval_ms() -> u64 { 1000 }

fn default_temperature_id() -> u8 { 2 }
fn default_pressure_id() -> u8 { 3 }
fn default_humidity_id() -> u8 { 4 }
fn default_acceleration_id() -> u8 { 5 }
fn default_orientation_id() -> u8 { 6 }

fn default_log_file_name() -> String { "transceiver.log".to_string() }
fn default_log_level() -> String { "info".to_string() }

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            cadence: Cadence::default(),
        }
    }
}

impl Default for SensorWiring {
    fn default() -> Self {
        Self {
            temperature: default_temperature_id(),
            pressure: default_pressure_id(),
            humidity: default_humidity_id(),
            acceleration: default_acceleration_id(),
            orientation: default_orientation_id(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_name: default_log_file_name(),
            level: default_log_level(),
        }
    }
}

impl SensorWiring {
    /// The table as handed to a sensor board driver
    pub fn to_map(&self) -> BTreeMap<&'static str, u8> {
        BTreeMap::from([
            ("temperature", self.temperature),
            ("pressure", self.pressure),
            ("humidity", self.humidity),
            ("acceleration", self.acceleration),
            ("orientation", self.orientation),
        ])
    }
}

impl RadioConfig {
    /// Descriptor filter built from the optional fields
    pub fn filter(&self) -> SerialDescriptorFilter {
        SerialDescriptorFilter {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            manufacturer_prefix: self.manufacturer.clone(),
            serial_number_prefix: self.serial_number.clone(),
            interface_substring: self.interface.clone(),
        }
    }

    /// Explicit device path, if one is configured
    pub fn explicit_port(&self) -> Option<&str> {
        Some(self.port.as_str()).filter(|p| !p.is_empty())
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fieldlink::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply values taken from the process environment
    ///
    /// # Arguments
    ///
    /// * `mode` - Replaces `station.mode` when set
    /// * `port` - Replaces `radio.port` when set
    pub fn with_overrides(mut self, mode: Option<String>, port: Option<String>) -> Self {
        if let Some(mode) = mode {
            self.station.mode = mode;
        }
        if let Some(port) = port {
            self.radio.port = port;
        }
        self
    }

    /// Station role selected by `station.mode`
    pub fn mode(&self) -> Mode {
        Mode::from_config(&self.station.mode)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns `Config` if any value is out of its valid range
    pub fn validate(&self) -> Result<()> {
        if self.poller.interval_ms == 0 || self.poller.interval_ms > 3_600_000 {
            return Err(FieldlinkError::Config(
                "interval_ms must be between 1 and 3600000".to_string(),
            ));
        }

        // Descriptor strings must constrain something when present
        for (name, value) in [
            ("manufacturer", &self.radio.manufacturer),
            ("serial_number", &self.radio.serial_number),
            ("interface", &self.radio.interface),
        ] {
            if matches!(value, Some(v) if v.is_empty()) {
                return Err(FieldlinkError::Config(format!(
                    "radio {} filter cannot be empty",
                    name
                )));
            }
        }

        let wiring = self.sensors.to_map();
        let mut ids: Vec<u8> = wiring.values().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != wiring.len() {
            return Err(FieldlinkError::Config(
                "sensor ids must be distinct".to_string(),
            ));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(FieldlinkError::Config(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }

        if self.logging.directory.is_some() && self.logging.file_name.is_empty() {
            return Err(FieldlinkError::Config(
                "logging file_name cannot be empty when a directory is set".to_string(),
            ));
        }

        Ok(())
    }
}
