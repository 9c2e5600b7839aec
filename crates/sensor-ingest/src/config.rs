//! Ingest configuration
//!
//! Built-in defaults, then an optional TOML file, then `INGEST_*` environment variables
//! (`__` separates nested keys, e.g. `INGEST_OXYGEN__BROADCAST_INTERVAL_MS=200`).

use config::{Config, ConfigError, Environment, File};
use data_validator::ValidationConfig;
use oxygen_protocol::OxygenSensorConfig;
use serde::{Deserialize, Serialize};
use serial_channel::ChannelConfig;
use std::path::Path;

/// Attached sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Nonin OEM III pulse oximeter
    Nonin,
    /// PyroScience FDO2 oxygen sensor
    Fdo2,
}

impl SensorKind {
    /// UART rate the device is fixed to
    pub fn default_baud_rate(self) -> u32 {
        match self {
            SensorKind::Nonin => 9_600,
            SensorKind::Fdo2 => 19_200,
        }
    }
}

/// Where bytes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Serial,
    /// A capture file, replayed once
    Replay,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub sensor: SensorKind,
    pub source: SourceKind,
    /// Serial device or replay file
    pub path: String,
    /// Defaults to the sensor's fixed rate
    pub baud_rate: Option<u32>,
    /// Bytes a replay source delivers per service pass
    pub replay_bytes_per_poll: usize,
    /// Period between service passes, standing in for the UART interrupt (µs)
    pub service_interval_us: u64,
    /// Interval between statistics records (ms), 0 disables them
    pub stats_interval_ms: u32,
    pub log_level: String,
    pub log_json: bool,
    pub channel: ChannelConfig,
    pub validation: ValidationConfig,
    pub oxygen: OxygenSensorConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sensor: SensorKind::Nonin,
            source: SourceKind::Serial,
            path: "/dev/ttyUSB0".to_string(),
            baud_rate: None,
            replay_bytes_per_poll: 8,
            service_interval_us: 100,
            stats_interval_ms: 1_000,
            log_level: "info".to_string(),
            log_json: false,
            channel: ChannelConfig::default(),
            validation: ValidationConfig::default(),
            oxygen: OxygenSensorConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Load configuration, layering `file` and the environment over the defaults
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::builder(file)?
            .add_source(
                Environment::with_prefix("INGEST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Defaults plus `file`, without the environment
    pub fn load_file(file: &Path) -> Result<Self, ConfigError> {
        Self::builder(Some(file))?.build()?.try_deserialize()
    }

    fn builder(
        file: Option<&Path>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(true));
        }
        Ok(builder)
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
            .unwrap_or_else(|| self.sensor.default_baud_rate())
    }
}
