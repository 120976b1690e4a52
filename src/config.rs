//! Configuration System using Figment
//!
//! This module provides strongly-typed configuration loading for the field application.
//! Configuration is loaded from:
//! 1. a TOML file (base configuration, `config/field_daq.toml` by default)
//! 2. Environment variables (prefixed with FIELD_DAQ_, nested keys split on `__`)
//!
//! # Example
//! ```no_run
//! use field_daq::config::FieldDaqConfig;
//!
//! let config = FieldDaqConfig::load()?;
//! config.validate()?;
//! println!("Application: {}", config.application.name);
//! # Ok::<(), field_daq::error::DaqError>(())
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, DaqError};
use crate::hardware::SensorRole;
use crate::logging::OutputFormat;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/field_daq.toml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDaqConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Acquisition pipeline settings
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// Data file settings
    pub storage: StorageConfig,
    /// Sensor definitions, one per role
    #[serde(default)]
    pub sensors: Vec<SensorDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: OutputFormat,
}

/// Acquisition pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Upper bound for a single sensor transaction, in milliseconds
    #[serde(default = "default_sensor_timeout")]
    pub sensor_timeout_ms: u64,
    /// Read the GPS when a record is committed
    #[serde(default = "default_true")]
    pub position_on_commit: bool,
}

/// Data file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Delimited text file records are appended to
    pub output_path: PathBuf,
    /// Create the file with its header row if it does not exist yet
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
}

/// Which driver backs a sensor role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorDriver {
    /// In-process simulation
    Simulated,
    /// ASCII line-protocol front-end on a serial port
    SerialLine,
}

/// Sensor definition in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorDefinition {
    /// Sensor slot this definition fills
    pub role: SensorRole,
    /// Driver type
    pub driver: SensorDriver,
    /// Whether this sensor is installed
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Serial port path (serial_line driver)
    #[serde(default)]
    pub port: Option<String>,
    /// Serial baud rate (serial_line driver)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Query command override (serial_line driver)
    #[serde(default)]
    pub query: Option<String>,
    /// One-time calibration command (serial_line driver)
    #[serde(default)]
    pub calibrate_command: Option<String>,
    /// Baseline values (simulated driver), in the role's shape order
    #[serde(default)]
    pub values: Vec<f64>,
    /// Random jitter amplitude (simulated driver)
    #[serde(default)]
    pub jitter: f64,
}

// Default value functions
fn default_sensor_timeout() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_baud_rate() -> u32 {
    9600
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sensor_timeout_ms: default_sensor_timeout(),
            position_on_commit: true,
        }
    }
}

impl SensorDefinition {
    /// Simulated sensor with the given baseline values.
    pub fn simulated(role: SensorRole, values: Vec<f64>) -> Self {
        Self {
            role,
            driver: SensorDriver::Simulated,
            enabled: true,
            port: None,
            baud_rate: default_baud_rate(),
            query: None,
            calibrate_command: None,
            values,
            jitter: 0.0,
        }
    }
}

impl Default for FieldDaqConfig {
    /// Bench configuration: every role simulated, data written to `field_data.csv`.
    fn default() -> Self {
        Self {
            application: ApplicationConfig {
                name: "Field DAQ".to_string(),
                log_level: "info".to_string(),
                log_format: OutputFormat::default(),
            },
            acquisition: AcquisitionConfig::default(),
            storage: StorageConfig {
                output_path: PathBuf::from("field_data.csv"),
                create_if_missing: true,
            },
            sensors: vec![
                SensorDefinition::simulated(SensorRole::Thermohygrometer, vec![20.0, 55.0]),
                SensorDefinition::simulated(SensorRole::Barometer, vec![1013.25, 21.0, 53.0]),
                SensorDefinition::simulated(SensorRole::InfraredThermometer, vec![18.5]),
                SensorDefinition::simulated(SensorRole::LightSensor, vec![310.0]),
                SensorDefinition::simulated(SensorRole::UvSensor, vec![24.0]),
                SensorDefinition::simulated(SensorRole::Gps, vec![45.4642, 9.19]),
            ],
        }
    }
}

impl FieldDaqConfig {
    /// Load configuration from the default file and environment variables
    ///
    /// Environment variables can override configuration with prefix FIELD_DAQ_
    /// Example: FIELD_DAQ_ACQUISITION__SENSOR_TIMEOUT_MS=2000
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::figment(path.as_ref()).extract().map_err(DaqError::from)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("FIELD_DAQ_").split("__"))
    }

    /// Defaults overlaid with an optional file and the environment.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> AppResult<Self> {
        let base = Figment::from(Serialized::defaults(FieldDaqConfig::default()));
        let figment = match path {
            Some(path) => base.merge(Toml::file(path.as_ref())),
            None => base,
        };
        figment
            .merge(Env::prefixed("FIELD_DAQ_").split("__"))
            .extract()
            .map_err(DaqError::from)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.acquisition.sensor_timeout_ms == 0 {
            return Err(DaqError::Configuration(
                "sensor_timeout_ms must be positive".to_string(),
            ));
        }

        if self.storage.output_path.as_os_str().is_empty() {
            return Err(DaqError::Configuration(
                "storage.output_path must not be empty".to_string(),
            ));
        }

        let mut roles = HashSet::new();
        for sensor in &self.sensors {
            if !roles.insert(sensor.role) {
                return Err(DaqError::Configuration(format!(
                    "Duplicate sensor role: {}",
                    sensor.role
                )));
            }

            match sensor.driver {
                SensorDriver::SerialLine => {
                    if sensor.port.as_deref().map_or(true, str::is_empty) {
                        return Err(DaqError::Configuration(format!(
                            "Sensor {} uses serial_line but has no port",
                            sensor.role
                        )));
                    }
                }
                SensorDriver::Simulated => {
                    let arity = sensor.role.expected_shape().arity();
                    if sensor.values.len() != arity {
                        return Err(DaqError::Configuration(format!(
                            "Simulated sensor {} needs {} value(s), got {}",
                            sensor.role,
                            arity,
                            sensor.values.len()
                        )));
                    }
                    if sensor.values.iter().any(|v| !v.is_finite()) || !sensor.jitter.is_finite()
                    {
                        return Err(DaqError::Configuration(format!(
                            "Simulated sensor {} has non-finite values",
                            sensor.role
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Bound applied to every sensor transaction.
    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition.sensor_timeout_ms)
    }

    /// Get all installed sensors
    pub fn enabled_sensors(&self) -> Vec<&SensorDefinition> {
        self.sensors.iter().filter(|sensor| sensor.enabled).collect()
    }
}
