//! Sensor Capabilities
//!
//! Every physical sensor on the device is reached through one narrow capability,
//! [`SensorPort`]: a blocking-in-spirit `measure()` transaction plus an optional one-time
//! `calibrate()`. Drivers for different chips return differently shaped readings, so the
//! shape is explicit in [`ReadingShape`] and each [`SensorRole`] declares the one shape it
//! must produce:
//!
//! | Role | Shape | Values |
//! |------|-------|--------|
//! | Thermohygrometer | Pair | temperature °C, humidity % |
//! | Barometer | Triple | pressure hPa, temperature °C, humidity % |
//! | InfraredThermometer | Scalar | surface temperature °C |
//! | LightSensor | Scalar | IR radiation W/m² |
//! | UvSensor | Scalar | UV radiation W/m² |
//! | Gps | Coordinate | latitude, longitude |
//!
//! # Design
//!
//! - Async (`#[async_trait]`) so the orchestrator can bound each call with a timeout
//! - Thread-safe (`Send + Sync`), interior mutability for driver state
//! - Drivers report failures with `anyhow::Result`; the orchestrator maps them to
//!   typed hardware errors
//!
//! ```rust,ignore
//! struct Dht22 { /* gpio handle */ }
//!
//! #[async_trait]
//! impl SensorPort for Dht22 {
//!     fn name(&self) -> &str { "DHT22" }
//!
//!     async fn measure(&self) -> Result<ReadingShape> {
//!         let (t, h) = self.read_frame().await?;
//!         Ok(ReadingShape::Pair(t, h))
//!     }
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Physical sensor slots of the field device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorRole {
    /// Dedicated temperature + humidity sensor (DHT22 class)
    Thermohygrometer,
    /// Pressure sensor with auxiliary temperature and humidity (BME280 class)
    Barometer,
    /// Contactless surface thermometer (MLX90614 class)
    InfraredThermometer,
    /// Ambient light / infrared sensor (TSL2591 class)
    LightSensor,
    /// Ultraviolet sensor (LTR390 class)
    UvSensor,
    /// Satellite position receiver
    Gps,
}

impl SensorRole {
    /// Every role in declaration order.
    pub const ALL: [SensorRole; 6] = [
        SensorRole::Thermohygrometer,
        SensorRole::Barometer,
        SensorRole::InfraredThermometer,
        SensorRole::LightSensor,
        SensorRole::UvSensor,
        SensorRole::Gps,
    ];

    /// Shape every reading from this role must have.
    pub fn expected_shape(self) -> ShapeKind {
        match self {
            SensorRole::Thermohygrometer => ShapeKind::Pair,
            SensorRole::Barometer => ShapeKind::Triple,
            SensorRole::InfraredThermometer | SensorRole::LightSensor | SensorRole::UvSensor => {
                ShapeKind::Scalar
            }
            SensorRole::Gps => ShapeKind::Coordinate,
        }
    }

    /// Name used in configuration files and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            SensorRole::Thermohygrometer => "thermohygrometer",
            SensorRole::Barometer => "barometer",
            SensorRole::InfraredThermometer => "infrared_thermometer",
            SensorRole::LightSensor => "light_sensor",
            SensorRole::UvSensor => "uv_sensor",
            SensorRole::Gps => "gps",
        }
    }
}

impl fmt::Display for SensorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        SensorRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s.trim())
            .ok_or_else(|| anyhow::anyhow!("Unknown sensor role '{}'", s))
    }
}

/// Arity of a reading, without the values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// One value.
    Scalar,
    /// Two values.
    Pair,
    /// Three values.
    Triple,
    /// Latitude and longitude.
    Coordinate,
}

impl ShapeKind {
    /// Number of numeric values carried by this shape.
    pub fn arity(self) -> usize {
        match self {
            ShapeKind::Scalar => 1,
            ShapeKind::Pair | ShapeKind::Coordinate => 2,
            ShapeKind::Triple => 3,
        }
    }
}

/// Values returned by one `measure()` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadingShape {
    /// Single-quantity sensors (infrared thermometer, light, UV).
    Scalar(f64),
    /// Temperature and humidity.
    Pair(f64, f64),
    /// Pressure, temperature and humidity.
    Triple(f64, f64, f64),
    /// GPS fix in decimal degrees.
    Coordinate {
        /// Latitude in decimal degrees.
        lat: f64,
        /// Longitude in decimal degrees.
        lon: f64,
    },
}

impl ReadingShape {
    /// Arity of this reading.
    pub fn kind(&self) -> ShapeKind {
        match self {
            ReadingShape::Scalar(_) => ShapeKind::Scalar,
            ReadingShape::Pair(..) => ShapeKind::Pair,
            ReadingShape::Triple(..) => ShapeKind::Triple,
            ReadingShape::Coordinate { .. } => ShapeKind::Coordinate,
        }
    }

    /// Numeric values in order.
    pub fn values(&self) -> Vec<f64> {
        match *self {
            ReadingShape::Scalar(a) => vec![a],
            ReadingShape::Pair(a, b) => vec![a, b],
            ReadingShape::Triple(a, b, c) => vec![a, b, c],
            ReadingShape::Coordinate { lat, lon } => vec![lat, lon],
        }
    }

    /// No value is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.values().iter().all(|v| v.is_finite())
    }

    /// Builds a reading of `kind` from exactly `kind.arity()` values.
    pub fn from_values(kind: ShapeKind, values: &[f64]) -> Option<Self> {
        match (kind, values) {
            (ShapeKind::Scalar, [a]) => Some(ReadingShape::Scalar(*a)),
            (ShapeKind::Pair, [a, b]) => Some(ReadingShape::Pair(*a, *b)),
            (ShapeKind::Triple, [a, b, c]) => Some(ReadingShape::Triple(*a, *b, *c)),
            (ShapeKind::Coordinate, [lat, lon]) => Some(ReadingShape::Coordinate {
                lat: *lat,
                lon: *lon,
            }),
            _ => None,
        }
    }
}

/// A reading tagged with its source and acquisition time. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    /// Port the values came from.
    pub sensor: SensorRole,
    /// When the values were read.
    pub timestamp: DateTime<Utc>,
    /// The values themselves.
    pub shape: ReadingShape,
}

impl RawReading {
    /// Reading stamped with the current time.
    pub fn new(sensor: SensorRole, shape: ReadingShape) -> Self {
        Self {
            sensor,
            timestamp: Utc::now(),
            shape,
        }
    }
}

/// Capability: Sensor Measurement
///
/// One physical sensor, opened once at startup and kept for the process lifetime.
///
/// # Contract
/// - `measure()` performs one hardware transaction and returns its values
/// - The shape of the returned reading is fixed per sensor
/// - Drivers doing blocking I/O should move it off the runtime (`spawn_blocking`)
///   so the caller's timeout can fire
#[async_trait]
pub trait SensorPort: Send + Sync {
    /// Driver or chip name, for logs.
    fn name(&self) -> &str;

    /// Perform one measurement.
    ///
    /// # Returns
    /// - Ok(shape) on a successful transaction
    /// - Err on bus failure or an unparseable response
    async fn measure(&self) -> Result<ReadingShape>;

    /// One-time setup before the first measurement (e.g. loading calibration words).
    ///
    /// # Default Implementation
    /// Nothing to do.
    async fn calibrate(&self) -> Result<()> {
        Ok(())
    }
}
