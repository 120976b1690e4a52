//! Reconciliation of redundant sensor readings.
//!
//! Two fields have redundant sources on the device: air temperature and humidity are
//! measured both by the dedicated thermohygrometer and, as auxiliary values, by the
//! barometer. Their canonical value is the arithmetic mean of the two. Every other
//! field passes its single source through. All values are rounded to two decimals,
//! the storage and display precision.

use crate::error::{AppResult, DaqError};
use crate::hardware::{RawReading, ReadingShape, SensorRole};
use crate::record::Field;

/// Magnitude above which an `f64` has no fractional digits left to round.
const ROUNDING_LIMIT: f64 = 1e15;

/// Round to the two decimals kept in records. Finite inputs stay finite.
pub fn round2(value: f64) -> f64 {
    if value.abs() >= ROUNDING_LIMIT {
        return value;
    }
    (value * 100.0).round() / 100.0
}

/// Arithmetic mean of two readings. Finite inputs stay finite.
pub fn mean(a: f64, b: f64) -> f64 {
    a / 2.0 + b / 2.0
}

/// Canonical value of one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciled {
    /// Canonical value of a single field.
    Value(f64),
    /// Both position fields come from a single GPS reading.
    Position {
        /// Latitude, rounded to 2 decimals.
        lat: f64,
        /// Longitude, rounded to 2 decimals.
        lon: f64,
    },
}

/// Combines raw readings into canonical field values.
#[derive(Debug, Default, Clone, Copy)]
pub struct Reconciler;

impl Reconciler {
    /// Sensors read to produce `field`, in call order. Empty for operator-entered fields.
    pub fn sources(field: Field) -> &'static [SensorRole] {
        match field {
            Field::AirTemp | Field::Humidity => {
                &[SensorRole::Thermohygrometer, SensorRole::Barometer]
            }
            Field::CanopyTemp => &[SensorRole::InfraredThermometer],
            Field::Pressure => &[SensorRole::Barometer],
            Field::IrRadiation => &[SensorRole::LightSensor],
            Field::UvRadiation => &[SensorRole::UvSensor],
            Field::Lat | Field::Lon => &[SensorRole::Gps],
            Field::Code | Field::WindSpeed | Field::GroundHumidity => &[],
        }
    }

    /// Canonical, rounded value of `field` from the readings of its sources.
    pub fn reconcile(&self, field: Field, readings: &[RawReading]) -> AppResult<Reconciled> {
        let value = match field {
            // thermohygrometer (temperature, humidity); barometer (pressure, temperature, humidity)
            Field::AirTemp => {
                let (primary, _) = pair(readings, SensorRole::Thermohygrometer)?;
                let (_, aux, _) = triple(readings, SensorRole::Barometer)?;
                mean(primary, aux)
            }
            Field::Humidity => {
                let (_, primary) = pair(readings, SensorRole::Thermohygrometer)?;
                let (_, _, aux) = triple(readings, SensorRole::Barometer)?;
                mean(primary, aux)
            }
            Field::Pressure => triple(readings, SensorRole::Barometer)?.0,
            Field::CanopyTemp => scalar(readings, SensorRole::InfraredThermometer)?,
            Field::IrRadiation => scalar(readings, SensorRole::LightSensor)?,
            Field::UvRadiation => scalar(readings, SensorRole::UvSensor)?,
            Field::Lat | Field::Lon => {
                let (lat, lon) = coordinate(readings)?;
                return Ok(Reconciled::Position {
                    lat: round2(lat),
                    lon: round2(lon),
                });
            }
            Field::Code | Field::WindSpeed | Field::GroundHumidity => {
                return Err(DaqError::NotMeasurable(field))
            }
        };
        Ok(Reconciled::Value(round2(value)))
    }
}

fn reading_of(readings: &[RawReading], role: SensorRole) -> AppResult<&ReadingShape> {
    readings
        .iter()
        .find(|r| r.sensor == role)
        .map(|r| &r.shape)
        .ok_or_else(|| DaqError::HardwareRead {
            sensor: role,
            message: "no reading available".to_string(),
        })
}

fn unexpected(role: SensorRole, shape: &ReadingShape) -> DaqError {
    DaqError::HardwareRead {
        sensor: role,
        message: format!(
            "unexpected reading shape {:?}, expected {:?}",
            shape.kind(),
            role.expected_shape()
        ),
    }
}

fn scalar(readings: &[RawReading], role: SensorRole) -> AppResult<f64> {
    match reading_of(readings, role)? {
        ReadingShape::Scalar(v) => Ok(*v),
        other => Err(unexpected(role, other)),
    }
}

fn pair(readings: &[RawReading], role: SensorRole) -> AppResult<(f64, f64)> {
    match reading_of(readings, role)? {
        ReadingShape::Pair(a, b) => Ok((*a, *b)),
        other => Err(unexpected(role, other)),
    }
}

fn triple(readings: &[RawReading], role: SensorRole) -> AppResult<(f64, f64, f64)> {
    match reading_of(readings, role)? {
        ReadingShape::Triple(a, b, c) => Ok((*a, *b, *c)),
        other => Err(unexpected(role, other)),
    }
}

fn coordinate(readings: &[RawReading]) -> AppResult<(f64, f64)> {
    match reading_of(readings, SensorRole::Gps)? {
        ReadingShape::Coordinate { lat, lon } => Ok((*lat, *lon)),
        other => Err(unexpected(SensorRole::Gps, other)),
    }
}
