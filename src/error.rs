//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the whole acquisition
//! pipeline. Using the `thiserror` crate, it provides a centralized and consistent way to
//! handle the failures that can occur between the sensor hardware and the data file.
//!
//! ## Error Hierarchy
//!
//! `DaqError` consolidates the following sources:
//!
//! - **`HardwareRead`**: A sensor transaction failed or returned a value that could not be
//!   interpreted (wrong reading shape, non-finite number).
//! - **`HardwareTimeout`**: A sensor transaction did not complete within the configured bound.
//! - **`Persistence`**: Appending a record to the data file failed. The in-progress record is
//!   kept so the commit can be retried.
//! - **`Config`** / **`Configuration`**: Parse failures from `figment` and semantic errors
//!   caught by validation.
//! - **`AcquisitionBusy`**: A request arrived while another one was still in flight.
//!
//! Hardware errors abort only the field being acquired; they never reset the record.

use std::time::Duration;

use thiserror::Error;

use crate::hardware::SensorRole;
use crate::record::Field;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Every failure the acquisition pipeline reports.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Sensor transaction failed or returned an unusable value.
    #[error("Hardware read error on {sensor}: {message}")]
    HardwareRead {
        /// Failing sensor.
        sensor: SensorRole,
        /// Driver error text.
        message: String,
    },

    /// Sensor transaction exceeded the configured bound.
    #[error("Hardware timeout on {sensor} after {}ms", timeout.as_millis())]
    HardwareTimeout {
        /// Sensor that did not answer.
        sensor: SensorRole,
        /// Bound that elapsed.
        timeout: Duration,
    },

    /// No port is installed for the role a field needs.
    #[error("Sensor not installed: {0}")]
    SensorNotInstalled(SensorRole),

    /// Operator fields have no sensor.
    #[error("Field {0} is entered by the operator and cannot be measured")]
    NotMeasurable(Field),

    /// Field name that matches no column.
    #[error("Unknown field: '{0}'")]
    UnknownField(String),

    /// Appending to the data file failed; the record is kept.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Wraps `std::io::Error` outside the append path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration sources could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Parsed configuration failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Another request holds the session.
    #[error("Another acquisition or commit is already in progress")]
    AcquisitionBusy,
}

impl DaqError {
    /// Whether the operator can simply retry the same request.
    pub fn is_recoverable(&self) -> bool {
        match self {
            DaqError::HardwareRead { .. }
            | DaqError::HardwareTimeout { .. }
            | DaqError::Persistence(_)
            | DaqError::Io(_)
            | DaqError::AcquisitionBusy => true,
            DaqError::SensorNotInstalled(_)
            | DaqError::NotMeasurable(_)
            | DaqError::UnknownField(_)
            | DaqError::Config(_)
            | DaqError::Configuration(_) => false,
        }
    }

    /// Sensor that produced this error, if it came from hardware.
    pub fn sensor(&self) -> Option<SensorRole> {
        match self {
            DaqError::HardwareRead { sensor, .. }
            | DaqError::HardwareTimeout { sensor, .. }
            | DaqError::SensorNotInstalled(sensor) => Some(*sensor),
            _ => None,
        }
    }
}

impl From<figment::Error> for DaqError {
    fn from(value: figment::Error) -> Self {
        DaqError::Config(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_errors_are_recoverable() {
        let read = DaqError::HardwareRead {
            sensor: SensorRole::Barometer,
            message: "i2c nack".into(),
        };
        let timeout = DaqError::HardwareTimeout {
            sensor: SensorRole::Gps,
            timeout: Duration::from_millis(250),
        };
        assert!(read.is_recoverable());
        assert!(timeout.is_recoverable());
        assert_eq!(read.sensor(), Some(SensorRole::Barometer));
        assert_eq!(timeout.to_string(), "Hardware timeout on gps after 250ms");
    }

    #[test]
    fn configuration_errors_are_not_recoverable() {
        let err = DaqError::Configuration("sensor_timeout_ms must be positive".into());
        assert!(!err.is_recoverable());
        assert!(err.sensor().is_none());
        assert!(!DaqError::NotMeasurable(Field::Code).is_recoverable());
    }

    #[test]
    fn persistence_error_message() {
        let err = DaqError::Persistence("disk full".into());
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "Persistence error: disk full");
    }
}
