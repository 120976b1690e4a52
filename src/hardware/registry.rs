//! Sensor Bank
//!
//! Owns the sensor ports of the field device, one per [`SensorRole`]. Ports are opened
//! once at startup and live as long as the acquisition orchestrator that owns the bank;
//! they are never re-created per reading.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use field_daq::hardware::{SensorBank, SensorRole, SimulatedSensor, ReadingShape};
//!
//! let mut bank = SensorBank::new();
//! bank.install(
//!     SensorRole::Barometer,
//!     SimulatedSensor::new("BME280", ReadingShape::Triple(1013.2, 21.0, 50.0)),
//! );
//! bank.calibrate_all().await?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{FieldDaqConfig, SensorDefinition, SensorDriver};
use crate::error::{AppResult, DaqError};
use crate::hardware::capabilities::{ReadingShape, SensorPort, SensorRole};
use crate::hardware::mock::SimulatedSensor;

/// Installed sensor ports, keyed by role
#[derive(Default)]
pub struct SensorBank {
    ports: BTreeMap<SensorRole, Arc<dyn SensorPort>>,
}

impl SensorBank {
    /// Bank with no ports installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the port for `role`.
    pub fn install<P>(&mut self, role: SensorRole, port: P) -> &mut Self
    where
        P: SensorPort + 'static,
    {
        self.ports.insert(role, Arc::new(port));
        self
    }

    /// Install an already shared port, e.g. one the caller also inspects.
    pub fn install_shared(&mut self, role: SensorRole, port: Arc<dyn SensorPort>) -> &mut Self {
        self.ports.insert(role, port);
        self
    }

    /// Port installed for `role`, if any.
    pub fn get(&self, role: SensorRole) -> Option<&Arc<dyn SensorPort>> {
        self.ports.get(&role)
    }

    /// Whether a port is installed for `role`.
    pub fn is_installed(&self, role: SensorRole) -> bool {
        self.ports.contains_key(&role)
    }

    /// Installed roles in declaration order.
    pub fn roles(&self) -> Vec<SensorRole> {
        self.ports.keys().copied().collect()
    }

    /// Run the one-time `calibrate()` of every installed port.
    ///
    /// Stops at the first failure; the caller decides whether that is fatal.
    pub async fn calibrate_all(&self) -> AppResult<()> {
        for (role, port) in &self.ports {
            port.calibrate()
                .await
                .map_err(|e| DaqError::HardwareRead {
                    sensor: *role,
                    message: format!("calibration of {} failed: {:#}", port.name(), e),
                })?;
            info!(sensor = %role, driver = port.name(), "Sensor calibrated");
        }
        Ok(())
    }
}

impl std::fmt::Debug for SensorBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.ports.iter().map(|(role, port)| (role, port.name())))
            .finish()
    }
}

/// Build the sensor bank described by the configuration.
///
/// Disabled sensors are skipped; their fields fail with `SensorNotInstalled` when requested.
pub fn build_sensor_bank(config: &FieldDaqConfig) -> Result<SensorBank> {
    let mut bank = SensorBank::new();
    for definition in config.enabled_sensors() {
        let port = open_sensor(definition)?;
        bank.install_shared(definition.role, port);
    }

    for role in SensorRole::ALL {
        if !bank.is_installed(role) {
            warn!(sensor = %role, "No sensor installed for role");
        }
    }
    Ok(bank)
}

fn open_sensor(definition: &SensorDefinition) -> Result<Arc<dyn SensorPort>> {
    match definition.driver {
        SensorDriver::Simulated => {
            let kind = definition.role.expected_shape();
            let baseline = ReadingShape::from_values(kind, &definition.values).with_context(|| {
                format!(
                    "Simulated {} needs {} value(s)",
                    definition.role,
                    kind.arity()
                )
            })?;
            let sensor = SimulatedSensor::new(format!("simulated {}", definition.role), baseline)
                .with_jitter(definition.jitter);
            Ok(Arc::new(sensor))
        }
        SensorDriver::SerialLine => open_serial_sensor(definition),
    }
}

#[cfg(feature = "tokio_serial")]
fn open_serial_sensor(definition: &SensorDefinition) -> Result<Arc<dyn SensorPort>> {
    use crate::hardware::serial_line::SerialLineSensor;

    let port = definition
        .port
        .as_deref()
        .with_context(|| format!("Sensor {} has no serial port", definition.role))?;
    let mut sensor = SerialLineSensor::new(definition.role, port, definition.baud_rate)?;
    if let Some(query) = &definition.query {
        sensor = sensor.with_query(query.clone());
    }
    if let Some(command) = &definition.calibrate_command {
        sensor = sensor.with_calibrate_command(command.clone());
    }
    Ok(Arc::new(sensor))
}

#[cfg(not(feature = "tokio_serial"))]
fn open_serial_sensor(definition: &SensorDefinition) -> Result<Arc<dyn SensorPort>> {
    anyhow::bail!(
        "Sensor {} uses the serial_line driver. Please build with --features tokio_serial",
        definition.role
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_bank_from_default_config() {
        let config = FieldDaqConfig::default();
        let bank = build_sensor_bank(&config).unwrap();
        assert_eq!(bank.roles(), SensorRole::ALL.to_vec());

        let barometer = bank.get(SensorRole::Barometer).unwrap();
        assert_eq!(
            barometer.measure().await.unwrap(),
            ReadingShape::Triple(1013.25, 21.0, 53.0)
        );
    }

    #[test]
    fn skips_disabled_sensors() {
        let mut config = FieldDaqConfig::default();
        config.sensors.retain(|s| s.role != SensorRole::Gps);
        let bank = build_sensor_bank(&config).unwrap();
        assert!(!bank.is_installed(SensorRole::Gps));
    }

    #[cfg(not(feature = "tokio_serial"))]
    #[test]
    fn serial_driver_requires_feature() {
        let mut config = FieldDaqConfig::default();
        config.sensors[0].driver = SensorDriver::SerialLine;
        config.sensors[0].port = Some("/dev/ttyUSB0".into());
        let err = build_sensor_bank(&config).unwrap_err();
        assert!(err.to_string().contains("--features tokio_serial"));
    }

    #[tokio::test]
    async fn calibrate_all_reports_failing_sensor() {
        let mut bank = SensorBank::new();
        bank.install(
            SensorRole::UvSensor,
            SimulatedSensor::new("LTR390", ReadingShape::Scalar(1.0)),
        )
        .install(
            SensorRole::Barometer,
            SimulatedSensor::new("BME280", ReadingShape::Triple(1.0, 2.0, 3.0))
                .with_calibration_failure("no trim data"),
        );

        let err = bank.calibrate_all().await.unwrap_err();
        assert_eq!(err.sensor(), Some(SensorRole::Barometer));
        assert!(err.to_string().contains("no trim data"));
    }
}
