//! Serial Line Sensor Front-End Driver
//!
//! Talks to a sensor front-end that speaks the ASCII line protocol described in
//! [`crate::hardware::line_protocol`].
//!
//! Protocol Overview:
//! - Baud: configurable (default 9600), 8N1, no flow control
//! - Terminator: LF (\n)
//! - Query: configurable command (default `READ`)
//! - Response: comma-separated values matching the sensor role's shape
//!
//! # Example Usage
//!
//! ```no_run
//! use field_daq::hardware::serial_line::SerialLineSensor;
//! use field_daq::hardware::{SensorPort, SensorRole};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let barometer = SerialLineSensor::new(SensorRole::Barometer, "/dev/ttyUSB0", 9600)?;
//!     barometer.calibrate().await?;
//!     println!("{:?}", barometer.measure().await?);
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

use crate::hardware::capabilities::{ReadingShape, SensorPort, SensorRole};
use crate::hardware::line_protocol::{exchange_line, parse_reading_line};

/// Driver for a line-protocol sensor front-end on a serial port
pub struct SerialLineSensor {
    role: SensorRole,
    name: String,
    /// Serial port protected by Mutex for exclusive access
    port: Mutex<BufReader<SerialStream>>,
    query: String,
    calibrate_command: Option<String>,
    /// Settling delay after commands that produce no reply
    settle: Duration,
}

impl SerialLineSensor {
    /// Open the serial port of a sensor front-end
    ///
    /// # Errors
    /// Returns error if the serial port cannot be opened
    pub fn new(role: SensorRole, port_path: &str, baud_rate: u32) -> Result<Self> {
        let port = tokio_serial::new(port_path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .with_context(|| format!("Failed to open {} serial port {}", role, port_path))?;

        Ok(Self {
            role,
            name: format!("{}@{}", role, port_path),
            port: Mutex::new(BufReader::new(port)),
            query: "READ".to_string(),
            calibrate_command: None,
            settle: Duration::from_millis(50),
        })
    }

    /// Override the query command.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Command sent once by `calibrate()`; the front-end does not reply to it.
    pub fn with_calibrate_command(mut self, command: impl Into<String>) -> Self {
        self.calibrate_command = Some(command.into());
        self
    }

    /// Send query and read one response line
    ///
    /// Input left over from an abandoned query is flushed first, both in the
    /// driver's buffer and in the OS receive queue.
    async fn query_line(&self) -> Result<String> {
        let mut port = self.port.lock().await;

        port.get_ref()
            .clear(ClearBuffer::Input)
            .with_context(|| format!("{} input flush failed", self.name))?;
        exchange_line(&mut *port, &self.query)
            .await
            .with_context(|| format!("{} query failed", self.name))
    }
}

#[async_trait]
impl SensorPort for SerialLineSensor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn measure(&self) -> Result<ReadingShape> {
        let line = self.query_line().await?;
        parse_reading_line(&line, self.role.expected_shape())
            .with_context(|| format!("{} returned an unusable reading", self.name))
    }

    async fn calibrate(&self) -> Result<()> {
        let Some(command) = &self.calibrate_command else {
            return Ok(());
        };

        let mut port = self.port.lock().await;
        port.get_mut()
            .write_all(format!("{}\n", command).as_bytes())
            .await
            .with_context(|| format!("{} calibration command failed", self.name))?;

        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}
