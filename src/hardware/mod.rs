//! Sensor hardware layer
//!
//! - [`capabilities`]: the `SensorPort` capability, reading shapes and sensor roles
//! - [`registry`]: the bank of installed ports and its construction from configuration
//! - [`mock`]: simulated sensors for tests and bench runs
//! - [`line_protocol`]: parsing of ASCII front-end responses
//! - `serial_line`: serial front-end driver (feature `tokio_serial`)

pub mod capabilities;
pub mod line_protocol;
pub mod mock;
pub mod registry;
#[cfg(feature = "tokio_serial")]
pub mod serial_line;

pub use capabilities::{RawReading, ReadingShape, SensorPort, SensorRole, ShapeKind};
pub use mock::SimulatedSensor;
pub use registry::{build_sensor_bank, SensorBank};
