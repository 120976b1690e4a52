//! # Field DAQ Core Library
//!
//! Acquisition core of a portable environmental field station. An operator visits a
//! sampling location, triggers readings from a set of sensors, enters a few values by
//! hand and commits the result as one row of a CSV data file. The library is headless:
//! the console binary (`main.rs`) and any other front end drive it through
//! [`session::Session`] and observe it through its watch channel.
//!
//! ## Crate Structure
//!
//! - **`acquisition`**: the orchestrator state machine and the presentation state it publishes.
//! - **`config`**: layered configuration (defaults, TOML file, `FIELD_DAQ_` environment).
//! - **`data`**: reconciliation of redundant readings and the durable record log.
//! - **`error`**: the `DaqError` enum shared by every module.
//! - **`hardware`**: the `SensorPort` capability, simulated and serial sensors, the sensor bank.
//! - **`logging`**: `tracing` subscriber setup.
//! - **`record`**: the fixed field schema and the in-progress record.
//! - **`session`**: shared, exclusive handle for front ends.

pub mod acquisition;
pub mod config;
pub mod data;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod record;
pub mod session;

pub use error::{AppResult, DaqError};
