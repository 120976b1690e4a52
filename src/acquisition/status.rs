//! Observable acquisition status for the presentation layer.
//!
//! Published through a `tokio::sync::watch` channel: any number of subscribers (a GUI,
//! a console printer, tests) see the latest state without polling the orchestrator.
//! Progress is cosmetic. It starts counting only after the sensor call has returned,
//! so it reports post-read notification, never measurement latency.

use std::fmt;

use crate::hardware::SensorRole;
use crate::record::{Field, FieldValue};

/// Display string of a field with no value.
pub const UNSET_DISPLAY: &str = "-";

/// Upper bound of the progress counter.
pub const PROGRESS_MAX: u8 = 100;

/// Where the orchestrator is within one field acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionState {
    /// Waiting for a request.
    #[default]
    Idle,
    /// Blocked on a sensor transaction.
    Reading {
        /// Field being acquired.
        field: Field,
        /// Sensor the orchestrator is waiting on.
        sensor: SensorRole,
    },
    /// Combining raw readings.
    Reconciling {
        /// Field being acquired.
        field: Field,
    },
    /// Canonical value written to the record.
    Updated {
        /// Field that was written.
        field: Field,
    },
    /// Appending the record to the data file.
    Committing,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionState::Idle => f.write_str("idle"),
            AcquisitionState::Reading { field, sensor } => {
                write!(f, "reading {sensor} for {field}")
            }
            AcquisitionState::Reconciling { field } => write!(f, "reconciling {field}"),
            AcquisitionState::Updated { field } => write!(f, "updated {field}"),
            AcquisitionState::Committing => f.write_str("committing"),
        }
    }
}

/// Everything a presentation layer shows.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationState {
    /// Current step of the pipeline.
    pub state: AcquisitionState,
    display: [String; Field::COUNT],
    progress: [u8; Field::COUNT],
}

impl Default for PresentationState {
    fn default() -> Self {
        Self {
            state: AcquisitionState::Idle,
            display: std::array::from_fn(|_| UNSET_DISPLAY.to_string()),
            progress: [0; Field::COUNT],
        }
    }
}

impl PresentationState {
    /// Display string: two decimals for numbers, raw text, or `"-"` when unset.
    pub fn display(&self, field: Field) -> &str {
        &self.display[field.index()]
    }

    /// Progress of the last acquisition of `field`, 0 to 100.
    pub fn progress(&self, field: Field) -> u8 {
        self.progress[field.index()]
    }

    pub(crate) fn show(&mut self, field: Field, value: Option<&FieldValue>) {
        self.display[field.index()] = value.map_or_else(|| UNSET_DISPLAY.to_string(), |v| v.to_string());
    }

    pub(crate) fn set_progress(&mut self, field: Field, percent: u8) {
        self.progress[field.index()] = percent.min(PROGRESS_MAX);
    }

    /// Formatted line such as `Air temperature: 21.00 °C`.
    pub fn describe(&self, field: Field) -> String {
        match field.unit() {
            Some(unit) => format!("{}: {} {}", field.label(), self.display(field), unit),
            None => format!("{}: {}", field.label(), self.display(field)),
        }
    }
}
