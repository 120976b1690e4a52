//! Acquisition control: the orchestrator state machine and the status it publishes.

pub mod orchestrator;
pub mod status;

pub use orchestrator::{AcquisitionOrchestrator, CommitReceipt, OrchestratorOptions, SequenceReport};
pub use status::{AcquisitionState, PresentationState, PROGRESS_MAX, UNSET_DISPLAY};
