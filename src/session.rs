//! Shared handle to one acquisition session.
//!
//! A [`Session`] wraps the orchestrator so that a presentation layer (console, GUI,
//! remote control) can hold clones of it on several tasks. Requests are exclusive:
//! while an acquisition or commit runs, any other request fails immediately with
//! [`DaqError::AcquisitionBusy`] instead of queueing behind it.
//!
//! ## Functionality
//!
//! - **`acquire` / `acquire_all`**: measure one field, or every environmental field in order.
//! - **`cancel`**: withdraw a running "acquire all" at the next field boundary.
//! - **`enter_text`**: operator-entered fields.
//! - **`commit` / `reset`**: persist or discard the in-progress record.
//! - **`subscribe`**: watch display values, progress and state without locking.

use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::acquisition::{
    AcquisitionOrchestrator, CommitReceipt, PresentationState, SequenceReport,
};
use crate::config::FieldDaqConfig;
use crate::data::Reconciled;
use crate::error::{AppResult, DaqError};
use crate::record::{Field, Record};

/// Cloneable handle to one orchestrator; every request is exclusive.
#[derive(Clone)]
pub struct Session {
    orchestrator: Arc<Mutex<AcquisitionOrchestrator>>,
    cancel: Arc<watch::Sender<bool>>,
    status: watch::Receiver<PresentationState>,
}

impl Session {
    /// Wrap an already configured orchestrator.
    pub fn new(orchestrator: AcquisitionOrchestrator) -> Self {
        let status = orchestrator.subscribe();
        let (cancel, _) = watch::channel(false);
        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            cancel: Arc::new(cancel),
            status,
        }
    }

    /// Open the configured sensors and data file, then calibrate every sensor once.
    pub async fn start(config: &FieldDaqConfig) -> AppResult<Self> {
        let orchestrator = AcquisitionOrchestrator::from_config(config)?;
        orchestrator.calibrate_sensors().await?;
        info!(sensors = config.enabled_sensors().len(), "Session started");
        Ok(Self::new(orchestrator))
    }

    fn exclusive(&self) -> AppResult<MutexGuard<'_, AcquisitionOrchestrator>> {
        self.orchestrator.try_lock().map_err(|_| {
            debug!("Request rejected, session busy");
            DaqError::AcquisitionBusy
        })
    }

    /// Measure one field and write its canonical value to the record.
    pub async fn acquire(&self, field: Field) -> AppResult<Reconciled> {
        let mut orchestrator = self.exclusive()?;
        orchestrator.acquire(field).await
    }

    /// Run the full environmental sequence. A cancel issued before this call is ignored.
    pub async fn acquire_all(&self) -> AppResult<SequenceReport> {
        let mut orchestrator = self.exclusive()?;
        self.cancel.send_replace(false);
        let cancel = self.cancel.subscribe();
        Ok(orchestrator.acquire_all(Some(&cancel)).await)
    }

    /// Ask a running "acquire all" to stop before its next field.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Store operator text for `field`, replacing any previous value.
    pub fn enter_text(&self, field: Field, text: impl Into<String>) -> AppResult<()> {
        self.exclusive()?.enter_text(field, text);
        Ok(())
    }

    /// Append the in-progress record to the data file and start a new one.
    pub async fn commit(&self) -> AppResult<CommitReceipt> {
        let mut orchestrator = self.exclusive()?;
        orchestrator.commit().await
    }

    /// Discard the in-progress record without persisting it.
    pub fn reset(&self) -> AppResult<()> {
        self.exclusive()?.reset();
        Ok(())
    }

    /// Copy of the in-progress record.
    pub fn snapshot(&self) -> AppResult<Record> {
        Ok(self.exclusive()?.snapshot())
    }

    /// Receiver for every published presentation state.
    pub fn subscribe(&self) -> watch::Receiver<PresentationState> {
        self.status.clone()
    }

    /// Latest published presentation state. Never blocks on a running acquisition.
    pub fn presentation(&self) -> PresentationState {
        self.status.borrow().clone()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.status.borrow().state)
            .field("busy", &self.orchestrator.try_lock().is_err())
            .finish()
    }
}
