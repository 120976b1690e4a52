//! Data reconciliation and storage modules.
pub mod reconcile;
pub mod storage;

pub use reconcile::{Reconciled, Reconciler};
pub use storage::{CsvRecordLog, PersistenceWriter};
