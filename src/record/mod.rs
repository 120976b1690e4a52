//! Record schema and the in-progress record.
//!
//! - [`Field`]: the fixed, ordered set of columns.
//! - [`Record`]: one row, every field present and possibly unset.
//! - [`RecordAccumulator`]: the single active record, mutated field by field and reset
//!   after a successful commit.

pub mod accumulator;
pub mod field;

pub use accumulator::{FieldValue, Record, RecordAccumulator};
pub use field::{Field, FieldSource};
