//! Persistent accuracy storage.
//!
//! The temperature table is the single source of truth for a sweep. It
//! accumulates across runs: re-running a temperature adds to its counters
//! instead of replacing them, so experiments can be resumed.

mod legacy;
mod table;

pub use legacy::{LegacyStore, LegacyTallies, QuestionTally, ACCURACY_DATA_FILE};
pub use table::{AccuracyStore, AccuracyTable, TableStats, TEMPERATURE_RESULTS_FILE};
