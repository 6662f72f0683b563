//! Accuracy-vs-temperature analysis.
//!
//! Both analyses are pure functions of an [`AccuracyTable`](crate::store::AccuracyTable)
//! snapshot and own no state of their own:
//!
//! - [`clustering`]: regression statistics per question and one of five
//!   behavioral clusters
//! - [`changes`]: ordered accuracy deltas between adjacent temperatures

pub mod changes;
pub mod clustering;
pub mod stats;

pub use changes::{analyze_changes, AccuracyPoint, ChangeEntry, ChangeRecord};
pub use clustering::{cluster_questions, ClusterBuckets, ClusterRecord, ClusterThresholds, Clustering};
pub use stats::{linear_regression_slope, mean, population_std_dev, SeriesStats};
