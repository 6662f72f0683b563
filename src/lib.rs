//! tempsweep - temperature sweeps for vision question answering
//!
//! Measures how a vision-language model's per-question accuracy changes with
//! sampling temperature, then characterizes each question by that response.
//!
//! # Architecture
//!
//! ```text
//! Dataset → VQA model (per T) → Rater fan-out → AccuracyTable → Analysis → Reports
//!    ↓            ↓                   ↓               ↓             ↓          ↓
//!  JSONL     chat completions    tokio tasks     JSON store    changes +   JSON, MD,
//!  manifest   (numbered list)    per question   (accumulates)  clusters    terminal
//! ```
//!
//! Temperatures are fixed-point tenths ([`Temperature`]), so table keys,
//! thresholds and persisted JSON keys compare exactly.

pub mod analysis;
pub mod config;
pub mod experiment;
pub mod report;
pub mod store;
pub mod types;

pub use types::{ChangeType, Cluster, QuestionAccuracy, Temperature, TemperatureError};

pub use analysis::{
    analyze_changes, cluster_questions, ChangeRecord, ClusterBuckets, ClusterRecord, ClusterThresholds,
    Clustering,
};
pub use config::SweepConfig;
pub use experiment::{
    CallError, DatasetEntry, ExperimentRunner, ImageData, Rater, RatingFailurePolicy, RunSummary,
    VqaModel,
};
pub use store::{AccuracyStore, AccuracyTable, LegacyStore, LegacyTallies};
