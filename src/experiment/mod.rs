//! Temperature sweep experiment.
//!
//! ```text
//! for T in temperatures:                 (sequential)
//!   for entry in dataset:                (sequential)
//!     answers = vqa.query(image, questions, T)
//!     spawn rater.rate(q, golden, answer) for each aligned pair; await all
//!     table.record_observation(T, q, verdict) for each verdict
//!   table.finalize_temperature(T)
//! store.save(table)
//! ```
//!
//! Only the rating fan-out inside a single entry runs concurrently.
//! The model under test and the rater are collaborators behind traits; the
//! OpenAI-compatible implementations live in [`openai`].

pub mod collaborators;
pub mod dataset;
pub mod openai;
pub mod runner;

pub use collaborators::{CallError, CallResult, DatasetEntry, ImageData, Rater, VqaModel, NOT_AVAILABLE};
pub use dataset::{load_manifest, DatasetError};
pub use openai::{OpenAiClient, OpenAiRater, OpenAiVqaModel, CREATIVITY_CLUSTERS};
pub use runner::{ExperimentRunner, RatingFailurePolicy, RunSummary};
