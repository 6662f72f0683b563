//! Contracts for the external collaborators of a sweep.
//!
//! Failures come back as a tagged [`CallError`] instead of an error string
//! inside the answer list or a silent `false`, so the runner can decide
//! whether a failure counts as an incorrect answer or is left out.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::Temperature;

/// Predicted-answer sentinel meaning "no answer"; such answers are not rated.
pub const NOT_AVAILABLE: &str = "N/A";

/// Failure of a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// Transport or HTTP-level failure
    #[error("network error: {0}")]
    Network(String),

    /// The upstream response could not be interpreted
    #[error("parse error: {0}")]
    Parse(String),

    /// The rater could not produce a verdict
    #[error("rate error: {0}")]
    Rate(String),
}

pub type CallResult<T> = Result<T, CallError>;

/// Encoded image bytes (JPEG or PNG) as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    /// MIME type used when building a data URL
    pub mime: &'static str,
}

impl ImageData {
    pub fn new(bytes: Vec<u8>, mime: &'static str) -> Self {
        Self { bytes, mime }
    }

    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "image/jpeg")
    }
}

/// One image with its index-aligned questions and golden answers.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetEntry {
    pub image_id: String,
    pub image: ImageData,
    pub questions: Vec<String>,
    pub answers: Vec<String>,
}

/// The vision-question-answering model under test.
#[async_trait]
pub trait VqaModel: Send + Sync {
    /// Answer `questions` about `image` at `temperature`.
    ///
    /// The result is index-aligned with `questions` and may be shorter when
    /// the response could only be parsed partially.
    async fn query(
        &self,
        image: &ImageData,
        questions: &[String],
        temperature: Temperature,
    ) -> CallResult<Vec<String>>;
}

/// Automated judge comparing a predicted answer to the golden one.
#[async_trait]
pub trait Rater: Send + Sync {
    async fn rate(&self, question: &str, golden_answer: &str, predicted_answer: &str) -> CallResult<bool>;
}
