//! Legacy per-question aggregate (`accuracy_data.json`).
//!
//! Counts verdicts per question regardless of temperature and keeps the
//! (golden, predicted) pairs the rater rejected. Clustering never reads it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default file name for the legacy aggregate.
pub const ACCURACY_DATA_FILE: &str = "accuracy_data.json";

/// Temperature-independent tally for one question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionTally {
    pub true_positives: u64,
    pub false_positives: u64,
    /// (golden answer, predicted answer) for every rejected prediction
    #[serde(default)]
    pub different_answers: Vec<(String, String)>,
}

impl QuestionTally {
    pub fn new() -> Self {
        Self::default()
    }
}

/// All legacy tallies, keyed by question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyTallies {
    questions: BTreeMap<String, QuestionTally>,
}

impl LegacyTallies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, question: &str) -> Option<&QuestionTally> {
        self.questions.get(question)
    }

    /// Fold one verdict in; rejected predictions keep their answer pair.
    pub fn record(&mut self, question: &str, golden: &str, predicted: &str, correct: bool) {
        let tally = self
            .questions
            .entry(question.to_string())
            .or_insert_with(QuestionTally::new);

        if correct {
            tally.true_positives += 1;
        } else {
            tally.false_positives += 1;
            tally
                .different_answers
                .push((golden.to_string(), predicted.to_string()));
        }
    }
}

/// Loads and saves [`LegacyTallies`] at a fixed path.
#[derive(Debug, Clone)]
pub struct LegacyStore {
    path: PathBuf,
}

impl LegacyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(ACCURACY_DATA_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absent file means no tallies yet.
    pub fn load(&self) -> Result<LegacyTallies> {
        if !self.path.exists() {
            return Ok(LegacyTallies::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    pub fn save(&self, tallies: &LegacyTallies) -> Result<()> {
        let json = serde_json::to_string_pretty(tallies).context("Failed to serialize legacy tallies")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}
