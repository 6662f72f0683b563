//! `final_results.json`: the table plus its change analysis.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::ChangeRecord;
use crate::store::AccuracyTable;

pub const FINAL_RESULTS_FILE: &str = "final_results.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalResults {
    #[serde(default)]
    pub temperature_results: AccuracyTable,
    /// Omitted from the file when empty
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub analysis: BTreeMap<String, ChangeRecord>,
}

impl FinalResults {
    pub fn new(temperature_results: AccuracyTable, analysis: BTreeMap<String, ChangeRecord>) -> Self {
        Self {
            temperature_results,
            analysis,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.temperature_results.is_empty() && self.analysis.is_empty()
    }
}

/// File-backed [`FinalResults`].
#[derive(Debug, Clone)]
pub struct FinalResultsStore {
    path: PathBuf,
}

impl FinalResultsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(FINAL_RESULTS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file yields empty results.
    pub fn load(&self) -> Result<FinalResults> {
        if !self.path.exists() {
            tracing::debug!("No final results at {}", self.path.display());
            return Ok(FinalResults::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    pub fn save(&self, results: &FinalResults) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(results).context("Failed to serialize final results")?;
        std::fs::write(&self.path, json).with_context(|| format!("Failed to write {}", self.path.display()))?;
        tracing::info!("Saved final results to {}", self.path.display());
        Ok(())
    }
}
