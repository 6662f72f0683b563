//! Sweep configuration from `tempsweep.toml`.
//!
//! Every key is optional; anything absent falls back to the defaults below.
//!
//! ## Example
//!
//! ```toml
//! temperatures = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0]
//! dataset = "okvqa/manifest.jsonl"
//! num-images = 1000
//! vqa-model = "gpt-4o"
//! rater-model = "gpt-4o"
//! rating-failures = "exclude"
//!
//! [clustering]
//! robust-std = 0.01
//! mid-min = 0.4
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::analysis::ClusterThresholds;
use crate::experiment::openai::DEFAULT_API_BASE;
use crate::experiment::RatingFailurePolicy;
use crate::types::Temperature;

pub const CONFIG_FILE: &str = "tempsweep.toml";
pub const DEFAULT_DATASET: &str = "manifest.jsonl";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Sweep configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    /// Source file for this config (for display).
    pub source: Option<PathBuf>,

    pub temperatures: Vec<Temperature>,

    /// JSONL manifest; relative paths resolve against the data directory.
    pub dataset: PathBuf,

    /// Use only the first N manifest entries.
    pub num_images: Option<usize>,

    pub api_base: String,
    pub vqa_model: String,
    pub rater_model: String,
    pub max_tokens: u32,
    pub rating_failures: RatingFailurePolicy,
    pub clustering: ClusterThresholds,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            source: None,
            temperatures: Temperature::default_sweep(),
            dataset: PathBuf::from(DEFAULT_DATASET),
            num_images: None,
            api_base: DEFAULT_API_BASE.to_string(),
            vqa_model: DEFAULT_MODEL.to_string(),
            rater_model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            rating_failures: RatingFailurePolicy::default(),
            clustering: ClusterThresholds::default(),
        }
    }
}

/// Raw config as deserialized from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawConfig {
    temperatures: Option<Vec<f64>>,
    dataset: Option<String>,
    num_images: Option<usize>,
    api_base: Option<String>,
    vqa_model: Option<String>,
    rater_model: Option<String>,
    max_tokens: Option<u32>,
    rating_failures: Option<RatingFailurePolicy>,
    clustering: Option<ClusterThresholds>,
}

impl SweepConfig {
    /// Load `tempsweep.toml` from the data directory, or defaults if absent.
    ///
    /// A file that exists but does not parse is an error.
    pub fn load(directory: &Path) -> Result<Self> {
        let path = directory.join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE, directory.display());
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let raw: RawConfig =
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        Self::from_raw(raw, path.clone()).with_context(|| format!("Invalid config in {}", path.display()))
    }

    fn from_raw(raw: RawConfig, source: PathBuf) -> Result<Self> {
        let defaults = Self::default();

        let temperatures = match raw.temperatures {
            Some(values) => values
                .into_iter()
                .map(Temperature::from_f64)
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.temperatures,
        };

        Ok(Self {
            source: Some(source),
            temperatures,
            dataset: raw.dataset.map(PathBuf::from).unwrap_or(defaults.dataset),
            num_images: raw.num_images,
            api_base: raw.api_base.unwrap_or(defaults.api_base),
            vqa_model: raw.vqa_model.unwrap_or(defaults.vqa_model),
            rater_model: raw.rater_model.unwrap_or(defaults.rater_model),
            max_tokens: raw.max_tokens.unwrap_or(defaults.max_tokens),
            rating_failures: raw.rating_failures.unwrap_or(defaults.rating_failures),
            clustering: raw.clustering.unwrap_or(defaults.clustering),
        })
    }

    /// Manifest path resolved against the data directory.
    pub fn dataset_path(&self, data_dir: &Path) -> PathBuf {
        if self.dataset.is_absolute() {
            self.dataset.clone()
        } else {
            data_dir.join(&self.dataset)
        }
    }

    /// Format config for verbose display.
    pub fn display_summary(&self) -> String {
        let mut lines = Vec::new();

        if let Some(ref source) = self.source {
            lines.push(format!("   Config: {}", source.display()));
        } else {
            lines.push("   Config: (defaults)".to_string());
        }

        let temps: Vec<String> = self.temperatures.iter().map(|t| t.to_string()).collect();
        lines.push(format!("   Temperatures: {}", temps.join(", ")));
        lines.push(format!("   Dataset: {}", self.dataset.display()));
        if let Some(n) = self.num_images {
            lines.push(format!("   Images: first {}", n));
        }
        lines.push(format!("   Models: vqa={} rater={}", self.vqa_model, self.rater_model));
        lines.push(format!("   Rating failures: {:?}", self.rating_failures));

        lines.join("\n")
    }
}
