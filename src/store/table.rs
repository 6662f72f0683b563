//! Temperature × question accuracy table and its JSON persistence.
//!
//! File layout (`temperature_accuracy_data.json`):
//!
//! ```text
//! {
//!   "0.2": {
//!     "What is the title of this book?": {
//!       "total_runs": 3, "true_positives": 2, "false_positives": 1, "accuracy": 0.6667
//!     }
//!   }
//! }
//! ```
//!
//! Saving overwrites the file in place. There is no atomic swap: a crash
//! mid-write can leave a truncated file behind.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{QuestionAccuracy, Temperature};

/// Default file name for the persisted temperature table.
pub const TEMPERATURE_RESULTS_FILE: &str = "temperature_accuracy_data.json";

/// Mapping temperature → question → counters.
///
/// Ordered by temperature, then question text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccuracyTable {
    temperatures: BTreeMap<Temperature, BTreeMap<String, QuestionAccuracy>>,
}

impl AccuracyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.temperatures.is_empty()
    }

    /// Create an empty slot for a temperature if it has none yet.
    pub fn ensure_temperature(&mut self, temperature: Temperature) {
        self.temperatures.entry(temperature).or_default();
    }

    /// Fold one rated answer into the (temperature, question) cell.
    ///
    /// A missing cell starts from zero. The cached accuracy is left alone;
    /// call [`finalize_temperature`](Self::finalize_temperature) once the
    /// temperature's pass is complete.
    pub fn record_observation(&mut self, temperature: Temperature, question: &str, correct: bool) {
        self.temperatures
            .entry(temperature)
            .or_default()
            .entry(question.to_string())
            .or_insert_with(QuestionAccuracy::new)
            .observe(correct);
    }

    /// Refresh cached accuracy for every question at this temperature.
    pub fn finalize_temperature(&mut self, temperature: Temperature) {
        if let Some(questions) = self.temperatures.get_mut(&temperature) {
            for acc in questions.values_mut() {
                acc.finalize();
            }
        }
    }

    /// Add another table's counters into this one.
    ///
    /// Counters are summed, so merging is order independent. Every
    /// temperature touched by `other` is finalized afterwards.
    pub fn merge(&mut self, other: &AccuracyTable) {
        for (temperature, questions) in &other.temperatures {
            let slot = self.temperatures.entry(*temperature).or_default();
            for (question, acc) in questions {
                slot.entry(question.clone())
                    .or_insert_with(QuestionAccuracy::new)
                    .absorb(acc);
            }
            self.finalize_temperature(*temperature);
        }
    }

    pub fn get(&self, temperature: Temperature, question: &str) -> Option<&QuestionAccuracy> {
        self.temperatures.get(&temperature)?.get(question)
    }

    /// All questions at one temperature.
    pub fn at(&self, temperature: Temperature) -> Option<&BTreeMap<String, QuestionAccuracy>> {
        self.temperatures.get(&temperature)
    }

    /// Temperatures in ascending order.
    pub fn temperatures(&self) -> impl Iterator<Item = Temperature> + '_ {
        self.temperatures.keys().copied()
    }

    /// Iterate `(temperature, questions)` in ascending temperature order.
    pub fn iter(&self) -> impl Iterator<Item = (Temperature, &BTreeMap<String, QuestionAccuracy>)> {
        self.temperatures.iter().map(|(t, q)| (*t, q))
    }

    /// Every question seen at any temperature.
    pub fn questions(&self) -> BTreeSet<&str> {
        self.temperatures
            .values()
            .flat_map(|questions| questions.keys().map(String::as_str))
            .collect()
    }

    /// Cached accuracies of one question, ascending by temperature.
    ///
    /// Only temperatures holding a cell for the question appear; gaps are
    /// never filled in.
    pub fn series(&self, question: &str) -> Vec<(Temperature, f64)> {
        self.temperatures
            .iter()
            .filter_map(|(t, questions)| questions.get(question).map(|acc| (*t, acc.accuracy)))
            .collect()
    }

    /// Every question's series, keyed by question.
    pub fn all_series(&self) -> BTreeMap<&str, Vec<(Temperature, f64)>> {
        let mut out: BTreeMap<&str, Vec<(Temperature, f64)>> = BTreeMap::new();
        for (temperature, questions) in &self.temperatures {
            for (question, acc) in questions {
                out.entry(question.as_str())
                    .or_default()
                    .push((*temperature, acc.accuracy));
            }
        }
        out
    }

    pub fn stats(&self) -> TableStats {
        let cells = self.temperatures.values().map(|q| q.len()).sum();
        let observations = self
            .temperatures
            .values()
            .flat_map(|q| q.values())
            .map(|acc| acc.total_runs)
            .sum();

        TableStats {
            temperatures: self.temperatures.len(),
            questions: self.questions().len(),
            cells,
            observations,
        }
    }
}

/// Size summary of a table, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub temperatures: usize,
    pub questions: usize,
    pub cells: usize,
    pub observations: u64,
}

/// Loads and saves an [`AccuracyTable`] at a fixed path.
#[derive(Debug, Clone)]
pub struct AccuracyStore {
    path: PathBuf,
}

impl AccuracyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<dir>/temperature_accuracy_data.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(TEMPERATURE_RESULTS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the table. An absent file is an empty table, not an error.
    pub fn load(&self) -> Result<AccuracyTable> {
        if !self.path.exists() {
            tracing::debug!("No table at {}, starting empty", self.path.display());
            return Ok(AccuracyTable::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let table: AccuracyTable = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        let stats = table.stats();
        tracing::info!(
            "Loaded {} temperatures, {} questions, {} observations from {}",
            stats.temperatures,
            stats.questions,
            stats.observations,
            self.path.display()
        );
        Ok(table)
    }

    /// Overwrite the file with the table.
    pub fn save(&self, table: &AccuracyTable) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let json = serde_json::to_string_pretty(table).context("Failed to serialize accuracy table")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        tracing::info!("Saved accuracy table to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(tenths: u16) -> Temperature {
        Temperature::from_tenths(tenths)
    }

    #[test]
    fn test_record_creates_zeroed_cell() {
        let mut table = AccuracyTable::new();
        table.record_observation(t(2), "q1", true);

        let acc = table.get(t(2), "q1").unwrap();
        assert_eq!(acc.total_runs, 1);
        assert_eq!(acc.true_positives, 1);
        assert_eq!(acc.false_positives, 0);
        // not finalized yet
        assert_eq!(acc.accuracy, 0.0);
    }

    #[test]
    fn test_cells_are_independent() {
        let mut table = AccuracyTable::new();
        table.record_observation(t(0), "q1", true);
        table.record_observation(t(0), "q2", false);
        table.record_observation(t(2), "q1", false);

        assert_eq!(table.get(t(0), "q1").unwrap().true_positives, 1);
        assert_eq!(table.get(t(0), "q2").unwrap().false_positives, 1);
        assert_eq!(table.get(t(2), "q1").unwrap().false_positives, 1);
        assert_eq!(table.get(t(2), "q1").unwrap().true_positives, 0);
    }

    #[test]
    fn test_finalize_temperature() {
        let mut table = AccuracyTable::new();
        for correct in [true, true, false, true] {
            table.record_observation(t(4), "q", correct);
        }
        table.record_observation(t(6), "q", true);

        table.finalize_temperature(t(4));

        let acc = table.get(t(4), "q").unwrap();
        assert_eq!(acc.total_runs, acc.true_positives + acc.false_positives);
        assert!((acc.accuracy - 0.75).abs() < 1e-12);

        // other temperatures stay stale until their own finalize
        assert_eq!(table.get(t(6), "q").unwrap().accuracy, 0.0);
    }

    #[test]
    fn test_merge_is_additive_and_order_independent() {
        let mut a = AccuracyTable::new();
        a.record_observation(t(0), "q", true);
        a.record_observation(t(0), "q", false);
        a.finalize_temperature(t(0));

        let mut b = AccuracyTable::new();
        b.record_observation(t(0), "q", true);
        b.record_observation(t(8), "r", true);
        b.finalize_temperature(t(0));
        b.finalize_temperature(t(8));

        let mut ab = AccuracyTable::new();
        ab.merge(&a);
        ab.merge(&b);

        let mut ba = AccuracyTable::new();
        ba.merge(&b);
        ba.merge(&a);

        assert_eq!(ab, ba);
        let acc = ab.get(t(0), "q").unwrap();
        assert_eq!(acc.total_runs, 3);
        assert_eq!(acc.true_positives, 2);
        assert!((acc.accuracy - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_series_skips_gaps() {
        let mut table = AccuracyTable::new();
        table.record_observation(t(8), "q", false);
        table.record_observation(t(0), "q", true);
        table.record_observation(t(4), "other", true);
        for temp in table.temperatures().collect::<Vec<_>>() {
            table.finalize_temperature(temp);
        }

        let series = table.series("q");
        assert_eq!(series, vec![(t(0), 1.0), (t(8), 0.0)]);
        assert_eq!(table.questions().len(), 2);
    }

    #[test]
    fn test_stats() {
        let mut table = AccuracyTable::new();
        table.record_observation(t(0), "q", true);
        table.record_observation(t(0), "q", true);
        table.record_observation(t(2), "q", false);
        table.ensure_temperature(t(4));

        let stats = table.stats();
        assert_eq!(stats.temperatures, 3);
        assert_eq!(stats.questions, 1);
        assert_eq!(stats.cells, 2);
        assert_eq!(stats.observations, 3);
    }

    #[test]
    fn test_load_missing_file_is_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = AccuracyStore::in_dir(dir.path());
        assert!(store.load()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_save_load_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = AccuracyStore::in_dir(dir.path());

        let mut table = AccuracyTable::new();
        table.record_observation(t(0), "What color is the cover?", true);
        table.record_observation(t(0), "What color is the cover?", false);
        table.record_observation(t(0), "What color is the cover?", false);
        table.record_observation(t(10), "Is this a cookbook?", true);
        table.finalize_temperature(t(0));
        table.finalize_temperature(t(10));

        store.save(&table)?;
        let loaded = store.load()?;

        assert_eq!(loaded, table);
        Ok(())
    }

    #[test]
    fn test_persisted_keys_are_one_decimal_strings() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = AccuracyStore::in_dir(dir.path());

        let mut table = AccuracyTable::new();
        table.record_observation(t(10), "q", true);
        table.finalize_temperature(t(10));
        store.save(&table)?;

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path())?)?;
        let entry = &raw["1.0"]["q"];
        assert_eq!(entry["total_runs"], 1);
        assert_eq!(entry["true_positives"], 1);
        assert_eq!(entry["false_positives"], 0);
        assert_eq!(entry["accuracy"], 1.0);
        Ok(())
    }

    #[test]
    fn test_load_existing_file_written_elsewhere() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(TEMPERATURE_RESULTS_FILE);
        fs::write(
            &path,
            r#"{"0.0": {"q": {"total_runs": 2, "true_positives": 1, "false_positives": 1, "accuracy": 0.5}},
                "0.6": {"q": {"total_runs": 1, "true_positives": 1, "false_positives": 0}}}"#,
        )?;

        let table = AccuracyStore::new(&path).load()?;
        assert!((table.get(t(0), "q").unwrap().accuracy - 0.5).abs() < 1e-12);
        // missing accuracy key comes from the counters, not a made-up zero
        assert_eq!(table.get(t(6), "q").unwrap().accuracy, 1.0);
        assert_eq!(table.series("q"), vec![(t(0), 0.5), (t(6), 1.0)]);
        Ok(())
    }

    #[test]
    fn test_load_rejects_malformed_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(TEMPERATURE_RESULTS_FILE);
        fs::write(&path, r#"{"0.25": {}}"#)?;

        assert!(AccuracyStore::new(&path).load().is_err());
        Ok(())
    }
}
