//! The sweep orchestrator.
//!
//! [`ExperimentRunner`] owns every piece of aggregate state for a sweep: the
//! temperature table, the legacy tallies and the stores they persist to.
//! Nothing is global; a runner is built, run, and inspected explicitly.
//!
//! ## Rating fan-out
//!
//! Within one dataset entry, every aligned (question, predicted answer) pair
//! becomes a [`RatingJob`] holding its own spawned task. The jobs are awaited
//! together before the runner moves on, and each verdict is folded back
//! through the job that produced it, so a verdict can never be attributed
//! to the wrong question.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::collaborators::{CallError, CallResult, DatasetEntry, Rater, VqaModel, NOT_AVAILABLE};
use crate::analysis::analyze_changes;
use crate::report::{FinalResults, FinalResultsStore};
use crate::store::{AccuracyStore, AccuracyTable, LegacyStore, LegacyTallies};
use crate::types::Temperature;

/// What a failed rating call means for the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RatingFailurePolicy {
    /// Record the failure as an incorrect answer
    #[default]
    CountAsIncorrect,
    /// Leave the failed rating out of the counters
    Exclude,
}

/// Counters describing one [`ExperimentRunner::run`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub temperatures: usize,
    pub entries_processed: usize,
    /// VQA queries that failed outright; their entries recorded nothing
    pub queries_failed: usize,
    /// Answers equal to the "N/A" sentinel, never rated
    pub answers_skipped: usize,
    /// Questions with no aligned predicted or golden answer
    pub questions_unmatched: usize,
    pub ratings_issued: usize,
    pub ratings_failed: usize,
    pub observations_recorded: usize,
}

impl RunSummary {
    fn absorb(&mut self, other: &RunSummary) {
        self.entries_processed += other.entries_processed;
        self.queries_failed += other.queries_failed;
        self.answers_skipped += other.answers_skipped;
        self.questions_unmatched += other.questions_unmatched;
        self.ratings_issued += other.ratings_issued;
        self.ratings_failed += other.ratings_failed;
        self.observations_recorded += other.observations_recorded;
    }
}

/// One in-flight rating, tied to the question it rates.
struct RatingJob {
    index: usize,
    question: String,
    golden: String,
    predicted: String,
    handle: JoinHandle<CallResult<bool>>,
}

/// Drives a temperature sweep over a dataset.
pub struct ExperimentRunner {
    vqa: Arc<dyn VqaModel>,
    rater: Arc<dyn Rater>,
    dataset: Vec<DatasetEntry>,
    table: AccuracyTable,
    legacy: LegacyTallies,
    store: AccuracyStore,
    legacy_store: LegacyStore,
    policy: RatingFailurePolicy,
}

impl ExperimentRunner {
    /// Build a runner, loading any previously persisted state.
    ///
    /// Absent files start empty; unreadable files are errors.
    pub fn new(
        vqa: Arc<dyn VqaModel>,
        rater: Arc<dyn Rater>,
        dataset: Vec<DatasetEntry>,
        store: AccuracyStore,
        legacy_store: LegacyStore,
    ) -> Result<Self> {
        let table = store.load()?;
        let legacy = legacy_store.load()?;

        Ok(Self {
            vqa,
            rater,
            dataset,
            table,
            legacy,
            store,
            legacy_store,
            policy: RatingFailurePolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: RatingFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn table(&self) -> &AccuracyTable {
        &self.table
    }

    pub fn legacy(&self) -> &LegacyTallies {
        &self.legacy
    }

    pub fn dataset_len(&self) -> usize {
        self.dataset.len()
    }

    /// Sweep the dataset at each temperature, in order, then persist.
    ///
    /// Counters add to whatever was loaded, so repeated runs accumulate.
    /// Temperatures must be distinct.
    pub async fn run(&mut self, temperatures: &[Temperature]) -> Result<RunSummary> {
        let mut seen = BTreeSet::new();
        for t in temperatures {
            if !seen.insert(*t) {
                bail!("temperature {} appears more than once in the sweep", t);
            }
        }

        let mut summary = RunSummary {
            temperatures: temperatures.len(),
            ..Default::default()
        };

        for &temperature in temperatures {
            tracing::info!("--- Running evaluation for temperature: {} ---", temperature);
            self.table.ensure_temperature(temperature);

            for idx in 0..self.dataset.len() {
                let entry_summary = self.run_entry(idx, temperature).await;
                summary.absorb(&entry_summary);
            }

            self.table.finalize_temperature(temperature);
        }

        self.store.save(&self.table)?;
        self.legacy_store.save(&self.legacy)?;

        tracing::info!(
            "Sweep done: {} entries, {} observations, {} failed queries, {} failed ratings",
            summary.entries_processed,
            summary.observations_recorded,
            summary.queries_failed,
            summary.ratings_failed
        );
        Ok(summary)
    }

    /// Query, rate and record one dataset entry at one temperature.
    async fn run_entry(&mut self, idx: usize, temperature: Temperature) -> RunSummary {
        let mut summary = RunSummary {
            entries_processed: 1,
            ..Default::default()
        };

        let entry = &self.dataset[idx];
        tracing::info!("Processing image_id: {} at temperature {}", entry.image_id, temperature);

        let predicted = match self.vqa.query(&entry.image, &entry.questions, temperature).await {
            Ok(answers) => answers,
            Err(e) => {
                // No answer is aligned with any question; record nothing.
                tracing::warn!("VQA query failed for {} at {}: {}", entry.image_id, temperature, e);
                summary.queries_failed = 1;
                return summary;
            }
        };

        let mut jobs = Vec::new();
        for (index, question) in entry.questions.iter().enumerate() {
            let (Some(predicted), Some(golden)) = (predicted.get(index), entry.answers.get(index)) else {
                summary.questions_unmatched += 1;
                continue;
            };
            if predicted == NOT_AVAILABLE {
                summary.answers_skipped += 1;
                continue;
            }

            let rater = Arc::clone(&self.rater);
            let (q, g, p) = (question.clone(), golden.clone(), predicted.clone());
            let handle = tokio::spawn(async move { rater.rate(&q, &g, &p).await });

            jobs.push(RatingJob {
                index,
                question: question.clone(),
                golden: golden.clone(),
                predicted: predicted.clone(),
                handle,
            });
        }
        summary.ratings_issued = jobs.len();

        // Wait for every job before recording anything.
        let mut verdicts = Vec::with_capacity(jobs.len());
        for job in jobs {
            let outcome = match job.handle.await {
                Ok(result) => result,
                Err(join_err) => Err(CallError::Rate(format!("rating task failed: {}", join_err))),
            };
            verdicts.push((job.index, job.question, job.golden, job.predicted, outcome));
        }

        for (index, question, golden, predicted, outcome) in verdicts {
            let correct = match outcome {
                Ok(correct) => correct,
                Err(e) => {
                    summary.ratings_failed += 1;
                    tracing::warn!("Rating failed for question {} ({:?}): {}", index + 1, question, e);
                    match self.policy {
                        RatingFailurePolicy::CountAsIncorrect => false,
                        RatingFailurePolicy::Exclude => continue,
                    }
                }
            };

            self.table.record_observation(temperature, &question, correct);
            self.legacy.record(&question, &golden, &predicted, correct);
            summary.observations_recorded += 1;
        }

        summary
    }

    /// Write `final_results.json`: the table plus its change analysis.
    pub fn save_final_results(&self, store: &FinalResultsStore) -> Result<FinalResults> {
        let results = FinalResults::new(self.table.clone(), analyze_changes(&self.table));
        store.save(&results)?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::experiment::collaborators::ImageData;

    /// Answers from a script keyed by (image bytes, temperature tenths).
    struct ScriptedVqa {
        script: HashMap<(Vec<u8>, u16), CallResult<Vec<String>>>,
        calls: Mutex<Vec<(Vec<u8>, u16)>>,
    }

    impl ScriptedVqa {
        fn new() -> Self {
            Self {
                script: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn answer(mut self, image: &[u8], tenths: u16, answers: &[&str]) -> Self {
            let answers = answers.iter().map(|s| s.to_string()).collect();
            self.script.insert((image.to_vec(), tenths), Ok(answers));
            self
        }

        fn fail(mut self, image: &[u8], tenths: u16) -> Self {
            self.script
                .insert((image.to_vec(), tenths), Err(CallError::Network("connection reset".into())));
            self
        }
    }

    #[async_trait]
    impl VqaModel for ScriptedVqa {
        async fn query(
            &self,
            image: &ImageData,
            _questions: &[String],
            temperature: Temperature,
        ) -> CallResult<Vec<String>> {
            let key = (image.bytes.clone(), temperature.tenths());
            self.calls.lock().unwrap().push(key.clone());
            self.script.get(&key).cloned().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// Exact string match; predictions equal to "boom" fail to rate.
    /// Longer answers sleep less so verdicts finish out of order.
    struct ExactRater;

    #[async_trait]
    impl Rater for ExactRater {
        async fn rate(&self, _question: &str, golden: &str, predicted: &str) -> CallResult<bool> {
            let delay = 20u64.saturating_sub(predicted.len() as u64);
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            if predicted == "boom" {
                return Err(CallError::Rate("judge unavailable".into()));
            }
            Ok(golden.eq_ignore_ascii_case(predicted))
        }
    }

    fn entry(id: &str, image: &[u8], qa: &[(&str, &str)]) -> DatasetEntry {
        DatasetEntry {
            image_id: id.to_string(),
            image: ImageData::jpeg(image.to_vec()),
            questions: qa.iter().map(|(q, _)| q.to_string()).collect(),
            answers: qa.iter().map(|(_, a)| a.to_string()).collect(),
        }
    }

    fn t(tenths: u16) -> Temperature {
        Temperature::from_tenths(tenths)
    }

    fn runner(dir: &std::path::Path, vqa: ScriptedVqa, dataset: Vec<DatasetEntry>) -> ExperimentRunner {
        ExperimentRunner::new(
            Arc::new(vqa),
            Arc::new(ExactRater),
            dataset,
            AccuracyStore::in_dir(dir),
            LegacyStore::in_dir(dir),
        )
        .unwrap()
    }

    fn books() -> Vec<DatasetEntry> {
        vec![
            entry("img1", b"1", &[("Who wrote this?", "Tolkien"), ("Is this fiction?", "Yes")]),
            entry("img2", b"2", &[("Who wrote this?", "Austen"), ("Genre?", "Romance")]),
        ]
    }

    #[tokio::test]
    async fn test_sweep_records_and_finalizes() {
        let dir = tempfile::tempdir().unwrap();
        let vqa = ScriptedVqa::new()
            .answer(b"1", 0, &["Tolkien", "yes"])
            .answer(b"2", 0, &["Austen", "Horror"])
            .answer(b"1", 10, &["Lewis", "Yes"])
            .answer(b"2", 10, &["Austen", "Romance"]);

        let mut runner = runner(dir.path(), vqa, books());
        let summary = runner.run(&[t(0), t(10)]).await.unwrap();

        assert_eq!(summary.entries_processed, 4);
        assert_eq!(summary.observations_recorded, 8);
        assert_eq!(summary.ratings_issued, 8);

        let table = runner.table();
        let who = table.get(t(0), "Who wrote this?").unwrap();
        assert_eq!((who.total_runs, who.true_positives, who.false_positives), (2, 2, 0));
        assert!((who.accuracy - 1.0).abs() < 1e-12);

        let who_hot = table.get(t(10), "Who wrote this?").unwrap();
        assert!((who_hot.accuracy - 0.5).abs() < 1e-12);

        let genre = table.get(t(0), "Genre?").unwrap();
        assert_eq!(genre.false_positives, 1);
        assert_eq!(genre.accuracy, 0.0);

        // legacy tally keeps rejected pairs across temperatures
        let tally = runner.legacy().get("Who wrote this?").unwrap();
        assert_eq!(tally.true_positives, 3);
        assert_eq!(tally.different_answers, vec![("Tolkien".to_string(), "Lewis".to_string())]);

        // persisted
        let reloaded = AccuracyStore::in_dir(dir.path()).load().unwrap();
        assert_eq!(&reloaded, table);
        assert_eq!(LegacyStore::in_dir(dir.path()).load().unwrap(), *runner.legacy());
    }

    #[tokio::test]
    async fn test_processing_order_is_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let vqa = Arc::new(
            ScriptedVqa::new()
                .answer(b"1", 2, &["Tolkien", "Yes"])
                .answer(b"2", 2, &["Austen", "Romance"]),
        );
        let mut runner = ExperimentRunner::new(
            vqa.clone(),
            Arc::new(ExactRater),
            books(),
            AccuracyStore::in_dir(dir.path()),
            LegacyStore::in_dir(dir.path()),
        )
        .unwrap();

        runner.run(&[t(2), t(8)]).await.unwrap();

        let calls = vqa.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![(b"1".to_vec(), 2), (b"2".to_vec(), 2), (b"1".to_vec(), 8), (b"2".to_vec(), 8)]
        );
    }

    #[tokio::test]
    async fn test_verdicts_stay_with_their_questions() {
        let dir = tempfile::tempdir().unwrap();
        // different answer lengths make the ratings complete out of order
        let qa = [("q1", "a"), ("q2", "a much longer answer"), ("q3", "mid length"), ("q4", "x")];
        let vqa = ScriptedVqa::new().answer(b"1", 4, &["a", "wrong", "mid length", "also wrong"]);

        let mut runner = runner(dir.path(), vqa, vec![entry("img", b"1", &qa)]);
        runner.run(&[t(4)]).await.unwrap();

        let table = runner.table();
        assert_eq!(table.get(t(4), "q1").unwrap().true_positives, 1);
        assert_eq!(table.get(t(4), "q2").unwrap().false_positives, 1);
        assert_eq!(table.get(t(4), "q3").unwrap().true_positives, 1);
        assert_eq!(table.get(t(4), "q4").unwrap().false_positives, 1);
    }

    #[tokio::test]
    async fn test_short_answer_list_leaves_trailing_questions_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let vqa = ScriptedVqa::new().answer(b"1", 0, &["Tolkien"]);

        let mut runner = runner(dir.path(), vqa, vec![books().remove(0)]);
        let summary = runner.run(&[t(0)]).await.unwrap();

        assert!(runner.table().get(t(0), "Who wrote this?").is_some());
        assert!(runner.table().get(t(0), "Is this fiction?").is_none());
        assert_eq!(summary.questions_unmatched, 1);
        assert_eq!(summary.observations_recorded, 1);
    }

    #[tokio::test]
    async fn test_not_available_answers_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let vqa = ScriptedVqa::new().answer(b"1", 0, &[NOT_AVAILABLE, "Yes"]);

        let mut runner = runner(dir.path(), vqa, vec![books().remove(0)]);
        let summary = runner.run(&[t(0)]).await.unwrap();

        assert!(runner.table().get(t(0), "Who wrote this?").is_none());
        assert_eq!(runner.table().get(t(0), "Is this fiction?").unwrap().total_runs, 1);
        assert_eq!(summary.answers_skipped, 1);
    }

    #[tokio::test]
    async fn test_failed_query_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let vqa = ScriptedVqa::new()
            .fail(b"1", 0)
            .answer(b"2", 0, &["Austen", "Romance"]);

        let mut runner = runner(dir.path(), vqa, books());
        let summary = runner.run(&[t(0)]).await.unwrap();

        assert_eq!(summary.queries_failed, 1);
        assert!(runner.table().get(t(0), "Is this fiction?").is_none());
        assert_eq!(runner.table().get(t(0), "Who wrote this?").unwrap().total_runs, 1);
    }

    #[tokio::test]
    async fn test_rating_failure_policies() {
        let qa = [("q1", "x"), ("q2", "y")];

        let dir = tempfile::tempdir().unwrap();
        let vqa = ScriptedVqa::new().answer(b"1", 0, &["boom", "y"]);
        let mut counting = runner(dir.path(), vqa, vec![entry("img", b"1", &qa)]);
        let summary = counting.run(&[t(0)]).await.unwrap();
        assert_eq!(summary.ratings_failed, 1);
        assert_eq!(counting.table().get(t(0), "q1").unwrap().false_positives, 1);

        let dir = tempfile::tempdir().unwrap();
        let vqa = ScriptedVqa::new().answer(b"1", 0, &["boom", "y"]);
        let mut excluding = runner(dir.path(), vqa, vec![entry("img", b"1", &qa)])
            .with_policy(RatingFailurePolicy::Exclude);
        let summary = excluding.run(&[t(0)]).await.unwrap();
        assert_eq!(summary.ratings_failed, 1);
        assert_eq!(summary.observations_recorded, 1);
        assert!(excluding.table().get(t(0), "q1").is_none());
    }

    #[tokio::test]
    async fn test_repeated_runs_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let script = || {
            ScriptedVqa::new()
                .answer(b"1", 0, &["Tolkien", "No"])
                .answer(b"2", 0, &["Austen", "Romance"])
        };

        runner(dir.path(), script(), books()).run(&[t(0)]).await.unwrap();
        let mut second = runner(dir.path(), script(), books());
        second.run(&[t(0)]).await.unwrap();

        let fiction = second.table().get(t(0), "Is this fiction?").unwrap();
        assert_eq!(fiction.total_runs, 2);
        assert_eq!(fiction.false_positives, 2);
        let who = second.table().get(t(0), "Who wrote this?").unwrap();
        assert_eq!(who.total_runs, 4);
    }

    #[tokio::test]
    async fn test_disjoint_sweeps_sum_to_independent_runs() {
        let script = || {
            ScriptedVqa::new()
                .answer(b"1", 0, &["Tolkien", "No"])
                .answer(b"2", 0, &["Austen", "Romance"])
                .answer(b"1", 6, &["Lewis", "Yes"])
                .answer(b"2", 6, &["Austen", "Drama"])
        };

        // two sweeps in one data dir
        let shared = tempfile::tempdir().unwrap();
        runner(shared.path(), script(), books()).run(&[t(0)]).await.unwrap();
        let mut combined = runner(shared.path(), script(), books());
        combined.run(&[t(6)]).await.unwrap();

        // the same sweeps in separate dirs, merged afterwards
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let mut only_cold = runner(a.path(), script(), books());
        only_cold.run(&[t(0)]).await.unwrap();
        let mut only_warm = runner(b.path(), script(), books());
        only_warm.run(&[t(6)]).await.unwrap();

        let mut merged = AccuracyTable::new();
        merged.merge(only_cold.table());
        merged.merge(only_warm.table());

        assert_eq!(combined.table(), &merged);
    }

    #[tokio::test]
    async fn test_duplicate_temperatures_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner(dir.path(), ScriptedVqa::new(), books());
        assert!(runner.run(&[t(2), t(4), t(2)]).await.is_err());
        assert!(runner.table().is_empty());
    }

    #[tokio::test]
    async fn test_save_final_results() {
        let dir = tempfile::tempdir().unwrap();
        let vqa = ScriptedVqa::new()
            .answer(b"1", 0, &["Tolkien", "Yes"])
            .answer(b"1", 2, &["Lewis", "Yes"]);

        let mut runner = runner(dir.path(), vqa, vec![books().remove(0)]);
        runner.run(&[t(0), t(2)]).await.unwrap();

        let store = FinalResultsStore::in_dir(dir.path());
        let saved = runner.save_final_results(&store).unwrap();
        assert_eq!(saved.analysis.len(), 2);

        let loaded = store.load().unwrap();
        assert_eq!(loaded, saved);
    }
}
