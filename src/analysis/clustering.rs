//! Behavioral clustering of questions by their accuracy-vs-temperature curve.
//!
//! ## Classification
//!
//! Rules are checked in order; the first match wins:
//!
//! | # | Condition                                             | Cluster                   |
//! |---|-------------------------------------------------------|---------------------------|
//! | 1 | `std <= robust_std` or `range <= robust_range`        | Temperature-robust        |
//! | 2 | `best_T <= low_max`                                   | Low-temperature optimal   |
//! | 3 | `best_T >= high_min`                                  | High-temperature optimal  |
//! | 4 | `mid_min <= best_T <= mid_max`                        | Mid-temperature optimal   |
//! | 5 | non-monotonic and `range >= sensitive_range`          | Temperature-sensitive     |
//! | 6 | otherwise, by OLS slope sign (`> 0` high, else low)   | High / Low optimal        |
//!
//! `best_T` is the lowest temperature attaining the maximum accuracy.
//! Temperature thresholds are fixed point, so boundaries compare exactly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::stats::{is_non_monotonic, SeriesStats};
use crate::store::AccuracyTable;
use crate::types::{temperature_number, Cluster, Temperature};

/// Std-dev at or below which a question is robust.
pub const ROBUST_STD: f64 = 0.015;
/// Accuracy range at or below which a question is robust.
pub const ROBUST_RANGE: f64 = 0.02;
/// Minimum consecutive step that counts as a rise or fall.
pub const NON_MONOTONIC_EPS: f64 = 0.015;
/// Minimum range for a non-monotonic question to be sensitive.
pub const SENSITIVE_RANGE: f64 = 0.05;
/// Best temperatures at or below this are low-temperature optimal.
pub const LOW_MAX: Temperature = Temperature::from_tenths(2);
/// Lower edge of the mid-temperature band (inclusive).
pub const MID_MIN: Temperature = Temperature::from_tenths(4);
/// Upper edge of the mid-temperature band (inclusive).
pub const MID_MAX: Temperature = Temperature::from_tenths(6);
/// Best temperatures at or above this are high-temperature optimal.
pub const HIGH_MIN: Temperature = Temperature::from_tenths(8);

/// Tunable thresholds for [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClusterThresholds {
    pub robust_std: f64,
    pub robust_range: f64,
    pub non_monotonic_eps: f64,
    pub sensitive_range: f64,
    #[serde(with = "temperature_number")]
    pub low_max: Temperature,
    #[serde(with = "temperature_number")]
    pub mid_min: Temperature,
    #[serde(with = "temperature_number")]
    pub mid_max: Temperature,
    #[serde(with = "temperature_number")]
    pub high_min: Temperature,
}

impl Default for ClusterThresholds {
    fn default() -> Self {
        Self {
            robust_std: ROBUST_STD,
            robust_range: ROBUST_RANGE,
            non_monotonic_eps: NON_MONOTONIC_EPS,
            sensitive_range: SENSITIVE_RANGE,
            low_max: LOW_MAX,
            mid_min: MID_MIN,
            mid_max: MID_MAX,
            high_min: HIGH_MIN,
        }
    }
}

/// Per-question clustering result.
///
/// Numeric fields are rounded to 4 decimals for presentation; the
/// classification itself used the unrounded values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub question: String,
    pub cluster: Cluster,
    #[serde(with = "temperature_number")]
    pub best_temperature: Temperature,
    pub best_accuracy: f64,
    pub mean_accuracy: f64,
    pub std_accuracy: f64,
    pub slope: f64,
    /// Only temperatures with data; gaps are not interpolated
    pub accuracies: BTreeMap<Temperature, f64>,
}

/// The five named buckets, each present even when empty.
///
/// Serializes as a JSON object in report order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterBuckets(BTreeMap<Cluster, Vec<ClusterRecord>>);

impl ClusterBuckets {
    fn empty() -> Self {
        Self(Cluster::ALL.iter().map(|c| (*c, Vec::new())).collect())
    }

    pub fn get(&self, cluster: Cluster) -> &[ClusterRecord] {
        self.0.get(&cluster).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len_of(&self, cluster: Cluster) -> usize {
        self.get(cluster).len()
    }

    /// Buckets in report order.
    pub fn iter(&self) -> impl Iterator<Item = (Cluster, &[ClusterRecord])> {
        self.0.iter().map(|(c, records)| (*c, records.as_slice()))
    }
}

/// Output of [`cluster_questions`]: buckets plus one flat, sorted list.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub buckets: ClusterBuckets,
    /// Sorted by (cluster name, lowercased question)
    pub rows: Vec<ClusterRecord>,
}

/// Assign a cluster from precomputed stats and the ordered accuracy values.
pub fn classify(stats: &SeriesStats, accuracies: &[f64], thresholds: &ClusterThresholds) -> Cluster {
    let best = stats.best_temperature;

    if stats.std <= thresholds.robust_std || stats.range <= thresholds.robust_range {
        Cluster::TemperatureRobust
    } else if best <= thresholds.low_max {
        Cluster::LowTemperatureOptimal
    } else if best >= thresholds.high_min {
        Cluster::HighTemperatureOptimal
    } else if thresholds.mid_min <= best && best <= thresholds.mid_max {
        Cluster::MidTemperatureOptimal
    } else if is_non_monotonic(accuracies, thresholds.non_monotonic_eps)
        && stats.range >= thresholds.sensitive_range
    {
        Cluster::TemperatureSensitive
    } else if stats.slope > 0.0 {
        Cluster::HighTemperatureOptimal
    } else {
        Cluster::LowTemperatureOptimal
    }
}

/// Build the record for one question from its ascending series.
///
/// Returns `None` when the series is empty.
pub fn cluster_series(
    question: &str,
    series: &[(Temperature, f64)],
    thresholds: &ClusterThresholds,
) -> Option<ClusterRecord> {
    let stats = SeriesStats::compute(series)?;
    let accuracies: Vec<f64> = series.iter().map(|(_, a)| *a).collect();
    let cluster = classify(&stats, &accuracies, thresholds);

    Some(ClusterRecord {
        question: question.to_string(),
        cluster,
        best_temperature: stats.best_temperature,
        best_accuracy: round4(stats.max),
        mean_accuracy: round4(stats.mean),
        std_accuracy: round4(stats.std),
        slope: round4(stats.slope),
        accuracies: series.iter().map(|(t, a)| (*t, round4(*a))).collect(),
    })
}

/// Cluster every question in the table.
pub fn cluster_questions(table: &AccuracyTable, thresholds: &ClusterThresholds) -> Clustering {
    let mut buckets = ClusterBuckets::empty();
    let mut rows = Vec::new();

    for (question, series) in table.all_series() {
        let Some(record) = cluster_series(question, &series, thresholds) else {
            continue;
        };
        buckets.0.entry(record.cluster).or_default().push(record.clone());
        rows.push(record);
    }

    for records in buckets.0.values_mut() {
        records.sort_by_key(|r| r.question.to_lowercase());
    }
    rows.sort_by(|a, b| {
        (a.cluster.name(), a.question.to_lowercase()).cmp(&(b.cluster.name(), b.question.to_lowercase()))
    });

    tracing::debug!("Clustered {} questions", rows.len());
    Clustering { buckets, rows }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
