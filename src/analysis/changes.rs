//! Accuracy change detection across ordered temperatures.
//!
//! For each question the (temperature, accuracy) points are walked in
//! ascending temperature order. Every non-zero step from the previous point
//! becomes a [`ChangeEntry`]; flat steps are dropped rather than labeled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::store::AccuracyTable;
use crate::types::{temperature_number, ChangeType, Temperature};

/// One (temperature, accuracy) point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyPoint {
    #[serde(with = "temperature_number")]
    pub temperature: Temperature,
    pub accuracy: f64,
}

/// A non-zero accuracy step relative to the previous temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    #[serde(with = "temperature_number")]
    pub temperature: Temperature,
    pub accuracy: f64,
    pub change_type: ChangeType,
    #[serde(with = "temperature_number")]
    pub from_previous_temp: Temperature,
}

/// Change analysis for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeRecord {
    /// Exactly one temperature has data.
    Single { single_result: AccuracyPoint },
    /// Two or more temperatures; `changes` may be empty if every step was flat.
    Series {
        initial_accuracy: AccuracyPoint,
        changes: Vec<ChangeEntry>,
    },
}

/// Build the change record for one ascending series. `None` when empty.
pub fn analyze_series(series: &[(Temperature, f64)]) -> Option<ChangeRecord> {
    let (&(first_t, first_acc), rest) = series.split_first()?;
    let initial = AccuracyPoint {
        temperature: first_t,
        accuracy: first_acc,
    };

    if rest.is_empty() {
        return Some(ChangeRecord::Single { single_result: initial });
    }

    let changes = series
        .windows(2)
        .filter_map(|pair| {
            let (prev_t, prev_acc) = pair[0];
            let (t, acc) = pair[1];
            let delta = acc - prev_acc;
            let change_type = if delta > 0.0 {
                ChangeType::Increased
            } else if delta < 0.0 {
                ChangeType::Decreased
            } else {
                return None;
            };
            Some(ChangeEntry {
                temperature: t,
                accuracy: acc,
                change_type,
                from_previous_temp: prev_t,
            })
        })
        .collect();

    Some(ChangeRecord::Series {
        initial_accuracy: initial,
        changes,
    })
}

/// Change records for every question in the table, keyed by question.
pub fn analyze_changes(table: &AccuracyTable) -> BTreeMap<String, ChangeRecord> {
    table
        .all_series()
        .into_iter()
        .filter_map(|(question, series)| {
            analyze_series(&series).map(|record| (question.to_string(), record))
        })
        .collect()
}
