//! Core types for tempsweep.
//!
//! Temperatures are fixed point (integer tenths) from the moment they enter
//! the system. The sweep's in-memory keys and the persisted string keys are
//! therefore the same value, with no float formatting in between.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Tolerance when snapping an `f64` onto the one-decimal grid.
const GRID_TOLERANCE: f64 = 1e-9;

/// Errors produced when a value cannot become a [`Temperature`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemperatureError {
    #[error("temperature must be finite, got {0}")]
    NotFinite(f64),

    #[error("temperature must be non-negative, got {0}")]
    Negative(f64),

    #[error("temperature {0} is not a multiple of 0.1")]
    OffGrid(f64),

    #[error("cannot parse temperature from {0:?}")]
    Unparseable(String),
}

/// Sampling temperature stored as integer tenths.
///
/// `Temperature::from_tenths(2)` is 0.2. Displays as `"0.2"`, `"1.0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Temperature(u16);

impl Temperature {
    pub const fn from_tenths(tenths: u16) -> Self {
        Self(tenths)
    }

    pub const fn tenths(self) -> u16 {
        self.0
    }

    /// Snap an `f64` onto the one-decimal grid.
    pub fn from_f64(value: f64) -> Result<Self, TemperatureError> {
        if !value.is_finite() {
            return Err(TemperatureError::NotFinite(value));
        }
        if value < -GRID_TOLERANCE {
            return Err(TemperatureError::Negative(value));
        }

        let scaled = value * 10.0;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > GRID_TOLERANCE * 10.0 || rounded > u16::MAX as f64 {
            return Err(TemperatureError::OffGrid(value));
        }

        Ok(Self(rounded as u16))
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 10.0
    }

    /// The default sweep: 0.0, 0.2, ..., 1.0.
    pub fn default_sweep() -> Vec<Temperature> {
        (0..=10).step_by(2).map(Temperature::from_tenths).collect()
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

impl FromStr for Temperature {
    type Err = TemperatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| TemperatureError::Unparseable(s.to_string()))?;
        Self::from_f64(value)
    }
}

impl TryFrom<f64> for Temperature {
    type Error = TemperatureError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_f64(value)
    }
}

// String form, so temperatures can key JSON objects.
impl Serialize for Temperature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Temperature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Serde helpers for temperature fields written as JSON numbers (`0.2`)
/// rather than strings. Used where the value is not a map key.
pub mod temperature_number {
    use super::*;

    pub fn serialize<S>(temperature: &Temperature, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(temperature.as_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Temperature, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Temperature::from_f64(value).map_err(serde::de::Error::custom)
    }
}

/// Correctness counters for one (temperature, question) cell.
///
/// `accuracy` is cached: it is refreshed when a temperature is finalized,
/// so it may be stale while that temperature's sweep is still running.
/// A stored cell without an `accuracy` key gets it from its counters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "StoredAccuracy")]
pub struct QuestionAccuracy {
    pub total_runs: u64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub accuracy: f64,
}

#[derive(Deserialize)]
struct StoredAccuracy {
    total_runs: u64,
    true_positives: u64,
    false_positives: u64,
    accuracy: Option<f64>,
}

impl From<StoredAccuracy> for QuestionAccuracy {
    fn from(stored: StoredAccuracy) -> Self {
        let mut acc = Self {
            total_runs: stored.total_runs,
            true_positives: stored.true_positives,
            false_positives: stored.false_positives,
            accuracy: 0.0,
        };
        acc.accuracy = stored.accuracy.unwrap_or_else(|| acc.computed_accuracy());
        acc
    }
}

impl QuestionAccuracy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one verdict in. Does not touch the cached accuracy.
    pub fn observe(&mut self, correct: bool) {
        self.total_runs += 1;
        if correct {
            self.true_positives += 1;
        } else {
            self.false_positives += 1;
        }
    }

    /// Accuracy derived from the counters right now.
    pub fn computed_accuracy(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            self.true_positives as f64 / self.total_runs as f64
        }
    }

    /// Refresh the cached accuracy. No-op when there are no runs.
    pub fn finalize(&mut self) {
        if self.total_runs > 0 {
            self.accuracy = self.computed_accuracy();
        }
    }

    /// Add another cell's counters into this one.
    pub fn absorb(&mut self, other: &QuestionAccuracy) {
        self.total_runs += other.total_runs;
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
    }
}

/// Behavioral cluster describing how accuracy responds to temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Cluster {
    #[serde(rename = "Low-temperature optimal")]
    LowTemperatureOptimal,
    #[serde(rename = "Mid-temperature optimal")]
    MidTemperatureOptimal,
    #[serde(rename = "High-temperature optimal")]
    HighTemperatureOptimal,
    #[serde(rename = "Temperature-robust")]
    TemperatureRobust,
    #[serde(rename = "Temperature-sensitive")]
    TemperatureSensitive,
}

impl Cluster {
    /// Every cluster, in report order.
    pub const ALL: [Cluster; 5] = [
        Cluster::LowTemperatureOptimal,
        Cluster::MidTemperatureOptimal,
        Cluster::HighTemperatureOptimal,
        Cluster::TemperatureRobust,
        Cluster::TemperatureSensitive,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Cluster::LowTemperatureOptimal => "Low-temperature optimal",
            Cluster::MidTemperatureOptimal => "Mid-temperature optimal",
            Cluster::HighTemperatureOptimal => "High-temperature optimal",
            Cluster::TemperatureRobust => "Temperature-robust",
            Cluster::TemperatureSensitive => "Temperature-sensitive",
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of a non-zero accuracy step between adjacent temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Increased,
    Decreased,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Increased => write!(f, "increased"),
            ChangeType::Decreased => write!(f, "decreased"),
        }
    }
}
