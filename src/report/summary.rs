//! Clustering artifacts: `temperature_clusters.json` and `CLUSTERING_SUMMARY.md`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::analysis::{ClusterThresholds, Clustering};
use crate::types::Cluster;

pub const CLUSTERS_FILE: &str = "temperature_clusters.json";
pub const SUMMARY_FILE: &str = "CLUSTERING_SUMMARY.md";

/// Write the buckets as pretty JSON; returns the written path.
pub fn write_clusters_json(dir: &Path, clustering: &Clustering) -> Result<PathBuf> {
    let path = dir.join(CLUSTERS_FILE);
    let json = serde_json::to_string_pretty(&clustering.buckets).context("Failed to serialize clusters")?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Render the markdown summary.
///
/// The criteria section is generated from `thresholds`, so it always
/// describes the rules that actually produced the table.
pub fn render_summary_markdown(clustering: &Clustering, thresholds: &ClusterThresholds) -> String {
    let mut out = String::new();
    let th = thresholds;

    let _ = writeln!(out, "## Temperature-based Clustering Summary");
    let _ = writeln!(out);

    let _ = writeln!(out, "### Cluster sizes");
    for cluster in Cluster::ALL {
        let _ = writeln!(out, "- {}: {}", cluster, clustering.buckets.len_of(cluster));
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "### Criteria");
    let _ = writeln!(
        out,
        "- {}: Accuracy nearly flat across temperatures (std<={} or range<={}).",
        Cluster::TemperatureRobust,
        th.robust_std,
        th.robust_range
    );
    let _ = writeln!(
        out,
        "- {}: Best accuracy at T<={} or decreasing trend.",
        Cluster::LowTemperatureOptimal,
        th.low_max
    );
    let _ = writeln!(
        out,
        "- {}: Best accuracy at T>={} or increasing trend.",
        Cluster::HighTemperatureOptimal,
        th.high_min
    );
    let _ = writeln!(
        out,
        "- {}: Best accuracy at {}<=T<={}.",
        Cluster::MidTemperatureOptimal,
        th.mid_min,
        th.mid_max
    );
    let _ = writeln!(
        out,
        "- {}: Non-monotonic (steps over {}) with notable swings (range>={}).",
        Cluster::TemperatureSensitive,
        th.non_monotonic_eps,
        th.sensitive_range
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "### Per-question overview");
    let _ = writeln!(out, "Question | Cluster | Best T | Best Acc | Mean | Std | Slope");
    let _ = writeln!(out, "--- | --- | --- | --- | --- | --- | ---");
    for r in &clustering.rows {
        let _ = writeln!(
            out,
            "{} | {} | {} | {:.3} | {:.3} | {:.3} | {:.3}",
            r.question.replace('|', "\\|"),
            r.cluster,
            r.best_temperature,
            r.best_accuracy,
            r.mean_accuracy,
            r.std_accuracy,
            r.slope
        );
    }

    out
}

pub fn write_summary_markdown(dir: &Path, clustering: &Clustering, thresholds: &ClusterThresholds) -> Result<PathBuf> {
    let path = dir.join(SUMMARY_FILE);
    std::fs::write(&path, render_summary_markdown(clustering, thresholds))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Write both clustering artifacts into `dir`.
pub fn write_cluster_reports(dir: &Path, clustering: &Clustering, thresholds: &ClusterThresholds) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let json = write_clusters_json(dir, clustering)?;
    let md = write_summary_markdown(dir, clustering, thresholds)?;
    tracing::info!("Wrote {} and {}", json.display(), md.display());
    Ok(())
}
