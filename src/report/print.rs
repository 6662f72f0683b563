//! Colored terminal listings.
//!
//! Each listing has a `render_*` form returning the text and a `print_*`
//! form writing it to stdout.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use owo_colors::OwoColorize;

use super::FinalResults;
use crate::analysis::{ChangeRecord, Clustering};
use crate::types::{ChangeType, Cluster};

const RULE_WIDTH: usize = 40;

fn cluster_label(cluster: Cluster) -> String {
    match cluster {
        Cluster::LowTemperatureOptimal => cluster.name().blue().to_string(),
        Cluster::MidTemperatureOptimal => cluster.name().green().to_string(),
        Cluster::HighTemperatureOptimal => cluster.name().red().to_string(),
        Cluster::TemperatureRobust => cluster.name().dimmed().to_string(),
        Cluster::TemperatureSensitive => cluster.name().bright_magenta().bold().to_string(),
    }
}

fn change_label(change: ChangeType) -> String {
    match change {
        ChangeType::Increased => "increased".green().to_string(),
        ChangeType::Decreased => "decreased".red().to_string(),
    }
}

pub fn render_final_results(results: &FinalResults) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", " FINAL EXPERIMENT RESULTS ".bold().on_blue());

    if results.temperature_results.is_empty() {
        let _ = writeln!(out, "\n{}", "No temperature results recorded.".dimmed());
    } else {
        let _ = writeln!(out, "\n{}", "Accuracy per question and temperature".bold());
        for (temperature, questions) in results.temperature_results.iter() {
            let _ = writeln!(out, "\nTemperature: {}", temperature.bright_cyan().bold());
            for (question, acc) in questions {
                let _ = writeln!(out, "  Question: {}", question);
                let _ = writeln!(out, "    - Total Runs: {}", acc.total_runs);
                let _ = writeln!(out, "    - True Positives: {}", acc.true_positives);
                let _ = writeln!(out, "    - False Positives: {}", acc.false_positives);
                let _ = writeln!(out, "    - Accuracy: {:.2}", acc.accuracy);
            }
        }
    }

    if !results.analysis.is_empty() {
        let _ = writeln!(out, "\n{}", "Temperature-based accuracy changes".bold());
        for (question, record) in &results.analysis {
            let _ = writeln!(out, "\nQuestion: {}", question);
            match record {
                ChangeRecord::Single { single_result } => {
                    let _ = writeln!(
                        out,
                        "  Only one temperature result available (temp={}): {:.2}",
                        single_result.temperature, single_result.accuracy
                    );
                }
                ChangeRecord::Series {
                    initial_accuracy,
                    changes,
                } => {
                    let _ = writeln!(
                        out,
                        "  Initial Accuracy (temp={}): {:.2}",
                        initial_accuracy.temperature, initial_accuracy.accuracy
                    );
                    for change in changes {
                        let _ = writeln!(
                            out,
                            "  Accuracy at temp={}: {:.2} ({} from previous temp={})",
                            change.temperature,
                            change.accuracy,
                            change_label(change.change_type),
                            change.from_previous_temp
                        );
                    }
                }
            }
        }
    }

    let _ = writeln!(out, "{}", "─".repeat(RULE_WIDTH).dimmed());
    out
}

pub fn print_final_results(results: &FinalResults) {
    print!("{}", render_final_results(results));
}

pub fn render_cluster_table(clustering: &Clustering) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", " TEMPERATURE CLUSTERS ".bold().on_magenta());
    let _ = writeln!(out);

    for cluster in Cluster::ALL {
        let _ = writeln!(out, "  {:>4}  {}", clustering.buckets.len_of(cluster), cluster_label(cluster));
    }

    if clustering.rows.is_empty() {
        return out;
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{}",
        format!(
            "  {:<24} {:>6} {:>8} {:>6} {:>6} {:>7}",
            "cluster", "best T", "best acc", "mean", "std", "slope"
        )
        .dimmed()
    );
    for r in &clustering.rows {
        // pad before coloring so ANSI codes don't break alignment
        let name = format!("{:<24}", r.cluster.name());
        let _ = writeln!(
            out,
            "  {} {:>6} {:>8.3} {:>6.3} {:>6.3} {:>+7.3}  {}",
            name.replace(r.cluster.name(), &cluster_label(r.cluster)),
            r.best_temperature.to_string(),
            r.best_accuracy,
            r.mean_accuracy,
            r.std_accuracy,
            r.slope,
            r.question
        );
    }
    out
}

pub fn print_cluster_table(clustering: &Clustering) {
    print!("{}", render_cluster_table(clustering));
}

/// Creativity clusters as returned by the chat model, in the given order.
pub fn render_creativity_clusters(clusters: &BTreeMap<String, Vec<String>>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", " QUESTION CLUSTERS BY CREATIVITY ".bold().on_cyan());

    for (name, questions) in clusters {
        let _ = writeln!(out, "\nCluster: {}", name.bold());
        let _ = writeln!(out, "  Questions ({}):", questions.len());
        for question in questions {
            let _ = writeln!(out, "    - {}", question);
        }
    }
    out
}

pub fn print_creativity_clusters(clusters: &BTreeMap<String, Vec<String>>) {
    print!("{}", render_creativity_clusters(clusters));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_changes, cluster_questions, ClusterThresholds};
    use crate::store::AccuracyTable;
    use crate::types::Temperature;

    fn table() -> AccuracyTable {
        let mut table = AccuracyTable::new();
        let (cold, warm) = (Temperature::from_tenths(0), Temperature::from_tenths(6));
        table.record_observation(cold, "Who wrote this?", true);
        table.record_observation(cold, "Who wrote this?", false);
        table.record_observation(warm, "Who wrote this?", true);
        table.record_observation(warm, "Only warm?", false);
        table.finalize_temperature(cold);
        table.finalize_temperature(warm);
        table
    }

    #[test]
    fn test_final_results_listing() {
        let table = table();
        let text = render_final_results(&FinalResults::new(table.clone(), analyze_changes(&table)));

        assert!(text.contains("  Question: Who wrote this?"));
        assert!(text.contains("    - Total Runs: 2"));
        assert!(text.contains("    - Accuracy: 0.50"));
        assert!(text.contains("  Initial Accuracy (temp=0.0): 0.50"));
        assert!(text.contains("  Accuracy at temp=0.6: 1.00 ("));
        assert!(text.contains("from previous temp=0.0)"));
        assert!(text.contains("  Only one temperature result available (temp=0.6): 0.00"));
    }

    #[test]
    fn test_empty_final_results() {
        let text = render_final_results(&FinalResults::default());
        assert!(text.contains("No temperature results recorded."));
        assert!(!text.contains("Question:"));
    }

    #[test]
    fn test_cluster_table_lists_every_question() {
        let clustering = cluster_questions(&table(), &ClusterThresholds::default());
        let text = render_cluster_table(&clustering);
        assert!(text.contains("Who wrote this?"));
        assert!(text.contains("Only warm?"));
        assert_eq!(text.matches("Temperature-sensitive").count(), 1);
    }

    #[test]
    fn test_creativity_listing() {
        let mut clusters = BTreeMap::new();
        clusters.insert("Binary_Factual_Questions".to_string(), vec!["Is this fiction?".to_string()]);
        clusters.insert("Creative_Subjective_Questions".to_string(), vec![]);

        let text = render_creativity_clusters(&clusters);
        assert!(text.contains("  Questions (1):"));
        assert!(text.contains("    - Is this fiction?"));
        assert!(text.contains("  Questions (0):"));
    }
}
