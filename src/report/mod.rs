//! Output artifacts of a sweep.
//!
//! - `final_results.json`: the temperature table plus change analysis
//! - `temperature_clusters.json` and `CLUSTERING_SUMMARY.md`: clustering output
//! - colored terminal listings of all of the above

mod final_results;
mod print;
mod summary;

pub use final_results::{FinalResults, FinalResultsStore, FINAL_RESULTS_FILE};
pub use print::{
    print_cluster_table, print_creativity_clusters, print_final_results, render_cluster_table,
    render_creativity_clusters, render_final_results,
};
pub use summary::{
    render_summary_markdown, write_cluster_reports, write_clusters_json, write_summary_markdown,
    CLUSTERS_FILE, SUMMARY_FILE,
};
