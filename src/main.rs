//! tempsweep CLI - temperature sweeps for vision question answering
//!
//! Subcommands:
//!
//! 1. `run`: sweep the dataset across temperatures, rate every answer,
//!    accumulate the accuracy table and write `final_results.json`
//! 2. `analyze`: rebuild `final_results.json` from the stored table
//! 3. `report`: print `final_results.json`
//! 4. `cluster`: cluster questions by temperature profile and write
//!    `temperature_clusters.json` + `CLUSTERING_SUMMARY.md`
//! 5. `creativity`: ask the chat model to group questions by creativity
//!
//! Every flag has a default, so `tempsweep run` inside a data directory
//! works with no further arguments.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;

use tempsweep::analysis::{analyze_changes, cluster_questions};
use tempsweep::config::{SweepConfig, API_KEY_ENV};
use tempsweep::experiment::{load_manifest, ExperimentRunner, OpenAiClient, OpenAiRater, OpenAiVqaModel};
use tempsweep::report::{self, FinalResults, FinalResultsStore};
use tempsweep::store::{AccuracyStore, LegacyStore};
use tempsweep::types::Temperature;

/// Measure how sampling temperature affects VQA accuracy, per question.
#[derive(Parser, Debug)]
#[command(name = "tempsweep")]
#[command(version)]
#[command(about, long_about = None)]
struct Cli {
    /// Directory holding tempsweep.toml and all result files
    #[arg(long, global = true, default_value = ".")]
    data_dir: PathBuf,

    /// Debug-level diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the sweep and write final results
    Run {
        /// Temperatures to sweep, overriding the config (e.g. 0.0,0.5,1.0)
        #[arg(long, value_delimiter = ',')]
        temperatures: Vec<Temperature>,

        /// Limit the number of dataset entries
        #[arg(long)]
        num_images: Option<usize>,
    },

    /// Recompute final_results.json from the stored accuracy table
    Analyze,

    /// Print final_results.json
    Report,

    /// Cluster questions by how accuracy responds to temperature
    Cluster {
        /// Output directory for the cluster files (defaults to --data-dir)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Group questions by creativity using the chat model
    Creativity,
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = SweepConfig::load(&cli.data_dir)?;
    if cli.verbose {
        eprintln!("{}", config.display_summary());
    }

    match cli.command {
        Command::Run {
            temperatures,
            num_images,
        } => run(&cli.data_dir, config, temperatures, num_images).await,
        Command::Analyze => analyze(&cli.data_dir),
        Command::Report => {
            let results = FinalResultsStore::in_dir(&cli.data_dir).load()?;
            report::print_final_results(&results);
            Ok(())
        }
        Command::Cluster { out_dir } => {
            let out_dir = out_dir.unwrap_or_else(|| cli.data_dir.clone());
            cluster(&cli.data_dir, &out_dir, &config)
        }
        Command::Creativity => creativity(&cli.data_dir, &config).await,
    }
}

/// The API key, or `None` after telling the user it is missing.
fn api_key() -> Option<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => {
            eprintln!("{} {} environment variable not set.", "Error:".red().bold(), API_KEY_ENV);
            None
        }
    }
}

async fn run(
    data_dir: &Path,
    mut config: SweepConfig,
    temperatures: Vec<Temperature>,
    num_images: Option<usize>,
) -> Result<()> {
    let Some(key) = api_key() else {
        return Ok(());
    };
    if !temperatures.is_empty() {
        config.temperatures = temperatures;
    }
    if num_images.is_some() {
        config.num_images = num_images;
    }

    let manifest = config.dataset_path(data_dir);
    let dataset = load_manifest(&manifest, config.num_images)
        .with_context(|| format!("Failed to load dataset from {}", manifest.display()))?;

    let client = OpenAiClient::new(key, &config.api_base);
    let vqa = OpenAiVqaModel::new(client.clone(), &config.vqa_model, config.max_tokens);
    let rater = OpenAiRater::new(client, &config.rater_model);

    let mut runner = ExperimentRunner::new(
        Arc::new(vqa),
        Arc::new(rater),
        dataset,
        AccuracyStore::in_dir(data_dir),
        LegacyStore::in_dir(data_dir),
    )?
    .with_policy(config.rating_failures);

    let summary = runner.run(&config.temperatures).await?;
    let results = runner.save_final_results(&FinalResultsStore::in_dir(data_dir))?;

    report::print_final_results(&results);
    println!(
        "{} {} temperatures × {} entries, {} observations ({} failed queries, {} failed ratings, {} N/A skipped)",
        "✓".green(),
        summary.temperatures,
        runner.dataset_len(),
        summary.observations_recorded,
        summary.queries_failed,
        summary.ratings_failed,
        summary.answers_skipped
    );
    Ok(())
}

fn analyze(data_dir: &Path) -> Result<()> {
    let table = AccuracyStore::in_dir(data_dir).load()?;
    let stats = table.stats();
    tracing::info!(
        "Loaded {} temperatures, {} questions, {} observations",
        stats.temperatures,
        stats.questions,
        stats.observations
    );

    let analysis = analyze_changes(&table);
    let results = FinalResults::new(table, analysis);
    FinalResultsStore::in_dir(data_dir).save(&results)?;
    report::print_final_results(&results);
    Ok(())
}

fn cluster(data_dir: &Path, out_dir: &Path, config: &SweepConfig) -> Result<()> {
    let table = AccuracyStore::in_dir(data_dir).load()?;
    let clustering = cluster_questions(&table, &config.clustering);

    report::write_cluster_reports(out_dir, &clustering, &config.clustering)?;
    report::print_cluster_table(&clustering);
    println!(
        "\n{} Wrote {} and {}",
        "✓".green(),
        report::CLUSTERS_FILE,
        report::SUMMARY_FILE
    );
    Ok(())
}

async fn creativity(data_dir: &Path, config: &SweepConfig) -> Result<()> {
    let Some(key) = api_key() else {
        return Ok(());
    };

    let table = AccuracyStore::in_dir(data_dir).load()?;
    let questions: Vec<&str> = table.questions().into_iter().collect();
    if questions.is_empty() {
        println!("No questions recorded yet; run a sweep first.");
        return Ok(());
    }

    let client = OpenAiClient::new(key, &config.api_base);
    let clusters = client
        .cluster_by_creativity(&config.vqa_model, &questions)
        .await
        .context("Creativity clustering failed")?;
    report::print_creativity_clusters(&clusters);
    Ok(())
}
