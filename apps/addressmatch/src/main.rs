//! addressmatch - restaurant record deduplication
//!
//! `clean` splits a raw CSV into per-outcode partitions, `dedupe` and
//! `dedupe-all` group duplicates within partitions, and `merge` joins the
//! deduplicated partitions back into one file.

use std::path::{Path, PathBuf};

use addressmatch_core::partition::write_text_atomic;
use addressmatch_core::{
    clean, dedupe_all, dedupe_partition, merge_into, DedupeConfig, ManualOverrides,
    PartitionReport,
};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "addressmatch", author, version, about, long_about = None)]
struct Cli {
    /// TOML config file (defaults to $ADDRESSMATCH_CONFIG or the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalise a raw CSV and split it into partitions by outcode
    Clean {
        /// Raw CSV with `name` and `address` columns
        input_csv: PathBuf,
        /// Directory for the partition files
        output_dir: PathBuf,
    },

    /// Deduplicate a single partition
    Dedupe {
        /// Directory written by `clean`
        input_dir: PathBuf,
        /// Directory for deduplicated partitions
        output_dir: PathBuf,
        /// Partition key (outcode, or UNKNOWN)
        group_id: String,

        #[command(flatten)]
        thresholds: ThresholdArgs,

        /// CSV of `id1,id2` pairs that must be linked
        #[arg(long)]
        force_edges: Option<PathBuf>,

        /// CSV of `id1,id2` pairs that must not be linked
        #[arg(long)]
        remove_edges: Option<PathBuf>,
    },

    /// Deduplicate every partition
    DedupeAll {
        /// Directory written by `clean`
        input_dir: PathBuf,
        /// Directory for deduplicated partitions
        output_dir: PathBuf,

        #[command(flatten)]
        thresholds: ThresholdArgs,

        /// Directory with `forced/<key>.csv` and `removed/<key>.csv`
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Write the per-partition report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Concatenate deduplicated partitions into one CSV
    Merge {
        /// Directory written by `dedupe`/`dedupe-all`
        dir: PathBuf,
        /// Merged output file
        output_csv: PathBuf,
    },
}

#[derive(clap::Args)]
struct ThresholdArgs {
    /// Minimum name similarity for an edge (0.0-1.0)
    #[arg(long)]
    name_threshold: Option<f64>,

    /// Minimum address similarity for an edge (0.0-1.0)
    #[arg(long)]
    address_threshold: Option<f64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Clean {
            input_csv,
            output_dir,
        } => {
            let summary = clean(&input_csv, &output_dir)?;
            for (key, count) in &summary.partitions {
                println!("{}\t{}", key, count);
            }
        }
        Commands::Dedupe {
            input_dir,
            output_dir,
            group_id,
            thresholds,
            force_edges,
            remove_edges,
        } => {
            let config = load_config(cli.config.as_deref(), &thresholds)?;
            let overrides =
                ManualOverrides::from_files(force_edges.as_deref(), remove_edges.as_deref())?;
            let report = dedupe_partition(&input_dir, &output_dir, &group_id, &config, &overrides)?;
            print_report(&report);
        }
        Commands::DedupeAll {
            input_dir,
            output_dir,
            thresholds,
            overrides,
            report,
        } => {
            let config = load_config(cli.config.as_deref(), &thresholds)?;
            let reports = dedupe_all(&input_dir, &output_dir, &config, overrides.as_deref())?;
            for partition in &reports {
                print_report(partition);
            }
            if let Some(path) = report {
                write_text_atomic(&path, &serde_json::to_string_pretty(&reports)?)?;
                info!("Wrote report to {}", path.display());
            }

            let failed = reports.iter().filter(|r| !r.is_ok()).count();
            if failed > 0 {
                return Err(format!("{} of {} partitions failed", failed, reports.len()).into());
            }
        }
        Commands::Merge { dir, output_csv } => {
            merge_into(&dir, &output_csv)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file values, overridden by any thresholds given on the command line
fn load_config(
    path: Option<&Path>,
    thresholds: &ThresholdArgs,
) -> Result<DedupeConfig, Box<dyn std::error::Error>> {
    let config = DedupeConfig::discover(path)?
        .with_thresholds(thresholds.name_threshold, thresholds.address_threshold);
    config.validate()?;
    Ok(config)
}

fn print_report(report: &PartitionReport) {
    match &report.error {
        Some(message) => error!("{}: {}", report.partition, message),
        None => println!(
            "{}\trecords={}\tclusters={}\tduplicates={}\tedges={}",
            report.partition,
            report.records,
            report.clusters,
            report.duplicate_clusters,
            report.edges
        ),
    }
}
