//! Clean and dedupe stages
//!
//! ```text
//! raw CSV ─clean─▶ <clean dir>/<outcode>.csv ─dedupe─▶ <out dir>/<outcode>.csv
//! ```
//!
//! Within a partition every step runs sequentially. `dedupe_all` runs
//! partitions in parallel; a failing partition is reported and does not
//! affect the others.

use std::path::Path;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::cluster::{assign_groups, resolve_clusters, GroupAssignment};
use crate::config::DedupeConfig;
use crate::error::{DedupeError, Result};
use crate::graph::{CandidateGraph, ManualOverrides};
use crate::normalisation::normalise_row;
use crate::partition::{partition_records, read_raw_rows, write_grouped_csv, PartitionRepository};
use crate::record::{GroupedRecord, Record};
use crate::similarity::SimilarityScorer;

/// What the clean stage produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanSummary {
    /// Rows read from the source file
    pub rows: usize,
    /// Rows with no recognisable postcode
    pub without_postcode: usize,
    /// (partition key, record count), sorted by key
    pub partitions: Vec<(String, usize)>,
}

/// Result of deduplicating one partition in memory
#[derive(Debug, Clone)]
pub struct DedupeOutcome {
    pub partition: String,
    /// Output rows, sorted by group id
    pub grouped: Vec<GroupedRecord>,
    pub assignment: GroupAssignment,
    /// Edges after overrides
    pub edge_count: usize,
}

impl DedupeOutcome {
    pub fn report(&self) -> PartitionReport {
        PartitionReport {
            partition: self.partition.clone(),
            records: self.grouped.len(),
            clusters: self.assignment.cluster_count(),
            duplicate_clusters: self.assignment.duplicate_clusters().count(),
            edges: self.edge_count,
            error: None,
        }
    }
}

/// Per-partition summary of a dedupe run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionReport {
    pub partition: String,
    pub records: usize,
    pub clusters: usize,
    pub duplicate_clusters: usize,
    pub edges: usize,
    /// Set when the partition failed; no output was written for it
    pub error: Option<String>,
}

impl PartitionReport {
    fn failed(partition: &str, error: String) -> Self {
        Self {
            partition: partition.to_string(),
            records: 0,
            clusters: 0,
            duplicate_clusters: 0,
            edges: 0,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Clean a raw CSV into per-outcode partition files
pub fn clean(input_csv: &Path, output_dir: &Path) -> Result<CleanSummary> {
    let started = Instant::now();
    let rows = read_raw_rows(input_csv)?;
    info!("Read {} rows from {}", rows.len(), input_csv.display());

    let records: Vec<Record> = rows.iter().map(normalise_row).collect();
    let without_postcode = records.iter().filter(|r| r.postcode.is_none()).count();
    if without_postcode > 0 {
        warn!("{} rows have no recognisable postcode", without_postcode);
    }

    let partitions = partition_records(records);
    PartitionRepository::new(output_dir).save_all(&partitions)?;

    info!(
        "Cleaned {} rows into {} partitions in {:.2?}",
        rows.len(),
        partitions.len(),
        started.elapsed()
    );
    Ok(CleanSummary {
        rows: rows.len(),
        without_postcode,
        partitions: partitions
            .iter()
            .map(|(key, records)| (key.clone(), records.len()))
            .collect(),
    })
}

/// Deduplicate one partition's records in memory
///
/// Steps: score names, score addresses, build the candidate graph, apply
/// overrides (forced, then removed), resolve clusters, label records.
pub fn dedupe_records(
    partition: &str,
    records: Vec<Record>,
    config: &DedupeConfig,
    overrides: &ManualOverrides,
    scorer: &dyn SimilarityScorer,
) -> Result<DedupeOutcome> {
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    let addresses: Vec<&str> = records.iter().map(|r| r.address.as_str()).collect();
    let name_sim = scorer.score(&names);
    let address_sim = scorer.score(&addresses);

    let mut graph = CandidateGraph::build(
        partition,
        &records,
        &name_sim,
        &address_sim,
        config.thresholds,
    )?;
    let computed_edges = graph.edge_count();
    graph.apply_overrides(overrides)?;

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    let assignment = resolve_clusters(&graph, &ids);

    info!(
        "Partition {}: {} records, {} edges ({} computed), {} clusters",
        partition,
        records.len(),
        graph.edge_count(),
        computed_edges,
        assignment.cluster_count()
    );

    let edge_count = graph.edge_count();
    let grouped = assign_groups(records, &assignment);
    Ok(DedupeOutcome {
        partition: partition.to_string(),
        grouped,
        assignment,
        edge_count,
    })
}

/// Load, deduplicate and save one partition
pub fn dedupe_partition(
    input_dir: &Path,
    output_dir: &Path,
    key: &str,
    config: &DedupeConfig,
    overrides: &ManualOverrides,
) -> Result<PartitionReport> {
    let scorer = config.scorer();
    run_partition(
        &PartitionRepository::new(input_dir),
        &PartitionRepository::new(output_dir),
        key,
        config,
        overrides,
        scorer.as_ref(),
    )
}

/// Deduplicate every partition in `input_dir`
///
/// Overrides are read per partition from `overrides_dir` when given.
pub fn dedupe_all(
    input_dir: &Path,
    output_dir: &Path,
    config: &DedupeConfig,
    overrides_dir: Option<&Path>,
) -> Result<Vec<PartitionReport>> {
    let input = PartitionRepository::new(input_dir);
    let output = PartitionRepository::new(output_dir);
    let keys = input.partition_keys()?;
    let scorer = config.scorer();
    info!(
        "Deduplicating {} partitions with {}",
        keys.len(),
        scorer.name()
    );

    let run = |key: &String| -> PartitionReport {
        let result = match overrides_dir {
            Some(dir) => ManualOverrides::load_for_partition(dir, key),
            None => Ok(ManualOverrides::default()),
        }
        .and_then(|overrides| {
            run_partition(&input, &output, key, config, &overrides, scorer.as_ref())
        });

        result.unwrap_or_else(|err| {
            warn!("Partition {} failed: {}", key, err);
            PartitionReport::failed(key, err.to_string())
        })
    };

    #[cfg(feature = "parallel")]
    let reports: Vec<PartitionReport> = keys.par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let reports: Vec<PartitionReport> = keys.iter().map(run).collect();

    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    info!(
        "Finished {} partitions ({} failed)",
        reports.len(),
        failed
    );
    Ok(reports)
}

/// Concatenate every dedupe-stage partition, sorted by (group id, id)
pub fn merge_outputs(dir: &Path) -> Result<Vec<GroupedRecord>> {
    let mut all = PartitionRepository::new(dir).load_all_groups()?;
    all.sort_by(|a, b| (&a.group_id, &a.id).cmp(&(&b.group_id, &b.id)));
    Ok(all)
}

/// Merge the partitions in `dir` into a single CSV at `output_csv`
///
/// The output may not be a partition file of `dir` itself, or the next run
/// over `dir` would read the merged file back as a partition. Returns the
/// number of rows written.
pub fn merge_into(dir: &Path, output_csv: &Path) -> Result<usize> {
    if PartitionRepository::new(dir).claims(output_csv) {
        return Err(DedupeError::OutputInsideInput {
            output: output_csv.to_path_buf(),
            dir: dir.to_path_buf(),
        });
    }
    let merged = merge_outputs(dir)?;
    write_grouped_csv(output_csv, &merged)?;
    info!(
        "Merged {} records into {}",
        merged.len(),
        output_csv.display()
    );
    Ok(merged.len())
}

fn run_partition(
    input: &PartitionRepository,
    output: &PartitionRepository,
    key: &str,
    config: &DedupeConfig,
    overrides: &ManualOverrides,
    scorer: &dyn SimilarityScorer,
) -> Result<PartitionReport> {
    let records = input.load_partition(key)?;
    let outcome = dedupe_records(key, records, config, overrides, scorer)?;
    output.save_groups(key, &outcome.grouped)?;
    Ok(outcome.report())
}
