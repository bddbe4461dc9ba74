//! addressmatch-core - Restaurant record deduplication
//!
//! This crate provides the building blocks of the addressmatch pipeline:
//!
//! - **Record**: clean and grouped record types, deterministic record ids
//! - **Normalisation**: name/address cleanup and postcode extraction
//! - **Similarity**: pluggable pairwise scorers (TF-IDF cosine, Jaro-Winkler)
//! - **Graph**: candidate duplicate graph with manual edge overrides
//! - **Cluster**: connected components and stable group ids
//! - **Partition**: outcode partitioning and file-per-partition storage
//! - **Pipeline**: the `clean` and `dedupe` stages
//! - **Config**: TOML-loadable thresholds and scorer settings
//!
//! # Data flow
//!
//! ```text
//! raw rows → normalise → partition by outcode
//!          → (per partition) score names + addresses
//!          → candidate graph → overrides → clusters → grouped records
//! ```

pub mod cluster;
pub mod config;
pub mod error;
pub mod graph;
pub mod normalisation;
pub mod partition;
pub mod pipeline;
pub mod record;
pub mod similarity;

pub use cluster::{assign_groups, resolve_clusters, Cluster, GroupAssignment};
pub use config::{DedupeConfig, ScorerKind, SimilarityConfig};
pub use error::{DedupeError, Result};
pub use graph::{CandidateGraph, EdgeKind, ManualOverrides, OverridePair, Thresholds};
pub use normalisation::{
    expand_abbreviations, normalise_address, normalise_name, normalise_row, split_address,
    SplitAddress,
};
pub use partition::{partition_records, read_raw_rows, PartitionRepository};
pub use pipeline::{
    clean, dedupe_all, dedupe_partition, dedupe_records, merge_into, merge_outputs, CleanSummary,
    DedupeOutcome, PartitionReport,
};
pub use record::{derive_record_id, GroupedRecord, RawRow, Record, UNKNOWN_PARTITION};
pub use similarity::{
    Analyzer, JaroWinklerScorer, SimilarityMatrix, SimilarityScorer, TfidfCosineScorer,
};
