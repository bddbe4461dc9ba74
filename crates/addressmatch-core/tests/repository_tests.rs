//! Partition storage and end-to-end pipeline tests

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use addressmatch_core::partition::{load_override_pairs, write_grouped_csv};
use addressmatch_core::{
    clean, dedupe_all, dedupe_partition, merge_into, merge_outputs, partition_records,
    read_raw_rows,
    DedupeConfig, DedupeError, GroupedRecord, ManualOverrides, OverridePair, PartitionRepository,
    Record,
};
use common::fixtures::{records, restaurants_csv};
use proptest::prelude::*;
use tempfile::TempDir;

/// Clean the restaurant fixture into a fresh directory
fn cleaned() -> (TempDir, CleanDirs) {
    let tmp = tempfile::tempdir().unwrap();
    let dirs = CleanDirs {
        clean: tmp.path().join("clean"),
        deduped: tmp.path().join("deduped"),
        overrides: tmp.path().join("overrides"),
    };
    clean(&restaurants_csv(), &dirs.clean).unwrap();
    (tmp, dirs)
}

struct CleanDirs {
    clean: PathBuf,
    deduped: PathBuf,
    overrides: PathBuf,
}

fn id_of(dir: &Path, key: &str, name: &str) -> String {
    PartitionRepository::new(dir)
        .load_partition(key)
        .unwrap()
        .into_iter()
        .find(|r| r.name == name)
        .map(|r| r.id)
        .unwrap()
}

fn write_overrides(dir: &Path, sub: &str, key: &str, pairs: &[(&str, &str)]) {
    let sub_dir = dir.join(sub);
    fs::create_dir_all(&sub_dir).unwrap();
    let mut content = String::from("id1,id2\n");
    for (a, b) in pairs {
        content.push_str(&format!("{},{}\n", a, b));
    }
    fs::write(sub_dir.join(format!("{}.csv", key)), content).unwrap();
}

// =============================================================================
// Raw input
// =============================================================================

#[test]
fn test_read_raw_rows() {
    let rows = read_raw_rows(&restaurants_csv()).unwrap();
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0].position, 0);
    assert_eq!(rows[0].name, "Pizza Express");
    assert_eq!(rows[0].fields.len(), 3);
    assert_eq!(rows[0].record_id().len(), 64);
}

#[test]
fn test_missing_address_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    fs::write(&path, "name,street\nDishoom,Kingly St\n").unwrap();

    match read_raw_rows(&path) {
        Err(DedupeError::InputFormat { path: reported, message }) => {
            assert_eq!(reported, path);
            assert!(message.contains("address"));
        }
        other => panic!("expected InputFormat, got {:?}", other),
    }
}

#[test]
fn test_missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = clean(&dir.path().join("nope.csv"), dir.path());
    assert!(matches!(result, Err(DedupeError::Io { .. })));
}

// =============================================================================
// Repository
// =============================================================================

#[test]
fn test_partition_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let repo = PartitionRepository::new(dir.path().join("parts"));
    let partition = vec![
        Record::new("a", "dishoom", "22 kingly street", Some("W1B 5QP".into())),
        Record::new("b", "corner cafe", "unit 4 market square", None),
    ];
    let partitions = partition_records(partition.clone());
    repo.save_all(&partitions).unwrap();

    assert_eq!(repo.partition_keys().unwrap(), vec!["UNKNOWN", "W1B"]);
    assert_eq!(repo.load_partition("W1B").unwrap(), vec![partition[0].clone()]);
    assert_eq!(repo.load_partition("UNKNOWN").unwrap(), vec![partition[1].clone()]);
    assert_eq!(repo.load_all().unwrap().len(), 2);
}

#[test]
fn test_overwrite_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let repo = PartitionRepository::new(dir.path());
    repo.save_partition("E1", &records(&["a", "b"])).unwrap();
    repo.save_partition("E1", &records(&["c"])).unwrap();

    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
    let loaded = repo.load_partition("E1").unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, "c");
}

#[test]
fn test_grouped_partition_missing_column() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("E1.csv"), "id,name\na,cafe\n").unwrap();
    let repo = PartitionRepository::new(dir.path());
    assert!(matches!(
        repo.load_groups("E1"),
        Err(DedupeError::InputFormat { .. })
    ));
}

#[test]
fn test_write_grouped_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("all.csv");
    let grouped = vec![GroupedRecord::new("a", Record::new("b", "n", "x", None))];
    write_grouped_csv(&path, &grouped).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("group_id,id,name,address,postcode,outcode\n"));
    assert!(content.contains("a,b,n,x,,"));
}

// =============================================================================
// Overrides
// =============================================================================

#[test]
fn test_load_override_files() {
    let dir = tempfile::tempdir().unwrap();
    write_overrides(dir.path(), "forced", "E1", &[("a", "b"), ("c", "d")]);

    let forced = dir.path().join("forced").join("E1.csv");
    assert_eq!(
        load_override_pairs(&forced).unwrap(),
        vec![OverridePair::new("a", "b"), OverridePair::new("c", "d")]
    );

    let overrides = ManualOverrides::from_files(Some(forced.as_path()), None).unwrap();
    assert_eq!(overrides.forced.len(), 2);
    assert!(overrides.removed.is_empty());

    let per_partition = ManualOverrides::load_for_partition(dir.path(), "E1").unwrap();
    assert_eq!(per_partition, overrides);
    assert!(ManualOverrides::load_for_partition(dir.path(), "E2")
        .unwrap()
        .is_empty());
}

#[test]
fn test_override_file_without_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pairs.csv");
    fs::write(&path, "a,b\n").unwrap();
    assert!(matches!(
        load_override_pairs(&path),
        Err(DedupeError::InputFormat { .. })
    ));
}

// =============================================================================
// Pipeline
// =============================================================================

#[test]
fn test_clean_partitions_by_outcode() {
    let tmp = tempfile::tempdir().unwrap();
    let summary = clean(&restaurants_csv(), tmp.path()).unwrap();

    assert_eq!(summary.rows, 6);
    assert_eq!(summary.without_postcode, 1);
    assert_eq!(
        summary.partitions,
        vec![
            ("UNKNOWN".to_string(), 1),
            ("W1B".to_string(), 1),
            ("W1D".to_string(), 4),
        ]
    );

    let w1d = PartitionRepository::new(tmp.path()).load_partition("W1D").unwrap();
    assert_eq!(w1d[0].name, "pizza express");
    assert_eq!(w1d[0].address, "10 dean street london");
    assert_eq!(w1d[1].address, "10 dean street");
    assert_eq!(w1d[1].postcode.as_deref(), Some("W1D 3RW"));
}

#[test]
fn test_clean_is_deterministic() {
    let tmp = tempfile::tempdir().unwrap();
    let first = tmp.path().join("first");
    let second = tmp.path().join("second");
    clean(&restaurants_csv(), &first).unwrap();
    clean(&restaurants_csv(), &second).unwrap();

    for key in ["UNKNOWN", "W1B", "W1D"] {
        let a = fs::read_to_string(first.join(format!("{}.csv", key))).unwrap();
        let b = fs::read_to_string(second.join(format!("{}.csv", key))).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_dedupe_all_then_merge() {
    let (_tmp, dirs) = cleaned();
    let reports = dedupe_all(&dirs.clean, &dirs.deduped, &DedupeConfig::default(), None).unwrap();

    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.is_ok()));
    let w1d = reports.iter().find(|r| r.partition == "W1D").unwrap();
    assert_eq!(w1d.records, 4);
    assert_eq!(w1d.clusters, 2);
    assert_eq!(w1d.duplicate_clusters, 2);
    assert_eq!(w1d.edges, 2);

    let merged = merge_outputs(&dirs.deduped).unwrap();
    assert_eq!(merged.len(), 6);
    let mut groups: Vec<&str> = merged.iter().map(|g| g.group_id.as_str()).collect();
    assert!(groups.windows(2).all(|w| w[0] <= w[1]));
    groups.dedup();
    assert_eq!(groups.len(), 4);

    let pizza: Vec<&GroupedRecord> = merged.iter().filter(|g| g.name == "pizza express").collect();
    assert_eq!(pizza.len(), 2);
    assert_eq!(pizza[0].group_id, pizza[1].group_id);
    assert!(pizza.iter().any(|g| g.is_representative()));
}

#[test]
fn test_merge_into_rejects_output_among_partitions() {
    let (_tmp, dirs) = cleaned();
    dedupe_all(&dirs.clean, &dirs.deduped, &DedupeConfig::default(), None).unwrap();
    let inside = dirs.deduped.join("merged.csv");

    let result = merge_into(&dirs.deduped, &inside);
    assert!(matches!(result, Err(DedupeError::OutputInsideInput { .. })));
    assert!(!inside.exists());
    assert_eq!(
        PartitionRepository::new(&dirs.deduped).partition_keys().unwrap(),
        vec!["UNKNOWN", "W1B", "W1D"]
    );
}

#[test]
fn test_merge_into_writes_outside_partitions() {
    let (tmp, dirs) = cleaned();
    dedupe_all(&dirs.clean, &dirs.deduped, &DedupeConfig::default(), None).unwrap();
    let output = tmp.path().join("merged.csv");

    assert_eq!(merge_into(&dirs.deduped, &output).unwrap(), 6);
    assert!(output.is_file());
    assert_eq!(merge_outputs(&dirs.deduped).unwrap().len(), 6);

    // A non-csv name inside the directory is never read back as a partition
    let notes = dirs.deduped.join("merged.txt");
    assert_eq!(merge_into(&dirs.deduped, &notes).unwrap(), 6);
    assert_eq!(merge_outputs(&dirs.deduped).unwrap().len(), 6);
}

#[test]
fn test_forced_override_merges_groups() {
    let (_tmp, dirs) = cleaned();
    let pizza = id_of(&dirs.clean, "W1D", "pizza express");
    let dragon = id_of(&dirs.clean, "W1D", "golden dragon restaurant");
    write_overrides(&dirs.overrides, "forced", "W1D", &[(pizza.as_str(), dragon.as_str())]);

    let overrides = ManualOverrides::load_for_partition(&dirs.overrides, "W1D").unwrap();
    let report = dedupe_partition(
        &dirs.clean,
        &dirs.deduped,
        "W1D",
        &DedupeConfig::default(),
        &overrides,
    )
    .unwrap();

    assert_eq!(report.clusters, 1);
    let grouped = PartitionRepository::new(&dirs.deduped).load_groups("W1D").unwrap();
    assert_eq!(grouped.len(), 4);
    assert!(grouped.iter().all(|g| g.group_id == grouped[0].group_id));
}

#[test]
fn test_removed_override_splits_duplicates() {
    let (_tmp, dirs) = cleaned();
    let first = id_of(&dirs.clean, "W1D", "golden dragon restaurant");
    let second = id_of(&dirs.clean, "W1D", "the golden dragon restaurant");
    write_overrides(&dirs.overrides, "removed", "W1D", &[(first.as_str(), second.as_str())]);

    let reports = dedupe_all(
        &dirs.clean,
        &dirs.deduped,
        &DedupeConfig::default(),
        Some(dirs.overrides.as_path()),
    )
    .unwrap();
    let w1d = reports.iter().find(|r| r.partition == "W1D").unwrap();
    assert_eq!(w1d.clusters, 3);
    assert_eq!(w1d.duplicate_clusters, 1);
}

#[test]
fn test_failing_partition_does_not_affect_others() {
    let (_tmp, dirs) = cleaned();
    write_overrides(&dirs.overrides, "forced", "W1B", &[("missing", "other")]);

    let reports = dedupe_all(
        &dirs.clean,
        &dirs.deduped,
        &DedupeConfig::default(),
        Some(dirs.overrides.as_path()),
    )
    .unwrap();

    let w1b = reports.iter().find(|r| r.partition == "W1B").unwrap();
    assert!(!w1b.is_ok());
    assert!(w1b.error.as_deref().unwrap().contains("missing"));
    assert!(reports.iter().filter(|r| r.partition != "W1B").all(|r| r.is_ok()));

    let output = PartitionRepository::new(&dirs.deduped);
    assert_eq!(output.partition_keys().unwrap(), vec!["UNKNOWN", "W1D"]);
    assert_eq!(merge_outputs(&dirs.deduped).unwrap().len(), 5);
}

#[test]
fn test_unknown_partition_key() {
    let (_tmp, dirs) = cleaned();
    let result = dedupe_partition(
        &dirs.clean,
        &dirs.deduped,
        "ZZ9",
        &DedupeConfig::default(),
        &ManualOverrides::default(),
    );
    assert!(matches!(result, Err(DedupeError::PartitionNotFound(ref key)) if key == "ZZ9"));
}

// =============================================================================
// Properties
// =============================================================================

/// Text that needs quoting in CSV, plus non-ASCII letters
fn awkward_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,\"\n'\u{00E9}\u{00FC}\u{4E2D}\u{0666}-]{0,24}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn saved_partition_loads_back_identically(
        rows in prop::collection::vec(
            (awkward_text(), awkward_text(), prop::option::of("[A-Z]{1,2}[0-9] [0-9][A-Z]{2}")),
            0..6,
        ),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let repo = PartitionRepository::new(dir.path());
        let partition: Vec<Record> = rows
            .into_iter()
            .enumerate()
            .map(|(i, (name, address, postcode))| {
                Record::new(format!("id{:02}", i), name, address, postcode)
            })
            .collect();

        repo.save_partition("P", &partition).unwrap();
        prop_assert_eq!(repo.load_partition("P").unwrap(), partition);
    }
}
