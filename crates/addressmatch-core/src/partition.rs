//! Partitioning and file-per-partition storage
//!
//! Records are split by outcode so pairwise scoring stays small. Each
//! partition lives in `<dir>/<key>.csv`; every write goes through a temp
//! file in the same directory and is persisted atomically, so a failed run
//! never leaves a half-written partition behind.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{DedupeError, Result};
use crate::graph::{ManualOverrides, OverridePair};
use crate::record::{GroupedRecord, RawRow, Record};

/// Columns of a clean-stage partition file
pub const RECORD_COLUMNS: &[&str] = &["id", "name", "address", "postcode", "outcode"];

/// Columns of a dedupe-stage partition file
pub const GROUPED_COLUMNS: &[&str] = &["group_id", "id", "name", "address", "postcode", "outcode"];

/// Columns of a manual override file
pub const OVERRIDE_COLUMNS: &[&str] = &["id1", "id2"];

/// Subdirectory of the overrides directory holding forced edges
pub const FORCED_DIR: &str = "forced";

/// Subdirectory of the overrides directory holding removed edges
pub const REMOVED_DIR: &str = "removed";

const EXTENSION: &str = "csv";

/// Group records by partition key, keeping input order within each group
pub fn partition_records(records: Vec<Record>) -> BTreeMap<String, Vec<Record>> {
    let mut partitions: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for record in records {
        partitions
            .entry(record.partition_key().to_string())
            .or_default()
            .push(record);
    }
    partitions
}

/// File-per-partition store rooted at one directory
#[derive(Debug, Clone)]
pub struct PartitionRepository {
    root: PathBuf,
}

impl PartitionRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of a partition file
    pub fn partition_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", key, EXTENSION))
    }

    /// Write a clean-stage partition
    pub fn save_partition(&self, key: &str, records: &[Record]) -> Result<PathBuf> {
        let path = self.partition_path(key);
        write_csv_atomic(&path, RECORD_COLUMNS, records)?;
        debug!("Saved {} records to {}", records.len(), path.display());
        Ok(path)
    }

    /// Write every partition, creating the directory if needed
    pub fn save_all(&self, partitions: &BTreeMap<String, Vec<Record>>) -> Result<Vec<PathBuf>> {
        self.ensure_root()?;
        let paths = partitions
            .iter()
            .map(|(key, records)| self.save_partition(key, records))
            .collect::<Result<Vec<_>>>()?;
        info!(
            "Saved {} partitions to {}",
            paths.len(),
            self.root.display()
        );
        Ok(paths)
    }

    /// Read a clean-stage partition
    pub fn load_partition(&self, key: &str) -> Result<Vec<Record>> {
        let path = self.existing_path(key)?;
        read_csv(&path, RECORD_COLUMNS)
    }

    /// Write a dedupe-stage partition
    pub fn save_groups(&self, key: &str, grouped: &[GroupedRecord]) -> Result<PathBuf> {
        self.ensure_root()?;
        let path = self.partition_path(key);
        write_csv_atomic(&path, GROUPED_COLUMNS, grouped)?;
        debug!("Saved {} grouped records to {}", grouped.len(), path.display());
        Ok(path)
    }

    /// Read a dedupe-stage partition
    pub fn load_groups(&self, key: &str) -> Result<Vec<GroupedRecord>> {
        let path = self.existing_path(key)?;
        read_csv(&path, GROUPED_COLUMNS)
    }

    /// Keys of every stored partition, sorted
    pub fn partition_keys(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| DedupeError::io(&self.root, e))?;
        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| DedupeError::io(&self.root, e))?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Whether a file written at `path` would be listed as a partition here
    pub fn claims(&self, path: &Path) -> bool {
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            return false;
        }
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        match (fs::canonicalize(&self.root), fs::canonicalize(parent)) {
            (Ok(root), Ok(parent)) => root == parent,
            _ => false,
        }
    }

    /// Every clean-stage partition concatenated, in key order
    pub fn load_all(&self) -> Result<Vec<Record>> {
        let mut all = Vec::new();
        for key in self.partition_keys()? {
            all.extend(self.load_partition(&key)?);
        }
        Ok(all)
    }

    /// Every dedupe-stage partition concatenated, in key order
    pub fn load_all_groups(&self) -> Result<Vec<GroupedRecord>> {
        let mut all = Vec::new();
        for key in self.partition_keys()? {
            all.extend(self.load_groups(&key)?);
        }
        Ok(all)
    }

    fn existing_path(&self, key: &str) -> Result<PathBuf> {
        let invalid = key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.');
        let path = self.partition_path(key);
        if invalid || !path.is_file() {
            return Err(DedupeError::PartitionNotFound(key.to_string()));
        }
        Ok(path)
    }

    fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| DedupeError::io(&self.root, e))
    }
}

impl ManualOverrides {
    /// Load `<dir>/forced/<key>.csv` and `<dir>/removed/<key>.csv`
    ///
    /// Either file may be absent.
    pub fn load_for_partition(dir: &Path, key: &str) -> Result<Self> {
        let load = |sub: &str| -> Result<Vec<OverridePair>> {
            let path = dir.join(sub).join(format!("{}.{}", key, EXTENSION));
            if path.is_file() {
                load_override_pairs(&path)
            } else {
                Ok(Vec::new())
            }
        };
        Ok(Self {
            forced: load(FORCED_DIR)?,
            removed: load(REMOVED_DIR)?,
        })
    }

    /// Load explicit forced/removed files
    pub fn from_files(forced: Option<&Path>, removed: Option<&Path>) -> Result<Self> {
        Ok(Self {
            forced: forced.map(load_override_pairs).transpose()?.unwrap_or_default(),
            removed: removed.map(load_override_pairs).transpose()?.unwrap_or_default(),
        })
    }
}

/// Read an `id1,id2` override file fully into memory
pub fn load_override_pairs(path: &Path) -> Result<Vec<OverridePair>> {
    read_csv(path, OVERRIDE_COLUMNS)
}

/// Read the raw source CSV
///
/// `name` and `address` columns are required; any other columns are kept
/// only as input to the record id.
pub fn read_raw_rows(path: &Path) -> Result<Vec<RawRow>> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|e| DedupeError::input_format(path, e.to_string()))?
        .clone();

    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| DedupeError::input_format(path, format!("missing column `{}`", name)))
    };
    let name_idx = column("name")?;
    let address_idx = column("address")?;

    let mut rows = Vec::new();
    for (position, result) in reader.records().enumerate() {
        let record = result.map_err(|e| DedupeError::input_format(path, e.to_string()))?;
        let fields: Vec<String> = record.iter().map(str::to_string).collect();
        rows.push(RawRow {
            position,
            name: fields[name_idx].clone(),
            address: fields[address_idx].clone(),
            fields,
        });
    }
    Ok(rows)
}

fn open_reader(path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).map_err(|e| DedupeError::io(path, e))?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file)))
}

fn read_csv<T: DeserializeOwned>(path: &Path, required: &[&str]) -> Result<Vec<T>> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|e| DedupeError::input_format(path, e.to_string()))?
        .clone();
    if let Some(missing) = required.iter().find(|col| !headers.iter().any(|h| h == **col)) {
        return Err(DedupeError::input_format(
            path,
            format!("missing column `{}`", missing),
        ));
    }

    reader
        .deserialize()
        .map(|row| row.map_err(|e| DedupeError::input_format(path, e.to_string())))
        .collect()
}

fn write_csv_atomic<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| DedupeError::io(dir, e))?;

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(tmp.as_file_mut());
        writer.write_record(header)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(|e| DedupeError::io(path, e))?;
    }
    tmp.as_file_mut()
        .sync_all()
        .map_err(|e| DedupeError::io(path, e))?;

    tmp.persist(path)
        .map_err(|e| DedupeError::io(path, e.error))?;
    Ok(())
}

/// Write grouped records to an arbitrary CSV path (atomically)
pub fn write_grouped_csv(path: &Path, grouped: &[GroupedRecord]) -> Result<()> {
    write_csv_atomic(path, GROUPED_COLUMNS, grouped)
}

/// Atomically write a text file (run reports)
pub fn write_text_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| DedupeError::io(dir, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| DedupeError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| DedupeError::io(path, e.error))?;
    Ok(())
}
