//! Error types for addressmatch-core

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for addressmatch operations
pub type Result<T> = std::result::Result<T, DedupeError>;

/// Main error type for addressmatch operations
///
/// Every variant aborts the partition being processed; other partitions
/// are unaffected. A missing postcode and an empty partition are not
/// errors and have no variant here.
#[derive(Error, Debug)]
pub enum DedupeError {
    /// Source data is malformed or lacks a required column
    #[error("Invalid input in {path}: {message}")]
    InputFormat { path: PathBuf, message: String },

    /// A manual override names an id that is not in the partition
    #[error("Override references unknown id {id} in partition {partition}")]
    InvalidReference { id: String, partition: String },

    /// No stored file exists for the requested partition
    #[error("Partition not found: {0}")]
    PartitionNotFound(String),

    /// Similarity matrices and records disagree on size
    #[error("Dimension mismatch: {records} records but {matrix} x {matrix} matrix")]
    DimensionMismatch { records: usize, matrix: usize },

    /// Filesystem failure on a specific path
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding or decoding failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An output file would land among the partitions it was built from
    #[error("Output {output} is inside partition directory {dir}")]
    OutputInsideInput { output: PathBuf, dir: PathBuf },

    /// Configuration could not be loaded or is out of range
    #[error("Config error: {0}")]
    Config(String),
}

impl DedupeError {
    /// Wrap an IO error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DedupeError::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an input-format error for a file
    pub fn input_format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        DedupeError::InputFormat {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for DedupeError {
    fn from(err: toml::de::Error) -> Self {
        DedupeError::Config(err.to_string())
    }
}
