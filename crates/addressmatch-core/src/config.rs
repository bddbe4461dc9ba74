//! Configuration for addressmatch
//!
//! Loaded from a TOML file; every field has a default so a partial (or
//! missing) file is fine:
//!
//! ```toml
//! [thresholds]
//! name = 0.1
//! address = 0.1
//!
//! [similarity]
//! scorer = "tfidf"
//! analyzer = "word"
//! ngram_min = 2
//! ngram_max = 3
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DedupeError, Result};
use crate::graph::Thresholds;
use crate::similarity::{Analyzer, JaroWinklerScorer, SimilarityScorer, TfidfCosineScorer};

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "ADDRESSMATCH_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeConfig {
    /// Edge thresholds for the candidate graph
    pub thresholds: Thresholds,
    /// Similarity scorer settings
    pub similarity: SimilarityConfig,
}

/// Which scorer backs the similarity matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ScorerKind {
    #[default]
    Tfidf,
    JaroWinkler,
}

/// Similarity scorer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub scorer: ScorerKind,
    /// Feature analyzer (TF-IDF only)
    pub analyzer: Analyzer,
    /// Shortest n-gram (TF-IDF only)
    pub ngram_min: usize,
    /// Longest n-gram (TF-IDF only)
    pub ngram_max: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            scorer: ScorerKind::Tfidf,
            analyzer: Analyzer::Word,
            ngram_min: 2,
            ngram_max: 3,
        }
    }
}

impl DedupeConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DedupeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| DedupeError::io(path, e))?;
        Self::from_toml_str(&content)
            .map_err(|e| DedupeError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Resolve configuration: explicit path, then `$ADDRESSMATCH_CONFIG`,
    /// then the user config directory, else defaults
    ///
    /// An explicitly named file must exist; the fallbacks are optional.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Self::from_file(path);
            }
        }
        if let Some(path) = default_config_path().filter(|p| p.exists()) {
            debug!("Loading config from {}", path.display());
            return Self::from_file(path);
        }
        Ok(Self::default())
    }

    /// Reject thresholds outside [0, 1] and empty n-gram ranges
    pub fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("name", self.thresholds.name),
            ("address", self.thresholds.address),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DedupeError::Config(format!(
                    "{} threshold must be within [0, 1], got {}",
                    label, value
                )));
            }
        }
        let sim = &self.similarity;
        if sim.ngram_min == 0 || sim.ngram_min > sim.ngram_max {
            return Err(DedupeError::Config(format!(
                "invalid n-gram range {}..={}",
                sim.ngram_min, sim.ngram_max
            )));
        }
        Ok(())
    }

    /// Override thresholds (e.g. from command-line flags)
    pub fn with_thresholds(mut self, name: Option<f64>, address: Option<f64>) -> Self {
        if let Some(name) = name {
            self.thresholds.name = name;
        }
        if let Some(address) = address {
            self.thresholds.address = address;
        }
        self
    }

    /// Build the configured similarity scorer
    pub fn scorer(&self) -> Box<dyn SimilarityScorer> {
        match self.similarity.scorer {
            ScorerKind::Tfidf => Box::new(
                TfidfCosineScorer::new()
                    .with_analyzer(self.similarity.analyzer)
                    .with_ngram_range(self.similarity.ngram_min, self.similarity.ngram_max),
            ),
            ScorerKind::JaroWinkler => Box::new(JaroWinklerScorer::new()),
        }
    }
}

/// `<config dir>/addressmatch/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("addressmatch").join("config.toml"))
}
