//! Character-level Jaro-Winkler scorer

use strsim::jaro_winkler;

use super::{SimilarityMatrix, SimilarityScorer};

/// Pairwise Jaro-Winkler similarity over lowercased, trimmed strings
///
/// Cheaper to reason about than TF-IDF for very short names, and does not
/// depend on the rest of the collection. Empty strings score 0.
#[derive(Debug, Clone, Default)]
pub struct JaroWinklerScorer;

impl JaroWinklerScorer {
    pub fn new() -> Self {
        Self
    }
}

impl SimilarityScorer for JaroWinklerScorer {
    fn name(&self) -> &'static str {
        "jaro-winkler"
    }

    fn score(&self, docs: &[&str]) -> SimilarityMatrix {
        let lowered: Vec<String> = docs.iter().map(|d| d.trim().to_lowercase()).collect();
        SimilarityMatrix::from_pairs(docs.len(), |i, j| {
            if lowered[i].is_empty() || lowered[j].is_empty() {
                0.0
            } else {
                jaro_winkler(&lowered[i], &lowered[j])
            }
        })
    }
}
