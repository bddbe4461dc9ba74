//! Pairwise similarity scoring over a partition's names or addresses
//!
//! A scorer turns an ordered collection of strings into a symmetric
//! `SimilarityMatrix` with values in [0, 1] and 1.0 on the diagonal.
//! The default scorer is TF-IDF weighted n-gram cosine similarity.

mod jaro_winkler;
mod stop_words;
mod tfidf;

pub use jaro_winkler::JaroWinklerScorer;
pub use stop_words::{is_stop_word, ENGLISH_STOP_WORDS};
pub use tfidf::{Analyzer, TfidfCosineScorer};

/// Scores every pair in an ordered collection of strings
///
/// Implementations must return an `n x n` matrix for `n` documents and must
/// not fail on empty collections, single documents, or empty strings.
pub trait SimilarityScorer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Score all pairs of `docs`
    fn score(&self, docs: &[&str]) -> SimilarityMatrix;
}

/// Square, symmetric similarity matrix over a fixed ordering of documents
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    size: usize,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    /// Build a matrix from a pairwise function evaluated on the upper triangle
    ///
    /// `pair(i, j)` is only called with `i < j`; results are clamped to
    /// [0, 1] and mirrored. The diagonal is fixed at 1.0.
    pub fn from_pairs(size: usize, mut pair: impl FnMut(usize, usize) -> f64) -> Self {
        let mut values = vec![0.0; size * size];
        for i in 0..size {
            values[i * size + i] = 1.0;
            for j in (i + 1)..size {
                let score = clamp_unit(pair(i, j));
                values[i * size + j] = score;
                values[j * size + i] = score;
            }
        }
        Self { size, values }
    }

    /// Matrix with no off-diagonal similarity
    pub fn identity(size: usize) -> Self {
        Self::from_pairs(size, |_, _| 0.0)
    }

    /// Build from explicit rows (mostly for tests and precomputed scores)
    ///
    /// Returns `None` unless the rows form a square matrix. Only the upper
    /// triangle is read, so the result is symmetric by construction.
    pub fn from_rows(rows: &[Vec<f64>]) -> Option<Self> {
        let size = rows.len();
        if rows.iter().any(|row| row.len() != size) {
            return None;
        }
        Some(Self::from_pairs(size, |i, j| rows[i][j]))
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Similarity between documents `i` and `j`
    ///
    /// Panics if either index is out of range.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.size && j < self.size, "index out of range");
        self.values[i * self.size + j]
    }
}

fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
