//! TF-IDF weighted n-gram cosine similarity

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::stop_words::is_stop_word;
use super::{SimilarityMatrix, SimilarityScorer};

lazy_static! {
    /// Tokens of two or more word characters
    static ref TOKEN_REGEX: Regex = Regex::new(r"\b\w\w+\b").unwrap();
}

/// How documents are split into n-gram features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Analyzer {
    /// Word n-grams over tokens, with stop words removed
    #[default]
    Word,
    /// Character n-grams over the whitespace-collapsed text
    Char,
}

/// Sparse term vector; ordered so dot products sum deterministically
type TermVector = BTreeMap<String, f64>;

/// Cosine similarity between TF-IDF weighted n-gram vectors
///
/// Weights are raw term counts times smoothed IDF,
/// `ln((1 + n) / (1 + df)) + 1`, and every vector is L2-normalised.
/// Documents with no features become zero vectors and score 0 against
/// everything except themselves.
#[derive(Debug, Clone)]
pub struct TfidfCosineScorer {
    analyzer: Analyzer,
    min_n: usize,
    max_n: usize,
}

impl Default for TfidfCosineScorer {
    fn default() -> Self {
        Self {
            analyzer: Analyzer::Word,
            min_n: 2,
            max_n: 3,
        }
    }
}

impl TfidfCosineScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Set the inclusive n-gram length range; values are ordered and
    /// floored at 1
    pub fn with_ngram_range(mut self, min_n: usize, max_n: usize) -> Self {
        let (lo, hi) = if min_n <= max_n {
            (min_n, max_n)
        } else {
            (max_n, min_n)
        };
        self.min_n = lo.max(1);
        self.max_n = hi.max(1);
        self
    }

    /// N-gram features of a single document, with counts
    pub fn features(&self, doc: &str) -> HashMap<String, usize> {
        let lowered = doc.to_lowercase();
        let grams = match self.analyzer {
            Analyzer::Word => {
                let tokens: Vec<&str> = TOKEN_REGEX
                    .find_iter(&lowered)
                    .map(|m| m.as_str())
                    .filter(|token| !is_stop_word(token))
                    .collect();
                self.ngrams(&tokens, " ")
            }
            Analyzer::Char => {
                let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
                let chars: Vec<String> = collapsed.chars().map(|c| c.to_string()).collect();
                let chars: Vec<&str> = chars.iter().map(String::as_str).collect();
                self.ngrams(&chars, "")
            }
        };

        let mut counts = HashMap::new();
        for gram in grams {
            *counts.entry(gram).or_insert(0) += 1;
        }
        counts
    }

    fn ngrams(&self, units: &[&str], joiner: &str) -> Vec<String> {
        let mut grams = Vec::new();
        for n in self.min_n..=self.max_n {
            if n > units.len() {
                break;
            }
            grams.extend(units.windows(n).map(|window| window.join(joiner)));
        }
        grams
    }

    fn vectors(&self, docs: &[&str]) -> Vec<TermVector> {
        let counts: Vec<HashMap<String, usize>> =
            docs.iter().map(|doc| self.features(doc)).collect();

        let mut document_frequency: HashMap<&str, usize> = HashMap::new();
        for doc in &counts {
            for term in doc.keys() {
                *document_frequency.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let n = docs.len() as f64;
        counts
            .iter()
            .map(|doc| {
                let mut vector: TermVector = doc
                    .iter()
                    .map(|(term, &tf)| {
                        let df = document_frequency[term.as_str()] as f64;
                        let idf = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
                        (term.clone(), tf as f64 * idf)
                    })
                    .collect();

                let norm = vector.values().map(|w| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for weight in vector.values_mut() {
                        *weight /= norm;
                    }
                }
                vector
            })
            .collect()
    }
}

impl SimilarityScorer for TfidfCosineScorer {
    fn name(&self) -> &'static str {
        "tfidf-cosine"
    }

    fn score(&self, docs: &[&str]) -> SimilarityMatrix {
        let vectors = self.vectors(docs);
        SimilarityMatrix::from_pairs(docs.len(), |i, j| dot(&vectors[i], &vectors[j]))
    }
}

fn dot(a: &TermVector, b: &TermVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, weight)| large.get(term).map(|other| weight * other))
        .sum()
}
