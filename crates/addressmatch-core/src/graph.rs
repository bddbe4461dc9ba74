//! Candidate duplicate graph
//!
//! Nodes are the record ids of one partition. An edge joins two records
//! whose name AND address similarity both clear their thresholds, or which
//! a manual override forces together. Manual removals take precedence over
//! both, see [`CandidateGraph::apply_overrides`].

use std::collections::HashMap;

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DedupeError, Result};
use crate::record::Record;
use crate::similarity::SimilarityMatrix;

/// Default name similarity threshold (deliberately low, favours recall)
pub const DEFAULT_NAME_THRESHOLD: f64 = 0.1;

/// Default address similarity threshold (deliberately low, favours recall)
pub const DEFAULT_ADDRESS_THRESHOLD: f64 = 0.1;

/// Independent name and address similarity thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub name: f64,
    pub address: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME_THRESHOLD,
            address: DEFAULT_ADDRESS_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn new(name: f64, address: f64) -> Self {
        Self { name, address }
    }

    /// Both scores must clear their threshold
    pub fn accepts(&self, name_score: f64, address_score: f64) -> bool {
        name_score >= self.name && address_score >= self.address
    }
}

/// Why an edge exists
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeKind {
    /// Both similarity scores cleared their thresholds
    Computed { name_score: f64, address_score: f64 },
    /// Forced by a manual override
    Manual,
}

/// One row of a manual override file (`id1,id2`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverridePair {
    pub id1: String,
    pub id2: String,
}

impl OverridePair {
    pub fn new(id1: impl Into<String>, id2: impl Into<String>) -> Self {
        Self {
            id1: id1.into(),
            id2: id2.into(),
        }
    }
}

/// Manual edge overrides for one partition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualOverrides {
    /// Edges added regardless of thresholds
    pub forced: Vec<OverridePair>,
    /// Edges removed even if thresholds pass (or forced)
    pub removed: Vec<OverridePair>,
}

impl ManualOverrides {
    pub fn is_empty(&self) -> bool {
        self.forced.is_empty() && self.removed.is_empty()
    }
}

/// Undirected graph of candidate duplicates within one partition
#[derive(Debug, Clone)]
pub struct CandidateGraph {
    partition: String,
    graph: UnGraph<String, EdgeKind>,
    index: HashMap<String, NodeIndex>,
}

impl CandidateGraph {
    /// Graph with a node per id and no edges
    pub fn with_nodes<S: AsRef<str>>(partition: impl Into<String>, ids: &[S]) -> Self {
        let mut graph = UnGraph::with_capacity(ids.len(), 0);
        let mut index = HashMap::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            if !index.contains_key(id) {
                let node = graph.add_node(id.to_string());
                index.insert(id.to_string(), node);
            }
        }
        Self {
            partition: partition.into(),
            graph,
            index,
        }
    }

    /// Build the graph from name and address similarity matrices
    ///
    /// Both matrices must be ordered like `records`.
    pub fn build(
        partition: impl Into<String>,
        records: &[Record],
        name_sim: &SimilarityMatrix,
        address_sim: &SimilarityMatrix,
        thresholds: Thresholds,
    ) -> Result<Self> {
        for matrix in [name_sim, address_sim] {
            if matrix.len() != records.len() {
                return Err(DedupeError::DimensionMismatch {
                    records: records.len(),
                    matrix: matrix.len(),
                });
            }
        }

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let mut candidate = Self::with_nodes(partition, &ids);

        let n = records.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let name_score = name_sim.get(i, j);
                let address_score = address_sim.get(i, j);
                if thresholds.accepts(name_score, address_score) {
                    debug!(
                        "Edge {} -- {} (name {:.3}, address {:.3})",
                        ids[i], ids[j], name_score, address_score
                    );
                    candidate.connect(
                        ids[i],
                        ids[j],
                        EdgeKind::Computed {
                            name_score,
                            address_score,
                        },
                    );
                }
            }
        }

        Ok(candidate)
    }

    /// Force an edge for every pair, regardless of thresholds
    ///
    /// Every id is checked before the graph is touched, so an unknown id
    /// leaves the graph unchanged.
    pub fn apply_manual_edges(&mut self, pairs: &[OverridePair]) -> Result<()> {
        for pair in pairs {
            for id in [&pair.id1, &pair.id2] {
                if !self.index.contains_key(id) {
                    return Err(DedupeError::InvalidReference {
                        id: id.clone(),
                        partition: self.partition.clone(),
                    });
                }
            }
        }

        for pair in pairs {
            if pair.id1 == pair.id2 {
                warn!(
                    "Ignoring self-pair override for {} in partition {}",
                    pair.id1, self.partition
                );
                continue;
            }
            self.connect(&pair.id1, &pair.id2, EdgeKind::Manual);
        }
        Ok(())
    }

    /// Remove the edge for every pair; absent edges and ids are no-ops
    pub fn remove_manual_edges(&mut self, pairs: &[OverridePair]) {
        for pair in pairs {
            let (Some(&a), Some(&b)) = (self.index.get(&pair.id1), self.index.get(&pair.id2))
            else {
                continue;
            };
            if let Some(edge) = self.graph.find_edge(a, b) {
                self.graph.remove_edge(edge);
            }
        }
    }

    /// Apply overrides in their fixed order: forced edges, then removals
    pub fn apply_overrides(&mut self, overrides: &ManualOverrides) -> Result<()> {
        self.apply_manual_edges(&overrides.forced)?;
        self.remove_manual_edges(&overrides.removed);
        Ok(())
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn has_edge(&self, id1: &str, id2: &str) -> bool {
        match (self.index.get(id1), self.index.get(id2)) {
            (Some(&a), Some(&b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    /// Kind of the edge between two ids, if any
    pub fn edge_kind(&self, id1: &str, id2: &str) -> Option<EdgeKind> {
        let a = *self.index.get(id1)?;
        let b = *self.index.get(id2)?;
        let edge = self.graph.find_edge(a, b)?;
        self.graph.edge_weight(edge).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All node ids, in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    /// All edges as `(smaller id, larger id, kind)`, sorted
    pub fn edges(&self) -> Vec<(String, String, EdgeKind)> {
        let mut edges: Vec<(String, String, EdgeKind)> = self
            .graph
            .edge_indices()
            .filter_map(|edge| {
                let (a, b) = self.graph.edge_endpoints(edge)?;
                let (a, b) = (&self.graph[a], &self.graph[b]);
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                Some((lo.clone(), hi.clone(), self.graph[edge]))
            })
            .collect();
        edges.sort_by(|x, y| (&x.0, &x.1).cmp(&(&y.0, &y.1)));
        edges
    }

    pub(crate) fn inner(&self) -> &UnGraph<String, EdgeKind> {
        &self.graph
    }

    fn connect(&mut self, id1: &str, id2: &str, kind: EdgeKind) {
        if id1 == id2 {
            return;
        }
        if let (Some(&a), Some(&b)) = (self.index.get(id1), self.index.get(id2)) {
            self.graph.update_edge(a, b, kind);
        }
    }
}
