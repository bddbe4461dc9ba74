//! Connected-component clustering and group id assignment
//!
//! Each connected component of the candidate graph becomes one duplicate
//! group. The group id is the lexicographically smallest member id, so it
//! does not depend on input order or on the graph's internal layout.

use std::collections::{BTreeMap, HashMap};

use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;

use crate::graph::CandidateGraph;
use crate::record::{GroupedRecord, Record};

/// A resolved duplicate group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Smallest member id
    pub group_id: String,
    /// Member ids, sorted
    pub members: Vec<String>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

/// Mapping from every record id to its group id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupAssignment {
    clusters: Vec<Cluster>,
    /// id -> index into `clusters`
    lookup: HashMap<String, usize>,
}

impl GroupAssignment {
    /// Group id for a record, if the id was part of the resolution
    pub fn group_of(&self, id: &str) -> Option<&str> {
        self.lookup
            .get(id)
            .map(|&idx| self.clusters[idx].group_id.as_str())
    }

    /// All clusters, sorted by group id
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Number of assigned ids
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Clusters with more than one member
    pub fn duplicate_clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter(|c| !c.is_singleton())
    }
}

/// Resolve connected components into group assignments
///
/// Every graph node lands in exactly one cluster. Ids in `all_ids` that are
/// not graph nodes become singleton clusters of their own.
pub fn resolve_clusters<S: AsRef<str>>(graph: &CandidateGraph, all_ids: &[S]) -> GroupAssignment {
    let inner = graph.inner();
    let mut components = UnionFind::<usize>::new(inner.node_count());
    for edge in inner.edge_references() {
        components.union(edge.source().index(), edge.target().index());
    }

    // root index -> member ids
    let mut by_root: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for node in inner.node_indices() {
        by_root
            .entry(components.find(node.index()))
            .or_default()
            .push(inner[node].clone());
    }

    let mut member_lists: Vec<Vec<String>> = by_root.into_values().collect();
    for id in all_ids {
        let id = id.as_ref();
        if !graph.contains_node(id) {
            member_lists.push(vec![id.to_string()]);
        }
    }

    let mut clusters: Vec<Cluster> = member_lists
        .into_iter()
        .map(|mut members| {
            members.sort();
            members.dedup();
            Cluster {
                group_id: members[0].clone(),
                members,
            }
        })
        .collect();
    clusters.sort_by(|a, b| a.group_id.cmp(&b.group_id));
    clusters.dedup_by(|a, b| a.group_id == b.group_id);

    let mut lookup = HashMap::new();
    for (idx, cluster) in clusters.iter().enumerate() {
        for member in &cluster.members {
            lookup.insert(member.clone(), idx);
        }
    }

    GroupAssignment { clusters, lookup }
}

/// Label records with their group ids, sorted by (group id, id)
///
/// Records missing from the assignment are their own group.
pub fn assign_groups(records: Vec<Record>, assignment: &GroupAssignment) -> Vec<GroupedRecord> {
    let mut grouped: Vec<GroupedRecord> = records
        .into_iter()
        .map(|record| {
            let group_id = assignment
                .group_of(&record.id)
                .map(str::to_string)
                .unwrap_or_else(|| record.id.clone());
            GroupedRecord::new(group_id, record)
        })
        .collect();

    grouped.sort_by(|a, b| (&a.group_id, &a.id).cmp(&(&b.group_id, &b.id)));
    grouped
}
