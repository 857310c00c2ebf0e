use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use super::{Edge, Node};
use crate::error::{GraphError, Result};

/// Disjoint set over node ids with path compression.
struct DisjointSet {
    parent: HashMap<i64, i64>,
}

impl DisjointSet {
    fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            parent: ids.into_iter().map(|id| (id, id)).collect(),
        }
    }

    fn find(&mut self, id: i64) -> i64 {
        let mut root = id;
        while let Some(&parent) = self.parent.get(&root) {
            if parent == root {
                break;
            }
            root = parent;
        }

        let mut cursor = id;
        while cursor != root {
            let Some(next) = self.parent.insert(cursor, root) else {
                break;
            };
            cursor = next;
        }

        root
    }

    /// Attaches the root of `b` under the root of `a`; false if already joined.
    fn union(&mut self, a: i64, b: i64) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }
        self.parent.insert(root_b, root_a);
        true
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OptimizedEdges {
    pub edges: Vec<Edge>,
    pub tree_edges: usize,
    pub extra_edges: usize,
    pub dropped_edges: usize,
}

/// Reduces every cluster to its maximum-similarity spanning tree, plus the
/// strongest `keep_top_fraction` of the remaining intra-cluster edges.
pub fn optimize(nodes: &[Node], edges: &[Edge], keep_top_fraction: f64) -> Result<Vec<Edge>> {
    optimize_with_report(nodes, edges, keep_top_fraction).map(|report| report.edges)
}

pub fn optimize_with_report(
    nodes: &[Node],
    edges: &[Edge],
    keep_top_fraction: f64,
) -> Result<OptimizedEdges> {
    if !(0.0..1.0).contains(&keep_top_fraction) {
        return Err(GraphError::InvalidFraction(keep_top_fraction));
    }

    let mut cluster_order: Vec<&str> = Vec::new();
    let mut members: HashMap<&str, Vec<i64>> = HashMap::new();
    let mut cluster_by_id: HashMap<i64, &str> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        let Some(cluster) = node.cluster.as_deref() else {
            continue;
        };
        if cluster_by_id.contains_key(&node.id) {
            continue;
        }
        cluster_by_id.insert(node.id, cluster);
        members
            .entry(cluster)
            .or_insert_with(|| {
                cluster_order.push(cluster);
                Vec::new()
            })
            .push(node.id);
    }

    let mut candidates: HashMap<&str, Vec<&Edge>> = HashMap::new();
    let mut self_loops = 0;
    for edge in edges {
        let (Some(from), Some(to)) = (cluster_by_id.get(&edge.from), cluster_by_id.get(&edge.to))
        else {
            continue;
        };
        if edge.is_self_loop() {
            self_loops += 1;
        } else if from == to {
            candidates.entry(*from).or_default().push(edge);
        }
    }

    let mut report = OptimizedEdges {
        dropped_edges: self_loops,
        ..OptimizedEdges::default()
    };
    for cluster in cluster_order {
        let Some(mut cluster_edges) = candidates.remove(cluster) else {
            continue;
        };
        let ids = members.get(cluster).map(Vec::as_slice).unwrap_or_default();

        // Stable: equal similarities keep their input order.
        cluster_edges.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        let mut sets = DisjointSet::new(ids.iter().copied());
        let mut rest = Vec::new();
        for edge in cluster_edges {
            if sets.union(edge.from, edge.to) {
                report.edges.push(edge.clone());
                report.tree_edges += 1;
            } else {
                rest.push(edge);
            }
        }

        let keep = (rest.len() as f64 * keep_top_fraction).floor() as usize;
        report.dropped_edges += rest.len() - keep;
        report.extra_edges += keep;
        report.edges.extend(rest.into_iter().take(keep).cloned());
    }

    debug!(
        input = edges.len(),
        tree = report.tree_edges,
        extra = report.extra_edges,
        dropped = report.dropped_edges,
        "optimized cluster edges"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::cluster;

    fn clustered(ids: &[i64], edges: &[Edge]) -> Vec<Node> {
        let mut nodes = ids.iter().map(|&id| Node::new(id)).collect::<Vec<_>>();
        cluster(&mut nodes, edges);
        nodes
    }

    fn pairs(edges: &[Edge]) -> Vec<(i64, i64)> {
        edges.iter().map(|edge| (edge.from, edge.to)).collect()
    }

    #[test]
    fn keeps_strongest_spanning_tree_of_a_triangle() {
        let edges = [Edge::new(1, 2, 0.9), Edge::new(2, 3, 0.2), Edge::new(1, 3, 0.8)];
        let nodes = clustered(&[1, 2, 3], &edges);

        let optimized = optimize(&nodes, &edges, 0.0).expect("valid fraction");

        assert_eq!(pairs(&optimized), vec![(1, 2), (1, 3)]);
    }

    #[test]
    fn extra_edges_follow_tree_edges_in_similarity_order() {
        let edges = [
            Edge::new(1, 2, 0.9),
            Edge::new(2, 3, 0.8),
            Edge::new(3, 4, 0.7),
            Edge::new(1, 3, 0.6),
            Edge::new(2, 4, 0.5),
            Edge::new(1, 4, 0.4),
        ];
        let nodes = clustered(&[1, 2, 3, 4], &edges);

        let report = optimize_with_report(&nodes, &edges, 0.5).expect("valid fraction");

        assert_eq!(report.tree_edges, 3);
        assert_eq!(report.extra_edges, 1);
        assert_eq!(report.dropped_edges, 2);
        assert_eq!(pairs(&report.edges), vec![(1, 2), (2, 3), (3, 4), (1, 3)]);
    }

    #[test]
    fn ties_break_by_input_order() {
        let edges = [Edge::new(1, 2, 0.5), Edge::new(2, 3, 0.5), Edge::new(1, 3, 0.5)];
        let nodes = clustered(&[1, 2, 3], &edges);

        let optimized = optimize(&nodes, &edges, 0.0).expect("valid fraction");

        assert_eq!(pairs(&optimized), vec![(1, 2), (2, 3)]);
    }

    #[test]
    fn rejects_fraction_outside_unit_interval() {
        assert_eq!(
            optimize(&[], &[], 1.0),
            Err(GraphError::InvalidFraction(1.0))
        );
        assert!(optimize(&[], &[], -0.1).is_err());
        assert!(optimize(&[], &[], f64::NAN).is_err());
    }

    #[test]
    fn ignores_dangling_edges_and_self_loops() {
        let edges = [Edge::new(1, 1, 1.0), Edge::new(1, 2, 0.4), Edge::new(2, 42, 0.9)];
        let nodes = clustered(&[1, 2], &edges);

        let optimized = optimize(&nodes, &edges, 0.0).expect("valid fraction");

        assert_eq!(pairs(&optimized), vec![(1, 2)]);
    }

    #[test]
    fn stale_cluster_assignment_yields_spanning_forest() {
        let edges = [Edge::new(1, 2, 0.4), Edge::new(3, 4, 0.6)];
        let mut nodes = [1, 2, 3, 4].map(Node::new).to_vec();
        for node in &mut nodes {
            node.cluster = Some("1".to_owned());
        }

        let optimized = optimize(&nodes, &edges, 0.0).expect("valid fraction");

        assert_eq!(pairs(&optimized), vec![(3, 4), (1, 2)]);
    }

    #[test]
    fn self_loops_are_never_kept_as_extras() {
        let edges = [
            Edge::new(1, 1, 0.99),
            Edge::new(1, 2, 0.5),
            Edge::new(2, 3, 0.4),
            Edge::new(1, 3, 0.3),
        ];
        let nodes = clustered(&[1, 2, 3], &edges);

        let report = optimize_with_report(&nodes, &edges, 0.9).expect("valid fraction");

        assert_eq!(pairs(&report.edges), vec![(1, 2), (2, 3)]);
        assert_eq!(report.tree_edges, 2);
        assert_eq!(report.extra_edges, 0);
        assert_eq!(report.dropped_edges, 2);
    }
}
