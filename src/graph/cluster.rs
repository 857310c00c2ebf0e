use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use super::{ClusterInfo, Edge, Node};
use crate::metrics::aggregate;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClusterOrder {
    /// Descending by a numeric aggregated metric; falls back to member count
    /// when any cluster lacks a numeric value for it.
    Metric(String),
    Size,
}

fn adjacency(edges: &[Edge], known_ids: &HashSet<i64>) -> HashMap<i64, HashSet<i64>> {
    let mut adjacency: HashMap<i64, HashSet<i64>> = HashMap::new();
    for edge in edges {
        if !known_ids.contains(&edge.from) || !known_ids.contains(&edge.to) {
            continue;
        }
        adjacency.entry(edge.from).or_default().insert(edge.to);
        adjacency.entry(edge.to).or_default().insert(edge.from);
    }
    adjacency
}

fn connected_ids(
    start: i64,
    adjacency: &HashMap<i64, HashSet<i64>>,
    visited: &mut HashSet<i64>,
) -> HashSet<i64> {
    let mut component = HashSet::new();
    let mut queue = VecDeque::new();

    queue.push_back(start);
    visited.insert(start);

    while let Some(current) = queue.pop_front() {
        component.insert(current);

        let Some(neighbors) = adjacency.get(&current) else {
            continue;
        };

        for &next in neighbors {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    component
}

/// Partitions `nodes` into connected components and aggregates their metrics.
///
/// Cluster ids are dense ("1".."N") in discovery order, which follows the
/// input node order. Every node's `cluster` field is overwritten.
pub fn cluster(nodes: &mut [Node], edges: &[Edge]) -> Vec<ClusterInfo> {
    let known_ids = nodes.iter().map(|node| node.id).collect::<HashSet<_>>();
    let adjacency = adjacency(edges, &known_ids);
    let mut index_by_id = HashMap::with_capacity(nodes.len());
    for (index, node) in nodes.iter().enumerate() {
        index_by_id.entry(node.id).or_insert(index);
    }

    let mut visited = HashSet::with_capacity(nodes.len());
    let mut clusters = Vec::new();

    for start in 0..nodes.len() {
        let start_id = nodes[start].id;
        if visited.contains(&start_id) {
            continue;
        }

        let component = connected_ids(start_id, &adjacency, &mut visited);
        let cluster_id = (clusters.len() + 1).to_string();
        let mut members = component
            .iter()
            .filter_map(|id| index_by_id.get(id).copied())
            .collect::<Vec<_>>();
        members.sort_unstable();

        for &index in &members {
            nodes[index].cluster = Some(cluster_id.clone());
        }

        let metrics = aggregate(members.iter().map(|&index| &nodes[index]));
        clusters.push(ClusterInfo {
            id: cluster_id,
            members,
            metrics,
        });
    }

    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        clusters = clusters.len(),
        "clustered similarity graph"
    );

    clusters
}

/// Sorts clusters and renumbers them "1".."N" in the new order, writing the
/// new ids back onto their member nodes.
pub fn sort_clusters(nodes: &mut [Node], clusters: &mut [ClusterInfo], order: &ClusterOrder) {
    let metric = match order {
        ClusterOrder::Metric(name) => {
            let all_numeric = clusters.iter().all(|cluster| {
                cluster
                    .metrics
                    .get(name)
                    .and_then(|value| value.as_number())
                    .is_some_and(|value| !value.is_nan())
            });
            all_numeric.then_some(name.as_str())
        }
        ClusterOrder::Size => None,
    };

    match metric {
        Some(name) => clusters.sort_by(|a, b| {
            let a_value = a.metrics.get(name).and_then(|value| value.as_number());
            let b_value = b.metrics.get(name).and_then(|value| value.as_number());
            b_value
                .unwrap_or(f64::NEG_INFINITY)
                .total_cmp(&a_value.unwrap_or(f64::NEG_INFINITY))
        }),
        None => clusters.sort_by(|a, b| b.members.len().cmp(&a.members.len())),
    }

    for (position, cluster) in clusters.iter_mut().enumerate() {
        cluster.id = (position + 1).to_string();
        for &index in &cluster.members {
            if let Some(node) = nodes.get_mut(index) {
                node.cluster = Some(cluster.id.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MetricValue;

    fn nodes(ids: &[i64]) -> Vec<Node> {
        ids.iter().map(|&id| Node::new(id)).collect()
    }

    fn member_ids(cluster: &ClusterInfo, nodes: &[Node]) -> Vec<i64> {
        cluster.nodes(nodes).map(|node| node.id).collect()
    }

    #[test]
    fn components_are_discovered_in_node_order() {
        let mut nodes = nodes(&[5, 1, 2, 3, 4]);
        let edges = [Edge::new(1, 2, 0.9), Edge::new(4, 5, 0.5)];

        let clusters = cluster(&mut nodes, &edges);

        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0].id, "1");
        assert_eq!(member_ids(&clusters[0], &nodes), vec![5, 4]);
        assert_eq!(member_ids(&clusters[1], &nodes), vec![1, 2]);
        assert_eq!(member_ids(&clusters[2], &nodes), vec![3]);
        assert_eq!(nodes[3].cluster.as_deref(), Some("3"));
        assert_eq!(nodes[4].cluster.as_deref(), Some("1"));
    }

    #[test]
    fn malformed_edges_and_self_loops_are_inert() {
        let mut nodes = nodes(&[1, 2]);
        let edges = [Edge::new(1, 99, 0.9), Edge::new(2, 2, 1.0), Edge::new(77, 2, 0.3)];

        let clusters = cluster(&mut nodes, &edges);

        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(ClusterInfo::is_singleton));
    }

    #[test]
    fn sorting_by_metric_renumbers_clusters_and_nodes() {
        let mut nodes = vec![
            Node::new(1).with_info([("cost".to_owned(), MetricValue::Number(1.0))].into()),
            Node::new(2).with_info([("cost".to_owned(), MetricValue::Number(2.0))].into()),
            Node::new(3).with_info([("cost".to_owned(), MetricValue::Number(10.0))].into()),
        ];
        let edges = [Edge::new(1, 2, 0.5)];
        let mut clusters = cluster(&mut nodes, &edges);

        sort_clusters(&mut nodes, &mut clusters, &ClusterOrder::Metric("cost".to_owned()));

        assert_eq!(member_ids(&clusters[0], &nodes), vec![3]);
        assert_eq!(clusters[0].id, "1");
        assert_eq!(nodes[2].cluster.as_deref(), Some("1"));
        assert_eq!(nodes[0].cluster.as_deref(), Some("2"));
    }

    #[test]
    fn sorting_by_missing_metric_falls_back_to_size() {
        let mut nodes = nodes(&[1, 2, 3, 4]);
        let edges = [Edge::new(2, 3, 0.5), Edge::new(3, 4, 0.5)];
        let mut clusters = cluster(&mut nodes, &edges);

        sort_clusters(&mut nodes, &mut clusters, &ClusterOrder::Metric("cost".to_owned()));

        assert_eq!(member_ids(&clusters[0], &nodes), vec![2, 3, 4]);
        assert_eq!(nodes[0].cluster.as_deref(), Some("2"));
    }
}
