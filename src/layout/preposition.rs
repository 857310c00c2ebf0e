//! Initial placement of nodes before any physics runs.

use std::collections::{HashMap, HashSet};
use std::f32::consts::TAU;

use emath::{Vec2, vec2};
use rand::Rng;

use crate::graph::{ClusterInfo, Edge, Node};

const VIRTUAL_NEIGHBORS: usize = 2;

/// Synthetic intra-cluster link; indices point into the node arena.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct VirtualLink {
    pub(crate) source: usize,
    pub(crate) target: usize,
}

fn place(node: &mut Node, position: Vec2) {
    node.x = Some(position.x);
    node.y = Some(position.y);
}

fn circle_point(index: usize, count: usize) -> Vec2 {
    let angle = TAU * index as f32 / count.max(1) as f32;
    vec2(angle.cos(), angle.sin())
}

/// Multi-member clusters on a central ring, singletons on outer rings ordered
/// by how strongly they connect to the multi-member clusters.
pub(crate) fn preposition_default(
    nodes: &mut [Node],
    edges: &[Edge],
    clusters: &[ClusterInfo],
    size: Vec2,
    rng: &mut impl Rng,
) {
    let center = size * 0.5;
    let central_area = size.x.min(size.y) / 3.0;

    let multi = clusters.iter().filter(|cluster| cluster.len() > 1).collect::<Vec<_>>();
    let singles = clusters.iter().filter(|cluster| cluster.is_singleton()).collect::<Vec<_>>();

    for (cluster_index, cluster) in multi.iter().enumerate() {
        let cluster_center =
            center + circle_point(cluster_index, multi.len()) * (central_area / 2.0);
        let cluster_radius = (cluster.len() as f32).sqrt() * 15.0;

        for (member_index, &node_index) in cluster.members.iter().enumerate() {
            if let Some(node) = nodes.get_mut(node_index) {
                let offset = circle_point(member_index, cluster.len()) * cluster_radius;
                place(node, cluster_center + offset);
            }
        }
    }

    let multi_ids = multi
        .iter()
        .flat_map(|cluster| cluster.nodes(nodes))
        .map(|node| node.id)
        .collect::<HashSet<_>>();

    let connections = singles
        .iter()
        .filter_map(|cluster| cluster.members.first().copied())
        .filter_map(|node_index| {
            let id = nodes.get(node_index)?.id;
            let count = edges
                .iter()
                .filter(|edge| {
                    (edge.from == id || edge.to == id)
                        && (multi_ids.contains(&edge.from) || multi_ids.contains(&edge.to))
                })
                .count();
            Some((node_index, count))
        })
        .collect::<Vec<_>>();

    let max_connections = connections.iter().map(|&(_, count)| count).max().unwrap_or(0);
    let ring_count = max_connections + 1;
    let ring_spacing = central_area / 2.0 / ring_count as f32;

    for (node_index, count) in connections {
        let ring = ring_count.saturating_sub(count);
        let ring_radius = central_area + ring as f32 * ring_spacing;
        let angle = rng.gen_range(0.0..TAU);
        place(
            &mut nodes[node_index],
            center + vec2(angle.cos(), angle.sin()) * ring_radius,
        );
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct GridPlacement {
    pub(crate) centers: HashMap<String, Vec2>,
    pub(crate) virtual_links: Vec<VirtualLink>,
}

/// Clusters on a jittered near-square grid, members on a small circle around
/// each cell center, plus virtual links chaining each member to its next two
/// cluster mates.
pub(crate) fn preposition_grid(
    nodes: &mut [Node],
    size: Vec2,
    rng: &mut impl Rng,
) -> GridPlacement {
    let mut order: Vec<&str> = Vec::new();
    let mut buckets: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, node) in nodes.iter().enumerate() {
        let Some(cluster) = node.cluster.as_deref() else {
            continue;
        };
        buckets
            .entry(cluster)
            .or_insert_with(|| {
                order.push(cluster);
                Vec::new()
            })
            .push(index);
    }

    let grid = (order.len() as f32).sqrt().ceil().max(1.0) as usize;
    let cell = size.x.min(size.y) * 0.75 / grid as f32;
    let center = size * 0.5;

    let mut placement = GridPlacement::default();
    let mut positions = Vec::with_capacity(nodes.len());
    for (cluster_index, cluster) in order.iter().enumerate() {
        let row = (cluster_index / grid) as f32;
        let col = (cluster_index % grid) as f32;
        let jitter = vec2(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5)) * cell * 0.2;
        let half_grid = grid as f32 / 2.0;
        let cluster_center = center
            + vec2((col - half_grid + 0.5) * cell, (row - half_grid + 0.5) * cell)
            + jitter;

        let members = &buckets[cluster];
        placement.centers.insert((*cluster).to_owned(), cluster_center);

        let radius = (members.len() as f32).sqrt() * 5.0;
        for (position, &node_index) in members.iter().enumerate() {
            let offset = circle_point(position, members.len()) * radius;
            positions.push((node_index, cluster_center + offset));

            for step in 1..=VIRTUAL_NEIGHBORS {
                if let Some(&target) = members.get(position + step) {
                    placement.virtual_links.push(VirtualLink {
                        source: node_index,
                        target,
                    });
                }
            }
        }
    }

    for (node_index, position) in positions {
        place(&mut nodes[node_index], position);
    }

    placement
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::graph::cluster;

    fn graph(ids: &[i64], edges: &[Edge]) -> (Vec<Node>, Vec<ClusterInfo>) {
        let mut nodes = ids.iter().map(|&id| Node::new(id)).collect::<Vec<_>>();
        let clusters = cluster(&mut nodes, edges);
        (nodes, clusters)
    }

    fn distance_from(node: &Node, point: Vec2) -> f32 {
        let (x, y) = node.position().expect("node placed");
        (vec2(x, y) - point).length()
    }

    #[test]
    fn default_places_multi_clusters_inside_and_singletons_outside() {
        let edges = [Edge::new(1, 2, 0.9), Edge::new(2, 3, 0.8), Edge::new(4, 5, 0.7)];
        let (mut nodes, clusters) = graph(&[1, 2, 3, 4, 5, 6, 7], &edges);
        let size = vec2(900.0, 600.0);
        let mut rng = SmallRng::seed_from_u64(7);

        preposition_default(&mut nodes, &edges, &clusters, size, &mut rng);

        let center = size * 0.5;
        let central_area = 200.0;
        for node in &nodes[..5] {
            assert!(distance_from(node, center) < central_area / 2.0 + 30.0);
        }
        for node in &nodes[5..] {
            let distance = distance_from(node, center);
            assert!(distance >= central_area - 1e-3);
            assert!(distance <= central_area * 1.5 + 1e-3);
        }
    }

    #[test]
    fn default_puts_better_connected_singletons_on_inner_rings() {
        let (mut nodes, clusters) = graph(&[1, 2, 3, 4], &[Edge::new(1, 2, 0.9)]);
        // Edges that arrived after clustering: node 3 now links to the pair.
        let edges = [Edge::new(1, 2, 0.9), Edge::new(3, 1, 0.4), Edge::new(3, 2, 0.4)];
        let size = vec2(600.0, 600.0);
        let mut rng = SmallRng::seed_from_u64(1);

        preposition_default(&mut nodes, &edges, &clusters, size, &mut rng);

        let center = size * 0.5;
        assert!(distance_from(&nodes[2], center) < distance_from(&nodes[3], center));
    }

    #[test]
    fn grid_links_each_member_to_next_two_cluster_mates() {
        let edges = [Edge::new(1, 2, 0.9), Edge::new(2, 3, 0.9), Edge::new(3, 4, 0.9)];
        let (mut nodes, _) = graph(&[1, 2, 3, 4, 5], &edges);
        let mut rng = SmallRng::seed_from_u64(3);

        let placement = preposition_grid(&mut nodes, vec2(800.0, 600.0), &mut rng);

        let pairs = placement
            .virtual_links
            .iter()
            .map(|link| (link.source, link.target))
            .collect::<Vec<_>>();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2), (1, 3), (2, 3)]);
        assert_eq!(placement.centers.len(), 2);
        assert!(placement.centers.contains_key("1") && placement.centers.contains_key("2"));
        assert!(nodes.iter().all(|node| node.position().is_some()));
    }

    #[test]
    fn grid_keeps_clusters_in_separate_cells() {
        let (mut nodes, _) = graph(&[1, 2, 3, 4], &[]);
        let mut rng = SmallRng::seed_from_u64(11);

        let placement = preposition_grid(&mut nodes, vec2(800.0, 800.0), &mut rng);

        let cell = 800.0 * 0.75 / 2.0;
        let centers = placement.centers.values().copied().collect::<Vec<_>>();
        for (index, a) in centers.iter().enumerate() {
            for b in &centers[index + 1..] {
                assert!((*a - *b).length() > cell * 0.75);
            }
        }
    }
}
