mod cluster;
mod optimize;
mod parse;
mod search;
mod tags;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use cluster::{ClusterOrder, cluster, sort_clusters};
pub use optimize::{OptimizedEdges, optimize, optimize_with_report};
pub use parse::parse_graph_payload;
pub use search::search_nodes;
pub use tags::{TagStats, tag_stats};

/// A single metric value carried by an asset or aggregated for a cluster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl MetricValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

pub type MetricsObject = BTreeMap<String, MetricValue>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
    pub score: f64,
}

/// Asset node of the similarity graph.
///
/// `cluster` is rewritten by every clustering pass and `x`/`y` by the layout
/// engine; everything else is payload data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default = "default_node_size")]
    pub size: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<MetricsObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<MetricsObject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
}

fn default_node_size() -> f32 {
    1.0
}

impl Node {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            name: None,
            label: None,
            cluster: None,
            image: None,
            media_path: None,
            color: None,
            size: default_node_size(),
            info: None,
            series: None,
            tags: None,
            x: None,
            y: None,
        }
    }

    pub fn with_info(mut self, info: MetricsObject) -> Self {
        self.info = Some(info);
        self
    }

    pub fn metric(&self, key: &str) -> Option<&MetricValue> {
        self.info.as_ref().and_then(|info| info.get(key))
    }

    pub fn position(&self) -> Option<(f32, f32)> {
        self.x.zip(self.y)
    }
}

/// Similarity relation between two assets, stored directed but treated as
/// undirected everywhere in this crate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: i64,
    pub to: i64,
    pub similarity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl Edge {
    pub fn new(from: i64, to: i64, similarity: f64) -> Self {
        Self {
            from,
            to,
            similarity,
            width: None,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GraphData {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// A connected component of the similarity graph.
///
/// `members` index into the node slice the clusters were computed from, so
/// the nodes stay owned by that slice and are never copied.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterInfo {
    pub id: String,
    pub members: Vec<usize>,
    pub metrics: MetricsObject,
}

impl ClusterInfo {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    pub fn nodes<'a>(&'a self, nodes: &'a [Node]) -> impl Iterator<Item = &'a Node> + 'a {
        self.members.iter().filter_map(move |&index| nodes.get(index))
    }

    pub fn summary(&self, nodes: &[Node]) -> ClusterSummary {
        ClusterSummary {
            id: self.id.clone(),
            size: self.members.len(),
            nodes: self.nodes(nodes).map(|node| node.id).collect(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Serializable view of a cluster for external consumers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub id: String,
    pub size: usize,
    pub nodes: Vec<i64>,
    pub metrics: MetricsObject,
}
