use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{Edge, GraphData, Node};

/// Parses a `{nodes, edges}` payload, optionally wrapped in a `graph` object.
///
/// Individual edges that fail to deserialize are skipped with a warning;
/// a malformed node fails the whole payload since its id is unknown.
pub fn parse_graph_payload(raw: &str) -> Result<GraphData> {
    let parsed: Value = serde_json::from_str(raw).context("invalid JSON graph payload")?;
    let object = parsed
        .as_object()
        .ok_or_else(|| anyhow!("graph payload must be a JSON object"))?;

    let object = match object.get("graph") {
        Some(inner) => inner
            .as_object()
            .ok_or_else(|| anyhow!("`graph` field must be a JSON object"))?,
        None => object,
    };

    let raw_nodes = object
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("graph payload has no `nodes` array"))?;

    let mut nodes = Vec::with_capacity(raw_nodes.len());
    for (position, value) in raw_nodes.iter().enumerate() {
        let node = Node::deserialize(value)
            .with_context(|| format!("invalid node at position {position}"))?;
        nodes.push(node);
    }

    let mut edges = Vec::new();
    if let Some(raw_edges) = object.get("edges").and_then(Value::as_array) {
        edges.reserve(raw_edges.len());
        for (position, value) in raw_edges.iter().enumerate() {
            match Edge::deserialize(value) {
                Ok(edge) => edges.push(edge),
                Err(error) => warn!(position, %error, "skipping malformed edge"),
            }
        }
    }

    Ok(GraphData { nodes, edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MetricValue;

    #[test]
    fn parses_plain_payload() {
        let raw = r#"{
            "nodes": [
                {"id": 1, "label": "Summer sale", "size": 2, "info": {"clicks": 3, "format": "video"}},
                {"id": 2, "tags": [{"tag": "beach", "score": 0.8}]}
            ],
            "edges": [{"from": 1, "to": 2, "similarity": 0.75}]
        }"#;

        let graph = parse_graph_payload(raw).expect("payload parses");

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.nodes[0].size, 2.0);
        assert_eq!(graph.nodes[1].size, 1.0);
        assert_eq!(graph.nodes[0].metric("clicks"), Some(&MetricValue::Number(3.0)));
        assert_eq!(
            graph.nodes[0].metric("format"),
            Some(&MetricValue::Text("video".to_owned()))
        );
        assert_eq!(graph.edges, vec![Edge::new(1, 2, 0.75)]);
    }

    #[test]
    fn accepts_wrapped_payload_and_skips_bad_edges() {
        let raw = r#"{"graph": {
            "nodes": [{"id": 1}, {"id": 2}],
            "edges": [{"from": 1, "to": 2, "similarity": 0.5}, {"from": "x"}]
        }}"#;

        let graph = parse_graph_payload(raw).expect("payload parses");

        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn rejects_payload_without_nodes() {
        assert!(parse_graph_payload(r#"{"edges": []}"#).is_err());
        assert!(parse_graph_payload("[1, 2]").is_err());
        assert!(parse_graph_payload(r#"{"nodes": [{"label": "no id"}]}"#).is_err());
    }
}
