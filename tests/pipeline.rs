use pretty_assertions::assert_eq;
use serde_json::json;

use creative_maps::graph::{ClusterOrder, cluster, parse_graph_payload, sort_clusters};
use creative_maps::metrics::backfill_node_ratios;
use creative_maps::util::format_metric_value;

const PAYLOAD: &str = r#"{
    "graph": {
        "nodes": [
            {"id": 10, "label": "A", "info": {"impressions": 100, "clicks": 10, "cost": 5, "format": "video"}},
            {"id": 11, "label": "B", "info": {"impressions": 50, "clicks": 30, "cost": 0, "format": "video"}},
            {"id": 12, "label": "C", "info": {"impressions": 0, "clicks": 0, "cost": 0, "format": "banner"}}
        ],
        "edges": [
            {"from": 10, "to": 11, "similarity": 0.9},
            {"from": 11, "to": 99, "similarity": 0.3},
            {"from": 12}
        ]
    }
}"#;

#[test]
fn payload_to_cluster_summaries() {
    let mut graph = parse_graph_payload(PAYLOAD).expect("payload parses");
    assert_eq!(graph.edge_count(), 2);

    backfill_node_ratios(&mut graph.nodes);
    let mut clusters = cluster(&mut graph.nodes, &graph.edges);
    sort_clusters(&mut graph.nodes, &mut clusters, &ClusterOrder::Metric("clicks".to_owned()));

    let summaries = clusters
        .iter()
        .map(|info| serde_json::to_value(info.summary(&graph.nodes)).expect("summary serializes"))
        .collect::<Vec<_>>();

    assert_eq!(
        summaries,
        vec![
            json!({
                "id": "1",
                "size": 2,
                "nodes": [10, 11],
                "metrics": {
                    "clicks": 40.0,
                    "cost": 5.0,
                    "cpm": 5.0 / 150.0 * 1000.0,
                    "ctr": 40.0 / 150.0,
                    "format": "video (2/2)",
                    "impressions": 150.0,
                }
            }),
            json!({
                "id": "2",
                "size": 1,
                "nodes": [12],
                "metrics": {
                    "clicks": 0.0,
                    "cost": 0.0,
                    "cpm": null,
                    "ctr": null,
                    "format": "banner (1/1)",
                    "impressions": 0.0,
                }
            }),
        ]
    );
}

#[test]
fn aggregated_ratios_render_for_display() {
    let mut graph = parse_graph_payload(PAYLOAD).expect("payload parses");
    let clusters = cluster(&mut graph.nodes, &graph.edges);

    let first = &clusters[0].metrics;
    assert_eq!(format_metric_value(&first["ctr"], "ctr"), "0.27");
    assert_eq!(format_metric_value(&first["impressions"], "impressions"), "150");
    assert_eq!(format_metric_value(&clusters[1].metrics["ctr"], "ctr"), "N/A");
}
