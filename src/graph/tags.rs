use std::collections::HashMap;

use serde::Serialize;

use super::Node;

/// Usage statistics of a single tag across a set of assets.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TagStats {
    pub tag: String,
    pub freq: usize,
    pub avg_score: f64,
    pub nodes: Vec<i64>,
}

/// Collects per-tag frequency and average score, most frequent first
/// (ties ordered by tag name).
pub fn tag_stats<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Vec<TagStats> {
    let mut by_tag: HashMap<&str, (f64, Vec<i64>)> = HashMap::new();
    for node in nodes {
        for tag in node.tags.iter().flatten() {
            let entry = by_tag.entry(tag.tag.as_str()).or_default();
            entry.0 += tag.score;
            entry.1.push(node.id);
        }
    }

    let mut stats = by_tag
        .into_iter()
        .map(|(tag, (score_sum, nodes))| TagStats {
            tag: tag.to_owned(),
            freq: nodes.len(),
            avg_score: score_sum / nodes.len() as f64,
            nodes,
        })
        .collect::<Vec<_>>();

    stats.sort_by(|a, b| b.freq.cmp(&a.freq).then_with(|| a.tag.cmp(&b.tag)));
    stats
}
