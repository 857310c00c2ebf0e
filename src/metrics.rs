//! Aggregation of per-asset metrics into cluster metrics.
//!
//! Numeric metrics are summed, categorical metrics are reduced to their most
//! common value, and the derived ratios are always recomputed from the summed
//! base metrics instead of being summed themselves.

use crate::graph::{MetricValue, MetricsObject, Node};

/// `(name, numerator, denominator, scale)` for every derived ratio.
pub const DERIVED_RATIOS: [(&str, &str, &str, f64); 5] = [
    ("ctr", "clicks", "impressions", 1.0),
    ("cr", "conversions", "clicks", 1.0),
    ("cpa", "cost", "conversions", 1.0),
    ("roas", "conversions_value", "cost", 1.0),
    ("cpm", "cost", "impressions", 1000.0),
];

pub fn is_derived_ratio(key: &str) -> bool {
    DERIVED_RATIOS.iter().any(|(name, ..)| *name == key)
}

/// Aggregates the metrics of a set of nodes.
///
/// The schema comes from the first node that carries `info`; keys that only
/// appear on other nodes are not aggregated. Division by zero in the derived
/// ratios produces a non-finite value instead of an error.
pub fn aggregate<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> MetricsObject {
    let nodes = nodes.into_iter().collect::<Vec<_>>();
    let mut metrics = MetricsObject::new();

    let Some(sample) = nodes.iter().find_map(|node| node.info.as_ref()) else {
        return metrics;
    };

    for (key, sample_value) in sample {
        if is_derived_ratio(key) {
            continue;
        }

        match sample_value {
            MetricValue::Number(_) => {
                let values = nodes
                    .iter()
                    .filter_map(|node| node.metric(key).and_then(MetricValue::as_number))
                    .collect::<Vec<_>>();
                if !values.is_empty() {
                    metrics.insert(key.clone(), MetricValue::Number(values.iter().sum()));
                }
            }
            MetricValue::Text(_) => {
                let values = nodes
                    .iter()
                    .filter_map(|node| node.metric(key).and_then(MetricValue::as_text));
                if let Some((value, count)) = majority(values) {
                    metrics.insert(
                        key.clone(),
                        MetricValue::Text(format!("{value} ({count}/{})", nodes.len())),
                    );
                }
            }
            MetricValue::Flag(_) => {}
        }
    }

    apply_derived_ratios(&mut metrics);
    metrics
}

/// Most frequent value; on a tie the value encountered first wins.
fn majority<'a>(values: impl Iterator<Item = &'a str>) -> Option<(&'a str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }

    counts
        .into_iter()
        .fold(None, |best: Option<(&str, usize)>, candidate| match best {
            Some(current) if current.1 >= candidate.1 => Some(current),
            _ => Some(candidate),
        })
}

/// Writes every derived ratio whose base metrics are both numeric.
pub fn apply_derived_ratios(info: &mut MetricsObject) {
    for (name, numerator, denominator, scale) in DERIVED_RATIOS {
        let top = info.get(numerator).and_then(MetricValue::as_number);
        let bottom = info.get(denominator).and_then(MetricValue::as_number);
        if let (Some(top), Some(bottom)) = (top, bottom) {
            info.insert(name.to_owned(), MetricValue::Number(top / bottom * scale));
        }
    }
}

/// Recomputes the derived ratios on every node from its own values, including
/// each entry of its time series.
pub fn backfill_node_ratios(nodes: &mut [Node]) {
    for node in nodes {
        if let Some(info) = node.info.as_mut() {
            apply_derived_ratios(info);
        }
        for entry in node.series.iter_mut().flatten() {
            apply_derived_ratios(entry);
        }
    }
}
