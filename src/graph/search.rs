use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use super::Node;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

/// Fuzzy-matches `query` against each node's label, asset name and id.
///
/// Returns `(node id, score)` pairs, best match first; ties keep node order.
pub fn search_nodes(nodes: &[Node], query: &str) -> Vec<(i64, i64)> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();
    let mut matches = nodes
        .iter()
        .filter_map(|node| {
            let id = node.id.to_string();
            [node.label.as_deref(), node.name.as_deref(), Some(id.as_str())]
                .into_iter()
                .flatten()
                .filter_map(|text| fuzzy_match_score(&matcher, text, query))
                .max()
                .map(|score| (node.id, score))
        })
        .collect::<Vec<_>>();

    matches.sort_by(|a, b| b.1.cmp(&a.1));
    matches
}
