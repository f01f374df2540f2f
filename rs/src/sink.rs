//! Serializes decoded paths to the output file.

use crate::core::errors::Result;
use crate::core::types::Edge;
use crate::graph::RoadGraph;
use std::io::Write;

/// Renders one edge as `country-featureIndex-segInsideFeature`.
fn render_edge(graph: &dyn RoadGraph, edge: &Edge) -> String {
    let country = graph.country_name(edge.feature_id);
    format!("{}-{}-{}", country, edge.feature_id.index, edge.segment_index)
}

/// Writes one line per non-empty path, in the order given (callers must
/// have already sorted by `segmentId`). Segments with empty paths are
/// omitted entirely.
pub fn write_sink<W: Write>(
    writer: &mut W,
    graph: &dyn RoadGraph,
    results: &[(u32, Vec<Edge>)],
) -> Result<()> {
    for (segment_id, path) in results {
        if path.is_empty() {
            continue;
        }
        let tokens: Vec<String> = path.iter().map(|e| render_edge(graph, e)).collect();
        writeln!(writer, "{}\t{}", segment_id, tokens.join("="))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FeatureId;
    use crate::graph::InMemoryRoadGraph;

    #[test]
    fn omits_empty_paths_and_joins_edges_with_equals() {
        let mut graph = InMemoryRoadGraph::new("DE");
        let a = crate::core::types::Junction::new(0.0, 0.0);
        let b = crate::core::types::Junction::new(1.0, 0.0);
        let c = crate::core::types::Junction::new(2.0, 0.0);
        graph.add_edge(FeatureId { mwm_id: 1, index: 7 }, 0, a, b, vec!["tertiary".into()]);
        graph.add_edge(FeatureId { mwm_id: 1, index: 8 }, 3, b, c, vec!["tertiary".into()]);

        let e1 = Edge {
            feature_id: FeatureId { mwm_id: 1, index: 7 },
            segment_index: 0,
            is_fake: false,
            start: a,
            end: b,
        };
        let e2 = Edge {
            feature_id: FeatureId { mwm_id: 1, index: 8 },
            segment_index: 3,
            is_fake: false,
            start: b,
            end: c,
        };

        let results = vec![(1u32, vec![e1, e2]), (2u32, Vec::new())];
        let mut out = Vec::new();
        write_sink(&mut out, &graph, &results).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "1\tDE-7-0=DE-8-3\n");
    }
}
