//! The road-graph backend is an external collaborator: this module
//! defines the trait boundary the router needs, a thin fake-edge overlay
//! implementing a "wrap, don't mutate" strategy, and a small in-memory
//! reference implementation, built as an `rstar`-backed edge index, good
//! enough for tests and standalone runs.

use crate::core::errors::{DecoderError, Result};
use crate::core::types::{CountryName, Edge, FeatureId, Junction, LatLon};
use crate::geo;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use rustc_hash::FxHashMap;

/// Operations the router needs from the private road network backend.
pub trait RoadGraph: Send + Sync {
    /// All edges leaving `junction`.
    fn outgoing_edges(&self, junction: Junction) -> Vec<Edge>;

    /// Up to `max_candidates` closest edges to `point`.
    fn closest_edges(&self, point: Junction, max_candidates: usize) -> Vec<Edge>;

    /// Raw highway/type tags for a feature, for classification.
    fn feature_types(&self, feature_id: FeatureId) -> Vec<String>;

    /// Map-tile identifier carried by the feature id's mwm info.
    fn country_name(&self, feature_id: FeatureId) -> CountryName;
}

fn junction_key(j: Junction) -> (i64, i64) {
    ((j.merc_x * 1000.0).round() as i64, (j.merc_y * 1000.0).round() as i64)
}

/// Per-decode overlay answering `outgoing_edges` as the union of the
/// backing graph's real edges and the fakes installed for this decode.
/// Chosen over mutating the backing graph so it can be shared read-only
/// across workers.
pub struct FakeOverlay<'g> {
    inner: &'g dyn RoadGraph,
    fakes: FxHashMap<(i64, i64), Vec<Edge>>,
}

impl<'g> FakeOverlay<'g> {
    pub fn new(inner: &'g dyn RoadGraph) -> Self {
        Self {
            inner,
            fakes: FxHashMap::default(),
        }
    }

    /// Install a fake edge `from -> to`. `is_fake` is always set.
    pub fn install_fake(&mut self, from: Junction, to: Junction) {
        self.fakes
            .entry(junction_key(from))
            .or_default()
            .push(Edge::make_fake(from, to));
    }

    /// Clears all previously-installed fakes.
    pub fn reset(&mut self) {
        self.fakes.clear();
    }
}

impl RoadGraph for FakeOverlay<'_> {
    fn outgoing_edges(&self, junction: Junction) -> Vec<Edge> {
        let mut edges = self.inner.outgoing_edges(junction);
        if let Some(extra) = self.fakes.get(&junction_key(junction)) {
            edges.extend_from_slice(extra);
        }
        edges
    }

    fn closest_edges(&self, point: Junction, max_candidates: usize) -> Vec<Edge> {
        self.inner.closest_edges(point, max_candidates)
    }

    fn feature_types(&self, feature_id: FeatureId) -> Vec<String> {
        self.inner.feature_types(feature_id)
    }

    fn country_name(&self, feature_id: FeatureId) -> CountryName {
        self.inner.country_name(feature_id)
    }
}

#[derive(Clone)]
struct EdgeEnvelope {
    edge: Edge,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for EdgeEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for EdgeEnvelope {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope.distance_2(point)
    }
}

/// A small, in-memory road graph: good enough to drive the decoder
/// standalone and in tests, built as an `rstar::RTree` bulk-load over a
/// plain adjacency map.
pub struct InMemoryRoadGraph {
    adjacency: FxHashMap<(i64, i64), Vec<Edge>>,
    rtree: RTree<EdgeEnvelope>,
    feature_types: FxHashMap<FeatureId, Vec<String>>,
    country: CountryName,
}

impl InMemoryRoadGraph {
    pub fn new(country: impl Into<CountryName>) -> Self {
        Self {
            adjacency: FxHashMap::default(),
            rtree: RTree::new(),
            feature_types: FxHashMap::default(),
            country: country.into(),
        }
    }

    /// Adds a directed edge, indexing it for both adjacency and nearest
    /// lookups. Also registers the reverse edge so bidirectional travel is
    /// possible, which real graph backends expose too.
    pub fn add_edge(
        &mut self,
        feature_id: FeatureId,
        segment_index: u32,
        start: Junction,
        end: Junction,
        types: Vec<String>,
    ) {
        self.feature_types.insert(feature_id, types);

        let forward = Edge {
            feature_id,
            segment_index,
            is_fake: false,
            start,
            end,
        };
        self.index_edge(forward);

        let backward = Edge {
            feature_id,
            segment_index,
            is_fake: false,
            start: end,
            end: start,
        };
        self.index_edge(backward);
    }

    /// Loads a graph from a minimal whitespace-separated text format, one
    /// edge per line: `mwm_id index segment_index lat1 lon1 lat2 lon2
    /// type1,type2,...`. Not a general-purpose map format — it exists only
    /// so the CLI binary has a real standalone road source to run against.
    pub fn load_from_text(text: &str, country: impl Into<CountryName>) -> Result<Self> {
        let mut graph = Self::new(country);
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 8 {
                return Err(DecoderError::InvalidReference(format!(
                    "roads file line {}: expected 8 fields, got {}",
                    line_no + 1,
                    fields.len()
                )));
            }
            fn parse_field<T: std::str::FromStr>(s: &str, what: &str, line_no: usize) -> Result<T> {
                s.parse().map_err(|_| {
                    DecoderError::InvalidReference(format!(
                        "roads file line {}: invalid {what} '{s}'",
                        line_no + 1
                    ))
                })
            }
            let mwm_id: u32 = parse_field(fields[0], "mwm_id", line_no)?;
            let index: u32 = parse_field(fields[1], "index", line_no)?;
            let segment_index: u32 = parse_field(fields[2], "segment_index", line_no)?;
            let lat1: f64 = parse_field(fields[3], "lat1", line_no)?;
            let lon1: f64 = parse_field(fields[4], "lon1", line_no)?;
            let lat2: f64 = parse_field(fields[5], "lat2", line_no)?;
            let lon2: f64 = parse_field(fields[6], "lon2", line_no)?;
            let types: Vec<String> = fields[7].split(',').map(str::to_string).collect();

            let start = geo::project(LatLon::new(lat1, lon1));
            let end = geo::project(LatLon::new(lat2, lon2));
            graph.add_edge(FeatureId { mwm_id, index }, segment_index, start, end, types);
        }
        Ok(graph)
    }

    fn index_edge(&mut self, edge: Edge) {
        self.adjacency
            .entry(junction_key(edge.start))
            .or_default()
            .push(edge);

        let envelope = AABB::from_corners(
            [edge.start.merc_x.min(edge.end.merc_x), edge.start.merc_y.min(edge.end.merc_y)],
            [edge.start.merc_x.max(edge.end.merc_x), edge.start.merc_y.max(edge.end.merc_y)],
        );
        self.rtree.insert(EdgeEnvelope { edge, envelope });
    }
}

impl RoadGraph for InMemoryRoadGraph {
    fn outgoing_edges(&self, junction: Junction) -> Vec<Edge> {
        self.adjacency
            .get(&junction_key(junction))
            .cloned()
            .unwrap_or_default()
    }

    fn closest_edges(&self, point: Junction, max_candidates: usize) -> Vec<Edge> {
        self.rtree
            .nearest_neighbor_iter(&[point.merc_x, point.merc_y])
            .take(max_candidates)
            .map(|e| e.edge)
            .collect()
    }

    fn feature_types(&self, feature_id: FeatureId) -> Vec<String> {
        self.feature_types.get(&feature_id).cloned().unwrap_or_default()
    }

    fn country_name(&self, _feature_id: FeatureId) -> CountryName {
        self.country.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(i: u32) -> FeatureId {
        FeatureId { mwm_id: 1, index: i }
    }

    #[test]
    fn closest_edges_returns_nearest_first() {
        let mut g = InMemoryRoadGraph::new("DE");
        let a = Junction::new(0.0, 0.0);
        let b = Junction::new(100.0, 0.0);
        let c = Junction::new(1000.0, 0.0);
        let d = Junction::new(1100.0, 0.0);
        g.add_edge(feature(1), 0, a, b, vec!["tertiary".into()]);
        g.add_edge(feature(2), 0, c, d, vec!["tertiary".into()]);

        let near = g.closest_edges(Junction::new(5.0, 0.0), 1);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].feature_id, feature(1));
    }

    #[test]
    fn fake_overlay_unions_fakes_with_real_edges() {
        let mut g = InMemoryRoadGraph::new("DE");
        let a = Junction::new(0.0, 0.0);
        let b = Junction::new(100.0, 0.0);
        g.add_edge(feature(1), 0, a, b, vec!["tertiary".into()]);

        let mut overlay = FakeOverlay::new(&g);
        let source = Junction::new(-1.0, -1.0);
        overlay.install_fake(source, a);

        let edges = overlay.outgoing_edges(source);
        assert_eq!(edges.len(), 1);
        assert!(edges[0].is_fake);

        overlay.reset();
        assert!(overlay.outgoing_edges(source).is_empty());
    }
}
