//! Road-class classifier: resolves a feature id to `(FunctionalRoadClass,
//! FormOfAWay)` using a static highway-tag table, memoized per decode run.

use crate::core::types::{FeatureId, FormOfAWay, FunctionalRoadClass, RoadInfo};
use crate::graph::RoadGraph;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

/// `{highway tag -> (FRC, FOW)}` table, built once and shared read-only
/// across workers.
fn type_table() -> &'static FxHashMap<&'static str, (FunctionalRoadClass, FormOfAWay)> {
    static TABLE: OnceLock<FxHashMap<&'static str, (FunctionalRoadClass, FormOfAWay)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        use FormOfAWay::{Motorway, MultipleCarriageway, SingleCarriageway};
        use FunctionalRoadClass::{Frc0, Frc1, Frc2, Frc3, Frc4, Frc5};
        FxHashMap::from_iter([
            ("motorway", (Frc0, Motorway)),
            ("motorway_link", (Frc0, Motorway)),
            ("trunk", (Frc0, Motorway)),
            ("trunk_link", (Frc0, Motorway)),
            ("primary", (Frc1, MultipleCarriageway)),
            ("primary_link", (Frc1, MultipleCarriageway)),
            ("secondary", (Frc2, SingleCarriageway)),
            ("secondary_link", (Frc2, SingleCarriageway)),
            ("tertiary", (Frc3, SingleCarriageway)),
            ("tertiary_link", (Frc3, SingleCarriageway)),
            ("road", (Frc4, SingleCarriageway)),
            ("unclassified", (Frc4, SingleCarriageway)),
            ("residential", (Frc4, SingleCarriageway)),
            ("living_street", (Frc5, SingleCarriageway)),
        ])
    })
}

fn classify(types: &[String]) -> RoadInfo {
    let table = type_table();
    let matches: Vec<(FunctionalRoadClass, FormOfAWay)> =
        types.iter().filter_map(|t| table.get(t.as_str()).copied()).collect();

    let frc = matches
        .iter()
        .map(|(frc, _)| *frc)
        .min()
        .unwrap_or(FunctionalRoadClass::Frc7);
    let fow = matches
        .iter()
        .map(|(_, fow)| *fow)
        .find(|f| *f != FormOfAWay::SingleCarriageway)
        .unwrap_or(FormOfAWay::SingleCarriageway);
    RoadInfo { frc, fow }
}

/// Per-worker, per-decode-run cache. Never shared across workers.
pub struct ClassifierCache {
    cache: FxHashMap<FeatureId, RoadInfo>,
}

impl ClassifierCache {
    pub fn new() -> Self {
        Self {
            cache: FxHashMap::default(),
        }
    }

    /// Consults the cache; on miss, loads the feature's type set from the
    /// graph, classifies it, and stores the result.
    pub fn road_info(&mut self, graph: &dyn RoadGraph, feature_id: FeatureId) -> RoadInfo {
        if let Some(info) = self.cache.get(&feature_id) {
            return *info;
        }
        let types = graph.feature_types(feature_id);
        let info = classify(&types);
        self.cache.insert(feature_id, info);
        info
    }

    /// Fake edges always pass; real edges are compared by cached FRC.
    pub fn pass_frc_lowest_restriction(
        &mut self,
        graph: &dyn RoadGraph,
        edge: &crate::core::types::Edge,
        restriction: FunctionalRoadClass,
    ) -> bool {
        if edge.is_fake {
            return true;
        }
        let info = self.road_info(graph, edge.feature_id);
        info.frc.passes_restriction(restriction)
    }
}

impl Default for ClassifierCache {
    fn default() -> Self {
        Self::new()
    }
}
