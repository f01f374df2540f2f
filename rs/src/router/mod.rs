//! The A* router: the central algorithm. A multi-stage shortest-path
//! search over the road graph with a composite cost function, an
//! admissible pivot-set potential heuristic, bearing checks and
//! overshoot cutoffs.

use crate::classifier::ClassifierCache;
use crate::core::types::{Edge, FunctionalRoadClass, Junction};
use crate::geo;
use crate::graph::{FakeOverlay, RoadGraph};
use crate::score::Score;
use crate::vertex::{Links, Vertex};
use rustc_hash::FxHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Up to this many closest edges are used to build a pivot set or to seed
/// the source/sink fakes.
pub const MAX_ROAD_CANDIDATES: usize = 10;
/// Overshoot tolerance floor, meters.
pub const DISTANCE_ACCURACY_M: f64 = 1000.0;
/// Distance from stage start at which the bearing is checked, meters.
pub const BEARING_DIST_M: f64 = 25.0;
/// "Essentially at the anchor" tolerance, meters.
const EPS_M: f64 = 1e-3;

/// One reference point after mercator projection, internal to the router.
#[derive(Debug, Clone, Copy)]
pub struct InrixPoint {
    pub junction: Junction,
    pub bearing: u8,
    /// Meaningless on the last point.
    pub distance_to_next_point_meters: f64,
    /// Meaningless on the last point.
    pub lowest_frc_to_next_point: FunctionalRoadClass,
}

struct HeapEntry {
    vertex: Vertex,
    score: Score,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score.total() == other.score.total()
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score.cmp(&other.score)
    }
}

/// One A* run's worth of state: pivot sets, open set, score table and
/// links. Constructed fresh per segment, so there is no state to reset
/// between runs — the fake overlay and score table are rebuilt each time.
pub struct AStarRouter;

impl AStarRouter {
    pub fn new() -> Self {
        AStarRouter
    }

    /// Runs the multi-stage search for one reference. Returns an empty
    /// path if the open set empties before the goal is reached.
    pub fn find_path(
        &self,
        graph: &dyn RoadGraph,
        classifier: &mut ClassifierCache,
        points: &[InrixPoint],
    ) -> Vec<Edge>
    where
    {
        self.find_path_checked(graph, classifier, points)
            .unwrap_or_default()
    }

    fn find_path_checked(
        &self,
        graph: &dyn RoadGraph,
        classifier: &mut ClassifierCache,
        points: &[InrixPoint],
    ) -> Option<Vec<Edge>> {
        assert!(points.len() >= 2, "a reference always has >= 2 points");
        let n = points.len();
        let num_stages = n - 1;

        let mut overlay = FakeOverlay::new(graph);
        let pivot_sets = build_pivot_sets(graph, points);
        assert_eq!(pivot_sets.len(), num_stages, "pivot-set length must equal n-1");

        let source = points[0].junction;
        let sink = points[n - 1].junction;
        install_boundary_fakes(graph, &mut overlay, source, points[0].junction, true);
        install_boundary_fakes(graph, &mut overlay, sink, points[n - 1].junction, false);

        let pi_source = potential(&pivot_sets, 0, source);

        let mut scores: FxHashMap<Vertex, Score> = FxHashMap::default();
        let mut links = Links::new();
        let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::new();

        let v0 = Vertex::initial(source);
        scores.insert(v0, Score::zero());
        heap.push(Reverse(HeapEntry {
            vertex: v0,
            score: Score::zero(),
        }));

        while let Some(Reverse(current)) = heap.pop() {
            let u = current.vertex;
            let u_score = current.score;

            if scores.get(&u).map(|s| s.total()) != Some(u_score.total()) {
                continue; // stale entry
            }

            assert!(u.stage <= num_stages, "popped vertex stage must be < n");
            if u.stage == num_stages {
                return Some(links.reconstruct_path(u));
            }

            let pi_u = potential(&pivot_sets, u.stage, u.junction);
            let ud = u_score.distance() + pi_source - pi_u;
            let dnp_s = points[u.stage].distance_to_next_point_meters;

            // 1. Overshoot cutoff.
            if ud > u.stage_start_distance + dnp_s + DISTANCE_ACCURACY_M.max(dnp_s) {
                continue;
            }

            // 2. Bearing-check transition.
            if pi_u < EPS_M && !u.bearing_checked {
                let mut new_score = u_score;
                if u.stage_start != u.junction {
                    new_score = new_score.add_bearing_penalty(
                        points[u.stage].bearing,
                        geo::bearing(u.stage_start, u.junction),
                        BEARING_DIST_M,
                    );
                }
                let v = Vertex {
                    junction: u.junction,
                    stage_start: u.stage_start,
                    stage_start_distance: u.stage_start_distance,
                    stage: u.stage,
                    bearing_checked: true,
                };
                relax(
                    &mut scores,
                    &mut links,
                    &mut heap,
                    v,
                    new_score,
                    u,
                    Edge::make_fake(u.junction, u.junction),
                );
            }

            // 3. Stage advance.
            if pi_u < EPS_M && u.bearing_checked {
                let next_stage = u.stage + 1;
                let v = Vertex {
                    junction: u.junction,
                    stage_start: u.junction,
                    stage_start_distance: ud,
                    stage: next_stage,
                    bearing_checked: false,
                };
                let pi_v = if next_stage == num_stages {
                    0.0
                } else {
                    potential(&pivot_sets, next_stage, v.junction)
                };
                let mut new_score = u_score.add_distance((pi_v - pi_u).max(0.0));
                let target = points[u.stage + 1].junction;
                new_score =
                    new_score.add_intermediate_error_penalty(geo::distance_on_earth(u.junction, target));

                let is_last_transition = next_stage == num_stages;
                if is_last_transition {
                    let arrival_point = reverse_bearing_point(&links, u, BEARING_DIST_M);
                    let arrival_bearing = geo::bearing(u.junction, arrival_point);
                    new_score = new_score.add_bearing_penalty(
                        points[n - 1].bearing,
                        arrival_bearing,
                        BEARING_DIST_M,
                    );
                }

                relax(
                    &mut scores,
                    &mut links,
                    &mut heap,
                    v,
                    new_score,
                    u,
                    Edge::make_fake(u.junction, u.junction),
                );

                if is_last_transition {
                    continue; // do not expand further edges from u
                }
            }

            // 4. Edge expansion.
            for edge in overlay.outgoing_edges(u.junction) {
                if !classifier.pass_frc_lowest_restriction(
                    graph,
                    &edge,
                    points[u.stage].lowest_frc_to_next_point,
                ) {
                    continue;
                }

                let w = geo::distance_on_earth(edge.start, edge.end);
                let mut v = Vertex {
                    junction: edge.end,
                    stage_start: u.stage_start,
                    stage_start_distance: u.stage_start_distance,
                    stage: u.stage,
                    bearing_checked: u.bearing_checked,
                };
                let pi_v = potential(&pivot_sets, v.stage, v.junction);
                let mut new_score = u_score.add_distance((w + pi_v - pi_u).max(0.0));
                let vd = ud + w;

                if !v.bearing_checked && vd >= u.stage_start_distance + BEARING_DIST_M {
                    debug_assert!(ud < u.stage_start_distance + BEARING_DIST_M);
                    let interp_dist = vd - u.stage_start_distance - BEARING_DIST_M;
                    let p = geo::point_at_segment(edge.start, edge.end, interp_dist);
                    if u.stage_start != p {
                        new_score = new_score.add_bearing_penalty(
                            points[u.stage].bearing,
                            geo::bearing(u.stage_start, p),
                            BEARING_DIST_M,
                        );
                    }
                    v.bearing_checked = true;
                }

                if vd > v.stage_start_distance + dnp_s {
                    let over = (vd - v.stage_start_distance - dnp_s).min(w);
                    new_score = new_score.add_distance_error_penalty(over);
                }

                if edge.is_fake {
                    new_score = new_score.add_fake_penalty(w);
                }

                relax(&mut scores, &mut links, &mut heap, v, new_score, u, edge);
            }
        }

        None
    }
}

impl Default for AStarRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn potential(pivot_sets: &[Vec<Junction>], stage: usize, junction: Junction) -> f64 {
    pivot_sets[stage]
        .iter()
        .map(|p| geo::distance_on_earth(junction, *p))
        .fold(f64::INFINITY, f64::min)
}

fn build_pivot_sets(graph: &dyn RoadGraph, points: &[InrixPoint]) -> Vec<Vec<Junction>> {
    let n = points.len();
    let num_stages = n - 1;
    let mut pivot_sets = Vec::with_capacity(num_stages);
    for stage in 0..num_stages {
        let anchor_index = stage + 1;
        if anchor_index == n - 1 {
            pivot_sets.push(vec![points[anchor_index].junction]);
        } else {
            let candidates = graph.closest_edges(points[anchor_index].junction, MAX_ROAD_CANDIDATES);
            let mut set = Vec::with_capacity(candidates.len() * 2);
            for c in candidates {
                set.push(c.start);
                set.push(c.end);
            }
            pivot_sets.push(set);
        }
    }
    pivot_sets
}

fn install_boundary_fakes(
    graph: &dyn RoadGraph,
    overlay: &mut FakeOverlay,
    synthetic: Junction,
    at: Junction,
    from_synthetic: bool,
) {
    let candidates = graph.closest_edges(at, MAX_ROAD_CANDIDATES);
    for c in candidates {
        if from_synthetic {
            overlay.install_fake(synthetic, c.start);
            overlay.install_fake(synthetic, c.end);
        } else {
            overlay.install_fake(c.start, synthetic);
            overlay.install_fake(c.end, synthetic);
        }
    }
}

fn relax(
    scores: &mut FxHashMap<Vertex, Score>,
    links: &mut Links,
    heap: &mut BinaryHeap<Reverse<HeapEntry>>,
    v: Vertex,
    new_score: Score,
    parent: Vertex,
    edge: Edge,
) {
    let better = match scores.get(&v) {
        Some(existing) => new_score.total() < existing.total(),
        None => true,
    };
    if better {
        scores.insert(v, new_score);
        links.set(v, parent, edge);
        heap.push(Reverse(HeapEntry {
            vertex: v,
            score: new_score,
        }));
    }
}

/// Walks backward in `links` from `u`, accumulating edge lengths within
/// the current stage, until the accumulated length reaches `target_m`;
/// interpolates that point on the last traversed edge from its end back
/// toward its start. Falls back to the earliest junction in the stage if
/// the stage's total length is shorter than `target_m`. Used to find the
/// point the last LRP's declared bearing is measured against, which looks
/// backward along the path instead of forward.
fn reverse_bearing_point(links: &Links, u: Vertex, target_m: f64) -> Junction {
    let mut accumulated = 0.0;
    let mut current = u;
    let mut earliest = u.junction;

    while let Some((parent, edge)) = links.parent_of(&current) {
        if parent.stage != u.stage {
            break;
        }
        let edge_len = geo::distance_on_earth(edge.start, edge.end);
        if accumulated + edge_len >= target_m {
            let remaining = target_m - accumulated;
            return geo::point_at_segment(edge.end, edge.start, remaining);
        }
        accumulated += edge_len;
        earliest = parent.junction;
        current = *parent;
    }
    earliest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryRoadGraph;

    fn pt(lat: f64, lon: f64) -> Junction {
        geo::project(crate::core::types::LatLon::new(lat, lon))
    }

    #[test]
    fn straight_road_two_points_finds_single_edge() {
        // A single east-running tertiary edge of ~100m.
        let mut graph = InMemoryRoadGraph::new("DE");
        let a = pt(50.0, 13.0);
        let b = pt(50.0, 13.0014); // ~100m east at this latitude
        graph.add_edge(
            crate::core::types::FeatureId { mwm_id: 1, index: 0 },
            0,
            a,
            b,
            vec!["tertiary".to_string()],
        );

        let bearing_east = geo::bearing(a, b);
        // The last LRP's bearing is measured looking backward along the
        // path, not forward.
        let bearing_west = geo::bearing(b, a);
        let points = vec![
            InrixPoint {
                junction: a,
                bearing: bearing_east,
                distance_to_next_point_meters: geo::distance_on_earth(a, b),
                lowest_frc_to_next_point: FunctionalRoadClass::Frc3,
            },
            InrixPoint {
                junction: b,
                bearing: bearing_west,
                distance_to_next_point_meters: 0.0,
                lowest_frc_to_next_point: FunctionalRoadClass::NotAValue,
            },
        ];

        let router = AStarRouter::new();
        let mut classifier = ClassifierCache::new();
        let path = router.find_path(&graph, &mut classifier, &points);

        assert_eq!(path.len(), 1);
        assert!(!path[0].is_fake);
        assert_eq!(path[0].start, a);
        assert_eq!(path[0].end, b);
    }

    #[test]
    fn overshoot_cutoff_drops_segment_with_tiny_dnp_and_long_edge() {
        // DNP=50m but the only connecting edge is ~10km long, so it must
        // be dropped by the overshoot cutoff.
        let mut graph = InMemoryRoadGraph::new("DE");
        let a = pt(50.0, 13.0);
        let b = pt(50.09, 13.0); // roughly 10km north
        graph.add_edge(
            crate::core::types::FeatureId { mwm_id: 1, index: 0 },
            0,
            a,
            b,
            vec!["tertiary".to_string()],
        );

        let points = vec![
            InrixPoint {
                junction: a,
                bearing: 0,
                distance_to_next_point_meters: 50.0,
                lowest_frc_to_next_point: FunctionalRoadClass::Frc2,
            },
            InrixPoint {
                junction: b,
                bearing: 0,
                distance_to_next_point_meters: 0.0,
                lowest_frc_to_next_point: FunctionalRoadClass::NotAValue,
            },
        ];

        let router = AStarRouter::new();
        let mut classifier = ClassifierCache::new();
        let path = router.find_path(&graph, &mut classifier, &points);
        assert!(path.is_empty());
    }

    #[test]
    fn frc_restriction_filters_out_residential_edge() {
        // lfrcnp = FRC2, but the only route is a residential (FRC4) edge,
        // which the restriction must filter out.
        let mut graph = InMemoryRoadGraph::new("DE");
        let a = pt(50.0, 13.0);
        let b = pt(50.0, 13.0014);
        graph.add_edge(
            crate::core::types::FeatureId { mwm_id: 1, index: 0 },
            0,
            a,
            b,
            vec!["residential".to_string()],
        );

        let points = vec![
            InrixPoint {
                junction: a,
                bearing: geo::bearing(a, b),
                distance_to_next_point_meters: geo::distance_on_earth(a, b),
                lowest_frc_to_next_point: FunctionalRoadClass::Frc2,
            },
            InrixPoint {
                junction: b,
                bearing: geo::bearing(a, b),
                distance_to_next_point_meters: 0.0,
                lowest_frc_to_next_point: FunctionalRoadClass::NotAValue,
            },
        ];

        let router = AStarRouter::new();
        let mut classifier = ClassifierCache::new();
        let path = router.find_path(&graph, &mut classifier, &points);
        assert!(path.is_empty());
    }

    #[test]
    fn two_stage_route_threads_through_intermediate_junction() {
        // A -> J -> C on two tertiary edges, with the reference's middle
        // point placed exactly at J.
        let mut graph = InMemoryRoadGraph::new("DE");
        let a = pt(50.0, 13.0);
        let j = pt(50.0, 13.0028);
        let c = pt(50.0, 13.0056);
        graph.add_edge(
            crate::core::types::FeatureId { mwm_id: 1, index: 0 },
            0,
            a,
            j,
            vec!["tertiary".to_string()],
        );
        graph.add_edge(
            crate::core::types::FeatureId { mwm_id: 1, index: 1 },
            0,
            j,
            c,
            vec!["tertiary".to_string()],
        );

        let points = vec![
            InrixPoint {
                junction: a,
                bearing: geo::bearing(a, j),
                distance_to_next_point_meters: geo::distance_on_earth(a, j),
                lowest_frc_to_next_point: FunctionalRoadClass::Frc3,
            },
            InrixPoint {
                junction: j,
                bearing: geo::bearing(j, c),
                distance_to_next_point_meters: geo::distance_on_earth(j, c),
                lowest_frc_to_next_point: FunctionalRoadClass::Frc3,
            },
            InrixPoint {
                junction: c,
                bearing: geo::bearing(c, j),
                distance_to_next_point_meters: 0.0,
                lowest_frc_to_next_point: FunctionalRoadClass::NotAValue,
            },
        ];

        let router = AStarRouter::new();
        let mut classifier = ClassifierCache::new();
        let path = router.find_path(&graph, &mut classifier, &points);

        assert_eq!(path.len(), 2);
        assert_eq!(path[0].start, a);
        assert_eq!(path[0].end, j);
        assert_eq!(path[1].start, j);
        assert_eq!(path[1].end, c);
        for window in path.windows(2) {
            assert_eq!(window[0].end, window[1].start);
        }
    }

    #[test]
    fn bearing_penalty_breaks_a_tie_between_equal_length_routes() {
        // A connects to D via two routes of identical total length
        // (A-M1-D and A-M2-D, mirrored across the A-D line). Only
        // the bearing penalty distinguishes them, so the router must take
        // the one whose initial heading matches the reference's declared
        // bearing.
        let a = Junction::new(0.0, 0.0);
        let d = Junction::new(200.0, 0.0);
        let m1 = Junction::new(100.0, 100.0);
        let m2 = Junction::new(100.0, -100.0);

        let mut graph = InMemoryRoadGraph::new("DE");
        graph.add_edge(crate::core::types::FeatureId { mwm_id: 1, index: 0 }, 0, a, m1, vec!["tertiary".into()]);
        graph.add_edge(crate::core::types::FeatureId { mwm_id: 1, index: 1 }, 0, m1, d, vec!["tertiary".into()]);
        graph.add_edge(crate::core::types::FeatureId { mwm_id: 1, index: 2 }, 0, a, m2, vec!["tertiary".into()]);
        graph.add_edge(crate::core::types::FeatureId { mwm_id: 1, index: 3 }, 0, m2, d, vec!["tertiary".into()]);

        let dnp = geo::distance_on_earth(a, m1) + geo::distance_on_earth(m1, d);
        assert!((dnp - (geo::distance_on_earth(a, m2) + geo::distance_on_earth(m2, d))).abs() < 1e-6);

        let points = vec![
            InrixPoint {
                junction: a,
                bearing: geo::bearing(a, m1),
                distance_to_next_point_meters: dnp,
                lowest_frc_to_next_point: FunctionalRoadClass::Frc3,
            },
            InrixPoint {
                junction: d,
                bearing: geo::bearing(d, m1),
                distance_to_next_point_meters: 0.0,
                lowest_frc_to_next_point: FunctionalRoadClass::NotAValue,
            },
        ];

        let router = AStarRouter::new();
        let mut classifier = ClassifierCache::new();
        let path = router.find_path(&graph, &mut classifier, &points);

        assert_eq!(path.len(), 2);
        assert_eq!(path[0].start, a);
        assert_eq!(path[0].end, m1);
        assert_eq!(path[1].start, m1);
        assert_eq!(path[1].end, d);
    }
}
