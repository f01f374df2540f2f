//! Worker pool & batching: partitions segments over `N` plain OS threads
//! in interleaved, cache-line-aligned batches, so each worker touches a
//! contiguous slab of the input array with no false sharing. Deliberately
//! `std::thread::scope`, not `rayon` — each worker runs a self-contained
//! decode loop with no work-stealing across threads, which contradicts
//! rayon's cooperating-pool model (see DESIGN.md).

use crate::classifier::ClassifierCache;
use crate::core::errors::SegmentDecodeFailure;
use crate::core::types::{DecodeStats, Edge, LinearSegment};
use crate::geo;
use crate::graph::RoadGraph;
use crate::router::{AStarRouter, InrixPoint};

const CACHE_LINE_BYTES: usize = 64;

fn cache_line_units(elem_bytes: usize) -> usize {
    let elem_bytes = elem_bytes.max(1);
    CACHE_LINE_BYTES.div_ceil(elem_bytes)
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: usize, b: usize) -> usize {
    a / gcd(a, b) * b
}

/// `B`: the least common multiple of the cache-line-aligned unit counts
/// of the input and output element types.
pub fn batch_size<In, Out>() -> usize {
    let in_units = cache_line_units(std::mem::size_of::<In>());
    let out_units = cache_line_units(std::mem::size_of::<Out>());
    lcm(in_units, out_units)
}

/// Assigns flat segment indices to `num_threads` workers in interleaved
/// batches of `batch` elements: batch `b` goes to worker `b % num_threads`.
pub fn partition_batches(total: usize, num_threads: usize, batch: usize) -> Vec<Vec<usize>> {
    let mut assignments = vec![Vec::new(); num_threads.max(1)];
    let batch = batch.max(1);
    let mut start = 0;
    let mut b = 0;
    while start < total {
        let end = (start + batch).min(total);
        assignments[b % num_threads.max(1)].extend(start..end);
        start = end;
        b += 1;
    }
    assignments
}

/// One worker's per-run counters, cache-line padded to avoid false
/// sharing if ever aggregated concurrently.
#[repr(align(64))]
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerStats {
    pub total: u64,
    pub routes_failed: u64,
}

fn decode_one(
    graph: &dyn RoadGraph,
    classifier: &mut ClassifierCache,
    router: &AStarRouter,
    segment: &LinearSegment,
) -> Vec<Edge> {
    let points: Vec<InrixPoint> = segment
        .location_reference
        .points
        .iter()
        .map(|p| InrixPoint {
            junction: geo::project(p.lat_lon),
            bearing: p.bearing,
            distance_to_next_point_meters: p.distance_to_next_point_meters as f64,
            lowest_frc_to_next_point: p.lowest_frc_to_next_point,
        })
        .collect();
    router.find_path(graph, classifier, &points)
}

/// One worker's decode loop: a fresh `ClassifierCache` and `AStarRouter`,
/// touching only the indices assigned to it, returning its own results
/// rather than writing into shared state — each index is still owned by
/// exactly one worker, just without the unsafe aliasing a literal shared
/// output slice would need.
fn run_worker(
    thread_index: usize,
    graph: &dyn RoadGraph,
    segments: &[LinearSegment],
    indices: &[usize],
) -> (Vec<(usize, Vec<Edge>)>, WorkerStats) {
    let mut classifier = ClassifierCache::new();
    let router = AStarRouter::new();
    let mut stats = WorkerStats::default();
    let mut results = Vec::with_capacity(indices.len());

    for (completed, &idx) in indices.iter().enumerate() {
        let path = decode_one(graph, &mut classifier, &router, &segments[idx]);
        stats.total += 1;
        if path.is_empty() {
            stats.routes_failed += 1;
            let failure = SegmentDecodeFailure {
                segment_id: segments[idx].segment_id,
                reason: "no path satisfied the reference within the search bounds".to_string(),
            };
            log::warn!("{failure}");
        }
        results.push((idx, path));

        if (completed + 1) % 100 == 0 {
            log::debug!("worker {thread_index}: decoded {} segments", completed + 1);
        }
    }

    (results, stats)
}

/// Dispatches `segments` across `num_threads` workers, worker 0 running
/// on the calling thread, and returns one path per segment (in
/// `segments` order) plus merged statistics.
pub fn decode_all_segments(
    graph: &dyn RoadGraph,
    segments: &[LinearSegment],
    num_threads: usize,
) -> (Vec<Vec<Edge>>, DecodeStats) {
    let batch = batch_size::<LinearSegment, Vec<Edge>>();
    let assignments = partition_batches(segments.len(), num_threads, batch);

    let mut paths: Vec<Vec<Edge>> = vec![Vec::new(); segments.len()];
    let mut merged = DecodeStats::default();

    std::thread::scope(|scope| {
        let handles: Vec<_> = assignments
            .iter()
            .enumerate()
            .skip(1)
            .map(|(t, indices)| {
                let indices = indices.clone();
                scope.spawn(move || run_worker(t, graph, segments, &indices))
            })
            .collect();

        let (results0, stats0) = run_worker(0, graph, segments, &assignments[0]);
        for (idx, path) in results0 {
            paths[idx] = path;
        }
        merged.merge(&stats0);

        for handle in handles {
            let (results, stats) = handle.join().expect("worker thread panicked");
            for (idx, path) in results {
                paths[idx] = path;
            }
            merged.merge(&stats);
        }
    });

    (paths, merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_batches_covers_every_index_exactly_once() {
        let assignments = partition_batches(37, 4, 3);
        let mut seen: Vec<usize> = assignments.iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn partition_batches_is_interleaved_not_contiguous() {
        let assignments = partition_batches(12, 3, 2);
        // worker 0 gets batch 0 ([0,1]) and batch 3 ([6,7]), not a contiguous run.
        assert_eq!(assignments[0], vec![0, 1, 6, 7]);
    }
}
