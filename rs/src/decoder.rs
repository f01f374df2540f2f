//! The decoder façade: filters/trims/sorts the pre-parsed references,
//! fans out to the worker pool, writes the sink, and reports a summary.

use crate::core::errors::Result;
use crate::core::types::{DecodeStats, LinearSegment};
use crate::graph::RoadGraph;
use crate::sink;
use crate::worker;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub output_path: String,
    /// `-1` means "no limit".
    pub limit: i64,
    pub multipoints_only: bool,
    pub num_threads: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeSummary {
    pub stats: DecodeStats,
}

/// Filters, limits, sorts and decodes already-parsed `segments`. Parsing
/// the input document happens upstream, in the CLI driver, via
/// `crate::parser::parse_segments`.
pub fn decode_all(
    graph: &dyn RoadGraph,
    mut segments: Vec<LinearSegment>,
    options: &DecodeOptions,
) -> Result<DecodeSummary> {
    if options.multipoints_only {
        segments.retain(|s| s.location_reference.is_multipoint());
    }

    if options.limit >= 0 {
        let limit = options.limit as usize;
        if limit < segments.len() {
            segments.truncate(limit);
        }
    }

    segments.sort_by_key(|s| s.segment_id);

    let (paths, stats) = worker::decode_all_segments(graph, &segments, options.num_threads);

    let results: Vec<(u32, Vec<crate::core::types::Edge>)> = segments
        .iter()
        .map(|s| s.segment_id)
        .zip(paths)
        .collect();

    let file = File::create(Path::new(&options.output_path))?;
    let mut writer = BufWriter::new(file);
    sink::write_sink(&mut writer, graph, &results)?;

    log::info!(
        "decode summary: total={} routes_failed={} short_routes={} more_than_one_candidates={} zero_candidates={}",
        stats.total,
        stats.routes_failed,
        stats.short_routes,
        stats.more_than_one_candidates,
        stats.zero_candidates,
    );

    Ok(DecodeSummary { stats })
}
