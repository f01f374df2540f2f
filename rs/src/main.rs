//! CLI driver: parses arguments, validates them, loads the road graph
//! and reference document, and runs the decoder façade.

use clap::Parser;
use openlr_decoder::core::errors::{BadInput, DecoderError};
use openlr_decoder::decoder::{decode_all, DecodeOptions};
use openlr_decoder::graph::InMemoryRoadGraph;
use openlr_decoder::parser::parse_segments;
use std::fs;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "openlr-decoder", about = "Map-matches OpenLR-style references onto a road graph")]
struct Cli {
    /// XML-format input with OpenLR-style references.
    #[arg(long)]
    input: String,

    /// Where to write decoded paths.
    #[arg(long, default_value = "output.txt")]
    output: String,

    /// Max segments to decode, `-1` for all.
    #[arg(long, default_value_t = -1)]
    limit: i64,

    /// Drop every 2-point reference before decoding.
    #[arg(long, default_value_t = false)]
    multipoints_only: bool,

    /// Worker thread count, in `[1, 128]`.
    #[arg(long, default_value_t = num_cpus::get())]
    num_threads: usize,

    /// Whitespace-separated road graph text file (see
    /// `InMemoryRoadGraph::load_from_text`).
    #[arg(long)]
    roads: String,

    /// Map-tile/country identifier rendered in the sink's edge tokens.
    #[arg(long, default_value = "XX")]
    country: String,
}

fn validate(cli: &Cli) -> Result<(), BadInput> {
    if cli.limit < -1 {
        return Err(BadInput::LimitOutOfRange(cli.limit));
    }
    if cli.num_threads < 1 || cli.num_threads > 128 {
        return Err(BadInput::NumThreadsOutOfRange(cli.num_threads));
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), DecoderError> {
    let roads_text = fs::read_to_string(&cli.roads)?;
    let graph = InMemoryRoadGraph::load_from_text(&roads_text, cli.country.clone())?;

    let xml = fs::read_to_string(&cli.input)?;
    let segments = parse_segments(&xml)?;

    let options = DecodeOptions {
        output_path: cli.output.clone(),
        limit: cli.limit,
        multipoints_only: cli.multipoints_only,
        num_threads: cli.num_threads,
    };

    decode_all(&graph, segments, &options)?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = validate(&cli) {
        log::error!("{e}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
