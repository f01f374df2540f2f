use std::io::Error as IoError;
use thiserror::Error;
use xml::reader::Error as XmlError;

/// Fatal errors, surfaced all the way to the CLI driver.
#[derive(Error, Debug)]
pub enum DecoderError {
    #[error("File IO error: {0}")]
    FileIO(#[from] IoError),
    #[error("XML parsing error: {0}")]
    XmlParsing(#[from] XmlError),
    #[error("Invalid reference data: {0}")]
    InvalidReference(String),
}

pub type Result<T> = std::result::Result<T, DecoderError>;

/// Invalid CLI input, rejected before any decode work starts.
#[derive(Error, Debug)]
pub enum BadInput {
    #[error("--limit must be >= -1, got {0}")]
    LimitOutOfRange(i64),
    #[error("--num_threads must be in [1, 128], got {0}")]
    NumThreadsOutOfRange(usize),
}

/// A single segment that could not be decoded. Recoverable: counted in
/// `DecodeStats`, no output line emitted, decoding continues.
#[derive(Error, Debug, Clone)]
#[error("segment {segment_id} could not be decoded: {reason}")]
pub struct SegmentDecodeFailure {
    pub segment_id: u32,
    pub reason: String,
}
