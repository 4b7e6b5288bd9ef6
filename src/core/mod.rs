//! Core wiggle signal functionality
//!
//! This module contains the streaming variableStep reader, the
//! per-chromosome signal index, and the window query algorithms.

mod error;
pub mod io;
mod query;
mod reader;
mod track;

pub use error::{
    FormatError, FormatResult, QueryError, QueryResult, RegionParseError, Result, WigError,
};
pub use io::{
    detect_compression, open_track, CompressionFormat, IoStrategy, LineIterator, SmartReader,
    TrackSource, DEFAULT_BUFFER_SIZE, LARGE_BUFFER_SIZE, MMAP_THRESHOLD,
};
pub use reader::{
    ingest, ingest_file, open_reader, Advance, Progress, ProgressKind, WigReader,
    PROGRESS_INTERVAL,
};
pub use track::{ChromosomeTrack, SignalIndex};

pub(crate) use error::snippet;
