//! FastWigQuery - Signal queries over variableStep wiggle tracks
//!
//! Loads a variableStep wiggle track into a per-chromosome index and answers
//! window queries against it.
//!
//! # Features
//!
//! - Streaming ingestion, one line at a time, with gap filling of omitted
//!   zero-valued bins
//! - Area-weighted aggregate ("fpkm") and whole-bin profile queries
//! - Per-gene promoter/body/TTS reports computed in parallel with rayon
//! - Read-depth normalization and track subtraction
//! - Support for compressed tracks (gzip, bzip2)
//!
//! # Example
//!
//! ```
//! use fast_wigquery::ingest;
//!
//! let wig = "variableStep chrom=chr1 span=25\n10001 100.0\n10026 50.0\n";
//! let index = ingest(wig.as_bytes()).unwrap();
//!
//! assert_eq!(index.aggregate("chr1", 10001, 10051).unwrap(), 150.0);
//! assert_eq!(index.profile("1", 10001, 10051).unwrap(), vec![100.0, 50.0]);
//! ```

pub mod core;
pub mod formats;

// Re-export commonly used types
pub use core::{
    ingest, ingest_file, open_reader, Advance, ChromosomeTrack, FormatError, Progress,
    ProgressKind, QueryError, RegionParseError, SignalIndex, WigError, WigReader,
};
pub use formats::{regions, report, transform, wig};
