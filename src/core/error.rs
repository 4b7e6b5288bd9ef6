//! Error types for fast-wigquery
//!
//! Defines all error types used throughout the library.

use thiserror::Error;

/// Main error type for fast-wigquery operations
#[derive(Debug, Error)]
pub enum WigError {
    /// Wiggle parsing errors (fatal for ingestion)
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Window query errors
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Region table parsing errors
    #[error("Region error: {0}")]
    Region(#[from] RegionParseError),

    /// Two tracks cannot be combined because their bin widths differ
    #[error("Step mismatch on {chrom}: {left} vs {right}")]
    StepMismatch { chrom: String, left: u64, right: u64 },

    /// Two tracks share a bin width but their bins are offset
    #[error("Bins of {chrom} do not line up: first positions {left} and {right} with step {step}")]
    GridMismatch {
        chrom: String,
        left: u64,
        right: u64,
        step: u64,
    },

    /// Caller supplied an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while ingesting a variableStep wiggle track
///
/// Every variant carries the 1-based line number and a truncated copy of the
/// offending line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    /// Header line without a `span=` value
    #[error("No span value given for chromosome {chrom} at line {line}: {content}")]
    MissingSpan { line: usize, chrom: String, content: String },

    /// Header line without a `chrom=` value
    #[error("No chrom value given at line {line}: {content}")]
    MissingChrom { line: usize, content: String },

    /// Header line with an unusable key/value
    #[error("Invalid header at line {line}: {message}")]
    InvalidHeader { line: usize, message: String },

    /// fixedStep and other declarations are not supported
    #[error("Unsupported track format at line {line}: {content}")]
    UnsupportedFormat { line: usize, content: String },

    /// Data line that is not `<integer> <decimal>`
    #[error("Wrong data format at line {line}: \"{content}\"")]
    InvalidDataLine { line: usize, content: String },

    /// Data position behind the expected next bin
    #[error("Position {position} at line {line} is behind expected position {expected} on {chrom}")]
    OutOfOrderPosition {
        line: usize,
        chrom: String,
        position: u64,
        expected: u64,
    },

    /// Data position not on the `begin + k * step` grid
    #[error("Position {position} at line {line} is not aligned to step {step} from {begin} on {chrom}")]
    MisalignedPosition {
        line: usize,
        chrom: String,
        position: u64,
        begin: u64,
        step: u64,
    },

    /// Position whose bin would extend past the largest coordinate
    #[error("Position {position} at line {line} on {chrom} is too large for step {step}")]
    PositionOverflow {
        line: usize,
        chrom: String,
        position: u64,
        step: u64,
    },

    /// A chromosome reappears after another chromosome was opened
    #[error("Chromosome {chrom} declared again at line {line} after being closed")]
    DuplicateChromosome { line: usize, chrom: String },
}

impl FormatError {
    /// Line number (1-based) where the error occurred
    pub fn line(&self) -> usize {
        match self {
            FormatError::MissingSpan { line, .. }
            | FormatError::MissingChrom { line, .. }
            | FormatError::InvalidHeader { line, .. }
            | FormatError::UnsupportedFormat { line, .. }
            | FormatError::InvalidDataLine { line, .. }
            | FormatError::OutOfOrderPosition { line, .. }
            | FormatError::MisalignedPosition { line, .. }
            | FormatError::PositionOverflow { line, .. }
            | FormatError::DuplicateChromosome { line, .. } => *line,
        }
    }
}

/// Errors returned by aggregate/profile queries
///
/// Query errors are per call and never touch the index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Neither `chrom` nor `chr{chrom}` is in the index
    #[error("Chromosome {0} and chr{0} not known")]
    UnknownChromosome(String),

    /// `end <= start`, or the aligned end precedes the aligned start
    #[error("Invalid coordinate range: start ({start}) must be < end ({end})")]
    InvalidRange { start: u64, end: u64 },

    /// Start lies past the last recorded bin
    #[error("Start {start} is downstream of the recorded data on {chrom}")]
    OutOfRange { chrom: String, start: u64 },

    /// Coordinate lies before the first recorded bin
    #[error("Coordinate {position} is below the first recorded position {begin} on {chrom}")]
    AlignmentError {
        chrom: String,
        position: u64,
        begin: u64,
    },

    /// Chromosome is still being ingested; its termination is unknown
    #[error("Chromosome {0} is still open")]
    ChromosomeOpen(String),
}

/// Errors that can occur while reading region tables
#[derive(Debug, Error)]
pub enum RegionParseError {
    /// Not enough tab-separated fields
    #[error("Too few fields at line {line}: expected {expected}, found {found}")]
    TooFewFields {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// Coordinate column is not an integer
    #[error("Invalid {field} '{value}' at line {line}")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for fast-wigquery operations
pub type Result<T> = std::result::Result<T, WigError>;

/// Result type alias for ingestion
pub type FormatResult<T> = std::result::Result<T, FormatError>;

/// Result type alias for window queries
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Truncate a raw line for inclusion in an error
pub(crate) fn snippet(line: &str) -> String {
    line.chars().take(100).collect()
}
