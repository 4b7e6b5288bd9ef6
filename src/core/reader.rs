//! Streaming variableStep ingestion
//!
//! [`WigReader`] consumes a track one line per [`advance`](WigReader::advance)
//! call and builds a [`SignalIndex`]. Positions the track omits because their
//! value was zero are filled in with `0.0` as soon as a later position on the
//! same chromosome is read.
//!
//! A header that repeats the chromosome currently open (typically a shorter
//! span covering the last few bases of a chromosome) cannot be represented
//! with a single bin width, so everything up to the next header with a
//! different chromosome is discarded.
//!
//! Blank lines, `#` comments, `track` and `browser` lines are only tolerated
//! while lines are being discarded, i.e. before the first header or after a
//! sub-span header. Anywhere else they are format errors.

use crate::core::error::{snippet, FormatError, Result, WigError};
use crate::core::io::{open_track, LineIterator, SmartReader};
use crate::core::track::SignalIndex;
use crate::formats::wig::{classify, DataLine, LineKind, WigDeclaration};
use log::{debug, info};
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

/// Lines between two percentage progress reports
pub const PROGRESS_INTERVAL: usize = 1000;

/// Outcome of consuming one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// A new chromosome was opened
    Header(String),
    /// A value was recorded
    Data,
    /// The line was skipped and kept for diagnostics
    Discarded,
    /// The stream is exhausted and the last chromosome closed
    EndOfInput,
}

/// What [`WigReader::read_with_progress`] reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    /// Every newly opened chromosome
    Chromosome,
    /// Share of the input consumed, every [`PROGRESS_INTERVAL`] lines
    Percent,
}

impl FromStr for ProgressKind {
    type Err = WigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "chr" => Ok(ProgressKind::Chromosome),
            "number" | "percent" | "percentage" => Ok(ProgressKind::Percent),
            other => Err(WigError::InvalidArgument(format!(
                "not a valid measure for progress: {}",
                other
            ))),
        }
    }
}

/// A progress observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress<'a> {
    Chromosome(&'a str),
    Percent(f64),
    /// Lines consumed, reported instead of a percentage when the input size
    /// is unknown (compressed input)
    Lines(usize),
}

#[derive(Debug, Default)]
struct ParserState {
    chrom: Option<String>,
    step: u64,
    /// Last recorded position of the open chromosome
    cursor: Option<u64>,
    discard: bool,
    discarded: Vec<String>,
    line: usize,
}

/// Incremental variableStep reader
pub struct WigReader<R: BufRead> {
    lines: LineIterator<R>,
    state: ParserState,
    index: SignalIndex,
    total_bytes: Option<u64>,
    finished: bool,
}

impl<R: BufRead> WigReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineIterator::new(reader),
            state: ParserState {
                // Anything before the first header is discarded.
                discard: true,
                ..ParserState::default()
            },
            index: SignalIndex::new(),
            total_bytes: None,
            finished: false,
        }
    }

    /// Set the input size used for percentage progress
    pub fn with_total_bytes(mut self, total_bytes: Option<u64>) -> Self {
        self.total_bytes = total_bytes;
        self
    }

    /// Consume the next line
    pub fn advance(&mut self) -> Result<Advance> {
        if self.finished {
            return Ok(Advance::EndOfInput);
        }

        let line = match self.lines.next_line() {
            None => {
                self.close_current();
                self.finished = true;
                return Ok(Advance::EndOfInput);
            }
            Some(line) => line?.to_string(),
        };
        self.state.line += 1;

        match classify(&line) {
            LineKind::Declaration => self.header(line),
            LineKind::Ignorable | LineKind::Data if self.state.discard => Ok(self.discard(line)),
            LineKind::Ignorable => Err(FormatError::InvalidDataLine {
                line: self.state.line,
                content: snippet(&line),
            }
            .into()),
            LineKind::Data => {
                let data = DataLine::parse(&line, self.state.line)?;
                self.record(data, &line)?;
                Ok(Advance::Data)
            }
        }
    }

    /// Drive ingestion to the end of input
    pub fn read(&mut self) -> Result<()> {
        while self.advance()? != Advance::EndOfInput {}
        Ok(())
    }

    /// Drive ingestion to the end of input, reporting progress to `observer`
    pub fn read_with_progress<F>(&mut self, kind: ProgressKind, mut observer: F) -> Result<()>
    where
        F: FnMut(Progress<'_>),
    {
        loop {
            let step = self.advance()?;
            match (kind, &step) {
                (_, Advance::EndOfInput) => return Ok(()),
                (ProgressKind::Chromosome, Advance::Header(chrom)) => {
                    observer(Progress::Chromosome(chrom))
                }
                (ProgressKind::Percent, _) if self.state.line % PROGRESS_INTERVAL == 0 => {
                    match self.total_bytes {
                        Some(total) if total > 0 => observer(Progress::Percent(
                            self.lines.bytes_read() as f64 / total as f64 * 100.0,
                        )),
                        _ => observer(Progress::Lines(self.state.line)),
                    }
                }
                _ => {}
            }
        }
    }

    /// Drive ingestion to the end of input and return the index
    pub fn finish(mut self) -> Result<SignalIndex> {
        self.read()?;
        Ok(self.index)
    }

    /// Index built so far
    ///
    /// While ingestion is running, the chromosome currently open is not yet
    /// queryable.
    pub fn index(&self) -> &SignalIndex {
        &self.index
    }

    /// Stop early and keep the partial index
    pub fn into_index(self) -> SignalIndex {
        self.index
    }

    /// Lines skipped so far
    pub fn discarded_lines(&self) -> &[String] {
        &self.state.discarded
    }

    /// Number of lines consumed so far
    pub fn line_number(&self) -> usize {
        self.state.line
    }

    /// Chromosome currently open, if any
    pub fn current_chrom(&self) -> Option<&str> {
        self.state.chrom.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn discard(&mut self, line: String) -> Advance {
        self.state.discarded.push(line);
        Advance::Discarded
    }

    fn header(&mut self, line: String) -> Result<Advance> {
        let decl = WigDeclaration::parse(&line, self.state.line)?;

        if self.state.chrom.as_deref() == Some(decl.chrom.as_str()) {
            info!(
                "Sub-span header for {} at line {}, discarding until next chromosome",
                decl.chrom, self.state.line
            );
            self.state.discard = true;
            return Ok(self.discard(line));
        }

        if self.index.contains_exact(&decl.chrom) {
            return Err(FormatError::DuplicateChromosome {
                line: self.state.line,
                chrom: decl.chrom,
            }
            .into());
        }

        self.close_current();

        debug!("Opening {} (span {}) at line {}", decl.chrom, decl.span, self.state.line);
        self.index.open(&decl.chrom, decl.span);
        self.state.chrom = Some(decl.chrom.clone());
        self.state.step = decl.span;
        self.state.cursor = None;
        self.state.discard = false;

        Ok(Advance::Header(decl.chrom))
    }

    fn record(&mut self, data: DataLine, line: &str) -> Result<()> {
        let state = &mut self.state;
        let no_chromosome = || FormatError::InvalidDataLine {
            line: state.line,
            content: snippet(line),
        };
        let Some(chrom) = state.chrom.as_deref() else {
            return Err(no_chromosome().into());
        };
        let Some(track) = self.index.track_mut(chrom) else {
            return Err(no_chromosome().into());
        };

        let step = state.step;
        // The bin must end inside the coordinate space, so termination + 1
        // and the next expected position are representable.
        if data.position.checked_add(step).is_none() {
            return Err(FormatError::PositionOverflow {
                line: state.line,
                chrom: chrom.to_string(),
                position: data.position,
                step,
            }
            .into());
        }

        match state.cursor {
            None => {
                track.set_begin(data.position);
            }
            Some(last) => {
                let expected = last + step;
                if data.position < expected {
                    return Err(FormatError::OutOfOrderPosition {
                        line: state.line,
                        chrom: chrom.to_string(),
                        position: data.position,
                        expected,
                    }
                    .into());
                }
                if (data.position - expected) % step != 0 {
                    return Err(FormatError::MisalignedPosition {
                        line: state.line,
                        chrom: chrom.to_string(),
                        position: data.position,
                        begin: track.begin().unwrap_or(expected),
                        step,
                    }
                    .into());
                }

                // Zero-valued positions are omitted by the producer.
                let mut cursor = expected;
                while cursor < data.position {
                    track.push(0.0);
                    cursor += step;
                }
            }
        }

        track.push(data.value);
        state.cursor = Some(data.position);
        Ok(())
    }

    fn close_current(&mut self) {
        let Some(chrom) = self.state.chrom.as_deref() else {
            return;
        };
        if let Some(track) = self.index.track_mut(chrom) {
            track.close();
            debug!(
                "Closed {}: {} bins, termination {:?}, {} lines discarded so far",
                chrom,
                track.len(),
                track.termination(),
                self.state.discarded.len()
            );
        }
    }
}

/// Ingest a whole track from a buffered reader
pub fn ingest<R: BufRead>(reader: R) -> Result<SignalIndex> {
    WigReader::new(reader).finish()
}

/// Ingest a track file (plain, gzip or bzip2)
pub fn ingest_file<P: AsRef<Path>>(path: P) -> Result<SignalIndex> {
    open_reader(path)?.finish()
}

/// Open a track file for incremental ingestion
pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<WigReader<SmartReader>> {
    let source = open_track(path.as_ref())?;
    Ok(WigReader::new(source.reader).with_total_bytes(source.total_bytes))
}
