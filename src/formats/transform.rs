//! Whole-track transforms
//!
//! - read-depth normalization: every value rescaled to reads per million
//!   aligned reads
//! - subtraction of one track from another (e.g. ChIP minus input)
//!
//! Values written by both transforms are rounded to 5 decimals.

use crate::core::{ChromosomeTrack, LineIterator, SignalIndex, WigError};
use crate::formats::wig::{classify, DataLine, LineKind, WigDeclaration};
use log::{debug, info};
use std::collections::HashSet;
use std::io::{BufRead, BufReader, Write};
use std::iter::Peekable;
use std::path::Path;

const ALIGNED_READS_MARKER: &str = "# reads with at least one reported alignment: ";

/// Round to 5 decimals, half away from zero
pub fn round5(value: f64) -> f64 {
    let rounded = (value * 100_000.0).round() / 100_000.0;
    // -0.0 would be written as "-0"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Find the aligned read count in an aligner log
///
/// Looks for `# reads with at least one reported alignment: N (...)`.
pub fn aligned_read_count<R: BufRead>(reader: R) -> std::io::Result<Option<u64>> {
    for line in reader.lines() {
        let line = line?;
        let Some(pos) = line.find(ALIGNED_READS_MARKER) else {
            continue;
        };
        let rest = &line[pos + ALIGNED_READS_MARKER.len()..];
        let Some((count, tail)) = rest.split_once(char::is_whitespace) else {
            continue;
        };
        if !tail.trim_start().starts_with('(') {
            continue;
        }
        if let Ok(count) = count.parse() {
            return Ok(Some(count));
        }
    }
    Ok(None)
}

/// Find the aligned read count in an aligner log file
pub fn aligned_read_count_file<P: AsRef<Path>>(path: P) -> Result<Option<u64>, WigError> {
    let file = std::fs::File::open(path.as_ref())?;
    Ok(aligned_read_count(BufReader::new(file))?)
}

/// Reads-per-million value of `value` for a library of `reads` aligned reads
pub fn reads_per_million(value: f64, reads: u64) -> f64 {
    round5(value / (reads as f64 / 1_000_000.0))
}

/// Statistics from a transform run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub chromosomes: usize,
    pub values_written: usize,
    /// Input lines that were dropped (comments, blank lines, differences
    /// that are not positive)
    pub skipped: usize,
}

/// Rewrite a track with every value in reads per million
///
/// Declarations are copied, comment, `track` and blank lines are dropped and
/// any other line must be a valid data line.
pub fn normalize_track<R: BufRead, W: Write>(
    input: R,
    mut output: W,
    reads: u64,
) -> Result<TransformStats, WigError> {
    if reads == 0 {
        return Err(WigError::InvalidArgument(
            "aligned read count must be positive".to_string(),
        ));
    }

    let mut stats = TransformStats::default();
    let mut lines = LineIterator::new(input);
    let mut line_number = 0;

    while let Some(line) = lines.next_line() {
        let line = line?;
        line_number += 1;

        match classify(line) {
            LineKind::Declaration => {
                let decl = WigDeclaration::parse(line, line_number)?;
                info!("Normalizing {}", decl.chrom);
                writeln!(output, "{}", line.trim_end())?;
                stats.chromosomes += 1;
            }
            LineKind::Ignorable => stats.skipped += 1,
            LineKind::Data => {
                let data = DataLine::parse(line, line_number)?;
                writeln!(output, "{}\t{}", data.position, reads_per_million(data.value, reads))?;
                stats.values_written += 1;
            }
        }
    }

    output.flush()?;
    Ok(stats)
}

/// Normalize a track file into another file
pub fn normalize_track_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    reads: u64,
) -> Result<TransformStats, WigError> {
    let source = crate::core::open_track(input.as_ref())?;
    let out = std::io::BufWriter::new(std::fs::File::create(output.as_ref())?);
    normalize_track(source.reader, out, reads)
}

/// Check that two tracks of one chromosome share a bin grid
fn check_grid(chrom: &str, left: &ChromosomeTrack, right: &ChromosomeTrack) -> Result<(), WigError> {
    if left.step() != right.step() {
        return Err(WigError::StepMismatch {
            chrom: chrom.to_string(),
            left: left.step(),
            right: right.step(),
        });
    }
    if let (Some(a), Some(b)) = (left.begin(), right.begin()) {
        if a.abs_diff(b) % left.step() != 0 {
            return Err(WigError::GridMismatch {
                chrom: chrom.to_string(),
                left: a,
                right: b,
                step: left.step(),
            });
        }
    }
    Ok(())
}

/// Merge two ascending `(position, value)` streams, pairing equal positions
/// and treating a missing side as zero
struct MergedBins<A: Iterator<Item = (u64, f64)>, B: Iterator<Item = (u64, f64)>> {
    left: Peekable<A>,
    right: Peekable<B>,
}

impl<A, B> Iterator for MergedBins<A, B>
where
    A: Iterator<Item = (u64, f64)>,
    B: Iterator<Item = (u64, f64)>,
{
    type Item = (u64, f64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        match (self.left.peek().copied(), self.right.peek().copied()) {
            (Some((lp, lv)), Some((rp, rv))) => {
                if lp == rp {
                    self.left.next();
                    self.right.next();
                    Some((lp, lv, rv))
                } else if lp < rp {
                    self.left.next();
                    Some((lp, lv, 0.0))
                } else {
                    self.right.next();
                    Some((rp, 0.0, rv))
                }
            }
            (Some((lp, lv)), None) => {
                self.left.next();
                Some((lp, lv, 0.0))
            }
            (None, Some((rp, rv))) => {
                self.right.next();
                Some((rp, 0.0, rv))
            }
            (None, None) => None,
        }
    }
}

fn write_difference<W: Write>(
    output: &mut W,
    chrom: &str,
    minuend: Option<&ChromosomeTrack>,
    subtrahend: Option<&ChromosomeTrack>,
    negatives: bool,
    stats: &mut TransformStats,
) -> Result<(), WigError> {
    let step = match (minuend, subtrahend) {
        (Some(m), Some(s)) => {
            check_grid(chrom, m, s)?;
            m.step()
        }
        (Some(t), None) | (None, Some(t)) => t.step(),
        (None, None) => return Ok(()),
    };

    writeln!(output, "{}", WigDeclaration { chrom: chrom.to_string(), span: step }.to_line())?;
    stats.chromosomes += 1;

    let merged = MergedBins {
        left: minuend.into_iter().flat_map(|t| t.positions()).peekable(),
        right: subtrahend.into_iter().flat_map(|t| t.positions()).peekable(),
    };

    for (position, a, b) in merged {
        // Gap-filled bins on both sides stay omitted.
        if a == 0.0 && b == 0.0 {
            continue;
        }
        let difference = round5(a - b);
        if difference <= 0.0 && !negatives {
            stats.skipped += 1;
            continue;
        }
        writeln!(output, "{}\t{}", position, difference)?;
        stats.values_written += 1;
    }

    Ok(())
}

/// Write `minuend - subtrahend` as a variableStep track
///
/// Chromosomes are written in the minuend's order, followed by chromosomes
/// only the subtrahend has. A position present in just one track counts as
/// zero in the other. Without `negatives` only positive differences are
/// written.
pub fn subtract_tracks<W: Write>(
    minuend: &SignalIndex,
    subtrahend: &SignalIndex,
    mut output: W,
    negatives: bool,
) -> Result<TransformStats, WigError> {
    let mut stats = TransformStats::default();
    let mut paired = HashSet::new();

    for (chrom, track) in minuend.tracks() {
        debug!("Subtracting {}", chrom);
        let other = match subtrahend.resolve(chrom) {
            Ok((name, other)) => {
                paired.insert(name);
                Some(other)
            }
            Err(_) => None,
        };
        write_difference(&mut output, chrom, Some(track), other, negatives, &mut stats)?;
    }

    for (chrom, track) in subtrahend.tracks() {
        if paired.contains(chrom) || minuend.has_chrom(chrom) {
            continue;
        }
        debug!("{} only in subtrahend", chrom);
        write_difference(&mut output, chrom, None, Some(track), negatives, &mut stats)?;
    }

    output.flush()?;
    Ok(stats)
}
