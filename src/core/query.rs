//! Window queries over a [`SignalIndex`]
//!
//! All ranges are half-open: `start` is included, `end` is excluded, so
//! `1..10` covers positions 1 through 9.
//!
//! # Aggregate
//!
//! The aggregate ("fpkm") is the area under the step function, measured in
//! bins: a bin fully inside the range contributes its value, a bin only
//! partly inside contributes the covered fraction of it.
//!
//! ```text
//! variableStep chrom=chr1 span=25
//! 10001 100.0
//! 10026 50.0     <- start 10034: 17/25 of the bin is used
//! 10051 100.0
//! ...
//! 123526 100.0   <- end 123535: 9/25 of the bin is used
//! ```
//!
//! # Profile
//!
//! The profile is the list of whole-bin values from the bin containing
//! `start` to the bin containing `end - 1`.

use crate::core::error::{QueryError, QueryResult};
use crate::core::track::{ChromosomeTrack, SignalIndex};

/// A range validated against one chromosome
#[derive(Debug, Clone, Copy)]
struct Window<'a> {
    chrom: &'a str,
    track: &'a ChromosomeTrack,
    start: u64,
    /// Exclusive end, clamped to `termination + 1`
    end: u64,
}

impl<'a> Window<'a> {
    /// Snap a coordinate down to the key of the bin that contains it
    ///
    /// Bins are contiguous from `begin` to the last recorded position, so the
    /// containing bin is found arithmetically; positions past the last bin
    /// snap to the last bin.
    fn align(&self, position: u64) -> QueryResult<u64> {
        let step = self.track.step();
        let (begin, last) = match (self.track.begin(), self.track.last_position()) {
            (Some(begin), Some(last)) => (begin, last),
            _ => {
                return Err(QueryError::OutOfRange {
                    chrom: self.chrom.to_string(),
                    start: self.start,
                })
            }
        };
        if position < begin {
            return Err(QueryError::AlignmentError {
                chrom: self.chrom.to_string(),
                position,
                begin,
            });
        }
        let key = begin + (position - begin) / step * step;
        Ok(key.min(last))
    }

    fn value(&self, key: u64) -> f64 {
        self.track.value_at(key)
    }
}

impl SignalIndex {
    /// Validate a range and clamp its end to the recorded data
    fn window<'a>(&'a self, chrom: &str, start: u64, end: u64) -> QueryResult<Window<'a>> {
        let (name, track) = self.resolve(chrom)?;

        if end <= start {
            return Err(QueryError::InvalidRange { start, end });
        }
        if !track.is_closed() {
            return Err(QueryError::ChromosomeOpen(name.to_string()));
        }
        let termination = track.termination().ok_or_else(|| QueryError::OutOfRange {
            chrom: name.to_string(),
            start,
        })?;
        if start > termination - (track.step() - 1) {
            return Err(QueryError::OutOfRange {
                chrom: name.to_string(),
                start,
            });
        }
        // A range may run past the last recorded base; it is truncated.
        let end = if end > termination { termination + 1 } else { end };

        Ok(Window {
            chrom: name,
            track,
            start,
            end,
        })
    }

    /// Area-weighted sum of bin values over `[start, end)`
    ///
    /// # Example
    /// ```
    /// use fast_wigquery::ingest;
    ///
    /// let wig = "variableStep chrom=chr1 span=25\n10001 10\n10026 20\n";
    /// let index = ingest(wig.as_bytes()).unwrap();
    ///
    /// assert_eq!(index.aggregate("chr1", 10001, 10051).unwrap(), 30.0);
    /// assert_eq!(index.aggregate("1", 10011, 10016).unwrap(), 2.0);
    /// ```
    pub fn aggregate(&self, chrom: &str, start: u64, end: u64) -> QueryResult<f64> {
        let window = self.window(chrom, start, end)?;
        let (start, end) = (window.start, window.end);
        let step = window.track.step();
        let width = step as f64;

        let aligned_start = window.align(start)?;
        let aligned_end = window.align(end - 1)?;

        if aligned_start == aligned_end {
            return Ok(window.value(aligned_start) * (end - start) as f64 / width);
        }

        let first_fraction = ((aligned_start + step) - start) as f64 / width;
        let last_fraction = (end - aligned_end) as f64 / width;

        let mut total = window.value(aligned_start) * first_fraction;
        let mut key = aligned_start + step;
        while key < aligned_end {
            total += window.value(key);
            key += step;
        }
        total += window.value(aligned_end) * last_fraction;

        Ok(total)
    }

    /// Whole-bin values from the bin containing `start` to the bin
    /// containing `end - 1`
    pub fn profile(&self, chrom: &str, start: u64, end: u64) -> QueryResult<Vec<f64>> {
        let window = self.window(chrom, start, end)?;
        let step = window.track.step();

        let aligned_start = window.align(window.start)?;
        let aligned_end = window.align(window.end - 1)?;
        if aligned_end < aligned_start {
            return Err(QueryError::InvalidRange {
                start: aligned_start,
                end: aligned_end,
            });
        }

        let bins = ((aligned_end - aligned_start) / step + 1) as usize;
        let mut values = Vec::with_capacity(bins);
        let mut key = aligned_start;
        while key <= aligned_end {
            values.push(window.value(key));
            key += step;
        }
        Ok(values)
    }

    /// Highest bin value of the profile over `[start, end)`
    pub fn peak(&self, chrom: &str, start: u64, end: u64) -> QueryResult<f64> {
        let values = self.profile(chrom, start, end)?;
        Ok(values.into_iter().fold(f64::NEG_INFINITY, f64::max))
    }

    /// Key of the bin containing `position` after the same validation as
    /// [`aggregate`](Self::aggregate) applies to `[position, position + 1)`
    pub fn align(&self, chrom: &str, position: u64) -> QueryResult<u64> {
        let window = self.window(chrom, position, position.saturating_add(1))?;
        window.align(window.start)
    }
}
