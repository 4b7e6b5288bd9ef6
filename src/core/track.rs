//! Per-chromosome signal index
//!
//! Each chromosome of a variableStep track is stored as a contiguous vector
//! of bin values. Bin `i` covers `[begin + i * step, begin + (i + 1) * step)`.
//! The ingestion engine fills every skipped bin with `0.0`, so the vector
//! has no holes between `begin` and the last recorded position.
//!
//! The index is built once by [`WigReader`](crate::core::WigReader) and is
//! immutable afterwards. It is `Send + Sync` and may be shared between
//! threads (e.g. behind an `Arc`) for concurrent queries.

use crate::core::error::{QueryError, QueryResult};
use std::collections::HashMap;

/// Signal values of one chromosome
#[derive(Debug, Clone, PartialEq)]
pub struct ChromosomeTrack {
    step: u64,
    begin: Option<u64>,
    termination: Option<u64>,
    closed: bool,
    values: Vec<f64>,
}

impl ChromosomeTrack {
    pub(crate) fn new(step: u64) -> Self {
        Self {
            step,
            begin: None,
            termination: None,
            closed: false,
            values: Vec::new(),
        }
    }

    /// Bin width of this chromosome
    pub fn step(&self) -> u64 {
        self.step
    }

    /// First recorded position, `None` if the chromosome has no data lines
    pub fn begin(&self) -> Option<u64> {
        self.begin
    }

    /// Last recorded position plus `step - 1`
    ///
    /// Only set once the chromosome is closed. Stays `None` for a closed
    /// chromosome without data.
    pub fn termination(&self) -> Option<u64> {
        self.termination
    }

    /// Position of the last recorded bin
    pub fn last_position(&self) -> Option<u64> {
        let begin = self.begin?;
        let last_idx = self.values.len().checked_sub(1)? as u64;
        Some(begin + last_idx * self.step)
    }

    /// Whether a later header or end of input closed this chromosome
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of bins, including gap-filled zero bins
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the bin keyed exactly at `position`
    pub fn get(&self, position: u64) -> Option<f64> {
        self.bin_index(position).map(|idx| self.values[idx])
    }

    /// Whether `position` is a recorded bin key
    pub fn contains_position(&self, position: u64) -> bool {
        self.bin_index(position).is_some()
    }

    /// Iterate `(position, value)` pairs in ascending order
    pub fn positions(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        let begin = self.begin.unwrap_or(0);
        let step = self.step;
        self.values
            .iter()
            .enumerate()
            .map(move |(i, v)| (begin + i as u64 * step, *v))
    }

    /// Raw bin values in ascending position order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn bin_index(&self, position: u64) -> Option<usize> {
        let begin = self.begin?;
        let offset = position.checked_sub(begin)?;
        if offset % self.step != 0 {
            return None;
        }
        let idx = (offset / self.step) as usize;
        (idx < self.values.len()).then_some(idx)
    }

    /// Value of the bin at a key known to be recorded
    pub(crate) fn value_at(&self, key: u64) -> f64 {
        let begin = self.begin.unwrap_or(key);
        self.values[((key - begin) / self.step) as usize]
    }

    pub(crate) fn set_begin(&mut self, position: u64) {
        debug_assert!(self.begin.is_none());
        self.begin = Some(position);
    }

    pub(crate) fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Close the chromosome, fixing its termination
    pub(crate) fn close(&mut self) {
        self.termination = self.last_position().map(|last| last + (self.step - 1));
        self.closed = true;
    }
}

/// Chromosome name -> [`ChromosomeTrack`]
///
/// Chromosome names are remembered in the order they first appeared in
/// the input.
#[derive(Debug, Clone, Default)]
pub struct SignalIndex {
    tracks: HashMap<String, ChromosomeTrack>,
    order: Vec<String>,
}

impl SignalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a chromosome by exact name, falling back to `chr{name}`
    ///
    /// Returns the canonical name used in the index together with its track.
    pub fn resolve(&self, chrom: &str) -> QueryResult<(&str, &ChromosomeTrack)> {
        if let Some((name, track)) = self.tracks.get_key_value(chrom) {
            return Ok((name.as_str(), track));
        }
        let prefixed = format!("chr{}", chrom);
        self.tracks
            .get_key_value(&prefixed)
            .map(|(name, track)| (name.as_str(), track))
            .ok_or_else(|| QueryError::UnknownChromosome(chrom.to_string()))
    }

    /// Get a chromosome track, with the same `chr` fallback as [`resolve`](Self::resolve)
    pub fn chromosome(&self, chrom: &str) -> Option<&ChromosomeTrack> {
        self.resolve(chrom).ok().map(|(_, track)| track)
    }

    /// Check if a chromosome exists in the index
    pub fn has_chrom(&self, chrom: &str) -> bool {
        self.resolve(chrom).is_ok()
    }

    /// Chromosome names in input order
    pub fn chroms(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// `(name, track)` pairs in input order
    pub fn tracks(&self) -> impl Iterator<Item = (&str, &ChromosomeTrack)> {
        self.order
            .iter()
            .filter_map(move |name| self.tracks.get(name).map(|t| (name.as_str(), t)))
    }

    /// Number of chromosomes
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Number of bins on a chromosome
    pub fn bin_count(&self, chrom: &str) -> usize {
        self.chromosome(chrom).map(|t| t.len()).unwrap_or(0)
    }

    /// Total number of bins across all chromosomes
    pub fn total_bins(&self) -> usize {
        self.tracks.values().map(|t| t.len()).sum()
    }

    /// Register a new chromosome; the caller guarantees the name is new
    pub(crate) fn open(&mut self, chrom: &str, step: u64) {
        self.order.push(chrom.to_string());
        self.tracks.insert(chrom.to_string(), ChromosomeTrack::new(step));
    }

    pub(crate) fn contains_exact(&self, chrom: &str) -> bool {
        self.tracks.contains_key(chrom)
    }

    pub(crate) fn track_mut(&mut self, chrom: &str) -> Option<&mut ChromosomeTrack> {
        self.tracks.get_mut(chrom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_index() -> SignalIndex {
        let mut index = SignalIndex::new();
        index.open("chr1", 25);
        let track = index.track_mut("chr1").unwrap();
        track.set_begin(10001);
        for v in [10.0, 0.0, 30.0] {
            track.push(v);
        }
        track.close();

        index.open("chrM", 10);
        index.track_mut("chrM").unwrap().close();
        index
    }

    #[test]
    fn test_track_metadata() {
        let index = create_test_index();
        let track = index.chromosome("chr1").unwrap();

        assert_eq!(track.step(), 25);
        assert_eq!(track.begin(), Some(10001));
        assert_eq!(track.last_position(), Some(10051));
        assert_eq!(track.termination(), Some(10075));
        assert!(track.is_closed());
        assert_eq!(track.len(), 3);
    }

    #[test]
    fn test_track_lookup() {
        let index = create_test_index();
        let track = index.chromosome("chr1").unwrap();

        assert_eq!(track.get(10001), Some(10.0));
        assert_eq!(track.get(10026), Some(0.0));
        assert_eq!(track.get(10051), Some(30.0));
        assert_eq!(track.get(10002), None);
        assert_eq!(track.get(10076), None);
        assert_eq!(track.get(1), None);
        assert!(track.contains_position(10026));
        assert!(!track.contains_position(10027));
    }

    #[test]
    fn test_positions_iter() {
        let index = create_test_index();
        let pairs: Vec<_> = index.chromosome("chr1").unwrap().positions().collect();
        assert_eq!(pairs, vec![(10001, 10.0), (10026, 0.0), (10051, 30.0)]);
    }

    #[test]
    fn test_empty_chromosome() {
        let index = create_test_index();
        let track = index.chromosome("chrM").unwrap();

        assert!(track.is_closed());
        assert!(track.is_empty());
        assert_eq!(track.begin(), None);
        assert_eq!(track.termination(), None);
    }

    #[test]
    fn test_chrom_resolution() {
        let index = create_test_index();

        assert!(index.has_chrom("chr1"));
        assert!(index.has_chrom("1"));
        assert!(index.has_chrom("M"));
        assert!(!index.has_chrom("chr2"));
        assert_eq!(index.resolve("1").unwrap().0, "chr1");
        assert_eq!(
            index.resolve("2").unwrap_err(),
            QueryError::UnknownChromosome("2".to_string())
        );
    }

    #[test]
    fn test_chrom_order_and_counts() {
        let index = create_test_index();

        let chroms: Vec<&str> = index.chroms().collect();
        assert_eq!(chroms, vec!["chr1", "chrM"]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.bin_count("chr1"), 3);
        assert_eq!(index.bin_count("chr9"), 0);
        assert_eq!(index.total_bins(), 3);
    }

    #[test]
    fn test_index_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SignalIndex>();
    }
}
