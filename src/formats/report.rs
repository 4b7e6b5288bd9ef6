//! Per-gene signal reports
//!
//! Every gene is split into a promoter (TSS), a gene body and a termination
//! site (TTS) following its strand:
//!
//! ```text
//!  + strand      st                                  en
//!  gene     -----=====================================-----
//!  TSS       ----=                                          [st - tss_out, st + tss_in)
//!  body           ===================================       [st + tss_in, en - tts_in)
//!  TTS                                               =----  [en - tts_in, en + tts_out)
//! ```
//!
//! On the minus strand the layout is mirrored around the gene.
//!
//! Queries for one gene never affect another: a gene whose coordinates
//! cannot be queried is reported with zeros and logged at `warn`. The index
//! is read-only, so genes are processed in parallel.

use crate::core::{QueryError, QueryResult, SignalIndex, WigError};
use crate::formats::regions::{ExonGroup, GeneRecord, Strand};
use log::warn;
use rayon::prelude::*;
use std::io::{self, Write};
use std::ops::Range;

/// Sub-region sizes and bin counts for the per-gene reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileConfig {
    /// How far the promoter reaches upstream of the gene
    pub tss_outside: u64,
    /// How far the promoter reaches into the gene body
    pub tss_inside: u64,
    /// How far the termination site extends past the gene
    pub tts_outside: u64,
    /// How far the termination site reaches into the gene body
    pub tts_inside: u64,
    pub tss_bins: usize,
    pub body_bins: usize,
    pub tts_bins: usize,
    /// Worker threads; 0 lets rayon decide
    pub threads: usize,
}

impl ProfileConfig {
    /// Promoter, body and TTS binned together (20/40/20 bins)
    pub fn gene_profile() -> Self {
        Self {
            tss_outside: 1000,
            tss_inside: 1000,
            tts_outside: 1000,
            tts_inside: 1000,
            tss_bins: 20,
            body_bins: 40,
            tts_bins: 20,
            threads: 0,
        }
    }

    /// ±3 kb around the TSS in 80 bins
    pub fn tss_profile() -> Self {
        Self {
            tss_outside: 3000,
            tss_inside: 3000,
            tts_outside: 0,
            tts_inside: 0,
            tss_bins: 80,
            body_bins: 0,
            tts_bins: 0,
            threads: 0,
        }
    }

    /// Region sizes for the gene-body summary
    pub fn gene_body() -> Self {
        Self {
            tss_outside: 2000,
            tss_inside: 500,
            tts_outside: 1000,
            tts_inside: 0,
            tss_bins: 1,
            body_bins: 1,
            tts_bins: 1,
            threads: 0,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    fn bin_counts(&self) -> [usize; 3] {
        [self.tss_bins, self.body_bins, self.tts_bins]
    }

    /// Total number of value columns in a profile report
    pub fn total_bins(&self) -> usize {
        self.tss_bins + self.body_bins + self.tts_bins
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self::gene_profile()
    }
}

/// Promoter, body and TTS of one gene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneRegions<'a> {
    pub gene: &'a GeneRecord,
    pub tss: Range<u64>,
    pub body: Range<u64>,
    pub tts: Range<u64>,
}

impl GeneRegions<'_> {
    fn segments(&self) -> [&Range<u64>; 3] {
        [&self.tss, &self.body, &self.tts]
    }
}

/// Split a gene into promoter, body and TTS
///
/// Returns `None` when the gene is shorter than the parts of promoter and
/// TTS that lie inside it.
pub fn partition<'a>(gene: &'a GeneRecord, config: &ProfileConfig) -> Option<GeneRegions<'a>> {
    let (st, en) = (gene.start, gene.end);
    if st + config.tss_inside + config.tts_inside > en {
        return None;
    }

    let regions = match gene.strand {
        Strand::Plus => {
            let body_start = st + config.tss_inside;
            let body_end = en - config.tts_inside;
            GeneRegions {
                gene,
                tss: st.saturating_sub(config.tss_outside)..body_start,
                body: body_start..body_end,
                tts: body_end..en + config.tts_outside,
            }
        }
        Strand::Minus => {
            let body_start = st + config.tts_inside;
            let body_end = en - config.tss_inside;
            GeneRegions {
                gene,
                tss: body_end..en + config.tss_outside,
                body: body_start..body_end,
                tts: st.saturating_sub(config.tts_outside)..body_start,
            }
        }
    };
    Some(regions)
}

/// Bin length used for a segment: its length divided by the bin count,
/// rounded half away from zero
pub fn bin_length(segment: &Range<u64>, bins: usize) -> u64 {
    if bins == 0 {
        return 0;
    }
    let len = segment.end.saturating_sub(segment.start);
    (len as f64 / bins as f64).round() as u64
}

/// Per-base average signal of `bins` consecutive bins over a segment, in
/// transcription order
///
/// Rounding the bin length means the last bin may stop short of, or run a
/// little past, the segment end.
fn segment_bins(
    index: &SignalIndex,
    chrom: &str,
    segment: &Range<u64>,
    bins: usize,
    strand: Strand,
) -> QueryResult<Vec<f64>> {
    let width = bin_length(segment, bins);
    if bins > 0 && width == 0 {
        return Err(QueryError::InvalidRange {
            start: segment.start,
            end: segment.end,
        });
    }

    (0..bins as u64)
        .map(|i| {
            let (start, end) = match strand {
                Strand::Plus => {
                    let start = segment.start + i * width;
                    (start, start + width)
                }
                Strand::Minus => {
                    let end = segment.end.saturating_sub(i * width);
                    (end.saturating_sub(width), end)
                }
            };
            Ok(index.aggregate(chrom, start, end)? / width as f64)
        })
        .collect()
}

/// One row of a binned profile report
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRow {
    pub symbol: String,
    pub coordinates: String,
    pub lengths: [u64; 3],
    pub bins: [usize; 3],
    pub bin_lengths: [u64; 3],
    pub values: Vec<f64>,
    /// A query failed and `values` were replaced with zeros
    pub failed: bool,
}

fn profile_row(index: &SignalIndex, regions: &GeneRegions<'_>, config: &ProfileConfig) -> ProfileRow {
    let gene = regions.gene;
    let bins = config.bin_counts();
    let segments = regions.segments();

    let lengths = segments.map(|s| s.end - s.start);
    let mut bin_lengths = [0u64; 3];
    for (i, segment) in segments.iter().enumerate() {
        bin_lengths[i] = bin_length(segment, bins[i]);
    }

    let values: QueryResult<Vec<f64>> = segments
        .iter()
        .zip(bins)
        .try_fold(Vec::with_capacity(config.total_bins()), |mut acc, (segment, n)| {
            acc.extend(segment_bins(index, &gene.chrom, segment, n, gene.strand)?);
            Ok(acc)
        });

    let (values, failed) = match values {
        Ok(values) => (values, false),
        Err(e) => {
            warn!("{} => {} {}", e, gene.symbol(), gene.coordinates());
            (vec![0.0; config.total_bins()], true)
        }
    };

    ProfileRow {
        symbol: gene.symbol().to_string(),
        coordinates: gene.coordinates(),
        lengths,
        bins,
        bin_lengths,
        values,
        failed,
    }
}

/// Run `f` on a rayon pool with the configured number of threads
fn with_pool<T, F>(threads: usize, f: F) -> Result<T, WigError>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| {
            WigError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to create thread pool: {}", e),
            ))
        })?;
    Ok(pool.install(f))
}

/// Binned promoter/body/TTS profile of every gene
///
/// Genes too short to partition are left out. Rows keep the order of
/// `genes`.
pub fn gene_profiles(
    index: &SignalIndex,
    genes: &[GeneRecord],
    config: &ProfileConfig,
) -> Result<Vec<ProfileRow>, WigError> {
    with_pool(config.threads, || {
        genes
            .par_iter()
            .filter_map(|gene| partition(gene, config))
            .map(|regions| profile_row(index, &regions, config))
            .collect()
    })
}

fn join_active<T: ToString>(items: &[T; 3], bins: &[usize; 3]) -> String {
    items
        .iter()
        .zip(bins)
        .filter(|(_, n)| **n > 0)
        .map(|(item, _)| item.to_string())
        .collect::<Vec<_>>()
        .join("|")
}

/// Write a profile report as TSV
pub fn write_profile_report<W: Write>(
    rows: &[ProfileRow],
    config: &ProfileConfig,
    mut writer: W,
) -> io::Result<()> {
    let mut header = vec![
        "symbol".to_string(),
        "coordinates".to_string(),
        "length".to_string(),
        "bins".to_string(),
        "binlength".to_string(),
    ];
    header.extend((1..=config.total_bins()).map(|i| format!("BIN_{}", i)));
    writeln!(writer, "{}", header.join("\t"))?;

    for row in rows {
        let values: Vec<String> = row.values.iter().map(|v| v.to_string()).collect();
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            row.symbol,
            row.coordinates,
            join_active(&row.lengths, &row.bins),
            join_active(&row.bins, &row.bins),
            join_active(&row.bin_lengths, &row.bins),
            values.join("\t")
        )?;
    }
    writer.flush()
}

/// Area and peak of promoter and TTS, average signal per bin of the body
#[derive(Debug, Clone, PartialEq)]
pub struct GeneBodySummary {
    pub symbol: String,
    pub coordinates: String,
    pub tss_area: f64,
    pub tss_peak: f64,
    pub body_average: f64,
    pub tts_area: f64,
    pub tts_peak: f64,
    pub failed: bool,
}

fn body_summary(index: &SignalIndex, regions: &GeneRegions<'_>) -> QueryResult<[f64; 5]> {
    let chrom = regions.gene.chrom.as_str();
    let step = index
        .chromosome(chrom)
        .map(|t| t.step())
        .ok_or_else(|| QueryError::UnknownChromosome(chrom.to_string()))?;

    let tss_area = index.aggregate(chrom, regions.tss.start, regions.tss.end)?;
    let tss_peak = index.peak(chrom, regions.tss.start, regions.tss.end)?;
    let tts_area = index.aggregate(chrom, regions.tts.start, regions.tts.end)?;
    let tts_peak = index.peak(chrom, regions.tts.start, regions.tts.end)?;

    let body_area = index.aggregate(chrom, regions.body.start, regions.body.end)?;
    let body_bins = (regions.body.end - regions.body.start) as f64 / step as f64;

    Ok([tss_area, tss_peak, body_area / body_bins, tts_area, tts_peak])
}

/// Gene-body summary of every gene
pub fn gene_body_summaries(
    index: &SignalIndex,
    genes: &[GeneRecord],
    config: &ProfileConfig,
) -> Result<Vec<GeneBodySummary>, WigError> {
    with_pool(config.threads, || {
        genes
            .par_iter()
            .filter_map(|gene| partition(gene, config))
            .map(|regions| {
                let gene = regions.gene;
                let (values, failed) = match body_summary(index, &regions) {
                    Ok(values) => (values, false),
                    Err(e) => {
                        warn!("{} => {} {}", e, gene.symbol(), gene.coordinates());
                        ([0.0; 5], true)
                    }
                };
                GeneBodySummary {
                    symbol: gene.symbol().to_string(),
                    coordinates: gene.coordinates(),
                    tss_area: values[0],
                    tss_peak: values[1],
                    body_average: values[2],
                    tts_area: values[3],
                    tts_peak: values[4],
                    failed,
                }
            })
            .collect()
    })
}

/// Write gene-body summaries as TSV
pub fn write_gene_body_report<W: Write>(rows: &[GeneBodySummary], mut writer: W) -> io::Result<()> {
    writeln!(
        writer,
        "symbol\tcoordinates\tTSS_area\tTSS_peak\tGenebody_average\tTTS_area\tTTS_peak"
    )?;
    for row in rows {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            row.symbol,
            row.coordinates,
            row.tss_area,
            row.tss_peak,
            row.body_average,
            row.tts_area,
            row.tts_peak
        )?;
    }
    writer.flush()
}

/// Peak statistics over the exons of one gene
#[derive(Debug, Clone, PartialEq)]
pub struct ExonSummary {
    pub symbol: String,
    /// `chrom:min_start-max_end` over the queried exons
    pub coordinates: String,
    pub average_peak: f64,
    pub median_peak: f64,
    pub exon_count: usize,
    /// `|`-joined coordinates of the queried exons
    pub all_coordinates: String,
}

fn median(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    if len % 2 == 1 {
        sorted[len / 2]
    } else {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    }
}

fn exon_summary(index: &SignalIndex, group: &ExonGroup) -> Option<ExonSummary> {
    let mut peaks = Vec::with_capacity(group.exons.len());
    let mut coords = Vec::with_capacity(group.exons.len());
    let mut chrom = None;
    let mut min_start = u64::MAX;
    let mut max_end = 0;

    for exon in &group.exons {
        match index.peak(&exon.chrom, exon.start, exon.end) {
            Ok(peak) => {
                chrom.get_or_insert(exon.chrom.as_str());
                peaks.push(peak);
                coords.push(exon.coordinates());
                min_start = min_start.min(exon.start);
                max_end = max_end.max(exon.end);
            }
            Err(e) => warn!("{} => {} {}", e, group.symbol, exon.coordinates()),
        }
    }

    let chrom = chrom?;
    let average = peaks.iter().sum::<f64>() / peaks.len() as f64;
    peaks.sort_by(|a, b| a.total_cmp(b));

    Some(ExonSummary {
        symbol: group.symbol.clone(),
        coordinates: format!("{}:{}-{}", chrom, min_start, max_end),
        average_peak: average,
        median_peak: median(&peaks),
        exon_count: peaks.len(),
        all_coordinates: coords.join("|"),
    })
}

/// Exon peak summary of every gene with at least one queryable exon
pub fn exon_summaries(
    index: &SignalIndex,
    groups: &[ExonGroup],
    threads: usize,
) -> Result<Vec<ExonSummary>, WigError> {
    with_pool(threads, || {
        groups
            .par_iter()
            .filter_map(|group| exon_summary(index, group))
            .collect()
    })
}

/// Write exon summaries as TSV
pub fn write_exon_report<W: Write>(rows: &[ExonSummary], mut writer: W) -> io::Result<()> {
    writeln!(
        writer,
        "symbol\tcoordinates\tavg_exon_peak\tmedian_exon_peak\tnumber_of_exons\tall_coordinates"
    )?;
    for row in rows {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            row.symbol,
            row.coordinates,
            row.average_peak,
            row.median_peak,
            row.exon_count,
            row.all_coordinates
        )?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ingest;
    use crate::formats::regions::ExonRecord;
    use std::io::Cursor;

    const EPS: f64 = 1e-9;

    fn gene(start: u64, end: u64, strand: Strand) -> GeneRecord {
        GeneRecord {
            chrom: "chr1".to_string(),
            start,
            end,
            name: "ENSG1|Sym".to_string(),
            strand,
        }
    }

    /// chr1 from 1 to 10000 in 100 bp bins, bin k (0-based) has value k
    fn ramp_index() -> SignalIndex {
        let mut wig = String::from("variableStep chrom=chr1 span=100\n");
        for k in 0..100u64 {
            wig.push_str(&format!("{} {}\n", 1 + k * 100, k));
        }
        ingest(Cursor::new(wig.into_bytes())).unwrap()
    }

    #[test]
    fn test_partition_plus() {
        let g = gene(5000, 9000, Strand::Plus);
        let r = partition(&g, &ProfileConfig::gene_profile()).unwrap();
        assert_eq!(r.tss, 4000..6000);
        assert_eq!(r.body, 6000..8000);
        assert_eq!(r.tts, 8000..10000);
    }

    #[test]
    fn test_partition_minus() {
        let g = gene(5000, 9000, Strand::Minus);
        let r = partition(&g, &ProfileConfig::gene_profile()).unwrap();
        assert_eq!(r.tss, 8000..10000);
        assert_eq!(r.body, 6000..8000);
        assert_eq!(r.tts, 4000..6000);
    }

    #[test]
    fn test_partition_short_gene() {
        let g = gene(5000, 6500, Strand::Plus);
        assert!(partition(&g, &ProfileConfig::gene_profile()).is_none());
    }

    #[test]
    fn test_partition_saturates_at_zero() {
        let g = gene(500, 5000, Strand::Plus);
        let r = partition(&g, &ProfileConfig::gene_profile()).unwrap();
        assert_eq!(r.tss, 0..1500);
    }

    #[test]
    fn test_bin_length_rounding() {
        assert_eq!(bin_length(&(0..2000), 20), 100);
        assert_eq!(bin_length(&(0..1030), 20), 52);
        assert_eq!(bin_length(&(0..1010), 20), 51);
        assert_eq!(bin_length(&(0..100), 0), 0);
    }

    #[test]
    fn test_profile_plus_strand_order() {
        let index = ramp_index();
        let config = ProfileConfig {
            tss_bins: 4,
            body_bins: 2,
            tts_bins: 2,
            ..ProfileConfig::gene_profile()
        };
        let genes = vec![gene(3001, 7001, Strand::Plus)];
        let rows = gene_profiles(&index, &genes, &config).unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert!(!row.failed);
        assert_eq!(row.lengths, [2000, 2000, 2000]);
        assert_eq!(row.bin_lengths, [500, 1000, 1000]);
        // TSS 2001..4001 in 500 bp bins: bins 20-24, 25-29, 30-34, 35-39
        let expected_first = (20.0 + 21.0 + 22.0 + 23.0 + 24.0) * 100.0 / 100.0 / 500.0;
        assert!((row.values[0] - expected_first).abs() < EPS);
        assert!(row.values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_profile_minus_strand_reversed() {
        let index = ramp_index();
        let config = ProfileConfig {
            tss_bins: 4,
            body_bins: 2,
            tts_bins: 2,
            ..ProfileConfig::gene_profile()
        };
        let genes = vec![gene(3001, 7001, Strand::Minus)];
        let rows = gene_profiles(&index, &genes, &config).unwrap();

        let row = &rows[0];
        assert!(!row.failed);
        assert!(row.values.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_profile_failure_yields_zeros() {
        let index = ramp_index();
        let genes = vec![GeneRecord {
            chrom: "chr9".to_string(),
            ..gene(3001, 7001, Strand::Plus)
        }];
        let config = ProfileConfig::gene_profile();
        let rows = gene_profiles(&index, &genes, &config).unwrap();

        assert!(rows[0].failed);
        assert_eq!(rows[0].values, vec![0.0; config.total_bins()]);
    }

    #[test]
    fn test_write_profile_report() {
        let index = ramp_index();
        let config = ProfileConfig {
            tss_bins: 2,
            tss_outside: 1000,
            tss_inside: 1000,
            ..ProfileConfig::tss_profile()
        };
        let genes = vec![gene(3001, 7001, Strand::Plus)];
        let rows = gene_profiles(&index, &genes, &config).unwrap();

        let mut out = Vec::new();
        write_profile_report(&rows, &config, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "symbol\tcoordinates\tlength\tbins\tbinlength\tBIN_1\tBIN_2");
        assert!(lines[1].starts_with("Sym\tchr1:3001-7001\t2000\t2\t1000\t"));
    }

    #[test]
    fn test_gene_body_summary() {
        let index = ramp_index();
        let genes = vec![gene(3001, 7001, Strand::Plus)];
        let rows = gene_body_summaries(&index, &genes, &ProfileConfig::gene_body()).unwrap();

        let row = &rows[0];
        assert!(!row.failed);
        // TSS 1001..3501 covers bins 10..=34
        assert!((row.tss_peak - 34.0).abs() < EPS);
        // TTS 7001..8001 covers bins 70..=79
        assert!((row.tts_area - (70..80).sum::<u64>() as f64).abs() < EPS);
        assert!((row.tts_peak - 79.0).abs() < EPS);
        // body 3501..7001: mean of bins 35..=69 over the whole-bin count
        let body_area = (35..70).sum::<u64>() as f64;
        assert!((row.body_average - body_area / 35.0).abs() < EPS);
    }

    #[test]
    fn test_exon_summary() {
        let index = ramp_index();
        let groups = vec![
            ExonGroup {
                symbol: "Gata3".to_string(),
                exons: vec![
                    ExonRecord { chrom: "chr1".to_string(), start: 101, end: 301 },
                    ExonRecord { chrom: "chr1".to_string(), start: 901, end: 1001 },
                    ExonRecord { chrom: "chr9".to_string(), start: 1, end: 10 },
                    ExonRecord { chrom: "chr1".to_string(), start: 501, end: 601 },
                ],
            },
            ExonGroup {
                symbol: "Missing".to_string(),
                exons: vec![ExonRecord { chrom: "chr9".to_string(), start: 1, end: 10 }],
            },
        ];
        let rows = exon_summaries(&index, &groups, 1).unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.exon_count, 3);
        // peaks 2, 9, 5
        assert!((row.average_peak - 16.0 / 3.0).abs() < EPS);
        assert!((row.median_peak - 5.0).abs() < EPS);
        assert_eq!(row.coordinates, "chr1:101-1001");
        assert_eq!(row.all_coordinates, "chr1:101-301|chr1:901-1001|chr1:501-601");
    }

    #[test]
    fn test_exon_summary_skips_failed_first_exon() {
        let index = ramp_index();
        let groups = vec![ExonGroup {
            symbol: "Tbx5".to_string(),
            exons: vec![
                ExonRecord { chrom: "chr9".to_string(), start: 1, end: 10 },
                ExonRecord { chrom: "chr1".to_string(), start: 301, end: 401 },
                ExonRecord { chrom: "chr1".to_string(), start: 701, end: 801 },
            ],
        }];
        let rows = exon_summaries(&index, &groups, 1).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].exon_count, 2);
        assert_eq!(rows[0].coordinates, "chr1:301-801");
        assert_eq!(rows[0].all_coordinates, "chr1:301-401|chr1:701-801");
    }

    #[test]
    fn test_median_even() {
        assert!((median(&[1.0, 2.0, 4.0, 8.0]) - 3.0).abs() < EPS);
    }
}
