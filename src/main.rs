//! FastWigQuery CLI entry point
//!
//! Window queries, per-gene reports and transforms over variableStep
//! wiggle tracks.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use fast_wigquery::core::{open_reader, Progress, ProgressKind, SignalIndex};
use fast_wigquery::formats::{self, ProfileConfig};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Progress reporting while a track is loaded (CLI enum)
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProgressArg {
    /// Report every chromosome as it is opened
    #[value(name = "chr")]
    Chromosome,
    /// Report the share of the file read
    #[value(name = "percent", alias = "percentage", alias = "number")]
    Percent,
}

impl From<ProgressArg> for ProgressKind {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Chromosome => ProgressKind::Chromosome,
            ProgressArg::Percent => ProgressKind::Percent,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum LayoutArg {
    /// Promoter, gene body and TTS (20/40/20 bins)
    #[default]
    #[value(name = "gene")]
    Gene,
    /// ±3 kb around the TSS (80 bins)
    #[value(name = "tss")]
    Tss,
}

#[derive(Parser)]
#[command(name = "fast-wigquery")]
#[command(about = "Fast window queries and gene reports over variableStep wiggle tracks")]
#[command(version)]
#[command(author = "FastWigQuery Contributors")]
struct Cli {
    /// Report loading progress: 'chr' per chromosome, 'percent' every 1000 lines
    #[arg(long, global = true)]
    progress: Option<ProgressArg>,

    /// Number of threads for per-gene reports (default: number of CPUs)
    #[arg(short = 't', long, global = true, default_value = "0")]
    threads: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Area-weighted signal over a half-open range
    Fpkm {
        /// Input wiggle file (variableStep)
        wig: PathBuf,
        /// Chromosome (`1` falls back to `chr1`)
        chrom: String,
        /// Range start (inclusive)
        start: u64,
        /// Range end (exclusive)
        end: u64,
    },
    /// Whole-bin values over a half-open range
    Profile {
        /// Input wiggle file (variableStep)
        wig: PathBuf,
        /// Chromosome (`1` falls back to `chr1`)
        chrom: String,
        /// Range start (inclusive)
        start: u64,
        /// Range end (exclusive)
        end: u64,
    },
    /// Binned signal profile of every gene
    GeneProfile {
        /// Input wiggle file (variableStep)
        wig: PathBuf,
        /// Gene table (chrom, start, end, name, score, strand)
        genes: PathBuf,
        /// Output file (optional, stdout if not specified)
        output: Option<PathBuf>,
        /// Bin layout
        #[arg(long, default_value = "gene")]
        layout: LayoutArg,
    },
    /// Promoter, gene body and TTS summary of every gene
    GeneBody {
        /// Input wiggle file (variableStep)
        wig: PathBuf,
        /// Gene table (chrom, start, end, name, score, strand)
        genes: PathBuf,
        /// Output file (optional, stdout if not specified)
        output: Option<PathBuf>,
    },
    /// Exon peak summary of every gene
    Exons {
        /// Input wiggle file (variableStep)
        wig: PathBuf,
        /// Exon table (name, exon, chrom, _, start, end)
        exons: PathBuf,
        /// Output file (optional, stdout if not specified)
        output: Option<PathBuf>,
        /// Gene table used to translate exon names into gene symbols
        #[arg(long)]
        lookup: Option<PathBuf>,
    },
    /// Rescale a track to reads per million aligned reads
    Normalize {
        /// Input wiggle file (variableStep)
        input: PathBuf,
        /// Output wiggle file
        output: PathBuf,
        /// Number of aligned reads
        #[arg(long, conflicts_with = "stats", required_unless_present = "stats")]
        reads: Option<u64>,
        /// Aligner log holding "# reads with at least one reported alignment"
        #[arg(long)]
        stats: Option<PathBuf>,
    },
    /// Subtract one track from another
    Subtract {
        /// Minuend wiggle file
        minuend: PathBuf,
        /// Subtrahend wiggle file
        subtrahend: PathBuf,
        /// Output wiggle file
        output: PathBuf,
        /// Drop negative and zero differences
        #[arg(long)]
        no_negatives: bool,
    },
}

fn load_track(path: &Path, progress: Option<ProgressArg>) -> anyhow::Result<SignalIndex> {
    let start = Instant::now();
    eprintln!("Loading wiggle file: {:?}", path);

    let mut reader = open_reader(path)
        .with_context(|| format!("Failed to open wiggle file {:?}", path))?;

    match progress {
        Some(kind) => reader.read_with_progress(kind.into(), |p| match p {
            Progress::Chromosome(chrom) => eprintln!("Reading {}", chrom),
            Progress::Percent(pct) => eprintln!("{:.1}%", pct),
            Progress::Lines(n) => eprintln!("{} lines", n),
        }),
        None => reader.read(),
    }
    .with_context(|| format!("Failed to load wiggle file {:?}", path))?;

    let discarded = reader.discarded_lines().len();
    let index = reader.into_index();
    eprintln!(
        "Wiggle file loaded in {:.2}s: {} chromosomes, {} bins, {} lines discarded",
        start.elapsed().as_secs_f64(),
        index.len(),
        index.total_bins(),
        discarded
    );

    Ok(index)
}

fn create_output(output: Option<&PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Fpkm { wig, chrom, start: from, end } => {
            let index = load_track(&wig, cli.progress)?;
            let value = index.aggregate(&chrom, from, end)?;
            println!("{}", value);
        }

        Commands::Profile { wig, chrom, start: from, end } => {
            let index = load_track(&wig, cli.progress)?;
            let values = index.profile(&chrom, from, end)?;
            let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            println!("{}", values.join("\t"));
        }

        Commands::GeneProfile { wig, genes, output, layout } => {
            let index = load_track(&wig, cli.progress)?;
            let genes = formats::read_gene_table_file(&genes)?;
            let config = match layout {
                LayoutArg::Gene => ProfileConfig::gene_profile(),
                LayoutArg::Tss => ProfileConfig::tss_profile(),
            }
            .with_threads(cli.threads);

            eprintln!("Profiling {} genes ({:?} layout)", genes.len(), layout);
            let rows = formats::gene_profiles(&index, &genes, &config)?;
            formats::write_profile_report(&rows, &config, create_output(output.as_ref())?)?;

            eprintln!("\n=== Report Statistics ===");
            eprintln!("Total genes:     {}", genes.len());
            eprintln!("Reported:        {}", rows.len());
            eprintln!("Failed:          {}", rows.iter().filter(|r| r.failed).count());
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::GeneBody { wig, genes, output } => {
            let index = load_track(&wig, cli.progress)?;
            let genes = formats::read_gene_table_file(&genes)?;
            let config = ProfileConfig::gene_body().with_threads(cli.threads);

            let rows = formats::gene_body_summaries(&index, &genes, &config)?;
            formats::write_gene_body_report(&rows, create_output(output.as_ref())?)?;

            eprintln!("\n=== Report Statistics ===");
            eprintln!("Total genes:     {}", genes.len());
            eprintln!("Reported:        {}", rows.len());
            eprintln!("Failed:          {}", rows.iter().filter(|r| r.failed).count());
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Exons { wig, exons, output, lookup } => {
            let index = load_track(&wig, cli.progress)?;
            let lookup = match lookup {
                Some(path) => Some(formats::symbol_lookup(&formats::read_gene_table_file(&path)?)),
                None => None,
            };
            let groups = formats::read_exon_table_file(&exons, lookup.as_ref())?;

            let rows = formats::exon_summaries(&index, &groups, cli.threads)?;
            formats::write_exon_report(&rows, create_output(output.as_ref())?)?;

            eprintln!("\n=== Report Statistics ===");
            eprintln!("Total genes:     {}", groups.len());
            eprintln!("Reported:        {}", rows.len());
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Normalize { input, output, reads, stats } => {
            let reads = match (reads, stats) {
                (Some(reads), _) => reads,
                (None, Some(path)) => formats::aligned_read_count_file(&path)?.with_context(|| {
                    format!("No aligned read count found in {:?}", path)
                })?,
                (None, None) => anyhow::bail!("either --reads or --stats is required"),
            };

            eprintln!("Normalizing {:?} -> {:?} ({} aligned reads)", input, output, reads);
            let stats = formats::normalize_track_file(&input, &output, reads)?;

            eprintln!("\n=== Normalization Statistics ===");
            eprintln!("Chromosomes:     {}", stats.chromosomes);
            eprintln!("Values:          {}", stats.values_written);
            eprintln!("Skipped lines:   {}", stats.skipped);
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Subtract { minuend, subtrahend, output, no_negatives } => {
            let left = load_track(&minuend, cli.progress)?;
            let right = load_track(&subtrahend, cli.progress)?;

            eprintln!("Subtracting {:?} - {:?} -> {:?}", minuend, subtrahend, output);
            eprintln!("Writing negative values: {}", !no_negatives);
            let out = BufWriter::new(File::create(&output)?);
            let stats = formats::subtract_tracks(&left, &right, out, !no_negatives)?;

            eprintln!("\n=== Subtraction Statistics ===");
            eprintln!("Chromosomes:     {}", stats.chromosomes);
            eprintln!("Values:          {}", stats.values_written);
            eprintln!("Dropped:         {}", stats.skipped);
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }
    }

    Ok(())
}
