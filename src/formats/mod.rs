//! File format adapters
//!
//! Wiggle line grammar, region tables, per-gene reports and whole-track
//! transforms.

pub mod regions;
pub mod report;
pub mod transform;
pub mod wig;

pub use regions::{
    read_exon_table, read_exon_table_file, read_gene_table, read_gene_table_file, symbol_lookup,
    ExonGroup, ExonRecord, GeneRecord, Strand,
};
pub use report::{
    exon_summaries, gene_body_summaries, gene_profiles, partition, write_exon_report,
    write_gene_body_report, write_profile_report, ExonSummary, GeneBodySummary, GeneRegions,
    ProfileConfig, ProfileRow,
};
pub use transform::{
    aligned_read_count, aligned_read_count_file, normalize_track, normalize_track_file,
    reads_per_million, subtract_tracks, TransformStats,
};
pub use wig::{classify, DataLine, LineKind, WigDeclaration};
