//! Region tables
//!
//! Reads the tab-separated tables the per-gene reports are driven by:
//!
//! - gene tables, BED6-like: `chrom start end name score strand ...`
//! - exon tables: `name exon chrom _ start end ...`
//!
//! Gene names may carry an identifier and a symbol separated by `|`
//! (`ENSMUSG00000051951|Xkr4`); the symbol is preferred when present.

use crate::core::{RegionParseError, WigError};
use log::debug;
use memchr::memchr;
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Strand orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Plus,
    Minus,
}

impl Strand {
    /// Parse `+` or `-`; anything else is unknown
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "+" => Some(Strand::Plus),
            "-" => Some(Strand::Minus),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
        }
    }
}

/// One row of a gene table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneRecord {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub name: String,
    pub strand: Strand,
}

impl GeneRecord {
    /// Display symbol: the part after `|` if present, otherwise the name
    pub fn symbol(&self) -> &str {
        let mut parts = self.name.split('|');
        let first = parts.next().unwrap_or("");
        match parts.next() {
            Some(symbol) if !symbol.is_empty() => symbol,
            _ => first,
        }
    }

    /// Identifier: the part before `|`
    pub fn identifier(&self) -> &str {
        self.name.split('|').next().unwrap_or("")
    }

    /// `chrom:start-end`
    pub fn coordinates(&self) -> String {
        format!("{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// One row of an exon table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExonRecord {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl ExonRecord {
    pub fn coordinates(&self) -> String {
        format!("{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// Exons of one gene, in table order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExonGroup {
    pub symbol: String,
    pub exons: Vec<ExonRecord>,
}

/// Split a line on tabs
fn split_fields(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut fields = Vec::with_capacity(8);
    let mut start = 0;
    while let Some(offset) = memchr(b'\t', &bytes[start..]) {
        fields.push(&line[start..start + offset]);
        start += offset + 1;
    }
    fields.push(&line[start..]);
    fields
}

fn is_skippable(line: &str) -> bool {
    line.trim().is_empty()
        || line.starts_with('#')
        || line.starts_with("track")
        || line.starts_with("browser")
}

fn parse_coord(value: &str, field: &'static str, line: usize) -> Result<u64, RegionParseError> {
    value.trim().parse().map_err(|_| RegionParseError::InvalidNumber {
        line,
        field,
        value: value.to_string(),
    })
}

/// Read a gene table
///
/// Rows with a strand other than `+` or `-` are skipped.
pub fn read_gene_table<R: BufRead>(reader: R) -> Result<Vec<GeneRecord>, RegionParseError> {
    let mut genes = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = idx + 1;
        if is_skippable(&line) {
            continue;
        }

        let fields = split_fields(&line);
        if fields.len() < 6 {
            return Err(RegionParseError::TooFewFields {
                line: line_number,
                expected: 6,
                found: fields.len(),
            });
        }

        let strand = match Strand::parse(fields[5]) {
            Some(s) => s,
            None => {
                debug!("Skipping {} at line {}: unknown strand '{}'", fields[3], line_number, fields[5]);
                continue;
            }
        };

        genes.push(GeneRecord {
            chrom: fields[0].to_string(),
            start: parse_coord(fields[1], "start", line_number)?,
            end: parse_coord(fields[2], "end", line_number)?,
            name: fields[3].to_string(),
            strand,
        });
    }

    Ok(genes)
}

/// Read a gene table from a file
pub fn read_gene_table_file<P: AsRef<Path>>(path: P) -> Result<Vec<GeneRecord>, WigError> {
    let file = std::fs::File::open(path.as_ref())?;
    Ok(read_gene_table(BufReader::new(file))?)
}

/// Identifier -> symbol map built from a gene table
pub fn symbol_lookup(genes: &[GeneRecord]) -> HashMap<String, String> {
    genes
        .iter()
        .map(|g| (g.identifier().to_string(), g.symbol().to_string()))
        .collect()
}

/// Read an exon table, grouping exons by gene
///
/// Gene names are translated through `lookup` when given; names missing from
/// the lookup are kept as they are. Groups keep first-seen order.
pub fn read_exon_table<R: BufRead>(
    reader: R,
    lookup: Option<&HashMap<String, String>>,
) -> Result<Vec<ExonGroup>, RegionParseError> {
    let mut groups: Vec<ExonGroup> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = idx + 1;
        if is_skippable(&line) {
            continue;
        }

        let fields = split_fields(&line);
        if fields.len() < 6 {
            return Err(RegionParseError::TooFewFields {
                line: line_number,
                expected: 6,
                found: fields.len(),
            });
        }

        let name = fields[0];
        let symbol = lookup
            .and_then(|l| l.get(name))
            .map(|s| s.as_str())
            .unwrap_or(name)
            .to_string();

        let exon = ExonRecord {
            chrom: fields[2].to_string(),
            start: parse_coord(fields[4], "start", line_number)?,
            end: parse_coord(fields[5], "end", line_number)?,
        };

        match positions.get(&symbol) {
            Some(&i) => groups[i].exons.push(exon),
            None => {
                positions.insert(symbol.clone(), groups.len());
                groups.push(ExonGroup {
                    symbol,
                    exons: vec![exon],
                });
            }
        }
    }

    Ok(groups)
}

/// Read an exon table from a file
pub fn read_exon_table_file<P: AsRef<Path>>(
    path: P,
    lookup: Option<&HashMap<String, String>>,
) -> Result<Vec<ExonGroup>, WigError> {
    let file = std::fs::File::open(path.as_ref())?;
    Ok(read_exon_table(BufReader::new(file), lookup)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_split_fields() {
        assert_eq!(split_fields("a\tb\t\tc"), vec!["a", "b", "", "c"]);
        assert_eq!(split_fields("single"), vec!["single"]);
    }

    #[test]
    fn test_read_gene_table() {
        let table = "\
track name=genes
chr1\t3204562\t3661579\tENSMUSG00000051951|Xkr4\t0\t-
chr1\t4290846\t4409241\tENSMUSG00000025900\t0\t+
chr1\t100\t200\tNOSTRAND\t0\t.
";
        let genes = read_gene_table(Cursor::new(table)).unwrap();

        assert_eq!(genes.len(), 2);
        assert_eq!(genes[0].symbol(), "Xkr4");
        assert_eq!(genes[0].identifier(), "ENSMUSG00000051951");
        assert_eq!(genes[0].strand, Strand::Minus);
        assert_eq!(genes[0].coordinates(), "chr1:3204562-3661579");
        assert_eq!(genes[1].symbol(), "ENSMUSG00000025900");
        assert_eq!(genes[1].strand, Strand::Plus);
    }

    #[test]
    fn test_gene_table_errors() {
        let result = read_gene_table(Cursor::new("chr1\t100\t200\n"));
        assert!(matches!(
            result,
            Err(RegionParseError::TooFewFields { line: 1, expected: 6, found: 3 })
        ));

        let result = read_gene_table(Cursor::new("\nchr1\tabc\t200\tg\t0\t+\n"));
        assert!(matches!(
            result,
            Err(RegionParseError::InvalidNumber { line: 2, field: "start", .. })
        ));
    }

    #[test]
    fn test_read_exon_table_with_lookup() {
        let genes = read_gene_table(Cursor::new("chr1\t1\t500\tNM_001|Gata3\t0\t+\n")).unwrap();
        let lookup = symbol_lookup(&genes);

        let table = "\
NM_001\t1\tchr1\t.\t100\t200
NM_002\t1\tchr2\t.\t300\t400
NM_001\t2\tchr1\t.\t250\t300
";
        let groups = read_exon_table(Cursor::new(table), Some(&lookup)).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].symbol, "Gata3");
        assert_eq!(groups[0].exons.len(), 2);
        assert_eq!(groups[0].exons[1].coordinates(), "chr1:250-300");
        assert_eq!(groups[1].symbol, "NM_002");
    }
}
