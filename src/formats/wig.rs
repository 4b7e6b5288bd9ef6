//! Wiggle line grammar
//!
//! Recognizes and parses the lines of a variableStep wiggle track:
//!
//! ```text
//! variableStep chrom=chr1 span=25
//! 10001 0.5
//! 10026 1.25
//! ```
//!
//! Only variableStep declarations are accepted. A fixedStep declaration is
//! reported as unsupported rather than silently misread.

use crate::core::{snippet, FormatError, FormatResult};
use memchr::memchr2;

/// Keyword opening a variableStep declaration
pub const VARIABLE_STEP: &str = "variableStep";

/// Keyword opening a fixedStep declaration
pub const FIXED_STEP: &str = "fixedStep";

/// Parameters of a variableStep declaration line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WigDeclaration {
    pub chrom: String,
    /// Bases covered by each data line; the bin width of the chromosome
    pub span: u64,
}

impl WigDeclaration {
    /// Parse a declaration line
    ///
    /// Tokens after the keyword are `key=value` pairs in any order; unknown
    /// keys are ignored. `line_number` is only used for error reporting.
    pub fn parse(line: &str, line_number: usize) -> FormatResult<Self> {
        let line = line.trim();

        let rest = match line.strip_prefix(VARIABLE_STEP) {
            Some(rest) => rest,
            None => {
                return Err(FormatError::UnsupportedFormat {
                    line: line_number,
                    content: snippet(line),
                })
            }
        };

        let mut chrom = None;
        let mut span = None;

        for part in rest.split_whitespace() {
            if let Some((key, value)) = part.split_once('=') {
                match key {
                    "chrom" => chrom = Some(value.to_string()),
                    "span" => {
                        let parsed: u64 = value.parse().map_err(|_| FormatError::InvalidHeader {
                            line: line_number,
                            message: format!("span is not an integer: {}", value),
                        })?;
                        if parsed == 0 {
                            return Err(FormatError::InvalidHeader {
                                line: line_number,
                                message: "span must be positive".to_string(),
                            });
                        }
                        span = Some(parsed);
                    }
                    _ => {}
                }
            }
        }

        let chrom = chrom.ok_or_else(|| FormatError::MissingChrom {
            line: line_number,
            content: snippet(line),
        })?;
        // TODO: infer the span from the distance between the first two data lines
        let span = span.ok_or_else(|| FormatError::MissingSpan {
            line: line_number,
            chrom: chrom.clone(),
            content: snippet(line),
        })?;

        Ok(Self { chrom, span })
    }

    /// Format as a declaration line
    pub fn to_line(&self) -> String {
        format!("{} chrom={} span={}", VARIABLE_STEP, self.chrom, self.span)
    }
}

/// A `<position> <value>` data line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataLine {
    pub position: u64,
    pub value: f64,
}

impl DataLine {
    /// Parse a data line
    ///
    /// Accepts exactly one space or tab between an unsigned integer and an
    /// unsigned decimal (`\d*\.?\d+`). Anything else is an
    /// [`FormatError::InvalidDataLine`].
    pub fn parse(line: &str, line_number: usize) -> FormatResult<Self> {
        let invalid = || FormatError::InvalidDataLine {
            line: line_number,
            content: snippet(line),
        };

        let bytes = line.as_bytes();
        let sep = memchr2(b' ', b'\t', bytes).ok_or_else(invalid)?;
        let (pos_field, value_field) = (&line[..sep], &line[sep + 1..]);

        if !is_integer(pos_field) || !is_decimal(value_field) {
            return Err(invalid());
        }

        let position = pos_field.parse().map_err(|_| invalid())?;
        let value = value_field.parse().map_err(|_| invalid())?;

        Ok(Self { position, value })
    }
}

/// Classification of one raw line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// variableStep or fixedStep declaration
    Declaration,
    /// Empty line, `#` comment, `track` or `browser` line
    Ignorable,
    /// Anything else; expected to be a data line
    Data,
}

/// Classify a line without parsing it
pub fn classify(line: &str) -> LineKind {
    let trimmed = line.trim_start();
    if trimmed.starts_with(VARIABLE_STEP) || trimmed.starts_with(FIXED_STEP) {
        LineKind::Declaration
    } else if trimmed.trim_end().is_empty()
        || trimmed.starts_with('#')
        || trimmed.starts_with("track")
        || trimmed.starts_with("browser")
    {
        LineKind::Ignorable
    } else {
        LineKind::Data
    }
}

fn is_integer(field: &str) -> bool {
    !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit())
}

fn is_decimal(field: &str) -> bool {
    let (int_part, frac_part) = match field.split_once('.') {
        Some((i, f)) => (i, f),
        None => ("", field),
    };
    int_part.bytes().all(|b| b.is_ascii_digit()) && is_integer(frac_part)
}
