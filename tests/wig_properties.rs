//! Property-based tests for variableStep ingestion

use fast_wigquery::core::{ingest, Advance, FormatError, WigError, WigReader};
use fast_wigquery::formats::wig::{classify, DataLine, LineKind, WigDeclaration};
use proptest::prelude::*;

/// Generate a valid chromosome name
fn arb_chrom_name() -> impl Strategy<Value = String> {
    prop_oneof![
        (1u8..=22).prop_map(|n| format!("chr{}", n)),
        Just("chrX".to_string()),
        Just("chrY".to_string()),
        Just("chrM".to_string()),
    ]
}

/// Generate a valid span value
fn arb_span() -> impl Strategy<Value = u64> {
    1u64..=100
}

/// Generate a valid position
fn arb_position() -> impl Strategy<Value = u64> {
    1u64..10_000_000
}

/// Generate a non-negative value with two decimals
fn arb_value() -> impl Strategy<Value = f64> {
    (0u32..10_000).prop_map(|v| v as f64 / 100.0)
}

/// Lines that are neither declarations nor data
fn arb_noise() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("# produced by a test".to_string()),
        Just("track type=wiggle_0 name=test".to_string()),
        Just("browser position chr1:1-1000".to_string()),
    ]
}

/// Bin indexes (strictly increasing) and their values
fn arb_bins() -> impl Strategy<Value = Vec<(u64, f64)>> {
    prop::collection::btree_map(0u64..200, (1u32..10_000).prop_map(|v| v as f64 / 100.0), 1..30)
        .prop_map(|m| m.into_iter().collect())
}

fn render(chrom: &str, begin: u64, step: u64, bins: &[(u64, f64)]) -> String {
    let mut wig = format!("variableStep chrom={} span={}\n", chrom, step);
    for (i, v) in bins {
        wig.push_str(&format!("{} {}\n", begin + i * step, v));
    }
    wig
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: variableStep declaration parsing extracts chrom and span
    #[test]
    fn prop_variable_step_parsing(chrom in arb_chrom_name(), span in arb_span()) {
        let line = format!("variableStep chrom={} span={}", chrom, span);
        let decl = WigDeclaration::parse(&line, 1).unwrap();

        prop_assert_eq!(classify(&line), LineKind::Declaration);
        prop_assert_eq!(decl.chrom, chrom);
        prop_assert_eq!(decl.span, span);
    }

    /// Property: a fixedStep declaration is reported as unsupported
    #[test]
    fn prop_fixed_step_unsupported(chrom in arb_chrom_name(), start in arb_position(), step in arb_span()) {
        let line = format!("fixedStep chrom={} start={} step={}", chrom, start, step);
        let result = WigDeclaration::parse(&line, 3);
        let unsupported = matches!(result, Err(FormatError::UnsupportedFormat { line: 3, .. }));
        prop_assert!(unsupported);
    }

    /// Property: data lines separated by a space or a tab parse alike
    #[test]
    fn prop_data_line_separators(pos in arb_position(), value in arb_value()) {
        let spaced = DataLine::parse(&format!("{} {}", pos, value), 1).unwrap();
        let tabbed = DataLine::parse(&format!("{}\t{}", pos, value), 1).unwrap();

        prop_assert_eq!(spaced, tabbed);
        prop_assert_eq!(spaced.position, pos);
        prop_assert!((spaced.value - value).abs() < 1e-9);
    }

    /// Property: omitted bins are filled with zeros
    #[test]
    fn prop_gap_fill_matches_explicit_zeros(
        begin in arb_position(),
        step in arb_span(),
        bins in arb_bins(),
    ) {
        let sparse = ingest(render("chr1", begin, step, &bins).as_bytes()).unwrap();

        let first = bins[0].0;
        let last = bins[bins.len() - 1].0;
        let dense: Vec<(u64, f64)> = (first..=last)
            .map(|i| (i, bins.iter().find(|(k, _)| *k == i).map(|(_, v)| *v).unwrap_or(0.0)))
            .collect();
        let explicit = ingest(render("chr1", begin, step, &dense).as_bytes()).unwrap();

        prop_assert_eq!(sparse.chromosome("chr1"), explicit.chromosome("chr1"));

        let track = sparse.chromosome("chr1").unwrap();
        prop_assert_eq!(track.len() as u64, last - first + 1);
        prop_assert_eq!(track.begin(), Some(begin + first * step));
        prop_assert_eq!(track.termination(), Some(begin + last * step + step - 1));
    }

    /// Property: comments, track lines and blank lines before the first header are discarded
    #[test]
    fn prop_ignorable_lines_before_header(
        begin in arb_position(),
        step in arb_span(),
        bins in arb_bins(),
        noise in prop::collection::vec(arb_noise(), 0..5),
    ) {
        let plain = render("chr1", begin, step, &bins);
        let mut noisy = String::new();
        for line in &noise {
            noisy.push_str(line);
            noisy.push('\n');
        }
        noisy.push_str(&plain);

        let a = ingest(plain.as_bytes()).unwrap();
        let mut reader = WigReader::new(noisy.as_bytes());
        reader.read().unwrap();

        prop_assert_eq!(reader.discarded_lines().len(), noise.len());
        prop_assert_eq!(a.chromosome("chr1"), reader.index().chromosome("chr1"));
    }

    /// Property: the same lines after the first header are format errors
    #[test]
    fn prop_ignorable_lines_after_header_rejected(
        begin in arb_position(),
        step in arb_span(),
        bins in arb_bins(),
        noise in arb_noise(),
        at in any::<prop::sample::Index>(),
    ) {
        let plain = render("chr1", begin, step, &bins);
        let lines: Vec<&str> = plain.lines().collect();
        // insert after the header, before one of the data lines or at the end
        let pos = 1 + at.index(lines.len());

        let mut noisy = String::new();
        for (i, line) in lines.iter().enumerate() {
            if i == pos {
                noisy.push_str(&noise);
                noisy.push('\n');
            }
            noisy.push_str(line);
            noisy.push('\n');
        }
        if pos == lines.len() {
            noisy.push_str(&noise);
            noisy.push('\n');
        }

        let result = ingest(noisy.as_bytes());
        let rejected = matches!(
            result,
            Err(WigError::Format(FormatError::InvalidDataLine { line, .. })) if line == pos + 1
        );
        prop_assert!(rejected);
    }

    /// Property: chromosomes keep their input order and each closes with its own step
    #[test]
    fn prop_chromosome_order(
        chroms in prop::collection::btree_set(arb_chrom_name(), 1..6),
        step in arb_span(),
    ) {
        let names: Vec<String> = chroms.into_iter().collect();
        let mut wig = String::new();
        for (n, chrom) in names.iter().rev().enumerate() {
            let chrom_step = step + n as u64;
            wig.push_str(&render(chrom, 1, chrom_step, &[(0, 1.0), (2, 2.0)]));
        }

        let index = ingest(wig.as_bytes()).unwrap();
        let order: Vec<&str> = index.chroms().collect();
        let expected: Vec<&str> = names.iter().rev().map(|s| s.as_str()).collect();
        prop_assert_eq!(order, expected);

        for (n, chrom) in names.iter().rev().enumerate() {
            let track = index.chromosome(chrom).unwrap();
            let chrom_step = step + n as u64;
            prop_assert!(track.is_closed());
            prop_assert_eq!(track.step(), chrom_step);
            prop_assert_eq!(track.termination(), Some(1 + 3 * chrom_step - 1));
        }
    }

    /// Property: a position that is not on the bin grid is rejected
    #[test]
    fn prop_misaligned_rejected(begin in arb_position(), step in 2u64..=100, off in 1u64..100) {
        let off = off % step;
        prop_assume!(off != 0);
        let wig = format!(
            "variableStep chrom=chr1 span={}\n{} 1\n{} 1\n",
            step, begin, begin + step + off
        );
        let result = ingest(wig.as_bytes());
        let misaligned = matches!(
            result,
            Err(WigError::Format(FormatError::MisalignedPosition { line: 3, .. }))
        );
        prop_assert!(misaligned);
    }

    /// Property: a sub-span header discards everything up to the next chromosome
    #[test]
    fn prop_sub_span_discarded(step in 2u64..=100, bins in arb_bins()) {
        let mut wig = render("chr1", 1, step, &bins);
        let tail_start = 1 + (bins[bins.len() - 1].0 + 1) * step;
        wig.push_str(&format!("variableStep chrom=chr1 span=1\n{} 5\n{} 5\n", tail_start, tail_start + 1));
        wig.push_str("variableStep chrom=chr2 span=10\n1 1\n");

        let mut reader = WigReader::new(wig.as_bytes());
        let mut discarded = 0;
        loop {
            match reader.advance().unwrap() {
                Advance::EndOfInput => break,
                Advance::Discarded => discarded += 1,
                _ => {}
            }
        }
        prop_assert_eq!(discarded, 3);

        let index = reader.into_index();
        let expected = ingest(render("chr1", 1, step, &bins).as_bytes()).unwrap();
        prop_assert_eq!(index.chromosome("chr1"), expected.chromosome("chr1"));
        prop_assert!(index.has_chrom("chr2"));
    }
}
