// src/extractors/substances.rs
use super::codes::{codes_in_text, dedupe};
use super::RuleContext;
use crate::models::{ExtractedField, Line, Metadata, Substance, Text};
use once_cell::sync::Lazy;
use regex::Regex;

// Dash variants accepted between the digit groups of registry numbers.
const NUMBER_SEPARATOR: &str = r"\s?[-\u{2010}\u{2011}]\s?";

// A row continues until the next CAS number or a vertical gap this large.
const MAX_ROW_GAP_PT: f64 = 60.0;

static CAS_RE: Lazy<Regex> = Lazy::new(|| {
    let sep = NUMBER_SEPARATOR;
    Regex::new(&format!(r"\b(\d{{2,7}}){sep}(\d{{2}}){sep}(\d)\b", sep = sep)).expect("Failed to compile CAS_RE")
});

static CE_RE: Lazy<Regex> = Lazy::new(|| {
    let sep = NUMBER_SEPARATOR;
    Regex::new(&format!(r"\b(\d{{3}}){sep}(\d{{3}}){sep}(\d)\b", sep = sep)).expect("Failed to compile CE_RE")
});

static CONCENTRATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        (?:(?:[<>]=?|[\u{2264}\u{2265}~])\s*)?\d{1,3}(?:[.,]\d+)?\s*%?\s*(?:-|a|to|<|\u{2264})\s*(?:[<>]=?|[\u{2264}\u{2265}])?\s*\d{1,3}(?:[.,]\d+)?\s*%
      | (?:[<>]=?|[\u{2264}\u{2265}~])\s*\d{1,3}(?:[.,]\d+)?\s*%
      | \b\d{1,3}(?:[.,]\d+)?\s*%",
    )
    .expect("Failed to compile CONCENTRATION_RE")
});

/// Substances listed in the composition section (3), one per CAS number.
pub fn extract_substances(ctx: &RuleContext<'_>) -> Vec<Substance> {
    let max_gap = MAX_ROW_GAP_PT / ctx.page_dimension.height.max(1.0);
    let rows = group_rows(&ctx.section_lines(3), max_gap);

    let substances: Vec<Substance> = rows
        .iter()
        .filter_map(|row| extract_substance(row, ctx.column_tolerance))
        .collect();
    tracing::debug!("Found {} substances in section 3", substances.len());
    substances
}

// Rows are anchored on lines holding a valid CAS number.
fn group_rows<'a>(lines: &[&'a Line], max_gap: f64) -> Vec<Vec<&'a Line>> {
    let mut rows: Vec<Vec<&Line>> = Vec::new();
    for &line in lines {
        if find_cas(&line.clean_text()).is_some() {
            rows.push(vec![line]);
            continue;
        }
        let Some(row) = rows.last_mut() else {
            continue;
        };
        let previous = row[row.len() - 1].start_position;
        let same_page = previous.page_number == line.start_position.page_number;
        if same_page && line.start_position.y_proportion - previous.y_proportion > max_gap {
            continue;
        }
        row.push(line);
    }
    rows
}

fn extract_substance(row: &[&Line], column_tolerance: f64) -> Option<Substance> {
    let anchor = row.first()?;
    let cas = find_cas(&anchor.clean_text())?;

    let ce = row.iter().find_map(|line| {
        let text = line.clean_text();
        let caps = CE_RE.captures(&text)?;
        Some(ExtractedField::from_line(format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]), line))
    });

    let concentration = row.iter().find_map(|line| {
        let text = line.clean_text();
        let without_numbers = CE_RE.replace_all(&CAS_RE.replace_all(&text, " "), " ").into_owned();
        let m = CONCENTRATION_RE.find(&without_numbers)?;
        let value = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
        Some(ExtractedField::from_line(value, line))
    });

    let columns = code_columns(row, column_tolerance);
    let dangers = select_column(columns);

    Some(Substance { cas: Some(ExtractedField::from_line(cas, anchor)), ce, concentration, dangers })
}

/// First CAS number of the text whose check digit is valid, normalized to
/// `NNNNNNN-NN-N`.
pub fn find_cas(text: &str) -> Option<String> {
    CAS_RE.captures_iter(text).find_map(|caps| {
        let cas = format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]);
        is_valid_cas(&cas).then_some(cas)
    })
}

/// CAS check digit: weighted sum of the other digits, right to left from 1, mod 10.
pub fn is_valid_cas(cas: &str) -> bool {
    let digits: Vec<u32> = cas.chars().filter_map(|c| c.to_digit(10)).collect();
    let Some((&check, body)) = digits.split_last() else {
        return false;
    };
    if body.len() < 4 {
        return false;
    }
    let sum: u32 = body.iter().rev().enumerate().map(|(i, d)| (i as u32 + 1) * d).sum();
    sum % 10 == check
}

/// Hazard codes of the row, one group per x-position cluster, left to right.
fn code_columns(row: &[&Line], tolerance: f64) -> Vec<Vec<ExtractedField<String>>> {
    let mut texts: Vec<&Text> = row.iter().flat_map(|line| line.texts.iter()).collect();
    texts.sort_by(|a, b| a.position.x_proportion.total_cmp(&b.position.x_proportion));

    let mut clusters: Vec<Vec<&Text>> = Vec::new();
    let mut cluster_start = f64::NEG_INFINITY;
    for text in texts {
        if text.position.x_proportion - cluster_start > tolerance || clusters.is_empty() {
            cluster_start = text.position.x_proportion;
            clusters.push(Vec::new());
        }
        if let Some(cluster) = clusters.last_mut() {
            cluster.push(text);
        }
    }

    clusters
        .into_iter()
        .map(|mut cluster| {
            cluster.sort_by(|a, b| a.position.reading_cmp(&b.position));
            dedupe(
                cluster
                    .iter()
                    .flat_map(|text| {
                        codes_in_text(&text.raw_content, Metadata { start_box: text.position, end_box: None })
                    })
                    .collect(),
            )
        })
        .filter(|codes| !codes.is_empty())
        .collect()
}

/// The column with the most codes; the leftmost wins a tie.
pub fn select_column(columns: Vec<Vec<ExtractedField<String>>>) -> Vec<ExtractedField<String>> {
    let mut best: Vec<ExtractedField<String>> = Vec::new();
    for column in columns {
        if column.len() > best.len() {
            best = column;
        }
    }
    best
}
