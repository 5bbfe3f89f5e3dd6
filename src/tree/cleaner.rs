// src/tree/cleaner.rs
use super::builder::{attach_strokes, x_bucket, TreeBuilder, XCounts};
use super::patterns::is_toc_entry;
use crate::extractors::codes::scan_codes;
use crate::extractors::substances::find_cas;
use crate::models::{FdsTree, Line, Section, StrokeKind, Subsection, Text};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

// Share of straddling lines needed before a subsection is split.
const COLUMN_SPLIT_RATIO: f64 = 0.6;
const MIN_COLUMN_LINES: usize = 3;
// Column parts shorter than this on average look like table cells, not prose.
const MIN_COLUMN_PART_CHARS: usize = 25;
// Middle band of the page where a column gutter may sit.
const GUTTER_BAND: (f64, f64) = (0.30, 0.70);
const MIN_GUTTER_HITS: usize = 8;
// Composition: its rows spread over columns by nature.
const TABLE_SECTION: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub struct CleanOptions<'a> {
    pub x_counts: &'a XCounts,
    pub from_image: bool,
    pub stroke_max_proportion: f64,
    pub column_tolerance: f64,
}

// --- OCR repair patterns ---

// Code with spaced digits: "H 3 1 5", "P 2 8 0", "EUH 2 0 8"
static SPACED_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(EUH|AUH|H|P)\s*(\d)\s+(\d)\s*(\d)\b|\b(EUH|AUH|H|P)\s+(\d{3})\b").expect("Failed to compile SPACED_CODE_RE")
});

// Code whose digits were read as letters: "H3l5", "P2B0"
static CONFUSED_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(EUH|AUH|H|P)([0-9OolI|SB]{3})\b").expect("Failed to compile CONFUSED_CODE_RE")
});

// Spaced header numbering at line start: "1 . 1", "2 , 2"
static SPACED_NUMBERING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})\s*[.,]\s*(\d{1,2})\b").expect("Failed to compile SPACED_NUMBERING_RE")
});

/// Takes the builder's tree and returns a repaired one: OCR confusions,
/// table of contents lines, column bleed and empty subsections. Never fails.
pub fn clean(tree: FdsTree, options: &CleanOptions<'_>) -> FdsTree {
    let tree = if options.from_image { rescan_repaired(tree) } else { tree };

    let cleaned: FdsTree = tree
        .into_iter()
        .map(|(number, section)| (number, clean_section(number, section, options)))
        .collect();

    tracing::info!(
        "Cleaned tree: {} sections, {} non-empty",
        cleaned.len(),
        cleaned.values().filter(|s| !s.subsections.is_empty()).count()
    );
    cleaned
}

fn clean_section(number: u32, mut section: Section, options: &CleanOptions<'_>) -> Section {
    let subsections = std::mem::take(&mut section.subsections);
    section.subsections = subsections
        .into_iter()
        .map(|(sub_number, subsection)| {
            let subsection = drop_toc_entries(subsection);
            let subsection = if number == TABLE_SECTION { subsection } else { split_columns(subsection, options) };
            (sub_number, subsection)
        })
        .filter(|(sub_number, subsection)| {
            if subsection.is_empty() {
                tracing::debug!("Dropping empty subsection {}.{}", number, sub_number);
            }
            !subsection.is_empty()
        })
        .collect();
    section
}

fn drop_toc_entries(mut subsection: Subsection) -> Subsection {
    let before = subsection.lines.len();
    subsection.lines.retain(|line| !is_toc_entry(&line.clean_text()));
    if subsection.lines.len() < before {
        tracing::debug!("Removed {} table of contents lines", before - subsection.lines.len());
    }
    subsection
}

// --- OCR repair ---

/// Repairs every line and feeds the tree back through header detection, so
/// that headers hidden by recognition noise split their sections out.
/// Strokes then go to the subsection their position falls in.
fn rescan_repaired(tree: FdsTree) -> FdsTree {
    let mut builder = TreeBuilder::new();
    let mut strokes = Vec::new();
    for (number, section) in tree {
        builder.section_header(number, section.start_position);
        for (sub_number, subsection) in section.subsections {
            builder.subsection_header(sub_number, subsection.start_position);
            strokes.extend(subsection.strokes);
            for line in subsection.lines {
                builder.push_line(repair_line(line));
            }
        }
    }
    let mut rescanned = builder.finish();
    attach_strokes(&mut rescanned, &strokes);
    rescanned
}

fn repair_line(mut line: Line) -> Line {
    for text in &mut line.texts {
        let repaired = repair_ocr_text(&text.raw_content);
        if repaired != text.raw_content {
            tracing::trace!("OCR repair: '{}' -> '{}'", text.raw_content, repaired);
            *text = Text::new(text.position, repaired);
        }
    }
    line
}

/// Fixes the letter/digit confusions and spacing recognition typically
/// introduces in codes and numbers.
pub fn repair_ocr_text(text: &str) -> String {
    let numbered = SPACED_NUMBERING_RE.replace(text, "$1.$2");

    let tokens: Vec<String> = numbered.split(' ').map(repair_numeric_token).collect();
    let joined = tokens.join(" ");

    // "Pool" or "HOIS" hold no digit and stay words
    let codes = CONFUSED_CODE_RE.replace_all(&joined, |caps: &Captures| {
        if !caps[2].chars().any(|c| c.is_ascii_digit()) {
            return caps[0].to_string();
        }
        format!("{}{}", &caps[1], caps[2].chars().map(confused_digit).collect::<String>())
    });

    SPACED_CODE_RE
        .replace_all(&codes, |caps: &Captures| match caps.get(1) {
            Some(prefix) => format!("{}{}{}{}", prefix.as_str(), &caps[2], &caps[3], &caps[4]),
            None => format!("{}{}", &caps[5], &caps[6]),
        })
        .into_owned()
}

// A token made of digits plus confusable letters, with at least one real
// digit, is a number.
fn repair_numeric_token(token: &str) -> String {
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    let all_numeric = token
        .chars()
        .all(|c| c.is_ascii_digit() || "OolI|SB.,%".contains(c));
    if has_digit && all_numeric {
        token.chars().map(confused_digit).collect()
    } else {
        token.to_string()
    }
}

fn confused_digit(c: char) -> char {
    match c {
        'O' | 'o' => '0',
        'l' | 'I' | '|' => '1',
        'S' => '5',
        'B' => '8',
        other => other,
    }
}

// --- Column bleed ---

fn split_columns(subsection: Subsection, options: &CleanOptions<'_>) -> Subsection {
    if subsection.lines.len() < MIN_COLUMN_LINES {
        return subsection;
    }
    let Some(gutter) = vertical_divider(&subsection, options.stroke_max_proportion)
        .or_else(|| dominant_gutter(options.x_counts))
    else {
        return subsection;
    };
    let boundary = gutter - options.column_tolerance;

    let straddling: Vec<&Line> = subsection
        .lines
        .iter()
        .filter(|line| {
            let left = line.texts.iter().any(|t| t.position.x_proportion < boundary);
            let right = line.texts.iter().any(|t| t.position.x_proportion >= boundary);
            left && right
        })
        .collect();

    let total = subsection.lines.len();
    if straddling.len() < MIN_COLUMN_LINES || (straddling.len() as f64) < COLUMN_SPLIT_RATIO * total as f64 {
        return subsection;
    }
    // Rows carrying a CAS number or hazard codes belong to a table
    if straddling.iter().any(|line| is_table_row(line)) {
        return subsection;
    }
    let straddling: Vec<(String, String)> = straddling
        .into_iter()
        .map(|line| {
            let (left, right): (Vec<&Text>, Vec<&Text>) =
                line.texts.iter().partition(|t| t.position.x_proportion < boundary);
            (join_clean(&left), join_clean(&right))
        })
        .collect();
    // Label/value rows are a table, not two columns of prose
    let labelled = straddling.iter().filter(|(left, _)| left.trim_end().ends_with(':')).count();
    if labelled * 2 >= straddling.len() {
        return subsection;
    }
    let average = |f: fn(&(String, String)) -> usize| straddling.iter().map(f).sum::<usize>() / straddling.len();
    if average(|p| p.0.len()) < MIN_COLUMN_PART_CHARS || average(|p| p.1.len()) < MIN_COLUMN_PART_CHARS {
        return subsection;
    }

    tracing::debug!("Splitting {} interleaved lines at x={:.2}", total, gutter);
    let Subsection { start_position, end_position, lines, strokes } = subsection;
    let mut left_lines = Vec::with_capacity(lines.len());
    let mut right_lines = Vec::new();
    for line in lines {
        let end = line.end_position;
        let (left, right): (Vec<Text>, Vec<Text>) =
            line.texts.into_iter().partition(|t| t.position.x_proportion < boundary);
        let right_line = Line::new(right, end);
        let left_end = if right_line.is_some() { None } else { end };
        left_lines.extend(Line::new(left, left_end));
        right_lines.extend(right_line);
    }
    left_lines.extend(right_lines);

    Subsection { start_position, end_position, lines: left_lines, strokes }
}

fn is_table_row(line: &Line) -> bool {
    find_cas(&line.clean_text()).is_some() || !scan_codes(&line.raw_text()).is_empty()
}

fn join_clean(texts: &[&Text]) -> String {
    texts.iter().map(|t| t.clean_content.as_str()).collect::<Vec<_>>().join(" ")
}

// Vertical rule in the middle band closest to the page centre.
fn vertical_divider(subsection: &Subsection, max_proportion: f64) -> Option<f64> {
    subsection
        .strokes
        .iter()
        .filter(|s| s.kind(max_proportion) == Some(StrokeKind::Vertical))
        .map(|s| s.start_position.x_proportion)
        .filter(|x| *x > GUTTER_BAND.0 && *x < GUTTER_BAND.1)
        .min_by(|a, b| (a - 0.5).abs().total_cmp(&(b - 0.5).abs()))
}

// Most frequent text start in the middle band; leftmost wins ties.
fn dominant_gutter(x_counts: &XCounts) -> Option<f64> {
    let (low, high) = (x_bucket(GUTTER_BAND.0), x_bucket(GUTTER_BAND.1));
    let mut best: Option<(u32, usize)> = None;
    for (&bucket, &count) in x_counts.range(low..=high) {
        if count >= MIN_GUTTER_HITS && best.map_or(true, |(_, c)| count > c) {
            best = Some((bucket, count));
        }
    }
    best.map(|(bucket, _)| bucket as f64 / 100.0)
}
