// src/utils/text.rs
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

// A last token made only of single letters each followed by a dot ("S.A.S.", "B.V.")
static ABBREVIATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\p{L}\.)+$").expect("Failed to compile ABBREVIATION_RE")
});

/// Normalizes raw page text for pattern matching: diacritics stripped,
/// typographic quotes and exotic spaces folded to ASCII, whitespace collapsed.
/// Case is kept.
pub fn clean(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_whitespace() || c.is_control() {
            pending_space = true;
            continue;
        }
        if pending_space && !cleaned.is_empty() {
            cleaned.push(' ');
        }
        pending_space = false;
        match c {
            '\u{2018}' | '\u{2019}' | '\u{02bc}' | '`' | '\u{b4}' => cleaned.push('\''),
            '\u{201c}' | '\u{201d}' | '\u{ab}' | '\u{bb}' => cleaned.push('"'),
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => cleaned.push('-'),
            '\u{153}' => cleaned.push_str("oe"),
            '\u{152}' => cleaned.push_str("OE"),
            '\u{e6}' => cleaned.push_str("ae"),
            '\u{c6}' => cleaned.push_str("AE"),
            _ => cleaned.push(c),
        }
    }

    cleaned
}

/// Key used to test a line against header tables.
pub fn header_key(text: &str) -> String {
    clean(text).to_lowercase()
}

/// Trims whitespace and one trailing period, unless the period closes a
/// letter-dot abbreviation ("S.A.S.").
pub fn trim_and_clean_trailing_dot(value: &str) -> String {
    let trimmed = value.trim();
    let Some(without_dot) = trimmed.strip_suffix('.') else {
        return trimmed.to_string();
    };

    let last_token = trimmed.rsplit(char::is_whitespace).next().unwrap_or(trimmed);
    if ABBREVIATION_RE.is_match(last_token) {
        return trimmed.to_string();
    }

    without_dot.trim_end().to_string()
}

/// Parses "1,5" or "1.5" (and a leading minus) as a number.
pub fn parse_decimal(value: &str) -> Option<f64> {
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    normalized.parse::<f64>().ok()
}
