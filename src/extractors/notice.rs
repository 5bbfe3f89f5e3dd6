// src/extractors/notice.rs
use super::{labelled_value, RuleContext};
use crate::models::{ExtractedField, Line, WarningNotice};
use once_cell::sync::Lazy;
use regex::Regex;

static NOTICE_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:mention d'avertissement|mot[- ]indicateur|signal word)s?\b")
        .expect("Failed to compile NOTICE_LABEL_RE")
});

// A line holding nothing but the signal word.
static STANDALONE_NOTICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\W*(danger|attention|warning)\W*$").expect("Failed to compile STANDALONE_NOTICE_RE")
});

static NOTICE_VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(danger|attention|warning)\b").expect("Failed to compile NOTICE_VALUE_RE")
});

/// Signal word from the label elements (2.2), falling back to the whole of
/// section 2.
pub fn extract_warning_notice(ctx: &RuleContext<'_>) -> Option<ExtractedField<WarningNotice>> {
    let label_elements: Vec<&Line> = ctx.subsection_lines(2, 2).iter().collect();
    find_notice(&label_elements).or_else(|| find_notice(&ctx.section_lines(2)))
}

fn find_notice(lines: &[&Line]) -> Option<ExtractedField<WarningNotice>> {
    if let Some((value, line)) = labelled_value(lines, &NOTICE_LABEL_RE) {
        let notice = NOTICE_VALUE_RE.captures(&value).and_then(|caps| parse_notice(&caps[1]));
        if let Some(notice) = notice {
            return Some(ExtractedField::from_line(notice, line));
        }
        tracing::debug!("Signal word label without a known value: {}", value);
    }

    lines.iter().find_map(|line| {
        let text = line.clean_text();
        let caps = STANDALONE_NOTICE_RE.captures(&text)?;
        Some(ExtractedField::from_line(parse_notice(&caps[1])?, line))
    })
}

fn parse_notice(word: &str) -> Option<WarningNotice> {
    match word.to_lowercase().as_str() {
        "danger" => Some(WarningNotice::Danger),
        "attention" | "warning" => Some(WarningNotice::Warning),
        _ => None,
    }
}
