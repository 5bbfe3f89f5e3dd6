// src/extractors/codes.rs

// --- Imports ---
use crate::models::{ExtractedField, Line, Metadata};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Family of a hazard or precaution code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    /// Suffixed CLP statements that do not fit the 3-digit form (H350i, H360FD, ...)
    Custom,
    Hazard,
    Precaution,
    /// EU supplemental statements (EUH208, EUH066, ...)
    European,
    /// Australian supplemental statements
    Australian,
}

// Order is match priority: custom codes before the generic H form they start with.
static CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b(?:
            (?P<custom>H\s?3(?:50i|60(?:FD|Fd|Df|F|D)|61(?:fd|f|d)))
          | (?P<european>EUH\s?\d{3}[A-Za-z]?)
          | (?P<australian>AUH\s?\d{3})
          | (?P<hazard>H\s?\d{3}(?:\s?\+\s?H\s?\d{3})*)
          | (?P<precaution>P\s?\d{3}(?:\s?\+\s?P\s?\d{3})*)
        )\b",
    )
    .expect("Failed to compile CODE_RE")
});

/// Finds the codes in a piece of text, normalized (no inner spaces, `+`
/// joins kept), in order of appearance.
pub fn scan_codes(text: &str) -> Vec<(CodeKind, String)> {
    CODE_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let (kind, m) = [
                (CodeKind::Custom, "custom"),
                (CodeKind::European, "european"),
                (CodeKind::Australian, "australian"),
                (CodeKind::Hazard, "hazard"),
                (CodeKind::Precaution, "precaution"),
            ]
            .into_iter()
            .find_map(|(kind, name)| caps.name(name).map(|m| (kind, m)))?;

            let code = normalize_code(m.as_str());
            // "EU H208", "EU-H208": the H code is the tail of an EUH statement
            if kind == CodeKind::Hazard && preceded_by_eu(text, m.start()) {
                return Some((CodeKind::European, format!("EU{}", code)));
            }
            Some((kind, code))
        })
        .collect()
}

fn normalize_code(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

fn preceded_by_eu(text: &str, start: usize) -> bool {
    let before = &text[..start];
    let before = before.strip_suffix(|c: char| c == ' ' || c == '-').unwrap_or(before);
    match before.strip_suffix("EU") {
        Some(prefix) => !prefix.ends_with(char::is_alphanumeric),
        None => false,
    }
}

/// Codes of one text fragment, all carrying the fragment's provenance.
pub fn codes_in_text(text: &str, metadata: Metadata) -> Vec<ExtractedField<String>> {
    scan_codes(text)
        .into_iter()
        .map(|(_, code)| ExtractedField::new(code, metadata))
        .collect()
}

/// All codes in the lines, each tagged with its source line, de-duplicated
/// by code value (first occurrence wins).
pub fn find_codes<'a>(lines: impl IntoIterator<Item = &'a Line>) -> Vec<ExtractedField<String>> {
    dedupe(
        lines
            .into_iter()
            .flat_map(|line| codes_in_text(&line.raw_text(), line.metadata()))
            .collect(),
    )
}

pub fn dedupe(codes: Vec<ExtractedField<String>>) -> Vec<ExtractedField<String>> {
    let mut seen = HashSet::new();
    codes.into_iter().filter(|code| seen.insert(code.value.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Position, Text};

    fn line(y: f64, text: &str) -> Line {
        Line::new(vec![Text::new(Position { page_number: 1, x_proportion: 0.1, y_proportion: y }, text)], None).unwrap()
    }

    #[test]
    fn test_euh_is_not_a_hazard_code() {
        let codes = scan_codes("EUH208 Contient de la 1,2-benzisothiazol-3(2H)-one.");
        assert_eq!(codes, vec![(CodeKind::European, "EUH208".to_string())]);
        assert!(!codes.iter().any(|(kind, _)| *kind == CodeKind::Hazard));
    }

    #[test]
    fn test_separated_eu_prefix() {
        assert_eq!(scan_codes("EU-H208"), vec![(CodeKind::European, "EUH208".to_string())]);
        assert_eq!(scan_codes("EU H066"), vec![(CodeKind::European, "EUH066".to_string())]);
    }

    #[test]
    fn test_code_families() {
        let codes = scan_codes("H225, H 319, H360FD, H350i, P305 + P351 + P338, AUH019, EUH066");
        assert_eq!(
            codes,
            vec![
                (CodeKind::Hazard, "H225".to_string()),
                (CodeKind::Hazard, "H319".to_string()),
                (CodeKind::Custom, "H360FD".to_string()),
                (CodeKind::Custom, "H350i".to_string()),
                (CodeKind::Precaution, "P305+P351+P338".to_string()),
                (CodeKind::Australian, "AUH019".to_string()),
                (CodeKind::European, "EUH066".to_string()),
            ]
        );
    }

    #[test]
    fn test_codes_inside_words_are_ignored() {
        assert!(scan_codes("pH 7, MH2250 flacon, CH300").is_empty());
    }

    #[test]
    fn test_find_codes_dedupes_first_seen_wins() {
        let lines = [line(0.1, "H225 Liquide et vapeurs"), line(0.2, "H319 Irritant"), line(0.3, "H225")];
        let codes = find_codes(&lines);
        assert_eq!(codes.iter().map(|c| c.value.as_str()).collect::<Vec<_>>(), vec!["H225", "H319"]);
        assert_eq!(codes[0].metadata.start_box.y_proportion, 0.1);
    }
}
