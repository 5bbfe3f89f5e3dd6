// src/extractors/dates.rs
use crate::models::ExtractedField;
use crate::tree::FullText;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

// French and English month names and their usual abbreviations (diacritics stripped).
const MONTH_NAMES: [(&str, u32); 41] = [
    ("janvier", 1), ("janv", 1), ("january", 1), ("jan", 1),
    ("fevrier", 2), ("fevr", 2), ("fev", 2), ("february", 2), ("feb", 2),
    ("mars", 3), ("march", 3), ("mar", 3),
    ("avril", 4), ("avr", 4), ("april", 4), ("apr", 4),
    ("mai", 5), ("may", 5),
    ("juin", 6), ("june", 6), ("jun", 6),
    ("juillet", 7), ("juil", 7), ("july", 7), ("jul", 7),
    ("aout", 8), ("august", 8), ("aug", 8),
    ("septembre", 9), ("september", 9), ("sept", 9), ("sep", 9),
    ("octobre", 10), ("october", 10), ("oct", 10),
    ("novembre", 11), ("november", 11), ("nov", 11),
    ("decembre", 12), ("december", 12), ("dec", 12),
];

static MONTHS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| MONTH_NAMES.iter().copied().collect());

static MONTH_ALTERNATION: Lazy<String> = Lazy::new(|| {
    let mut names: Vec<&str> = MONTHS.keys().copied().collect();
    // Longest first so "septembre" wins over "sept"
    names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    names.join("|")
});

static DATE_PATTERNS: Lazy<Vec<(DateShape, Regex)>> = Lazy::new(|| {
    let months = MONTH_ALTERNATION.as_str();
    [
        (DateShape::YearMonthDay, r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b".to_string()),
        (DateShape::DayMonthYear, r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})\b".to_string()),
        (DateShape::DayNamedMonthYear, format!(r"(?i)\b(\d{{1,2}})(?:er)?\s+({})\.?\s+(\d{{4}})\b", months)),
        (DateShape::NamedMonthDayYear, format!(r"(?i)\b({})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b", months)),
    ]
    .into_iter()
    .map(|(shape, pattern)| (shape, Regex::new(&pattern).expect("Failed to compile date pattern")))
    .collect()
});

static REVISION_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:date de (?:la )?(?:revision|mise a jour)|revision date|date of revision|revise le|mise a jour|revision|revised|last updated?)\b")
        .expect("Failed to compile REVISION_LABEL_RE")
});

static DATE_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:date|edition|emission|issued?|version|printed|imprime)\b")
        .expect("Failed to compile DATE_LABEL_RE")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateShape {
    YearMonthDay,
    DayMonthYear,
    DayNamedMonthYear,
    NamedMonthDayYear,
}

/// Sheet date: the first revision-labelled date of the document, else the
/// first date introduced by any other date label.
pub fn extract_date(full_text: &FullText) -> Option<ExtractedField<NaiveDate>> {
    let text = full_text.clean();
    let mut fallback = None;
    let mut offset = 0;

    let lines: Vec<&str> = text.split('\n').collect();
    for (index, line) in lines.iter().enumerate() {
        let line_offset = offset;
        offset += line.len() + 1;

        for (label_re, revision) in [(&*REVISION_LABEL_RE, true), (&*DATE_LABEL_RE, false)] {
            let Some(label) = label_re.find(line) else {
                continue;
            };
            // Value after the label, or alone on the next line
            let found = first_date(&line[label.end()..])
                .map(|(date, start)| (date, line_offset + label.end() + start))
                .or_else(|| {
                    let next = lines.get(index + 1)?;
                    first_date(next)
                        .filter(|(_, start)| *start == 0)
                        .map(|(date, _)| (date, line_offset + line.len() + 1))
                });
            let Some((date, at)) = found else {
                continue;
            };
            let Some(metadata) = full_text.locate_clean(at) else {
                continue;
            };
            if revision {
                tracing::debug!("Revision date {} found", date);
                return Some(ExtractedField::new(date, metadata));
            }
            if fallback.is_none() {
                fallback = Some(ExtractedField::new(date, metadata));
            }
            break;
        }
    }
    fallback
}

/// Earliest valid calendar date in the text, with its byte offset.
fn first_date(text: &str) -> Option<(NaiveDate, usize)> {
    DATE_PATTERNS
        .iter()
        .flat_map(|(shape, re)| {
            re.captures_iter(text)
                .filter_map(move |caps| Some((to_date(*shape, &caps)?, caps.get(0)?.start())))
        })
        .min_by_key(|(_, start)| *start)
}

fn to_date(shape: DateShape, caps: &Captures<'_>) -> Option<NaiveDate> {
    let number = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();
    let month_name = |i: usize| MONTHS.get(caps.get(i)?.as_str().to_lowercase().as_str()).copied();

    let (year, month, day) = match shape {
        DateShape::YearMonthDay => (number(1)?, number(2)?, number(3)?),
        DateShape::DayMonthYear => (number(3)?, number(2)?, number(1)?),
        DateShape::DayNamedMonthYear => (number(3)?, month_name(2)?, number(1)?),
        DateShape::NamedMonthDayYear => (number(3)?, month_name(1)?, number(2)?),
    };
    let year = if year < 100 { 2000 + year } else { year };
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Line, Position, Text};

    fn full_text(lines: &[&str]) -> FullText {
        let mut full_text = FullText::default();
        for (i, text) in lines.iter().enumerate() {
            let position = Position { page_number: 1, x_proportion: 0.1, y_proportion: i as f64 * 0.05 };
            full_text.push_line(&Line::new(vec![Text::new(position, *text)], None).unwrap());
        }
        full_text
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_revision_date_wins_over_earlier_dates() {
        let text = full_text(&[
            "Date d'impression : 01/02/2023",
            "Version 3.0",
            "Date de révision : 12/03/2021",
        ]);
        let found = extract_date(&text).unwrap();
        assert_eq!(found.value, date(2021, 3, 12));
        assert_eq!(found.metadata.start_box.y_proportion, 0.1);
    }

    #[test]
    fn test_labelled_date_fallback() {
        let text = full_text(&["FICHE DE DONNEES DE SECURITE", "Date d'émission : 5 mars 2020"]);
        assert_eq!(extract_date(&text).unwrap().value, date(2020, 3, 5));
    }

    #[test]
    fn test_date_formats() {
        let cases = [
            ("Revision date: 2021-03-12", date(2021, 3, 12)),
            ("Revision date: March 12, 2021", date(2021, 3, 12)),
            ("Revision date: 12 September 2021", date(2021, 9, 12)),
            ("Mise à jour : 1er juillet 2019", date(2019, 7, 1)),
            ("Révision : 12.03.21", date(2021, 3, 12)),
            ("Date de révision : 12-03-2021", date(2021, 3, 12)),
        ];
        for (line, expected) in cases {
            assert_eq!(extract_date(&full_text(&[line])).map(|d| d.value), Some(expected), "line: {}", line);
        }
    }

    #[test]
    fn test_date_on_next_line() {
        let text = full_text(&["Date de révision", "12/03/2021"]);
        let found = extract_date(&text).unwrap();
        assert_eq!(found.value, date(2021, 3, 12));
        assert_eq!(found.metadata.start_box.y_proportion, 0.05);
    }

    #[test]
    fn test_invalid_and_unlabelled_dates_are_skipped() {
        assert!(extract_date(&full_text(&["Révision : 31/02/2021"])).is_none());
        assert!(extract_date(&full_text(&["Lot 12/03/2021"])).is_none());
    }
}
