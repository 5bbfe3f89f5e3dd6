// src/tree/patterns.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;

// Every pattern below runs against `utils::text::header_key` output:
// lowercase, no diacritics, single spaces.

// --- Section titles (French and English wording of the 16 regulatory sections) ---
const SECTION_TITLES: [(u32, &str); 16] = [
    (1, r"identification"),
    (2, r"identification des dangers|hazards? identification|identification of (?:the )?hazards?"),
    (3, r"composition|informations? sur les composants|information on ingredients"),
    (4, r"premiers secours|first[ -]?aid"),
    (5, r"(?:mesures de )?lutte contre l'incendie|fire[ -]?fighting"),
    (6, r"mesures a prendre en cas de (?:deversement|dispersion|rejet) accidentel|accidental release"),
    (7, r"manipulation|handling"),
    (8, r"controles? de l'exposition|exposure controls?"),
    (9, r"proprietes physiques|physical and chemical"),
    (10, r"stabilite|stability"),
    (11, r"informations toxicologiques|toxicological"),
    (12, r"informations ecologiques|ecological"),
    (13, r"considerations relatives a l'elimination|elimination|disposal"),
    (14, r"informations relatives au transport|transport"),
    (15, r"informations relatives a la reglementation|informations reglementaires|regulatory"),
    (16, r"autres informations|other information"),
];

// --- Subsection titles for the sections the rule engine mines ---
const SUBSECTION_TITLES: [(u32, u32, &str); 11] = [
    (1, 1, r"identificateur de produit|product identifier|nom du produit"),
    (1, 2, r"utilisations? identifiees|relevant identified uses|usages?"),
    (1, 3, r"renseignements concernant le fournisseur|details of the supplier|fournisseur|supplier"),
    (1, 4, r"numero d'appel d'urgence|emergency telephone|urgence|emergency"),
    (2, 1, r"classification"),
    (2, 2, r"elements d'etiquetage|label elements|etiquetage|labell?ing"),
    (2, 3, r"autres dangers|other hazards"),
    (3, 1, r"substances?"),
    (3, 2, r"melanges?|mixtures?"),
    (9, 1, r"informations sur les proprietes physiques|information on basic physical|proprietes physiques"),
    (9, 2, r"autres informations|other information"),
];

// Highest subsection number recognized without a known title.
const MAX_GENERIC_SUBSECTION: u32 = 6;

/// `{number, compiled pattern}`; list order is match priority.
#[derive(Debug)]
pub struct HeaderPattern {
    pub number: u32,
    pub pattern: Regex,
}

#[derive(Debug)]
pub struct SectionPattern {
    pub number: u32,
    pub header: Regex,
    pub subsections: Vec<HeaderPattern>,
}

fn section_header(number: u32, titles: &str) -> Regex {
    let pattern = format!(
        r"^(?:(?:rubrique|section)\s*0?{n}(?:\s*[:)\-]|\.?(?:\s|$))|0?{n}\s*(?:[.:)\-]\s*)?(?:{titles}))",
        n = number,
        titles = titles
    );
    Regex::new(&pattern).expect("Failed to compile section header pattern")
}

fn titled_subsection_header(section: u32, number: u32, titles: &str) -> Regex {
    // Lenient on the separator: OCR output often reads "1.1" as "1,1" or "1 . 1"
    let pattern = format!(r"^0?{s}\s?[.,]\s?0?{k}\.?\s*(?:{titles})", s = section, k = number, titles = titles);
    Regex::new(&pattern).expect("Failed to compile subsection header pattern")
}

fn generic_subsection_header(section: u32, number: u32) -> Regex {
    let pattern = format!(r"^0?{s}\.0?{k}\.?(?:\s+[a-z]|\s*:|\s*$)", s = section, k = number);
    Regex::new(&pattern).expect("Failed to compile subsection header pattern")
}

/// Section header table, ascending section numbers. Each section carries its
/// own subsection table, ascending subsection numbers, titled variant first.
pub static SECTION_PATTERNS: Lazy<Vec<SectionPattern>> = Lazy::new(|| {
    SECTION_TITLES
        .iter()
        .map(|&(number, titles)| {
            let mut subsections = Vec::new();
            for k in 1..=MAX_GENERIC_SUBSECTION {
                if let Some(&(_, _, titles)) = SUBSECTION_TITLES.iter().find(|&&(s, n, _)| s == number && n == k) {
                    subsections.push(HeaderPattern { number: k, pattern: titled_subsection_header(number, k, titles) });
                }
                subsections.push(HeaderPattern { number: k, pattern: generic_subsection_header(number, k) });
            }
            SectionPattern { number, header: section_header(number, titles), subsections }
        })
        .collect()
});

// Table of contents entries: dot leaders then a page number.
static TOC_ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\.{4,}|\u{2026}{2,}|(?:\. ){4,})\s*\d{1,3}\s*$").expect("Failed to compile TOC_ENTRY_RE")
});

/// First section whose header pattern matches the key.
pub fn match_section(key: &str) -> Option<u32> {
    SECTION_PATTERNS
        .iter()
        .find(|section| section.header.is_match(key))
        .map(|section| section.number)
}

/// First subsection of `section` whose header pattern matches the key.
pub fn match_subsection(section: u32, key: &str) -> Option<u32> {
    SECTION_PATTERNS
        .iter()
        .find(|s| s.number == section)?
        .subsections
        .iter()
        .find(|sub| sub.pattern.is_match(key))
        .map(|sub| sub.number)
}

pub fn is_toc_entry(text: &str) -> bool {
    TOC_ENTRY_RE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::text::header_key;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(SECTION_PATTERNS.len(), 16);
        assert!(SECTION_PATTERNS.iter().all(|s| !s.subsections.is_empty()));
    }

    #[test]
    fn test_section_headers() {
        let cases = [
            ("RUBRIQUE 1: Identification de la substance/du mélange et de la société", Some(1)),
            ("SECTION 2: Hazards identification", Some(2)),
            ("2. IDENTIFICATION DES DANGERS", Some(2)),
            ("3 - Composition/informations sur les composants", Some(3)),
            ("Rubrique 9 : Propriétés physiques et chimiques", Some(9)),
            ("SECTION 10: Stability and reactivity", Some(10)),
            ("RUBRIQUE 16. Autres informations", Some(16)),
            ("1.1 Identificateur de produit", None),
            ("Section 1.1", None),
            ("100 % des composants", None),
            ("Voir rubrique 8", None),
        ];
        for (line, expected) in cases {
            assert_eq!(match_section(&header_key(line)), expected, "line: {}", line);
        }
    }

    #[test]
    fn test_subsection_headers() {
        assert_eq!(match_subsection(1, &header_key("1.1 Identificateur de produit")), Some(1));
        assert_eq!(match_subsection(1, &header_key("1.3. Renseignements concernant le fournisseur")), Some(3));
        assert_eq!(match_subsection(2, &header_key("2,2 Eléments d'étiquetage")), Some(2));
        assert_eq!(match_subsection(3, &header_key("3.2 Mélanges")), Some(2));
        assert_eq!(match_subsection(9, &header_key("9.1. Informations sur les propriétés physiques")), Some(1));
        assert_eq!(match_subsection(8, &header_key("8.2 Contrôles de l'exposition")), Some(2));
        // scoped to the active section
        assert_eq!(match_subsection(2, &header_key("1.1 Identificateur de produit")), None);
        // a numeric value is not a header
        assert_eq!(match_subsection(9, &header_key("9,1 g/l")), None);
        assert_eq!(match_subsection(1, &header_key("1.10 Autre")), None);
    }

    #[test]
    fn test_toc_entries() {
        assert!(is_toc_entry("1. Identification ........ 1"));
        assert!(is_toc_entry("9. Proprietes physiques . . . . . 4"));
        assert!(!is_toc_entry("Point d'ebullition : 100 C"));
    }
}
