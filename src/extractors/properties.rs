// src/extractors/properties.rs
use super::{is_label_value, strip_separator, RuleContext};
use crate::models::{Comparison, ExtractedField, Line, Measure, PhysicalState, VaporPressure};
use crate::utils::text::parse_decimal;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

// --- Labels (section 9) ---

static PHYSICAL_STATE_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:etat physique|physical state|etat)\b").expect("Failed to compile PHYSICAL_STATE_LABEL_RE")
});

static APPEARANCE_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:aspect|apparence|appearance|forme|form)\b").expect("Failed to compile APPEARANCE_LABEL_RE")
});

static BOILING_POINT_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:point (?:initial )?d'ebullition|temperature d'ebullition|intervalle d'ebullition|(?:initial )?boiling (?:point|range))",
    )
    .expect("Failed to compile BOILING_POINT_LABEL_RE")
});

static VAPOR_PRESSURE_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:pression de vapeur|tension de vapeur|vapou?r pressure)").expect("Failed to compile VAPOR_PRESSURE_LABEL_RE")
});

// --- Values ---

static STATE_VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(liquides?|liquid|fluides?|solides?|solid|poudre|powder|cristaux|crystals?|granul\w*|gaz|gas|gazeux|gaseous)\b")
        .expect("Failed to compile STATE_VALUE_RE")
});

const OPERATOR: &str = r"(?P<op><=|>=|[<>~\u{2264}\u{2265}]|sup[eé]rieure? ou [eé]gale? [aà]|inf[eé]rieure? ou [eé]gale? [aà]|sup[eé]rieure? [aà]|inf[eé]rieure? [aà]|greater than|more than|above|less than|below|env(?:iron)?\.?|approx(?:imately|\.)?|ca\.)?";
const NUMBER: &str = r"(?P<value>-?\d+(?:[.,]\d+)?(?:\s?[eE]\s?-?\d+)?)";
// Lower bound of a range ("100 - 120") is the value
const RANGE_TAIL: &str = r"(?:\s*(?:-|a|to)\s*-?\d+(?:[.,]\d+)?)?";

static TEMPERATURE_RE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"(?i){op}\s*{num}{range}\s*(?P<unit>[°º]\s?[CFK]\b|degr[eé]s?\s?C\b|K\b)",
        op = OPERATOR,
        num = NUMBER,
        range = RANGE_TAIL
    );
    Regex::new(&pattern).expect("Failed to compile TEMPERATURE_RE")
});

static PRESSURE_RE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"(?i){op}\s*{num}{range}\s*(?P<unit>(?-i:MPa|mPa)|hpa|kpa|pa|mbar|bar|mm\s?hg|torr|atm|psi)\b",
        op = OPERATOR,
        num = NUMBER,
        range = RANGE_TAIL
    );
    Regex::new(&pattern).expect("Failed to compile PRESSURE_RE")
});

static NO_DATA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:non (?:disponible|applicable|determinee?|pertinente?)|pas de donnees|aucune donnee|not (?:available|applicable|determined)|no data|n/?a\b|nd\b)")
        .expect("Failed to compile NO_DATA_RE")
});

// "mPa.s", "mPa·s": a dynamic viscosity, not a pressure
static VISCOSITY_TAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s?[.\u{b7}*\u{d7}/]\s?s\b").expect("Failed to compile VISCOSITY_TAIL_RE"));

/// Physical state from section 9, preferring an explicit state label over
/// the appearance description.
pub fn extract_physical_state(ctx: &RuleContext<'_>) -> Option<ExtractedField<PhysicalState>> {
    let lines = ctx.section_lines(9);
    [&*PHYSICAL_STATE_LABEL_RE, &*APPEARANCE_LABEL_RE].into_iter().find_map(|label| {
        labelled_candidates(&lines, label).into_iter().find_map(|(text, line)| {
            let caps = STATE_VALUE_RE.captures(&text)?;
            Some(ExtractedField::from_line(parse_state(&caps[1])?, line))
        })
    })
}

pub fn extract_boiling_point(ctx: &RuleContext<'_>) -> Option<ExtractedField<Measure>> {
    let lines = ctx.section_lines(9);
    labelled_candidates(&lines, &BOILING_POINT_LABEL_RE)
        .into_iter()
        .find_map(|(text, line)| Some(ExtractedField::from_line(parse_temperature(&text)?, line)))
}

/// Vapor pressure with the temperature it was measured at, when given
/// ("23 hPa a 20 °C", "(20 °C) : 23 hPa").
pub fn extract_vapor_pressure(ctx: &RuleContext<'_>) -> Option<ExtractedField<VaporPressure>> {
    let lines = ctx.section_lines(9);
    labelled_candidates(&lines, &VAPOR_PRESSURE_LABEL_RE)
        .into_iter()
        .find_map(|(text, line)| {
            let pressure = parse_pressure(&text)?;
            let temperature = parse_temperature(&text);
            Some(ExtractedField::from_line(VaporPressure { pressure, temperature }, line))
        })
}

/// Text following each occurrence of the label. The next line is a
/// candidate only when the label line carries neither a figure nor a
/// "no data" statement, and the next line is not another label/value row.
fn labelled_candidates<'a>(lines: &[&'a Line], label: &Regex) -> Vec<(String, &'a Line)> {
    let mut candidates = Vec::new();
    for (index, &line) in lines.iter().enumerate() {
        let text = line.clean_text();
        let Some(m) = label.find(&text) else {
            continue;
        };
        let value = strip_separator(&text[m.end()..]);
        if !value.is_empty() {
            candidates.push((value.to_string(), line));
        }
        if value.chars().any(|c| c.is_ascii_digit()) || NO_DATA_RE.is_match(value) {
            continue;
        }
        if let Some(&next) = lines.get(index + 1) {
            let next_text = next.clean_text();
            if !next_text.is_empty() && !is_label_value(&next_text) {
                candidates.push((next_text, next));
            }
        }
    }
    candidates
}

fn parse_state(word: &str) -> Option<PhysicalState> {
    let word = word.to_lowercase();
    if word.starts_with("liquid") || word.starts_with("fluide") {
        Some(PhysicalState::Liquid)
    } else if word.starts_with("gaz") || word.starts_with("gas") {
        Some(PhysicalState::Gas)
    } else if ["solid", "poudre", "powder", "crista", "crysta", "granul"].iter().any(|p| word.starts_with(p)) {
        Some(PhysicalState::Solid)
    } else {
        None
    }
}

pub fn parse_temperature(text: &str) -> Option<Measure> {
    TEMPERATURE_RE.captures_iter(text).find_map(|caps| measure(&caps, temperature_unit))
}

pub fn parse_pressure(text: &str) -> Option<Measure> {
    PRESSURE_RE.captures_iter(text).find_map(|caps| {
        let unit = caps.name("unit")?;
        if VISCOSITY_TAIL_RE.is_match(&text[unit.end()..]) {
            return None;
        }
        measure(&caps, pressure_unit)
    })
}

fn measure(caps: &Captures<'_>, unit: fn(&str) -> Option<String>) -> Option<Measure> {
    Some(Measure {
        operator: caps.name("op").and_then(|m| parse_operator(m.as_str())),
        value: parse_decimal(caps.name("value")?.as_str())?,
        unit: unit(caps.name("unit")?.as_str())?,
    })
}

fn temperature_unit(raw: &str) -> Option<String> {
    let scale = raw.chars().rev().find(|c| c.is_ascii_alphabetic())?.to_ascii_uppercase();
    match scale {
        'C' | 'F' | 'K' => Some(format!("\u{b0}{}", scale)),
        _ => None,
    }
}

fn pressure_unit(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact == "MPa" || compact == "mPa" {
        return Some(compact);
    }
    let unit = match compact.to_lowercase().as_str() {
        "hpa" => "hPa",
        "kpa" => "kPa",
        "pa" => "Pa",
        "mbar" => "mbar",
        "bar" => "bar",
        "mmhg" => "mmHg",
        "torr" => "Torr",
        "atm" => "atm",
        "psi" => "psi",
        _ => return None,
    };
    Some(unit.to_string())
}

fn parse_operator(raw: &str) -> Option<Comparison> {
    let raw = raw.trim().to_lowercase();
    let operator = match raw.as_str() {
        "<" => Comparison::Lower,
        "<=" | "\u{2264}" => Comparison::LowerOrEqual,
        ">" => Comparison::Greater,
        ">=" | "\u{2265}" => Comparison::GreaterOrEqual,
        "~" => Comparison::About,
        "greater than" | "more than" | "above" => Comparison::Greater,
        "less than" | "below" => Comparison::Lower,
        text if text.starts_with("env") || text.starts_with("approx") || text == "ca." => Comparison::About,
        text if text.starts_with("sup") && text.contains(" ou ") => Comparison::GreaterOrEqual,
        text if text.starts_with("sup") => Comparison::Greater,
        text if text.starts_with("inf") && text.contains(" ou ") => Comparison::LowerOrEqual,
        text if text.starts_with("inf") => Comparison::Lower,
        _ => return None,
    };
    Some(operator)
}
