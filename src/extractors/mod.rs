// src/extractors/mod.rs
pub mod codes;
pub mod dates;
pub mod identification;
pub mod notice;
pub mod properties;
pub mod substances;

use crate::models::{ExtractedData, ExtractedField, FdsTree, Line, PageDimension};
use crate::tree::FullText;
use once_cell::sync::Lazy;
use regex::Regex;

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub tree: &'a FdsTree,
    pub full_text: &'a FullText,
    pub page_dimension: &'a PageDimension,
    pub column_tolerance: f64,
}

impl<'a> RuleContext<'a> {
    /// Lines of one subsection, empty when it is absent.
    pub fn subsection_lines(&self, section: u32, subsection: u32) -> &'a [Line] {
        self.tree
            .get(&section)
            .and_then(|s| s.subsections.get(&subsection))
            .map(|s| s.lines.as_slice())
            .unwrap_or(&[])
    }

    /// All lines of a section in reading order.
    pub fn section_lines(&self, section: u32) -> Vec<&'a Line> {
        self.tree.get(&section).map(|s| s.lines().collect()).unwrap_or_default()
    }
}

/// Runs every rule over the cleaned tree. A rule that finds nothing leaves
/// its field absent; it never stops the others.
pub fn apply(ctx: &RuleContext<'_>) -> ExtractedData {
    let data = ExtractedData {
        date: dates::extract_date(ctx.full_text),
        product: identification::extract_product(ctx),
        producer: identification::extract_producer(ctx),
        warning_notice: notice::extract_warning_notice(ctx),
        dangers: extract_dangers(ctx),
        substances: substances::extract_substances(ctx),
        physical_state: properties::extract_physical_state(ctx),
        vapor_pressure: properties::extract_vapor_pressure(ctx),
        boiling_point: properties::extract_boiling_point(ctx),
    };

    tracing::info!(
        "Rules done: date={} product={} producer={} notice={} dangers={} substances={} state={} vapor={} boiling={}",
        data.date.is_some(),
        data.product.is_some(),
        data.producer.is_some(),
        data.warning_notice.is_some(),
        data.dangers.len(),
        data.substances.len(),
        data.physical_state.is_some(),
        data.vapor_pressure.is_some(),
        data.boiling_point.is_some()
    );
    data
}

/// Product hazard and precaution codes: label elements (2.2), then
/// classification (2.1), then the whole of section 2.
pub fn extract_dangers(ctx: &RuleContext<'_>) -> Vec<ExtractedField<String>> {
    for subsection in [2, 1] {
        let codes = codes::find_codes(ctx.subsection_lines(2, subsection));
        if !codes.is_empty() {
            tracing::debug!("Found {} codes in 2.{}", codes.len(), subsection);
            return codes;
        }
    }
    codes::find_codes(ctx.section_lines(2))
}

// --- Label/value helpers shared by the rules ---

// "Label : value", where the label is short and the value non-empty.
static LABEL_VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^:]{1,60}:\s*\S").expect("Failed to compile LABEL_VALUE_RE")
});

pub(crate) fn is_label_value(text: &str) -> bool {
    LABEL_VALUE_RE.is_match(text)
}

/// Finds the first line starting with `label` and returns the text after it
/// (separator stripped). When the label stands alone, the value is read
/// from the following line.
pub(crate) fn labelled_value<'a>(lines: &[&'a Line], label: &Regex) -> Option<(String, &'a Line)> {
    for (index, &line) in lines.iter().enumerate() {
        let text = line.clean_text();
        let Some(m) = label.find(&text) else {
            continue;
        };
        let value = strip_separator(&text[m.end()..]);
        if !value.is_empty() {
            return Some((value.to_string(), line));
        }
        if let Some(&next) = lines.get(index + 1) {
            let next_text = next.clean_text();
            if !next_text.is_empty() && !is_label_value(&next_text) {
                return Some((next_text, next));
            }
        }
    }
    None
}

pub(crate) fn strip_separator(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | '=' | '.' | ';'))
        .trim_end()
}


#[cfg(test)]
mod tests {
    use super::test_support::tree;
    use super::*;

    fn context<'a>(tree: &'a FdsTree, full_text: &'a FullText, page: &'a PageDimension) -> RuleContext<'a> {
        RuleContext { tree, full_text, page_dimension: page, column_tolerance: 0.03 }
    }

    #[test]
    fn test_dangers_prefer_label_elements() {
        let tree = tree(&[
            (2, 1, "Flam. Liq. 2, H225"),
            (2, 2, "H225 Liquide"),
            (2, 2, "H319 Irritant"),
            (2, 2, "P210"),
        ]);
        let full_text = FullText::default();
        let page = PageDimension { width: 595.0, height: 842.0 };

        let dangers = extract_dangers(&context(&tree, &full_text, &page));
        assert_eq!(dangers.iter().map(|d| d.value.as_str()).collect::<Vec<_>>(), vec!["H225", "H319", "P210"]);
    }

    #[test]
    fn test_dangers_fall_back_to_whole_section() {
        let tree = tree(&[(2, 0, "H302 Nocif en cas d'ingestion")]);
        let full_text = FullText::default();
        let page = PageDimension { width: 595.0, height: 842.0 };

        let dangers = extract_dangers(&context(&tree, &full_text, &page));
        assert_eq!(dangers.len(), 1);
    }

    #[test]
    fn test_missing_sections_yield_absent_fields() {
        let tree = FdsTree::new();
        let full_text = FullText::default();
        let page = PageDimension { width: 595.0, height: 842.0 };

        let data = apply(&context(&tree, &full_text, &page));
        assert_eq!(data, ExtractedData::default());
    }

    #[test]
    fn test_labelled_value() {
        let lines = [super::test_support::line(0.1, "Fournisseur :"), super::test_support::line(0.2, "ACME S.A.S.")];
        let refs: Vec<&Line> = lines.iter().collect();
        let label = Regex::new(r"(?i)^fournisseur").unwrap();
        let (value, line) = labelled_value(&refs, &label).unwrap();
        assert_eq!(value, "ACME S.A.S.");
        assert_eq!(line.start_position.y_proportion, 0.2);
    }
}
