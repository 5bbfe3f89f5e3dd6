// src/extractors/identification.rs
use super::{is_label_value, labelled_value, RuleContext};
use crate::models::{ExtractedField, Line};
use crate::utils::text::trim_and_clean_trailing_dot;
use once_cell::sync::Lazy;
use regex::Regex;

static PRODUCT_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:nom (?:du produit|commercial|de la substance|du melange)|designation commerciale|product name|trade ?name|nom)\b",
    )
    .expect("Failed to compile PRODUCT_LABEL_RE")
});

static PRODUCER_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:nom (?:de la societe|du fournisseur|du fabricant)|raison sociale|fournisseur|fabricant|distributeur|societe|supplier|manufacturer|distributor|company(?: name)?)\b",
    )
    .expect("Failed to compile PRODUCER_LABEL_RE")
});

// Address and contact lines under the supplier heading.
static CONTACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)@|https?:|www\.|\d{4,}|\b(?:tel|telephone|phone|fax|e-?mail|rue|avenue|boulevard|bd|chemin|route|allee|impasse|cedex|bp|cs|zi|za|zac|street|road|france)\b",
    )
    .expect("Failed to compile CONTACT_RE")
});

/// Product name from the product identifier subsection (1.1).
pub fn extract_product(ctx: &RuleContext<'_>) -> Option<ExtractedField<String>> {
    let lines: Vec<&Line> = ctx.subsection_lines(1, 1).iter().collect();

    if let Some((value, line)) = labelled_value(&lines, &PRODUCT_LABEL_RE) {
        tracing::debug!("Product from label: {}", value);
        return named_field(&value, line);
    }

    let line = lines.iter().find(|line| !is_label_value(&line.clean_text()))?;
    named_field(&line.clean_text(), line)
}

/// Supplier name from the supplier details subsection (1.3).
pub fn extract_producer(ctx: &RuleContext<'_>) -> Option<ExtractedField<String>> {
    let lines: Vec<&Line> = ctx.subsection_lines(1, 3).iter().collect();

    if let Some((value, line)) = labelled_value(&lines, &PRODUCER_LABEL_RE) {
        tracing::debug!("Producer from label: {}", value);
        return named_field(&value, line);
    }

    let line = lines.iter().find(|line| {
        let text = line.clean_text();
        !is_label_value(&text) && !CONTACT_RE.is_match(&text)
    })?;
    named_field(&line.clean_text(), line)
}

fn named_field(value: &str, line: &Line) -> Option<ExtractedField<String>> {
    let value = trim_and_clean_trailing_dot(value);
    (!value.is_empty()).then(|| ExtractedField::from_line(value, line))
}
