// src/models.rs
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Location of an element relative to its page origin (top-left), as proportions
/// of the page width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub page_number: u32,
    pub x_proportion: f64,
    pub y_proportion: f64,
}

impl Position {
    /// Builds a position from page coordinates, clamping to the page.
    pub fn from_coordinates(page_number: u32, x: f64, y: f64, page: &PageDimension) -> Self {
        Self {
            page_number,
            x_proportion: proportion(x, page.width),
            y_proportion: proportion(y, page.height),
        }
    }

    /// Document reading order: page, then top-to-bottom, then left-to-right.
    pub fn reading_cmp(&self, other: &Position) -> Ordering {
        self.page_number
            .cmp(&other.page_number)
            .then(self.y_proportion.total_cmp(&other.y_proportion))
            .then(self.x_proportion.total_cmp(&other.x_proportion))
    }

    pub fn precedes(&self, other: &Position) -> bool {
        self.reading_cmp(other) == Ordering::Less
    }
}

fn proportion(value: f64, extent: f64) -> f64 {
    if extent <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / extent).clamp(0.0, 1.0)
}

/// Resolved page size in PDF user space units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimension {
    pub width: f64,
    pub height: f64,
}

/// An atomic run of characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Text {
    pub position: Position,
    pub raw_content: String,
    #[serde(default)]
    pub clean_content: String,
}

impl Text {
    pub fn new(position: Position, raw_content: impl Into<String>) -> Self {
        let raw_content = raw_content.into();
        let clean_content = crate::utils::text::clean(&raw_content);
        Self { position, raw_content, clean_content }
    }
}

/// One visually contiguous row of text runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub start_position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_position: Option<Position>,
    pub texts: Vec<Text>,
}

impl Line {
    pub fn new(texts: Vec<Text>, end_position: Option<Position>) -> Option<Self> {
        let start_position = texts.first()?.position;
        Some(Self { start_position, end_position, texts })
    }

    pub fn raw_text(&self) -> String {
        join_runs(self.texts.iter().map(|t| t.raw_content.as_str()))
    }

    pub fn clean_text(&self) -> String {
        join_runs(self.texts.iter().map(|t| t.clean_content.as_str()))
    }

    pub fn metadata(&self) -> Metadata {
        Metadata { start_box: self.start_position, end_box: self.end_position }
    }
}

fn join_runs<'a>(runs: impl Iterator<Item = &'a str>) -> String {
    let mut joined = String::new();
    for run in runs.map(str::trim).filter(|r| !r.is_empty()) {
        if !joined.is_empty() {
            joined.push(' ');
        }
        joined.push_str(run);
    }
    joined
}

/// A ruled line drawn on the page (table borders, column separators).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub start_position: Position,
    pub end_position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeKind {
    Horizontal,
    Vertical,
}

impl Stroke {
    pub fn width(&self) -> f64 {
        (self.end_position.x_proportion - self.start_position.x_proportion).abs()
    }

    pub fn height(&self) -> f64 {
        (self.end_position.y_proportion - self.start_position.y_proportion).abs()
    }

    /// A stroke is horizontal (vertical) when its height (width) stays under
    /// `max_proportion` of the page and it is longer than it is thick.
    /// Anything else is an area fill, not a rule.
    pub fn kind(&self, max_proportion: f64) -> Option<StrokeKind> {
        let (width, height) = (self.width(), self.height());
        if height <= max_proportion && width > height {
            Some(StrokeKind::Horizontal)
        } else if width <= max_proportion && height > width {
            Some(StrokeKind::Vertical)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subsection {
    pub start_position: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_position: Option<Position>,
    pub lines: Vec<Line>,
    pub strokes: Vec<Stroke>,
}

impl Subsection {
    pub fn open(start_position: Position) -> Self {
        Self { start_position, end_position: None, lines: Vec::new(), strokes: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.strokes.is_empty()
    }

    /// True when `position` falls in `[start, end)`; an open end extends to
    /// the end of the document.
    pub fn contains(&self, position: &Position) -> bool {
        !position.precedes(&self.start_position)
            && self.end_position.map_or(true, |end| position.precedes(&end))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub start_position: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_position: Option<Position>,
    pub subsections: BTreeMap<u32, Subsection>,
}

impl Section {
    pub fn open(start_position: Position) -> Self {
        Self { start_position, end_position: None, subsections: BTreeMap::new() }
    }

    /// All lines of the section in reading order.
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.subsections.values().flat_map(|s| s.lines.iter())
    }
}

/// Section number -> section, ascending.
pub type FdsTree = BTreeMap<u32, Section>;

/// Provenance of an extracted value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub start_box: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_box: Option<Position>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedField<T> {
    pub value: T,
    pub metadata: Metadata,
}

impl<T> ExtractedField<T> {
    pub fn new(value: T, metadata: Metadata) -> Self {
        Self { value, metadata }
    }

    pub fn from_line(value: T, line: &Line) -> Self {
        Self::new(value, line.metadata())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningNotice {
    Danger,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhysicalState {
    Liquid,
    Solid,
    Gas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    Lower,
    #[serde(rename = "<=")]
    LowerOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "~")]
    About,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<Comparison>,
    pub value: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaporPressure {
    pub pressure: Measure,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Measure>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Substance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cas: Option<ExtractedField<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ce: Option<ExtractedField<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concentration: Option<ExtractedField<String>>,
    pub dangers: Vec<ExtractedField<String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<ExtractedField<chrono::NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ExtractedField<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<ExtractedField<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_notice: Option<ExtractedField<WarningNotice>>,
    pub dangers: Vec<ExtractedField<String>>,
    pub substances: Vec<Substance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_state: Option<ExtractedField<PhysicalState>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vapor_pressure: Option<ExtractedField<VaporPressure>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boiling_point: Option<ExtractedField<Measure>>,
}

/// What the pipeline hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutput {
    pub data_extracted: ExtractedData,
    pub from_image: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(page: u32, x: f64, y: f64) -> Position {
        Position { page_number: page, x_proportion: x, y_proportion: y }
    }

    #[test]
    fn test_position_from_coordinates_is_clamped() {
        let page = PageDimension { width: 600.0, height: 800.0 };
        let inside = Position::from_coordinates(1, 300.0, 200.0, &page);
        assert_eq!(inside.x_proportion, 0.5);
        assert_eq!(inside.y_proportion, 0.25);

        let outside = Position::from_coordinates(1, -20.0, 900.0, &page);
        assert_eq!(outside.x_proportion, 0.0);
        assert_eq!(outside.y_proportion, 1.0);
    }

    #[test]
    fn test_reading_order() {
        assert!(pos(1, 0.9, 0.1).precedes(&pos(1, 0.1, 0.2)));
        assert!(pos(1, 0.1, 0.9).precedes(&pos(2, 0.1, 0.1)));
        assert!(pos(1, 0.1, 0.5).precedes(&pos(1, 0.2, 0.5)));
        assert!(!pos(1, 0.2, 0.5).precedes(&pos(1, 0.2, 0.5)));
    }

    #[test]
    fn test_stroke_kind() {
        let horizontal = Stroke { start_position: pos(1, 0.1, 0.5), end_position: pos(1, 0.9, 0.501) };
        let vertical = Stroke { start_position: pos(1, 0.5, 0.1), end_position: pos(1, 0.502, 0.6) };
        let area = Stroke { start_position: pos(1, 0.1, 0.1), end_position: pos(1, 0.4, 0.3) };
        assert_eq!(horizontal.kind(0.01), Some(StrokeKind::Horizontal));
        assert_eq!(vertical.kind(0.01), Some(StrokeKind::Vertical));
        assert_eq!(area.kind(0.01), None);
    }

    #[test]
    fn test_line_text_joins_runs() {
        let line = Line::new(
            vec![Text::new(pos(1, 0.1, 0.1), " Point d'\u{e9}bullition "), Text::new(pos(1, 0.5, 0.1), "100 \u{b0}C")],
            None,
        )
        .unwrap();
        assert_eq!(line.raw_text(), "Point d'\u{e9}bullition 100 \u{b0}C");
        assert_eq!(line.clean_text(), "Point d'ebullition 100 \u{b0}C");
    }

    #[test]
    fn test_extracted_field_serializes_with_metadata() {
        let field = ExtractedField::new(
            "ACME".to_string(),
            Metadata { start_box: pos(1, 0.1, 0.2), end_box: None },
        );
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["value"], "ACME");
        assert_eq!(json["metadata"]["startBox"]["pageNumber"], 1);
        assert!(json["metadata"].get("endBox").is_none());
    }
}
