// src/lines/native.rs

// --- Imports ---
use crate::models::{Line, PageDimension, Position, Stroke, Text};
use pdf_extract::{ColorSpace, Document, MediaBox, OutputDev, OutputError, Path, PathOp, Transform};
use std::panic::{self, AssertUnwindSafe};

// --- Constants ---
// Glyphs whose baselines differ by less than this share of the font size sit on one line.
const SAME_LINE_FACTOR: f64 = 0.4;
// Horizontal gap (in font sizes) after which a new text run starts.
const RUN_GAP_FACTOR: f64 = 1.5;
// Horizontal gap (in font sizes) rendered as a space inside a run.
const SPACE_GAP_FACTOR: f64 = 0.15;

/// Everything the native text layer yields for one page.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub page_number: u32,
    pub dimension: PageDimension,
    pub lines: Vec<Line>,
    pub strokes: Vec<Stroke>,
    /// Non-whitespace characters seen on the page.
    pub text_chars: usize,
}

#[derive(Debug, Clone)]
struct Glyph {
    x: f64,
    baseline: f64,
    end_x: f64,
    size: f64,
    text: String,
}

// Page-space rectangle, top-left origin: (x0, y0, x1, y1)
type Segment = (f64, f64, f64, f64);

struct PageBuilder {
    page_number: u32,
    media_box: (f64, f64, f64, f64),
    glyphs: Vec<Glyph>,
    segments: Vec<Segment>,
}

impl PageBuilder {
    fn dimension(&self) -> PageDimension {
        let (llx, lly, urx, ury) = self.media_box;
        PageDimension { width: (urx - llx).abs(), height: (ury - lly).abs() }
    }

    // Device point -> page point with the origin at the top-left corner.
    fn to_page(&self, x: f64, y: f64) -> (f64, f64) {
        let (llx, _, _, ury) = self.media_box;
        (x - llx, ury - y)
    }
}

/// `OutputDev` that records positioned glyphs and ruled lines instead of
/// rendering text.
pub struct LineCollector {
    stroke_max_proportion: f64,
    current: Option<PageBuilder>,
    pages: Vec<PageContent>,
}

impl LineCollector {
    pub fn new(stroke_max_proportion: f64) -> Self {
        Self { stroke_max_proportion, current: None, pages: Vec::new() }
    }

    /// Finished pages. A page interrupted by a library failure is dropped.
    pub fn finish(self) -> Vec<PageContent> {
        self.pages
    }

    fn push_segments(&mut self, ctm: &Transform, path: &Path, filled: bool) {
        // Filled free-form paths are shapes, only filled rectangles can be rules
        if filled && !path.ops.iter().all(|op| matches!(op, PathOp::Rect(..))) {
            return;
        }
        let Some(page) = self.current.as_mut() else { return };
        let apply = |x: f64, y: f64| -> (f64, f64) {
            let (dx, dy) = (x * ctm.m11 + y * ctm.m21 + ctm.m31, x * ctm.m12 + y * ctm.m22 + ctm.m32);
            page.to_page(dx, dy)
        };

        let mut segments = Vec::new();
        let mut current: Option<(f64, f64)> = None;
        let mut subpath_start: Option<(f64, f64)> = None;
        for op in &path.ops {
            match *op {
                PathOp::MoveTo(x, y) => {
                    current = Some(apply(x, y));
                    subpath_start = current;
                }
                PathOp::LineTo(x, y) => {
                    let to = apply(x, y);
                    if let Some(from) = current {
                        segments.push(bounding(from, to));
                    }
                    current = Some(to);
                }
                PathOp::CurveTo(_, _, _, _, x, y) => current = Some(apply(x, y)),
                PathOp::Rect(x, y, w, h) => {
                    let corners = [apply(x, y), apply(x + w, y), apply(x + w, y + h), apply(x, y + h)];
                    if filled {
                        segments.push(bounding(corners[0], corners[2]));
                    } else {
                        for i in 0..4 {
                            segments.push(bounding(corners[i], corners[(i + 1) % 4]));
                        }
                    }
                }
                PathOp::Close => {
                    if let (Some(from), Some(to)) = (current, subpath_start) {
                        segments.push(bounding(from, to));
                    }
                    current = subpath_start;
                }
            }
        }
        page.segments.extend(segments);
    }
}

fn bounding(a: (f64, f64), b: (f64, f64)) -> Segment {
    (a.0.min(b.0), a.1.min(b.1), a.0.max(b.0), a.1.max(b.1))
}

impl OutputDev for LineCollector {
    fn begin_page(&mut self, page_num: u32, media_box: &MediaBox, _: Option<(f64, f64, f64, f64)>) -> Result<(), OutputError> {
        self.current = Some(PageBuilder {
            page_number: page_num,
            media_box: (media_box.llx, media_box.lly, media_box.urx, media_box.ury),
            glyphs: Vec::new(),
            segments: Vec::new(),
        });
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        if let Some(page) = self.current.take() {
            let content = assemble_page(page, self.stroke_max_proportion);
            tracing::trace!(
                "Page {}: {} lines, {} strokes, {} chars",
                content.page_number,
                content.lines.len(),
                content.strokes.len(),
                content.text_chars
            );
            self.pages.push(content);
        }
        Ok(())
    }

    fn output_character(&mut self, trm: &Transform, width: f64, _spacing: f64, font_size: f64, char: &str) -> Result<(), OutputError> {
        let Some(page) = self.current.as_mut() else { return Ok(()) };

        // Same effective size computation as pdf-extract's plain text output
        let (vx, vy) = (font_size * (trm.m11 + trm.m21), font_size * (trm.m12 + trm.m22));
        let mut size = (vx * vy).abs().sqrt();
        if !size.is_finite() || size <= 0.0 {
            size = font_size.abs().max(1.0);
        }

        let (x, baseline) = page.to_page(trm.m31, trm.m32);
        page.glyphs.push(Glyph { x, baseline, end_x: x + width * size, size, text: char.to_string() });
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn stroke(&mut self, ctm: &Transform, _colorspace: &ColorSpace, _color: &[f64], path: &Path) -> Result<(), OutputError> {
        self.push_segments(ctm, path, false);
        Ok(())
    }

    fn fill(&mut self, ctm: &Transform, _colorspace: &ColorSpace, _color: &[f64], path: &Path) -> Result<(), OutputError> {
        self.push_segments(ctm, path, true);
        Ok(())
    }
}

struct Row {
    baseline: f64,
    size: f64,
    glyphs: Vec<Glyph>,
}

fn assemble_page(page: PageBuilder, stroke_max_proportion: f64) -> PageContent {
    let dimension = page.dimension();
    let page_number = page.page_number;

    let text_chars = page
        .glyphs
        .iter()
        .map(|g| g.text.chars().filter(|c| !c.is_whitespace()).count())
        .sum();

    // Rows are discovered in content stream order, then sorted top-to-bottom.
    let mut rows: Vec<Row> = Vec::new();
    for glyph in page.glyphs.into_iter().filter(|g| !g.text.trim().is_empty()) {
        let row = rows.iter_mut().find(|row| {
            (row.baseline - glyph.baseline).abs() <= SAME_LINE_FACTOR * row.size.max(glyph.size)
        });
        match row {
            Some(row) => {
                row.size = row.size.max(glyph.size);
                row.glyphs.push(glyph);
            }
            None => rows.push(Row { baseline: glyph.baseline, size: glyph.size, glyphs: vec![glyph] }),
        }
    }
    for row in rows.iter_mut() {
        row.glyphs.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    rows.sort_by(|a, b| {
        a.baseline
            .total_cmp(&b.baseline)
            .then(a.glyphs[0].x.total_cmp(&b.glyphs[0].x))
    });

    let lines = rows
        .into_iter()
        .filter_map(|row| row_to_line(row, page_number, &dimension))
        .collect();

    let strokes = page
        .segments
        .iter()
        .map(|&(x0, y0, x1, y1)| Stroke {
            start_position: Position::from_coordinates(page_number, x0, y0, &dimension),
            end_position: Position::from_coordinates(page_number, x1, y1, &dimension),
        })
        .filter(|stroke| stroke.kind(stroke_max_proportion).is_some())
        .collect();

    PageContent { page_number, dimension, lines, strokes, text_chars }
}

fn row_to_line(row: Row, page_number: u32, dimension: &PageDimension) -> Option<Line> {
    let mut texts = Vec::new();
    let mut run = String::new();
    let mut run_start = 0.0;
    let mut previous_end: Option<f64> = None;
    let top = row.baseline - row.size;

    for glyph in &row.glyphs {
        match previous_end {
            Some(end) if glyph.x - end > RUN_GAP_FACTOR * row.size => {
                texts.push(Text::new(Position::from_coordinates(page_number, run_start, top, dimension), run.trim()));
                run.clear();
                run_start = glyph.x;
            }
            Some(end) if glyph.x - end > SPACE_GAP_FACTOR * row.size => run.push(' '),
            Some(_) => {}
            None => run_start = glyph.x,
        }
        run.push_str(&glyph.text);
        previous_end = Some(previous_end.map_or(glyph.end_x, |end| end.max(glyph.end_x)));
    }
    if !run.trim().is_empty() {
        texts.push(Text::new(Position::from_coordinates(page_number, run_start, top, dimension), run.trim()));
    }

    let end = Position::from_coordinates(page_number, previous_end?, row.baseline, dimension);
    Line::new(texts, Some(end))
}

/// Runs the PDF library over the whole document. A failure (error or panic
/// inside the library) keeps the pages completed before it.
pub fn collect_pages(doc: &Document, stroke_max_proportion: f64) -> Vec<PageContent> {
    let mut collector = LineCollector::new(stroke_max_proportion);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::output_doc(doc, &mut collector)));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Native text extraction stopped early: {:?}", e),
        Err(_) => tracing::warn!("Native text extraction panicked, keeping completed pages"),
    }
    collector.finish()
}
