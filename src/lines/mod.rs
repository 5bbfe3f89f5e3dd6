// src/lines/mod.rs
pub mod native;
pub mod ocr;

use crate::config::ExtractionConfig;
use crate::models::{Line, PageDimension, Stroke};
use crate::utils::error::ExtractError;
use native::PageContent;
use ocr::OcrEngine;
use pdf_extract::{Document, Object, ObjectId};
use std::path::Path;

/// Output of the line extraction stage.
#[derive(Debug, Clone)]
pub struct ExtractedLines {
    pub lines: Vec<Line>,
    pub strokes: Vec<Stroke>,
    pub page_dimension: PageDimension,
    pub from_image: bool,
}

/// What the native text layer gave for a document, before deciding on OCR.
#[derive(Debug, Clone)]
pub struct NativeRead {
    pub page_count: usize,
    pub page_dimension: PageDimension,
    pub pages: Vec<PageContent>,
}

impl NativeRead {
    /// A document is parsable when at least one page yields a non-trivial
    /// amount of text.
    pub fn is_parsable(&self, min_text_chars: usize) -> bool {
        self.pages.iter().any(|page| page.text_chars >= min_text_chars)
    }

    fn into_lines(self) -> ExtractedLines {
        let mut lines = Vec::new();
        let mut strokes = Vec::new();
        for page in self.pages {
            lines.extend(page.lines);
            strokes.extend(page.strokes);
        }
        ExtractedLines { lines, strokes, page_dimension: self.page_dimension, from_image: false }
    }
}

/// Loads the document and walks its text layer.
pub fn read_native(path: &Path, config: &ExtractionConfig) -> Result<NativeRead, ExtractError> {
    let mut doc = Document::load(path)
        .map_err(|e| ExtractError::DocumentUnreadable(format!("{}: {}", path.display(), e)))?;

    if doc.is_encrypted() {
        // Most "protected" SDS only restrict printing and open with an empty password
        doc.decrypt("")
            .map_err(|e| ExtractError::DocumentUnreadable(format!("{} is encrypted: {}", path.display(), e)))?;
    }

    let page_ids = doc.get_pages();
    let first_page = page_ids
        .values()
        .next()
        .copied()
        .ok_or_else(|| ExtractError::DocumentUnreadable(format!("{} has no pages", path.display())))?;
    let page_dimension = page_dimension(&doc, first_page).ok_or_else(|| {
        ExtractError::DocumentUnreadable(format!("{}: first page has no usable MediaBox", path.display()))
    })?;

    let pages = native::collect_pages(&doc, config.stroke_max_proportion);
    tracing::debug!("Native text layer: {} of {} pages read", pages.len(), page_ids.len());

    Ok(NativeRead { page_count: page_ids.len(), page_dimension, pages })
}

/// Converts a document into positioned lines, falling back to OCR when the
/// text layer is empty or trivial. OCR is capped at `config.ocr_max_pages`.
pub async fn extract_lines(
    path: &Path,
    config: &ExtractionConfig,
    ocr: &dyn OcrEngine,
) -> Result<ExtractedLines, ExtractError> {
    let native = read_native(path, config)?;

    if native.is_parsable(config.min_text_chars) {
        let extracted = native.into_lines();
        tracing::info!("Extracted {} lines from the text layer of {}", extracted.lines.len(), path.display());
        return Ok(extracted);
    }

    let max_pages = native.page_count.min(config.ocr_max_pages);
    tracing::info!(
        "{} has no usable text layer, running OCR on {} of {} pages",
        path.display(),
        max_pages,
        native.page_count
    );

    let mut lines = ocr.recognize(path, max_pages).await?;
    let before = lines.len();
    lines.retain(|line| (line.start_position.page_number as usize) <= max_pages);
    if lines.len() < before {
        tracing::debug!("Discarded {} OCR lines beyond page {}", before - lines.len(), max_pages);
    }
    tracing::info!("OCR returned {} lines for {}", lines.len(), path.display());

    Ok(ExtractedLines { lines, strokes: Vec::new(), page_dimension: native.page_dimension, from_image: true })
}

/// Looks up the page MediaBox, walking up the page tree (`/Parent`) when the
/// page inherits it.
fn page_dimension(doc: &Document, page_id: ObjectId) -> Option<PageDimension> {
    let mut current = page_id;
    loop {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(media_box) = dict.get(b"MediaBox") {
            let media_box = match media_box {
                Object::Reference(id) => doc.get_object(*id).ok()?,
                other => other,
            };
            let values: Vec<f64> = media_box.as_array().ok()?.iter().filter_map(number).collect();
            if values.len() != 4 {
                return None;
            }
            let dimension = PageDimension { width: (values[2] - values[0]).abs(), height: (values[3] - values[1]).abs() };
            return (dimension.width > 0.0 && dimension.height > 0.0).then_some(dimension);
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small PDFs generated on the fly for tests.
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::path::{Path, PathBuf};

    /// One text line: (x, y from the bottom, text).
    pub type TextLine<'a> = (i64, i64, &'a str);

    /// Writes a PDF whose pages hold the given text lines (Courier 10pt on A4).
    /// A page with no lines has an empty content stream, like a scan
    /// without its image.
    pub fn write_pdf(dir: &Path, name: &str, pages: &[Vec<TextLine<'_>>]) -> PathBuf {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for lines in pages {
            let mut operations = Vec::new();
            for (x, y, text) in lines {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
                operations.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
                operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
                operations.push(Operation::new("ET", vec![]));
            }
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let path = dir.join(name);
        doc.save(&path).unwrap();
        path
    }
}
