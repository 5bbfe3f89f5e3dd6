// src/tree/builder.rs
use super::patterns::{is_toc_entry, match_section, match_subsection};
use crate::models::{FdsTree, Line, Metadata, Position, Section, Stroke, Subsection};
use crate::utils::text::header_key;
use std::collections::BTreeMap;

/// Histogram of text start positions: percent of page width -> count.
pub type XCounts = BTreeMap<u32, usize>;

/// Output of the tree building stage.
#[derive(Debug, Clone)]
pub struct BuiltTree {
    pub fds_tree: FdsTree,
    pub x_counts: XCounts,
    pub full_text: FullText,
}

/// Every line of the document concatenated, independent of tree placement.
/// Offsets are kept per line so that whole-document searches can still
/// report where a match came from.
#[derive(Debug, Clone, Default)]
pub struct FullText {
    raw: String,
    clean: String,
    entries: Vec<FullTextEntry>,
}

#[derive(Debug, Clone)]
struct FullTextEntry {
    raw_start: usize,
    clean_start: usize,
    metadata: Metadata,
}

impl FullText {
    pub fn push_line(&mut self, line: &Line) {
        self.entries.push(FullTextEntry {
            raw_start: self.raw.len(),
            clean_start: self.clean.len(),
            metadata: line.metadata(),
        });
        self.raw.push_str(&line.raw_text());
        self.raw.push('\n');
        self.clean.push_str(&line.clean_text());
        self.clean.push('\n');
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn clean(&self) -> &str {
        &self.clean
    }

    /// Provenance of the line holding byte `offset` of the clean text.
    pub fn locate_clean(&self, offset: usize) -> Option<Metadata> {
        let index = self.entries.partition_point(|e| e.clean_start <= offset);
        self.entries.get(index.checked_sub(1)?).map(|e| e.metadata)
    }

    /// Provenance of the line holding byte `offset` of the raw text.
    pub fn locate_raw(&self, offset: usize) -> Option<Metadata> {
        let index = self.entries.partition_point(|e| e.raw_start <= offset);
        self.entries.get(index.checked_sub(1)?).map(|e| e.metadata)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Section/subsection cursor over a stream of lines.
///
/// Also used by the cleaner to re-run header detection over repaired lines.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    tree: FdsTree,
    current_section: Option<u32>,
    current_subsection: Option<u32>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places one line: either it opens a section or subsection, or it is
    /// appended to the open subsection. Lines before the first section
    /// header are dropped.
    pub fn push_line(&mut self, line: Line) {
        let key = header_key(&line.clean_text());
        // Table of contents entries repeat the headers; they are never headers themselves
        let candidate = !is_toc_entry(&key);

        if let Some(number) = match_section(&key).filter(|_| candidate) {
            if self.section_header(number, line.start_position) {
                return;
            }
        }

        if let Some(section) = self.current_section.filter(|_| candidate) {
            if let Some(number) = match_subsection(section, &key) {
                if self.subsection_header(number, line.start_position) {
                    return;
                }
            }
        }

        match self.open_subsection_mut() {
            Some(subsection) => subsection.lines.push(line),
            None => tracing::trace!("Dropping line before first section: {}", line.clean_text()),
        }
    }

    /// Handles a section header at `position`. Returns false when the header
    /// has a lower number than the open section and must be read as text.
    pub fn section_header(&mut self, number: u32, position: Position) -> bool {
        match self.current_section {
            Some(current) if number < current => false,
            Some(current) if number == current => {
                tracing::trace!("Section {} header repeated, continuing", number);
                true
            }
            _ => {
                self.open_section(number, position);
                true
            }
        }
    }

    /// Same as `section_header` for a subsection of the open section.
    pub fn subsection_header(&mut self, number: u32, position: Position) -> bool {
        if self.current_section.is_none() {
            return false;
        }
        match self.current_subsection {
            Some(current) if number < current => false,
            Some(current) if number == current => true,
            _ => {
                self.open_subsection(number, position);
                true
            }
        }
    }

    fn open_section(&mut self, number: u32, position: Position) {
        self.close_section(position);
        tracing::debug!("Opening section {} at page {}", number, position.page_number);

        let section = self.tree.entry(number).or_insert_with(|| Section::open(position));
        section.end_position = None;
        section.subsections.entry(0).or_insert_with(|| Subsection::open(position)).end_position = None;

        self.current_section = Some(number);
        self.current_subsection = Some(0);
    }

    fn open_subsection(&mut self, number: u32, position: Position) {
        self.close_subsection(position);
        let Some(section_number) = self.current_section else {
            return;
        };
        tracing::debug!("Opening subsection {}.{}", section_number, number);

        if let Some(section) = self.tree.get_mut(&section_number) {
            section.subsections.entry(number).or_insert_with(|| Subsection::open(position)).end_position = None;
        }
        self.current_subsection = Some(number);
    }

    fn close_section(&mut self, position: Position) {
        self.close_subsection(position);
        if let Some(section) = self.current_section.and_then(|n| self.tree.get_mut(&n)) {
            section.end_position = Some(position);
        }
    }

    fn close_subsection(&mut self, position: Position) {
        if let Some(subsection) = self.open_subsection_mut() {
            subsection.end_position = Some(position);
        }
    }

    fn open_subsection_mut(&mut self) -> Option<&mut Subsection> {
        let section = self.tree.get_mut(&self.current_section?)?;
        section.subsections.get_mut(&self.current_subsection?)
    }

    /// The last section and subsection stay open to the end of the document.
    pub fn finish(self) -> FdsTree {
        self.tree
    }
}

/// Scans the lines in reading order and builds the section tree, the x
/// histogram and the concatenated text.
pub fn build_tree(lines: Vec<Line>, strokes: &[Stroke]) -> BuiltTree {
    let mut builder = TreeBuilder::new();
    let mut x_counts = XCounts::new();
    let mut full_text = FullText::default();

    for line in lines {
        count_text_starts(&line, &mut x_counts);
        full_text.push_line(&line);
        builder.push_line(line);
    }

    let mut fds_tree = builder.finish();
    attach_strokes(&mut fds_tree, strokes);

    tracing::info!(
        "Built tree with sections {:?} from {} lines",
        fds_tree.keys().collect::<Vec<_>>(),
        full_text.len()
    );

    BuiltTree { fds_tree, x_counts, full_text }
}

// One increment per distinct bucket on a line.
fn count_text_starts(line: &Line, x_counts: &mut XCounts) {
    let mut buckets: Vec<u32> = line.texts.iter().map(|t| x_bucket(t.position.x_proportion)).collect();
    buckets.dedup();
    for bucket in buckets {
        *x_counts.entry(bucket).or_insert(0) += 1;
    }
}

pub fn x_bucket(x_proportion: f64) -> u32 {
    (x_proportion.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// Gives each stroke to the first subsection whose range holds its start.
pub(crate) fn attach_strokes(tree: &mut FdsTree, strokes: &[Stroke]) {
    for stroke in strokes {
        let target = tree
            .values_mut()
            .flat_map(|section| section.subsections.values_mut())
            .find(|subsection| subsection.contains(&stroke.start_position));
        match target {
            Some(subsection) => subsection.strokes.push(*stroke),
            None => tracing::trace!("Stroke on page {} outside any section", stroke.start_position.page_number),
        }
    }
}
