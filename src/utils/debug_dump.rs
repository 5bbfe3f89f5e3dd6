// src/utils/debug_dump.rs
use crate::models::{FdsTree, Line, Position};
use crate::utils::error::AppError;
use regex::Regex;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Patterns highlighted in the dump, with their highlight type.
pub const DEFAULT_PATTERNS: [(&str, &str); 3] = [
    (r"\b(?:EUH|H|P)\d{3}(?:\s*\+\s*(?:EUH|H|P)\d{3})*\b", "code"),
    (r"\b\d{2,7}-\d{2}-\d\b", "cas"),
    (r"(?i)\b(?:danger|attention|warning)\b", "notice"),
];

/// Writes the cleaned tree as an HTML page: one heading per section and
/// subsection, one paragraph per line, pattern matches highlighted.
pub fn create_tree_dump(tree: &FdsTree, filename: &Path, patterns: &[(&str, &str)]) -> Result<(), AppError> {
    let compiled = patterns
        .iter()
        .map(|(pattern, kind)| {
            Regex::new(pattern)
                .map(|re| (re, *kind))
                .map_err(|e| AppError::Config(format!("Invalid regex pattern '{}': {}", pattern, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n");
    html.push_str(".highlight-section { background-color: #FFFF00; }\n");
    html.push_str(".highlight-subsection { background-color: #FFA500; }\n");
    html.push_str(".highlight-code { background-color: #90EE90; }\n");
    html.push_str(".highlight-cas { background-color: #ADD8E6; }\n");
    html.push_str(".highlight-custom { background-color: #FFC0CB; }\n");
    html.push_str("p { margin: 0; font-family: monospace; }\n");
    html.push_str("</style>\n</head>\n<body>\n");

    for (number, section) in tree {
        html.push_str(&format!(
            "<h2 class=\"highlight-section\" title=\"{}\">Section {}</h2>\n",
            span_title(&section.start_position, section.end_position.as_ref()),
            number
        ));
        for (sub_number, subsection) in &section.subsections {
            html.push_str(&format!(
                "<h3 class=\"highlight-subsection\" title=\"{}\">{}.{} ({} lines, {} strokes)</h3>\n",
                span_title(&subsection.start_position, subsection.end_position.as_ref()),
                number,
                sub_number,
                subsection.lines.len(),
                subsection.strokes.len()
            ));
            for line in &subsection.lines {
                html.push_str(&render_line(line, &compiled));
            }
        }
    }
    html.push_str("</body>\n</html>\n");

    let mut file = File::create(filename)?;
    file.write_all(html.as_bytes())?;

    tracing::info!("Saved tree dump to {}", filename.display());
    Ok(())
}

fn span_title(start: &Position, end: Option<&Position>) -> String {
    let format = |p: &Position| format!("p{} ({:.3}, {:.3})", p.page_number, p.x_proportion, p.y_proportion);
    match end {
        Some(end) => format!("{} - {}", format(start), format(end)),
        None => format(start),
    }
}

fn render_line(line: &Line, patterns: &[(Regex, &str)]) -> String {
    let text = line.clean_text();
    let mut highlights: Vec<(usize, usize, &str)> = patterns
        .iter()
        .flat_map(|(re, kind)| re.find_iter(&text).map(move |m| (m.start(), m.end(), *kind)))
        .collect();
    highlights.sort_by_key(|h| h.0);

    let mut body = String::new();
    let mut last_pos = 0;
    for (start, end, kind) in highlights {
        // Overlapping matches keep the first one
        if start < last_pos {
            continue;
        }
        body.push_str(&escape(&text[last_pos..start]));

        let css_class = match kind {
            "code" => "highlight-code",
            "cas" => "highlight-cas",
            _ => "highlight-custom",
        };
        body.push_str(&format!("<span class=\"{}\" title=\"Type: {}\">", css_class, kind));
        body.push_str(&escape(&text[start..end]));
        body.push_str("</span>");

        last_pos = end;
    }
    body.push_str(&escape(&text[last_pos..]));

    format!("<p title=\"{}\">{}</p>\n", span_title(&line.start_position, line.end_position.as_ref()), body)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Section, Subsection, Text};

    fn line(y: f64, text: &str) -> Line {
        let position = Position { page_number: 1, x_proportion: 0.1, y_proportion: y };
        Line::new(vec![Text::new(position, text)], None).unwrap()
    }

    #[test]
    fn test_render_line_highlights_and_escapes() {
        let patterns: Vec<(Regex, &str)> =
            DEFAULT_PATTERNS.iter().map(|(p, k)| (Regex::new(p).unwrap(), *k)).collect();
        let html = render_line(&line(0.3, "H225 <flammable> & CAS 67-64-1"), &patterns);

        assert!(html.contains("<span class=\"highlight-code\" title=\"Type: code\">H225</span>"));
        assert!(html.contains("<span class=\"highlight-cas\" title=\"Type: cas\">67-64-1</span>"));
        assert!(html.contains("&lt;flammable&gt; &amp; CAS"));
        assert!(html.starts_with("<p title=\"p1 (0.100, 0.300)\">"));
    }

    #[test]
    fn test_tree_dump_file() {
        let start = Position { page_number: 1, x_proportion: 0.1, y_proportion: 0.1 };
        let mut subsection = Subsection::open(start);
        subsection.lines.push(line(0.2, "Mention d'avertissement : Danger"));
        let mut section = Section::open(start);
        section.subsections.insert(2, subsection);
        let tree = FdsTree::from([(2, section)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet_tree.html");
        create_tree_dump(&tree, &path, &DEFAULT_PATTERNS).unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains(">Section 2</h2>"));
        assert!(html.contains(">2.2 (1 lines, 0 strokes)</h3>"));
        assert!(html.contains("<span class=\"highlight-custom\" title=\"Type: notice\">Danger</span>"));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = create_tree_dump(&FdsTree::new(), &dir.path().join("x.html"), &[("(", "bad")]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
