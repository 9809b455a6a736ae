//! Markup rendering – serializes a [`Document`] into a complete, print-ready
//! markup document.
//!
//! The output is a pure function of the document and the layout config. Page
//! breaks are never computed here; the stylesheet carries `break-inside`
//! hints for the rendering engine to honor.

use std::fmt::Write;

use crate::entities::escape_text;
use crate::layout_config::{ColumnMode, LayoutConfig, RowBreak};
use crate::model::{Document, Row, Section};

const HINDI_FONT_STACK: &str =
    "\"Noto Sans Devanagari\", \"Mangal\", \"Nirmala UI\", \"Lohit Devanagari\", sans-serif";
const LATIN_FONT_STACK: &str = "Helvetica, Arial, sans-serif";

/// Render `doc` under `layout`.
pub fn render(doc: &Document, layout: &LayoutConfig) -> String {
    let mut out = String::with_capacity(2048 + doc.row_count() * 160);

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    out.push_str("<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", escape_text(&doc.title));
    out.push_str("<style>\n");
    out.push_str(&stylesheet(layout));
    out.push_str("</style>\n</head>\n<body>\n");

    let _ = writeln!(out, "<h1 class=\"doc-title\">{}</h1>", escape_text(&doc.title));
    for section in &doc.sections {
        render_section(&mut out, section, layout.columns);
    }

    out.push_str("</body>\n</html>\n");
    out
}

/// Split rows into two contiguous halves: `ceil(n/2)` on the left, the rest
/// on the right.
pub fn split_halves(rows: &[Row]) -> (&[Row], &[Row]) {
    rows.split_at(rows.len().div_ceil(2))
}

fn render_section(out: &mut String, section: &Section, columns: ColumnMode) {
    out.push_str("<div class=\"section\">\n");
    let _ = writeln!(
        out,
        "<h2 class=\"section-title\">{}</h2>",
        escape_text(&section.name)
    );
    match columns {
        ColumnMode::Single => render_table(out, &section.rows),
        ColumnMode::Two => {
            let (left, right) = split_halves(&section.rows);
            out.push_str("<div class=\"panes\">\n");
            for half in [left, right] {
                // The right pane is emitted even when empty so the left one
                // keeps half the width.
                out.push_str("<div class=\"pane\">\n");
                render_table(out, half);
                out.push_str("</div>\n");
            }
            out.push_str("</div>\n");
        }
    }
    out.push_str("</div>\n");
}

fn render_table(out: &mut String, rows: &[Row]) {
    out.push_str("<table class=\"glossary\">\n<thead>\n");
    out.push_str(
        "<tr><th class=\"serial\">#</th><th class=\"en\">English</th>\
         <th class=\"hi\" lang=\"hi\">हिन्दी</th></tr>\n",
    );
    out.push_str("</thead>\n<tbody>\n");
    for row in rows {
        let _ = writeln!(
            out,
            "<tr><td class=\"serial\">{}</td><td class=\"en\">{}</td>\
             <td class=\"hi\" lang=\"hi\">{}</td></tr>",
            cell_text(&row.serial),
            cell_text(&row.english),
            cell_text(&row.hindi),
        );
    }
    out.push_str("</tbody>\n</table>\n");
}

/// Escape, then turn line breaks into `<br>`.
fn cell_text(s: &str) -> String {
    escape_text(s).replace('\n', "<br>")
}

fn stylesheet(layout: &LayoutConfig) -> String {
    let m = layout.margins_mm;
    let scale = layout.font_tier.scale();
    let row_break = match layout.row_break {
        RowBreak::Allow => "auto",
        RowBreak::Avoid => "avoid",
    };

    let mut css = String::with_capacity(1536);
    let _ = writeln!(
        css,
        "@page {{ size: {}; margin: {}mm {}mm {}mm {}mm; }}",
        layout.page.css_name(),
        m.top,
        m.right,
        m.bottom,
        m.left
    );
    let _ = writeln!(
        css,
        "body {{ margin: 0; font-family: {LATIN_FONT_STACK}; font-size: {}pt; color: #111111; }}",
        scale.body
    );
    let _ = writeln!(
        css,
        "h1.doc-title {{ font-size: {}pt; font-weight: bold; text-align: center; margin: 0 0 10pt 0; }}",
        scale.title
    );
    let _ = writeln!(
        css,
        "h2.section-title {{ font-size: {}pt; font-weight: bold; margin: 8pt 0 4pt 0; }}",
        scale.section
    );
    css.push_str(".section { break-inside: avoid; page-break-inside: avoid; margin: 0 0 8pt 0; }\n");
    let _ = writeln!(
        css,
        ".panes {{ display: flex; gap: {}mm; }}",
        layout.pane_gap_mm
    );
    css.push_str(".pane { flex: 1; }\n");
    css.push_str("table.glossary { width: 100%; border-collapse: collapse; }\n");
    css.push_str(
        "th, td { border: 0.5pt solid #999999; padding: 2pt 4pt; text-align: left; vertical-align: top; }\n",
    );
    css.push_str("th { background-color: #eeeeee; font-weight: bold; }\n");
    let _ = writeln!(
        css,
        "tr {{ break-inside: {row_break}; page-break-inside: {row_break}; }}"
    );
    css.push_str(".serial { width: 8%; }\n");
    css.push_str(".en { width: 46%; }\n");
    let _ = writeln!(
        css,
        ".hi {{ width: 46%; font-family: {HINDI_FONT_STACK}; font-size: {}pt; }}",
        scale.hindi
    );
    css
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout_config::LayoutPreset;

    fn doc(rows: usize) -> Document {
        Document {
            title: "Lesson 22".into(),
            sections: vec![Section {
                name: "Greetings".into(),
                rows: (1..=rows)
                    .map(|i| Row::new(i.to_string(), format!("word {i}"), "नमस्ते"))
                    .collect(),
            }],
        }
    }

    #[test]
    fn split_halves_sizes() {
        for n in 0..8 {
            let rows = doc(n).sections.remove(0).rows;
            let (l, r) = split_halves(&rows);
            assert_eq!(l.len(), n.div_ceil(2));
            assert_eq!(r.len(), n / 2);
            assert_eq!([l, r].concat(), rows);
        }
    }

    #[test]
    fn single_column_document_shape() {
        let html = render(&doc(2), &LayoutPreset::SingleColumn.config());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<meta charset=\"utf-8\">"));
        assert!(html.contains("<title>Lesson 22</title>"));
        assert!(html.contains("@page { size: A4; margin: 18mm 15mm 18mm 15mm; }"));
        assert!(html.contains("<h2 class=\"section-title\">Greetings</h2>"));
        assert!(html.contains("tr { break-inside: auto;"));
        assert_eq!(html.matches("<table").count(), 1);
        assert!(!html.contains("class=\"panes\""));
    }

    #[test]
    fn two_column_emits_panes() {
        let html = render(&doc(3), &LayoutPreset::TwoColumn.config());
        assert_eq!(html.matches("<div class=\"pane\">").count(), 2);
        assert_eq!(html.matches("<table").count(), 2);
        assert!(html.contains("tr { break-inside: avoid;"));
    }

    #[test]
    fn single_row_still_emits_empty_right_pane() {
        let html = render(&doc(1), &LayoutPreset::TwoColumn.config());
        assert_eq!(html.matches("<div class=\"pane\">").count(), 2);
        assert_eq!(html.matches("<td class=\"serial\">").count(), 1);
    }

    #[test]
    fn hindi_cells_are_tagged() {
        let html = render(&doc(1), &LayoutConfig::default());
        assert!(html.contains("<th class=\"hi\" lang=\"hi\">हिन्दी</th>"));
        assert!(html.contains("<td class=\"hi\" lang=\"hi\">नमस्ते</td>"));
        assert!(html.contains("Noto Sans Devanagari"));
    }

    #[test]
    fn newlines_become_breaks_after_escaping() {
        let mut d = doc(0);
        d.sections[0].rows.push(Row::new("1", "a<b>\nc", "x"));
        let html = render(&d, &LayoutConfig::default());
        assert!(html.contains("<td class=\"en\">a&lt;b&gt;<br>c</td>"));
    }

    #[test]
    fn output_is_deterministic() {
        let cfg = LayoutPreset::CompactTwoColumn.config();
        assert_eq!(render(&doc(5), &cfg), render(&doc(5), &cfg));
    }
}
