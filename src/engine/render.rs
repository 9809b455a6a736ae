//! PDF emission – turns a [`PageTree`] into PDF bytes using `printpdf`
//! (v0.8 ops-based API).
//!
//! Loaded faces referenced by the tree are embedded once per document; all
//! other text is drawn with the builtin Helvetica in WinAnsiEncoding.

use std::collections::HashMap;

use log::{debug, warn};
use printpdf::*;

use crate::engine::fonts::FontManager;
use crate::engine::page_tree::{LayoutBox, PageTree, TextContent};
use crate::error::EngineError;

const PT_TO_MM: f32 = 0.352778;

/// Render a paginated tree into PDF bytes.
pub fn render_pdf(tree: &PageTree, fonts: &FontManager) -> Result<Vec<u8>, EngineError> {
    let page_w = Mm(tree.page_width_pt * PT_TO_MM);
    let page_h = Mm(tree.page_height_pt * PT_TO_MM);

    let mut doc = PdfDocument::new(&tree.title);

    let mut font_ids: HashMap<&str, FontId> = HashMap::new();
    let mut warnings = Vec::new();
    for family in tree.faces() {
        let data = fonts
            .get(family)
            .ok_or_else(|| EngineError::Font(format!("face '{family}' is not loaded")))?;
        let parsed = ParsedFont::from_bytes(&data.bytes, 0, &mut warnings)
            .ok_or_else(|| EngineError::Font(format!("cannot embed face '{family}'")))?;
        font_ids.insert(family, doc.add_font(&parsed));
    }
    if !warnings.is_empty() {
        debug!("render: {} font warnings while embedding", warnings.len());
    }

    let dropped = unencodable_builtin_chars(tree);
    if dropped > 0 {
        warn!(
            "render: '{}' has {dropped} character(s) the builtin Helvetica cannot draw; \
             load a covering face to print them",
            tree.title
        );
    }

    let mut pages: Vec<PdfPage> = tree
        .pages
        .iter()
        .map(|page| {
            let mut ops = Vec::new();
            for lbox in &page.boxes {
                render_box(&mut ops, lbox, tree.page_height_pt, &font_ids);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();

    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    // Raw `Tj` operators carry WinAnsi bytes for Latin-1 text.
    let options = PdfSaveOptions {
        secure: false,
        ..PdfSaveOptions::default()
    };
    Ok(doc.save(&options, &mut Vec::new()))
}

fn rgb(c: [f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Corners of a rectangle in PDF space, clockwise from top-left.
fn corners(lbox: &LayoutBox, pdf_top: f32) -> Vec<LinePoint> {
    let (x1, x2) = (lbox.x, lbox.x + lbox.width);
    let (y1, y2) = (pdf_top - lbox.height, pdf_top);
    vec![point(x1, y2), point(x2, y2), point(x2, y1), point(x1, y1)]
}

fn render_box(ops: &mut Vec<Op>, lbox: &LayoutBox, page_height: f32, fonts: &HashMap<&str, FontId>) {
    // PDF origin is bottom-left.
    let pdf_top = page_height - lbox.y;

    if let Some(bg) = lbox.background_color {
        ops.push(Op::SetFillColor { col: rgb(bg) });
        ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: corners(lbox, pdf_top),
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    if let Some(border) = &lbox.border {
        ops.push(Op::SetOutlineColor {
            col: rgb(border.color),
        });
        ops.push(Op::SetOutlineThickness {
            pt: Pt(border.width),
        });
        ops.push(Op::DrawLine {
            line: Line {
                points: corners(lbox, pdf_top),
                is_closed: true,
            },
        });
    }

    if let Some(text) = &lbox.text {
        render_text(ops, lbox, text, pdf_top, fonts);
    }
}

fn render_text(
    ops: &mut Vec<Op>,
    lbox: &LayoutBox,
    text: &TextContent,
    pdf_top: f32,
    fonts: &HashMap<&str, FontId>,
) {
    let loaded = text.face.as_deref().and_then(|f| fonts.get(f));
    let builtin = if text.bold {
        BuiltinFont::HelveticaBold
    } else {
        BuiltinFont::Helvetica
    };

    for line in &text.lines {
        if line.text.trim().is_empty() {
            continue;
        }
        let x = lbox.x + line.x_offset;
        let baseline = pdf_top - line.y_offset - text.ascent;

        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(x),
                y: Pt(baseline),
            },
        });
        ops.push(Op::SetFillColor {
            col: rgb(text.color),
        });
        match loaded {
            Some(font) => {
                ops.push(Op::SetFontSize {
                    size: Pt(text.font_size),
                    font: font.clone(),
                });
                ops.push(Op::WriteText {
                    items: vec![TextItem::Text(line.text.clone())],
                    font: font.clone(),
                });
            }
            None => {
                ops.push(Op::SetFontSizeBuiltinFont {
                    size: Pt(text.font_size),
                    font: builtin,
                });
                push_builtin_text(ops, &line.text, builtin);
            }
        }
        ops.push(Op::EndTextSection);
    }
}

/// printpdf passes builtin-font text through as UTF-8 bytes, which is only
/// right for ASCII. Anything else goes out as a hex `Tj` of WinAnsi codes;
/// the empty write keeps the font in the page resources.
fn push_builtin_text(ops: &mut Vec<Op>, text: &str, font: BuiltinFont) {
    let bytes = to_winansi(text);
    if bytes.is_ascii() {
        ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(bytes.iter().map(|&b| char::from(b)).collect())],
            font,
        });
    } else {
        ops.push(Op::WriteTextBuiltinFont {
            items: Vec::new(),
            font,
        });
        ops.push(Op::Unknown {
            key: "Tj".to_string(),
            value: vec![DictItem::String {
                data: bytes,
                literal: false,
            }],
        });
    }
}

/// WinAnsiEncoding code for `c`, if the builtin fonts have a glyph for it.
fn winansi_byte(c: char) -> Option<u8> {
    let byte = match c {
        '\u{20AC}' => 0x80, // euro
        '\u{201A}' => 0x82,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85, // ellipsis
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95, // bullet
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{2122}' => 0x99,
        '\u{00A0}' => 0x20,
        c if c.is_ascii() && !c.is_ascii_control() => c as u8,
        c if ('\u{00A1}'..='\u{00FF}').contains(&c) => c as u32 as u8,
        _ => return None,
    };
    Some(byte)
}

fn to_winansi(s: &str) -> Vec<u8> {
    s.chars().map(|c| winansi_byte(c).unwrap_or(b'?')).collect()
}

/// Characters in builtin-font text that print as `?`.
fn unencodable_builtin_chars(tree: &PageTree) -> usize {
    tree.pages
        .iter()
        .flat_map(|page| &page.boxes)
        .filter_map(|lbox| lbox.text.as_ref())
        .filter(|text| text.face.is_none())
        .flat_map(|text| &text.lines)
        .map(|line| line.text.chars().filter(|&c| winansi_byte(c).is_none()).count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::page_tree::{PageLayout, TextLine};

    fn sample_tree(pages: usize) -> PageTree {
        let mut tree = PageTree::new("Sample", 595.28, 841.89);
        for page_index in 0..pages {
            let mut cell = LayoutBox::new(42.0, 51.0, 200.0, 20.0);
            cell.background_color = Some([0.93, 0.93, 0.93, 1.0]);
            cell.border = Some(crate::engine::page_tree::BorderStyle {
                width: 0.5,
                color: [0.6, 0.6, 0.6, 1.0],
            });
            cell.text = Some(TextContent {
                lines: vec![TextLine {
                    text: format!("Row {page_index}"),
                    x_offset: 2.0,
                    y_offset: 0.0,
                }],
                face: None,
                font_size: 11.0,
                bold: false,
                color: [0.0, 0.0, 0.0, 1.0],
                ascent: 8.25,
            });
            tree.pages.push(PageLayout {
                page_index,
                boxes: vec![cell],
            });
        }
        tree
    }

    #[test]
    fn emits_a_pdf() {
        let bytes = render_pdf(&sample_tree(2), &FontManager::new()).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn empty_tree_still_has_a_page() {
        let tree = PageTree::new("Empty", 612.0, 792.0);
        let bytes = render_pdf(&tree, &FontManager::new()).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn unknown_face_is_a_font_error() {
        let mut tree = sample_tree(1);
        if let Some(text) = tree.pages[0].boxes[0].text.as_mut() {
            text.face = Some("Noto Sans Devanagari".into());
        }
        let err = render_pdf(&tree, &FontManager::new()).unwrap_err();
        assert!(matches!(err, EngineError::Font(_)));
    }

    #[test]
    fn latin1_text_keeps_its_winansi_codes() {
        assert_eq!(to_winansi("café – naïve"), b"caf\xe9 \x96 na\xefve".to_vec());
        assert_eq!(to_winansi("a\u{00A0}b"), b"a b".to_vec());
        assert_eq!(to_winansi("नमस्ते"), b"??????".to_vec());
    }

    #[test]
    fn latin1_lines_are_written_as_raw_codes() {
        let mut ops = Vec::new();
        push_builtin_text(&mut ops, "Hello", BuiltinFont::Helvetica);
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], Op::WriteTextBuiltinFont { items, .. } if items.len() == 1));

        let mut ops = Vec::new();
        push_builtin_text(&mut ops, "Café", BuiltinFont::Helvetica);
        assert!(matches!(&ops[0], Op::WriteTextBuiltinFont { items, .. } if items.is_empty()));
        match &ops[1] {
            Op::Unknown { key, value } => {
                assert_eq!(key, "Tj");
                assert!(matches!(&value[0], DictItem::String { data, .. } if data == b"Caf\xe9"));
            }
            other => panic!("expected raw Tj, got {other:?}"),
        }
    }

    #[test]
    fn uncovered_builtin_text_is_counted() {
        let mut tree = sample_tree(1);
        assert_eq!(unencodable_builtin_chars(&tree), 0);
        if let Some(text) = tree.pages[0].boxes[0].text.as_mut() {
            text.lines[0].text = "नमस्ते café".into();
        }
        assert_eq!(unencodable_builtin_chars(&tree), 6);

        let bytes = render_pdf(&tree, &FontManager::new()).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
