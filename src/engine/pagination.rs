//! Pagination – splits positioned boxes into pages.
//!
//! Breaks are only placed between "atoms": table rows, headings, text
//! blocks, and `break-inside: avoid` blocks that fit on a page. A break is
//! valid when no atom straddles it, which keeps rows whole in both panes of a
//! two-column section. Headings stay with whatever follows them when
//! possible. Content that cannot be placed otherwise is cut at the page
//! bottom.

use crate::engine::fonts::{FontManager, FontSpec};
use crate::engine::layout::{BoxContent, BoxKind, PositionedBox};
use crate::engine::page_tree::*;
use crate::engine::style::TextAlign;
use crate::engine::PageSetup;

const EPS: f32 = 0.01;

#[derive(Debug, Clone, Copy)]
struct Atom {
    top: f32,
    bottom: f32,
    heading: bool,
}

fn collect_atoms(b: &PositionedBox, content_height: f32, out: &mut Vec<Atom>) {
    let whole = match b.kind {
        BoxKind::Row | BoxKind::Text | BoxKind::Heading => true,
        BoxKind::Block => {
            (b.style.break_inside_avoid && b.height <= content_height) || b.children.is_empty()
        }
    };
    if whole {
        if b.height > 0.0 {
            out.push(Atom {
                top: b.y,
                bottom: b.bottom(),
                heading: b.kind == BoxKind::Heading,
            });
        }
        return;
    }
    for child in &b.children {
        collect_atoms(child, content_height, out);
    }
}

/// Document y positions at which each page starts. The first is always 0.
fn page_starts(atoms: &[Atom], content_height: f32) -> Vec<f32> {
    let end = atoms.iter().map(|a| a.bottom).fold(0.0f32, f32::max);
    let mut starts = vec![0.0];
    let mut start = 0.0f32;
    while end > start + content_height + EPS {
        let limit = start + content_height;
        let next = choose_break(atoms, start, limit, true)
            .or_else(|| choose_break(atoms, start, limit, false))
            .unwrap_or(limit);
        starts.push(next);
        start = next;
    }
    starts
}

/// The lowest valid break in `(start, limit]`, if any.
fn choose_break(atoms: &[Atom], start: f32, limit: f32, keep_headings: bool) -> Option<f32> {
    let mut candidates: Vec<f32> = atoms
        .iter()
        .map(|a| a.top)
        .filter(|&t| t > start + EPS && t <= limit + EPS)
        .collect();
    candidates.sort_by(|a, b| b.total_cmp(a));
    candidates.dedup_by(|a, b| (*a - *b).abs() < EPS);

    candidates.into_iter().find(|&y| {
        let straddled = atoms.iter().any(|a| a.top < y - EPS && a.bottom > y + EPS);
        !straddled && !(keep_headings && heading_ends_before(atoms, start, y))
    })
}

/// Is the last atom ending at or above `y` on this page a heading?
fn heading_ends_before(atoms: &[Atom], start: f32, y: f32) -> bool {
    atoms
        .iter()
        .filter(|a| a.top >= start - EPS && a.bottom <= y + EPS)
        .max_by(|a, b| a.bottom.total_cmp(&b.bottom))
        .is_some_and(|a| a.heading)
}

struct PageWriter<'a> {
    starts: Vec<f32>,
    content_height: f32,
    margin_top: f32,
    fonts: &'a FontManager,
    pages: Vec<PageLayout>,
}

impl PageWriter<'_> {
    fn page_of(&self, y: f32) -> usize {
        self.starts
            .partition_point(|&s| s <= y + EPS)
            .saturating_sub(1)
    }

    fn page_bottom(&self, page: usize) -> f32 {
        self.starts[page] + self.content_height
    }

    fn to_page_y(&self, page: usize, y: f32) -> f32 {
        self.margin_top + (y - self.starts[page])
    }

    fn write(&mut self, b: &PositionedBox) {
        let bg = (!b.style.background_color.is_transparent())
            .then(|| b.style.background_color.to_array());
        let border = (b.style.border_width > 0.0).then(|| BorderStyle {
            width: b.style.border_width,
            color: b.style.border_color.to_array(),
        });
        if bg.is_some() || border.is_some() {
            let page = self.page_of(b.y);
            let height = b.height.min(self.page_bottom(page) - b.y);
            let mut lb = LayoutBox::new(b.x, self.to_page_y(page, b.y), b.width, height);
            lb.background_color = bg;
            lb.border = border;
            self.pages[page].boxes.push(lb);
        }

        if let BoxContent::Text { lines, face } = &b.content {
            self.write_text(b, lines, face.as_deref());
        }

        for child in &b.children {
            self.write(child);
        }
    }

    fn write_text(&mut self, b: &PositionedBox, lines: &[String], face: Option<&str>) {
        let line_height = b.style.line_height_pt();
        let spec = FontSpec {
            face,
            size: b.style.font_size,
            bold: b.style.is_bold(),
        };
        let ascent = self.fonts.ascender_pt(&spec);

        // Group consecutive lines by the page they land on.
        let mut current: Option<(usize, LayoutBox)> = None;
        for (i, line) in lines.iter().enumerate() {
            let line_top = b.y + i as f32 * line_height;
            let mut page = self.page_of(line_top);
            if line_top + line_height > self.page_bottom(page) + EPS && page + 1 < self.starts.len()
            {
                page += 1;
            }

            if current.as_ref().is_some_and(|(p, _)| *p != page) {
                if let Some((p, lb)) = current.take() {
                    self.pages[p].boxes.push(lb);
                }
            }
            let (_, lb) = current.get_or_insert_with(|| {
                let top = line_top.max(self.starts[page]);
                let mut lb = LayoutBox::new(b.x, self.to_page_y(page, top), b.width, 0.0);
                lb.text = Some(TextContent {
                    lines: Vec::new(),
                    face: face.map(str::to_string),
                    font_size: spec.size,
                    bold: spec.bold,
                    color: b.style.color.to_array(),
                    ascent,
                });
                (page, lb)
            });

            let width = self.fonts.measure_text_width(line, &spec);
            let x_offset = match b.style.text_align {
                TextAlign::Left => 0.0,
                TextAlign::Center => ((b.width - width) / 2.0).max(0.0),
                TextAlign::Right => (b.width - width).max(0.0),
            };
            let y_offset = lb.height;
            lb.height += line_height;
            if let Some(text) = lb.text.as_mut() {
                text.lines.push(TextLine {
                    text: line.clone(),
                    x_offset,
                    y_offset,
                });
            }
        }
        if let Some((p, lb)) = current {
            self.pages[p].boxes.push(lb);
        }
    }
}

/// Convert positioned boxes into a paginated [`PageTree`].
pub fn paginate(boxes: &[PositionedBox], setup: &PageSetup, fonts: &FontManager) -> PageTree {
    let content_height = setup.content_height();

    let mut atoms = Vec::new();
    for b in boxes {
        collect_atoms(b, content_height, &mut atoms);
    }
    let starts = page_starts(&atoms, content_height);

    let pages = (0..starts.len())
        .map(|page_index| PageLayout {
            page_index,
            boxes: Vec::new(),
        })
        .collect();
    let mut writer = PageWriter {
        starts,
        content_height,
        margin_top: setup.margin_top_pt,
        fonts,
        pages,
    };
    for b in boxes {
        writer.write(b);
    }

    let mut tree = PageTree::new(&setup.title, setup.width_pt, setup.height_pt);
    tree.pages = writer.pages;
    tree
}
