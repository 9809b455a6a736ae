//! Layout engine – uses Taffy to compute flexbox layout from a styled DOM
//! tree, then converts the result into a tree of positioned boxes in
//! document coordinates (x page-absolute, y from the top of the content area).
//!
//! Text is wrapped before Taffy runs, so the width each text block will get
//! is estimated top-down: block children get their parent's content width,
//! children of a flex row get their explicit width or an equal share of what
//! is left.

use std::collections::HashMap;

use taffy::{
    AlignItems, AvailableSpace, FlexDirection, LengthPercentage, LengthPercentageAuto, NodeId,
    Rect, Size, Style, TaffyError, TaffyTree,
};

use crate::engine::dom::Tag;
use crate::engine::fonts::{wrap_text, FontManager, FontSpec};
use crate::engine::style::{self, ComputedStyle, StyledNode};
use crate::engine::PageSetup;
use crate::error::EngineError;

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub kind: BoxKind,
    pub content: BoxContent,
    pub children: Vec<PositionedBox>,
}

impl PositionedBox {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// What pagination needs to know about a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxKind {
    Block,
    /// A table row; never split across pages.
    Row,
    /// A heading; kept on the same page as what follows it.
    Heading,
    Text,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    Text {
        lines: Vec<String>,
        /// Loaded face chosen for these lines, `None` for builtin Helvetica.
        face: Option<String>,
    },
}

fn layout_err(e: TaffyError) -> EngineError {
    EngineError::Layout(e.to_string())
}

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    node_styles: HashMap<NodeId, ComputedStyle>,
    node_content: HashMap<NodeId, BoxContent>,
    node_kind: HashMap<NodeId, BoxKind>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            node_styles: HashMap::new(),
            node_content: HashMap::new(),
            node_kind: HashMap::new(),
        }
    }

    fn is_inline(node: &StyledNode) -> bool {
        match node {
            StyledNode::Text { .. } => true,
            StyledNode::Element {
                style, children, ..
            } => style.display == style::Display::Inline && children.iter().all(Self::is_inline),
        }
    }

    /// Text of an inline subtree; `<br>` becomes a newline.
    fn collect_inline_text(node: &StyledNode, out: &mut String) {
        match node {
            StyledNode::Text { text, .. } => out.push_str(text),
            StyledNode::Element { tag: Tag::Br, .. } => out.push('\n'),
            StyledNode::Element { children, .. } => {
                for child in children {
                    Self::collect_inline_text(child, out);
                }
            }
        }
    }

    /// Collapse whitespace per line and drop trailing blank lines.
    fn normalize_inline_text(raw: &str) -> String {
        let mut lines: Vec<String> = raw
            .split('\n')
            .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect();
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        while lines.first().is_some_and(|l| l.is_empty()) {
            lines.remove(0);
        }
        lines.join("\n")
    }

    /// Build an element. `container` is the parent's content width (for
    /// percentages), `share` the width allotted when this box is auto-sized.
    fn build_element(
        &mut self,
        tag: &Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        container: f32,
        share: f32,
    ) -> Result<NodeId, EngineError> {
        let my_width = match style.width {
            style::Dimension::Pt(w) => w,
            style::Dimension::Percent(p) => container * p / 100.0,
            style::Dimension::Auto => share - style.margin_left - style.margin_right,
        };
        let inner_width = (my_width
            - style.padding_left
            - style.padding_right
            - 2.0 * style.border_width)
            .max(1.0);
        let is_row = style.display == style::Display::Flex;

        let mut child_nodes = Vec::new();
        let shares = if is_row {
            Self::row_shares(children, style.gap, inner_width)
        } else {
            vec![inner_width; children.len()]
        };

        // Runs of inline children become one anonymous text block.
        let mut run = String::new();
        for (child, child_share) in children.iter().zip(shares) {
            if Self::is_inline(child) {
                Self::collect_inline_text(child, &mut run);
                continue;
            }
            self.flush_run(&mut run, style, inner_width, is_row, &mut child_nodes)?;
            if let StyledNode::Element {
                tag,
                style,
                children,
                ..
            } = child
            {
                child_nodes.push(self.build_element(tag, style, children, inner_width, child_share)?);
            }
        }
        self.flush_run(&mut run, style, inner_width, is_row, &mut child_nodes)?;

        let taffy_style = self.computed_to_taffy(style, is_row);
        let node = self
            .taffy
            .new_with_children(taffy_style, &child_nodes)
            .map_err(layout_err)?;
        self.node_styles.insert(node, style.clone());
        let kind = match tag {
            Tag::Tr => BoxKind::Row,
            t if t.is_heading() => BoxKind::Heading,
            _ => BoxKind::Block,
        };
        self.node_kind.insert(node, kind);
        Ok(node)
    }

    /// Widths given to the children of a flex row: explicit widths first,
    /// the remainder split by flex-grow (equally when nobody grows).
    fn row_shares(children: &[StyledNode], gap: f32, inner_width: f32) -> Vec<f32> {
        let gaps = gap * children.len().saturating_sub(1) as f32;
        let mut fixed = 0.0;
        let mut grow_total = 0.0;
        let mut auto_count = 0usize;
        for child in children {
            match child {
                StyledNode::Element { style, .. } => match style.width {
                    style::Dimension::Pt(w) => fixed += w,
                    style::Dimension::Percent(p) => fixed += inner_width * p / 100.0,
                    style::Dimension::Auto => {
                        grow_total += style.flex_grow;
                        auto_count += 1;
                    }
                },
                StyledNode::Text { .. } => auto_count += 1,
            }
        }
        let free = (inner_width - gaps - fixed).max(0.0);
        children
            .iter()
            .map(|child| match child {
                StyledNode::Element { style, .. } => match style.width {
                    style::Dimension::Pt(w) => w,
                    style::Dimension::Percent(p) => inner_width * p / 100.0,
                    style::Dimension::Auto if grow_total > 0.0 => {
                        free * style.flex_grow / grow_total
                    }
                    style::Dimension::Auto => free / auto_count.max(1) as f32,
                },
                StyledNode::Text { .. } => free / auto_count.max(1) as f32,
            })
            .collect()
    }

    fn flush_run(
        &mut self,
        run: &mut String,
        style: &ComputedStyle,
        width: f32,
        in_row: bool,
        out: &mut Vec<NodeId>,
    ) -> Result<(), EngineError> {
        let text = Self::normalize_inline_text(run);
        run.clear();
        if !text.is_empty() {
            out.push(self.build_text_leaf(&text, style, width, in_row)?);
        }
        Ok(())
    }

    fn build_text_leaf(
        &mut self,
        text: &str,
        style: &ComputedStyle,
        max_width: f32,
        in_row: bool,
    ) -> Result<NodeId, EngineError> {
        let face = self.fonts.choose_face(&style.font_family, text);
        let spec = FontSpec {
            face: face.as_deref(),
            size: style.font_size,
            bold: style.is_bold(),
        };
        let lines = wrap_text(text, &spec, max_width, self.fonts);
        let text_height = lines.len() as f32 * style.line_height_pt();

        let width = if in_row {
            let widest = lines
                .iter()
                .map(|l| self.fonts.measure_text_width(l, &spec))
                .fold(0.0f32, f32::max);
            taffy::Dimension::Length(widest.min(max_width))
        } else {
            taffy::Dimension::Auto
        };
        let taffy_style = Style {
            size: Size {
                width,
                height: taffy::Dimension::Length(text_height),
            },
            flex_shrink: 0.0,
            ..Default::default()
        };

        let node = self.taffy.new_leaf(taffy_style).map_err(layout_err)?;
        // Decoration belongs to the enclosing element.
        self.node_styles.insert(node, style.inherited());
        self.node_content
            .insert(node, BoxContent::Text { lines, face });
        self.node_kind.insert(node, BoxKind::Text);
        Ok(node)
    }

    fn computed_to_taffy(&self, s: &ComputedStyle, is_row: bool) -> Style {
        let mut ts = Style {
            display: taffy::Display::Flex,
            flex_direction: if is_row {
                FlexDirection::Row
            } else {
                FlexDirection::Column
            },
            align_items: Some(AlignItems::Stretch),
            ..Default::default()
        };

        ts.size.width = match s.width {
            style::Dimension::Auto => taffy::Dimension::Auto,
            style::Dimension::Pt(v) => taffy::Dimension::Length(v),
            style::Dimension::Percent(v) => taffy::Dimension::Percent(v / 100.0),
        };
        ts.min_size.width = taffy::Dimension::Length(0.0);

        ts.flex_grow = s.flex_grow;
        if s.flex_grow > 0.0 {
            ts.flex_basis = taffy::Dimension::Length(0.0);
        }

        ts.margin = Rect {
            top: LengthPercentageAuto::Length(s.margin_top),
            right: LengthPercentageAuto::Length(s.margin_right),
            bottom: LengthPercentageAuto::Length(s.margin_bottom),
            left: LengthPercentageAuto::Length(s.margin_left),
        };
        ts.padding = Rect {
            top: LengthPercentage::Length(s.padding_top),
            right: LengthPercentage::Length(s.padding_right),
            bottom: LengthPercentage::Length(s.padding_bottom),
            left: LengthPercentage::Length(s.padding_left),
        };
        ts.border = Rect {
            top: LengthPercentage::Length(s.border_width),
            right: LengthPercentage::Length(s.border_width),
            bottom: LengthPercentage::Length(s.border_width),
            left: LengthPercentage::Length(s.border_width),
        };
        ts.gap = Size {
            width: LengthPercentage::Length(s.gap),
            height: LengthPercentage::Length(0.0),
        };
        ts
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox, EngineError> {
        let layout = self.taffy.layout(node).map_err(layout_err)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)
            .map_err(layout_err)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            style: self.node_styles.get(&node).cloned().unwrap_or_default(),
            kind: self.node_kind.get(&node).copied().unwrap_or(BoxKind::Block),
            content: self
                .node_content
                .get(&node)
                .cloned()
                .unwrap_or(BoxContent::None),
            children,
        })
    }
}

/// Compute layout for a styled tree, returning the top-level positioned
/// boxes. Coordinates: x includes the left margin, y starts at 0 at the top
/// of the content area.
pub fn compute_layout(
    styled_nodes: &[StyledNode],
    setup: &PageSetup,
    fonts: &FontManager,
) -> Result<Vec<PositionedBox>, EngineError> {
    let content_width = setup.content_width();
    let mut builder = LayoutBuilder::new(fonts);

    let root_style = ComputedStyle::default();
    let root = builder.build_element(
        &Tag::Body,
        &root_style,
        styled_nodes,
        content_width,
        content_width,
    )?;
    let root_taffy = Style {
        size: Size {
            width: taffy::Dimension::Length(content_width),
            height: taffy::Dimension::Auto,
        },
        ..builder.computed_to_taffy(&root_style, false)
    };
    builder
        .taffy
        .set_style(root, root_taffy)
        .map_err(layout_err)?;

    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(content_width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(layout_err)?;

    let root_box = builder.extract(root, setup.margin_left_pt, 0.0)?;
    Ok(root_box.children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dom::parse_html;
    use crate::engine::style::{build_styled_tree, Stylesheet};
    use crate::layout_config::LayoutConfig;

    fn layout(html: &str, css: &str) -> Vec<PositionedBox> {
        let dom = parse_html(html);
        let styled = build_styled_tree(&dom, None, &Stylesheet::parse(css));
        let setup = LayoutConfig::single_column().page_setup("t");
        compute_layout(&styled, &setup, &FontManager::default()).unwrap()
    }

    fn find_rows<'a>(b: &'a PositionedBox, out: &mut Vec<&'a PositionedBox>) {
        if b.kind == BoxKind::Row {
            out.push(b);
        }
        for c in &b.children {
            find_rows(c, out);
        }
    }

    #[test]
    fn paragraph_gets_a_text_leaf() {
        let boxes = layout("<p>Hello world</p>", "");
        assert_eq!(boxes.len(), 1);
        let p = &boxes[0];
        assert!(p.width > 0.0 && p.height > 0.0);
        assert!(matches!(
            &p.children[0].content,
            BoxContent::Text { lines, face: None } if lines == &vec!["Hello world".to_string()]
        ));
    }

    #[test]
    fn breaks_inside_cells_become_lines() {
        let boxes = layout("<table><tr><td>Good<br>morning</td></tr></table>", "");
        let mut rows = Vec::new();
        find_rows(&boxes[0], &mut rows);
        let cell = &rows[0].children[0];
        match &cell.children[0].content {
            BoxContent::Text { lines, .. } => assert_eq!(lines, &vec!["Good", "morning"]),
            BoxContent::None => panic!("expected text"),
        }
    }

    #[test]
    fn percentage_cells_split_the_row() {
        let css = "td.a { width: 8% } td.b { width: 46% } td.c { width: 46% }";
        let boxes = layout(
            r#"<table><tr><td class="a">1</td><td class="b">x</td><td class="c">y</td></tr></table>"#,
            css,
        );
        let mut rows = Vec::new();
        find_rows(&boxes[0], &mut rows);
        let cells = &rows[0].children;
        let total: f32 = cells.iter().map(|c| c.width).sum();
        assert!((cells[1].width - cells[2].width).abs() < 0.5);
        assert!(cells[0].width < cells[1].width);
        assert!((total - rows[0].width).abs() < 1.0);
    }

    #[test]
    fn flex_panes_sit_side_by_side() {
        let css = ".panes { display: flex; gap: 6mm } .pane { flex: 1 }";
        let boxes = layout(
            r#"<div class="panes"><div class="pane">A</div><div class="pane">B</div></div>"#,
            css,
        );
        let panes = &boxes[0].children;
        assert_eq!(panes.len(), 2);
        assert!((panes[0].y - panes[1].y).abs() < 0.01);
        assert!((panes[0].width - panes[1].width).abs() < 0.5);
        assert!(panes[1].x > panes[0].x + panes[0].width);
    }
}
