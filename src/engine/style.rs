//! Style resolver – maps tag defaults, the embedded stylesheet and inline
//! styles to a flat [`ComputedStyle`] consumed by the layout engine.
//!
//! Supported selectors are `tag`, `.class`, `tag.class` and comma lists of
//! those; anything else (combinators, pseudo-classes, at-rules) is skipped.
//! All lengths are resolved to points.

use std::collections::HashMap;

use crate::engine::dom::{DomNode, ElementNode, Tag};

/// Fully resolved style for a single element.
#[derive(Debug, Clone)]
pub struct ComputedStyle {
    pub display: Display,
    pub flex_grow: f32,
    pub gap: f32,

    pub width: Dimension,

    // Spacing (pt)
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub padding_top: f32,
    pub padding_right: f32,
    pub padding_bottom: f32,
    pub padding_left: f32,

    pub border_width: f32,
    pub border_color: Color,
    pub background_color: Color,

    // Typography (inherited)
    pub font_size: f32,
    pub font_weight: FontWeight,
    /// The raw `font-family` stack.
    pub font_family: String,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,

    pub break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_grow: 0.0,
            gap: 0.0,
            width: Dimension::Auto,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            padding_top: 0.0,
            padding_right: 0.0,
            padding_bottom: 0.0,
            padding_left: 0.0,
            border_width: 0.0,
            border_color: Color::BLACK,
            background_color: Color::TRANSPARENT,
            font_size: 12.0,
            font_weight: FontWeight::Normal,
            font_family: "Helvetica".to_string(),
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.3,
            break_inside_avoid: false,
        }
    }
}

impl ComputedStyle {
    /// A fresh style carrying only the inherited text properties of `self`.
    pub fn inherited(&self) -> Self {
        Self {
            font_size: self.font_size,
            font_weight: self.font_weight,
            font_family: self.font_family.clone(),
            color: self.color,
            text_align: self.text_align,
            line_height: self.line_height,
            ..Self::default()
        }
    }

    pub fn is_bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    pub fn line_height_pt(&self) -> f32 {
        self.font_size * self.line_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Inline,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Pt(f32),
    Percent(f32),
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "black" => Some(Self::BLACK),
            "white" => Some(Self::WHITE),
            "transparent" | "none" => Some(Self::TRANSPARENT),
            hex if hex.starts_with('#') => Self::from_hex(hex),
            _ => None,
        }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Stylesheet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct Selector {
    tag: Option<String>,
    class: Option<String>,
}

impl Selector {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty()
            || text
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '>' | '+' | '~' | ':' | '[' | '#' | '*'))
        {
            return None;
        }
        let (tag, class) = match text.split_once('.') {
            Some((tag, class)) => (tag, Some(class)),
            None => (text, None),
        };
        if class.is_some_and(|c| c.is_empty() || c.contains('.')) {
            return None;
        }
        Some(Self {
            tag: (!tag.is_empty()).then(|| tag.to_ascii_lowercase()),
            class: class.map(str::to_string),
        })
    }

    fn specificity(&self) -> u32 {
        u32::from(self.tag.is_some()) + 10 * u32::from(self.class.is_some())
    }

    fn matches(&self, element: &ElementNode) -> bool {
        if let Some(tag) = &self.tag {
            if element.tag.name() != tag {
                return false;
            }
        }
        match &self.class {
            Some(class) => element.classes().contains(&class.as_str()),
            None => true,
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    selector: Selector,
    order: usize,
    declarations: Vec<(String, String)>,
}

/// Parsed embedded stylesheet.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    rules: Vec<Rule>,
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let css = strip_comments(css);
        let mut rules = Vec::new();
        let mut rest = css.as_str();

        while let Some(open) = rest.find('{') {
            let prelude = rest[..open].trim();
            let after = &rest[open + 1..];
            let Some(close) = matching_brace(after) else {
                break;
            };
            let body = &after[..close];
            rest = &after[close + 1..];

            if prelude.starts_with('@') {
                continue;
            }
            let declarations = parse_declarations(body);
            for selector in prelude.split(',').filter_map(Selector::parse) {
                rules.push(Rule {
                    selector,
                    order: rules.len(),
                    declarations: declarations.clone(),
                });
            }
        }
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Declarations applying to `element`, lowest precedence first.
    fn matching(&self, element: &ElementNode) -> Vec<&(String, String)> {
        let mut hits: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.selector.matches(element))
            .collect();
        hits.sort_by_key(|r| (r.selector.specificity(), r.order));
        hits.into_iter()
            .flat_map(|r| r.declarations.iter())
            .collect()
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => rest = "",
        }
    }
    out.push_str(rest);
    out
}

/// Index of the `}` closing a block whose `{` was just consumed.
fn matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn parse_declarations(body: &str) -> Vec<(String, String)> {
    body.split(';')
        .filter_map(|decl| {
            let (prop, val) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let val = val.trim().trim_end_matches("!important").trim();
            (!prop.is_empty() && !val.is_empty()).then(|| (prop, val.to_string()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for an element, inheriting text properties from its
/// parent. Precedence: tag defaults, then stylesheet rules by specificity and
/// source order, then the inline `style` attribute.
pub fn resolve_style(
    element: &ElementNode,
    parent: Option<&ComputedStyle>,
    sheet: &Stylesheet,
) -> ComputedStyle {
    let mut style = parent.map(ComputedStyle::inherited).unwrap_or_default();
    apply_tag_defaults(&mut style, &element.tag);

    for (prop, val) in sheet.matching(element) {
        apply_css_property(&mut style, prop, val);
    }
    if let Some(inline) = element.inline_style() {
        for (prop, val) in parse_declarations(inline) {
            apply_css_property(&mut style, &prop, &val);
        }
    }
    style
}

fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    match tag {
        Tag::H1 => {
            s.font_size = 24.0;
            s.font_weight = FontWeight::Bold;
            s.margin_top = 12.0;
            s.margin_bottom = 9.0;
        }
        Tag::H2 => {
            s.font_size = 18.0;
            s.font_weight = FontWeight::Bold;
            s.margin_top = 10.0;
            s.margin_bottom = 7.5;
        }
        Tag::H3 => {
            s.font_size = 15.0;
            s.font_weight = FontWeight::Bold;
            s.margin_top = 9.0;
            s.margin_bottom = 6.0;
        }
        Tag::P => s.margin_bottom = 7.5,
        Tag::Td | Tag::Th => {
            s.padding_top = 2.0;
            s.padding_right = 2.0;
            s.padding_bottom = 2.0;
            s.padding_left = 2.0;
            if *tag == Tag::Th {
                s.font_weight = FontWeight::Bold;
            }
        }
        Tag::B | Tag::Strong => {
            s.display = Display::Inline;
            s.font_weight = FontWeight::Bold;
        }
        Tag::Span | Tag::Br => s.display = Display::Inline,
        Tag::Head | Tag::Title | Tag::Style | Tag::Script | Tag::Meta => {
            s.display = Display::None;
        }
        Tag::Tr => s.display = Display::Flex,
        Tag::Html
        | Tag::Body
        | Tag::Div
        | Tag::Table
        | Tag::Thead
        | Tag::Tbody
        | Tag::Unknown(_) => {}
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    let font_size = s.font_size;
    let length = |v: &str| parse_length(v, font_size);
    match prop {
        "display" => {
            s.display = match val {
                "flex" => Display::Flex,
                "block" | "table" | "table-row-group" | "table-header-group" => Display::Block,
                "inline" | "inline-block" => Display::Inline,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "flex" => {
            // `flex: <grow> [<shrink>] [<basis>]`, or a keyword.
            s.flex_grow = match val {
                "none" => 0.0,
                "auto" => 1.0,
                _ => val
                    .split_whitespace()
                    .next()
                    .and_then(|grow| grow.parse().ok())
                    .unwrap_or(s.flex_grow),
            };
        }
        "flex-grow" => {
            if let Ok(v) = val.parse() {
                s.flex_grow = v;
            }
        }
        "gap" | "column-gap" => {
            if let Some(v) = length(val) {
                s.gap = v;
            }
        }
        "width" => s.width = parse_dimension(val, font_size),
        "font-size" => {
            if let Some(v) = length(val) {
                s.font_size = v;
            }
        }
        "font-weight" => {
            s.font_weight = match val {
                "bold" | "bolder" | "600" | "700" | "800" | "900" => FontWeight::Bold,
                _ => FontWeight::Normal,
            }
        }
        "font-family" => s.font_family = val.to_string(),
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" | "background" => {
            if let Some(c) = Color::parse(val) {
                s.background_color = c;
            }
        }
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "line-height" => {
            if let Ok(v) = val.parse::<f32>() {
                s.line_height = v;
            } else if let Some(v) = length(val) {
                s.line_height = v / s.font_size;
            }
        }
        "margin" => {
            if let Some([t, r, b, l]) = parse_box(val, font_size) {
                (s.margin_top, s.margin_right, s.margin_bottom, s.margin_left) = (t, r, b, l);
            }
        }
        "margin-top" => set_length(&mut s.margin_top, val, font_size),
        "margin-right" => set_length(&mut s.margin_right, val, font_size),
        "margin-bottom" => set_length(&mut s.margin_bottom, val, font_size),
        "margin-left" => set_length(&mut s.margin_left, val, font_size),
        "padding" => {
            if let Some([t, r, b, l]) = parse_box(val, font_size) {
                (s.padding_top, s.padding_right, s.padding_bottom, s.padding_left) = (t, r, b, l);
            }
        }
        "padding-top" => set_length(&mut s.padding_top, val, font_size),
        "padding-right" => set_length(&mut s.padding_right, val, font_size),
        "padding-bottom" => set_length(&mut s.padding_bottom, val, font_size),
        "padding-left" => set_length(&mut s.padding_left, val, font_size),
        "border" => {
            // `<width> <style> <color>` in any order.
            for part in val.split_whitespace() {
                if part == "none" {
                    s.border_width = 0.0;
                } else if let Some(w) = length(part) {
                    s.border_width = w;
                } else if let Some(c) = Color::parse(part) {
                    s.border_color = c;
                }
            }
        }
        "border-width" => set_length(&mut s.border_width, val, font_size),
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                s.border_color = c;
            }
        }
        "break-inside" | "page-break-inside" => {
            s.break_inside_avoid = matches!(val, "avoid" | "avoid-page");
        }
        _ => {}
    }
}

fn set_length(slot: &mut f32, val: &str, font_size: f32) {
    if let Some(v) = parse_length(val, font_size) {
        *slot = v;
    }
}

/// Parse a length into points. Unitless zero is accepted.
pub fn parse_length(val: &str, font_size: f32) -> Option<f32> {
    let val = val.trim();
    let (number, factor) = if let Some(n) = val.strip_suffix("pt") {
        (n, 1.0)
    } else if let Some(n) = val.strip_suffix("px") {
        (n, 0.75)
    } else if let Some(n) = val.strip_suffix("mm") {
        (n, 72.0 / 25.4)
    } else if let Some(n) = val.strip_suffix("cm") {
        (n, 72.0 / 2.54)
    } else if let Some(n) = val.strip_suffix("in") {
        (n, 72.0)
    } else if let Some(n) = val.strip_suffix("em") {
        (n, font_size)
    } else {
        let v: f32 = val.parse().ok()?;
        return (v == 0.0).then_some(0.0);
    };
    number.trim().parse::<f32>().ok().map(|v| v * factor)
}

fn parse_dimension(val: &str, font_size: f32) -> Dimension {
    let val = val.trim();
    if let Some(p) = val.strip_suffix('%') {
        return p.trim().parse().map(Dimension::Percent).unwrap_or(Dimension::Auto);
    }
    parse_length(val, font_size)
        .map(Dimension::Pt)
        .unwrap_or(Dimension::Auto)
}

/// CSS box shorthand with 1 – 4 values, as `[top, right, bottom, left]`.
fn parse_box(val: &str, font_size: f32) -> Option<[f32; 4]> {
    let parts: Vec<f32> = val
        .split_whitespace()
        .map(|p| parse_length(p, font_size))
        .collect::<Option<_>>()?;
    match parts[..] {
        [a] => Some([a, a, a, a]),
        [v, h] => Some([v, h, v, h]),
        [t, h, b] => Some([t, h, b, h]),
        [t, r, b, l] => Some([t, r, b, l]),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Styled DOM tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        attrs: HashMap<String, String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

/// Style of the `<body>` element, resolved through `<html>`. Its text
/// properties are what the body's children inherit.
pub fn root_style(nodes: &[DomNode], sheet: &Stylesheet) -> Option<ComputedStyle> {
    root_style_from(nodes, None, sheet)
}

fn root_style_from(
    nodes: &[DomNode],
    parent: Option<&ComputedStyle>,
    sheet: &Stylesheet,
) -> Option<ComputedStyle> {
    nodes.iter().find_map(|node| match node {
        DomNode::Element(e) if e.tag == Tag::Body => Some(resolve_style(e, parent, sheet)),
        DomNode::Element(e) if e.tag == Tag::Html => {
            let html = resolve_style(e, parent, sheet);
            root_style_from(&e.children, Some(&html), sheet)
        }
        _ => None,
    })
}

/// Build a styled tree from a DOM tree, resolving styles top-down.
/// `display: none` subtrees and whitespace-only text are dropped.
pub fn build_styled_tree(
    nodes: &[DomNode],
    parent_style: Option<&ComputedStyle>,
    sheet: &Stylesheet,
) -> Vec<StyledNode> {
    let mut result = Vec::new();
    for node in nodes {
        match node {
            DomNode::Element(e) => {
                let style = resolve_style(e, parent_style, sheet);
                if style.display == Display::None {
                    continue;
                }
                let children = build_styled_tree(&e.children, Some(&style), sheet);
                result.push(StyledNode::Element {
                    tag: e.tag.clone(),
                    style,
                    children,
                    attrs: e.attributes.clone(),
                });
            }
            DomNode::Text(text) => {
                if !text.trim().is_empty() {
                    let style = parent_style
                        .map(ComputedStyle::inherited)
                        .unwrap_or_default();
                    result.push(StyledNode::Text {
                        text: text.clone(),
                        style,
                    });
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dom::parse_html;

    fn first_element(html: &str) -> ElementNode {
        match parse_html(html).into_iter().next() {
            Some(DomNode::Element(e)) => e,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn lengths_resolve_to_points() {
        assert_eq!(parse_length("10pt", 12.0), Some(10.0));
        assert_eq!(parse_length("16px", 12.0), Some(12.0));
        assert!((parse_length("25.4mm", 12.0).unwrap() - 72.0).abs() < 0.01);
        assert_eq!(parse_length("2em", 9.0), Some(18.0));
        assert_eq!(parse_length("0", 12.0), Some(0.0));
        assert_eq!(parse_length("12", 12.0), None);
    }

    #[test]
    fn selectors_match_by_tag_and_class() {
        let td = first_element(r#"<td class="hi serial">x</td>"#);
        assert!(Selector::parse("td").unwrap().matches(&td));
        assert!(Selector::parse(".hi").unwrap().matches(&td));
        assert!(Selector::parse("td.serial").unwrap().matches(&td));
        assert!(!Selector::parse("th.hi").unwrap().matches(&td));
        assert!(Selector::parse("table td").is_none());
        assert!(Selector::parse("a:hover").is_none());
    }

    #[test]
    fn specificity_beats_source_order() {
        let sheet = Stylesheet::parse(".hi { font-size: 11pt } td { font-size: 9pt; }");
        let td = first_element(r#"<td class="hi">x</td>"#);
        let style = resolve_style(&td, None, &sheet);
        assert_eq!(style.font_size, 11.0);
    }

    #[test]
    fn inline_style_wins_and_at_rules_are_skipped() {
        let sheet = Stylesheet::parse(
            "/* page */ @page { size: A4; margin: 10mm; } div { width: 50%; margin: 0 0 8pt 0 }",
        );
        let div = first_element(r#"<div style="width: 100pt">x</div>"#);
        let style = resolve_style(&div, None, &sheet);
        assert_eq!(style.width, Dimension::Pt(100.0));
        assert_eq!(style.margin_bottom, 8.0);
    }

    #[test]
    fn border_shorthand_and_break_hints() {
        let sheet = Stylesheet::parse(
            "th, td { border: 0.5pt solid #999999; } .section { break-inside: avoid; }",
        );
        let th = first_element("<th>x</th>");
        let style = resolve_style(&th, None, &sheet);
        assert_eq!(style.border_width, 0.5);
        assert!((style.border_color.r - 0.6).abs() < 0.01);
        let section = first_element(r#"<div class="section">x</div>"#);
        assert!(resolve_style(&section, None, &sheet).break_inside_avoid);
    }

    #[test]
    fn text_properties_inherit_box_properties_do_not() {
        let sheet = Stylesheet::parse("div { font-size: 9pt; padding: 4pt; color: #ff0000 }");
        let nodes = parse_html("<div><p>child</p></div>");
        let styled = build_styled_tree(&nodes, None, &sheet);
        let StyledNode::Element { children, .. } = &styled[0] else {
            panic!("expected element");
        };
        let StyledNode::Element { style, .. } = &children[0] else {
            panic!("expected element");
        };
        assert_eq!(style.font_size, 9.0);
        assert_eq!(style.padding_top, 0.0);
        assert!((style.color.r - 1.0).abs() < 0.01);
    }

    #[test]
    fn body_rule_reaches_body_children() {
        let html = "<html><head><style>body { font-size: 9pt; font-family: Georgia }</style></head>\
                    <body><table><tr><td>cell</td></tr></table></body></html>";
        let dom = parse_html(html);
        let sheet = Stylesheet::parse(&crate::engine::dom::stylesheet_text(&dom));
        let root = root_style(&dom, &sheet).unwrap();
        assert_eq!(root.font_size, 9.0);

        let body = crate::engine::dom::body_children(&dom);
        let styled = build_styled_tree(&body, Some(&root), &sheet);
        let StyledNode::Element { style, .. } = &styled[0] else {
            panic!("expected element");
        };
        assert_eq!(style.font_size, 9.0);
        assert_eq!(style.font_family, "Georgia");
        assert!(root_style(&parse_html("<p>x</p>"), &sheet).is_none());
    }

    #[test]
    fn head_content_is_not_rendered() {
        let nodes = parse_html("<head><title>T</title></head><p>x</p>");
        let styled = build_styled_tree(&nodes, None, &Stylesheet::default());
        assert_eq!(styled.len(), 1);
    }

    #[test]
    fn color_from_hex() {
        let c = Color::from_hex("#ff8800").unwrap();
        assert!((c.r - 1.0).abs() < 0.01);
        assert!((c.g - 0.533).abs() < 0.01);
        assert_eq!(Color::from_hex("#eee"), Some(Color::rgb(238.0 / 255.0, 238.0 / 255.0, 238.0 / 255.0)));
    }
}
