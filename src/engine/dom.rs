//! Markup loader – builds a DOM tree from the [`crate::scan`] token stream.
//!
//! The builder is forgiving the way browsers are for the small element set
//! print markup uses: void elements never take children, `<tr>`, `<td>`,
//! `<th>` and `<p>` close implicitly, stray end tags are ignored and anything
//! still open at the end of input is closed.

use std::collections::HashMap;

use crate::entities::decode_entities;
use crate::scan::{Scanner, Token};

/// The tag name of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Title,
    Style,
    Script,
    Meta,
    Body,
    Div,
    P,
    H1,
    H2,
    H3,
    Span,
    B,
    Strong,
    Br,
    Table,
    Thead,
    Tbody,
    Tr,
    Th,
    Td,
    /// Kept in the tree, laid out as a plain block.
    Unknown(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        match s {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "title" => Tag::Title,
            "style" => Tag::Style,
            "script" => Tag::Script,
            "meta" => Tag::Meta,
            "body" => Tag::Body,
            "div" | "section" | "article" | "header" | "footer" | "main" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "span" | "em" | "i" | "small" => Tag::Span,
            "b" => Tag::B,
            "strong" => Tag::Strong,
            "br" => Tag::Br,
            "table" => Tag::Table,
            "thead" => Tag::Thead,
            "tbody" | "tfoot" => Tag::Tbody,
            "tr" => Tag::Tr,
            "th" => Tag::Th,
            "td" => Tag::Td,
            other => Tag::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Tag::Html => "html",
            Tag::Head => "head",
            Tag::Title => "title",
            Tag::Style => "style",
            Tag::Script => "script",
            Tag::Meta => "meta",
            Tag::Body => "body",
            Tag::Div => "div",
            Tag::P => "p",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::Span => "span",
            Tag::B => "b",
            Tag::Strong => "strong",
            Tag::Br => "br",
            Tag::Table => "table",
            Tag::Thead => "thead",
            Tag::Tbody => "tbody",
            Tag::Tr => "tr",
            Tag::Th => "th",
            Tag::Td => "td",
            Tag::Unknown(name) => name,
        }
    }

    /// Elements that never have content.
    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Br | Tag::Meta)
            || matches!(self, Tag::Unknown(n) if matches!(n.as_str(), "img" | "hr" | "link" | "input" | "col" | "wbr"))
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Tag::Span | Tag::B | Tag::Strong | Tag::Br)
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, Tag::H1 | Tag::H2 | Tag::H3)
    }

    pub fn is_cell(&self) -> bool {
        matches!(self, Tag::Td | Tag::Th)
    }
}

/// A node in the DOM tree.
#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attributes.get("style").map(|s| s.as_str())
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

/// Parse markup into a list of top-level DOM nodes.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut builder = TreeBuilder::default();
    for token in Scanner::new(html) {
        builder.push(token);
    }
    builder.finish()
}

#[derive(Default)]
struct TreeBuilder {
    root: Vec<DomNode>,
    open: Vec<ElementNode>,
}

impl TreeBuilder {
    fn push(&mut self, token: Token<'_>) {
        match token {
            Token::StartTag(start) => {
                let tag = Tag::from_name(&start.name);
                self.close_implied_by(&tag);
                let mut elem = ElementNode::new(tag);
                elem.attributes = start.attrs.into_iter().collect();
                if start.self_closing || elem.tag.is_void() {
                    self.append(DomNode::Element(elem));
                } else {
                    self.open.push(elem);
                }
            }
            Token::EndTag(name) => {
                let tag = Tag::from_name(&name);
                if let Some(depth) = self.open.iter().rposition(|e| e.tag == tag) {
                    while self.open.len() > depth {
                        self.close_top();
                    }
                }
            }
            Token::Text(text) => {
                let raw = matches!(
                    self.open.last().map(|e| &e.tag),
                    Some(Tag::Style | Tag::Script)
                );
                let text = if raw {
                    text.to_string()
                } else {
                    decode_entities(text)
                };
                self.append(DomNode::Text(text));
            }
        }
    }

    /// Close elements that an opening `tag` ends implicitly.
    fn close_implied_by(&mut self, tag: &Tag) {
        let closes = |open: &Tag| match tag {
            Tag::Td | Tag::Th => open.is_cell(),
            Tag::Tr => open.is_cell() || *open == Tag::Tr,
            Tag::Thead | Tag::Tbody => {
                open.is_cell() || matches!(open, Tag::Tr | Tag::Thead | Tag::Tbody)
            }
            Tag::P | Tag::Div | Tag::Table | Tag::H1 | Tag::H2 | Tag::H3 => *open == Tag::P,
            _ => false,
        };
        while self.open.last().is_some_and(|e| closes(&e.tag)) {
            self.close_top();
        }
    }

    fn close_top(&mut self) {
        if let Some(elem) = self.open.pop() {
            self.append(DomNode::Element(elem));
        }
    }

    fn append(&mut self, node: DomNode) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root.push(node),
        }
    }

    fn finish(mut self) -> Vec<DomNode> {
        while !self.open.is_empty() {
            self.close_top();
        }
        self.root
    }
}

/// Find the `<body>` element and return its children, or return all nodes if
/// no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Body {
                return e.children.clone();
            }
            if e.tag == Tag::Html {
                let inner = body_children(&e.children);
                if !inner.is_empty() {
                    return inner;
                }
            }
        }
    }
    nodes.to_vec()
}

/// Concatenated content of every `<style>` element, in document order.
pub fn stylesheet_text(nodes: &[DomNode]) -> String {
    let mut css = String::new();
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Style {
                css.push_str(&e.text_content());
                css.push('\n');
            } else {
                css.push_str(&stylesheet_text(&e.children));
            }
        }
    }
    css
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &DomNode) -> &ElementNode {
        match node {
            DomNode::Element(e) => e,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn parse_div_with_classes() {
        let nodes = parse_html(r#"<div class="section avoid"><h2>Greetings</h2></div>"#);
        assert_eq!(nodes.len(), 1);
        let div = element(&nodes[0]);
        assert_eq!(div.tag, Tag::Div);
        assert_eq!(div.classes(), vec!["section", "avoid"]);
        assert_eq!(div.children.len(), 1);
    }

    #[test]
    fn void_elements_take_no_children() {
        let nodes = parse_html("<td>a<br>b</td>");
        let td = element(&nodes[0]);
        assert_eq!(td.children.len(), 3);
        assert_eq!(element(&td.children[1]).tag, Tag::Br);
    }

    #[test]
    fn table_parts_close_implicitly() {
        let nodes = parse_html("<table><tr><td>1<td>2<tr><td>3</table>");
        let table = element(&nodes[0]);
        assert_eq!(table.children.len(), 2);
        let first_row = element(&table.children[0]);
        assert_eq!(first_row.children.len(), 2);
    }

    #[test]
    fn stray_end_tags_are_ignored() {
        let nodes = parse_html("<p>a</span>b</p>");
        let p = element(&nodes[0]);
        assert_eq!(p.text_content(), "ab");
    }

    #[test]
    fn body_and_stylesheet_are_found() {
        let html = "<!DOCTYPE html><html><head><style>p { color: #f00 }</style></head>\
                    <body><p>x &amp; y</p></body></html>";
        let nodes = parse_html(html);
        assert_eq!(stylesheet_text(&nodes).trim(), "p { color: #f00 }");
        let body = body_children(&nodes);
        assert_eq!(element(&body[0]).text_content(), "x & y");
    }
}
