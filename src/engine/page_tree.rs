//! Page tree – the frozen per-page drawing list between pagination and PDF
//! emission. Every box carries page-absolute coordinates (origin top-left,
//! points), in painting order.

use serde::{Deserialize, Serialize};

/// A complete paginated document ready for emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTree {
    pub title: String,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub pages: Vec<PageLayout>,
}

/// One page of content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional decoration and text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub background_color: Option<[f32; 4]>,
    pub border: Option<BorderStyle>,
    pub text: Option<TextContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub lines: Vec<TextLine>,
    /// Loaded face to draw with; `None` means builtin Helvetica.
    pub face: Option<String>,
    pub font_size: f32,
    pub bold: bool,
    pub color: [f32; 4],
    /// Offset from the top of a line to its baseline.
    pub ascent: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// X offset within the layout box (for alignment)
    pub x_offset: f32,
    /// Y offset from the top of the layout box
    pub y_offset: f32,
}

impl PageTree {
    pub fn new(title: &str, page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            title: title.to_string(),
            page_width_pt,
            page_height_pt,
            pages: Vec::new(),
        }
    }

    /// Every line of text on every page, in painting order.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.pages
            .iter()
            .flat_map(|p| p.boxes.iter())
            .filter_map(|b| b.text.as_ref())
            .flat_map(|t| t.lines.iter().map(|l| l.text.as_str()))
    }

    /// Faces referenced by any text box, sorted and de-duplicated.
    pub fn faces(&self) -> Vec<&str> {
        let mut faces: Vec<&str> = self
            .pages
            .iter()
            .flat_map(|p| p.boxes.iter())
            .filter_map(|b| b.text.as_ref()?.face.as_deref())
            .collect();
        faces.sort_unstable();
        faces.dedup();
        faces
    }

    /// Serialise to JSON (debug dumps).
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            border: None,
            text: None,
        }
    }
}
