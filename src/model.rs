//! Canonical document model and the request payload shapes it is built from.

use serde::{Deserialize, Serialize};

use crate::layout_config::LayoutPreset;

/// One glossary entry. All three fields are non-empty after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub serial: String,
    pub english: String,
    pub hindi: String,
}

impl Row {
    pub fn new(
        serial: impl Into<String>,
        english: impl Into<String>,
        hindi: impl Into<String>,
    ) -> Self {
        Self {
            serial: serial.into(),
            english: english.into(),
            hindi: hindi.into(),
        }
    }
}

/// A titled group of rows, built from one input card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub rows: Vec<Row>,
}

/// The unit serialized to markup. `sections` is never empty when built by
/// [`crate::normalize::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub sections: Vec<Section>,
}

impl Document {
    pub fn row_count(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }
}

/// One card of the inbound payload: a section title plus an HTML fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInput {
    pub title: String,
    /// HTML fragment expected to contain the glossary table.
    pub description: String,
}

/// A validated inbound payload. [`LessonRequest::from_json`] reports every
/// shape violation at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRequest {
    pub title: String,
    pub cards: Vec<CardInput>,
    /// Per-request layout override; the service default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutPreset>,
}

impl LessonRequest {
    pub fn new(title: impl Into<String>, cards: Vec<CardInput>) -> Self {
        Self {
            title: title.into(),
            cards,
            layout: None,
        }
    }
}

impl CardInput {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}
