//! Layout configuration – the immutable set of page and typography choices
//! the markup renderer works from, and the named presets that produce them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::PageSetup;
use crate::error::ConfigError;

const PT_PER_MM: f32 = 72.0 / 25.4;

/// Named layout strategies selectable by configuration or per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutPreset {
    /// One table per section; rows may break across pages.
    #[default]
    SingleColumn,
    /// Each section split into two side-by-side tables.
    TwoColumn,
    /// Two-column with smaller type and tighter margins.
    CompactTwoColumn,
}

impl LayoutPreset {
    pub const ALL: [LayoutPreset; 3] = [
        LayoutPreset::SingleColumn,
        LayoutPreset::TwoColumn,
        LayoutPreset::CompactTwoColumn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayoutPreset::SingleColumn => "single-column",
            LayoutPreset::TwoColumn => "two-column",
            LayoutPreset::CompactTwoColumn => "compact-two-column",
        }
    }

    pub fn config(self) -> LayoutConfig {
        match self {
            LayoutPreset::SingleColumn => LayoutConfig::single_column(),
            LayoutPreset::TwoColumn => LayoutConfig::two_column(),
            LayoutPreset::CompactTwoColumn => LayoutConfig::compact_two_column(),
        }
    }
}

impl fmt::Display for LayoutPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        LayoutPreset::ALL
            .into_iter()
            .find(|p| p.as_str() == needle)
            .ok_or_else(|| ConfigError::UnknownLayout(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageSize {
    A4,
    Letter,
}

impl PageSize {
    /// Portrait size in points.
    pub fn dimensions_pt(self) -> (f32, f32) {
        match self {
            // 210mm × 297mm
            PageSize::A4 => (595.28, 841.89),
            // 8.5in × 11in
            PageSize::Letter => (612.0, 792.0),
        }
    }

    /// Keyword for the `@page size` descriptor.
    pub fn css_name(self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::Letter => "letter",
        }
    }
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnMode {
    Single,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontTier {
    Compact,
    Regular,
    Large,
}

/// Type sizes in points for one [`FontTier`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeScale {
    pub body: f32,
    pub hindi: f32,
    pub title: f32,
    pub section: f32,
}

impl FontTier {
    pub const ALL: [FontTier; 3] = [FontTier::Compact, FontTier::Regular, FontTier::Large];

    pub fn as_str(self) -> &'static str {
        match self {
            FontTier::Compact => "compact",
            FontTier::Regular => "regular",
            FontTier::Large => "large",
        }
    }

    pub fn scale(self) -> TypeScale {
        let (body, hindi, title, section) = match self {
            FontTier::Compact => (9.0, 10.0, 14.0, 11.0),
            FontTier::Regular => (10.0, 11.0, 16.0, 12.0),
            FontTier::Large => (12.0, 13.0, 18.0, 14.0),
        };
        TypeScale {
            body,
            hindi,
            title,
            section,
        }
    }
}

impl fmt::Display for FontTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FontTier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        FontTier::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| ConfigError::UnknownFontTier(s.to_string()))
    }
}

/// Whether table rows may be split across a page boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowBreak {
    Allow,
    Avoid,
}

/// Everything the markup renderer needs to know about page geometry and
/// typography. Built from a [`LayoutPreset`]; never mutated during a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub page: PageSize,
    pub margins_mm: Margins,
    pub columns: ColumnMode,
    pub font_tier: FontTier,
    pub row_break: RowBreak,
    /// Horizontal gap between the two panes, in millimetres.
    pub pane_gap_mm: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::single_column()
    }
}

impl LayoutConfig {
    pub fn single_column() -> Self {
        Self {
            page: PageSize::A4,
            margins_mm: Margins::new(18.0, 15.0, 18.0, 15.0),
            columns: ColumnMode::Single,
            font_tier: FontTier::Regular,
            row_break: RowBreak::Allow,
            pane_gap_mm: 0.0,
        }
    }

    pub fn two_column() -> Self {
        Self {
            page: PageSize::A4,
            margins_mm: Margins::new(12.0, 10.0, 12.0, 10.0),
            columns: ColumnMode::Two,
            font_tier: FontTier::Regular,
            row_break: RowBreak::Avoid,
            pane_gap_mm: 6.0,
        }
    }

    pub fn compact_two_column() -> Self {
        Self {
            margins_mm: Margins::new(10.0, 8.0, 10.0, 8.0),
            font_tier: FontTier::Compact,
            pane_gap_mm: 4.0,
            ..Self::two_column()
        }
    }

    pub fn with_page(mut self, page: PageSize) -> Self {
        self.page = page;
        self
    }

    pub fn with_font_tier(mut self, tier: FontTier) -> Self {
        self.font_tier = tier;
        self
    }

    /// Page-size and margin directive handed to the rendering engine.
    pub fn page_setup(&self, title: &str) -> PageSetup {
        let (width_pt, height_pt) = self.page.dimensions_pt();
        let m = self.margins_mm;
        PageSetup {
            title: title.to_string(),
            width_pt,
            height_pt,
            margin_top_pt: m.top * PT_PER_MM,
            margin_right_pt: m.right * PT_PER_MM,
            margin_bottom_pt: m.bottom * PT_PER_MM,
            margin_left_pt: m.left * PT_PER_MM,
        }
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_parse_case_insensitively() {
        assert_eq!("Two-Column".parse::<LayoutPreset>().unwrap(), LayoutPreset::TwoColumn);
        assert_eq!(
            " compact-two-column ".parse::<LayoutPreset>().unwrap(),
            LayoutPreset::CompactTwoColumn
        );
        assert!("three-column".parse::<LayoutPreset>().is_err());
    }

    #[test]
    fn preset_names_round_trip_through_serde() {
        for preset in LayoutPreset::ALL {
            let json = serde_json::to_string(&preset).unwrap();
            assert_eq!(json, format!("\"{preset}\""));
            let back: LayoutPreset = serde_json::from_str(&json).unwrap();
            assert_eq!(back, preset);
        }
    }

    #[test]
    fn presets_differ_in_columns_and_break_policy() {
        let single = LayoutPreset::SingleColumn.config();
        let two = LayoutPreset::TwoColumn.config();
        let compact = LayoutPreset::CompactTwoColumn.config();
        assert_eq!(single.columns, ColumnMode::Single);
        assert_eq!(single.row_break, RowBreak::Allow);
        assert_eq!(two.columns, ColumnMode::Two);
        assert_eq!(two.row_break, RowBreak::Avoid);
        assert_eq!(compact.font_tier, FontTier::Compact);
        assert!(compact.margins_mm.top < two.margins_mm.top);
    }

    #[test]
    fn font_tier_overrides_preset_typography() {
        assert_eq!("LARGE".parse::<FontTier>().unwrap(), FontTier::Large);
        assert!("huge".parse::<FontTier>().is_err());

        let large = LayoutPreset::CompactTwoColumn
            .config()
            .with_font_tier(FontTier::Large);
        assert_eq!(large.font_tier.scale().body, 12.0);
        assert_eq!(large.columns, ColumnMode::Two);
    }

    #[test]
    fn page_setup_converts_millimetres() {
        let setup = LayoutConfig::single_column().page_setup("Lesson");
        assert_eq!(setup.title, "Lesson");
        assert!((setup.width_pt - 595.28).abs() < 0.01);
        // 18mm ≈ 51.02pt
        assert!((setup.margin_top_pt - 51.02).abs() < 0.05);
        let letter = LayoutConfig::two_column().with_page(PageSize::Letter).page_setup("x");
        assert_eq!(letter.height_pt, 792.0);
    }

    #[test]
    fn config_json_round_trip() {
        let cfg = LayoutConfig::compact_two_column();
        let back = LayoutConfig::from_json(&cfg.to_json()).unwrap();
        assert_eq!(back, cfg);
    }
}
