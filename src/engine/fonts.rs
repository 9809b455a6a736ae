//! Font loading and text measurement.
//!
//! TrueType faces are registered by family name and measured by shaping with
//! `rustybuzz`, which matters for Devanagari where conjuncts and vowel signs
//! make per-character advances meaningless. Text that no loaded face covers
//! falls back to the builtin Helvetica with heuristic metrics.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, warn};

use crate::error::EngineError;

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Display name the face was registered under.
    pub family: String,
    /// Raw font bytes, kept for shaping and PDF embedding.
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

/// Which face and size to measure or draw text with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec<'a> {
    /// Loaded family, or `None` for the builtin Helvetica.
    pub face: Option<&'a str>,
    pub size: f32,
    pub bold: bool,
}

/// Usual install locations of Devanagari faces, tried in order when no font
/// is configured.
pub const SYSTEM_DEVANAGARI_FONTS: &[(&str, &str)] = &[
    ("Noto Sans Devanagari", "/usr/share/fonts/truetype/noto/NotoSansDevanagari-Regular.ttf"),
    ("Noto Sans Devanagari", "/usr/share/fonts/noto/NotoSansDevanagari-Regular.ttf"),
    ("Noto Sans Devanagari", "/usr/share/fonts/google-noto/NotoSansDevanagari-Regular.ttf"),
    ("Lohit Devanagari", "/usr/share/fonts/truetype/lohit-devanagari/Lohit-Devanagari.ttf"),
    ("Lohit Devanagari", "/usr/share/fonts/lohit-devanagari/Lohit-Devanagari.ttf"),
    ("Nirmala UI", "C:/Windows/Fonts/Nirmala.ttf"),
    ("Mangal", "C:/Windows/Fonts/mangal.ttf"),
];

/// Registry of loaded faces, shared read-only by concurrent prints.
#[derive(Default)]
pub struct FontManager {
    /// Keyed by lower-cased family name.
    faces: HashMap<String, FontData>,
}

impl FontManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a TTF/OTF face under `family`.
    pub fn load_font(&mut self, family: &str, bytes: Vec<u8>) -> Result<(), EngineError> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| EngineError::Font(format!("failed to parse font '{family}': {e}")))?;

        let data = FontData {
            family: family.to_string(),
            units_per_em: f32::from(face.units_per_em()),
            ascender: f32::from(face.ascender()),
            descender: f32::from(face.descender()),
            bytes,
        };
        debug!("fonts: registered '{family}' ({} bytes)", data.bytes.len());
        self.faces.insert(family.to_ascii_lowercase(), data);
        Ok(())
    }

    /// Read and register a font file.
    pub fn load_font_file(&mut self, family: &str, path: &Path) -> Result<(), EngineError> {
        let bytes = std::fs::read(path).map_err(|e| {
            EngineError::Font(format!("cannot read font file '{}': {e}", path.display()))
        })?;
        self.load_font(family, bytes)
    }

    /// Register the first candidate `(family, path)` that exists and parses,
    /// returning its family.
    pub fn load_first_available(&mut self, candidates: &[(&str, &str)]) -> Option<String> {
        for &(family, path) in candidates {
            let path = Path::new(path);
            if !path.is_file() {
                continue;
            }
            match self.load_font_file(family, path) {
                Ok(()) => return Some(family.to_string()),
                Err(e) => warn!("fonts: skipping {}: {e}", path.display()),
            }
        }
        None
    }

    pub fn get(&self, family: &str) -> Option<&FontData> {
        self.faces.get(&family.to_ascii_lowercase())
    }

    /// Registered family names, sorted.
    pub fn families(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.faces.values().map(|d| d.family.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Pick the face to draw `text` with, given a CSS `font-family` stack.
    ///
    /// The first loaded family in the stack that has glyphs for every
    /// character wins. ASCII text with no match uses the builtin font; other
    /// text falls back to any loaded face that covers it.
    pub fn choose_face(&self, stack: &str, text: &str) -> Option<String> {
        let from_stack = stack
            .split(',')
            .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\''))
            .filter_map(|f| self.get(f))
            .find(|data| covers(data, text));
        if let Some(data) = from_stack {
            return Some(data.family.clone());
        }
        if text.is_ascii() {
            return None;
        }
        let fallback = self
            .families()
            .into_iter()
            .filter_map(|f| self.get(f))
            .find(|data| covers(data, text))
            .map(|data| data.family.clone());
        if fallback.is_none() {
            debug!("fonts: no loaded face covers {text:?}");
        }
        fallback
    }

    /// Width of `text` in points.
    pub fn measure_text_width(&self, text: &str, spec: &FontSpec<'_>) -> f32 {
        if let Some(data) = spec.face.and_then(|f| self.get(f)) {
            if let Some(width) = shaped_width(data, text, spec.size) {
                return width;
            }
        }
        // Heuristic: average char width ≈ 0.5 × font size, bold ~10 % wider.
        let avg = if spec.bold { 0.55 } else { 0.5 };
        text.chars().count() as f32 * spec.size * avg
    }

    /// Distance from the top of a line box to the baseline, in points.
    pub fn ascender_pt(&self, spec: &FontSpec<'_>) -> f32 {
        match spec.face.and_then(|f| self.get(f)) {
            Some(data) if data.units_per_em > 0.0 => data.ascender * spec.size / data.units_per_em,
            _ => spec.size * 0.75,
        }
    }
}

fn covers(data: &FontData, text: &str) -> bool {
    let Ok(face) = ttf_parser::Face::parse(&data.bytes, 0) else {
        return false;
    };
    text.chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .all(|c| face.glyph_index(c).is_some())
}

fn shaped_width(data: &FontData, text: &str, size: f32) -> Option<f32> {
    let face = rustybuzz::Face::from_slice(&data.bytes, 0)?;
    let mut buffer = rustybuzz::UnicodeBuffer::new();
    buffer.push_str(text);
    buffer.guess_segment_properties();
    let glyphs = rustybuzz::shape(&face, &[], buffer);
    let advance: i32 = glyphs.glyph_positions().iter().map(|p| p.x_advance).sum();
    Some(advance as f32 * size / data.units_per_em.max(1.0))
}

/// Word-wrap text to fit within `max_width` points. Existing newlines are
/// kept as hard breaks; a single word wider than the line stays whole.
pub fn wrap_text(
    text: &str,
    spec: &FontSpec<'_>,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current_line = String::new();
        for word in &words {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{current_line} {word}")
            };
            let w = fonts.measure_text_width(&candidate, spec);
            if max_width > 0.0 && w > max_width && !current_line.is_empty() {
                lines.push(std::mem::replace(&mut current_line, word.to_string()));
            } else {
                current_line = candidate;
            }
        }
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELVETICA: FontSpec<'static> = FontSpec {
        face: None,
        size: 16.0,
        bold: false,
    };

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::default();
        // 5 chars × 16 × 0.5 = 40
        assert!((mgr.measure_text_width("Hello", &HELVETICA) - 40.0).abs() < 0.1);
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::default();
        let lines = wrap_text("Hello world foo bar", &HELVETICA, 60.0, &mgr);
        assert!(lines.len() >= 2, "expected wrapping, got {lines:?}");
        assert_eq!(lines.join(" "), "Hello world foo bar");
    }

    #[test]
    fn first_available_skips_missing_and_broken_files() {
        let broken = std::env::temp_dir().join(format!("lforge-broken-{}.ttf", std::process::id()));
        std::fs::write(&broken, b"not a font").unwrap();
        let broken_path = broken.to_string_lossy().into_owned();

        let mut mgr = FontManager::new();
        let found = mgr.load_first_available(&[
            ("Ghost", "/definitely/not/here.ttf"),
            ("Broken", broken_path.as_str()),
        ]);
        assert_eq!(found, None);
        assert!(mgr.is_empty());
        let _ = std::fs::remove_file(broken);
    }

    #[test]
    fn hard_breaks_are_kept() {
        let mgr = FontManager::default();
        let lines = wrap_text("Good\nmorning", &HELVETICA, 500.0, &mgr);
        assert_eq!(lines, vec!["Good", "morning"]);
    }

    #[test]
    fn unparseable_font_is_rejected() {
        let mut mgr = FontManager::new();
        let err = mgr.load_font("Broken", vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, EngineError::Font(_)));
        assert!(mgr.is_empty());
    }

    #[test]
    fn builtin_is_chosen_without_loaded_faces() {
        let mgr = FontManager::new();
        assert_eq!(mgr.choose_face("\"Noto Sans Devanagari\", sans-serif", "नमस्ते"), None);
        assert_eq!(mgr.choose_face("Helvetica", "Hello"), None);
    }
}
