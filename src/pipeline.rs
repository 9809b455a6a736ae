//! Pipeline – ties together validation, normalization, markup rendering and
//! the engine into a single call.
//!
//! Everything up to the markup string is synchronous and pure; the only
//! suspension point is the print on the [`RenderManager`].

use std::sync::Arc;

use log::{debug, info};

use crate::config::ServiceConfig;
use crate::engine::{ForgeEngine, PageSetup};
use crate::error::ForgeError;
use crate::layout_config::{FontTier, LayoutConfig, LayoutPreset};
use crate::manager::RenderManager;
use crate::markup;
use crate::model::{Document, LessonRequest};
use crate::normalize::normalize;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A rendered PDF and how to deliver it.
#[derive(Debug, Clone)]
pub struct PdfOutput {
    pub bytes: Vec<u8>,
    /// Suggested download name, always ending in `.pdf`.
    pub filename: String,
    pub content_type: &'static str,
}

/// A request taken as far as it goes without the engine.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub document: Document,
    pub preset: LayoutPreset,
    pub layout: LayoutConfig,
    pub markup: String,
    pub setup: PageSetup,
}

/// Normalize a request and render its markup. The request's own layout
/// wins over `default_preset`.
pub fn prepare(
    request: &LessonRequest,
    default_preset: LayoutPreset,
) -> Result<PreparedDocument, ForgeError> {
    prepare_with(request, default_preset, None)
}

/// [`prepare`] with the preset's type sizes replaced by `font_tier`.
pub fn prepare_with(
    request: &LessonRequest,
    default_preset: LayoutPreset,
    font_tier: Option<FontTier>,
) -> Result<PreparedDocument, ForgeError> {
    let document = normalize(&request.title, &request.cards)?;
    let preset = request.layout.unwrap_or(default_preset);
    let layout = match font_tier {
        Some(tier) => preset.config().with_font_tier(tier),
        None => preset.config(),
    };
    let markup = markup::render(&document, &layout);
    let setup = layout.page_setup(&document.title);
    debug!(
        "pipeline: '{}' -> {} section(s), {} row(s), {preset}, {} bytes of markup",
        document.title,
        document.sections.len(),
        document.row_count(),
        markup.len()
    );
    Ok(PreparedDocument {
        document,
        preset,
        layout,
        markup,
        setup,
    })
}

/// Markup only, no engine involved.
pub fn render_markup(
    request: &LessonRequest,
    default_preset: LayoutPreset,
) -> Result<String, ForgeError> {
    Ok(prepare(request, default_preset)?.markup)
}

/// Download name for a title: ASCII letters and digits, other runs folded
/// to `-`. Falls back to `fallback` when nothing usable is left.
pub fn filename_for(title: &str, fallback: &str) -> String {
    let slug = slugify(title);
    let stem = if slug.is_empty() {
        let fallback = fallback.trim();
        let fallback = fallback.strip_suffix(".pdf").unwrap_or(fallback);
        match slugify(fallback) {
            s if s.is_empty() => "lesson".to_string(),
            s => s,
        }
    } else {
        slug
    };
    format!("{stem}.pdf")
}

fn slugify(s: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// The document service: request in, PDF out.
pub struct PdfService {
    manager: Arc<RenderManager>,
    layout: LayoutPreset,
    font_tier: Option<FontTier>,
    default_filename: String,
}

impl PdfService {
    pub fn new(manager: Arc<RenderManager>, config: &ServiceConfig) -> Self {
        Self {
            manager,
            layout: config.layout,
            font_tier: config.font_tier,
            default_filename: config.default_filename.clone(),
        }
    }

    /// A service backed by the built-in engine with the configured fonts.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let engine = ForgeEngine::new().with_fonts(config.fonts.clone());
        Self::new(Arc::new(RenderManager::new(Arc::new(engine))), config)
    }

    pub fn manager(&self) -> &Arc<RenderManager> {
        &self.manager
    }

    pub fn layout(&self) -> LayoutPreset {
        self.layout
    }

    pub async fn generate(&self, request: &LessonRequest) -> Result<PdfOutput, ForgeError> {
        let prepared = prepare_with(request, self.layout, self.font_tier)?;
        let bytes = self.manager.render(&prepared.markup, &prepared.setup).await?;
        let filename = filename_for(&prepared.document.title, &self.default_filename);
        info!(
            "pipeline: rendered '{}' ({} rows, {}) to {} bytes as {filename}",
            prepared.document.title,
            prepared.document.row_count(),
            prepared.preset,
            bytes.len()
        );
        Ok(PdfOutput {
            bytes,
            filename,
            content_type: PDF_CONTENT_TYPE,
        })
    }

    /// Validate a raw JSON body, then [`generate`](Self::generate).
    pub async fn generate_from_json(&self, body: &[u8]) -> Result<PdfOutput, ForgeError> {
        let request = LessonRequest::from_json(body)?;
        self.generate(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout_config::ColumnMode;
    use crate::model::CardInput;

    fn request() -> LessonRequest {
        LessonRequest::new(
            "Lesson 22",
            vec![CardInput::new(
                "Greetings",
                "<table><tbody><tr><td>1</td><td>Hello</td><td>नमस्ते</td></tr></tbody></table>",
            )],
        )
    }

    #[test]
    fn filenames_are_slugged() {
        assert_eq!(filename_for("Lesson 22", "lesson"), "lesson-22.pdf");
        assert_eq!(filename_for("  Unit 3: Verbs & Nouns! ", "x"), "unit-3-verbs-nouns.pdf");
        assert_eq!(filename_for("पाठ", "glossary"), "glossary.pdf");
        assert_eq!(filename_for("पाठ", "glossary.pdf"), "glossary.pdf");
        assert_eq!(filename_for("", "  "), "lesson.pdf");
    }

    #[test]
    fn request_layout_overrides_default() {
        let mut req = request();
        let prepared = prepare(&req, LayoutPreset::SingleColumn).unwrap();
        assert_eq!(prepared.layout.columns, ColumnMode::Single);

        req.layout = Some(LayoutPreset::TwoColumn);
        let prepared = prepare(&req, LayoutPreset::SingleColumn).unwrap();
        assert_eq!(prepared.preset, LayoutPreset::TwoColumn);
        assert!(prepared.markup.contains("class=\"panes\""));
    }

    #[test]
    fn font_tier_replaces_preset_sizes() {
        let req = request();
        let prepared = prepare(&req, LayoutPreset::CompactTwoColumn).unwrap();
        assert!(prepared.markup.contains("font-size: 9pt"));

        let prepared =
            prepare_with(&req, LayoutPreset::CompactTwoColumn, Some(FontTier::Large)).unwrap();
        assert_eq!(prepared.layout.font_tier, FontTier::Large);
        assert!(prepared.markup.contains("font-size: 12pt"));
        assert!(!prepared.markup.contains("font-size: 9pt"));
    }

    #[test]
    fn empty_cards_never_reach_markup() {
        let req = LessonRequest::new("T", vec![CardInput::new("A", "<p>no table here</p>")]);
        assert!(matches!(
            render_markup(&req, LayoutPreset::default()),
            Err(ForgeError::EmptyExtraction)
        ));
    }

    #[tokio::test]
    async fn service_generates_pdf() {
        let service = PdfService::from_config(&ServiceConfig::default());
        let out = service.generate(&request()).await.unwrap();
        assert!(out.bytes.starts_with(b"%PDF-"));
        assert_eq!(out.filename, "lesson-22.pdf");
        assert_eq!(out.content_type, PDF_CONTENT_TYPE);
        assert_eq!(service.manager().launch_count(), 1);
    }
}
