//! The built-in in-process engine.
//!
//! Launching loads the configured font files once; every page opened on the
//! instance shares them read-only. Terminating flips a flag that makes any
//! later or in-flight print on the instance fail with
//! [`EngineError::Closed`].

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::engine::dom::{body_children, parse_html, stylesheet_text};
use crate::engine::fonts::{FontManager, SYSTEM_DEVANAGARI_FONTS};
use crate::engine::layout::compute_layout;
use crate::engine::page_tree::PageTree;
use crate::engine::pagination::paginate;
use crate::engine::render::render_pdf;
use crate::engine::style::{build_styled_tree, root_style, Stylesheet};
use crate::engine::{EngineInstance, EnginePage, PageSetup, RenderEngine};
use crate::error::{ConfigError, EngineError};

/// A font file to register under a family name, written `family=path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSource {
    pub family: String,
    pub path: PathBuf,
}

impl FromStr for FontSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (family, path) = s
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidFontMapping(s.to_string()))?;
        let (family, path) = (family.trim(), path.trim());
        if family.is_empty() || path.is_empty() {
            return Err(ConfigError::InvalidFontMapping(s.to_string()));
        }
        Ok(FontSource {
            family: family.to_string(),
            path: PathBuf::from(path),
        })
    }
}

/// Markup → PDF engine built on Taffy and printpdf.
///
/// With no configured fonts, launch looks for an installed Devanagari face
/// in [`SYSTEM_DEVANAGARI_FONTS`].
#[derive(Debug, Clone, Default)]
pub struct ForgeEngine {
    fonts: Vec<FontSource>,
    skip_system_fonts: bool,
}

impl ForgeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fonts(mut self, fonts: Vec<FontSource>) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn without_system_fonts(mut self) -> Self {
        self.skip_system_fonts = true;
        self
    }

    fn load_fonts(&self) -> Result<FontManager, EngineError> {
        let mut fonts = FontManager::new();
        for source in &self.fonts {
            fonts
                .load_font_file(&source.family, &source.path)
                .map_err(|e| EngineError::Launch(e.to_string()))?;
        }
        if self.fonts.is_empty() && !self.skip_system_fonts {
            match fonts.load_first_available(SYSTEM_DEVANAGARI_FONTS) {
                Some(family) => info!("forge: using installed face '{family}' for Devanagari"),
                None => warn!(
                    "forge: no Devanagari face configured or installed; Hindi text will print as '?'"
                ),
            }
        }
        Ok(fonts)
    }
}

impl RenderEngine for ForgeEngine {
    fn name(&self) -> &str {
        "forge"
    }

    fn launch(&self) -> Result<Arc<dyn EngineInstance>, EngineError> {
        let fonts = self.load_fonts()?;
        info!(
            "forge: engine launched with {} font face(s) {:?}",
            fonts.families().len(),
            fonts.families()
        );
        Ok(Arc::new(ForgeInstance {
            fonts: Arc::new(fonts),
            alive: Arc::new(AtomicBool::new(true)),
        }))
    }
}

struct ForgeInstance {
    fonts: Arc<FontManager>,
    alive: Arc<AtomicBool>,
}

impl EngineInstance for ForgeInstance {
    fn open_page(&self) -> Result<Box<dyn EnginePage>, EngineError> {
        if !self.is_alive() {
            return Err(EngineError::Closed);
        }
        Ok(Box::new(ForgePage {
            fonts: Arc::clone(&self.fonts),
            alive: Arc::clone(&self.alive),
        }))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn terminate(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            debug!("forge: instance terminated");
        }
    }
}

struct ForgePage {
    fonts: Arc<FontManager>,
    alive: Arc<AtomicBool>,
}

impl EnginePage for ForgePage {
    fn print_pdf(&mut self, markup: &str, setup: &PageSetup) -> Result<Vec<u8>, EngineError> {
        if !self.alive.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }
        let tree = layout_markup(markup, setup, &self.fonts)?;
        if !self.alive.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }
        render_pdf(&tree, &self.fonts)
    }
}

/// Lay out markup and return the page tree without emitting PDF.
pub fn layout_markup(
    markup: &str,
    setup: &PageSetup,
    fonts: &FontManager,
) -> Result<PageTree, EngineError> {
    let dom = parse_html(markup);
    let sheet = Stylesheet::parse(&stylesheet_text(&dom));
    let root = root_style(&dom, &sheet);
    let body = body_children(&dom);
    let styled = build_styled_tree(&body, root.as_ref(), &sheet);
    let boxes = compute_layout(&styled, setup, fonts)?;
    let tree = paginate(&boxes, setup, fonts);
    debug!(
        "forge: '{}' laid out on {} page(s)",
        setup.title,
        tree.pages.len()
    );
    Ok(tree)
}

/// Print markup without an engine instance. Used by the CLI and tests.
pub fn print_markup(
    markup: &str,
    setup: &PageSetup,
    fonts: &FontManager,
) -> Result<Vec<u8>, EngineError> {
    let tree = layout_markup(markup, setup, fonts)?;
    render_pdf(&tree, fonts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout_config::LayoutConfig;

    fn setup() -> PageSetup {
        LayoutConfig::single_column().page_setup("Test")
    }

    #[test]
    fn font_source_parses_family_and_path() {
        let src: FontSource = "Noto Sans Devanagari = /fonts/noto.ttf".parse().unwrap();
        assert_eq!(src.family, "Noto Sans Devanagari");
        assert_eq!(src.path, PathBuf::from("/fonts/noto.ttf"));
        assert!("no-equals".parse::<FontSource>().is_err());
        assert!("=/x.ttf".parse::<FontSource>().is_err());
    }

    #[test]
    fn missing_font_file_fails_launch() {
        let engine = ForgeEngine::new().with_fonts(vec![FontSource {
            family: "Ghost".into(),
            path: PathBuf::from("/definitely/not/here.ttf"),
        }]);
        assert!(matches!(engine.launch(), Err(EngineError::Launch(_))));
    }

    #[test]
    fn installed_faces_are_used_only_without_configuration() {
        let fonts = ForgeEngine::new().without_system_fonts().load_fonts().unwrap();
        assert!(fonts.is_empty());

        let found = ForgeEngine::new().load_fonts().unwrap();
        let installed = FontManager::new().load_first_available(SYSTEM_DEVANAGARI_FONTS);
        assert_eq!(found.families().first().map(|f| f.to_string()), installed);
    }

    #[test]
    fn page_prints_pdf() {
        let instance = ForgeEngine::new().launch().unwrap();
        let mut page = instance.open_page().unwrap();
        let pdf = page
            .print_pdf("<html><body><p>Hello</p></body></html>", &setup())
            .unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
    }

    #[test]
    fn terminated_instance_refuses_work() {
        let instance = ForgeEngine::new().launch().unwrap();
        let mut page = instance.open_page().unwrap();
        instance.terminate();
        assert!(!instance.is_alive());
        assert!(matches!(instance.open_page(), Err(EngineError::Closed)));
        assert!(matches!(
            page.print_pdf("<p>x</p>", &setup()),
            Err(EngineError::Closed)
        ));
    }
}
