//! Rendering engine boundary and the built-in in-process engine.
//!
//! The pipeline hands an engine a complete markup document plus a
//! [`PageSetup`] and gets PDF bytes back. Everything behind that boundary is
//! swappable: [`crate::manager::RenderManager`] only sees the three traits
//! below.
//!
//! The built-in [`ForgeEngine`] runs these stages on every print:
//!
//! 1. **Load** – markup → DOM tree ([`dom`])
//! 2. **Style** – tag defaults, embedded stylesheet, inline styles ([`style`])
//! 3. **Layout** – flexbox layout with Taffy, text pre-wrapped ([`layout`])
//! 4. **Paginate** – split at row boundaries, honor break hints ([`pagination`])
//! 5. **Emit** – PDF bytes via printpdf ([`render`])

use std::sync::Arc;

pub mod dom;
pub mod fonts;
pub mod forge;
pub mod layout;
pub mod page_tree;
pub mod pagination;
pub mod render;
pub mod style;

pub use crate::error::EngineError;
pub use forge::{layout_markup, print_markup, FontSource, ForgeEngine};
pub use page_tree::PageTree;

/// Page size and margins for one print, in PDF points.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSetup {
    /// Embedded in the PDF metadata.
    pub title: String,
    pub width_pt: f32,
    pub height_pt: f32,
    pub margin_top_pt: f32,
    pub margin_right_pt: f32,
    pub margin_bottom_pt: f32,
    pub margin_left_pt: f32,
}

impl PageSetup {
    pub fn content_width(&self) -> f32 {
        (self.width_pt - self.margin_left_pt - self.margin_right_pt).max(1.0)
    }

    pub fn content_height(&self) -> f32 {
        (self.height_pt - self.margin_top_pt - self.margin_bottom_pt).max(1.0)
    }
}

/// A rendering engine that can be started. Launching is the expensive,
/// cold-start part; instances are meant to be reused.
pub trait RenderEngine: Send + Sync {
    fn name(&self) -> &str;

    fn launch(&self) -> Result<Arc<dyn EngineInstance>, EngineError>;
}

/// A running engine. Must tolerate pages being opened from several threads.
pub trait EngineInstance: Send + Sync {
    fn open_page(&self) -> Result<Box<dyn EnginePage>, EngineError>;

    fn is_alive(&self) -> bool;

    /// Stop the instance. In-flight prints on it fail.
    fn terminate(&self);
}

/// A single-use print surface.
pub trait EnginePage: Send {
    fn print_pdf(&mut self, markup: &str, setup: &PageSetup) -> Result<Vec<u8>, EngineError>;
}
