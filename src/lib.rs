//! # lesson-forge – bilingual glossary lessons → paginated PDF
//!
//! Lesson cards carry loosely formatted HTML fragments holding three-column
//! glossary tables (serial, English, Hindi). The pipeline stages are:
//!
//! 1. **Validate** – raw JSON → [`LessonRequest`] with every issue itemized ([`normalize`])
//! 2. **Extract** – tolerant row extraction from each fragment ([`extract`])
//! 3. **Normalize** – cards → sections → [`Document`], empty sections dropped ([`normalize`])
//! 4. **Mark up** – Document → print-ready markup under a layout preset ([`markup`])
//! 5. **Print** – markup → PDF bytes on a reusable engine instance ([`manager`], [`engine`])
//!
//! [`PdfService`] runs all of them. The same service is exposed over HTTP
//! ([`server`]), a C ABI ([`ffi`]) and the `lesson-forge` binary.

pub mod config;
pub mod engine;
pub mod entities;
pub mod error;
pub mod extract;
pub mod ffi;
pub mod layout_config;
pub mod manager;
pub mod markup;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod scan;
pub mod server;

// Re-exports for convenience
pub use config::ServiceConfig;
pub use error::{EngineError, ErrorKind, ForgeError, ValidationIssue};
pub use extract::extract_rows;
pub use layout_config::{LayoutConfig, LayoutPreset};
pub use manager::RenderManager;
pub use model::{CardInput, Document, LessonRequest, Row, Section};
pub use normalize::normalize;
pub use pipeline::{PdfOutput, PdfService};
