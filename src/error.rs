//! Error types for the lesson-forge library.
//!
//! Three failures are visible to callers and they stay distinct all the way
//! out to the HTTP status code and the C ABI return code:
//!
//! * [`ForgeError::Validation`] – the payload does not have the required
//!   shape. Carries every issue found, not just the first.
//! * [`ForgeError::EmptyExtraction`] – the payload is well-formed but no card
//!   contained a usable row.
//! * [`ForgeError::Render`] – the rendering engine failed. The wrapped
//!   [`EngineError`] is for logs; callers only see an opaque message.
//!
//! Malformed rows inside a fragment are not errors at all: the extractor
//! drops them.

use serde::Serialize;
use thiserror::Error;

/// One itemized shape violation, e.g. `cards[2].title: required`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// JSON path of the offending value (`$` for the document root).
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// All caller-visible failures of the document pipeline.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// Request shape violates the schema.
    #[error("invalid request: {}", join_issues(.issues))]
    Validation { issues: Vec<ValidationIssue> },

    /// Request was well-formed but no rows could be extracted from any card.
    #[error("no rows could be extracted from any provided content")]
    EmptyExtraction,

    /// The rendering engine failed to produce a PDF.
    #[error("failed to render PDF: {0}")]
    Render(#[from] EngineError),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Coarse classification used for status codes and error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    EmptyExtraction,
    RenderFailure,
}

impl ForgeError {
    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        ForgeError::Validation { issues }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ForgeError::Validation { .. } => ErrorKind::ValidationError,
            ForgeError::EmptyExtraction => ErrorKind::EmptyExtraction,
            ForgeError::Render(_) => ErrorKind::RenderFailure,
        }
    }

    /// Message safe to show a client. Engine details are withheld.
    pub fn public_message(&self) -> String {
        match self {
            ForgeError::Render(_) => "failed to render PDF".to_string(),
            other => other.to_string(),
        }
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            ForgeError::Validation { issues } => issues,
            _ => &[],
        }
    }
}

/// Failures inside, or at the boundary of, a rendering engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine instance could not be started.
    #[error("engine launch failed: {0}")]
    Launch(String),

    /// The instance was terminated; it accepts no more pages.
    #[error("engine instance is closed")]
    Closed,

    /// The instance died or a print panicked.
    #[error("engine crashed: {0}")]
    Crashed(String),

    /// A print finished without producing any bytes.
    #[error("engine produced no output")]
    EmptyOutput,

    /// Layout computation failed.
    #[error("layout failed: {0}")]
    Layout(String),

    /// A font could not be loaded or parsed.
    #[error("font error: {0}")]
    Font(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Invalid configuration values (environment or CLI).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown layout preset '{0}' (expected single-column, two-column or compact-two-column)")]
    UnknownLayout(String),

    #[error("unknown font tier '{0}' (expected compact, regular or large)")]
    UnknownFontTier(String),

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid font mapping '{0}' (expected family=path)")]
    InvalidFontMapping(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_issue() {
        let err = ForgeError::validation(vec![
            ValidationIssue::new("title", "required"),
            ValidationIssue::new("cards[0].description", "must be a non-empty string"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("title: required"));
        assert!(msg.contains("cards[0].description"));
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn render_failure_is_opaque() {
        let err = ForgeError::from(EngineError::Crashed("segfault in font table".into()));
        assert_eq!(err.kind(), ErrorKind::RenderFailure);
        assert_eq!(err.public_message(), "failed to render PDF");
        assert!(err.to_string().contains("segfault"));
    }

    #[test]
    fn kinds_serialize_snake_case() {
        let json = serde_json::to_string(&ErrorKind::EmptyExtraction).unwrap();
        assert_eq!(json, "\"empty_extraction\"");
    }
}
