//! Request validation and document normalization.
//!
//! Validation walks the raw JSON value rather than relying on serde's
//! first-error behaviour, so a client sees every problem with its payload in
//! a single response.

use log::debug;
use serde_json::{Map, Value};

use crate::error::{ForgeError, ValidationIssue};
use crate::extract::extract_rows;
use crate::layout_config::LayoutPreset;
use crate::model::{CardInput, Document, LessonRequest, Section};

impl LessonRequest {
    /// Parse and validate a JSON payload.
    ///
    /// Required: a non-empty `title` string and a non-empty `cards` array
    /// whose elements carry non-empty `title` and `description` strings.
    /// `layout` is optional. Unknown fields are ignored at every level.
    pub fn from_json(bytes: &[u8]) -> Result<LessonRequest, ForgeError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| {
            ForgeError::validation(vec![ValidationIssue::new(
                "$",
                format!("invalid JSON: {e}"),
            )])
        })?;
        Self::from_value(&value)
    }

    /// Validate an already parsed JSON value. See [`LessonRequest::from_json`].
    pub fn from_value(value: &Value) -> Result<LessonRequest, ForgeError> {
        let mut issues = Vec::new();

        let Some(obj) = value.as_object() else {
            return Err(ForgeError::validation(vec![ValidationIssue::new(
                "$",
                "must be a JSON object",
            )]));
        };

        let title = required_text(obj, "title", "title", &mut issues);

        let mut cards = Vec::new();
        match obj.get("cards") {
            None | Some(Value::Null) => issues.push(ValidationIssue::new("cards", "required")),
            Some(Value::Array(items)) if items.is_empty() => {
                issues.push(ValidationIssue::new("cards", "must contain at least one card"))
            }
            Some(Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    let path = format!("cards[{i}]");
                    let Some(card) = item.as_object() else {
                        issues.push(ValidationIssue::new(path, "must be an object"));
                        continue;
                    };
                    let card_title =
                        required_text(card, "title", &format!("{path}.title"), &mut issues);
                    let description = required_text(
                        card,
                        "description",
                        &format!("{path}.description"),
                        &mut issues,
                    );
                    if let (Some(title), Some(description)) = (card_title, description) {
                        cards.push(CardInput::new(title, description));
                    }
                }
            }
            Some(_) => issues.push(ValidationIssue::new("cards", "must be an array")),
        }

        let layout = match obj.get("layout") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => match name.parse::<LayoutPreset>() {
                Ok(preset) => Some(preset),
                Err(_) => {
                    issues.push(ValidationIssue::new(
                        "layout",
                        format!("unknown layout preset '{name}'"),
                    ));
                    None
                }
            },
            Some(_) => {
                issues.push(ValidationIssue::new("layout", "must be a string"));
                None
            }
        };

        if !issues.is_empty() {
            debug!("validate: rejected payload with {} issue(s)", issues.len());
            return Err(ForgeError::validation(issues));
        }

        Ok(LessonRequest {
            title: title.unwrap_or_default(),
            cards,
            layout,
        })
    }
}

/// Read `obj[key]` as a string containing at least one non-whitespace
/// character, recording an issue under `path` otherwise.
fn required_text(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<String> {
    match obj.get(key) {
        None | Some(Value::Null) => {
            issues.push(ValidationIssue::new(path, "required"));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            issues.push(ValidationIssue::new(path, "must be a non-empty string"));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            issues.push(ValidationIssue::new(path, "must be a string"));
            None
        }
    }
}

/// Build a [`Document`] from a title and cards.
///
/// Each card becomes a section named after its trimmed title. Sections
/// without rows are dropped, keeping the order of the rest. Fails with
/// [`ForgeError::EmptyExtraction`] when nothing remains.
pub fn normalize(title: &str, cards: &[CardInput]) -> Result<Document, ForgeError> {
    let sections: Vec<Section> = cards
        .iter()
        .filter_map(|card| {
            let rows = extract_rows(&card.description);
            if rows.is_empty() {
                debug!("normalize: card '{}' yielded no rows, skipped", card.title.trim());
                None
            } else {
                Some(Section {
                    name: card.title.trim().to_string(),
                    rows,
                })
            }
        })
        .collect();

    if sections.is_empty() {
        return Err(ForgeError::EmptyExtraction);
    }

    let doc = Document {
        title: title.trim().to_string(),
        sections,
    };
    debug!(
        "normalize: {} section(s), {} row(s)",
        doc.sections.len(),
        doc.row_count()
    );
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::Row;

    const GREETINGS: &str =
        "<table><tbody><tr><td>1</td><td>Hello</td><td>नमस्ते</td></tr></tbody></table>";

    fn issue_paths(err: ForgeError) -> Vec<String> {
        err.issues().iter().map(|i| i.path.clone()).collect()
    }

    #[test]
    fn accepts_valid_payload_and_ignores_unknown_fields() {
        let json = serde_json::json!({
            "title": "Lesson 22",
            "extra": 1,
            "cards": [{"title": "Greetings", "description": GREETINGS, "color": "red"}],
            "layout": "two-column"
        });
        let req = LessonRequest::from_json(json.to_string().as_bytes()).unwrap();
        assert_eq!(req.title, "Lesson 22");
        assert_eq!(req.cards.len(), 1);
        assert_eq!(req.layout, Some(LayoutPreset::TwoColumn));
    }

    #[test]
    fn reports_every_issue() {
        let json = serde_json::json!({
            "title": "   ",
            "cards": [
                {"title": "ok", "description": "x"},
                {"description": 5},
                "nope"
            ],
            "layout": "three-column"
        });
        let err = LessonRequest::from_json(json.to_string().as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(
            issue_paths(err),
            vec!["title", "cards[1].title", "cards[1].description", "cards[2]", "layout"]
        );
    }

    #[test]
    fn empty_cards_and_missing_fields() {
        let err = LessonRequest::from_json(br#"{"cards": []}"#).unwrap_err();
        let issues = err.issues().to_vec();
        assert_eq!(issues[0], ValidationIssue::new("title", "required"));
        assert_eq!(
            issues[1],
            ValidationIssue::new("cards", "must contain at least one card")
        );
    }

    #[test]
    fn invalid_json_is_single_root_issue() {
        let err = LessonRequest::from_json(b"{not json").unwrap_err();
        assert_eq!(issue_paths(err), vec!["$"]);
        let err = LessonRequest::from_json(b"[1,2]").unwrap_err();
        assert_eq!(issue_paths(err), vec!["$"]);
    }

    #[test]
    fn normalize_builds_document() {
        let doc = normalize(" Lesson 22 ", &[CardInput::new(" Greetings ", GREETINGS)]).unwrap();
        assert_eq!(doc.title, "Lesson 22");
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].name, "Greetings");
        assert_eq!(doc.sections[0].rows, vec![Row::new("1", "Hello", "नमस्ते")]);
    }

    #[test]
    fn normalize_drops_empty_sections_in_order() {
        let cards = vec![
            CardInput::new("A", GREETINGS),
            CardInput::new("Empty", "<p>no table here</p>"),
            CardInput::new("B", GREETINGS),
        ];
        let doc = normalize("T", &cards).unwrap();
        let names: Vec<_> = doc.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn normalize_all_empty_is_empty_extraction() {
        let err = normalize("T", &[CardInput::new("X", "<p>no table here</p>")]).unwrap_err();
        assert!(matches!(err, ForgeError::EmptyExtraction));
    }
}
