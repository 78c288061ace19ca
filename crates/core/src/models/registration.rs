//! Registration form descriptors

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Answers keyed by field id
pub type FormResponses = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    LongText,
    /// Checkbox style agreement; any non-empty answer counts as given
    Consent,
}

/// A host-defined question collected at join time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationField {
    pub id: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
}

impl RegistrationField {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Whether `responses` holds a usable answer for this field
    pub fn is_answered(&self, responses: &FormResponses) -> bool {
        responses
            .get(&self.id)
            .is_some_and(|answer| !answer.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_answer_is_unanswered() {
        let field = RegistrationField::new("f1", "Allergies", FieldKind::Text).required();
        let mut responses = FormResponses::new();
        assert!(!field.is_answered(&responses));

        responses.insert("f1".into(), "   ".into());
        assert!(!field.is_answered(&responses));

        responses.insert("f1".into(), "none".into());
        assert!(field.is_answered(&responses));
    }

    #[test]
    fn test_kind_serializes_camel_case() {
        let json = serde_json::to_string(&FieldKind::LongText).unwrap();
        assert_eq!(json, "\"longText\"");
    }
}
