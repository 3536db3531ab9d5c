use serde::{Deserialize, Serialize};

use crate::models::ChallengeInfo;

/// Kind of a detected form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Phone,
    Number,
    TextArea,
    Select,
    Radio,
    Checkbox,
    Unknown,
}

impl FieldKind {
    /// Map a DOM `type` attribute (or tag name) onto a field kind.
    pub fn from_dom(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "text" => FieldKind::Text,
            "email" => FieldKind::Email,
            "tel" | "phone" => FieldKind::Phone,
            "number" => FieldKind::Number,
            "textarea" => FieldKind::TextArea,
            "select" | "select-one" => FieldKind::Select,
            "radio" => FieldKind::Radio,
            "checkbox" => FieldKind::Checkbox,
            _ => FieldKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Email => "email",
            FieldKind::Phone => "phone",
            FieldKind::Number => "number",
            FieldKind::TextArea => "textarea",
            FieldKind::Select => "select",
            FieldKind::Radio => "radio",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Unknown => "unknown",
        }
    }
}

/// One fillable field found by the adapter's page scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub label: String,
    pub kind: FieldKind,
    pub is_required: bool,
    /// Opaque adapter handle (a CSS selector for the CDP implementation).
    pub handle: String,
}

/// Result of a page scan: either the visible fields, or a sentinel saying a
/// challenge was found instead.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Fields(Vec<FormField>),
    ChallengeDetected(ChallengeInfo),
}

/// Result of the adapter's submit call.
///
/// Both success signals are heuristic: a success-keyword match in the
/// post-submit page snapshot, or an observed URL change. Neither is
/// authoritative for the target site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub success: bool,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::FieldKind;

    #[test]
    fn dom_types_map_to_kinds() {
        assert_eq!(FieldKind::from_dom("TEL"), FieldKind::Phone);
        assert_eq!(FieldKind::from_dom("select-one"), FieldKind::Select);
        assert_eq!(FieldKind::from_dom("week"), FieldKind::Unknown);
    }
}
