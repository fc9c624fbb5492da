//! Opaque recipe payload delivered by the extraction backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Optional fields the backend may fill in.
pub const KNOWN_FIELDS: &[&str] = &[
    "title",
    "servings",
    "ingredients",
    "instructions",
    "image_url",
    "notes",
    "total_cost_estimate",
    "total_macros",
    "prep_time_minutes",
    "cook_time_minutes",
    "equipment",
    "dietary_substitutions",
];

/// Structured recipe as produced by the backend.
///
/// The schema belongs to the renderer; this type only guarantees the payload
/// is a JSON object and answers presence questions about its fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeData(Map<String, Value>);

impl RecipeData {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// True when the field is present and carries something worth showing:
    /// not null, not an empty string, array or object.
    pub fn has(&self, field: &str) -> bool {
        match self.0.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(_) => true,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.0
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }

    /// Known optional fields present in this payload, in declaration order.
    pub fn present_fields(&self) -> Vec<&'static str> {
        KNOWN_FIELDS
            .iter()
            .copied()
            .filter(|f| self.has(f))
            .collect()
    }

    /// Backend-reported failure embedded in an otherwise successful response.
    pub(crate) fn embedded_error(&self) -> Option<&str> {
        self.0
            .get("error")
            .and_then(Value::as_str)
            .filter(|e| !e.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipe(value: Value) -> RecipeData {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_presence_ignores_empty_values() {
        let r = recipe(json!({
            "title": "Pasta",
            "notes": "",
            "equipment": [],
            "dietary_substitutions": {},
            "servings": 4,
            "image_url": null
        }));

        assert!(r.has("title"));
        assert!(r.has("servings"));
        assert!(!r.has("notes"));
        assert!(!r.has("equipment"));
        assert!(!r.has("dietary_substitutions"));
        assert!(!r.has("image_url"));
        assert!(!r.has("instructions"));
        assert_eq!(r.present_fields(), vec!["title", "servings"]);
    }

    #[test]
    fn test_title_and_embedded_error() {
        let r = recipe(json!({"title": "", "error": "No description found"}));
        assert_eq!(r.title(), None);
        assert_eq!(r.embedded_error(), Some("No description found"));

        let r = recipe(json!({"title": "Pasta", "error": ""}));
        assert_eq!(r.title(), Some("Pasta"));
        assert_eq!(r.embedded_error(), None);
    }

    #[test]
    fn test_non_object_payload_rejected() {
        assert!(serde_json::from_value::<RecipeData>(json!(["not", "a", "recipe"])).is_err());
    }
}
