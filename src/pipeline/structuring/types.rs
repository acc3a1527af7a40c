use async_trait::async_trait;
use serde_json::{Map, Value};

use super::StructuringError;

/// Field names of the medication label schema, in display order.
pub const FIELD_NAME: &str = "name";
pub const FIELD_DOSES: &str = "doses";
pub const FIELD_INSTRUCTIONS: &str = "instructions";
pub const FIELD_FREQUENCY: &str = "frequency";
pub const FIELD_TREATMENT: &str = "treatment";
pub const FIELD_SIDE_EFFECTS: &str = "sideEffects";
pub const FIELD_DETAILED_DESCRIPTION: &str = "detailedDescription";

pub const RECORD_FIELDS: [&str; 7] = [
    FIELD_NAME,
    FIELD_DOSES,
    FIELD_INSTRUCTIONS,
    FIELD_FREQUENCY,
    FIELD_TREATMENT,
    FIELD_SIDE_EFFECTS,
    FIELD_DETAILED_DESCRIPTION,
];

/// Decoded model reply before validation.
///
/// Holds the raw JSON object so that missing keys and wrong value types
/// survive until normalization decides what to do with them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateRecord {
    fields: Map<String, Value>,
}

impl CandidateRecord {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The field's value when it is a JSON string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn insert(&mut self, field: &str, value: impl Into<Value>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Generative language service abstraction (allows mocking).
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Send one prompt, return the model's free-text reply.
    async fn generate(&self, prompt: &str) -> Result<String, StructuringError>;

    /// False when the credential is still a placeholder.
    fn is_configured(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn get_str_ignores_non_strings() {
        let mut candidate = CandidateRecord::default();
        candidate.insert(FIELD_NAME, "Lisinopril");
        candidate.insert(FIELD_DOSES, json!(10));
        candidate.insert(FIELD_SIDE_EFFECTS, json!(["cough"]));

        assert_eq!(candidate.get_str(FIELD_NAME), Some("Lisinopril"));
        assert_eq!(candidate.get_str(FIELD_DOSES), None);
        assert!(candidate.get(FIELD_DOSES).is_some());
        assert_eq!(candidate.get_str(FIELD_SIDE_EFFECTS), None);
        assert_eq!(candidate.len(), 3);
    }

    #[test]
    fn schema_has_seven_fields() {
        assert_eq!(RECORD_FIELDS.len(), 7);
        assert!(RECORD_FIELDS.contains(&"sideEffects"));
        assert!(RECORD_FIELDS.contains(&"detailedDescription"));
    }
}
