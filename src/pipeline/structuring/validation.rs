// Post-parse normalization for model-extracted label fields.
// Applied between parse_candidate() and anything that reaches the UI.
// Guarantees a fully populated record: every field present, every field a string.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{
    CandidateRecord, FIELD_DETAILED_DESCRIPTION, FIELD_DOSES, FIELD_FREQUENCY,
    FIELD_INSTRUCTIONS, FIELD_NAME, FIELD_SIDE_EFFECTS, FIELD_TREATMENT,
};

pub const DEFAULT_NAME: &str = "Unknown Product";
pub const DEFAULT_DOSES: &str = "Not specified";
pub const DEFAULT_INSTRUCTIONS: &str = "";
pub const DEFAULT_FREQUENCY: &str = "Not specified";
pub const DEFAULT_TREATMENT: &str = "Not specified";
pub const DEFAULT_SIDE_EFFECTS: &str = "Not specified";
pub const DEFAULT_DETAILED_DESCRIPTION: &str = "No description available";

/// Validated medication label. Every field is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRecord {
    pub name: String,
    pub doses: String,
    pub instructions: String,
    pub frequency: String,
    pub treatment: String,
    pub side_effects: String,
    pub detailed_description: String,
}

impl MedicationRecord {
    /// Deterministic record shown when the OCR/LLM services are not configured.
    pub fn fallback() -> Self {
        Self {
            name: "DEMO MEDICATION".into(),
            doses: "10mg".into(),
            instructions: "Take with water".into(),
            frequency: "Twice daily (09:00 AM, 09:00 PM)".into(),
            treatment: "Demo data".into(),
            side_effects: DEFAULT_SIDE_EFFECTS.into(),
            detailed_description: "This is demo data - please configure your API keys".into(),
        }
    }

    /// Field name and value pairs, in schema order.
    pub fn fields(&self) -> [(&'static str, &str); 7] {
        [
            (FIELD_NAME, self.name.as_str()),
            (FIELD_DOSES, self.doses.as_str()),
            (FIELD_INSTRUCTIONS, self.instructions.as_str()),
            (FIELD_FREQUENCY, self.frequency.as_str()),
            (FIELD_TREATMENT, self.treatment.as_str()),
            (FIELD_SIDE_EFFECTS, self.side_effects.as_str()),
            (FIELD_DETAILED_DESCRIPTION, self.detailed_description.as_str()),
        ]
    }

    /// Names of the fields currently holding their default value.
    pub fn defaulted_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(field, value)| default_for(field) == Some(*value))
            .map(|(field, _)| field)
            .collect()
    }
}

impl From<&MedicationRecord> for CandidateRecord {
    fn from(record: &MedicationRecord) -> Self {
        let mut candidate = CandidateRecord::default();
        for (field, value) in record.fields() {
            candidate.insert(field, Value::String(value.to_string()));
        }
        candidate
    }
}

/// Default value substituted for a missing schema field.
pub fn default_for(field: &str) -> Option<&'static str> {
    match field {
        FIELD_NAME => Some(DEFAULT_NAME),
        FIELD_DOSES => Some(DEFAULT_DOSES),
        FIELD_INSTRUCTIONS => Some(DEFAULT_INSTRUCTIONS),
        FIELD_FREQUENCY => Some(DEFAULT_FREQUENCY),
        FIELD_TREATMENT => Some(DEFAULT_TREATMENT),
        FIELD_SIDE_EFFECTS => Some(DEFAULT_SIDE_EFFECTS),
        FIELD_DETAILED_DESCRIPTION => Some(DEFAULT_DETAILED_DESCRIPTION),
        _ => None,
    }
}

/// Turn a candidate into a complete record. Never fails.
///
/// Missing, non-string, and blank values are replaced by the field default;
/// string values are trimmed. Idempotent.
pub fn normalize(candidate: &CandidateRecord) -> MedicationRecord {
    let pick = |field: &str, default: &str| -> String {
        match candidate.get_str(field).map(str::trim) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => default.to_string(),
        }
    };

    let record = MedicationRecord {
        name: pick(FIELD_NAME, DEFAULT_NAME),
        doses: pick(FIELD_DOSES, DEFAULT_DOSES),
        instructions: pick(FIELD_INSTRUCTIONS, DEFAULT_INSTRUCTIONS),
        frequency: pick(FIELD_FREQUENCY, DEFAULT_FREQUENCY),
        treatment: pick(FIELD_TREATMENT, DEFAULT_TREATMENT),
        side_effects: pick(FIELD_SIDE_EFFECTS, DEFAULT_SIDE_EFFECTS),
        detailed_description: pick(FIELD_DETAILED_DESCRIPTION, DEFAULT_DETAILED_DESCRIPTION),
    };

    let defaulted = record.defaulted_fields();
    if !defaulted.is_empty() {
        tracing::debug!(
            defaulted = ?defaulted,
            "Normalization substituted defaults"
        );
    }

    record
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::pipeline::structuring::types::RECORD_FIELDS;

    fn full_candidate() -> CandidateRecord {
        let mut c = CandidateRecord::default();
        c.insert(FIELD_NAME, "Amoxicillin");
        c.insert(FIELD_DOSES, "500mg");
        c.insert(FIELD_INSTRUCTIONS, "Take with food");
        c.insert(FIELD_FREQUENCY, "Twice daily");
        c.insert(FIELD_TREATMENT, "Bacterial infections");
        c.insert(FIELD_SIDE_EFFECTS, "Nausea, diarrhea");
        c.insert(FIELD_DETAILED_DESCRIPTION, "A penicillin-type antibiotic.");
        c
    }

    fn assert_fully_populated(record: &MedicationRecord) {
        for (field, value) in record.fields() {
            if field == FIELD_INSTRUCTIONS {
                continue;
            }
            assert!(!value.trim().is_empty(), "{field} is blank");
        }
    }

    #[test]
    fn full_candidate_passes_through() {
        let record = normalize(&full_candidate());
        assert_eq!(record.name, "Amoxicillin");
        assert_eq!(record.doses, "500mg");
        assert_eq!(record.instructions, "Take with food");
        assert_eq!(record.side_effects, "Nausea, diarrhea");
        assert!(record.defaulted_fields().is_empty());
    }

    #[test]
    fn empty_candidate_gets_all_defaults() {
        let record = normalize(&CandidateRecord::default());
        assert_eq!(record.name, "Unknown Product");
        assert_eq!(record.doses, "Not specified");
        assert_eq!(record.instructions, "");
        assert_eq!(record.frequency, "Not specified");
        assert_eq!(record.treatment, "Not specified");
        assert_eq!(record.side_effects, "Not specified");
        assert_eq!(record.detailed_description, "No description available");
        assert_eq!(record.defaulted_fields().len(), 7);
    }

    #[test]
    fn every_subset_of_missing_fields_is_defaulted() {
        let full = full_candidate();
        for mask in 0u32..(1 << RECORD_FIELDS.len()) {
            let mut candidate = CandidateRecord::default();
            for (i, field) in RECORD_FIELDS.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    candidate.insert(field, full.get(field).unwrap().clone());
                }
            }

            let record = normalize(&candidate);
            assert_fully_populated(&record);

            for (i, (field, value)) in record.fields().into_iter().enumerate() {
                let expected = if mask & (1 << i) != 0 {
                    full.get_str(field).unwrap()
                } else {
                    default_for(field).unwrap()
                };
                assert_eq!(value, expected, "mask {mask:07b}, field {field}");
            }
        }
    }

    #[test]
    fn wrong_types_are_defaulted() {
        let mut c = CandidateRecord::default();
        c.insert(FIELD_NAME, json!(null));
        c.insert(FIELD_DOSES, json!(500));
        c.insert(FIELD_FREQUENCY, json!(["09:00 AM", "09:00 PM"]));
        c.insert(FIELD_TREATMENT, json!({"text": "pain"}));
        c.insert(FIELD_SIDE_EFFECTS, json!(false));

        let record = normalize(&c);
        assert_eq!(record.name, DEFAULT_NAME);
        assert_eq!(record.doses, DEFAULT_DOSES);
        assert_eq!(record.frequency, DEFAULT_FREQUENCY);
        assert_eq!(record.treatment, DEFAULT_TREATMENT);
        assert_eq!(record.side_effects, DEFAULT_SIDE_EFFECTS);
    }

    #[test]
    fn blank_strings_are_defaulted_and_values_trimmed() {
        let mut c = CandidateRecord::default();
        c.insert(FIELD_NAME, "   ");
        c.insert(FIELD_DOSES, "  20mg \n");

        let record = normalize(&c);
        assert_eq!(record.name, DEFAULT_NAME);
        assert_eq!(record.doses, "20mg");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut c = full_candidate();
        c.insert("schedule", json!(["09:00 AM"]));
        c.insert("dosage", "20mg");
        assert_eq!(normalize(&c), normalize(&full_candidate()));
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut partial = CandidateRecord::default();
        partial.insert(FIELD_NAME, "  Ibuprofen ");
        partial.insert(FIELD_DOSES, json!(200));

        for candidate in [CandidateRecord::default(), full_candidate(), partial] {
            let once = normalize(&candidate);
            let twice = normalize(&CandidateRecord::from(&once));
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn fallback_record_is_fully_populated() {
        let record = MedicationRecord::fallback();
        assert_fully_populated(&record);
        assert!(!record.instructions.is_empty());
        assert_eq!(record.name, "DEMO MEDICATION");
        assert_eq!(normalize(&CandidateRecord::from(&record)), record);
    }

    #[test]
    fn record_serializes_camel_case() {
        let json = serde_json::to_value(normalize(&full_candidate())).unwrap();
        assert_eq!(json["sideEffects"], "Nausea, diarrhea");
        assert_eq!(json["detailedDescription"], "A penicillin-type antibiotic.");
        assert!(json.get("side_effects").is_none());
    }
}
