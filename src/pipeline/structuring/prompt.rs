/// Placeholder replaced by the recognized label text.
pub const OCR_TEXT_PLACEHOLDER: &str = "{ocr_text}";

/// Instruction for reading a prescription label into the seven-field schema.
pub const MEDICATION_LABEL_TEMPLATE: &str = r#"You are a medical information parser. Analyze the OCR text from a prescription or medication label and extract the medication details into a structured JSON object. Use simple, clear language that any patient can understand.

RULES:
1. Your entire response must be ONLY the JSON object. No prose, no explanations.
2. Extract the name, dose and instructions exactly as printed on the label.
3. If a value is not present and cannot be reasonably inferred, use an empty string.
4. Every value must be a single string. Do not use arrays or nested objects.

JSON OUTPUT FORMAT:
{
  "name": "Medication name as printed (e.g., Amoxicillin)",
  "doses": "Dose amount per intake (e.g., 500mg, 1 tablet)",
  "instructions": "How to take it (e.g., Take with food)",
  "frequency": "How often (e.g., Twice daily, Every 8 hours)",
  "treatment": "What it is typically used for, one short sentence",
  "sideEffects": "Common side effects in everyday words, comma separated",
  "detailedDescription": "Two or three sentences explaining what the medicine does and how it helps"
}

EXAMPLE 1
Input: "AMOXICILLIN 500MG CAPSULES Take one capsule by mouth three times daily until finished"
Output: {"name":"Amoxicillin","doses":"500mg","instructions":"Take one capsule by mouth until finished","frequency":"Three times daily","treatment":"Bacterial infections","sideEffects":"Nausea, diarrhea, rash","detailedDescription":"Amoxicillin is an antibiotic that kills bacteria causing the infection. Finish the full course even if you feel better."}

EXAMPLE 2
Input: "Lisinopril 10 mg tab. 1 tab daily in the morning"
Output: {"name":"Lisinopril","doses":"10mg","instructions":"Take 1 tablet in the morning","frequency":"Once daily","treatment":"High blood pressure","sideEffects":"Dry cough, dizziness","detailedDescription":"Lisinopril relaxes blood vessels so blood flows more easily, which lowers blood pressure."}

OCR TEXT TO ANALYZE:
{ocr_text}"#;

/// Task-specific instruction with a slot for the recognized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionTemplate {
    template: String,
}

impl InstructionTemplate {
    /// Custom template. Without a placeholder the text is appended at the end.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// The built-in prescription label template.
    pub fn medication_label() -> Self {
        Self::new(MEDICATION_LABEL_TEMPLATE)
    }

    /// Build the prompt for one label.
    pub fn render(&self, ocr_text: &str) -> String {
        if self.template.contains(OCR_TEXT_PLACEHOLDER) {
            self.template.replace(OCR_TEXT_PLACEHOLDER, ocr_text)
        } else {
            format!("{}\n\n{ocr_text}", self.template.trim_end())
        }
    }
}

impl Default for InstructionTemplate {
    fn default() -> Self {
        Self::medication_label()
    }
}
