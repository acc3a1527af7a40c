use std::sync::Arc;
use std::time::Instant;

use super::parser::parse_candidate;
use super::prompt::InstructionTemplate;
use super::types::{CandidateRecord, GenerativeModel};
use super::StructuringError;
use crate::pipeline::extraction::types::ExtractedText;

/// Raw artifacts of one structuring call, kept for the diagnostic dump.
#[derive(Debug, Clone, Default)]
pub struct StructuringTrace {
    pub prompt: Option<String>,
    pub raw_response: Option<String>,
    pub cleaned_response: Option<String>,
}

/// Turns recognized label text into a candidate record:
/// template → model → strip fences → decode.
///
/// Performs no field defaulting; see `validation::normalize`.
pub struct LabelStructurer {
    model: Arc<dyn GenerativeModel>,
}

impl LabelStructurer {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_configured()
    }

    pub async fn extract(
        &self,
        text: &ExtractedText,
        template: &InstructionTemplate,
    ) -> Result<CandidateRecord, StructuringError> {
        self.extract_traced(text.as_str(), template, &mut StructuringTrace::default())
            .await
    }

    /// Same as [`extract`](Self::extract) over plain text, filling `trace`
    /// as it goes.
    pub async fn extract_traced(
        &self,
        text: &str,
        template: &InstructionTemplate,
        trace: &mut StructuringTrace,
    ) -> Result<CandidateRecord, StructuringError> {
        let raw_text = text.trim();
        if raw_text.is_empty() {
            return Err(StructuringError::EmptyInput);
        }

        let prompt = template.render(raw_text);
        trace.prompt = Some(prompt.clone());

        let start = Instant::now();
        let response = self.model.generate(&prompt).await?;
        trace.raw_response = Some(response.clone());

        match parse_candidate(&response) {
            Ok(candidate) => {
                tracing::info!(
                    model = %self.model.model_name(),
                    elapsed_ms = %start.elapsed().as_millis(),
                    field_count = candidate.len(),
                    "Label structuring complete"
                );
                Ok(candidate)
            }
            Err(e) => {
                if let StructuringError::UnparsableResponse { reason, cleaned, .. } = &e {
                    tracing::warn!(
                        model = %self.model.model_name(),
                        reason = %reason,
                        response_len = response.len(),
                        "Model response could not be decoded"
                    );
                    trace.cleaned_response = Some(cleaned.clone());
                }
                Err(e)
            }
        }
    }
}
