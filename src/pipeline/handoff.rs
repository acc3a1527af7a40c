//! Delivery of a finished scan to the UI layer.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use super::outcome::{FailureReason, PipelineOutcome};
use super::structuring::validation::MedicationRecord;

pub const FAILURE_TITLE: &str = "Scan Failed";
pub const RETRY_ACTION: &str = "Try Again";

/// Flat string fields that pre-fill the confirmation form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationForm {
    pub name: String,
    pub doses: String,
    pub instructions: String,
    pub frequency: String,
    pub treatment: String,
    pub side_effects: String,
    pub detailed_description: String,
    /// Location of the captured image, empty when the capture surface gave none.
    pub image_uri: String,
}

impl ConfirmationForm {
    pub fn new(record: MedicationRecord, image_uri: Option<&str>) -> Self {
        Self {
            name: record.name,
            doses: record.doses,
            instructions: record.instructions,
            frequency: record.frequency,
            treatment: record.treatment,
            side_effects: record.side_effects,
            detailed_description: record.detailed_description,
            image_uri: image_uri.unwrap_or_default().to_string(),
        }
    }

    /// Named parameters in form order, as passed to the confirmation screen.
    pub fn to_fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("name", self.name.as_str()),
            ("doses", self.doses.as_str()),
            ("instructions", self.instructions.as_str()),
            ("frequency", self.frequency.as_str()),
            ("treatment", self.treatment.as_str()),
            ("sideEffects", self.side_effects.as_str()),
            ("detailedDescription", self.detailed_description.as_str()),
            ("imageUri", self.image_uri.as_str()),
        ]
    }
}

/// Failure alert with a single action returning to capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailureNotice {
    pub title: &'static str,
    pub message: &'static str,
    pub action: &'static str,
    pub reason: FailureReason,
}

impl ScanFailureNotice {
    pub fn new(reason: FailureReason) -> Self {
        Self {
            title: FAILURE_TITLE,
            message: reason.user_message(),
            action: RETRY_ACTION,
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanHandoff {
    Confirm(ConfirmationForm),
    Failed(ScanFailureNotice),
}

impl ScanHandoff {
    /// Success and Fallback both go to the confirmation form.
    pub fn from_outcome(outcome: PipelineOutcome, image_uri: Option<&str>) -> Self {
        match outcome {
            PipelineOutcome::Success(record) | PipelineOutcome::Fallback(record) => {
                Self::Confirm(ConfirmationForm::new(record, image_uri))
            }
            PipelineOutcome::Failure(reason) => Self::Failed(ScanFailureNotice::new(reason)),
        }
    }
}

/// Receiver of finished scans (the UI navigation layer).
pub trait ResultHandoff: Send + Sync {
    fn deliver(&self, handoff: ScanHandoff);
}

impl ResultHandoff for UnboundedSender<ScanHandoff> {
    fn deliver(&self, handoff: ScanHandoff) {
        if self.send(handoff).is_err() {
            tracing::warn!("Scan result dropped: receiver closed");
        }
    }
}
