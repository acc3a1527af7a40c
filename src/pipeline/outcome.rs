//! Terminal outcome of a scan and the states a scan passes through.

use serde::Serialize;

use super::structuring::validation::MedicationRecord;

/// Why a scan ended without a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// OCR answered but found no text on the label.
    NoTextDetected,
    /// Transport failure or non-success status from either service.
    ServiceError,
    /// The language model answered without decodable JSON.
    UnparsableResponse,
    /// The service chain ran past the hard ceiling.
    Timeout,
}

impl FailureReason {
    /// Message shown next to the "Try Again" action.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Timeout => "Processing took too long. Please try again.",
            Self::NoTextDetected | Self::UnparsableResponse => {
                "Could not read the medication label"
            }
            Self::ServiceError => "Error processing image",
        }
    }
}

/// Exactly one of these is produced per completed scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Success(MedicationRecord),
    Failure(FailureReason),
    /// Services are unconfigured; carries the fixed demo record.
    Fallback(MedicationRecord),
}

impl PipelineOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::Failure(reason) => OutcomeKind::Failure(*reason),
            Self::Fallback(_) => OutcomeKind::Fallback,
        }
    }

    /// The record to show in the confirmation form, if any.
    pub fn record(&self) -> Option<&MedicationRecord> {
        match self {
            Self::Success(record) | Self::Fallback(record) => Some(record),
            Self::Failure(_) => None,
        }
    }
}

/// Tag of a [`PipelineOutcome`], cheap to publish to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Failure(FailureReason),
    Fallback,
}

/// Scan progress: Idle → Capturing → Recognizing → Extracting → Normalizing → Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Capturing,
    Recognizing,
    Extracting,
    Normalizing,
    Done(OutcomeKind),
}

impl ScanState {
    pub fn is_done(self) -> bool {
        matches!(self, Self::Done(_))
    }
}
