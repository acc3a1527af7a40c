pub mod types;
pub mod prompt;
pub mod parser;
pub mod gemini;
pub mod orchestrator;
pub mod validation;

pub use types::*;
pub use prompt::*;
pub use parser::*;
pub use gemini::*;
pub use orchestrator::*;
pub use validation::*;

use thiserror::Error;

use crate::pipeline::outcome::FailureReason;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("Input text is empty after trimming")]
    EmptyInput,

    #[error("Gemini returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("Gemini request failed: {0}")]
    Transport(String),

    #[error("Malformed Gemini envelope: {0}")]
    MalformedEnvelope(String),

    /// Raw and cleaned text are kept for the diagnostic dump only.
    #[error("Response is not a usable JSON object ({reason})")]
    UnparsableResponse {
        reason: String,
        raw: String,
        cleaned: String,
    },
}

impl StructuringError {
    /// Classify for the pipeline outcome.
    ///
    /// Empty input means recognition produced nothing usable, so it reads as
    /// "no text" to the user.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::EmptyInput => FailureReason::NoTextDetected,
            Self::Service { .. } | Self::Transport(_) | Self::MalformedEnvelope(_) => {
                FailureReason::ServiceError
            }
            Self::UnparsableResponse { .. } => FailureReason::UnparsableResponse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(
            StructuringError::EmptyInput.failure_reason(),
            FailureReason::NoTextDetected
        );
        assert_eq!(
            StructuringError::Service {
                status: 429,
                body: "quota".into()
            }
            .failure_reason(),
            FailureReason::ServiceError
        );
        assert_eq!(
            StructuringError::Transport("reset".into()).failure_reason(),
            FailureReason::ServiceError
        );
        assert_eq!(
            StructuringError::UnparsableResponse {
                reason: "eof".into(),
                raw: "oops".into(),
                cleaned: "oops".into(),
            }
            .failure_reason(),
            FailureReason::UnparsableResponse
        );
    }

    #[test]
    fn unparsable_display_omits_raw_text() {
        let err = StructuringError::UnparsableResponse {
            reason: "expected value".into(),
            raw: "SECRET RAW".into(),
            cleaned: "SECRET CLEANED".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("expected value"));
        assert!(!msg.contains("SECRET"));
    }
}
