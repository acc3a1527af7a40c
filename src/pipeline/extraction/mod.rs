pub mod types;
pub mod vision_ocr;

pub use types::*;
pub use vision_ocr::*;

use thiserror::Error;

use crate::pipeline::outcome::FailureReason;

/// Capture handed over no image data.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Image data is empty")]
pub struct EmptyImage;

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("No text detected in image")]
    NoTextDetected,

    #[error("Vision API returned error (status {status}): {message}")]
    Service { status: u16, message: String },

    #[error("Vision API request failed: {0}")]
    Transport(String),

    #[error("Malformed Vision API response: {0}")]
    MalformedEnvelope(String),
}

impl RecognitionError {
    /// Classify for the pipeline outcome. Upstream detail stays in the log.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::NoTextDetected => FailureReason::NoTextDetected,
            Self::Service { .. } | Self::Transport(_) | Self::MalformedEnvelope(_) => {
                FailureReason::ServiceError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_text_classifies_as_no_text() {
        assert_eq!(
            RecognitionError::NoTextDetected.failure_reason(),
            FailureReason::NoTextDetected
        );
    }

    #[test]
    fn upstream_failures_classify_as_service_error() {
        let errors = [
            RecognitionError::Service {
                status: 403,
                message: "API key not valid".into(),
            },
            RecognitionError::Transport("connection refused".into()),
            RecognitionError::MalformedEnvelope("missing responses".into()),
        ];
        for err in errors {
            assert_eq!(err.failure_reason(), FailureReason::ServiceError, "{err}");
        }
    }

    #[test]
    fn service_error_message_carries_status() {
        let err = RecognitionError::Service {
            status: 500,
            message: "backend".into(),
        };
        assert!(err.to_string().contains("500"));
    }
}
