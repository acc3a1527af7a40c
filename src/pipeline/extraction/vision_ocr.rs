//! Label text recognition via the Google Cloud Vision `images:annotate` API.
//!
//! One POST per image, `TEXT_DETECTION` feature only. The full-text annotation
//! is returned verbatim. Layout and per-word boxes are ignored.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::types::{ExtractedText, ImagePayload, TextRecognizer};
use super::RecognitionError;
use crate::config::{is_placeholder_key, API_KEY_HEADER};

// ──────────────────────────────────────────────
// Wire types
// ──────────────────────────────────────────────

#[derive(Serialize)]
struct AnnotateRequest<'a> {
    requests: [AnnotateImageRequest<'a>; 1],
}

#[derive(Serialize)]
struct AnnotateImageRequest<'a> {
    image: ImageContent,
    features: [Feature<'a>; 1],
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    responses: Option<Vec<AnnotateImageResponse>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<FullTextAnnotation>,
    error: Option<StatusBody>,
}

#[derive(Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct StatusBody {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

const TEXT_DETECTION: &str = "TEXT_DETECTION";

// ──────────────────────────────────────────────
// VisionOcrClient
// ──────────────────────────────────────────────

/// Production OCR client backed by Google Cloud Vision.
pub struct VisionOcrClient {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl VisionOcrClient {
    pub fn new(endpoint: &str, api_key: &str, timeout_secs: u64) -> Result<Self, RecognitionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RecognitionError::Transport(format!("HTTP client setup: {e}")))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> RecognitionError {
        if e.is_timeout() {
            RecognitionError::Transport(format!("Request timed out after {}s", self.timeout_secs))
        } else if e.is_connect() {
            RecognitionError::Transport(format!("Vision API unreachable at {}", self.endpoint))
        } else {
            RecognitionError::Transport(e.without_url().to_string())
        }
    }
}

#[async_trait]
impl TextRecognizer for VisionOcrClient {
    async fn recognize(&self, image: &ImagePayload) -> Result<ExtractedText, RecognitionError> {
        let start = Instant::now();
        let body = AnnotateRequest {
            requests: [AnnotateImageRequest {
                image: ImageContent {
                    content: base64::engine::general_purpose::STANDARD.encode(image.bytes()),
                },
                features: [Feature {
                    kind: TEXT_DETECTION,
                }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::MalformedEnvelope(e.to_string()))?;

        let first = envelope
            .responses
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| RecognitionError::MalformedEnvelope("empty responses array".into()))?;

        if let Some(err) = first.error {
            return Err(RecognitionError::Service {
                status: status.as_u16(),
                message: format!("code {}: {}", err.code, err.message),
            });
        }

        let text = first
            .full_text_annotation
            .and_then(|a| ExtractedText::new(a.text))
            .ok_or(RecognitionError::NoTextDetected)?;

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            image_size = image.len(),
            text_len = text.as_str().len(),
            "Vision OCR complete"
        );

        Ok(text)
    }

    fn is_configured(&self) -> bool {
        !is_placeholder_key(&self.api_key)
    }
}

// ──────────────────────────────────────────────
// MockTextRecognizer (testing)
// ──────────────────────────────────────────────

/// Mock OCR engine returning a fixed text (or failure) after an optional delay.
///
/// Counts calls so tests can assert which stages ran.
pub struct MockTextRecognizer {
    response: Result<String, (u16, String)>,
    latency: Duration,
    configured: bool,
    calls: AtomicUsize,
}

impl MockTextRecognizer {
    pub fn new(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
            latency: Duration::ZERO,
            configured: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Respond with an upstream service failure.
    pub fn failing(status: u16, message: &str) -> Self {
        Self {
            response: Err((status, message.to_string())),
            ..Self::new("")
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextRecognizer for MockTextRecognizer {
    async fn recognize(&self, _image: &ImagePayload) -> Result<ExtractedText, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match &self.response {
            Ok(text) => ExtractedText::new(text.clone()).ok_or(RecognitionError::NoTextDetected),
            Err((status, message)) => Err(RecognitionError::Service {
                status: *status,
                message: message.clone(),
            }),
        }
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
