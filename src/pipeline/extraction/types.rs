use async_trait::async_trait;

use super::{EmptyImage, RecognitionError};

/// Image handed over by the capture surface for a single scan.
///
/// Moved into the processor by value and dropped when the run ends.
#[derive(Clone)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    uri: Option<String>,
}

impl ImagePayload {
    /// Wrap captured image bytes. Empty data is rejected.
    pub fn new(bytes: Vec<u8>) -> Result<Self, EmptyImage> {
        if bytes.is_empty() {
            return Err(EmptyImage);
        }
        Ok(Self { bytes, uri: None })
    }

    /// Attach the location the capture surface stored the image at.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false: construction refuses empty payloads.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("size", &self.bytes.len())
            .field("uri", &self.uri)
            .finish()
    }
}

/// Text recognized on a label. Never blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText(String);

impl ExtractedText {
    /// Returns `None` when the text is empty after trimming.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExtractedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// OCR service abstraction (allows mocking).
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Run text detection over one image. Performs exactly one outbound call.
    async fn recognize(&self, image: &ImagePayload) -> Result<ExtractedText, RecognitionError>;

    /// False when the credential is still a placeholder.
    fn is_configured(&self) -> bool {
        true
    }
}
