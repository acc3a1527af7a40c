use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::GenerativeModel;
use super::StructuringError;
use crate::config::{is_placeholder_key, API_KEY_HEADER};

/// Low temperature: the task is transcription, not creative writing.
const GENERATION_TEMPERATURE: f32 = 0.1;

/// Gemini HTTP client (`models/{model}:generateContent`).
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, StructuringError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StructuringError::Transport(format!("HTTP client setup: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Request body for `generateContent`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: [PromptPart<'a>; 1],
}

#[derive(Serialize)]
struct PromptPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

/// Response body from `generateContent`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, StructuringError> {
        let start = Instant::now();
        let body = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [PromptPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: GENERATION_TEMPERATURE,
            },
        };

        let response = self
            .client
            .post(self.generate_url())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StructuringError::Transport(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else if e.is_connect() {
                    StructuringError::Transport(format!("Gemini unreachable at {}", self.base_url))
                } else {
                    StructuringError::Transport(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StructuringError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| StructuringError::MalformedEnvelope(e.to_string()))?;

        let Some(content) = parsed.candidates.into_iter().next().and_then(|c| c.content) else {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("no candidates (blocked: {r})"))
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(StructuringError::MalformedEnvelope(reason));
        };

        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();

        tracing::info!(
            model = %self.model,
            elapsed_ms = %start.elapsed().as_millis(),
            prompt_len = prompt.len(),
            response_len = text.len(),
            "Gemini generation complete"
        );

        Ok(text)
    }

    fn is_configured(&self) -> bool {
        !is_placeholder_key(&self.api_key)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock generative model for testing. Returns a configurable response.
///
/// Records call count and the last prompt it was given.
pub struct MockGenerativeModel {
    response: Result<String, (u16, String)>,
    latency: Duration,
    configured: bool,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl MockGenerativeModel {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            latency: Duration::ZERO,
            configured: true,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            response: Err((status, body.to_string())),
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

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl GenerativeModel for MockGenerativeModel {
    async fn generate(&self, prompt: &str) -> Result<String, StructuringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err((status, body)) => Err(StructuringError::Service {
                status: *status,
                body: body.clone(),
            }),
        }
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use tokio::io::AsyncReadExt;

    use super::*;

    /// (model call, api key header, query params, body) per request.
    type Captured = Arc<Mutex<Vec<(String, Option<String>, HashMap<String, String>, Value)>>>;

    /// Serve a canned Gemini reply on a random local port; captures requests.
    async fn gemini_server(status: StatusCode, reply: Value) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let sink = captured.clone();
        let app = Router::new().route(
            "/v1beta/models/:call",
            post(
                move |Path(call): Path<String>,
                      Query(query): Query<HashMap<String, String>>,
                      headers: HeaderMap,
                      Json(body): Json<Value>| {
                    let sink = sink.clone();
                    let reply = reply.clone();
                    async move {
                        let key = headers
                            .get(API_KEY_HEADER)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        sink.lock().unwrap().push((call, key, query, body));
                        (status, Json(reply))
                    }
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1beta"), captured)
    }

    fn text_reply(text: &str) -> Value {
        json!({"candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]})
    }

    #[tokio::test]
    async fn sends_prompt_to_model_endpoint() {
        let (url, captured) = gemini_server(StatusCode::OK, text_reply("{\"name\":\"X\"}")).await;
        let client = GeminiClient::new(&url, "real-key", "gemini-1.5-flash", 5).unwrap();

        let text = client.generate("Read this label").await.unwrap();
        assert_eq!(text, "{\"name\":\"X\"}");

        let captured = captured.lock().unwrap();
        let (call, key, query, body) = &captured[0];
        assert_eq!(call, "gemini-1.5-flash:generateContent");
        assert_eq!(key.as_deref(), Some("real-key"));
        assert!(!query.contains_key("key"), "key leaked into URL");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Read this label");
        assert!(body["generationConfig"]["temperature"].is_number());
    }

    #[tokio::test]
    async fn concatenates_multiple_parts() {
        let reply = json!({"candidates": [{"content": {"parts": [{"text": "{\"name\":"}, {"text": "\"X\"}"}]}}]});
        let (url, _) = gemini_server(StatusCode::OK, reply).await;
        let client = GeminiClient::new(&url, "real-key", "gemini-1.5-flash", 5).unwrap();

        assert_eq!(client.generate("p").await.unwrap(), "{\"name\":\"X\"}");
    }

    #[tokio::test]
    async fn error_status_is_service_error() {
        let reply = json!({"error": {"code": 429, "message": "Resource exhausted"}});
        let (url, _) = gemini_server(StatusCode::TOO_MANY_REQUESTS, reply).await;
        let client = GeminiClient::new(&url, "real-key", "gemini-1.5-flash", 5).unwrap();

        match client.generate("p").await.unwrap_err() {
            StructuringError::Service { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("Resource exhausted"));
            }
            other => panic!("Expected Service error, got {other}"),
        }
    }

    #[tokio::test]
    async fn blocked_prompt_is_malformed_envelope() {
        let reply = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let (url, _) = gemini_server(StatusCode::OK, reply).await;
        let client = GeminiClient::new(&url, "real-key", "gemini-1.5-flash", 5).unwrap();

        let err = client.generate("p").await.unwrap_err();
        assert!(matches!(err, StructuringError::MalformedEnvelope(_)));
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn dropped_connection_error_omits_key() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 8192];
                let _ = socket.read(&mut buf).await;
                drop(socket);
            }
        });
        let client =
            GeminiClient::new(&format!("http://{addr}/v1beta"), "AIzaSECRETGEMINI", "m", 5)
                .unwrap();

        let err = client.generate("p").await.unwrap_err();
        assert!(matches!(err, StructuringError::Transport(_)), "{err}");
        assert!(!err.to_string().contains("SECRET"), "{err}");
        assert!(!format!("{err:?}").contains("SECRET"), "{err:?}");
    }

    #[test]
    fn placeholder_key_is_unconfigured() {
        let client =
            GeminiClient::new("http://localhost", "YOUR_GOOGLE_GEMINI_API_KEY", "m", 5).unwrap();
        assert!(!client.is_configured());
        assert_eq!(client.model_name(), "m");
    }

    #[test]
    fn url_joins_model() {
        let client = GeminiClient::new("http://localhost/v1beta/", "k", "gemini-1.5-flash", 5)
            .unwrap();
        assert_eq!(
            client.generate_url(),
            "http://localhost/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn mock_records_prompt() {
        let mock = MockGenerativeModel::new("ok");
        assert_eq!(mock.generate("hello").await.unwrap(), "ok");
        assert_eq!(mock.calls(), 1);
        assert_eq!(mock.last_prompt().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn mock_failing_returns_service_error() {
        let mock = MockGenerativeModel::failing(500, "boom");
        assert!(matches!(
            mock.generate("p").await.unwrap_err(),
            StructuringError::Service { status: 500, .. }
        ));
    }
}
