//! Scan orchestrator.
//!
//! Drives one scan: recognize → extract → normalize, joined with the
//! minimum-display timer and bounded by a hard ceiling. Produces exactly one
//! [`PipelineOutcome`] per completed run.
//!
//! Uses trait-based DI for both services (TextRecognizer, GenerativeModel)
//! so the orchestrator is fully testable with mock implementations.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{self, ConfigError, ScanConfig};
use crate::pipeline::diagnostic;
use crate::pipeline::extraction::types::{ImagePayload, TextRecognizer};
use crate::pipeline::extraction::vision_ocr::VisionOcrClient;
use crate::pipeline::extraction::{EmptyImage, RecognitionError};
use crate::pipeline::handoff::{ResultHandoff, ScanHandoff};
use crate::pipeline::outcome::{FailureReason, PipelineOutcome, ScanState};
use crate::pipeline::structuring::gemini::GeminiClient;
use crate::pipeline::structuring::orchestrator::{LabelStructurer, StructuringTrace};
use crate::pipeline::structuring::prompt::InstructionTemplate;
use crate::pipeline::structuring::types::GenerativeModel;
use crate::pipeline::structuring::validation::{normalize, MedicationRecord};
use crate::pipeline::structuring::StructuringError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised before a scan starts. Never turned into an outcome.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("{0}")]
    EmptyImage(#[from] EmptyImage),

    #[error("A scan is already in progress")]
    ScanInProgress,

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("OCR client initialization failed: {0}")]
    RecognizerInit(#[from] RecognitionError),

    #[error("Gemini client initialization failed: {0}")]
    StructurerInit(#[from] StructuringError),
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Timing and output knobs for one processor.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub min_display: Duration,
    pub hard_timeout: Duration,
    pub template: InstructionTemplate,
    pub dump_dir: Option<PathBuf>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            min_display: config::DEFAULT_MIN_DISPLAY,
            hard_timeout: config::DEFAULT_HARD_TIMEOUT,
            template: InstructionTemplate::medication_label(),
            dump_dir: None,
        }
    }
}

impl From<&ScanConfig> for ScanSettings {
    fn from(config: &ScanConfig) -> Self {
        Self {
            min_display: config.min_display,
            hard_timeout: config.hard_timeout,
            template: InstructionTemplate::medication_label(),
            dump_dir: config.dump_dir.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// In-flight tracking
// ---------------------------------------------------------------------------

struct ScanStatus {
    in_flight: AtomicBool,
    state: watch::Sender<ScanState>,
}

/// Held for the lifetime of one run. Dropping it (completion, task abort or
/// future drop) frees the processor; an unfinished run resets state to Idle.
struct InFlightGuard {
    status: Arc<ScanStatus>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.status.state.send_if_modified(|state| {
            if state.is_done() {
                false
            } else {
                *state = ScanState::Idle;
                true
            }
        });
        self.status.in_flight.store(false, Ordering::Release);
    }
}

/// Handle to a scan running on the tokio runtime.
pub struct ScanHandle {
    task: JoinHandle<()>,
}

impl ScanHandle {
    /// Abandon the scan. No result is delivered; returns once the run is torn down.
    pub async fn cancel(self) {
        self.task.abort();
        let _ = self.task.await;
    }

    /// Wait for the scan to deliver its result.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Scan task ended abnormally");
        }
    }
}

/// Contents of `05-outcome.json`.
#[derive(Serialize)]
struct OutcomeDump<'a> {
    scan_id: Uuid,
    started_at: chrono::DateTime<chrono::Utc>,
    elapsed_ms: u64,
    outcome: &'a PipelineOutcome,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs label scans against a text recognizer and a generative model.
///
/// At most one scan is in flight per processor. Progress is published on a
/// watch channel (see [`subscribe`](Self::subscribe)).
pub struct ScanProcessor {
    recognizer: Arc<dyn TextRecognizer>,
    structurer: LabelStructurer,
    settings: ScanSettings,
    status: Arc<ScanStatus>,
}

impl ScanProcessor {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        model: Arc<dyn GenerativeModel>,
        settings: ScanSettings,
    ) -> Self {
        let (state, _) = watch::channel(ScanState::Idle);
        Self {
            recognizer,
            structurer: LabelStructurer::new(model),
            settings,
            status: Arc::new(ScanStatus {
                in_flight: AtomicBool::new(false),
                state,
            }),
        }
    }

    /// Wire the production Vision and Gemini clients.
    pub fn from_config(config: &ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;

        let recognizer = VisionOcrClient::new(
            &config.vision_endpoint,
            &config.vision_api_key,
            config.request_timeout_secs,
        )?;
        let model = GeminiClient::new(
            &config.gemini_base_url,
            &config.gemini_api_key,
            &config.gemini_model,
            config.request_timeout_secs,
        )?;

        tracing::info!(
            model = %config.gemini_model,
            configured = config.services_configured(),
            min_display_ms = %config.min_display.as_millis(),
            hard_timeout_ms = %config.hard_timeout.as_millis(),
            "Scan processor ready"
        );

        Ok(Self::new(
            Arc::new(recognizer),
            Arc::new(model),
            ScanSettings::from(config),
        ))
    }

    /// Observe scan progress. The latest state is always readable.
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.status.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.status.in_flight.load(Ordering::Acquire)
    }

    /// Both credentials are real; otherwise scans return the demo record.
    pub fn services_configured(&self) -> bool {
        self.recognizer.is_configured() && self.structurer.is_configured()
    }

    /// Run one scan to completion.
    ///
    /// Dropping the returned future abandons the scan and frees the processor.
    pub async fn scan(&self, image: ImagePayload) -> Result<PipelineOutcome, ScanError> {
        let guard = self.begin()?;
        Ok(self.run(image, guard).await)
    }

    /// Run a scan on the runtime and deliver its result to `handoff`.
    pub fn spawn(
        self: &Arc<Self>,
        image: ImagePayload,
        handoff: Arc<dyn ResultHandoff>,
    ) -> Result<ScanHandle, ScanError> {
        let guard = self.begin()?;
        let processor = Arc::clone(self);

        let task = tokio::spawn(async move {
            let image_uri = image.uri().map(str::to_string);
            let outcome = processor.run(image, guard).await;
            handoff.deliver(ScanHandoff::from_outcome(outcome, image_uri.as_deref()));
        });

        Ok(ScanHandle { task })
    }

    fn begin(&self) -> Result<InFlightGuard, ScanError> {
        self.status
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ScanError::ScanInProgress)?;
        Ok(InFlightGuard {
            status: Arc::clone(&self.status),
        })
    }

    fn publish(&self, state: ScanState) {
        self.status.state.send_replace(state);
    }

    async fn run(&self, image: ImagePayload, _guard: InFlightGuard) -> PipelineOutcome {
        let scan_id = Uuid::new_v4();
        let span = tracing::info_span!("scan", scan_id = %scan_id, image_size = image.len());

        async {
            let started_at = chrono::Utc::now();
            let start = Instant::now();
            self.publish(ScanState::Capturing);

            let dump = diagnostic::dump_dir_for(self.settings.dump_dir.as_deref(), &scan_id).await;

            let outcome = if self.services_configured() {
                self.await_barrier(&image, dump.as_deref()).await
            } else {
                tracing::warn!("OCR or Gemini API key not configured, returning demo record");
                tokio::time::sleep(self.settings.min_display).await;
                PipelineOutcome::Fallback(MedicationRecord::fallback())
            };

            let elapsed = start.elapsed();
            if let Some(dir) = &dump {
                diagnostic::dump_json(
                    dir,
                    diagnostic::OUTCOME_FILE,
                    &OutcomeDump {
                        scan_id,
                        started_at,
                        elapsed_ms: elapsed.as_millis() as u64,
                        outcome: &outcome,
                    },
                )
                .await;
            }

            tracing::info!(
                outcome = ?outcome.kind(),
                elapsed_ms = %elapsed.as_millis(),
                "Scan complete"
            );
            self.publish(ScanState::Done(outcome.kind()));
            outcome
        }
        .instrument(span)
        .await
    }

    /// Join the service chain with the minimum-display timer.
    ///
    /// Returns once both have completed, or as soon as the chain exceeds the
    /// hard ceiling.
    async fn await_barrier(&self, image: &ImagePayload, dump: Option<&Path>) -> PipelineOutcome {
        let chain = tokio::time::timeout(self.settings.hard_timeout, self.run_chain(image, dump));
        let timer = tokio::time::sleep(self.settings.min_display);
        tokio::pin!(chain);
        tokio::pin!(timer);

        let mut chain_outcome: Option<PipelineOutcome> = None;
        let mut timer_elapsed = false;

        loop {
            if timer_elapsed {
                if let Some(outcome) = chain_outcome.take() {
                    return outcome;
                }
            }

            tokio::select! {
                result = &mut chain, if chain_outcome.is_none() => match result {
                    Ok(outcome) => chain_outcome = Some(outcome),
                    Err(_) => {
                        tracing::warn!(
                            hard_timeout_ms = %self.settings.hard_timeout.as_millis(),
                            "Scan exceeded hard timeout"
                        );
                        return PipelineOutcome::Failure(FailureReason::Timeout);
                    }
                },
                () = &mut timer, if !timer_elapsed => timer_elapsed = true,
            }
        }
    }

    /// Recognize → extract → normalize. Each failure short-circuits.
    async fn run_chain(&self, image: &ImagePayload, dump: Option<&Path>) -> PipelineOutcome {
        // Recognizing
        self.publish(ScanState::Recognizing);
        let text = match self
            .recognizer
            .recognize(image)
            .instrument(tracing::info_span!("recognize"))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Text recognition failed");
                return PipelineOutcome::Failure(e.failure_reason());
            }
        };
        tracing::debug!(text_len = text.as_str().len(), "Label text recognized");
        if let Some(dir) = dump {
            diagnostic::dump_text(dir, diagnostic::OCR_TEXT_FILE, text.as_str()).await;
        }

        // Extracting
        self.publish(ScanState::Extracting);
        let mut trace = StructuringTrace::default();
        let result = self
            .structurer
            .extract_traced(text.as_str(), &self.settings.template, &mut trace)
            .instrument(tracing::info_span!("extract"))
            .await;
        if let Some(dir) = dump {
            dump_trace(dir, &trace).await;
        }
        let candidate = match result {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::warn!(error = %e, "Label structuring failed");
                return PipelineOutcome::Failure(e.failure_reason());
            }
        };

        // Normalizing
        self.publish(ScanState::Normalizing);
        PipelineOutcome::Success(normalize(&candidate))
    }
}

async fn dump_trace(dir: &Path, trace: &StructuringTrace) {
    let files = [
        (diagnostic::PROMPT_FILE, &trace.prompt),
        (diagnostic::LLM_RESPONSE_FILE, &trace.raw_response),
        (diagnostic::CLEANED_RESPONSE_FILE, &trace.cleaned_response),
    ];
    for (file, content) in files {
        if let Some(content) = content {
            diagnostic::dump_text(dir, file, content).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
