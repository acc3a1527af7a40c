use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "MedPal";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Marker carried by credentials that were never filled in.
pub const PLACEHOLDER_MARKER: &str = "YOUR_";

pub const PLACEHOLDER_VISION_KEY: &str = "YOUR_GOOGLE_VISION_API_KEY";
pub const PLACEHOLDER_GEMINI_KEY: &str = "YOUR_GOOGLE_GEMINI_API_KEY";

pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Google APIs accept the key in this header; keeps it out of request URLs.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Minimum time the processing screen stays up.
pub const DEFAULT_MIN_DISPLAY: Duration = Duration::from_secs(3);
/// Ceiling for the OCR + structuring chain.
pub const DEFAULT_HARD_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-request HTTP timeout. Below the hard ceiling so a hung request
/// surfaces as a service error first.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 25;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "medpal_lib=debug,medpal_scan=debug,info"
    } else {
        "medpal_lib=info,medpal_scan=info,warn"
    }
}

/// True when a credential is blank or still carries the placeholder marker.
pub fn is_placeholder_key(key: &str) -> bool {
    let key = key.trim();
    key.is_empty() || key.contains(PLACEHOLDER_MARKER)
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Endpoint must be an http(s) URL: {0}")]
    InvalidEndpoint(String),

    #[error("Gemini model name must not be empty")]
    EmptyModel,

    #[error("Hard timeout must be greater than zero")]
    ZeroTimeout,
}

/// Scan pipeline configuration.
#[derive(Clone, Serialize)]
pub struct ScanConfig {
    #[serde(skip)]
    pub vision_api_key: String,
    #[serde(skip)]
    pub gemini_api_key: String,
    pub vision_endpoint: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub min_display: Duration,
    pub hard_timeout: Duration,
    pub request_timeout_secs: u64,
    pub dump_dir: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            vision_api_key: PLACEHOLDER_VISION_KEY.into(),
            gemini_api_key: PLACEHOLDER_GEMINI_KEY.into(),
            vision_endpoint: DEFAULT_VISION_ENDPOINT.into(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.into(),
            gemini_model: DEFAULT_GEMINI_MODEL.into(),
            min_display: DEFAULT_MIN_DISPLAY,
            hard_timeout: DEFAULT_HARD_TIMEOUT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            dump_dir: None,
        }
    }
}

impl std::fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &str| if is_placeholder_key(key) { "<unset>" } else { "<redacted>" };
        f.debug_struct("ScanConfig")
            .field("vision_api_key", &redact(&self.vision_api_key))
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("vision_endpoint", &self.vision_endpoint)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("gemini_model", &self.gemini_model)
            .field("min_display", &self.min_display)
            .field("hard_timeout", &self.hard_timeout)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("dump_dir", &self.dump_dir)
            .finish()
    }
}

impl ScanConfig {
    /// Build from process environment; unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup("GOOGLE_VISION_API_KEY") {
            config.vision_api_key = key;
        }
        if let Some(key) = lookup("GOOGLE_GEMINI_API_KEY") {
            config.gemini_api_key = key;
        }
        if let Some(url) = lookup("MEDPAL_VISION_ENDPOINT") {
            config.vision_endpoint = url;
        }
        if let Some(url) = lookup("MEDPAL_GEMINI_BASE_URL") {
            config.gemini_base_url = url;
        }
        if let Some(model) = lookup("MEDPAL_GEMINI_MODEL") {
            config.gemini_model = model;
        }
        if let Some(ms) = lookup("MEDPAL_MIN_DISPLAY_MS") {
            config.min_display = Duration::from_millis(parse_u64("MEDPAL_MIN_DISPLAY_MS", &ms)?);
        }
        if let Some(ms) = lookup("MEDPAL_HARD_TIMEOUT_MS") {
            config.hard_timeout = Duration::from_millis(parse_u64("MEDPAL_HARD_TIMEOUT_MS", &ms)?);
        }
        if let Some(secs) = lookup("MEDPAL_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_u64("MEDPAL_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(dir) = lookup("MEDPAL_DUMP_DIR").filter(|d| !d.trim().is_empty()) {
            config.dump_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in [&self.vision_endpoint, &self.gemini_base_url] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidEndpoint(url.clone()));
            }
        }
        if self.gemini_model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        if self.hard_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Both credentials are real values.
    pub fn services_configured(&self) -> bool {
        !is_placeholder_key(&self.vision_api_key) && !is_placeholder_key(&self.gemini_api_key)
    }
}

fn parse_u64(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        })
}
