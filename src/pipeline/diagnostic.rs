//! Scan diagnostic dump: writes each stage's artifacts to disk.
//!
//! Disabled unless a dump directory is configured (`MEDPAL_DUMP_DIR`).
//! Writes go through `tokio::fs`; callers await them inside the scan chain.
//!
//! **Output structure**:
//! ```text
//! {dump_dir}/{scan_id}/
//!   01-ocr-text.txt
//!   02-structuring-prompt.txt
//!   03-llm-response.txt
//!   04-cleaned-response.txt   (only when the reply failed to decode)
//!   05-outcome.json
//! ```

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const OCR_TEXT_FILE: &str = "01-ocr-text.txt";
pub const PROMPT_FILE: &str = "02-structuring-prompt.txt";
pub const LLM_RESPONSE_FILE: &str = "03-llm-response.txt";
pub const CLEANED_RESPONSE_FILE: &str = "04-cleaned-response.txt";
pub const OUTCOME_FILE: &str = "05-outcome.json";

// ──────────────────────────────────────────────
// Dump directory resolution
// ──────────────────────────────────────────────

/// Returns the dump directory for one scan, or `None` if diagnostics are disabled.
///
/// Creates the directory tree. Returns `None` (with a warning) if creation
/// fails; never blocks the scan.
pub async fn dump_dir_for(base: Option<&Path>, scan_id: &Uuid) -> Option<PathBuf> {
    let dir = base?.join(scan_id.to_string());

    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "Diagnostic dump: failed to create directory"
        );
        return None;
    }

    Some(dir)
}

// ──────────────────────────────────────────────
// Dump writers
// ──────────────────────────────────────────────

/// Write a JSON artifact, pretty-printed. Never panics.
pub async fn dump_json<T: serde::Serialize>(dir: &Path, filename: &str, value: &T) {
    let path = dir.join(filename);
    match serde_json::to_string_pretty(value) {
        Ok(json) => write_artifact(&path, json.as_bytes(), "JSON").await,
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to serialize JSON"
        ),
    }
}

/// Write a text artifact (OCR text, prompt, raw reply). Never panics.
pub async fn dump_text(dir: &Path, filename: &str, text: &str) {
    write_artifact(&dir.join(filename), text.as_bytes(), "text").await;
}

async fn write_artifact(path: &Path, data: &[u8], kind: &str) {
    match tokio::fs::write(path, data).await {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = data.len(),
            kind,
            "Diagnostic dump: artifact written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            kind,
            "Diagnostic dump: failed to write artifact"
        ),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_without_base() {
        assert!(dump_dir_for(None, &Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn creates_scan_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let scan_id = Uuid::new_v4();

        let dir = dump_dir_for(Some(tmp.path()), &scan_id).await.unwrap();

        assert!(dir.is_dir());
        assert!(dir.ends_with(scan_id.to_string()));
    }

    #[tokio::test]
    async fn nested_base_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("dumps").join("scans");

        let dir = dump_dir_for(Some(&base), &Uuid::new_v4()).await.unwrap();
        assert!(dir.starts_with(&base));
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn dump_json_is_pretty() {
        let tmp = tempfile::tempdir().unwrap();

        dump_json(tmp.path(), OUTCOME_FILE, &serde_json::json!({"status": "success"})).await;

        let content = std::fs::read_to_string(tmp.path().join(OUTCOME_FILE)).unwrap();
        assert!(content.contains("\"status\": \"success\""));
        assert!(content.contains('\n'));
    }

    #[tokio::test]
    async fn dump_text_writes_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let ocr = "AMOXICILLIN 500MG\nTake 1 capsule 3x daily";

        dump_text(tmp.path(), OCR_TEXT_FILE, ocr).await;

        let content = std::fs::read_to_string(tmp.path().join(OCR_TEXT_FILE)).unwrap();
        assert_eq!(content, ocr);
    }

    #[tokio::test]
    async fn write_failure_does_not_panic() {
        let bad_dir = Path::new("/nonexistent/medpal/dump");
        dump_text(bad_dir, PROMPT_FILE, "prompt").await;
        dump_json(bad_dir, OUTCOME_FILE, &"data").await;
    }
}
