pub mod extraction; // Label OCR (Google Vision)
pub mod structuring; // OCR text → medication record (Gemini)
pub mod outcome;
pub mod processor; // Scan orchestrator: chain + minimum-display barrier + ceiling
pub mod handoff;
pub mod diagnostic; // Per-scan artifact dump (MEDPAL_DUMP_DIR)
