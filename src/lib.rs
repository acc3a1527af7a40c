pub mod config;
pub mod pipeline;

pub use config::ScanConfig;
pub use pipeline::extraction::types::ImagePayload;
pub use pipeline::handoff::{ResultHandoff, ScanHandoff};
pub use pipeline::outcome::{FailureReason, PipelineOutcome, ScanState};
pub use pipeline::processor::{ScanError, ScanProcessor};

use tracing_subscriber::EnvFilter;

/// Initialize tracing. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}
