pub mod config;
pub mod pipeline;

pub use pipeline::extraction::{
    ExtractedRecord, ExtractionError, ExtractionOrchestrator, LlmClient, OllamaClient,
    ProgressEvent,
};
pub use pipeline::validation::{validate_record, ValidationReport};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for callers that embed the pipeline directly.
/// Respects RUST_LOG when set; call at most once per process.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
    tracing::info!(version = config::APP_VERSION, "Pipeline tracing initialized");
}
