pub mod types;
pub mod ollama;
pub mod prompt;
pub mod parser;
pub mod sanitize;
pub mod merge;
pub mod orchestrator;

pub use types::*;
pub use ollama::{MockLlmClient, OllamaClient};
pub use orchestrator::{ExtractionOrchestrator, ProgressEvent};

use thiserror::Error;

/// Pipeline-level failures. Only input-quality and transport failures
/// surface here; per-pass JSON repair failure degrades to empty fields
/// and is never an error.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Document text too short or unreadable — re-scan the source document")]
    InputTooShort,

    #[error("Inference service is not reachable at {0} — is it running?")]
    Connection(String),

    #[error("Inference service returned error (status {status}): {body}")]
    ServiceError { status: u16, body: String },

    #[error("No compatible model available on the inference service")]
    NoModelAvailable,

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed service response envelope: {0}")]
    ResponseParsing(String),
}
