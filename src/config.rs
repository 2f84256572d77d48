//! Pipeline-wide constants. Everything here is tunable data, not control
//! flow — lookup tables for the correction layer live next to their
//! parsers, endpoint/budget knobs live here.

/// Crate version, surfaced in logs.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default local Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Per-call timeout for inference requests (seconds). Generous because
/// CPU-only hosts can take minutes per pass; a timeout aborts the whole
/// orchestration rather than surfacing a partial record.
pub const INFERENCE_TIMEOUT_SECS: u64 = 300;

/// Preferred models in order. The first tag available on the endpoint
/// wins; discovery failure falls back to `FALLBACK_MODEL`.
pub const PREFERRED_MODELS: &[&str] = &[
    "medgemma",
    "medgemma:27b",
    "medgemma:4b",
    "llama3.1:8b",
    "llama3:8b",
];

/// Hardcoded fallback when model discovery fails or returns nothing.
pub const FALLBACK_MODEL: &str = "llama3:8b";

/// Generation options sent with every inference request.
pub const GEN_TEMPERATURE: f32 = 0.1;
pub const GEN_NUM_CTX: u32 = 8192;
pub const GEN_NUM_PREDICT: u32 = 2048;
pub const GEN_REPEAT_PENALTY: f32 = 1.1;

/// Minimum usable input length (characters) before any extraction pass.
pub const MIN_INPUT_LENGTH: usize = 100;

/// Per-section character budgets for prompt construction. Keeps each
/// pass inside the model's context window even for long documents.
pub const BUDGET_HEADER: usize = 1_500;
pub const BUDGET_DIAGNOSIS: usize = 2_000;
pub const BUDGET_MEDICATIONS: usize = 3_000;
pub const BUDGET_PROCEDURES: usize = 2_500;
pub const BUDGET_DISCHARGE: usize = 2_000;
pub const BUDGET_RAW_FALLBACK: usize = 6_000;

pub fn default_log_filter() -> &'static str {
    "cliniform=info"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_version_is_populated() {
        assert!(!APP_VERSION.is_empty());
        assert!(APP_VERSION.chars().next().is_some_and(|c| c.is_ascii_digit()));
    }

    #[test]
    fn preferred_models_nonempty_with_fallback() {
        assert!(!PREFERRED_MODELS.is_empty());
        assert!(!FALLBACK_MODEL.is_empty());
    }

    #[test]
    fn budgets_fit_context_window() {
        let total = BUDGET_HEADER + BUDGET_DIAGNOSIS + BUDGET_MEDICATIONS;
        // Worst-case single prompt stays well under num_ctx (~4 chars/token).
        assert!(total < (GEN_NUM_CTX as usize) * 4);
    }
}
