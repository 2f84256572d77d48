//! Source-text cross-validation.
//!
//! Identifier-like fields the model asserts (patient identifier, blood
//! group, ward) must actually occur in the source text — verbatim or
//! via their numeric core — or they are blanked rather than surfaced as
//! possibly fabricated.

use std::sync::LazyLock;

use regex::Regex;

/// Leading numeric core: a bare number or an n/n ratio.
static NUMERIC_CORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:/\d+)?(?:\.\d+)?").expect("numeric core pattern"));

/// True when `value` is verifiable against `source_text`. Values of two
/// characters or fewer are trivially accepted — too short to usefully
/// verify.
pub fn cross_validate(value: &str, source_text: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.chars().count() <= 2 {
        return true;
    }

    let source_lower = source_text.to_lowercase();
    if source_lower.contains(&trimmed.to_lowercase()) {
        return true;
    }

    // Verbatim failed: fall back to the value's leading numeric core.
    if let Some(m) = NUMERIC_CORE_RE.find(trimmed) {
        return source_text.contains(m.as_str());
    }

    false
}
