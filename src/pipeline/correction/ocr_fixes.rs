//! Known OCR misread corrections and placeholder stripping.
//!
//! The substitution table is ordered — later rules may rely on earlier
//! ones having already run (e.g. digit-artifact removal before spacing
//! fixes). Unmatched text passes through unchanged.

use std::sync::LazyLock;

use regex::Regex;

/// Literal substitutions for drug/diagnosis names the OCR layer keeps
/// misreading in hospital-format documents.
const LITERAL_FIXES: &[(&str, &str)] = &[
    ("METFORRNIN", "METFORMIN"),
    ("Metforrnin", "Metformin"),
    ("METF0RMIN", "METFORMIN"),
    ("AMLODIPINF", "AMLODIPINE"),
    ("ATORVASTAT1N", "ATORVASTATIN"),
    ("PANTOPRAZ0LE", "PANTOPRAZOLE"),
    ("1NSULIN", "INSULIN"),
    ("lnsulin", "Insulin"),
    ("HYPERTENSI0N", "HYPERTENSION"),
    ("D1ABETES", "DIABETES"),
    ("MELL1TUS", "MELLITUS"),
    ("PNEUMON1A", "PNEUMONIA"),
];

/// Regex substitutions for digit-insertion artifacts near numeric
/// vitals: a stray leading "1" glued onto a 3-digit BP reading by a
/// scan fold ("BP: 1120/80" → "BP: 120/80").
static REGEX_FIXES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)(BP[:\s]*)1(1\d{2})/").expect("BP artifact pattern"),
            "${1}${2}/",
        ),
        (
            Regex::new(r"(?i)(SPO2[:\s]*)1(10\d)\b").expect("SpO2 artifact pattern"),
            "${1}${2}",
        ),
        // OCR-doubled percent sign after saturation values.
        (
            Regex::new(r"(\d)%%").expect("double percent pattern"),
            "${1}%",
        ),
    ]
});

/// Apply the ordered fixup table. Pure and deterministic.
pub fn fix_known_ocr_errors(text: &str) -> String {
    let mut out = text.to_string();
    for (from, to) in LITERAL_FIXES {
        if out.contains(from) {
            out = out.replace(from, to);
        }
    }
    for (re, repl) in REGEX_FIXES.iter() {
        out = re.replace_all(&out, *repl).into_owned();
    }
    out
}

/// Tokens that mean "no data". Case-insensitive; compared after trim.
const PLACEHOLDER_TOKENS: &[&str] = &[
    "n/a", "na", "nil", "none", "null", "unknown", "not available",
    "not specified", "not mentioned", "pending", "tbd", "xxx",
    "-", "--", "---", ".", "..", "...",
];

/// True when a value carries no information. Empty and whitespace-only
/// strings count as placeholders.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lower = trimmed.to_lowercase();
    PLACEHOLDER_TOKENS.contains(&lower.as_str())
}

/// Canonical field cleaner: "" for placeholders, OCR-fixed text otherwise.
pub fn clean_field(value: &str) -> String {
    if is_placeholder(value) {
        return String::new();
    }
    fix_known_ocr_errors(value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixes_drug_misreads() {
        assert_eq!(fix_known_ocr_errors("TAB. METFORRNIN 500MG"), "TAB. METFORMIN 500MG");
        assert_eq!(fix_known_ocr_errors("Metforrnin continued"), "Metformin continued");
        assert_eq!(fix_known_ocr_errors("1NSULIN 8U"), "INSULIN 8U");
    }

    #[test]
    fn fixes_bp_digit_artifact() {
        assert_eq!(fix_known_ocr_errors("BP: 1120/80 mmHg"), "BP: 120/80 mmHg");
        // A genuine 3-digit systolic is left alone.
        assert_eq!(fix_known_ocr_errors("BP: 148/92 mmHg"), "BP: 148/92 mmHg");
    }

    #[test]
    fn fixes_doubled_percent() {
        assert_eq!(fix_known_ocr_errors("SPO2: 98%%"), "SPO2: 98%");
    }

    #[test]
    fn unmatched_text_passes_through() {
        let input = "Patient stable, tolerating oral feeds.";
        assert_eq!(fix_known_ocr_errors(input), input);
    }

    #[test]
    fn placeholder_vocabulary() {
        for v in ["N/A", "n/a", "nil", "Pending", "TBD", "---", "...", "  ", ""] {
            assert!(is_placeholder(v), "{v:?} should be a placeholder");
        }
        for v in ["Metformin", "120/80", "Ward 4B"] {
            assert!(!is_placeholder(v), "{v:?} should not be a placeholder");
        }
    }

    #[test]
    fn clean_field_blanks_placeholders() {
        assert_eq!(clean_field("N/A"), "");
        assert_eq!(clean_field("  pending  "), "");
        assert_eq!(clean_field(" METFORRNIN "), "METFORMIN");
    }

    #[test]
    fn clean_field_idempotent() {
        for v in ["Metformin", "", "120/80 mmHg", "Type 2 Diabetes Mellitus"] {
            let once = clean_field(v);
            assert_eq!(clean_field(&once), once);
        }
    }
}
