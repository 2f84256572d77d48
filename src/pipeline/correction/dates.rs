//! Label-anchored admission/discharge date extraction.
//!
//! Dates are only accepted next to an explicit label (DOA / Date of
//! Admission, DOD / Date of Discharge) — never inferred from prose.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// Admission/discharge dates as normalized text, empty when unlabeled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StayDates {
    pub admission: String,
    pub discharge: String,
}

static ADMISSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\bDOA\b|DATE\s+OF\s+ADMISSION|ADMITTED\s+ON)\s*[:\-]?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
    )
    .expect("admission date pattern")
});

static DISCHARGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\bDOD\b|DATE\s+OF\s+DISCHARGE|DISCHARGED\s+ON)\s*[:\-]?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
    )
    .expect("discharge date pattern")
});

/// Extract labeled admission/discharge dates, separators normalized to `/`.
pub fn parse_admission_discharge_dates(text: &str) -> StayDates {
    StayDates {
        admission: first_date(&ADMISSION_RE, text),
        discharge: first_date(&DISCHARGE_RE, text),
    }
}

fn first_date(re: &Regex, text: &str) -> String {
    re.captures(text)
        .map(|cap| cap[1].replace('-', "/"))
        .filter(|d| is_calendar_date(d))
        .unwrap_or_default()
}

/// Reject label-adjacent number runs that cannot be a D/M/Y date
/// (e.g. "45/13/2024" from a garbled scan).
fn is_calendar_date(normalized: &str) -> bool {
    NaiveDate::parse_from_str(normalized, "%d/%m/%Y").is_ok()
        || NaiveDate::parse_from_str(normalized, "%d/%m/%y").is_ok()
}
