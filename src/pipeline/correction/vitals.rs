//! Deterministic discharge-vitals parser.
//!
//! Vitals are never taken from the language model: they are short
//! numeric tokens the model happily copies from the wrong section
//! (admission vs. discharge) or invents outright. Instead we locate the
//! *discharge* vitals window — the rightmost vitals marker, because
//! discharge vitals physically sit near the end of the document — and
//! run one label-anchored regex per vital, each gated by a
//! physiological range check.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::extraction::types::ExtractedVital;

/// Marker spellings for a vitals block, searched with rfind semantics.
const VITALS_MARKERS: &[&str] = &[
    "VITALS AT DISCHARGE",
    "DISCHARGE VITALS",
    "VITAL SIGNS",
    "VITALS",
    "O/E",
];

/// Abbreviations used to score fallback windows by vitals density.
const VITAL_ABBREVIATIONS: &[&str] = &["PR", "BP", "RR", "SPO2", "TEMP", "HR", "CVS"];

/// Window scanned after a marker hit (or per fallback step).
const WINDOW_LEN: usize = 1_200;
const WINDOW_STEP: usize = 600;

/// Regex-verified vitals get a fixed high confidence.
const VERIFIED_CONFIDENCE: u8 = 95;

static PULSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:PR|PULSE|HR)\s*[:\-]?\s*(\d{2,3})\s*(?:/\s*min|bpm)?").expect("pulse pattern")
});
static BP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bBP\s*[:\-]?\s*(\d{2,3})\s*/\s*(\d{2,3})").expect("bp pattern")
});
static TEMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:TEMP|TEMPERATURE)\s*[:\-]?\s*(\d{2,3}(?:\.\d)?)").expect("temp pattern")
});
static RR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bRR\s*[:\-]?\s*(\d{1,2})\s*(?:/\s*min)?").expect("rr pattern")
});
static SPO2_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bSPO2\s*[:\-]?\s*(\d{2,3})\s*%?").expect("spo2 pattern")
});

/// Parse discharge vitals from the concatenated vitals/discharge/raw
/// windows. Returns zero to five entries; no marker or all-failed range
/// checks yields an empty list, never a guess.
pub fn parse_discharge_vitals(text: &str) -> Vec<ExtractedVital> {
    // Locate and slice on the same uppercased copy: uppercasing can
    // change byte length (ﬁ → FI, ß → SS), so offsets found in one
    // string must never index the other. The per-vital regexes are
    // case-insensitive and every output value is rebuilt from digit
    // captures, so parsing the uppercase window loses nothing.
    let upper = text.to_uppercase();
    let window = match locate_vitals_window(&upper) {
        Some(w) => w,
        None => return Vec::new(),
    };

    let mut vitals = Vec::new();

    if let Some(cap) = PULSE_RE.captures(window) {
        if let Some(v) = parse_in_range(&cap[1], 30.0, 220.0) {
            vitals.push(vital("Pulse", format!("{v}/min")));
        }
    }

    if let Some(cap) = BP_RE.captures(window) {
        let sys = parse_in_range(&cap[1], 50.0, 300.0);
        let dia = parse_in_range(&cap[2], 20.0, 200.0);
        if let (Some(s), Some(d)) = (sys, dia) {
            vitals.push(vital("Blood Pressure", format!("{s}/{d} mmHg")));
        }
    }

    if let Some(cap) = TEMP_RE.captures(window) {
        // Fahrenheit charts dominate, but Celsius readings are accepted.
        let raw: f64 = cap[1].parse().unwrap_or(0.0);
        let fahrenheit = (90.0..=110.0).contains(&raw);
        let celsius = (30.0..=45.0).contains(&raw);
        if fahrenheit || celsius {
            let unit = if celsius { "°C" } else { "°F" };
            vitals.push(vital("Temperature", format!("{}{unit}", &cap[1])));
        }
    }

    if let Some(cap) = RR_RE.captures(window) {
        if let Some(v) = parse_in_range(&cap[1], 5.0, 60.0) {
            vitals.push(vital("Respiratory Rate", format!("{v}/min")));
        }
    }

    if let Some(cap) = SPO2_RE.captures(window) {
        if let Some(v) = parse_in_range(&cap[1], 50.0, 100.0) {
            vitals.push(vital("SpO2", format!("{v}%")));
        }
    }

    tracing::debug!(count = vitals.len(), "Deterministic vitals parsed");
    vitals
}

fn vital(name: &str, value: String) -> ExtractedVital {
    ExtractedVital {
        name: name.to_string(),
        value,
        confidence: VERIFIED_CONFIDENCE,
    }
}

fn parse_in_range(s: &str, min: f64, max: f64) -> Option<i64> {
    let v: f64 = s.parse().ok()?;
    if (min..=max).contains(&v) {
        Some(v as i64)
    } else {
        // Out-of-range match is a false positive, not an error.
        None
    }
}

/// Locate the discharge vitals window: rightmost marker hit first,
/// density-scored backward scan as fallback. `upper` is the uppercased
/// document; all offsets index it and the returned window borrows it.
fn locate_vitals_window(upper: &str) -> Option<&str> {
    // Rightmost occurrence across all marker spellings.
    let marker_pos = VITALS_MARKERS
        .iter()
        .filter_map(|m| upper.rfind(m))
        .max();

    if let Some(pos) = marker_pos {
        let end = floor_char_boundary(upper, (pos + WINDOW_LEN).min(upper.len()));
        return Some(&upper[pos..end]);
    }

    scan_backward_for_density(upper)
}

/// No marker found: scan backward from the end in fixed-size windows,
/// scoring each by how many distinct vital abbreviations it contains.
/// Rightmost window with the highest density wins; a window holding ≥4
/// distinct abbreviations wins immediately.
fn scan_backward_for_density(upper: &str) -> Option<&str> {
    if upper.is_empty() {
        return None;
    }

    let mut best: Option<(usize, usize)> = None; // (score, start)
    let mut start = upper.len().saturating_sub(WINDOW_LEN);

    loop {
        let s = floor_char_boundary(upper, start);
        let e = floor_char_boundary(upper, (s + WINDOW_LEN).min(upper.len()));
        let window = &upper[s..e];
        let score = VITAL_ABBREVIATIONS
            .iter()
            .filter(|a| window.contains(*a))
            .count();

        if score >= 4 {
            return Some(window);
        }
        // Strictly-greater keeps the rightmost window on ties.
        if score > 0 && best.map_or(true, |(b, _)| score > b) {
            best = Some((score, s));
        }

        if start == 0 {
            break;
        }
        start = start.saturating_sub(WINDOW_STEP);
    }

    best.map(|(_, s)| {
        let e = floor_char_boundary(upper, (s + WINDOW_LEN).min(upper.len()));
        &upper[s..e]
    })
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
