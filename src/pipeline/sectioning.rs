//! Marker-based section detection for discharge summaries.
//!
//! Splits raw document text into named clinical zones by searching an
//! ordered marker table. Windows are substrings of the input; a missing
//! section is an empty string, never an error. `raw` always carries the
//! full input so downstream consumers can re-scan the whole document.

use serde::{Deserialize, Serialize};

/// Named text windows for one document. Produced once per upload and
/// read-only for the remainder of processing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicalSections {
    pub header: String,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub comorbidities: String,
    pub procedures: String,
    pub medications: String,
    pub vitals: String,
    pub investigations: String,
    pub discharge: String,
    pub follow_up: String,
    /// Full input, verbatim.
    pub raw: String,
}

/// One entry of the marker table: section slot + marker spellings.
/// Order matters — earlier entries claim their window first, and all
/// markers together delimit each other's windows.
struct SectionMarkers {
    slot: Slot,
    markers: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    ChiefComplaint,
    Diagnosis,
    Comorbidities,
    Procedures,
    Medications,
    Vitals,
    Investigations,
    Discharge,
    FollowUp,
}

const MARKER_TABLE: &[SectionMarkers] = &[
    SectionMarkers {
        slot: Slot::ChiefComplaint,
        markers: &["CHIEF COMPLAINT", "PRESENTING COMPLAINT", "C/O", "COMPLAINTS"],
    },
    SectionMarkers {
        slot: Slot::Diagnosis,
        markers: &["FINAL DIAGNOSIS", "DIAGNOSIS", "PROVISIONAL DIAGNOSIS"],
    },
    SectionMarkers {
        slot: Slot::Comorbidities,
        markers: &["COMORBIDITIES", "CO-MORBIDITIES", "KNOWN CASE OF", "PAST HISTORY"],
    },
    SectionMarkers {
        slot: Slot::Procedures,
        markers: &["PROCEDURES", "PROCEDURE DONE", "COURSE IN HOSPITAL", "HOSPITAL COURSE"],
    },
    SectionMarkers {
        slot: Slot::Medications,
        markers: &[
            "DISCHARGE MEDICATIONS",
            "MEDICATIONS ON DISCHARGE",
            "TREATMENT GIVEN",
            "MEDICATIONS",
            "RX",
        ],
    },
    SectionMarkers {
        slot: Slot::Vitals,
        markers: &["VITALS AT DISCHARGE", "DISCHARGE VITALS", "VITAL SIGNS", "VITALS", "O/E"],
    },
    SectionMarkers {
        slot: Slot::Investigations,
        markers: &["INVESTIGATIONS", "LAB INVESTIGATIONS", "LABORATORY", "REPORTS"],
    },
    SectionMarkers {
        slot: Slot::Discharge,
        markers: &["CONDITION AT DISCHARGE", "DISCHARGE ADVICE", "ADVICE ON DISCHARGE", "ADVICE"],
    },
    SectionMarkers {
        slot: Slot::FollowUp,
        markers: &["FOLLOW UP", "FOLLOW-UP", "REVIEW AFTER", "NEXT VISIT"],
    },
];

/// Cap on any single window — keeps pathological documents bounded.
const MAX_WINDOW: usize = 6_000;

/// Split raw document text into named clinical zones.
pub fn detect_sections(raw: &str) -> ClinicalSections {
    let upper = raw.to_uppercase();

    // First occurrence of each slot's earliest marker.
    let mut hits: Vec<(usize, Slot)> = Vec::new();
    for entry in MARKER_TABLE {
        let earliest = entry
            .markers
            .iter()
            .filter_map(|m| upper.find(m))
            .min();
        if let Some(pos) = earliest {
            hits.push((pos, entry.slot));
        }
    }
    hits.sort_by_key(|&(pos, _)| pos);

    let mut sections = ClinicalSections {
        raw: raw.to_string(),
        ..Default::default()
    };

    // Header = everything before the first recognized marker.
    let header_end = hits.first().map_or_else(
        || floor_char_boundary(raw, raw.len().min(800)),
        |&(pos, _)| floor_char_boundary(raw, pos),
    );
    sections.header = raw[..header_end].trim().to_string();

    for (i, &(start, slot)) in hits.iter().enumerate() {
        let end = hits
            .get(i + 1)
            .map_or(raw.len(), |&(next, _)| next)
            .min(start + MAX_WINDOW);
        let start = floor_char_boundary(raw, start);
        let end = floor_char_boundary(raw, end);
        let window = raw[start..end].trim().to_string();
        match slot {
            Slot::ChiefComplaint => sections.chief_complaint = window,
            Slot::Diagnosis => sections.diagnosis = window,
            Slot::Comorbidities => sections.comorbidities = window,
            Slot::Procedures => sections.procedures = window,
            Slot::Medications => sections.medications = window,
            Slot::Vitals => sections.vitals = window,
            Slot::Investigations => sections.investigations = window,
            Slot::Discharge => sections.discharge = window,
            Slot::FollowUp => sections.follow_up = window,
        }
    }

    sections
}

/// Round a byte index down to the nearest char boundary.
fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Markers that identify a standalone lab/imaging report rather than a
/// discharge summary. Such documents take the single-pass diagnostic path.
const DIAGNOSTIC_REPORT_MARKERS: &[&str] = &[
    "LABORATORY REPORT",
    "DIAGNOSTIC REPORT",
    "PATHOLOGY REPORT",
    "RADIOLOGY REPORT",
    "ULTRASOUND REPORT",
    "X-RAY REPORT",
    "CT SCAN",
    "MRI REPORT",
    "TEST REPORT",
];

/// Markers whose presence signals a discharge summary.
const SUMMARY_MARKERS: &[&str] = &["DISCHARGE SUMMARY", "DISCHARGE ADVICE", "DATE OF DISCHARGE", "DOD"];

pub fn looks_like_diagnostic_report(raw: &str) -> bool {
    let upper = raw.to_uppercase();
    let report_hits = DIAGNOSTIC_REPORT_MARKERS
        .iter()
        .filter(|m| upper.contains(*m))
        .count();
    let summary_hits = SUMMARY_MARKERS.iter().filter(|m| upper.contains(*m)).count();
    report_hits > 0 && summary_hits == 0
}

/// A document has sufficient structure for the multi-pass path when at
/// least two distinct clinical zones were found. Below that the section
/// windows are too thin to be worth separate passes.
pub fn has_sufficient_structure(sections: &ClinicalSections) -> bool {
    let found = [
        &sections.chief_complaint,
        &sections.diagnosis,
        &sections.comorbidities,
        &sections.procedures,
        &sections.medications,
        &sections.vitals,
        &sections.investigations,
        &sections.discharge,
        &sections.follow_up,
    ]
    .iter()
    .filter(|w| !w.is_empty())
    .count();
    found >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "CITY GENERAL HOSPITAL\nDISCHARGE SUMMARY\n\
        Patient: Ramesh Kumar, 58/M\n\
        DIAGNOSIS: Type 2 Diabetes Mellitus with foot ulcer\n\
        COMORBIDITIES: Hypertension\n\
        MEDICATIONS: TAB. METFORMIN 500MG 1-0-1\n\
        VITALS: PR: 82/min BP: 130/80 mmHg\n\
        FOLLOW UP: Review after 2 weeks";

    #[test]
    fn detects_expected_windows() {
        let s = detect_sections(SAMPLE);
        assert!(s.header.contains("CITY GENERAL HOSPITAL"));
        assert!(s.diagnosis.starts_with("DIAGNOSIS"));
        assert!(s.diagnosis.contains("foot ulcer"));
        assert!(s.medications.contains("METFORMIN"));
        assert!(s.vitals.contains("130/80"));
        assert!(s.follow_up.contains("2 weeks"));
        assert_eq!(s.raw, SAMPLE);
    }

    #[test]
    fn windows_are_substrings_of_input() {
        let s = detect_sections(SAMPLE);
        for w in [&s.diagnosis, &s.medications, &s.vitals, &s.follow_up] {
            assert!(SAMPLE.contains(w.as_str()), "window not a substring: {w}");
        }
    }

    #[test]
    fn missing_sections_are_empty_not_error() {
        let s = detect_sections("Just a note with no recognizable structure at all.");
        assert!(s.diagnosis.is_empty());
        assert!(s.medications.is_empty());
        assert!(!s.raw.is_empty());
    }

    #[test]
    fn empty_input_degrades_gracefully() {
        let s = detect_sections("");
        assert!(s.header.is_empty());
        assert!(s.raw.is_empty());
    }

    #[test]
    fn diagnostic_report_classifier() {
        assert!(looks_like_diagnostic_report(
            "LABORATORY REPORT\nHb 11.2 g/dL\nTLC 9800"
        ));
        assert!(!looks_like_diagnostic_report(SAMPLE));
        // A discharge summary that mentions reports stays a summary.
        assert!(!looks_like_diagnostic_report(
            "DISCHARGE SUMMARY\nDOD: 04/05/2024\nCT SCAN showed no bleed"
        ));
    }

    #[test]
    fn structure_sufficiency() {
        assert!(has_sufficient_structure(&detect_sections(SAMPLE)));
        assert!(!has_sufficient_structure(&detect_sections(
            "Short unstructured note"
        )));
    }

    #[test]
    fn marker_case_insensitive() {
        let s = detect_sections("diagnosis: asthma\nmedications: inhaler");
        assert!(s.diagnosis.contains("asthma"));
        assert!(s.medications.contains("inhaler"));
    }
}
