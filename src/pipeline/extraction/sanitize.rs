//! Record sanitization: raw decoded model output → canonical record.
//!
//! Every string gets OCR fixups then placeholder stripping; every
//! confidence is clamped to [0,100] (default 70); every array entry
//! must carry a meaningful key or it is dropped rather than kept as a
//! null-ish stub. Running the sanitizer on its own output is a no-op.

use serde_json::Value;

use super::types::{
    ExtractedDiagnosis, ExtractedLabValue, ExtractedMedication, ExtractedProcedure,
    ExtractedRecord, LabStatus, LabeledValue, PatientDetails,
};
use crate::pipeline::correction::{clean_field, canonical_route};

/// Confidence assigned when the model omitted one or sent garbage.
const DEFAULT_CONFIDENCE: u8 = 70;

/// Candidate patient names longer than this are letterhead fragments.
const MAX_NAME_LEN: usize = 60;

/// Institutional words that mark a "name" as copied letterhead.
const INSTITUTIONAL_KEYWORDS: &[&str] = &[
    "hospital", "clinic", "medical", "centre", "center", "institute",
    "department", "trust", "college", "laboratory", "diagnostics",
    "healthcare", "nursing home",
];

/// Lab value texts that defer to an attachment instead of reporting a
/// measurement.
const DEFERRAL_PHRASES: &[&str] = &["as enclosed", "enclosed", "attached", "see report", "as per report"];

/// Sanitize a full raw record object (single-pass and diagnostic paths).
/// Vitals are intentionally never read from the model output.
pub fn sanitize_record(value: &Value) -> ExtractedRecord {
    ExtractedRecord {
        patient: sanitize_patient(value.get("patient")),
        diagnoses: sanitize_diagnoses(value.get("diagnoses")),
        medications: sanitize_medications(value.get("medications")),
        vitals: Vec::new(),
        lab_values: sanitize_lab_values(value.get("lab_values")),
        procedures: sanitize_procedures(value.get("procedures")),
        discharge_instructions: sanitize_labeled_values(value.get("discharge_instructions")),
        follow_up: sanitize_labeled_values(value.get("follow_up")),
        overall_confidence: clamp_confidence(
            value.get("confidence").or_else(|| value.get("overall_confidence")),
        ),
    }
}

pub fn sanitize_patient(value: Option<&Value>) -> PatientDetails {
    let obj = match value {
        Some(v) if v.is_object() => v,
        _ => return PatientDetails::default(),
    };

    let mut patient = PatientDetails {
        name: str_field(obj, "name"),
        age: str_field(obj, "age"),
        sex: str_field(obj, "sex"),
        identifier: str_field(obj, "identifier"),
        blood_group: str_field(obj, "blood_group"),
        hospital: str_field(obj, "hospital"),
        ward: str_field(obj, "ward"),
        admission_date: str_field(obj, "admission_date"),
        discharge_date: str_field(obj, "discharge_date"),
        attending_physician: str_field(obj, "attending_physician"),
        chief_complaint: str_field(obj, "chief_complaint"),
    };

    if !is_valid_patient_name(&patient.name) {
        patient.name = String::new();
    }

    patient
}

/// A candidate patient name is rejected when it looks like letterhead
/// the model copied instead of abstaining: institutional keywords, a
/// length past the ceiling, or an all-caps multi-word fragment.
pub fn is_valid_patient_name(name: &str) -> bool {
    if name.is_empty() {
        return true; // empty is a legal absence, not an invalid name
    }
    if name.chars().count() > MAX_NAME_LEN {
        return false;
    }

    let lower = name.to_lowercase();
    if INSTITUTIONAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return false;
    }

    let words: Vec<&str> = name.split_whitespace().collect();
    let all_caps = name
        .chars()
        .filter(|c| c.is_alphabetic())
        .all(|c| c.is_uppercase());
    if words.len() > 4 && all_caps {
        return false;
    }

    true
}

pub fn sanitize_diagnoses(value: Option<&Value>) -> Vec<ExtractedDiagnosis> {
    array_items(value)
        .filter_map(|item| {
            let name = str_field(item, "name");
            if name.is_empty() {
                return None;
            }
            Some(ExtractedDiagnosis {
                name,
                icd10_code: str_field(item, "icd10_code"),
                snomed_code: str_field(item, "snomed_code"),
                confidence: clamp_confidence(item.get("confidence")),
            })
        })
        .collect()
}

pub fn sanitize_medications(value: Option<&Value>) -> Vec<ExtractedMedication> {
    array_items(value)
        .filter_map(|item| {
            let name = str_field(item, "name");
            if name.chars().count() < 2 {
                return None;
            }
            let suggested = str_field(item, "route");
            Some(ExtractedMedication {
                route: canonical_route(&name, &suggested),
                dosage: str_field(item, "dosage"),
                confidence: clamp_confidence(item.get("confidence")),
                name,
            })
        })
        .collect()
}

pub fn sanitize_lab_values(value: Option<&Value>) -> Vec<ExtractedLabValue> {
    array_items(value)
        .filter_map(|item| {
            let test_name = str_field(item, "test_name");
            let value_text = str_field(item, "value");
            if test_name.is_empty() || !is_real_measurement(&value_text) {
                return None;
            }
            Some(ExtractedLabValue {
                test_name,
                value: value_text,
                unit: str_field(item, "unit"),
                reference_range: str_field(item, "reference_range"),
                status: parse_lab_status(item.get("status")),
                loinc_code: str_field(item, "loinc_code"),
                confidence: clamp_confidence(item.get("confidence")),
            })
        })
        .collect()
}

/// A lab value must be an actual measurement, not a deferral to an
/// attachment the OCR layer never saw.
fn is_real_measurement(value_text: &str) -> bool {
    if value_text.is_empty() {
        return false;
    }
    let lower = value_text.to_lowercase();
    !DEFERRAL_PHRASES.iter().any(|p| lower.contains(p))
}

fn parse_lab_status(value: Option<&Value>) -> LabStatus {
    match value.and_then(|v| v.as_str()).map(str::to_lowercase).as_deref() {
        Some("high") | Some("h") => LabStatus::High,
        Some("low") | Some("l") => LabStatus::Low,
        _ => LabStatus::Normal,
    }
}

pub fn sanitize_procedures(value: Option<&Value>) -> Vec<ExtractedProcedure> {
    array_items(value)
        .filter_map(|item| {
            let name = str_field(item, "name");
            if name.is_empty() {
                return None;
            }
            Some(ExtractedProcedure {
                name,
                snomed_code: str_field(item, "snomed_code"),
                day_of_stay: str_field(item, "day_of_stay"),
                findings: str_field(item, "findings"),
                confidence: clamp_confidence(item.get("confidence")),
            })
        })
        .collect()
}

pub fn sanitize_labeled_values(value: Option<&Value>) -> Vec<LabeledValue> {
    array_items(value)
        .filter_map(|item| {
            let label = str_field(item, "label");
            let value_text = str_field(item, "value");
            if label.is_empty() && value_text.is_empty() {
                return None;
            }
            Some(LabeledValue {
                label,
                value: value_text,
                confidence: clamp_confidence(item.get("confidence")),
            })
        })
        .collect()
}

/// Clamp a confidence value to [0,100]. Absent or non-numeric defaults
/// to 70. Fractions strictly inside (0,1) are treated as ratios and
/// scaled — some models answer 0.9 no matter what the schema says. An
/// exact 1 stays 1: on the 0-100 scale that is a reported confidence
/// of one percent, not a ratio.
pub fn clamp_confidence(value: Option<&Value>) -> u8 {
    let num = match value.and_then(Value::as_f64) {
        Some(n) if n.is_finite() => n,
        _ => return DEFAULT_CONFIDENCE,
    };
    let scaled = if num > 0.0 && num < 1.0 { num * 100.0 } else { num };
    scaled.clamp(0.0, 100.0).round() as u8
}

fn str_field(obj: &Value, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .map(clean_field)
        .unwrap_or_default()
}

fn array_items(value: Option<&Value>) -> impl Iterator<Item = &Value> {
    value
        .and_then(Value::as_array)
        .map(|a| a.as_slice())
        .unwrap_or(&[])
        .iter()
}
