//! Deterministic merge applied after the model passes.
//!
//! The model's output is advisory for everything a regex can do better:
//! vitals come only from the deterministic parser, stay dates are
//! backfilled from the header, known high-stakes drugs are re-scanned
//! straight from the medication section, diagnoses are coded from the
//! lookup table, and identifier-like patient fields must survive
//! cross-validation against the source or they are blanked.

use tracing::debug;

use super::types::{ExtractedDiagnosis, ExtractedMedication, ExtractedRecord};
use crate::pipeline::correction::{
    canonical_route, cross_validate, normalize_diagnosis, parse_admission_discharge_dates,
    parse_discharge_vitals,
};
use crate::pipeline::sectioning::ClinicalSections;

/// Confidence for drugs recovered by the must-capture scan rather than
/// the model.
const RESCUED_MED_CONFIDENCE: u8 = 75;

/// How much of the document start to search when backfilling dates the
/// header section missed.
const DATE_SCAN_PREFIX: usize = 2000;

/// Drugs that must never be silently dropped. Insulins and IV fluids
/// are exactly what a clinician checks first on a discharge summary.
const MUST_CAPTURE_DRUGS: &[&str] = &["Insulatard", "Actrapid", "Mixtard", "Lantus", "IV Fluids"];

/// Per-pass confidences feeding the overall score; absent on the
/// single-pass and diagnostic-report paths, where the model's own
/// overall confidence stands.
#[derive(Debug, Clone, Copy)]
pub struct PassConfidences {
    pub pass1: u8,
    pub pass3: u8,
}

/// Finalize an assembled record against the sectioned source text.
pub fn merge_record(
    record: &mut ExtractedRecord,
    sections: &ClinicalSections,
    passes: Option<PassConfidences>,
) {
    record.vitals = deterministic_vitals(sections);

    backfill_stay_dates(record, sections);

    rescue_must_capture_drugs(record, &sections.medications);

    for diagnosis in &mut record.diagnoses {
        apply_canonical_diagnosis(diagnosis);
    }

    blank_unverifiable_fields(record, &sections.raw);

    if let Some(p) = passes {
        record.overall_confidence = overall_confidence(p, record.medications.len());
    }

    debug!(
        vitals = record.vitals.len(),
        medications = record.medications.len(),
        diagnoses = record.diagnoses.len(),
        overall = record.overall_confidence,
        "record merged"
    );
}

/// Vitals come exclusively from the deterministic parser, run over the
/// vitals, discharge, and raw windows joined together. The parser's
/// rightmost-marker rule then lands on the discharge-time reading.
fn deterministic_vitals(sections: &ClinicalSections) -> Vec<super::types::ExtractedVital> {
    let combined = [
        sections.vitals.as_str(),
        sections.discharge.as_str(),
        sections.raw.as_str(),
    ]
    .join("\n");
    parse_discharge_vitals(&combined)
}

fn backfill_stay_dates(record: &mut ExtractedRecord, sections: &ClinicalSections) {
    if !record.patient.admission_date.is_empty() && !record.patient.discharge_date.is_empty() {
        return;
    }

    let mut scan = sections.header.clone();
    scan.push('\n');
    scan.push_str(head(&sections.raw, DATE_SCAN_PREFIX));
    let dates = parse_admission_discharge_dates(&scan);

    if record.patient.admission_date.is_empty() {
        record.patient.admission_date = dates.admission;
    }
    if record.patient.discharge_date.is_empty() {
        record.patient.discharge_date = dates.discharge;
    }
}

/// Append any must-capture drug the medication section mentions but the
/// model omitted. Route comes from the drug table, dosage is left for
/// the clinician to confirm.
fn rescue_must_capture_drugs(record: &mut ExtractedRecord, medication_section: &str) {
    if medication_section.is_empty() {
        return;
    }
    let section_upper = medication_section.to_uppercase();

    for drug in MUST_CAPTURE_DRUGS {
        let drug_upper = drug.to_uppercase();
        if !section_upper.contains(&drug_upper) {
            continue;
        }
        let already_present = record
            .medications
            .iter()
            .any(|m| m.name.to_uppercase().contains(&drug_upper));
        if already_present {
            continue;
        }

        debug!(drug = %drug, "must-capture drug missing from model output, rescued");
        record.medications.push(ExtractedMedication {
            name: (*drug).to_string(),
            dosage: String::new(),
            route: canonical_route(drug, ""),
            confidence: RESCUED_MED_CONFIDENCE,
        });
    }
}

/// Fill codes from the canonical table; the table's display name wins
/// only when it matched, so unknown diagnoses keep their model text.
fn apply_canonical_diagnosis(diagnosis: &mut ExtractedDiagnosis) {
    let canonical = normalize_diagnosis(&diagnosis.name);
    if canonical.icd10.is_empty() {
        return;
    }
    diagnosis.name = canonical.name;
    if diagnosis.icd10_code.is_empty() {
        diagnosis.icd10_code = canonical.icd10;
    }
    if diagnosis.snomed_code.is_empty() {
        diagnosis.snomed_code = canonical.snomed;
    }
}

/// Identifier-like patient fields are blanked when the source text
/// cannot confirm them.
fn blank_unverifiable_fields(record: &mut ExtractedRecord, raw: &str) {
    for field in [
        &mut record.patient.identifier,
        &mut record.patient.blood_group,
        &mut record.patient.ward,
    ] {
        if !field.is_empty() && !cross_validate(field, raw) {
            debug!("unverifiable identifier field blanked");
            field.clear();
        }
    }
}

/// Overall confidence: mean of the pass-1 confidence, a medication
/// count tier, and the pass-3 confidence.
fn overall_confidence(passes: PassConfidences, medication_count: usize) -> u8 {
    let med_tier: u8 = if medication_count > 8 {
        90
    } else if medication_count > 4 {
        75
    } else {
        60
    };
    let sum = u32::from(passes.pass1) + u32::from(med_tier) + u32::from(passes.pass3);
    ((sum as f64) / 3.0).round() as u8
}

fn head(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::correction::routes::Route;
    use crate::pipeline::sectioning::detect_sections;

    fn merged(text: &str, record: &mut ExtractedRecord, passes: Option<PassConfidences>) {
        let sections = detect_sections(text);
        merge_record(record, &sections, passes);
    }

    #[test]
    fn vitals_replace_whatever_the_model_said() {
        let text = "DIAGNOSIS: T2DM\n\
                    VITALS AT DISCHARGE: PULSE: 82/MIN BP: 130/80 MMHG SPO2: 98%\n\
                    ADVICE ON DISCHARGE: rest";
        let mut record = ExtractedRecord {
            vitals: vec![super::super::types::ExtractedVital {
                name: "Pulse".into(),
                value: "999/min".into(),
                confidence: 99,
            }],
            ..Default::default()
        };
        merged(text, &mut record, None);
        assert!(record.vitals.iter().any(|v| v.value == "82/min"));
        assert!(!record.vitals.iter().any(|v| v.value == "999/min"));
    }

    #[test]
    fn stay_dates_backfilled_from_header() {
        let text = "CITY HOSPITAL\nDOA: 12/03/2024   DOD: 18-03-2024\n\
                    DIAGNOSIS: dengue fever\nTREATMENT GIVEN: fluids";
        let mut record = ExtractedRecord::default();
        merged(text, &mut record, None);
        assert_eq!(record.patient.admission_date, "12/03/2024");
        assert_eq!(record.patient.discharge_date, "18/03/2024");
    }

    #[test]
    fn model_supplied_dates_not_overwritten() {
        let text = "DOA: 12/03/2024\nDIAGNOSIS: dengue\nTREATMENT GIVEN: fluids";
        let mut record = ExtractedRecord::default();
        record.patient.admission_date = "01/03/2024".into();
        merged(text, &mut record, None);
        assert_eq!(record.patient.admission_date, "01/03/2024");
        // Discharge was empty, so it still gets backfilled (here: nothing found).
        assert_eq!(record.patient.discharge_date, "");
    }

    #[test]
    fn missing_insulin_rescued_from_medication_section() {
        let text = "DIAGNOSIS: T2DM\n\
                    DISCHARGE MEDICATIONS:\n\
                    1. TAB METFORMIN 500MG 1-0-1\n\
                    2. INJ INSULATARD 10U-0-8U S/C\n\
                    ADVICE ON DISCHARGE: diabetic diet";
        let mut record = ExtractedRecord {
            medications: vec![ExtractedMedication {
                name: "Metformin".into(),
                dosage: "500MG 1-0-1".into(),
                route: Route::Po,
                confidence: 85,
            }],
            ..Default::default()
        };
        merged(text, &mut record, None);

        let insulin = record
            .medications
            .iter()
            .find(|m| m.name == "Insulatard")
            .unwrap();
        assert_eq!(insulin.confidence, 75);
        assert_eq!(insulin.route, Route::Sc);
        assert_eq!(record.medications.len(), 2);
    }

    #[test]
    fn rescue_does_not_duplicate_present_drugs() {
        let text = "DISCHARGE MEDICATIONS:\nINJ INSULATARD 10U S/C";
        let mut record = ExtractedRecord {
            medications: vec![ExtractedMedication {
                name: "Inj. Insulatard".into(),
                dosage: "10U".into(),
                route: Route::Sc,
                confidence: 85,
            }],
            ..Default::default()
        };
        merged(text, &mut record, None);
        assert_eq!(record.medications.len(), 1);
    }

    #[test]
    fn diagnoses_coded_from_table() {
        let mut record = ExtractedRecord {
            diagnoses: vec![
                ExtractedDiagnosis {
                    name: "T2DM".into(),
                    ..Default::default()
                },
                ExtractedDiagnosis {
                    name: "Fibromuscular dysplasia".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        merged("DIAGNOSIS: T2DM", &mut record, None);
        assert_eq!(record.diagnoses[0].name, "Type 2 Diabetes Mellitus");
        assert_eq!(record.diagnoses[0].icd10_code, "E11.9");
        // Unknown diagnosis passes through untouched.
        assert_eq!(record.diagnoses[1].name, "Fibromuscular dysplasia");
        assert!(record.diagnoses[1].icd10_code.is_empty());
    }

    #[test]
    fn fabricated_identifier_blanked_real_one_kept() {
        let text = "CITY HOSPITAL\nUHID: 2024/04589\nDIAGNOSIS: dengue\nTREATMENT GIVEN: fluids";
        let mut record = ExtractedRecord::default();
        record.patient.identifier = "2024/04589".into();
        record.patient.ward = "General Ward 12, Block C".into();
        merged(text, &mut record, None);
        assert_eq!(record.patient.identifier, "2024/04589");
        assert_eq!(record.patient.ward, "");
    }

    #[test]
    fn overall_confidence_tiers_on_medication_count() {
        let p = PassConfidences { pass1: 90, pass3: 90 };
        // 2 meds → tier 60 → (90+60+90)/3 = 80
        assert_eq!(overall_confidence(p, 2), 80);
        // 5 meds → tier 75 → 85
        assert_eq!(overall_confidence(p, 5), 85);
        // 9 meds → tier 90 → 90
        assert_eq!(overall_confidence(p, 9), 90);
    }

    #[test]
    fn single_pass_confidence_left_alone() {
        let mut record = ExtractedRecord {
            overall_confidence: 66,
            ..Default::default()
        };
        merged("DIAGNOSIS: dengue", &mut record, None);
        assert_eq!(record.overall_confidence, 66);
    }
}
