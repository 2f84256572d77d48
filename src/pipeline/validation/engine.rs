//! Rule-based validation and scoring. A pure function of the record:
//! same record in, same report out, no I/O and no state.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::types::{
    ComplianceItem, NodeStatus, ResourceNode, Severity, ValidationIssue, ValidationReport,
};
use crate::pipeline::extraction::types::{ExtractedMedication, ExtractedRecord};

const ERROR_WEIGHT: i32 = 20;
const WARNING_WEIGHT: i32 = 5;
const INFO_WEIGHT: i32 = 1;

/// Administration schedule like `1-0-1` or `0.5-0-0.5`.
static SCHEDULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d+(?:\.\d+)?\s*-\s*\d+(?:\.\d+)?\s*-\s*\d+(?:\.\d+)?\b")
        .expect("schedule pattern")
});

/// Volume split like `10mL-10mL-10mL`.
static VOLUME_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*mL\s*-\s*\d+(?:\.\d+)?\s*mL\s*-\s*\d+(?:\.\d+)?\s*mL\b")
        .expect("volume split pattern")
});

/// Frequency abbreviations. Only counted when a dose quantity precedes
/// them — a bare `OD` with no dose is not a coded timing.
static FREQUENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:OD|BD|TDS|QDS|Q\d+H|SOS|STAT)\b").expect("frequency pattern")
});

/// Build the compliance report for one record. An empty record yields
/// the all-zero empty report rather than a pile of absence errors.
pub fn validate_record(record: &ExtractedRecord) -> ValidationReport {
    if is_effectively_empty(record) {
        return ValidationReport::empty();
    }

    let mut children: Vec<ResourceNode> = Vec::new();
    let mut issues: Vec<ValidationIssue> = Vec::new();
    let mut items: Vec<ComplianceItem> = Vec::new();

    validate_patient(record, &mut children, &mut issues, &mut items);
    synthesize_encounter(record, &mut children);
    validate_diagnoses(record, &mut children, &mut issues, &mut items);
    validate_medications(record, &mut children, &mut issues, &mut items);
    validate_labs(record, &mut children, &mut issues, &mut items);

    for vital in &record.vitals {
        // Range-verified at parse time, so always pass.
        children.push(ResourceNode::leaf(
            "Observation",
            vital.name.clone(),
            NodeStatus::Pass,
        ));
    }
    for procedure in &record.procedures {
        children.push(ResourceNode::leaf(
            "Procedure",
            procedure.name.clone(),
            NodeStatus::Pass,
        ));
    }

    let mut breakdown: BTreeMap<String, usize> = BTreeMap::new();
    for child in &children {
        *breakdown.entry(child.resource_type.clone()).or_default() += 1;
    }
    let total_resources = children.len();

    let has_error = issues.iter().any(|i| i.severity == Severity::Error);
    let root = ResourceNode {
        resource_type: "Bundle".to_string(),
        name: "Document Bundle".to_string(),
        status: if has_error {
            NodeStatus::Fail
        } else {
            NodeStatus::Pass
        },
        children,
    };

    let health_score = health_score(&issues);
    debug!(
        resources = total_resources,
        issues = issues.len(),
        score = health_score,
        "record validated"
    );

    ValidationReport {
        resource_tree: root,
        validation_issues: issues,
        compliance_items: items,
        resource_breakdown: breakdown,
        total_resources,
        health_score,
    }
}

/// 100, minus 20 per error, 5 per warning, 1 per info, floored at 0.
/// Fixed weights on purpose: the score must be auditable by hand.
fn health_score(issues: &[ValidationIssue]) -> u8 {
    let mut score: i32 = 100;
    for issue in issues {
        score -= match issue.severity {
            Severity::Error => ERROR_WEIGHT,
            Severity::Warning => WARNING_WEIGHT,
            Severity::Info => INFO_WEIGHT,
        };
    }
    score.max(0) as u8
}

fn is_effectively_empty(record: &ExtractedRecord) -> bool {
    record.entity_count() == 0
        && record.patient.name.is_empty()
        && record.patient.identifier.is_empty()
        && record.patient.hospital.is_empty()
        && record.patient.admission_date.is_empty()
}

fn validate_patient(
    record: &ExtractedRecord,
    children: &mut Vec<ResourceNode>,
    issues: &mut Vec<ValidationIssue>,
    items: &mut Vec<ComplianceItem>,
) {
    let named = !record.patient.name.is_empty();
    let display = if named {
        record.patient.name.clone()
    } else {
        "Unnamed patient".to_string()
    };
    children.push(ResourceNode::leaf(
        "Patient",
        display,
        if named { NodeStatus::Pass } else { NodeStatus::Fail },
    ));
    items.push(ComplianceItem {
        label: "Patient identified".to_string(),
        status: if named { NodeStatus::Pass } else { NodeStatus::Fail },
    });
    if !named {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            resource_path: "Patient".to_string(),
            profile_path: "Patient.name".to_string(),
            message: "No patient name could be extracted".to_string(),
            fix_hint: "Enter the patient name manually".to_string(),
            diagnostics: "The document did not yield a usable patient name; letterhead \
                          fragments and institutional text are rejected by the sanitizer."
                .to_string(),
        });
    }
}

/// Encounter and Organization are synthesized once hospital or
/// admission context exists. They have no independent failure path.
fn synthesize_encounter(record: &ExtractedRecord, children: &mut Vec<ResourceNode>) {
    let patient = &record.patient;
    if patient.hospital.is_empty() && patient.admission_date.is_empty() {
        return;
    }

    let encounter_name = if patient.admission_date.is_empty() {
        "Inpatient encounter".to_string()
    } else {
        format!("Admission {}", patient.admission_date)
    };
    children.push(ResourceNode::leaf("Encounter", encounter_name, NodeStatus::Pass));

    if !patient.hospital.is_empty() {
        children.push(ResourceNode::leaf(
            "Organization",
            patient.hospital.clone(),
            NodeStatus::Pass,
        ));
    }
}

fn validate_diagnoses(
    record: &ExtractedRecord,
    children: &mut Vec<ResourceNode>,
    issues: &mut Vec<ValidationIssue>,
    items: &mut Vec<ComplianceItem>,
) {
    if record.diagnoses.is_empty() {
        return;
    }

    let mut all_coded = true;
    for diagnosis in &record.diagnoses {
        let coded = !diagnosis.icd10_code.is_empty();
        all_coded &= coded;
        children.push(ResourceNode::leaf(
            "Condition",
            diagnosis.name.clone(),
            if coded { NodeStatus::Pass } else { NodeStatus::Warning },
        ));
        if !coded {
            issues.push(ValidationIssue {
                severity: Severity::Warning,
                resource_path: format!("Condition[{}]", diagnosis.name),
                profile_path: "Condition.code.icd10".to_string(),
                message: format!("Diagnosis '{}' has no ICD-10 code", diagnosis.name),
                fix_hint: "Select an ICD-10 code for this diagnosis".to_string(),
                diagnostics: format!(
                    "'{}' did not match the canonical diagnosis table and the document \
                     carried no explicit code.",
                    diagnosis.name
                ),
            });
        }
    }
    items.push(ComplianceItem {
        label: "Diagnoses coded (ICD-10)".to_string(),
        status: if all_coded { NodeStatus::Pass } else { NodeStatus::Warning },
    });
}

fn validate_medications(
    record: &ExtractedRecord,
    children: &mut Vec<ResourceNode>,
    issues: &mut Vec<ValidationIssue>,
    items: &mut Vec<ComplianceItem>,
) {
    if record.medications.is_empty() {
        return;
    }

    let mut all_timed = true;
    for medication in &record.medications {
        let ok = timing_exempt(medication) || timing_coded(&medication.dosage);
        all_timed &= ok;
        children.push(ResourceNode::leaf(
            "MedicationRequest",
            medication.name.clone(),
            if ok { NodeStatus::Pass } else { NodeStatus::Warning },
        ));
        if !ok {
            issues.push(ValidationIssue {
                severity: Severity::Warning,
                resource_path: format!("MedicationRequest[{}]", medication.name),
                profile_path: "MedicationRequest.dosageInstruction.timing".to_string(),
                message: format!(
                    "Dosage '{}' for '{}' has no recognizable timing",
                    medication.dosage, medication.name
                ),
                fix_hint: "Add a schedule like 1-0-1 or a dose with frequency like 500MG BD"
                    .to_string(),
                diagnostics: format!(
                    "Dosage text '{}' matched neither a d-d-d schedule, a volume split, \
                     nor a dose-qualified frequency abbreviation.",
                    medication.dosage
                ),
            });
        }
    }
    items.push(ComplianceItem {
        label: "Medication timing recognized".to_string(),
        status: if all_timed { NodeStatus::Pass } else { NodeStatus::Warning },
    });
}

/// Empty dosages and IV fluids carry no per-dose schedule to code.
fn timing_exempt(medication: &ExtractedMedication) -> bool {
    medication.dosage.trim().is_empty() || medication.name.to_lowercase().contains("iv fluids")
}

/// A dosage counts as timed when it contains a d-d-d schedule, an
/// NmL-NmL-NmL volume split, or a frequency abbreviation preceded by a
/// dose quantity. A bare abbreviation is rejected: "OD" alone tells a
/// pharmacist nothing about how much to dispense.
fn timing_coded(dosage: &str) -> bool {
    if SCHEDULE_RE.is_match(dosage) || VOLUME_SPLIT_RE.is_match(dosage) {
        return true;
    }
    match FREQUENCY_RE.find(dosage) {
        Some(m) => dosage[..m.start()].chars().any(|c| c.is_ascii_digit()),
        None => false,
    }
}

fn validate_labs(
    record: &ExtractedRecord,
    children: &mut Vec<ResourceNode>,
    issues: &mut Vec<ValidationIssue>,
    items: &mut Vec<ComplianceItem>,
) {
    if record.lab_values.is_empty() {
        return;
    }

    let mut all_coded = true;
    for lab in &record.lab_values {
        let coded = !lab.loinc_code.is_empty();
        all_coded &= coded;
        children.push(ResourceNode::leaf(
            "Observation",
            lab.test_name.clone(),
            if coded { NodeStatus::Pass } else { NodeStatus::Warning },
        ));
        if !coded {
            issues.push(ValidationIssue {
                severity: Severity::Info,
                resource_path: format!("Observation[{}]", lab.test_name),
                profile_path: "Observation.code.loinc".to_string(),
                message: format!("Lab result '{}' has no LOINC code", lab.test_name),
                fix_hint: "Assign a LOINC code to this result".to_string(),
                diagnostics: format!(
                    "'{}' was extracted without a LOINC code; the value itself is unaffected.",
                    lab.test_name
                ),
            });
        }
    }
    items.push(ComplianceItem {
        label: "Lab results coded (LOINC)".to_string(),
        status: if all_coded { NodeStatus::Pass } else { NodeStatus::Warning },
    });
}
