//! Per-pass prompt construction.
//!
//! Each pass embeds only the relevant section windows, truncated to a
//! per-section character budget so the prompt stays inside the model's
//! context window. Instructions demand explicit abstention (null/empty)
//! over guessing — the deterministic layer fills in what it can verify.

use crate::config;
use crate::pipeline::sectioning::ClinicalSections;

const COMMON_RULES: &str = r#"RULES — ABSOLUTE, NO EXCEPTIONS:
1. Extract ONLY information explicitly stated in the document text.
2. NEVER infer, interpret, or fabricate values. If a field is absent or unclear, use "" or null.
3. Preserve exact values (doses, dates, identifiers) verbatim from the text.
4. Output ONLY a single JSON object, no prose before or after.
5. confidence fields are integers 0-100."#;

/// Pass 1: patient demographics + diagnoses.
pub fn build_pass1_prompt(sections: &ClinicalSections) -> String {
    let header = truncate(&sections.header, config::BUDGET_HEADER);
    let diagnosis = truncate(&sections.diagnosis, config::BUDGET_DIAGNOSIS);
    let comorbidities = truncate(&sections.comorbidities, config::BUDGET_DIAGNOSIS);
    let complaint = truncate(&sections.chief_complaint, config::BUDGET_HEADER);

    format!(
        r#"{COMMON_RULES}

<document>
{header}
{complaint}
{diagnosis}
{comorbidities}
</document>

Extract the patient details and all diagnoses from the document above into this JSON structure:

{{
  "patient": {{
    "name": "", "age": "", "sex": "", "identifier": "", "blood_group": "",
    "hospital": "", "ward": "", "admission_date": "", "discharge_date": "",
    "attending_physician": "", "chief_complaint": ""
  }},
  "diagnoses": [
    {{"name": "", "icd10_code": "", "snomed_code": "", "confidence": 0}}
  ],
  "confidence": 0
}}"#
    )
}

/// Pass 2: medications only.
pub fn build_pass2_prompt(sections: &ClinicalSections) -> String {
    let medications = truncate(&sections.medications, config::BUDGET_MEDICATIONS);
    let discharge = truncate(&sections.discharge, config::BUDGET_DISCHARGE);

    format!(
        r#"{COMMON_RULES}

<document>
{medications}
{discharge}
</document>

Extract every medication from the document above. Keep the dosage text exactly as written (strength and schedule, e.g. "500MG 1-0-1"). Route is one of PO, IV, IM, SC, INH, unspecified.

{{
  "medications": [
    {{"name": "", "dosage": "", "route": "PO", "confidence": 0}}
  ]
}}"#
    )
}

/// Pass 3: procedures, lab values, discharge advice, follow-up.
pub fn build_pass3_prompt(sections: &ClinicalSections) -> String {
    let procedures = truncate(&sections.procedures, config::BUDGET_PROCEDURES);
    let investigations = truncate(&sections.investigations, config::BUDGET_PROCEDURES);
    let discharge = truncate(&sections.discharge, config::BUDGET_DISCHARGE);
    let follow_up = truncate(&sections.follow_up, config::BUDGET_DISCHARGE);

    format!(
        r#"{COMMON_RULES}

<document>
{procedures}
{investigations}
{discharge}
{follow_up}
</document>

Extract procedures, laboratory values, discharge instructions and follow-up items from the document above:

{{
  "procedures": [
    {{"name": "", "snomed_code": "", "day_of_stay": "", "findings": "", "confidence": 0}}
  ],
  "lab_values": [
    {{"test_name": "", "value": "", "unit": "", "reference_range": "", "status": "Normal", "loinc_code": "", "confidence": 0}}
  ],
  "discharge_instructions": [
    {{"label": "", "value": "", "confidence": 0}}
  ],
  "follow_up": [
    {{"label": "", "value": "", "confidence": 0}}
  ],
  "confidence": 0
}}"#
    )
}

/// Single-pass fallback for documents without enough section structure,
/// and the diagnostic-report path for lab/imaging reports. One prompt,
/// full record schema, raw text window.
pub fn build_single_pass_prompt(raw: &str) -> String {
    let text = truncate(raw, config::BUDGET_RAW_FALLBACK);

    format!(
        r#"{COMMON_RULES}

<document>
{text}
</document>

Extract all clinical information from the document above into this JSON structure. Leave any absent field as "" or an empty list:

{{
  "patient": {{
    "name": "", "age": "", "sex": "", "identifier": "", "blood_group": "",
    "hospital": "", "ward": "", "admission_date": "", "discharge_date": "",
    "attending_physician": "", "chief_complaint": ""
  }},
  "diagnoses": [{{"name": "", "icd10_code": "", "snomed_code": "", "confidence": 0}}],
  "medications": [{{"name": "", "dosage": "", "route": "PO", "confidence": 0}}],
  "lab_values": [{{"test_name": "", "value": "", "unit": "", "reference_range": "", "status": "Normal", "loinc_code": "", "confidence": 0}}],
  "procedures": [{{"name": "", "snomed_code": "", "day_of_stay": "", "findings": "", "confidence": 0}}],
  "discharge_instructions": [{{"label": "", "value": "", "confidence": 0}}],
  "follow_up": [{{"label": "", "value": "", "confidence": 0}}],
  "confidence": 0
}}"#
    )
}

/// Truncate at a word boundary inside the budget.
fn truncate(text: &str, budget: usize) -> String {
    if text.len() <= budget {
        return text.to_string();
    }
    let cut = floor_char_boundary(text, budget);
    match text[..cut].rfind(char::is_whitespace) {
        Some(pos) => text[..pos].to_string(),
        None => text[..cut].to_string(),
    }
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
