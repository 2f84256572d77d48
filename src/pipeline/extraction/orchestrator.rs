//! Multi-pass extraction state machine.
//!
//! Sectioning → pass 1 (patient + diagnoses) → pass 2 (medications) →
//! pass 3 (procedures + discharge) → deterministic merge. Documents
//! without enough section structure take a single-pass fallback, and
//! lab/imaging reports take their own single-pass path. Passes run
//! strictly in sequence to keep load on the local inference service
//! bounded and to allow per-pass progress reporting.
//!
//! A transport failure on any pass aborts the whole run; a response the
//! lenient parser cannot salvage degrades that pass to empty fields.

use std::sync::mpsc::Sender;

use serde_json::Value;
use tracing::{info, info_span, warn};

use super::merge::{merge_record, PassConfidences};
use super::ollama::resolve_model;
use super::parser::{parse_lenient, ParseOutcome};
use super::prompt;
use super::sanitize;
use super::types::{ExtractedRecord, GenerationOptions, LlmClient};
use super::ExtractionError;
use crate::config;
use crate::pipeline::sectioning::{
    detect_sections, has_sufficient_structure, looks_like_diagnostic_report, ClinicalSections,
};

const PASS1_FIELDS: &[&str] = &["patient", "diagnoses", "confidence"];
const PASS2_FIELDS: &[&str] = &["medications"];
const PASS3_FIELDS: &[&str] = &[
    "procedures",
    "lab_values",
    "discharge_instructions",
    "follow_up",
    "confidence",
];
const SINGLE_PASS_FIELDS: &[&str] = &[
    "patient",
    "diagnoses",
    "medications",
    "lab_values",
    "procedures",
    "discharge_instructions",
    "follow_up",
    "confidence",
];

/// Pass-level progress. Sends are best-effort: a dropped or slow
/// receiver never blocks or fails the extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    PassStarted {
        pass: u8,
        of: u8,
        label: &'static str,
    },
    PassCompleted {
        pass: u8,
        of: u8,
    },
    Merging,
    Done,
}

/// Drives the extraction passes against an inference client and merges
/// the results into one record.
pub struct ExtractionOrchestrator<C: LlmClient> {
    client: C,
    options: GenerationOptions,
    model: Option<String>,
}

impl<C: LlmClient> ExtractionOrchestrator<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            options: GenerationOptions::default(),
            model: None,
        }
    }

    /// Pin a model instead of discovering one from the service.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn extract(&self, text: &str) -> Result<ExtractedRecord, ExtractionError> {
        self.extract_with_progress(text, None)
    }

    pub fn extract_with_progress(
        &self,
        text: &str,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Result<ExtractedRecord, ExtractionError> {
        if text.trim().chars().count() < config::MIN_INPUT_LENGTH {
            return Err(ExtractionError::InputTooShort);
        }

        let model = match &self.model {
            Some(m) => m.clone(),
            None => resolve_model(&self.client),
        };
        // Correlates all log lines for one document; text itself is
        // never logged.
        let doc_id = uuid::Uuid::new_v4();
        let span = info_span!("extract", doc_id = %doc_id, model = %model, chars = text.len());
        let _guard = span.enter();

        let sections = detect_sections(text);

        let record = if looks_like_diagnostic_report(&sections.raw) {
            info!("document classified as diagnostic report, single-pass path");
            self.single_pass(&model, &sections, "diagnostic report", progress)?
        } else if !has_sufficient_structure(&sections) {
            info!("insufficient section structure, single-pass fallback");
            self.single_pass(&model, &sections, "full document", progress)?
        } else {
            self.multi_pass(&model, &sections, progress)?
        };

        emit(progress, ProgressEvent::Done);
        info!(
            entities = record.entity_count(),
            confidence = record.overall_confidence,
            "extraction complete"
        );
        Ok(record)
    }

    fn multi_pass(
        &self,
        model: &str,
        sections: &ClinicalSections,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Result<ExtractedRecord, ExtractionError> {
        let p1 = self.run_pass(
            model,
            prompt::build_pass1_prompt(sections),
            PASS1_FIELDS,
            1,
            3,
            "patient and diagnoses",
            progress,
        )?;
        let p2 = self.run_pass(
            model,
            prompt::build_pass2_prompt(sections),
            PASS2_FIELDS,
            2,
            3,
            "medications",
            progress,
        )?;
        let p3 = self.run_pass(
            model,
            prompt::build_pass3_prompt(sections),
            PASS3_FIELDS,
            3,
            3,
            "procedures and discharge",
            progress,
        )?;

        let mut record = ExtractedRecord {
            patient: sanitize::sanitize_patient(p1.get("patient")),
            diagnoses: sanitize::sanitize_diagnoses(p1.get("diagnoses")),
            medications: sanitize::sanitize_medications(p2.get("medications")),
            vitals: Vec::new(),
            lab_values: sanitize::sanitize_lab_values(p3.get("lab_values")),
            procedures: sanitize::sanitize_procedures(p3.get("procedures")),
            discharge_instructions: sanitize::sanitize_labeled_values(
                p3.get("discharge_instructions"),
            ),
            follow_up: sanitize::sanitize_labeled_values(p3.get("follow_up")),
            overall_confidence: 0,
        };

        emit(progress, ProgressEvent::Merging);
        let passes = PassConfidences {
            pass1: sanitize::clamp_confidence(p1.get("confidence")),
            pass3: sanitize::clamp_confidence(p3.get("confidence")),
        };
        merge_record(&mut record, sections, Some(passes));
        Ok(record)
    }

    /// Fallback and diagnostic-report path: one prompt over the raw
    /// text, full record schema, model's own overall confidence.
    fn single_pass(
        &self,
        model: &str,
        sections: &ClinicalSections,
        label: &'static str,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Result<ExtractedRecord, ExtractionError> {
        let value = self.run_pass(
            model,
            prompt::build_single_pass_prompt(&sections.raw),
            SINGLE_PASS_FIELDS,
            1,
            1,
            label,
            progress,
        )?;

        let mut record = sanitize::sanitize_record(&value);
        emit(progress, ProgressEvent::Merging);
        merge_record(&mut record, sections, None);
        Ok(record)
    }

    /// One inference call plus lenient parsing. Transport errors
    /// propagate; an unsalvageable response degrades to `Value::Null`.
    #[allow(clippy::too_many_arguments)]
    fn run_pass(
        &self,
        model: &str,
        prompt: String,
        fields: &[&str],
        pass: u8,
        of: u8,
        label: &'static str,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Result<Value, ExtractionError> {
        emit(progress, ProgressEvent::PassStarted { pass, of, label });

        let response = self.client.generate(model, &prompt, &self.options)?;

        let value = match parse_lenient(&response, fields) {
            ParseOutcome::Parsed(v) => v,
            ParseOutcome::Repaired {
                value,
                defaulted_fields,
            } => {
                warn!(
                    pass,
                    defaulted = defaulted_fields.len(),
                    "truncated response repaired"
                );
                value
            }
            ParseOutcome::Failed(reason) => {
                warn!(pass, %reason, "response unparseable after repair, pass degraded to empty");
                Value::Null
            }
        };

        emit(progress, ProgressEvent::PassCompleted { pass, of });
        Ok(value)
    }
}

fn emit(progress: Option<&Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = progress {
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::correction::routes::Route;
    use crate::pipeline::extraction::ollama::{FailingLlmClient, MockLlmClient};

    const SUMMARY: &str = "CITY GENERAL HOSPITAL\n\
        UHID: 2024/04589\n\
        DOA: 12/03/2024  DOD: 18/03/2024\n\
        DIAGNOSIS: T2DM\n\
        TREATMENT GIVEN:\n\
        1. TAB METFORMIN 500MG 1-0-1\n\
        2. INJ INSULATARD 10U-0-8U S/C\n\
        VITALS AT DISCHARGE: PULSE: 82/MIN BP: 130/80 MMHG SPO2: 98% ON ROOM AIR\n\
        ADVICE ON DISCHARGE: DIABETIC DIET\n\
        REVIEW AFTER 2 WEEKS IN OPD";

    const PASS1_JSON: &str = r#"{
        "patient": {"name": "Ramesh Kumar", "identifier": "2024/04589"},
        "diagnoses": [{"name": "T2DM", "confidence": 90}],
        "confidence": 90
    }"#;
    const PASS2_JSON: &str = r#"{
        "medications": [{"name": "Metformin", "dosage": "500MG 1-0-1", "route": "PO", "confidence": 85}]
    }"#;
    const PASS3_JSON: &str = r#"{
        "procedures": [],
        "lab_values": [],
        "discharge_instructions": [{"label": "Diet", "value": "Diabetic diet", "confidence": 80}],
        "follow_up": [{"label": "Review", "value": "After 2 weeks in OPD", "confidence": 80}],
        "confidence": 80
    }"#;

    #[test]
    fn short_input_rejected_before_any_pass() {
        let mock = MockLlmClient::new("{}");
        let orchestrator = ExtractionOrchestrator::new(&mock).with_model("m");
        let result = orchestrator.extract("too short");
        assert!(matches!(result, Err(ExtractionError::InputTooShort)));
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn three_pass_flow_merges_into_full_record() {
        let mock = MockLlmClient::with_responses(&[PASS1_JSON, PASS2_JSON, PASS3_JSON]);
        let orchestrator = ExtractionOrchestrator::new(&mock).with_model("m");
        let record = orchestrator.extract(SUMMARY).unwrap();

        assert_eq!(mock.calls(), 3);
        assert_eq!(record.patient.name, "Ramesh Kumar");
        // Model left dates blank; the merge backfilled them from the header.
        assert_eq!(record.patient.admission_date, "12/03/2024");
        assert_eq!(record.patient.discharge_date, "18/03/2024");
        // Identifier occurs verbatim in the source, so it survives.
        assert_eq!(record.patient.identifier, "2024/04589");
        // Diagnosis coded by the lookup table.
        assert_eq!(record.diagnoses[0].name, "Type 2 Diabetes Mellitus");
        assert_eq!(record.diagnoses[0].icd10_code, "E11.9");
        // Insulatard was missing from the model output and got rescued.
        assert_eq!(record.medications.len(), 2);
        let insulin = record
            .medications
            .iter()
            .find(|m| m.name == "Insulatard")
            .unwrap();
        assert_eq!(insulin.route, Route::Sc);
        assert_eq!(insulin.confidence, 75);
        // Vitals came from the deterministic parser, not the model.
        assert!(record.vitals.iter().any(|v| v.value == "82/min"));
        // (90 + 60 + 80) / 3, medication tier 60 for two entries.
        assert_eq!(record.overall_confidence, 77);
    }

    #[test]
    fn transport_failure_aborts_whole_run() {
        let orchestrator = ExtractionOrchestrator::new(FailingLlmClient).with_model("m");
        let result = orchestrator.extract(SUMMARY);
        assert!(matches!(result, Err(ExtractionError::Connection(_))));
    }

    #[test]
    fn unparseable_pass_degrades_to_empty_not_error() {
        let mock =
            MockLlmClient::with_responses(&["I cannot help with that.", PASS2_JSON, PASS3_JSON]);
        let orchestrator = ExtractionOrchestrator::new(&mock).with_model("m");
        let record = orchestrator.extract(SUMMARY).unwrap();

        assert!(record.diagnoses.is_empty());
        assert!(record.patient.name.is_empty());
        // Later passes still ran and merged.
        assert!(record.medications.iter().any(|m| m.name == "Metformin"));
    }

    #[test]
    fn unstructured_document_takes_single_pass() {
        let prose = "The patient was seen in the outpatient department and reported feeling \
                     much better after the course of antibiotics prescribed during the previous \
                     visit two weeks ago. No further complaints were recorded at this time.";
        let mock = MockLlmClient::new(
            r#"{"patient": {"name": "Ramesh Kumar"}, "diagnoses": [], "medications": [], "confidence": 55}"#,
        );
        let orchestrator = ExtractionOrchestrator::new(&mock).with_model("m");
        let record = orchestrator.extract(prose).unwrap();

        assert_eq!(mock.calls(), 1);
        assert_eq!(record.patient.name, "Ramesh Kumar");
        // Single-pass path keeps the model's own overall confidence.
        assert_eq!(record.overall_confidence, 55);
    }

    #[test]
    fn diagnostic_report_takes_single_pass() {
        let report = "APEX DIAGNOSTICS\nLABORATORY REPORT\n\
                      HBA1C: 8.2 % (REF 4.0-5.6)\n\
                      FASTING GLUCOSE: 162 MG/DL (REF 70-100)\n\
                      SERUM CREATININE: 1.1 MG/DL (REF 0.7-1.3)";
        let mock = MockLlmClient::new(
            r#"{"lab_values": [{"test_name": "HbA1c", "value": "8.2", "unit": "%", "status": "High", "confidence": 85}], "confidence": 85}"#,
        );
        let orchestrator = ExtractionOrchestrator::new(&mock).with_model("m");
        let record = orchestrator.extract(report).unwrap();

        assert_eq!(mock.calls(), 1);
        assert_eq!(record.lab_values.len(), 1);
        assert_eq!(record.lab_values[0].test_name, "HbA1c");
    }

    #[test]
    fn progress_events_arrive_in_pass_order() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mock = MockLlmClient::with_responses(&[PASS1_JSON, PASS2_JSON, PASS3_JSON]);
        let orchestrator = ExtractionOrchestrator::new(&mock).with_model("m");
        orchestrator.extract_with_progress(SUMMARY, Some(&tx)).unwrap();

        let events: Vec<ProgressEvent> = rx.try_iter().collect();
        let starts: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::PassStarted { pass, .. } => Some(*pass),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec![1, 2, 3]);
        assert_eq!(events.last(), Some(&ProgressEvent::Done));
    }

    #[test]
    fn dropped_progress_receiver_is_harmless() {
        let (tx, rx) = std::sync::mpsc::channel();
        drop(rx);
        let mock = MockLlmClient::with_responses(&[PASS1_JSON, PASS2_JSON, PASS3_JSON]);
        let orchestrator = ExtractionOrchestrator::new(&mock).with_model("m");
        assert!(orchestrator.extract_with_progress(SUMMARY, Some(&tx)).is_ok());
    }
}
