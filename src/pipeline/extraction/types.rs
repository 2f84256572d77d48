use serde::{Deserialize, Serialize};

use super::ExtractionError;
use crate::pipeline::correction::routes::Route;

/// Canonical typed clinical record — the finalized output of the
/// extraction pipeline and the sole input to the validation engine.
/// Absence of a field is the empty string or an empty list, never an
/// error; an entirely empty record is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub patient: PatientDetails,
    pub diagnoses: Vec<ExtractedDiagnosis>,
    pub medications: Vec<ExtractedMedication>,
    /// Produced exclusively by the deterministic vitals parser.
    pub vitals: Vec<ExtractedVital>,
    pub lab_values: Vec<ExtractedLabValue>,
    pub procedures: Vec<ExtractedProcedure>,
    pub discharge_instructions: Vec<LabeledValue>,
    pub follow_up: Vec<LabeledValue>,
    /// Aggregate 0–100.
    pub overall_confidence: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientDetails {
    pub name: String,
    pub age: String,
    pub sex: String,
    pub identifier: String,
    pub blood_group: String,
    pub hospital: String,
    pub ward: String,
    pub admission_date: String,
    pub discharge_date: String,
    pub attending_physician: String,
    pub chief_complaint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedDiagnosis {
    pub name: String,
    pub icd10_code: String,
    pub snomed_code: String,
    pub confidence: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedMedication {
    pub name: String,
    pub dosage: String,
    pub route: Route,
    pub confidence: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedVital {
    pub name: String,
    pub value: String,
    pub confidence: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedLabValue {
    pub test_name: String,
    pub value: String,
    pub unit: String,
    pub reference_range: String,
    pub status: LabStatus,
    pub loinc_code: String,
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LabStatus {
    High,
    Low,
    #[default]
    Normal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedProcedure {
    pub name: String,
    pub snomed_code: String,
    pub day_of_stay: String,
    pub findings: String,
    pub confidence: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabeledValue {
    pub label: String,
    pub value: String,
    pub confidence: u8,
}

impl ExtractedRecord {
    pub fn entity_count(&self) -> usize {
        self.diagnoses.len()
            + self.medications.len()
            + self.vitals.len()
            + self.lab_values.len()
            + self.procedures.len()
            + self.discharge_instructions.len()
            + self.follow_up.len()
    }
}

/// Generation options forwarded with every inference request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub num_ctx: u32,
    pub num_predict: u32,
    pub repeat_penalty: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: crate::config::GEN_TEMPERATURE,
            num_ctx: crate::config::GEN_NUM_CTX,
            num_predict: crate::config::GEN_NUM_PREDICT,
            repeat_penalty: crate::config::GEN_REPEAT_PENALTY,
        }
    }
}

/// Inference-service abstraction (allows mocking in tests).
pub trait LlmClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ExtractionError>;

    fn list_models(&self) -> Result<Vec<String>, ExtractionError>;
}

impl<C: LlmClient + ?Sized> LlmClient for &C {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ExtractionError> {
        (**self).generate(model, prompt, options)
    }

    fn list_models(&self) -> Result<Vec<String>, ExtractionError> {
        (**self).list_models()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_is_valid_and_countable() {
        let record = ExtractedRecord::default();
        assert_eq!(record.entity_count(), 0);
        assert_eq!(record.overall_confidence, 0);
        assert!(record.patient.name.is_empty());
    }

    #[test]
    fn record_round_trips_through_serde() {
        let mut record = ExtractedRecord::default();
        record.medications.push(ExtractedMedication {
            name: "Metformin".into(),
            dosage: "500MG 1-0-1".into(),
            route: Route::Po,
            confidence: 85,
        });
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"PO\""));
        let back: ExtractedRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.medications[0].name, "Metformin");
    }
}
