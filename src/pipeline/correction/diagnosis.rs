//! Diagnosis canonicalization against a curated code table.
//!
//! Colloquial or partial diagnosis names map to a canonical name plus
//! ICD-10 and SNOMED CT codes. First table match wins; unknown names
//! pass through unchanged with empty codes.

/// Canonical name + coding triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalDiagnosis {
    pub name: String,
    pub icd10: String,
    pub snomed: String,
}

/// Fragment (lowercase) → canonical (name, ICD-10, SNOMED CT).
/// Ordered: more specific fragments before their prefixes.
const DIAGNOSIS_TABLE: &[(&str, &str, &str, &str)] = &[
    ("type 2 diabetes", "Type 2 Diabetes Mellitus", "E11.9", "44054006"),
    ("diabetes mellitus", "Type 2 Diabetes Mellitus", "E11.9", "44054006"),
    ("t2dm", "Type 2 Diabetes Mellitus", "E11.9", "44054006"),
    ("dm type 2", "Type 2 Diabetes Mellitus", "E11.9", "44054006"),
    ("diabetic foot", "Diabetic Foot Ulcer", "E11.621", "280137006"),
    ("essential hypertension", "Essential Hypertension", "I10", "59621000"),
    ("hypertension", "Essential Hypertension", "I10", "59621000"),
    ("htn", "Essential Hypertension", "I10", "59621000"),
    ("copd", "Chronic Obstructive Pulmonary Disease", "J44.9", "13645005"),
    ("chronic obstructive", "Chronic Obstructive Pulmonary Disease", "J44.9", "13645005"),
    ("bronchial asthma", "Bronchial Asthma", "J45.9", "195967001"),
    ("asthma", "Bronchial Asthma", "J45.9", "195967001"),
    ("community acquired pneumonia", "Community Acquired Pneumonia", "J18.9", "385093006"),
    ("pneumonia", "Pneumonia", "J18.9", "233604007"),
    ("urinary tract infection", "Urinary Tract Infection", "N39.0", "68566005"),
    ("uti", "Urinary Tract Infection", "N39.0", "68566005"),
    ("anaemia", "Anemia", "D64.9", "271737000"),
    ("anemia", "Anemia", "D64.9", "271737000"),
    ("chronic kidney disease", "Chronic Kidney Disease", "N18.9", "709044004"),
    ("ckd", "Chronic Kidney Disease", "N18.9", "709044004"),
    ("acute kidney injury", "Acute Kidney Injury", "N17.9", "14669001"),
    ("aki", "Acute Kidney Injury", "N17.9", "14669001"),
    ("coronary artery disease", "Coronary Artery Disease", "I25.10", "53741008"),
    ("cad", "Coronary Artery Disease", "I25.10", "53741008"),
    ("ihd", "Ischemic Heart Disease", "I25.9", "414545008"),
    ("atrial fibrillation", "Atrial Fibrillation", "I48.91", "49436004"),
    ("hypothyroidism", "Hypothyroidism", "E03.9", "40930008"),
    ("dengue", "Dengue Fever", "A90", "38362002"),
    ("typhoid", "Typhoid Fever", "A01.00", "4834000"),
    ("cellulitis", "Cellulitis", "L03.90", "128045006"),
    ("gastroenteritis", "Acute Gastroenteritis", "K52.9", "25374005"),
];

/// Substring-match a raw diagnosis name against the table. No match
/// returns the input unchanged, codes empty.
pub fn normalize_diagnosis(raw_name: &str) -> CanonicalDiagnosis {
    let lower = raw_name.to_lowercase();
    for (fragment, canonical, icd10, snomed) in DIAGNOSIS_TABLE {
        if lower.contains(fragment) {
            return CanonicalDiagnosis {
                name: (*canonical).to_string(),
                icd10: (*icd10).to_string(),
                snomed: (*snomed).to_string(),
            };
        }
    }
    CanonicalDiagnosis {
        name: raw_name.to_string(),
        icd10: String::new(),
        snomed: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t2dm_abbreviation_normalizes() {
        let d = normalize_diagnosis("T2DM");
        assert_eq!(d.name, "Type 2 Diabetes Mellitus");
        assert_eq!(d.icd10, "E11.9");
        assert_eq!(d.snomed, "44054006");
    }

    #[test]
    fn partial_names_match_by_substring() {
        let d = normalize_diagnosis("known case of diabetes mellitus with neuropathy");
        assert_eq!(d.icd10, "E11.9");

        let d = normalize_diagnosis("Systemic HTN");
        assert_eq!(d.name, "Essential Hypertension");
        assert_eq!(d.snomed, "59621000");
    }

    #[test]
    fn specific_fragment_wins_over_general() {
        // "diabetic foot ulcer" must hit the foot-ulcer row, not plain DM.
        let d = normalize_diagnosis("Diabetic foot ulcer, left");
        assert_eq!(d.icd10, "E11.621");
    }

    #[test]
    fn unknown_name_passes_through() {
        let d = normalize_diagnosis("Fibromuscular dysplasia");
        assert_eq!(d.name, "Fibromuscular dysplasia");
        assert!(d.icd10.is_empty());
        assert!(d.snomed.is_empty());
    }

    #[test]
    fn case_insensitive_matching() {
        assert_eq!(normalize_diagnosis("copd EXACERBATION").icd10, "J44.9");
        assert_eq!(normalize_diagnosis("Uti").icd10, "N39.0");
    }
}
