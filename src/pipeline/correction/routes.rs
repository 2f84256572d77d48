//! Drug → administration-route canonicalization.
//!
//! The language model infers route from proximity to unrelated text
//! rather than from the drug's pharmacology, so a curated table is the
//! source of truth. The model's suggestion is only a fallback keyword
//! hint, and the final default is PO.

use serde::{Deserialize, Serialize};

/// Controlled route vocabulary, serialized as the wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Route {
    #[serde(rename = "PO")]
    #[default]
    Po,
    #[serde(rename = "IV")]
    Iv,
    #[serde(rename = "IM")]
    Im,
    #[serde(rename = "SC")]
    Sc,
    #[serde(rename = "INH")]
    Inh,
    #[serde(rename = "unspecified")]
    Unspecified,
}

impl Route {
    pub fn code(&self) -> &'static str {
        match self {
            Route::Po => "PO",
            Route::Iv => "IV",
            Route::Im => "IM",
            Route::Sc => "SC",
            Route::Inh => "INH",
            Route::Unspecified => "unspecified",
        }
    }
}

/// Curated drug-name fragment → route. Substring match, case-insensitive,
/// first hit wins. Fragments are lowercase.
const DRUG_ROUTE_TABLE: &[(&str, Route)] = &[
    // Oral tablets / syrups
    ("metformin", Route::Po),
    ("glimepiride", Route::Po),
    ("amlodipine", Route::Po),
    ("telmisartan", Route::Po),
    ("atorvastatin", Route::Po),
    ("aspirin", Route::Po),
    ("clopidogrel", Route::Po),
    ("pantoprazole tab", Route::Po),
    ("azithromycin tab", Route::Po),
    ("paracetamol", Route::Po),
    ("levocetirizine", Route::Po),
    ("cough syrup", Route::Po),
    // Nebulized bronchodilators
    ("duolin", Route::Inh),
    ("budecort", Route::Inh),
    ("salbutamol neb", Route::Inh),
    ("ipratropium", Route::Inh),
    ("budesonide", Route::Inh),
    ("foracort", Route::Inh),
    // Subcutaneous insulins
    ("insulatard", Route::Sc),
    ("actrapid", Route::Sc),
    ("mixtard", Route::Sc),
    ("lantus", Route::Sc),
    ("glargine", Route::Sc),
    ("human mixtard", Route::Sc),
    ("enoxaparin", Route::Sc),
    // Specific injectables
    ("ceftriaxone", Route::Iv),
    ("piperacillin", Route::Iv),
    ("piptaz", Route::Iv),
    ("ondansetron inj", Route::Iv),
    ("pantoprazole inj", Route::Iv),
    ("hydrocortisone inj", Route::Iv),
    ("tetanus toxoid", Route::Im),
    ("diclofenac inj", Route::Im),
    // IV fluids
    ("iv fluids", Route::Iv),
    ("normal saline", Route::Iv),
    ("ringer lactate", Route::Iv),
    ("dns", Route::Iv),
];

/// Route-vocabulary keywords for the LLM-suggestion fallback.
const ROUTE_KEYWORDS: &[(&str, Route)] = &[
    ("oral", Route::Po),
    ("po", Route::Po),
    ("tab", Route::Po),
    ("intraven", Route::Iv),
    ("iv", Route::Iv),
    ("intramusc", Route::Im),
    ("im", Route::Im),
    ("subcut", Route::Sc),
    ("sc", Route::Sc),
    ("s/c", Route::Sc),
    ("inhal", Route::Inh),
    ("neb", Route::Inh),
    ("inh", Route::Inh),
];

/// Canonical route for a drug: table first, LLM-suggested route keyword
/// second, PO last.
pub fn canonical_route(drug_name: &str, suggested: &str) -> Route {
    let name_lower = drug_name.to_lowercase();
    for (fragment, route) in DRUG_ROUTE_TABLE {
        if name_lower.contains(fragment) {
            return *route;
        }
    }

    let suggested_lower = suggested.to_lowercase();
    if !suggested_lower.trim().is_empty() {
        for (keyword, route) in ROUTE_KEYWORDS {
            if suggested_lower.contains(keyword) {
                return *route;
            }
        }
    }

    Route::Po
}
