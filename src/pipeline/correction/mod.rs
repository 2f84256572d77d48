pub mod ocr_fixes;
pub mod vitals;
pub mod dates;
pub mod routes;
pub mod diagnosis;
pub mod crossval;

pub use ocr_fixes::{clean_field, fix_known_ocr_errors, is_placeholder};
pub use vitals::parse_discharge_vitals;
pub use dates::parse_admission_discharge_dates;
pub use routes::canonical_route;
pub use diagnosis::normalize_diagnosis;
pub use crossval::cross_validate;
