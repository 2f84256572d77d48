pub mod engine;
pub mod types;

pub use engine::validate_record;
pub use types::{
    ComplianceItem, NodeStatus, ResourceNode, Severity, ValidationIssue, ValidationReport,
};
