//! Validation report shapes. Serialized camelCase for consumers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Per-node and per-compliance-item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pass,
    Warning,
    Fail,
}

/// One typed resource in the tree. Only the root Bundle carries
/// children; everything else is a leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    pub resource_type: String,
    pub name: String,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResourceNode>,
}

impl ResourceNode {
    pub fn leaf(resource_type: &str, name: impl Into<String>, status: NodeStatus) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            name: name.into(),
            status,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Which resource the issue is about, e.g. `MedicationRequest[Mixtard]`.
    pub resource_path: String,
    /// The profile field that failed, e.g. `Condition.code.icd10`.
    pub profile_path: String,
    pub message: String,
    /// Short actionable hint for a fix-it affordance.
    pub fix_hint: String,
    /// Full diagnostic text, suitable for an expandable detail view.
    pub diagnostics: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceItem {
    pub label: String,
    pub status: NodeStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub resource_tree: ResourceNode,
    pub validation_issues: Vec<ValidationIssue>,
    pub compliance_items: Vec<ComplianceItem>,
    /// Count of leaf resources per resource type.
    pub resource_breakdown: BTreeMap<String, usize>,
    pub total_resources: usize,
    pub health_score: u8,
}

impl ValidationReport {
    /// The all-zero report produced for an empty record.
    pub fn empty() -> Self {
        Self {
            resource_tree: ResourceNode::leaf("Bundle", "Document Bundle", NodeStatus::Pass),
            validation_issues: Vec::new(),
            compliance_items: Vec::new(),
            resource_breakdown: BTreeMap::new(),
            total_resources: 0,
            health_score: 0,
        }
    }
}
