use crate::models::cleanup::DeletionStepType;
use serde_derive::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackupType {
    Config,
    Data,
    Full,
}

/// DeletionOrderEntry: a resource and its place in the deletion sequence.
/// `dependencies` are the resources which must be deleted before this one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionOrderEntry {
    pub id: String,
    pub resource_type: DeletionStepType,
    pub priority: u32,
    pub dependencies: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    #[serde(rename = "type")]
    pub resource_type: DeletionStepType,
    pub severity: RiskLevel,
    pub description: String,
    pub affected_resources: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub overall: RiskLevel,
    pub factors: Vec<RiskFactor>,
    pub mitigations: Vec<String>,
}

impl Default for RiskAssessment {
    fn default() -> Self {
        RiskAssessment {
            overall: RiskLevel::Low,
            factors: vec![],
            mitigations: vec![],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequirement {
    pub resource_type: DeletionStepType,
    pub resource_id: String,
    pub required: bool,
    pub backup_type: BackupType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_size: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraph {
    pub deletion_order: Vec<DeletionOrderEntry>,
    pub risk_assessment: RiskAssessment,
    pub backup_requirements: Vec<BackupRequirement>,
}

impl DependencyGraph {
    pub fn entry(&self, id: &str) -> Option<&DeletionOrderEntry> {
        self.deletion_order.iter().find(|e| e.id == id)
    }

    pub fn backup_requirement(&self, id: &str) -> Option<&BackupRequirement> {
        self.backup_requirements.iter().find(|b| b.resource_id == id)
    }
}
