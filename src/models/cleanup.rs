use crate::models::environment::Environment;
use crate::models::graph::{BackupRequirement, RiskLevel};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;
use strum_macros::{Display, EnumIter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DeletionStepType {
    HostingProject,
    Database,
    StorageStore,
    EnvironmentVariables,
    Domains,
}

impl DeletionStepType {
    pub fn icon(&self) -> &'static str {
        match self {
            DeletionStepType::HostingProject => "🚀",
            DeletionStepType::Database => "🗄️",
            DeletionStepType::StorageStore => "📦",
            DeletionStepType::EnvironmentVariables => "🔑",
            DeletionStepType::Domains => "🌐",
        }
    }

    /// Fixed time budget of one deletion of this type.
    pub fn estimated_duration(&self) -> Duration {
        match self {
            DeletionStepType::HostingProject => Duration::from_secs(30),
            DeletionStepType::Database => Duration::from_secs(15),
            DeletionStepType::StorageStore => Duration::from_secs(20),
            DeletionStepType::EnvironmentVariables => Duration::from_secs(10),
            DeletionStepType::Domains => Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EnvironmentScope {
    #[default]
    All,
    Only(Environment),
}

impl EnvironmentScope {
    pub fn includes(&self, environment: Option<Environment>) -> bool {
        match (self, environment) {
            (EnvironmentScope::All, _) => true,
            (EnvironmentScope::Only(scope), Some(environment)) => *scope == environment,
            // project wide resources are out of a single environment scope
            (EnvironmentScope::Only(_), None) => false,
        }
    }
}

impl Display for EnvironmentScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentScope::All => f.write_str("all"),
            EnvironmentScope::Only(environment) => f.write_str(environment.as_str()),
        }
    }
}

impl FromStr for EnvironmentScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(EnvironmentScope::All),
            other => Environment::from_str(other).map(EnvironmentScope::Only),
        }
    }
}

impl From<EnvironmentScope> for String {
    fn from(scope: EnvironmentScope) -> Self {
        scope.to_string()
    }
}

impl TryFrom<String> for EnvironmentScope {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EnvironmentScope::from_str(&value)
    }
}

/// ResourceSelection: what the user asked to clean up.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSelection {
    pub resource_types: Vec<DeletionStepType>,
    pub scope: EnvironmentScope,
    pub exclusions: Vec<String>,
}

impl ResourceSelection {
    pub fn new(resource_types: Vec<DeletionStepType>) -> Self {
        ResourceSelection {
            resource_types,
            scope: EnvironmentScope::All,
            exclusions: vec![],
        }
    }

    pub fn with_scope(mut self, scope: EnvironmentScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn excluding(mut self, exclusion: &str) -> Self {
        self.exclusions.push(exclusion.to_string());
        self
    }
}

/// DeletionStep: created by the planner, consumed once by the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionStep {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: DeletionStepType,
    pub description: String,
    pub parameters: BTreeMap<String, String>,
    pub order: u32,
    pub requires_backup: bool,
    pub dependencies: Vec<String>,
}

impl DeletionStep {
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(|v| v.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPlan {
    pub requirements: Vec<BackupRequirement>,
}

impl BackupPlan {
    pub fn required(&self) -> impl Iterator<Item = &BackupRequirement> {
        self.requirements.iter().filter(|r| r.required)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupPlan {
    pub project_name: String,
    pub steps: Vec<DeletionStep>,
    pub target_resources: ResourceSelection,
    pub backup_plan: BackupPlan,
    pub estimated_duration: Duration,
    pub risk_level: RiskLevel,
}

/// RollbackData: what was known of a resource right before it got deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackData {
    pub resource_type: DeletionStepType,
    pub description: String,
    pub parameters: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionStepResult {
    pub step_id: String,
    pub step_type: DeletionStepType,
    pub success: bool,
    pub duration: Duration,
    pub error: Option<String>,
    pub rollback_data: Option<RollbackData>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryInstruction {
    pub step_id: String,
    pub resource_type: DeletionStepType,
    pub instruction: String,
}

/// ManualRecoveryAdvisory: ordered instructions to recreate what was deleted before a failure.
/// Nothing is replayed automatically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualRecoveryAdvisory {
    pub instructions: Vec<RecoveryInstruction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    pub success: bool,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub step_results: Vec<DeletionStepResult>,
    /// Whether recovery guidance was produced, never an automated rollback.
    pub rollback_performed: bool,
    pub recovery_advisory: Option<ManualRecoveryAdvisory>,
    pub total_duration: Duration,
    pub error: Option<String>,
}

impl CleanupResult {
    /// Failed outcome for errors raised before any step ran.
    pub fn new_failure(error: String) -> Self {
        CleanupResult {
            success: false,
            completed_steps: 0,
            failed_steps: 0,
            step_results: vec![],
            rollback_performed: false,
            recovery_advisory: None,
            total_duration: Duration::ZERO,
            error: Some(error),
        }
    }

    /// Successful outcome of a project without any known resource.
    pub fn nothing_to_clean_up() -> Self {
        CleanupResult {
            success: true,
            error: None,
            ..CleanupResult::new_failure(String::new())
        }
    }
}
