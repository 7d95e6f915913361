use crate::models::cleanup::DeletionStepType;
use crate::models::environment::Environment;
use crate::models::graph::{BackupType, DependencyGraph, RiskLevel};
use crate::models::provider::{DatabaseProvider, HostingProvider, StorageProvider};
use serde_derive::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariableSet {
    pub environment: Environment,
    pub keys: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostingResources {
    pub provider: HostingProvider,
    pub project_id: String,
    pub org_id: String,
    pub project_name: String,
    pub production_url: Option<String>,
    pub domains: Vec<String>,
    pub env_vars: Vec<EnvironmentVariableSet>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseResource {
    pub provider: DatabaseProvider,
    pub environment: Environment,
    pub identifier: String,
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageResource {
    pub provider: StorageProvider,
    pub name: String,
    pub id: Option<String>,
    pub region: Option<String>,
}

/// Resource: every kind of resource the engine knows how to delete.
/// Ordering, risk and backup metadata hang off the variant, never off optional fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    HostingProject {
        provider: HostingProvider,
        project_id: String,
        org_id: String,
        name: String,
    },
    Domain {
        name: String,
    },
    EnvironmentVariables {
        environment: Environment,
        keys: Vec<String>,
    },
    Database {
        provider: DatabaseProvider,
        environment: Environment,
        identifier: String,
        url: Option<String>,
        token: Option<String>,
    },
    StorageStore {
        provider: StorageProvider,
        name: String,
        id: Option<String>,
        region: Option<String>,
    },
}

impl Resource {
    pub fn step_type(&self) -> DeletionStepType {
        match self {
            Resource::HostingProject { .. } => DeletionStepType::HostingProject,
            Resource::Domain { .. } => DeletionStepType::Domains,
            Resource::EnvironmentVariables { .. } => DeletionStepType::EnvironmentVariables,
            Resource::Database { .. } => DeletionStepType::Database,
            Resource::StorageStore { .. } => DeletionStepType::StorageStore,
        }
    }

    /// Stable id, unique inside an inventory.
    pub fn id(&self) -> String {
        let key = match self {
            Resource::HostingProject { project_id, .. } => project_id.clone(),
            Resource::Domain { name } => name.clone(),
            Resource::EnvironmentVariables { environment, .. } => environment.to_string(),
            Resource::Database { identifier, .. } => identifier.clone(),
            Resource::StorageStore { name, .. } => name.clone(),
        };

        format!("{}:{}", self.step_type(), key)
    }

    /// Environment the resource is bound to, `None` for project wide resources.
    pub fn environment(&self) -> Option<Environment> {
        match self {
            Resource::EnvironmentVariables { environment, .. } | Resource::Database { environment, .. } => {
                Some(*environment)
            }
            Resource::HostingProject { .. } | Resource::Domain { .. } | Resource::StorageStore { .. } => None,
        }
    }

    /// Whether this resource references `other`, in which case it must be deleted first.
    pub fn references(&self, other: &Resource) -> bool {
        match (self, other) {
            (Resource::Domain { .. }, Resource::HostingProject { .. }) => true,
            (Resource::HostingProject { .. }, Resource::EnvironmentVariables { .. }) => true,
            (
                Resource::EnvironmentVariables { environment, .. },
                Resource::Database {
                    environment: database_environment,
                    ..
                },
            ) => environment == database_environment,
            (Resource::EnvironmentVariables { .. }, Resource::StorageStore { .. }) => true,
            _ => false,
        }
    }

    pub fn risk_severity(&self) -> RiskLevel {
        match self {
            Resource::StorageStore { .. } => RiskLevel::Low,
            Resource::Domain { .. } | Resource::EnvironmentVariables { .. } => RiskLevel::Medium,
            Resource::HostingProject { .. } => RiskLevel::High,
            Resource::Database { environment, .. } => match environment.is_production() {
                true => RiskLevel::Critical,
                false => RiskLevel::High,
            },
        }
    }

    /// Backup to take before deletion, `(required, type)`.
    pub fn backup(&self) -> (bool, BackupType) {
        match self {
            Resource::Database { environment, .. } => match environment.is_production() {
                true => (true, BackupType::Full),
                false => (true, BackupType::Data),
            },
            Resource::StorageStore { .. } => (true, BackupType::Data),
            Resource::EnvironmentVariables { .. } | Resource::HostingProject { .. } => (true, BackupType::Config),
            Resource::Domain { .. } => (false, BackupType::Config),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Resource::HostingProject { provider, name, .. } => format!("Remove {} project `{}`", provider, name),
            Resource::Domain { name } => format!("Remove domain `{}`", name),
            Resource::EnvironmentVariables { environment, keys } => format!(
                "Clear {} hosting environment variable(s) of {}",
                keys.len(),
                environment
            ),
            Resource::Database {
                provider,
                environment,
                identifier,
                ..
            } => format!("Destroy {} {} database `{}`", environment, provider, identifier),
            Resource::StorageStore { provider, name, .. } => format!("Remove {} store `{}`", provider, name),
        }
    }

    /// Parameters a deleter needs to act on the resource. Secrets are never included.
    pub fn parameters(&self) -> BTreeMap<String, String> {
        let mut parameters = BTreeMap::new();
        match self {
            Resource::HostingProject {
                provider,
                project_id,
                org_id,
                name,
            } => {
                parameters.insert("provider".to_string(), provider.to_string());
                parameters.insert("projectId".to_string(), project_id.clone());
                parameters.insert("orgId".to_string(), org_id.clone());
                parameters.insert("name".to_string(), name.clone());
            }
            Resource::Domain { name } => {
                parameters.insert("domain".to_string(), name.clone());
            }
            Resource::EnvironmentVariables { environment, keys } => {
                parameters.insert("environment".to_string(), environment.to_string());
                parameters.insert("keys".to_string(), keys.join(","));
            }
            Resource::Database {
                provider,
                environment,
                identifier,
                url,
                ..
            } => {
                parameters.insert("provider".to_string(), provider.to_string());
                parameters.insert("environment".to_string(), environment.to_string());
                parameters.insert("identifier".to_string(), identifier.clone());
                if let Some(url) = url {
                    parameters.insert("url".to_string(), url.clone());
                }
            }
            Resource::StorageStore {
                provider,
                name,
                id,
                region,
            } => {
                parameters.insert("provider".to_string(), provider.to_string());
                parameters.insert("name".to_string(), name.clone());
                if let Some(id) = id {
                    parameters.insert("storeId".to_string(), id.clone());
                }
                if let Some(region) = region {
                    parameters.insert("region".to_string(), region.clone());
                }
            }
        }

        parameters
    }

    /// Exclusions match either the full id or the bare resource name.
    pub fn is_excluded_by(&self, exclusion: &str) -> bool {
        let id = self.id();
        id == exclusion || id.split_once(':').map(|(_, key)| key == exclusion).unwrap_or(false)
    }
}

/// ResourceInventory: discovered facts about a project. Rebuilt wholesale on each discovery,
/// there is no way to update one partially.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInventory {
    project_name: String,
    project_path: PathBuf,
    hosting: Option<HostingResources>,
    databases: Option<Vec<DatabaseResource>>,
    storage: Option<Vec<StorageResource>>,
    dependency_graph: DependencyGraph,
}

impl ResourceInventory {
    pub fn new(
        project_name: String,
        project_path: &Path,
        hosting: Option<HostingResources>,
        databases: Option<Vec<DatabaseResource>>,
        storage: Option<Vec<StorageResource>>,
    ) -> Self {
        let mut inventory = ResourceInventory {
            project_name,
            project_path: project_path.to_path_buf(),
            hosting,
            databases: databases.filter(|d| !d.is_empty()),
            storage: storage.filter(|s| !s.is_empty()),
            dependency_graph: DependencyGraph::default(),
        };
        inventory.dependency_graph = crate::dependency_graph::build_graph(&inventory);

        inventory
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn hosting(&self) -> Option<&HostingResources> {
        self.hosting.as_ref()
    }

    pub fn databases(&self) -> Option<&[DatabaseResource]> {
        self.databases.as_deref()
    }

    pub fn storage(&self) -> Option<&[StorageResource]> {
        self.storage.as_deref()
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.dependency_graph
    }

    pub fn is_empty(&self) -> bool {
        self.hosting.is_none() && self.databases.is_none() && self.storage.is_none()
    }

    /// Every discovered resource, flattened into the closed resource union.
    pub fn resources(&self) -> Vec<Resource> {
        let mut resources = vec![];

        if let Some(hosting) = &self.hosting {
            resources.push(Resource::HostingProject {
                provider: hosting.provider,
                project_id: hosting.project_id.clone(),
                org_id: hosting.org_id.clone(),
                name: hosting.project_name.clone(),
            });
            resources.extend(hosting.domains.iter().map(|d| Resource::Domain { name: d.clone() }));
            resources.extend(hosting.env_vars.iter().map(|set| Resource::EnvironmentVariables {
                environment: set.environment,
                keys: set.keys.clone(),
            }));
        }

        for database in self.databases.iter().flatten() {
            resources.push(Resource::Database {
                provider: database.provider,
                environment: database.environment,
                identifier: database.identifier.clone(),
                url: database.url.clone(),
                token: database.token.clone(),
            });
        }

        for store in self.storage.iter().flatten() {
            resources.push(Resource::StorageStore {
                provider: store.provider,
                name: store.name.clone(),
                id: store.id.clone(),
                region: store.region.clone(),
            });
        }

        resources
    }

    pub fn resource_types(&self) -> BTreeSet<DeletionStepType> {
        self.resources().iter().map(|r| r.step_type()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database(environment: Environment) -> Resource {
        Resource::Database {
            provider: DatabaseProvider::Turso,
            environment,
            identifier: format!("app{}", environment.name_suffix()),
            url: None,
            token: None,
        }
    }

    #[test]
    fn test_env_vars_reference_database_of_same_environment_only() {
        let env_vars = Resource::EnvironmentVariables {
            environment: Environment::Staging,
            keys: vec!["TURSO_DATABASE_URL".to_string()],
        };

        assert!(env_vars.references(&database(Environment::Staging)));
        assert!(!env_vars.references(&database(Environment::Production)));
        assert!(!database(Environment::Staging).references(&env_vars));
    }

    #[test]
    fn test_resource_ids_and_exclusions() {
        let db = database(Environment::Development);

        assert_eq!(db.id(), "database:app-dev");
        assert!(db.is_excluded_by("database:app-dev"));
        assert!(db.is_excluded_by("app-dev"));
        assert!(!db.is_excluded_by("app"));
    }

    #[test]
    fn test_parameters_never_carry_tokens() {
        let db = Resource::Database {
            provider: DatabaseProvider::Turso,
            environment: Environment::Production,
            identifier: "app-prod".to_string(),
            url: Some("libsql://app-prod.turso.io".to_string()),
            token: Some("secret".to_string()),
        };

        assert!(!db.parameters().values().any(|v| v.contains("secret")));
        assert_eq!(db.risk_severity(), RiskLevel::Critical);
    }

    #[test]
    fn test_empty_blocks_are_absent() {
        let inventory = ResourceInventory::new("app".to_string(), Path::new("/tmp/app"), None, Some(vec![]), None);

        assert!(inventory.is_empty());
        assert!(inventory.databases().is_none());
        assert!(inventory.dependency_graph().deletion_order.is_empty());
    }
}
