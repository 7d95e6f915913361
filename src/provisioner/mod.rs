pub mod mock;
pub mod real;

pub use mock::MockProvisioner;
pub use real::RealProvisioner;

use crate::config::EngineConfig;
use crate::errors::{ProvisioningError, ValidationError};
use crate::models::environment::Environment;
use crate::models::provider::{DatabaseProvider, HostingProvider, StorageProvider};
use crate::models::record::{
    DatabaseBlock, DatabaseRecord, HostingBlock, IncompleteDatabase, ProvisioningMode, ProvisioningRecord,
    StorageBlock,
};
use crate::naming;
use crate::runtime;
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// ProvisioningRequest: what to create for a project, and for which environments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisioningRequest {
    pub project_name: String,
    pub project_path: PathBuf,
    pub environments: Vec<Environment>,
    pub database: Option<DatabaseProvider>,
    pub storage: Option<StorageProvider>,
    pub hosting: Option<HostingProvider>,
}

impl ProvisioningRequest {
    pub fn new(project_name: &str, project_path: &Path) -> Self {
        ProvisioningRequest {
            project_name: project_name.to_string(),
            project_path: project_path.to_path_buf(),
            environments: vec![Environment::Development, Environment::Staging, Environment::Production],
            database: None,
            storage: None,
            hosting: None,
        }
    }

    pub fn with_environments(mut self, environments: &[Environment]) -> Self {
        self.environments = environments.to_vec();
        self
    }

    pub fn with_database(mut self, provider: DatabaseProvider) -> Self {
        self.database = Some(provider);
        self
    }

    pub fn with_storage(mut self, provider: StorageProvider) -> Self {
        self.storage = Some(provider);
        self
    }

    pub fn with_hosting(mut self, provider: HostingProvider) -> Self {
        self.hosting = Some(provider);
        self
    }

    /// Checks the request and computes every resource name, without calling any vendor.
    pub fn resource_names(&self) -> Result<ResourceNames, ValidationError> {
        let mut seen = HashSet::new();
        for environment in &self.environments {
            if !seen.insert(*environment) {
                return Err(ValidationError::DuplicateEnvironment(*environment));
            }
        }

        let databases = match self.database {
            None => vec![],
            Some(_) if self.environments.is_empty() => return Err(ValidationError::EmptyEnvironmentSet),
            Some(provider) => self
                .environments
                .iter()
                .map(|env| {
                    naming::environment_resource_name(&self.project_name, *env, naming::database_policy(provider))
                        .map(|name| (*env, name))
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(ResourceNames {
            databases,
            storage: self
                .storage
                .map(|p| naming::project_resource_name(&self.project_name, naming::storage_policy(p)))
                .transpose()?,
            hosting: self
                .hosting
                .map(|p| naming::project_resource_name(&self.project_name, naming::hosting_policy(p)))
                .transpose()?,
        })
    }
}

/// Validated names of every resource a request creates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceNames {
    pub databases: Vec<(Environment, String)>,
    pub storage: Option<String>,
    pub hosting: Option<String>,
}

/// Provisioner: creates the resources of a request and reports what was created.
/// Environments that succeeded before a failure are never rolled back.
pub trait Provisioner: Send + Sync {
    fn mode(&self) -> ProvisioningMode;
    fn provision(&self, request: &ProvisioningRequest) -> Result<ProvisioningRecord, ProvisioningError>;
}

pub fn select_provisioner(config: &EngineConfig) -> Box<dyn Provisioner> {
    match config.mode {
        ProvisioningMode::Real => Box::new(RealProvisioner::new(config)),
        ProvisioningMode::Mock => Box::new(MockProvisioner::new()),
    }
}

/// ResourceFactory: the vendor facing half of a provisioner, one call per resource.
pub(crate) trait ResourceFactory: Send + Sync + 'static {
    fn create_storage(
        &self,
        request: &ProvisioningRequest,
        provider: StorageProvider,
        name: &str,
    ) -> Result<StorageBlock, ProvisioningError>;

    fn create_hosting(
        &self,
        request: &ProvisioningRequest,
        provider: HostingProvider,
        name: &str,
    ) -> Result<HostingBlock, ProvisioningError>;

    fn create_database(
        &self,
        request: &ProvisioningRequest,
        provider: DatabaseProvider,
        environment: Environment,
        name: &str,
    ) -> Result<DatabaseRecord, ProvisioningError>;

    /// Hands the credentials of an environment over to the hosting project, if any.
    fn publish_credentials(
        &self,
        _request: &ProvisioningRequest,
        _environment: Environment,
        _credentials: &BTreeMap<String, String>,
    ) -> Result<(), ProvisioningError> {
        Ok(())
    }
}

/// Project wide resources first, then one concurrent task per environment database.
/// A failing environment never cancels the others, failures are aggregated once all settled.
pub(crate) fn provision_with<F: ResourceFactory>(
    factory: Arc<F>,
    mode: ProvisioningMode,
    request: &ProvisioningRequest,
) -> Result<ProvisioningRecord, ProvisioningError> {
    let names = request.resource_names()?;
    info!(
        "provisioning `{}` ({} mode) for environment(s): {:?}",
        request.project_name, mode, request.environments
    );

    let storage = match (request.storage, &names.storage) {
        (Some(provider), Some(name)) => Some(factory.create_storage(request, provider, name)?),
        _ => None,
    };
    let record = ProvisioningRecord::new(mode, request.project_name.clone()).with_storage(storage.clone());

    let hosting = match (request.hosting, &names.hosting) {
        (Some(provider), Some(name)) => Some(
            factory
                .create_hosting(request, provider, name)
                .map_err(|err| keep_partial_record(err, &record))?,
        ),
        _ => None,
    };
    let record = record.with_hosting(hosting);

    let provider = match request.database {
        Some(provider) => provider,
        None => {
            // nothing per environment to create, credentials still go to the hosting project
            for environment in &request.environments {
                factory
                    .publish_credentials(request, *environment, &record.credentials_for(*environment))
                    .map_err(|err| keep_partial_record(err, &record))?;
            }
            return Ok(record);
        }
    };

    let shared_request = Arc::new(request.clone());
    let environments: Vec<Environment> = names.databases.iter().map(|(env, _)| *env).collect();
    let tasks = names.databases.into_iter().map(|(environment, name)| {
        let factory = factory.clone();
        let request = shared_request.clone();
        let storage = storage.clone();

        tokio::task::spawn_blocking(move || {
            let database = factory.create_database(&request, provider, environment, &name)?;
            let mut credentials = database.credentials(provider);
            if let Some(storage) = &storage {
                credentials.extend(storage.credentials());
            }

            match factory.publish_credentials(&request, environment, &credentials) {
                Ok(()) => Ok(database),
                Err(err) => Err(ProvisioningError::CredentialsNotPublished {
                    database: Box::new(database),
                    error: Box::new(err),
                }),
            }
        })
    });
    // tasks are spawned lazily, from within the runtime
    let outcomes = runtime::block_on(async move { join_all(tasks).await });

    let mut databases = vec![];
    let mut incomplete_databases = vec![];
    let mut causes = vec![];
    for (environment, outcome) in environments.into_iter().zip(outcomes) {
        match outcome {
            Ok(Ok(database)) => databases.push(database),
            Ok(Err(err)) => {
                error!("provisioning of `{}` failed: {}", environment, err);
                // the database exists at the vendor, it has to stay discoverable
                match &err {
                    ProvisioningError::CredentialsNotPublished { database, .. } => {
                        databases.push(database.as_ref().clone())
                    }
                    ProvisioningError::CredentialsNotCaptured { name, identifier, .. } => {
                        incomplete_databases.push(IncompleteDatabase {
                            provider,
                            environment,
                            name: name.clone(),
                            identifier: identifier.clone(),
                        })
                    }
                    _ => {}
                }
                causes.push((environment, Box::new(err)));
            }
            Err(join_error) => {
                error!("provisioning task of `{}` crashed: {}", environment, join_error);
                causes.push((
                    environment,
                    Box::new(ProvisioningError::Internal(format!(
                        "provisioning task of `{}` crashed: {}",
                        environment, join_error
                    ))),
                ));
            }
        }
    }

    let database = match databases.is_empty() {
        true => None,
        false => Some(DatabaseBlock::new(provider, databases)?),
    };
    let record = record
        .with_database(database)
        .with_incomplete_databases(incomplete_databases);

    if causes.is_empty() {
        return Ok(record);
    }

    causes.sort_by_key(|(env, _)| *env);
    Err(ProvisioningError::EnvironmentsFailed {
        failed_environments: causes.iter().map(|(env, _)| *env).collect(),
        causes,
        partial_record: Box::new(record),
    })
}

/// Attaches what was already created to an error which stops the run.
fn keep_partial_record(error: ProvisioningError, record: &ProvisioningRecord) -> ProvisioningError {
    if record.is_empty() {
        return error;
    }

    ProvisioningError::PartiallyProvisioned {
        error: Box::new(error),
        partial_record: Box::new(record.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_names() {
        let request = ProvisioningRequest::new("My Shop", Path::new("/tmp/shop"))
            .with_database(DatabaseProvider::Turso)
            .with_storage(StorageProvider::S3);

        let names = request.resource_names().expect("valid request");

        assert_eq!(
            names.databases,
            vec![
                (Environment::Development, "my-shop-dev".to_string()),
                (Environment::Staging, "my-shop-stg".to_string()),
                (Environment::Production, "my-shop-prod".to_string()),
            ]
        );
        assert_eq!(names.storage.as_deref(), Some("my-shop"));
        assert_eq!(names.hosting, None);
    }

    #[test]
    fn test_request_validation() {
        let request = ProvisioningRequest::new("shop", Path::new("/tmp/shop")).with_database(DatabaseProvider::Turso);

        assert_eq!(
            request.clone().with_environments(&[]).resource_names(),
            Err(ValidationError::EmptyEnvironmentSet)
        );
        assert_eq!(
            request
                .with_environments(&[Environment::Staging, Environment::Staging])
                .resource_names(),
            Err(ValidationError::DuplicateEnvironment(Environment::Staging))
        );
    }

    #[test]
    fn test_storage_only_request_without_environments_is_valid() {
        let request = ProvisioningRequest::new("shop", Path::new("/tmp/shop"))
            .with_environments(&[])
            .with_storage(StorageProvider::VercelBlob);

        assert!(request.resource_names().is_ok());
    }

    #[test]
    fn test_select_provisioner() {
        assert_eq!(select_provisioner(&EngineConfig::mock()).mode(), ProvisioningMode::Mock);
        assert_eq!(
            select_provisioner(&EngineConfig::new(ProvisioningMode::Real)).mode(),
            ProvisioningMode::Real
        );
    }
}
