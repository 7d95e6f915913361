use crate::cmd::aws::S3Cli;
use crate::cmd::command::{ProcessVendorCli, VendorCli};
use crate::cmd::supabase::{self, SupabaseCli};
use crate::cmd::turso::TursoCli;
use crate::cmd::vercel::VercelCli;
use crate::config::{ConfigError, EngineConfig, VendorSettings};
use crate::constants::SUPABASE_ORG_ID;
use crate::errors::{CommandError, ProvisioningError};
use crate::models::environment::Environment;
use crate::models::provider::{DatabaseProvider, HostingProvider, StorageProvider};
use crate::models::record::{DatabaseRecord, HostingBlock, ProvisioningMode, ProvisioningRecord, StorageBlock};
use crate::provisioner::{ProvisioningRequest, Provisioner, ResourceFactory, provision_with};
use rand::Rng;
use rand::distr::Alphanumeric;
use std::collections::BTreeMap;
use std::sync::Arc;

const SUPABASE_PASSWORD_LENGTH: usize = 32;

/// RealProvisioner: creates resources through the vendor CLIs.
#[derive(Clone)]
pub struct RealProvisioner {
    cli: Arc<dyn VendorCli>,
    vendors: VendorSettings,
}

impl RealProvisioner {
    pub fn new(config: &EngineConfig) -> Self {
        RealProvisioner::new_with_cli(config, Arc::new(ProcessVendorCli::new(config.vendor_timeout)))
    }

    pub fn new_with_cli(config: &EngineConfig, cli: Arc<dyn VendorCli>) -> Self {
        RealProvisioner {
            cli,
            vendors: config.vendors.clone(),
        }
    }

    fn turso(&self) -> TursoCli {
        TursoCli::new(
            self.cli.clone(),
            self.vendors.turso_group.clone(),
            self.vendors.turso_token.clone(),
        )
    }

    fn supabase(&self) -> SupabaseCli {
        SupabaseCli::new(self.cli.clone(), self.vendors.supabase_token.clone())
    }

    fn vercel(&self, request: &ProvisioningRequest) -> VercelCli {
        VercelCli::new(self.cli.clone(), &request.project_path, self.vendors.vercel_token.clone())
    }

    fn s3(&self) -> S3Cli {
        S3Cli::new(self.cli.clone(), &self.vendors.aws_region)
    }

    /// Settings a request needs which can only be checked before the first vendor call.
    fn check_settings(&self, request: &ProvisioningRequest) -> Result<(), ConfigError> {
        if request.database == Some(DatabaseProvider::Supabase) && self.vendors.supabase_org_id.is_none() {
            return Err(ConfigError::Missing(SUPABASE_ORG_ID.to_string()));
        }

        Ok(())
    }
}

fn vendor_error(resource: &str, environment: Option<Environment>) -> impl FnOnce(CommandError) -> ProvisioningError {
    let resource = resource.to_string();
    move |error| ProvisioningError::Vendor {
        resource,
        environment,
        error,
    }
}

/// Error of a resource created at its vendor whose credentials couldn't be read back.
fn credentials_not_captured(
    resource: &str,
    environment: Environment,
    name: &str,
    identifier: &str,
) -> impl FnOnce(CommandError) -> ProvisioningError {
    let (resource, name, identifier) = (resource.to_string(), name.to_string(), identifier.to_string());
    move |error| ProvisioningError::CredentialsNotCaptured {
        resource,
        environment,
        name,
        identifier,
        error,
    }
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SUPABASE_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

impl ResourceFactory for RealProvisioner {
    fn create_storage(
        &self,
        request: &ProvisioningRequest,
        provider: StorageProvider,
        name: &str,
    ) -> Result<StorageBlock, ProvisioningError> {
        match provider {
            StorageProvider::VercelBlob => {
                let store = self
                    .vercel(request)
                    .create_blob_store(name)
                    .map_err(vendor_error("Vercel Blob store", None))?;

                Ok(StorageBlock {
                    provider,
                    store_name: name.to_string(),
                    store_id: Some(store.id),
                    token: store.token,
                    region: None,
                    endpoint: None,
                    public_url: None,
                })
            }
            StorageProvider::S3 => {
                let s3 = self.s3();
                s3.create_bucket(name).map_err(vendor_error("S3 bucket", None))?;

                Ok(StorageBlock {
                    provider,
                    store_name: name.to_string(),
                    store_id: None,
                    token: None,
                    region: Some(s3.region().to_string()),
                    endpoint: Some(s3.endpoint()),
                    public_url: Some(s3.public_url(name)),
                })
            }
        }
    }

    fn create_hosting(
        &self,
        request: &ProvisioningRequest,
        provider: HostingProvider,
        name: &str,
    ) -> Result<HostingBlock, ProvisioningError> {
        match provider {
            HostingProvider::Vercel => {
                let link = self
                    .vercel(request)
                    .create_and_link_project(name)
                    .map_err(vendor_error("Vercel project", None))?;
                let project_name = link.project_name.unwrap_or_else(|| name.to_string());

                Ok(HostingBlock {
                    provider,
                    project_id: link.project_id,
                    org_id: link.org_id,
                    production_url: Some(format!("https://{}.vercel.app", project_name)),
                    project_name,
                    domains: vec![],
                })
            }
        }
    }

    fn create_database(
        &self,
        _request: &ProvisioningRequest,
        provider: DatabaseProvider,
        environment: Environment,
        name: &str,
    ) -> Result<DatabaseRecord, ProvisioningError> {
        match provider {
            DatabaseProvider::Turso => {
                let turso = self.turso();
                let not_captured = || credentials_not_captured("Turso database", environment, name, name);

                turso
                    .create_database(name)
                    .map_err(vendor_error("Turso database", Some(environment)))?;
                let url = turso.database_url(name).map_err(not_captured())?;
                let auth_token = turso.create_token(name).map_err(not_captured())?;

                Ok(DatabaseRecord {
                    environment,
                    name: name.to_string(),
                    url,
                    auth_token,
                })
            }
            DatabaseProvider::Supabase => {
                let supabase_cli = self.supabase();
                let org_id = self
                    .vendors
                    .supabase_org_id
                    .as_deref()
                    .ok_or_else(|| ConfigError::Missing(SUPABASE_ORG_ID.to_string()))?;
                let password = generate_password();

                let project = supabase_cli
                    .create_project(name, org_id, &self.vendors.supabase_region, &password)
                    .map_err(vendor_error("Supabase project", Some(environment)))?;
                let anon_key = supabase_cli
                    .anon_key(&project.id)
                    .map_err(credentials_not_captured("Supabase project", environment, name, &project.id))?;

                Ok(DatabaseRecord {
                    environment,
                    name: name.to_string(),
                    url: supabase::database_url(&project.id, &password),
                    auth_token: anon_key,
                })
            }
        }
    }

    fn publish_credentials(
        &self,
        request: &ProvisioningRequest,
        environment: Environment,
        credentials: &BTreeMap<String, String>,
    ) -> Result<(), ProvisioningError> {
        if request.hosting.is_none() {
            return Ok(());
        }

        let vercel = self.vercel(request);
        for (key, value) in credentials {
            vercel
                .add_env_var(key, value, environment)
                .map_err(vendor_error("hosting environment variable", Some(environment)))?;
        }
        info!("{} credential(s) pushed to the {} hosting environment", credentials.len(), environment);

        Ok(())
    }
}

impl Provisioner for RealProvisioner {
    fn mode(&self) -> ProvisioningMode {
        ProvisioningMode::Real
    }

    fn provision(&self, request: &ProvisioningRequest) -> Result<ProvisioningRecord, ProvisioningError> {
        request.resource_names()?;
        self.check_settings(request)?;

        provision_with(Arc::new(self.clone()), self.mode(), request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::fake::FakeVendorCli;
    use crate::models::record::IncompleteDatabase;
    use std::path::Path;

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.vendors.turso_token = Some("turso-secret".to_string());
        config
    }

    #[test]
    fn test_turso_databases_per_environment() {
        let fake = Arc::new(
            FakeVendorCli::new()
                .on("turso db show shop-dev", "libsql://shop-dev-acme.turso.io\n")
                .on("turso db show shop-prod", "libsql://shop-prod-acme.turso.io\n")
                .on("turso db tokens create", "eyJtoken\n"),
        );
        let provisioner = RealProvisioner::new_with_cli(&config(), fake.clone());
        let request = ProvisioningRequest::new("shop", Path::new("/tmp/shop"))
            .with_environments(&[Environment::Development, Environment::Production])
            .with_database(DatabaseProvider::Turso);

        let record = provisioner.provision(&request).expect("provisioning should succeed");

        assert_eq!(record.mode, ProvisioningMode::Real);
        assert_eq!(
            record
                .database_records()
                .iter()
                .map(|r| r.url.as_str())
                .collect::<Vec<_>>(),
            vec!["libsql://shop-dev-acme.turso.io", "libsql://shop-prod-acme.turso.io"]
        );
        let command_lines = fake.command_lines();
        assert!(command_lines.contains(&"turso db create shop-dev".to_string()));
        assert!(command_lines.contains(&"turso db create shop-prod".to_string()));
        assert!(!command_lines.iter().any(|c| c.contains("turso-secret")));
    }

    #[test]
    fn test_vendor_failure_is_isolated_to_its_environment() {
        let fake = Arc::new(
            FakeVendorCli::new()
                .fail_on("turso db create shop-stg", "quota exceeded")
                .on("turso db show", "libsql://shop.turso.io\n")
                .on("turso db tokens create", "eyJtoken\n"),
        );
        let provisioner = RealProvisioner::new_with_cli(&config(), fake);

        let err = provisioner
            .provision(&ProvisioningRequest::new("shop", Path::new("/tmp/shop")).with_database(DatabaseProvider::Turso))
            .expect_err("staging should fail");

        assert_eq!(err.failed_environments(), vec![Environment::Staging]);
        assert!(err.to_string().contains("staging"));
    }

    #[test]
    fn test_database_without_credentials_stays_in_the_record() {
        let fake = Arc::new(
            FakeVendorCli::new()
                .fail_on("turso db tokens create shop-stg", "token quota exceeded")
                .on("turso db show", "libsql://shop.turso.io\n")
                .on("turso db tokens create", "eyJtoken\n"),
        );
        let provisioner = RealProvisioner::new_with_cli(&config(), fake.clone());

        let err = provisioner
            .provision(&ProvisioningRequest::new("shop", Path::new("/tmp/shop")).with_database(DatabaseProvider::Turso))
            .expect_err("staging should fail");

        assert_eq!(err.failed_environments(), vec![Environment::Staging]);
        let partial_record = match err {
            ProvisioningError::EnvironmentsFailed { partial_record, .. } => partial_record,
            other => panic!("unexpected error: {}", other),
        };
        assert_eq!(
            partial_record.database.map(|d| d.environments()).unwrap_or_default(),
            vec![Environment::Development, Environment::Production]
        );
        assert_eq!(
            partial_record.incomplete_databases,
            vec![IncompleteDatabase {
                provider: DatabaseProvider::Turso,
                environment: Environment::Staging,
                name: "shop-stg".to_string(),
                identifier: "shop-stg".to_string(),
            }]
        );
        assert!(fake.command_lines().contains(&"turso db create shop-stg".to_string()));
    }

    #[test]
    fn test_supabase_project_without_anon_key_keeps_its_ref() {
        let mut config = config();
        config.vendors.supabase_org_id = Some("org_1".to_string());
        let fake = Arc::new(
            FakeVendorCli::new()
                .on("supabase projects create", r#"{"id":"abcdefgh","name":"shop-prod"}"#)
                .fail_on("supabase projects api-keys", "service unavailable"),
        );
        let provisioner = RealProvisioner::new_with_cli(&config, fake);

        let err = provisioner
            .provision(
                &ProvisioningRequest::new("shop", Path::new("/tmp/shop"))
                    .with_environments(&[Environment::Production])
                    .with_database(DatabaseProvider::Supabase),
            )
            .expect_err("production should fail");

        let partial_record = match err {
            ProvisioningError::EnvironmentsFailed { partial_record, .. } => partial_record,
            other => panic!("unexpected error: {}", other),
        };
        assert!(partial_record.database.is_none());
        assert_eq!(
            partial_record
                .incomplete_databases
                .iter()
                .map(|d| d.identifier.as_str())
                .collect::<Vec<_>>(),
            vec!["abcdefgh"]
        );
    }

    #[test]
    fn test_supabase_requires_an_organization() {
        let fake = Arc::new(FakeVendorCli::new());
        let provisioner = RealProvisioner::new_with_cli(&config(), fake.clone());

        let err = provisioner
            .provision(&ProvisioningRequest::new("shop", Path::new("/tmp/shop")).with_database(DatabaseProvider::Supabase))
            .expect_err("organization is missing");

        assert!(matches!(err, ProvisioningError::Configuration(ConfigError::Missing(_))));
        assert!(fake.command_lines().is_empty());
    }

    #[test]
    fn test_credentials_are_pushed_to_hosting() {
        let dir = tempfile::tempdir().expect("cannot create temp dir");
        std::fs::create_dir_all(dir.path().join(".vercel")).expect("cannot create dir");
        std::fs::write(
            dir.path().join(".vercel/project.json"),
            r#"{"projectId":"prj_1","orgId":"team_1","projectName":"shop"}"#,
        )
        .expect("cannot write link");
        let fake = Arc::new(
            FakeVendorCli::new()
                .on("turso db show", "libsql://shop-prod.turso.io\n")
                .on("turso db tokens create", "eyJtoken\n"),
        );
        let provisioner = RealProvisioner::new_with_cli(&config(), fake.clone());
        let request = ProvisioningRequest::new("shop", dir.path())
            .with_environments(&[Environment::Production])
            .with_database(DatabaseProvider::Turso)
            .with_hosting(HostingProvider::Vercel);

        let record = provisioner.provision(&request).expect("provisioning should succeed");

        assert_eq!(record.hosting.map(|h| h.project_id).as_deref(), Some("prj_1"));
        let calls = fake.calls.lock().expect("poisoned lock");
        let env_add = calls
            .iter()
            .find(|c| c.to_command_line() == "vercel env add TURSO_AUTH_TOKEN production")
            .expect("token should be pushed");
        assert_eq!(env_add.stdin.as_deref(), Some("eyJtoken"));
    }

    #[test]
    fn test_unpublished_credentials_keep_the_database() {
        let dir = tempfile::tempdir().expect("cannot create temp dir");
        std::fs::create_dir_all(dir.path().join(".vercel")).expect("cannot create dir");
        std::fs::write(
            dir.path().join(".vercel/project.json"),
            r#"{"projectId":"prj_1","orgId":"team_1","projectName":"shop"}"#,
        )
        .expect("cannot write link");
        let fake = Arc::new(
            FakeVendorCli::new()
                .on("turso db show", "libsql://shop-prod.turso.io\n")
                .on("turso db tokens create", "eyJtoken\n")
                .fail_on("vercel env add", "forbidden"),
        );
        let provisioner = RealProvisioner::new_with_cli(&config(), fake);
        let request = ProvisioningRequest::new("shop", dir.path())
            .with_environments(&[Environment::Production])
            .with_database(DatabaseProvider::Turso)
            .with_hosting(HostingProvider::Vercel);

        let err = provisioner.provision(&request).expect_err("publication should fail");

        assert_eq!(err.failed_environments(), vec![Environment::Production]);
        let partial_record = match err {
            ProvisioningError::EnvironmentsFailed { partial_record, .. } => partial_record,
            other => panic!("unexpected error: {}", other),
        };
        assert_eq!(
            partial_record.database_records().iter().map(|r| r.url.as_str()).collect::<Vec<_>>(),
            vec!["libsql://shop-prod.turso.io"]
        );
        assert_eq!(partial_record.hosting.map(|h| h.project_id).as_deref(), Some("prj_1"));
    }

    #[test]
    fn test_generated_password() {
        let password = generate_password();

        assert_eq!(password.len(), SUPABASE_PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
