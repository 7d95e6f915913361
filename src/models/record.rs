use crate::constants::{
    BLOB_READ_WRITE_TOKEN, BLOB_STORE_ID, DATABASE_URL, S3_BUCKET, S3_ENDPOINT, S3_PUBLIC_URL, S3_REGION,
    SUPABASE_ANON_KEY, SUPABASE_URL, TURSO_AUTH_TOKEN, TURSO_DATABASE_URL,
};
use crate::errors::ValidationError;
use crate::models::environment::Environment;
use crate::models::provider::{DatabaseProvider, HostingProvider, StorageProvider};
use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningMode {
    Real,
    Mock,
}

impl Display for ProvisioningMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProvisioningMode::Real => "real",
            ProvisioningMode::Mock => "mock",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseRecord {
    pub environment: Environment,
    pub name: String,
    pub url: String,
    pub auth_token: String,
}

/// IncompleteDatabase: a database which exists at its vendor but whose credentials couldn't be captured.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompleteDatabase {
    pub provider: DatabaseProvider,
    pub environment: Environment,
    pub name: String,
    /// Vendor identifier used to delete it: the database name for Turso, the project ref for Supabase.
    pub identifier: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawDatabaseBlock")]
pub struct DatabaseBlock {
    pub provider: DatabaseProvider,
    records: Vec<DatabaseRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDatabaseBlock {
    provider: DatabaseProvider,
    records: Vec<DatabaseRecord>,
}

impl TryFrom<RawDatabaseBlock> for DatabaseBlock {
    type Error = ValidationError;

    fn try_from(raw: RawDatabaseBlock) -> Result<Self, Self::Error> {
        DatabaseBlock::new(raw.provider, raw.records)
    }
}

impl DatabaseBlock {
    /// Builds a database block, enforcing one record per environment with a non empty url.
    pub fn new(provider: DatabaseProvider, mut records: Vec<DatabaseRecord>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.environment) {
                return Err(ValidationError::DuplicateEnvironment(record.environment));
            }
            if record.url.trim().is_empty() {
                return Err(ValidationError::EmptyDatabaseUrl(record.environment));
            }
        }

        records.sort_by_key(|r| r.environment);
        Ok(DatabaseBlock { provider, records })
    }

    pub fn records(&self) -> &[DatabaseRecord] {
        &self.records
    }

    pub fn record(&self, environment: Environment) -> Option<&DatabaseRecord> {
        self.records.iter().find(|r| r.environment == environment)
    }

    pub fn environments(&self) -> Vec<Environment> {
        self.records.iter().map(|r| r.environment).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageBlock {
    pub provider: StorageProvider,
    pub store_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostingBlock {
    pub provider: HostingProvider,
    pub project_id: String,
    pub org_id: String,
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_url: Option<String>,
    #[serde(default)]
    pub domains: Vec<String>,
}

/// ProvisioningRecord: immutable snapshot of what a provisioning run created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRecord {
    pub mode: ProvisioningMode,
    pub created_at: DateTime<Utc>,
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosting: Option<HostingBlock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incomplete_databases: Vec<IncompleteDatabase>,
}

impl ProvisioningRecord {
    pub fn new(mode: ProvisioningMode, project_name: String) -> Self {
        ProvisioningRecord {
            mode,
            created_at: Utc::now(),
            project_name,
            database: None,
            storage: None,
            hosting: None,
            incomplete_databases: vec![],
        }
    }

    pub fn with_database(mut self, database: Option<DatabaseBlock>) -> Self {
        self.database = database;
        self
    }

    pub fn with_storage(mut self, storage: Option<StorageBlock>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_hosting(mut self, hosting: Option<HostingBlock>) -> Self {
        self.hosting = hosting;
        self
    }

    pub fn with_incomplete_databases(mut self, mut incomplete_databases: Vec<IncompleteDatabase>) -> Self {
        incomplete_databases.sort_by_key(|d| d.environment);
        self.incomplete_databases = incomplete_databases;
        self
    }

    /// Whether anything was created at all.
    pub fn is_empty(&self) -> bool {
        self.database.is_none()
            && self.storage.is_none()
            && self.hosting.is_none()
            && self.incomplete_databases.is_empty()
    }

    pub fn database_records(&self) -> &[DatabaseRecord] {
        self.database.as_ref().map(|d| d.records()).unwrap_or_default()
    }

    /// Credentials to expose to `environment`: its database record plus the project wide storage.
    pub fn credentials_for(&self, environment: Environment) -> BTreeMap<String, String> {
        let mut credentials = BTreeMap::new();

        if let Some(database) = &self.database {
            if let Some(record) = database.record(environment) {
                credentials.extend(record.credentials(database.provider));
            }
        }
        if let Some(storage) = &self.storage {
            credentials.extend(storage.credentials());
        }

        credentials
    }
}

impl DatabaseRecord {
    /// Env file keys of this database, depending on the provider which created it.
    pub fn credentials(&self, provider: DatabaseProvider) -> BTreeMap<String, String> {
        let mut credentials = BTreeMap::new();
        match provider {
            DatabaseProvider::Turso => {
                credentials.insert(TURSO_DATABASE_URL.to_string(), self.url.clone());
                credentials.insert(TURSO_AUTH_TOKEN.to_string(), self.auth_token.clone());
            }
            DatabaseProvider::Supabase => {
                credentials.insert(DATABASE_URL.to_string(), self.url.clone());
                if let Some(project_ref) = crate::cmd::supabase::project_ref_from_url(&self.url) {
                    credentials.insert(SUPABASE_URL.to_string(), crate::cmd::supabase::api_url(&project_ref));
                }
                credentials.insert(SUPABASE_ANON_KEY.to_string(), self.auth_token.clone());
            }
        }

        credentials
    }
}

impl StorageBlock {
    pub fn credentials(&self) -> BTreeMap<String, String> {
        let mut credentials = BTreeMap::new();
        match self.provider {
            StorageProvider::VercelBlob => {
                if let Some(store_id) = &self.store_id {
                    credentials.insert(BLOB_STORE_ID.to_string(), store_id.clone());
                }
                if let Some(token) = &self.token {
                    credentials.insert(BLOB_READ_WRITE_TOKEN.to_string(), token.clone());
                }
            }
            StorageProvider::S3 => {
                credentials.insert(S3_BUCKET.to_string(), self.store_name.clone());
                let optional = [
                    (S3_REGION, &self.region),
                    (S3_ENDPOINT, &self.endpoint),
                    (S3_PUBLIC_URL, &self.public_url),
                ];
                for (key, value) in optional {
                    if let Some(value) = value {
                        credentials.insert(key.to_string(), value.clone());
                    }
                }
            }
        }

        credentials
    }
}
