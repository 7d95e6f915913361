//! Builds the inventory of a project from what it left on disk: the provisioning manifest,
//! the hosting link and the env files.

use crate::cmd::supabase::project_ref_from_url;
use crate::cmd::vercel::read_project_link;
use crate::constants::{
    BLOB_STORE_ID, DATABASE_URL, MANAGED_ENV_KEYS, S3_BUCKET, S3_REGION, SUPABASE_URL, TURSO_AUTH_TOKEN,
    TURSO_DATABASE_URL, VERCEL_PROJECT_LINK,
};
use crate::env_file;
use crate::errors::{DiscoveryError, ErrorMessageVerbosity};
use crate::manifest;
use crate::models::environment::Environment;
use crate::models::inventory::{
    DatabaseResource, EnvironmentVariableSet, HostingResources, ResourceInventory, StorageResource,
};
use crate::models::provider::{DatabaseProvider, HostingProvider, StorageProvider};
use crate::models::record::ProvisioningRecord;
use crate::naming;
use std::collections::BTreeMap;
use std::path::Path;
use strum::IntoEnumIterator;

/// Discovers every resource a project is known to use. Nothing found is not an error,
/// the inventory is then empty.
pub fn discover(project_path: &Path) -> Result<ResourceInventory, DiscoveryError> {
    if !project_path.is_dir() {
        return Err(DiscoveryError::InvalidProjectPath(project_path.to_path_buf()));
    }

    let manifest = manifest::read(project_path)?;
    let link = read_project_link(project_path).map_err(|e| DiscoveryError::InvalidHostingLink {
        path: project_path.join(VERCEL_PROJECT_LINK),
        raw_error_message: e.message(ErrorMessageVerbosity::FullDetailsWithoutEnvVars),
    })?;
    let env_values = read_env_files(project_path)?;

    let project_name = manifest
        .as_ref()
        .map(|m| m.project_name.clone())
        .or_else(|| link.as_ref().and_then(|l| l.project_name.clone()))
        .or_else(|| project_path.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_default();

    let mut hosting = match (manifest.as_ref().and_then(|m| m.hosting.as_ref()), &link) {
        (Some(block), _) => Some(HostingResources {
            provider: block.provider,
            project_id: block.project_id.clone(),
            org_id: block.org_id.clone(),
            project_name: block.project_name.clone(),
            production_url: block.production_url.clone(),
            domains: block.domains.clone(),
            env_vars: vec![],
        }),
        (None, Some(link)) => Some(HostingResources {
            provider: HostingProvider::Vercel,
            project_id: link.project_id.clone(),
            org_id: link.org_id.clone(),
            project_name: link.project_name.clone().unwrap_or_else(|| project_name.clone()),
            production_url: None,
            domains: vec![],
            env_vars: vec![],
        }),
        (None, None) => None,
    };

    if let Some(hosting) = hosting.as_mut() {
        hosting.env_vars = env_values
            .iter()
            .filter_map(|(environment, values)| {
                let keys: Vec<String> = MANAGED_ENV_KEYS
                    .iter()
                    .filter(|key| values.contains_key(**key))
                    .map(|key| key.to_string())
                    .collect();
                match keys.is_empty() {
                    true => None,
                    false => Some(EnvironmentVariableSet {
                        environment: *environment,
                        keys,
                    }),
                }
            })
            .collect();
    }

    let databases = discover_databases(&project_name, manifest.as_ref(), &env_values);
    let storage = discover_storage(manifest.as_ref(), &env_values);

    let inventory = ResourceInventory::new(project_name, project_path, hosting, Some(databases), Some(storage));
    info!(
        "discovered {} resource(s) for `{}`",
        inventory.resources().len(),
        inventory.project_name()
    );

    Ok(inventory)
}

/// Values of every environment, the first env file of an environment overriding the others.
fn read_env_files(project_path: &Path) -> Result<BTreeMap<Environment, BTreeMap<String, String>>, DiscoveryError> {
    let mut values = BTreeMap::new();

    for environment in Environment::iter() {
        let mut merged = BTreeMap::new();
        for file in environment.env_files().iter().rev() {
            merged.extend(env_file::read(project_path.join(file))?);
        }
        if !merged.is_empty() {
            values.insert(environment, merged);
        }
    }

    Ok(values)
}

fn discover_databases(
    project_name: &str,
    manifest: Option<&ProvisioningRecord>,
    env_values: &BTreeMap<Environment, BTreeMap<String, String>>,
) -> Vec<DatabaseResource> {
    let mut databases: Vec<DatabaseResource> = manifest
        .and_then(|m| m.database.as_ref())
        .map(|block| {
            block
                .records()
                .iter()
                .map(|record| DatabaseResource {
                    provider: block.provider,
                    environment: record.environment,
                    identifier: match block.provider {
                        DatabaseProvider::Turso => record.name.clone(),
                        DatabaseProvider::Supabase => {
                            project_ref_from_url(&record.url).unwrap_or_else(|| record.name.clone())
                        }
                    },
                    url: Some(record.url.clone()),
                    token: Some(record.auth_token.clone()),
                })
                .collect()
        })
        .unwrap_or_default();

    // created at the vendor, credentials never captured
    for incomplete in manifest.map(|m| m.incomplete_databases.as_slice()).unwrap_or_default() {
        if databases.iter().any(|d| d.environment == incomplete.environment) {
            continue;
        }

        databases.push(DatabaseResource {
            provider: incomplete.provider,
            environment: incomplete.environment,
            identifier: incomplete.identifier.clone(),
            url: None,
            token: None,
        });
    }

    for (environment, values) in env_values {
        if databases.iter().any(|d| d.environment == *environment) {
            continue;
        }

        if let Some(database) = database_from_env_file(project_name, *environment, values) {
            debug!(
                "database `{}` of {} only known from env files",
                database.identifier, environment
            );
            databases.push(database);
        }
    }

    databases
}

fn database_from_env_file(
    project_name: &str,
    environment: Environment,
    values: &BTreeMap<String, String>,
) -> Option<DatabaseResource> {
    if let Some(url) = values.get(TURSO_DATABASE_URL) {
        // turso hosts look like `<database>-<organization>.turso.io`
        let host_label = url::Url::parse(url)
            .ok()?
            .host_str()?
            .split('.')
            .next()?
            .to_string();
        let identifier =
            match naming::environment_resource_name(project_name, environment, &naming::TursoNamingPolicy) {
                Ok(expected) if host_label.starts_with(&expected) => expected,
                _ => host_label,
            };

        return Some(DatabaseResource {
            provider: DatabaseProvider::Turso,
            environment,
            identifier,
            url: Some(url.clone()),
            token: values.get(TURSO_AUTH_TOKEN).cloned(),
        });
    }

    let supabase_url = values
        .get(SUPABASE_URL)
        .or_else(|| values.get(DATABASE_URL))
        .filter(|url| project_ref_from_url(url).is_some())?;

    Some(DatabaseResource {
        provider: DatabaseProvider::Supabase,
        environment,
        identifier: project_ref_from_url(supabase_url)?,
        url: values.get(DATABASE_URL).or(Some(supabase_url)).cloned(),
        token: None,
    })
}

fn discover_storage(
    manifest: Option<&ProvisioningRecord>,
    env_values: &BTreeMap<Environment, BTreeMap<String, String>>,
) -> Vec<StorageResource> {
    if let Some(block) = manifest.and_then(|m| m.storage.as_ref()) {
        return vec![StorageResource {
            provider: block.provider,
            name: block.store_name.clone(),
            id: block.store_id.clone(),
            region: block.region.clone(),
        }];
    }

    let mut storage: Vec<StorageResource> = vec![];
    for values in env_values.values() {
        let found = match (values.get(BLOB_STORE_ID), values.get(S3_BUCKET)) {
            (Some(store_id), _) => StorageResource {
                provider: StorageProvider::VercelBlob,
                name: store_id.clone(),
                id: Some(store_id.clone()),
                region: None,
            },
            (None, Some(bucket)) => StorageResource {
                provider: StorageProvider::S3,
                name: bucket.clone(),
                id: None,
                region: values.get(S3_REGION).cloned(),
            },
            (None, None) => continue,
        };

        if !storage.iter().any(|s| s.provider == found.provider && s.name == found.name) {
            storage.push(found);
        }
    }

    storage
}
