//! Entry points of the engine. Both of them always return a structured result: errors and
//! panics are turned into a failed outcome, never propagated to the caller.

use crate::config::EngineConfig;
use crate::discovery;
use crate::env_file;
use crate::errors::{CleanupError, ProvisioningError};
use crate::events::{CleanupStep, EngineEvent, EventDetails, EventMessage, ProvisioningStep, Stage};
use crate::logger::{Logger, StdIoLogger};
use crate::manifest;
use crate::models::cleanup::{CleanupResult, ResourceSelection};
use crate::models::environment::Environment;
use crate::models::record::ProvisioningRecord;
use crate::orchestrator::{CleanupOrchestrator, ResourceDeleter, select_deleter};
use crate::planner;
use crate::provisioner::{ProvisioningRequest, Provisioner, select_provisioner};
use serde_derive::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedDatabase {
    pub environment: Environment,
    pub name: String,
    pub url: String,
}

/// ProvisioningResult: outcome of `provision_project`, also describing what was kept from a
/// partially failed run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningResult {
    pub success: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<BTreeMap<Environment, BTreeMap<String, String>>>,
    pub databases: Vec<ProvisionedDatabase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub env_files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<PathBuf>,
}

impl ProvisioningResult {
    fn skipped() -> Self {
        ProvisioningResult {
            success: true,
            skipped: true,
            ..Default::default()
        }
    }

    fn failure(error: String) -> Self {
        ProvisioningResult {
            error: Some(error),
            ..Default::default()
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Provisions the resources of `request` with the provisioner selected by `config`.
/// This is a blocking call. It can be made from within a tokio runtime, the calling thread is then
/// blocked until provisioning settles.
pub fn provision_project(config: &EngineConfig, request: &ProvisioningRequest) -> ProvisioningResult {
    let logger = StdIoLogger::new();
    if !config.auto_provision {
        logger.log(EngineEvent::Info(
            EventDetails::new(request.project_name.clone(), Stage::Provisioning(ProvisioningStep::Skipped)),
            EventMessage::new_from_safe("Automatic provisioning is disabled, nothing created".to_string()),
        ));
        return ProvisioningResult::skipped();
    }

    provision_project_with(select_provisioner(config).as_ref(), request, &logger)
}

pub fn provision_project_with(
    provisioner: &dyn Provisioner,
    request: &ProvisioningRequest,
    logger: &dyn Logger,
) -> ProvisioningResult {
    let started_at = Instant::now();
    let _terminated = scopeguard::guard((), |_| {
        info!(
            "provisioning of `{}` terminated after {}ms",
            request.project_name,
            started_at.elapsed().as_millis()
        );
    });
    let details = |step: ProvisioningStep| EventDetails::new(request.project_name.clone(), Stage::Provisioning(step));
    logger.log(EngineEvent::Info(
        details(ProvisioningStep::ValidateRequest),
        EventMessage::new_from_safe(format!(
            "Provisioning `{}` in {} mode",
            request.project_name,
            provisioner.mode()
        )),
    ));

    let outcome = catch_unwind(AssertUnwindSafe(|| provisioner.provision(request)))
        .unwrap_or_else(|payload| Err(ProvisioningError::Internal(panic_message(payload))));

    let (record, failure) = match outcome {
        Ok(record) => (Some(record), None),
        Err(err) => {
            let message = err.to_string();
            let failed_environments = err.failed_environments();
            logger.log(EngineEvent::Error(
                details(ProvisioningStep::ProvisionError),
                EventMessage::new(message.clone(), provisioning_error_details(&err)),
            ));
            match err {
                ProvisioningError::EnvironmentsFailed { partial_record, .. }
                | ProvisioningError::PartiallyProvisioned { partial_record, .. } => {
                    (Some(*partial_record), Some((message, failed_environments)))
                }
                _ => (None, Some((message, failed_environments))),
            }
        }
    };

    let record = match record {
        Some(record) => record,
        None => return ProvisioningResult::failure(failure.map(|(message, _)| message).unwrap_or_default()),
    };
    let failed_environments = failure.as_ref().map(|(_, envs)| envs.clone()).unwrap_or_default();

    let mut result = ProvisioningResult {
        success: failure.is_none(),
        error: failure.map(|(message, _)| message),
        ..Default::default()
    };
    if let Err(err) = persist(request, &record, &failed_environments, &mut result, logger) {
        logger.log(EngineEvent::Error(
            details(ProvisioningStep::ProvisionError),
            EventMessage::new_from_safe(err.to_string()),
        ));
        result.success = false;
        result.error = Some(match result.error {
            Some(previous) => format!("{}; {}", previous, err),
            None => err.to_string(),
        });
    }

    if result.success {
        logger.log(EngineEvent::Info(
            details(ProvisioningStep::Provisioned),
            EventMessage::new_from_safe(format!(
                "`{}` provisioned, {} database(s)",
                request.project_name,
                result.databases.len()
            )),
        ));
    }

    result
}

fn provisioning_error_details(err: &ProvisioningError) -> Option<String> {
    match err {
        ProvisioningError::EnvironmentsFailed { causes, .. } => Some(
            causes
                .iter()
                .map(|(environment, cause)| format!("{}: {}", environment, cause))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        ProvisioningError::Vendor { error, .. } | ProvisioningError::CredentialsNotCaptured { error, .. } => {
            error.message_raw()
        }
        ProvisioningError::PartiallyProvisioned { error, .. } => provisioning_error_details(error),
        _ => None,
    }
}

/// Writes the env files of every environment which didn't fail, then the manifest. An environment
/// whose database wasn't reached still gets the project wide storage keys.
fn persist(
    request: &ProvisioningRequest,
    record: &ProvisioningRecord,
    failed_environments: &[Environment],
    result: &mut ProvisioningResult,
    logger: &dyn Logger,
) -> Result<(), ProvisioningError> {
    let mut credentials = BTreeMap::new();

    for environment in &request.environments {
        if failed_environments.contains(environment) {
            continue;
        }

        let values = record.credentials_for(*environment);
        if values.is_empty() {
            continue;
        }

        for file in environment.env_files() {
            let path = request.project_path.join(file);
            env_file::merge(&path, &values).map_err(|e| ProvisioningError::Persistence(e.to_string()))?;
            result.env_files.push(path);
        }
        logger.log(EngineEvent::Info(
            EventDetails::new(
                request.project_name.clone(),
                Stage::Provisioning(ProvisioningStep::WriteEnvFiles),
            )
            .with_environment(*environment),
            EventMessage::new_from_safe(format!(
                "{} credential(s) written to {}",
                values.len(),
                environment.env_files().join(", ")
            )),
        ));
        credentials.insert(*environment, values);
    }

    result.databases = record
        .database_records()
        .iter()
        .map(|r| ProvisionedDatabase {
            environment: r.environment,
            name: r.name.clone(),
            url: r.url.clone(),
        })
        .collect();
    result.credentials = match credentials.is_empty() {
        true => None,
        false => Some(credentials),
    };

    let manifest_path =
        manifest::write(&request.project_path, record).map_err(|e| ProvisioningError::Persistence(e.to_string()))?;
    logger.log(EngineEvent::Info(
        EventDetails::new(
            request.project_name.clone(),
            Stage::Provisioning(ProvisioningStep::PersistManifest),
        ),
        EventMessage::new_from_safe(format!("Provisioning record written to `{}`", manifest_path.display())),
    ));
    result.manifest_path = Some(manifest_path);

    Ok(())
}

/// Discovers, plans and deletes the resources of `project_path` matching `selection`.
pub fn cleanup_project(config: &EngineConfig, project_path: &Path, selection: &ResourceSelection) -> CleanupResult {
    cleanup_project_with(
        select_deleter(config, project_path),
        Box::new(StdIoLogger::new()),
        project_path,
        selection,
    )
}

pub fn cleanup_project_with(
    deleter: Box<dyn ResourceDeleter>,
    logger: Box<dyn Logger>,
    project_path: &Path,
    selection: &ResourceSelection,
) -> CleanupResult {
    let project_name = project_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let started_at = Instant::now();
    let _terminated = scopeguard::guard((), |_| {
        info!(
            "cleanup of `{}` terminated after {}ms",
            project_path.display(),
            started_at.elapsed().as_millis()
        );
    });

    catch_unwind(AssertUnwindSafe(|| {
        let inventory = match discovery::discover(project_path) {
            Ok(inventory) => inventory,
            Err(err) => return failed_cleanup(logger.as_ref(), &project_name, CleanupError::from(err)),
        };
        let details = |step: CleanupStep| EventDetails::new(inventory.project_name().to_string(), Stage::Cleanup(step));

        if inventory.is_empty() {
            logger.log(EngineEvent::Info(
                details(CleanupStep::Discover),
                EventMessage::new_from_safe("No resource found, nothing to clean up".to_string()),
            ));
            return CleanupResult::nothing_to_clean_up();
        }
        logger.log(EngineEvent::Info(
            details(CleanupStep::Discover),
            EventMessage::new_from_safe(format!("{} resource(s) found", inventory.resources().len())),
        ));

        let plan = match planner::build_plan(&inventory, selection) {
            Ok(plan) => plan,
            Err(err) => return failed_cleanup(logger.as_ref(), inventory.project_name(), CleanupError::from(err)),
        };
        logger.log(EngineEvent::Info(
            details(CleanupStep::Plan),
            EventMessage::new_from_safe(format!(
                "{} deletion step(s), risk {}, {} backup(s) recommended",
                plan.steps.len(),
                plan.risk_level,
                plan.backup_plan.required().count()
            )),
        ));

        CleanupOrchestrator::new(deleter, logger.clone_dyn()).execute(plan)
    }))
    .unwrap_or_else(|payload| CleanupResult::new_failure(format!("Cleanup crashed: {}", panic_message(payload))))
}

fn failed_cleanup(logger: &dyn Logger, project_name: &str, err: CleanupError) -> CleanupResult {
    logger.log(EngineEvent::Error(
        EventDetails::new(project_name.to_string(), Stage::Cleanup(CleanupStep::Summary)),
        EventMessage::new_from_safe(err.to_string()),
    ));

    CleanupResult::new_failure(err.to_string())
}
