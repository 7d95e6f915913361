//! Sequential execution of a cleanup plan.
//!
//! Steps run one after the other in plan order. The first failure halts the run, nothing is
//! retried nor rolled back: the caller gets manual recovery instructions instead.

use crate::cmd::aws::S3Cli;
use crate::cmd::command::{ProcessVendorCli, VendorCli};
use crate::cmd::supabase::SupabaseCli;
use crate::cmd::turso::TursoCli;
use crate::cmd::vercel::VercelCli;
use crate::config::EngineConfig;
use crate::errors::{CommandError, ErrorMessageVerbosity};
use crate::events::{CleanupStep, EngineEvent, EventDetails, EventMessage, Stage};
use crate::logger::Logger;
use crate::models::cleanup::{
    CleanupPlan, CleanupResult, DeletionStep, DeletionStepResult, DeletionStepType, ManualRecoveryAdvisory,
    RecoveryInstruction, RollbackData,
};
use crate::models::environment::Environment;
use crate::models::provider::{DatabaseProvider, StorageProvider};
use crate::models::record::ProvisioningMode;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// ResourceDeleter: performs the vendor deletion behind one step.
pub trait ResourceDeleter: Send + Sync {
    fn delete(&self, step: &DeletionStep) -> Result<(), CommandError>;
}

/// VendorResourceDeleter: deletes resources through the vendor CLIs.
pub struct VendorResourceDeleter {
    turso: TursoCli,
    supabase: SupabaseCli,
    vercel: VercelCli,
    s3: S3Cli,
}

impl VendorResourceDeleter {
    pub fn new(config: &EngineConfig, project_path: &Path) -> Self {
        VendorResourceDeleter::new_with_cli(
            config,
            project_path,
            Arc::new(ProcessVendorCli::new(config.vendor_timeout)),
        )
    }

    pub fn new_with_cli(config: &EngineConfig, project_path: &Path, cli: Arc<dyn VendorCli>) -> Self {
        let vendors = &config.vendors;
        VendorResourceDeleter {
            turso: TursoCli::new(cli.clone(), vendors.turso_group.clone(), vendors.turso_token.clone()),
            supabase: SupabaseCli::new(cli.clone(), vendors.supabase_token.clone()),
            vercel: VercelCli::new(cli.clone(), project_path, vendors.vercel_token.clone()),
            s3: S3Cli::new(cli, &vendors.aws_region),
        }
    }
}

fn required_parameter<'a>(step: &'a DeletionStep, key: &str) -> Result<&'a str, CommandError> {
    step.parameter(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CommandError::new_from_safe_message(format!("Step `{}` has no `{}` parameter", step.id, key)))
}

fn parsed_parameter<T: FromStr>(step: &DeletionStep, key: &str) -> Result<T, CommandError> {
    let value = required_parameter(step, key)?;
    T::from_str(value).map_err(|_| {
        CommandError::new_from_safe_message(format!("Step `{}` has an invalid `{}`: `{}`", step.id, key, value))
    })
}

impl ResourceDeleter for VendorResourceDeleter {
    fn delete(&self, step: &DeletionStep) -> Result<(), CommandError> {
        match step.step_type {
            DeletionStepType::HostingProject => self.vercel.remove_project(required_parameter(step, "name")?),
            DeletionStepType::Domains => self.vercel.remove_domain(required_parameter(step, "domain")?),
            DeletionStepType::EnvironmentVariables => {
                let environment = parsed_parameter::<Environment>(step, "environment")?;
                for key in required_parameter(step, "keys")?.split(',').filter(|k| !k.is_empty()) {
                    self.vercel.remove_env_var(key, environment)?;
                }
                Ok(())
            }
            DeletionStepType::Database => match parsed_parameter::<DatabaseProvider>(step, "provider")? {
                DatabaseProvider::Turso => self.turso.destroy_database(required_parameter(step, "identifier")?),
                DatabaseProvider::Supabase => self.supabase.delete_project(required_parameter(step, "identifier")?),
            },
            DeletionStepType::StorageStore => match parsed_parameter::<StorageProvider>(step, "provider")? {
                StorageProvider::VercelBlob => self.vercel.remove_blob_store(
                    step.parameter("storeId")
                        .map(Ok)
                        .unwrap_or_else(|| required_parameter(step, "name"))?,
                ),
                StorageProvider::S3 => self.s3.delete_bucket(required_parameter(step, "name")?),
            },
        }
    }
}

/// MockResourceDeleter: pairs with the mock provisioner, whose resources only exist on disk.
#[derive(Clone, Debug, Default)]
pub struct MockResourceDeleter;

impl ResourceDeleter for MockResourceDeleter {
    fn delete(&self, step: &DeletionStep) -> Result<(), CommandError> {
        debug!("mock deletion of `{}`", step.id);
        Ok(())
    }
}

pub fn select_deleter(config: &EngineConfig, project_path: &Path) -> Box<dyn ResourceDeleter> {
    match config.mode {
        ProvisioningMode::Real => Box::new(VendorResourceDeleter::new(config, project_path)),
        ProvisioningMode::Mock => Box::new(MockResourceDeleter),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Running,
    Completed,
    HaltedOnFailure,
}

/// CleanupOrchestrator: runs one plan, once.
pub struct CleanupOrchestrator {
    deleter: Box<dyn ResourceDeleter>,
    logger: Box<dyn Logger>,
    state: OrchestratorState,
}

impl CleanupOrchestrator {
    pub fn new(deleter: Box<dyn ResourceDeleter>, logger: Box<dyn Logger>) -> Self {
        CleanupOrchestrator {
            deleter,
            logger,
            state: OrchestratorState::Idle,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    fn details(&self, project_name: &str, step: CleanupStep) -> EventDetails {
        EventDetails::new(project_name.to_string(), Stage::Cleanup(step))
    }

    pub fn execute(&mut self, plan: CleanupPlan) -> CleanupResult {
        if self.state != OrchestratorState::Idle {
            return CleanupResult::new_failure("This orchestrator already ran a plan".to_string());
        }

        self.state = OrchestratorState::Running;
        let started_at = Instant::now();
        let total = plan.steps.len();
        let mut step_results: Vec<DeletionStepResult> = Vec::with_capacity(total);
        let mut failure: Option<String> = None;

        for (idx, step) in plan.steps.iter().enumerate() {
            let label = format!("{} {}", step.step_type.icon(), step.description);
            self.logger.log(EngineEvent::Info(
                self.details(&plan.project_name, CleanupStep::Delete(step.step_type))
                    .with_progress(idx, total),
                EventMessage::new_from_safe(format!("{} ({}/{})", label, idx + 1, total)),
            ));

            let step_started_at = Instant::now();
            // captured before the resource disappears
            let rollback_data = RollbackData {
                resource_type: step.step_type,
                description: step.description.clone(),
                parameters: step.parameters.clone(),
            };

            match self.deleter.delete(step) {
                Ok(()) => {
                    let duration = step_started_at.elapsed();
                    self.logger.log(EngineEvent::Info(
                        self.details(&plan.project_name, CleanupStep::Deleted(step.step_type))
                            .with_progress(idx + 1, total),
                        EventMessage::new_from_safe(format!("{} done in {}ms", label, duration.as_millis())),
                    ));
                    step_results.push(DeletionStepResult {
                        step_id: step.id.clone(),
                        step_type: step.step_type,
                        success: true,
                        duration,
                        error: None,
                        rollback_data: Some(rollback_data),
                    });
                }
                Err(err) => {
                    let message = err.message(ErrorMessageVerbosity::FullDetailsWithoutEnvVars);
                    self.logger.log(EngineEvent::Error(
                        self.details(&plan.project_name, CleanupStep::DeleteError(step.step_type))
                            .with_progress(idx, total),
                        EventMessage::from(err),
                    ));
                    step_results.push(DeletionStepResult {
                        step_id: step.id.clone(),
                        step_type: step.step_type,
                        success: false,
                        duration: step_started_at.elapsed(),
                        error: Some(message),
                        rollback_data: None,
                    });
                    failure = Some(format!("Step {} (`{}`) failed", step.order, step.id));
                    break;
                }
            }
        }

        let completed_steps = step_results.iter().filter(|r| r.success).count();
        let failed_steps = step_results.len() - completed_steps;
        let recovery_advisory = match failure.is_some() {
            true => Some(recovery_advisory(&step_results)),
            false => None,
        };
        self.state = match failure {
            Some(_) => OrchestratorState::HaltedOnFailure,
            None => OrchestratorState::Completed,
        };

        let result = CleanupResult {
            success: failure.is_none(),
            completed_steps,
            failed_steps,
            rollback_performed: recovery_advisory
                .as_ref()
                .map(|a| !a.instructions.is_empty())
                .unwrap_or(false),
            recovery_advisory,
            step_results,
            total_duration: started_at.elapsed(),
            error: failure,
        };
        self.log_summary(&plan, &result);

        result
    }

    fn log_summary(&self, plan: &CleanupPlan, result: &CleanupResult) {
        let details = self
            .details(&plan.project_name, CleanupStep::Summary)
            .with_progress(result.step_results.len(), plan.steps.len());
        let message = format!(
            "Cleanup {}: {} step(s) completed, {} failed, {} skipped, took {}",
            if result.success { "completed" } else { "halted" },
            result.completed_steps,
            result.failed_steps,
            plan.steps.len() - result.step_results.len(),
            format_duration(result.total_duration),
        );

        self.logger.log(match result.success {
            true => EngineEvent::Info(details, EventMessage::new_from_safe(message)),
            false => EngineEvent::Warning(details, EventMessage::new_from_safe(message)),
        });

        if let Some(advisory) = &result.recovery_advisory {
            for instruction in &advisory.instructions {
                self.logger.log(EngineEvent::Warning(
                    self.details(&plan.project_name, CleanupStep::Summary),
                    EventMessage::new_from_safe(format!("To recover `{}`: {}", instruction.step_id, instruction.instruction)),
                ));
            }
        }
    }
}

fn format_duration(duration: Duration) -> String {
    format!("{}.{:03}s", duration.as_secs(), duration.subsec_millis())
}

/// Instructions to manually recreate what successful steps deleted, in deletion order.
pub fn recovery_advisory(step_results: &[DeletionStepResult]) -> ManualRecoveryAdvisory {
    ManualRecoveryAdvisory {
        instructions: step_results
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| {
                let data = r.rollback_data.as_ref()?;
                Some(RecoveryInstruction {
                    step_id: r.step_id.clone(),
                    resource_type: data.resource_type,
                    instruction: recovery_instruction(data),
                })
            })
            .collect(),
    }
}

fn recovery_instruction(data: &RollbackData) -> String {
    let param = |key: &str| data.parameters.get(key).map(|v| v.as_str()).unwrap_or("?");

    match data.resource_type {
        DeletionStepType::HostingProject => format!(
            "Recreate the {} project `{}`, link it again with `vercel link` and restore its environment variables.",
            param("provider"),
            param("name")
        ),
        DeletionStepType::Domains => format!(
            "Add the domain `{}` back to the hosting project and check its DNS records.",
            param("domain")
        ),
        DeletionStepType::EnvironmentVariables => format!(
            "Add {} back to the {} hosting environment, values are still in the local env files.",
            param("keys"),
            param("environment")
        ),
        DeletionStepType::Database => format!(
            "Recreate the {} {} database `{}`, restore it from your backup and update its credentials in the env files.",
            param("environment"),
            param("provider"),
            param("identifier")
        ),
        DeletionStepType::StorageStore => format!(
            "Recreate the {} store `{}` and upload its objects again from your backup.",
            param("provider"),
            param("name")
        ),
    }
}
