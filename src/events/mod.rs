use crate::errors::{CommandError, ErrorMessageVerbosity};
use crate::models::cleanup::DeletionStepType;
use crate::models::environment::Environment;
use derivative::Derivative;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone)]
/// EngineEvent: represents an event happening in the engine.
pub enum EngineEvent {
    /// Info: represents an info message event.
    Info(EventDetails, EventMessage),
    /// Warning: represents a warning message event.
    Warning(EventDetails, EventMessage),
    /// Error: represents an error event.
    Error(EventDetails, EventMessage),
}

impl EngineEvent {
    /// Returns engine's event details.
    pub fn get_details(&self) -> &EventDetails {
        match self {
            EngineEvent::Info(details, _)
            | EngineEvent::Warning(details, _)
            | EngineEvent::Error(details, _) => details,
        }
    }

    /// Returns engine's event message.
    pub fn message(&self, message_verbosity: EventMessageVerbosity) -> String {
        match self {
            EngineEvent::Info(_, message)
            | EngineEvent::Warning(_, message)
            | EngineEvent::Error(_, message) => message.message(message_verbosity),
        }
    }
}

/// EventMessageVerbosity: represents event message's verbosity from minimal to full verbosity.
pub enum EventMessageVerbosity {
    SafeOnly,
    FullDetailsWithoutEnvVars,
    FullDetails,
}

impl From<EventMessageVerbosity> for ErrorMessageVerbosity {
    fn from(verbosity: EventMessageVerbosity) -> Self {
        match verbosity {
            EventMessageVerbosity::SafeOnly => ErrorMessageVerbosity::SafeOnly,
            EventMessageVerbosity::FullDetailsWithoutEnvVars => ErrorMessageVerbosity::FullDetailsWithoutEnvVars,
            EventMessageVerbosity::FullDetails => ErrorMessageVerbosity::FullDetails,
        }
    }
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
/// EventMessage: represents an event message.
pub struct EventMessage {
    // Message which is known to be safe: doesn't expose any credentials.
    safe_message: String,
    // Raw details, vendor stderr for instance, which may contain tokens.
    full_details: Option<String>,
    #[derivative(Debug = "ignore")]
    env_vars: Option<Vec<(String, String)>>,
}

impl EventMessage {
    pub fn new(safe_message: String, full_details: Option<String>) -> Self {
        EventMessage {
            safe_message,
            full_details,
            env_vars: None,
        }
    }

    pub fn new_from_safe(safe_message: String) -> Self {
        EventMessage::new(safe_message, None)
    }

    /// Returns message for event message.
    ///
    /// Arguments
    ///
    /// * `message_verbosity`: Which verbosity is required for the message.
    pub fn message(&self, message_verbosity: EventMessageVerbosity) -> String {
        match (message_verbosity, &self.full_details) {
            (EventMessageVerbosity::SafeOnly, _) | (_, None) => self.safe_message.to_string(),
            (EventMessageVerbosity::FullDetailsWithoutEnvVars, Some(details)) => {
                format!("{} / Full details: {}", self.safe_message, details)
            }
            (EventMessageVerbosity::FullDetails, Some(details)) => match &self.env_vars {
                None => format!("{} / Full details: {}", self.safe_message, details),
                Some(env_vars) => format!(
                    "{} / Full details: {} / Env vars: {}",
                    self.safe_message,
                    details,
                    env_vars
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect::<Vec<String>>()
                        .join(" "),
                ),
            },
        }
    }
}

impl From<CommandError> for EventMessage {
    fn from(e: CommandError) -> Self {
        EventMessage {
            safe_message: e.message_safe(),
            full_details: e.message_raw(),
            env_vars: e.env_vars(),
        }
    }
}

impl Display for EventMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // only the safe message is ever displayed
        f.write_str(self.message(EventMessageVerbosity::SafeOnly).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Stage: represents an engine event stage, either provisioning or cleanup.
pub enum Stage {
    Provisioning(ProvisioningStep),
    Cleanup(CleanupStep),
}

impl Stage {
    /// Returns stage's sub step name.
    pub fn sub_step_name(&self) -> String {
        match &self {
            Stage::Provisioning(step) => step.to_string(),
            Stage::Cleanup(step) => step.to_string(),
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(match &self {
            Stage::Provisioning(_) => "provisioning",
            Stage::Cleanup(_) => "cleanup",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningStep {
    ValidateRequest,
    WriteEnvFiles,
    PersistManifest,
    Provisioned,
    ProvisionError,
    Skipped,
}

impl Display for ProvisioningStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match &self {
            ProvisioningStep::ValidateRequest => "validate-request",
            ProvisioningStep::WriteEnvFiles => "write-env-files",
            ProvisioningStep::PersistManifest => "persist-manifest",
            ProvisioningStep::Provisioned => "provisioned",
            ProvisioningStep::ProvisionError => "provision-error",
            ProvisioningStep::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupStep {
    Discover,
    Plan,
    /// Delete: a deletion step is running.
    Delete(DeletionStepType),
    /// Deleted: a deletion step succeeded.
    Deleted(DeletionStepType),
    /// DeleteError: a deletion step failed, the run halts.
    DeleteError(DeletionStepType),
    /// Summary: terminal report, emitted whatever the outcome.
    Summary,
}

impl Display for CleanupStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self {
            CleanupStep::Discover => f.write_str("discover"),
            CleanupStep::Plan => f.write_str("plan"),
            CleanupStep::Delete(step_type) => write!(f, "delete-{}", step_type),
            CleanupStep::Deleted(step_type) => write!(f, "deleted-{}", step_type),
            CleanupStep::DeleteError(step_type) => write!(f, "delete-error-{}", step_type),
            CleanupStep::Summary => f.write_str("summary"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// EventDetails: represents an event details, carrying all useful data such as project and stage.
pub struct EventDetails {
    project_name: String,
    stage: Stage,
    environment: Option<Environment>,
    /// Percentage of the run already done, for cleanup steps.
    progress: Option<u8>,
}

impl EventDetails {
    pub fn new(project_name: String, stage: Stage) -> Self {
        EventDetails {
            project_name,
            stage,
            environment: None,
            progress: None,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_progress(mut self, done: usize, total: usize) -> Self {
        self.progress = Some(percentage(done, total));
        self
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn environment(&self) -> Option<Environment> {
        self.environment
    }

    pub fn progress(&self) -> Option<u8> {
        self.progress
    }
}

pub fn percentage(done: usize, total: usize) -> u8 {
    match total {
        0 => 100,
        _ => ((done.min(total) * 100) / total) as u8,
    }
}
