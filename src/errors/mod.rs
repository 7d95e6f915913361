extern crate derivative;

use crate::models::cleanup::{DeletionStepType, EnvironmentScope};
use crate::models::environment::Environment;
use crate::models::record::{DatabaseRecord, ProvisioningRecord};
use derivative::Derivative;
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use std::io::Error;
use std::path::PathBuf;
use thiserror::Error;

/// ErrorMessageVerbosity: represents command error message's verbosity from minimal to full verbosity.
pub enum ErrorMessageVerbosity {
    SafeOnly,
    FullDetailsWithoutEnvVars,
    FullDetails,
}

/// CommandError: vendor command error, mostly returned by third party CLIs.
#[derive(Derivative, Clone, Error, PartialEq)]
#[derivative(Debug)]
pub struct CommandError {
    /// full_details: full error message, can contains unsafe text such as passwords and tokens.
    full_details: Option<String>,
    /// message_safe: error message omitting displaying any protected data such as passwords and tokens.
    message_safe: String,
    /// stderr: raw stderr of the vendor command, kept for diagnostics.
    stderr: Option<String>,
    /// env_vars: environments variables including touchy data such as vendor tokens.
    /// env_vars field is ignored from any wild Debug printing because of it touchy data it carries.
    #[derivative(Debug = "ignore")]
    env_vars: Option<Vec<(String, String)>>,
}

impl CommandError {
    /// Returns CommandError message_raw. May contains unsafe text such as passwords and tokens.
    pub fn message_raw(&self) -> Option<String> {
        self.full_details.clone()
    }

    /// Returns CommandError message_safe omitting all unsafe text such as passwords and tokens.
    pub fn message_safe(&self) -> String {
        self.message_safe.to_string()
    }

    /// Returns the raw stderr of the failing command, if any.
    pub fn stderr(&self) -> Option<&str> {
        self.stderr.as_deref()
    }

    /// Returns CommandError env_vars.
    pub fn env_vars(&self) -> Option<Vec<(String, String)>> {
        self.env_vars.clone()
    }

    /// Returns error message based on verbosity.
    pub fn message(&self, message_verbosity: ErrorMessageVerbosity) -> String {
        match message_verbosity {
            ErrorMessageVerbosity::SafeOnly => self.message_safe.to_string(),
            ErrorMessageVerbosity::FullDetailsWithoutEnvVars => match &self.full_details {
                None => self.message(ErrorMessageVerbosity::SafeOnly),
                Some(full_details) => format!("{} / Full details: {}", self.message_safe, full_details),
            },
            ErrorMessageVerbosity::FullDetails => match &self.full_details {
                None => self.message(ErrorMessageVerbosity::SafeOnly),
                Some(full_details) => match &self.env_vars {
                    None => format!("{} / Full details: {}", self.message_safe, full_details),
                    Some(env_vars) => format!(
                        "{} / Full details: {} / Env vars: {}",
                        self.message_safe,
                        full_details,
                        env_vars.iter().map(|(k, v)| format!("{}={}", k, v)).join(" "),
                    ),
                },
            },
        }
    }

    /// Creates a new CommandError from safe message. To be used when message is safe.
    pub fn new_from_safe_message(message: String) -> Self {
        CommandError::new(message, None, None)
    }

    /// Creates a new CommandError having both a safe, an unsafe message and env vars.
    pub fn new(message_safe: String, message_raw: Option<String>, env_vars: Option<Vec<(String, String)>>) -> Self {
        CommandError {
            full_details: message_raw,
            message_safe,
            stderr: None,
            env_vars,
        }
    }

    /// Create a new CommandError from a vendor command line, attaching its raw output.
    pub fn new_from_command_line(
        message: String,
        bin: String,
        cmd_args: Vec<String>,
        envs: Vec<(String, String)>,
        stdout: Option<String>,
        stderr: Option<String>,
    ) -> Self {
        let mut unsafe_message = format!("{}\ncommand: {} {}", message, bin, cmd_args.join(" "));

        if let Some(txt) = &stdout {
            unsafe_message = format!("{}\nSTDOUT {}", unsafe_message, txt);
        }
        if let Some(txt) = &stderr {
            unsafe_message = format!("{}\nSTDERR {}", unsafe_message, txt);
        }

        CommandError {
            full_details: Some(unsafe_message),
            message_safe: message,
            stderr,
            env_vars: Some(envs),
        }
    }
}

impl Default for CommandError {
    fn default() -> Self {
        Self {
            full_details: None,
            message_safe: "Unknown command error".to_string(),
            stderr: None,
            env_vars: None,
        }
    }
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message(ErrorMessageVerbosity::SafeOnly).as_str()) // By default, expose safe message only
    }
}

impl From<Error> for CommandError {
    fn from(err: Error) -> Self {
        CommandError::new("IO error".to_string(), Some(err.to_string()), None)
    }
}

/// ValidationError: local, never retried, raised before any vendor call.
#[derive(Clone, Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid {provider} resource name `{name}`: {reason}.")]
    InvalidResourceName {
        provider: String,
        name: String,
        reason: String,
    },
    #[error("Project name `{0}` doesn't contain any usable character.")]
    InvalidProjectName(String),
    #[error("A database was requested without any environment.")]
    EmptyEnvironmentSet,
    #[error("Environment `{0}` is requested more than once.")]
    DuplicateEnvironment(Environment),
    #[error("Database record for environment `{0}` has an empty url.")]
    EmptyDatabaseUrl(Environment),
    #[error("No resource type selected for cleanup.")]
    EmptySelection,
    #[error("Resource type `{0}` is not present in the project inventory.")]
    ResourceTypeNotInInventory(DeletionStepType),
    #[error("Resource type `{resource_type}` is project wide and cannot be cleaned up with scope `{scope}`.")]
    ResourceTypeNotInScope {
        resource_type: DeletionStepType,
        scope: EnvironmentScope,
    },
}

/// ProvisioningError: wraps one or more vendor failures during creation.
#[derive(Clone, Error, Debug)]
pub enum ProvisioningError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Configuration error: {0}")]
    Configuration(#[from] crate::config::ConfigError),
    #[error("Cannot provision {resource}{}: {error}", .environment.as_ref().map(|e| format!(" for `{}`", e)).unwrap_or_default())]
    Vendor {
        resource: String,
        environment: Option<Environment>,
        error: CommandError,
    },
    #[error("{resource} `{identifier}` was created for `{environment}` but its credentials couldn't be captured: {error}")]
    CredentialsNotCaptured {
        resource: String,
        environment: Environment,
        name: String,
        identifier: String,
        error: CommandError,
    },
    #[error("Database `{}` was created but its credentials couldn't be published: {error}", .database.name)]
    CredentialsNotPublished {
        database: Box<DatabaseRecord>,
        error: Box<ProvisioningError>,
    },
    #[error("{error} (resources created before the failure are kept)")]
    PartiallyProvisioned {
        error: Box<ProvisioningError>,
        partial_record: Box<ProvisioningRecord>,
    },
    #[error("Provisioning failed for environment(s): {}", .failed_environments.iter().join(", "))]
    EnvironmentsFailed {
        failed_environments: Vec<Environment>,
        causes: Vec<(Environment, Box<ProvisioningError>)>,
        /// Record of what was created before and besides the failing environments. Not rolled back.
        partial_record: Box<ProvisioningRecord>,
    },
    #[error("Cannot persist provisioning output: {0}")]
    Persistence(String),
    #[error("Internal provisioning error: {0}")]
    Internal(String),
}

impl ProvisioningError {
    /// Environments named by this error, empty when the failure isn't environment specific.
    pub fn failed_environments(&self) -> Vec<Environment> {
        match self {
            ProvisioningError::EnvironmentsFailed {
                failed_environments, ..
            } => failed_environments.clone(),
            ProvisioningError::Vendor {
                environment: Some(env), ..
            } => vec![*env],
            ProvisioningError::CredentialsNotCaptured { environment, .. } => vec![*environment],
            ProvisioningError::CredentialsNotPublished { database, .. } => vec![database.environment],
            ProvisioningError::PartiallyProvisioned { error, .. } => error.failed_environments(),
            _ => vec![],
        }
    }
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Cannot read or write manifest `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Error,
    },
    #[error("Manifest `{path}` is not a valid provisioning record: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Project path `{0}` doesn't exist or is not a directory.")]
    InvalidProjectPath(PathBuf),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("Hosting link `{path}` is not valid: {raw_error_message}")]
    InvalidHostingLink { path: PathBuf, raw_error_message: String },
    #[error(transparent)]
    EnvFile(#[from] crate::env_file::EnvFileError),
}

#[derive(Error, Debug)]
pub enum CleanupError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_hides_env_vars_from_debug() {
        let err = CommandError::new_from_command_line(
            "Cannot destroy database".to_string(),
            "turso".to_string(),
            vec!["db".to_string(), "destroy".to_string()],
            vec![("TURSO_API_TOKEN".to_string(), "super-secret".to_string())],
            None,
            Some("database not found".to_string()),
        );

        assert!(!format!("{:?}", err).contains("super-secret"));
        assert_eq!(err.to_string(), "Cannot destroy database");
        assert_eq!(err.stderr(), Some("database not found"));
        assert!(err.message(ErrorMessageVerbosity::FullDetails).contains("super-secret"));
        assert!(
            !err.message(ErrorMessageVerbosity::FullDetailsWithoutEnvVars)
                .contains("super-secret")
        );
    }

    #[test]
    fn test_environments_failed_message_names_environments() {
        let err = ProvisioningError::EnvironmentsFailed {
            failed_environments: vec![Environment::Staging, Environment::Production],
            causes: vec![],
            partial_record: Box::new(ProvisioningRecord::new(
                crate::models::record::ProvisioningMode::Mock,
                "app".to_string(),
            )),
        };

        assert_eq!(err.to_string(), "Provisioning failed for environment(s): staging, production");
        assert_eq!(
            err.failed_environments(),
            vec![Environment::Staging, Environment::Production]
        );
    }

    #[test]
    fn test_partially_provisioned_keeps_the_cause() {
        let err = ProvisioningError::PartiallyProvisioned {
            error: Box::new(ProvisioningError::Vendor {
                resource: "Vercel project".to_string(),
                environment: None,
                error: CommandError::new_from_safe_message("project limit reached".to_string()),
            }),
            partial_record: Box::new(ProvisioningRecord::new(
                crate::models::record::ProvisioningMode::Mock,
                "app".to_string(),
            )),
        };

        assert!(err.to_string().starts_with("Cannot provision Vercel project: project limit reached"));
        assert!(err.failed_environments().is_empty());
    }
}
