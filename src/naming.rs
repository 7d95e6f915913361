//! Per environment resource naming.
//!
//! A base name is derived once from the project name, then each provider's
//! [`NamingPolicy`] validates the suffixed names before any creation call is issued.

use crate::errors::ValidationError;
use crate::models::environment::Environment;
use crate::models::provider::{DatabaseProvider, HostingProvider, StorageProvider};
use once_cell::sync::Lazy;
use regex::Regex;

const NAME_PREFIX: &str = "app-";
const DEFAULT_BASE_NAME: &str = "app";
// "-prod"
const LONGEST_SUFFIX_LEN: usize = 5;

static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("invalid naming regex"));

/// NamingPolicy: length and charset constraints a vendor puts on resource names.
pub trait NamingPolicy: Send + Sync {
    fn provider_name(&self) -> &str;
    fn min_length(&self) -> usize {
        1
    }
    fn max_length(&self) -> usize;
    fn is_allowed_char(&self, c: char) -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
    }

    fn validate(&self, name: &str) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidResourceName {
            provider: self.provider_name().to_string(),
            name: name.to_string(),
            reason,
        };

        if name.len() < self.min_length() {
            return Err(invalid(format!("must be at least {} characters long", self.min_length())));
        }
        if name.len() > self.max_length() {
            return Err(invalid(format!("must be at most {} characters long", self.max_length())));
        }
        if let Some(c) = name.chars().find(|c| !self.is_allowed_char(*c)) {
            return Err(invalid(format!("character `{}` is not allowed", c)));
        }
        if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
            return Err(invalid("must start with a lowercase letter".to_string()));
        }
        if name.ends_with('-') {
            return Err(invalid("must not end with an hyphen".to_string()));
        }

        Ok(())
    }
}

pub struct TursoNamingPolicy;

impl NamingPolicy for TursoNamingPolicy {
    fn provider_name(&self) -> &str {
        "Turso"
    }

    fn max_length(&self) -> usize {
        32
    }
}

pub struct SupabaseNamingPolicy;

impl NamingPolicy for SupabaseNamingPolicy {
    fn provider_name(&self) -> &str {
        "Supabase"
    }

    fn max_length(&self) -> usize {
        64
    }
}

pub struct VercelBlobNamingPolicy;

impl NamingPolicy for VercelBlobNamingPolicy {
    fn provider_name(&self) -> &str {
        "Vercel Blob"
    }

    fn max_length(&self) -> usize {
        32
    }
}

pub struct S3NamingPolicy;

impl NamingPolicy for S3NamingPolicy {
    fn provider_name(&self) -> &str {
        "AWS S3"
    }

    fn min_length(&self) -> usize {
        3
    }

    fn max_length(&self) -> usize {
        63
    }
}

pub struct VercelProjectNamingPolicy;

impl NamingPolicy for VercelProjectNamingPolicy {
    fn provider_name(&self) -> &str {
        "Vercel"
    }

    fn max_length(&self) -> usize {
        100
    }

    fn is_allowed_char(&self, c: char) -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.')
    }
}

pub fn database_policy(provider: DatabaseProvider) -> &'static dyn NamingPolicy {
    match provider {
        DatabaseProvider::Turso => &TursoNamingPolicy,
        DatabaseProvider::Supabase => &SupabaseNamingPolicy,
    }
}

pub fn storage_policy(provider: StorageProvider) -> &'static dyn NamingPolicy {
    match provider {
        StorageProvider::VercelBlob => &VercelBlobNamingPolicy,
        StorageProvider::S3 => &S3NamingPolicy,
    }
}

pub fn hosting_policy(provider: HostingProvider) -> &'static dyn NamingPolicy {
    match provider {
        HostingProvider::Vercel => &VercelProjectNamingPolicy,
    }
}

/// Derives the deterministic base name of a project: lower-cased, non alphanumeric runs
/// collapsed to one hyphen, forced to start with a letter and truncated to `max_length`
/// minus the room an environment suffix needs.
pub fn base_name(project_name: &str, max_length: usize) -> Result<String, ValidationError> {
    let lowered = project_name.to_lowercase();
    let collapsed = NON_ALPHANUMERIC.replace_all(&lowered, "-");
    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() && !project_name.is_empty() {
        return Err(ValidationError::InvalidProjectName(project_name.to_string()));
    }

    let mut name = match trimmed {
        "" => DEFAULT_BASE_NAME.to_string(),
        t if t.starts_with(|c: char| c.is_ascii_lowercase()) => t.to_string(),
        t => format!("{}{}", NAME_PREFIX, t),
    };

    let budget = max_length.saturating_sub(LONGEST_SUFFIX_LEN);
    if name.len() > budget {
        // only ascii is left at this point, byte truncation is safe
        name.truncate(budget);
        name = name.trim_end_matches('-').to_string();
    }

    Ok(name)
}

/// Name of the resource of `environment`, validated against `policy`.
pub fn environment_resource_name(
    project_name: &str,
    environment: Environment,
    policy: &dyn NamingPolicy,
) -> Result<String, ValidationError> {
    let name = format!(
        "{}{}",
        base_name(project_name, policy.max_length())?,
        environment.name_suffix()
    );
    policy.validate(&name)?;

    Ok(name)
}

/// Name of a project wide resource, validated against `policy`.
pub fn project_resource_name(project_name: &str, policy: &dyn NamingPolicy) -> Result<String, ValidationError> {
    let name = base_name(project_name, policy.max_length())?;
    policy.validate(&name)?;

    Ok(name)
}
