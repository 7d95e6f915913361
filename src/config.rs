use crate::constants::{
    AUTO_PROVISION, AWS_DEFAULT_REGION, RESOURCE_ENGINE_MODE, SUPABASE_ORG_ID, SUPABASE_REGION, TURSO_GROUP,
    VENDOR_TIMEOUT_SECONDS, VERCEL_TOKEN,
};
use crate::models::record::ProvisioningMode;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_VENDOR_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DEFAULT_AWS_REGION: &str = "us-east-1";
const DEFAULT_SUPABASE_REGION: &str = "us-east-1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value `{value}` for `{key}`: {reason}")]
    InvalidValue { key: String, value: String, reason: String },
    #[error("`{0}` is required by the selected providers but is not set.")]
    Missing(String),
}

/// Vendor account settings the real provisioner needs. Tokens stay out of `Debug`.
#[derive(derivative::Derivative, Clone, Default, PartialEq, Eq)]
#[derivative(Debug)]
pub struct VendorSettings {
    pub turso_group: Option<String>,
    pub supabase_org_id: Option<String>,
    pub supabase_region: String,
    pub aws_region: String,
    #[derivative(Debug = "ignore")]
    pub vercel_token: Option<String>,
    #[derivative(Debug = "ignore")]
    pub turso_token: Option<String>,
    #[derivative(Debug = "ignore")]
    pub supabase_token: Option<String>,
}

/// EngineConfig: every knob of the engine, threaded explicitly through the entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub mode: ProvisioningMode,
    /// When false, provisioning is skipped and reported as such.
    pub auto_provision: bool,
    pub vendor_timeout: Duration,
    pub vendors: VendorSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            mode: ProvisioningMode::Real,
            auto_provision: true,
            vendor_timeout: DEFAULT_VENDOR_TIMEOUT,
            vendors: VendorSettings {
                supabase_region: DEFAULT_SUPABASE_REGION.to_string(),
                aws_region: DEFAULT_AWS_REGION.to_string(),
                ..VendorSettings::default()
            },
        }
    }
}

impl EngineConfig {
    pub fn new(mode: ProvisioningMode) -> Self {
        EngineConfig {
            mode,
            ..EngineConfig::default()
        }
    }

    pub fn mock() -> Self {
        EngineConfig::new(ProvisioningMode::Mock)
    }

    pub fn with_auto_provision(mut self, auto_provision: bool) -> Self {
        self.auto_provision = auto_provision;
        self
    }

    pub fn with_vendor_timeout(mut self, vendor_timeout: Duration) -> Self {
        self.vendor_timeout = vendor_timeout;
        self
    }

    /// Builds the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Builds the configuration from a set of variables, unknown ones being ignored.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = EngineConfig::default();

        if let Some(mode) = get(RESOURCE_ENGINE_MODE) {
            config.mode = match mode.to_lowercase().as_str() {
                "real" => ProvisioningMode::Real,
                "mock" => ProvisioningMode::Mock,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: RESOURCE_ENGINE_MODE.to_string(),
                        value: mode,
                        reason: "expected `real` or `mock`".to_string(),
                    });
                }
            };
        }

        if let Some(auto_provision) = get(AUTO_PROVISION) {
            config.auto_provision = parse_bool(AUTO_PROVISION, &auto_provision)?;
        }

        if let Some(timeout) = get(VENDOR_TIMEOUT_SECONDS) {
            let seconds = timeout.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: VENDOR_TIMEOUT_SECONDS.to_string(),
                value: timeout.clone(),
                reason: e.to_string(),
            })?;
            config.vendor_timeout = Duration::from_secs(seconds);
        }

        config.vendors.turso_group = get(TURSO_GROUP);
        config.vendors.supabase_org_id = get(SUPABASE_ORG_ID);
        if let Some(region) = get(SUPABASE_REGION) {
            config.vendors.supabase_region = region;
        }
        if let Some(region) = get(AWS_DEFAULT_REGION) {
            config.vendors.aws_region = region;
        }
        config.vendors.vercel_token = get(VERCEL_TOKEN);
        config.vendors.turso_token = get(crate::cmd::turso::TURSO_API_TOKEN);
        config.vendors.supabase_token = get(crate::cmd::supabase::SUPABASE_ACCESS_TOKEN);

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
