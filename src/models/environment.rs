use serde_derive::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use strum_macros::EnumIter;

/// Environment: one of the three fixed deployment tiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter)]
pub enum Environment {
    #[serde(rename = "dev")]
    Development,
    #[serde(rename = "staging")]
    Staging,
    #[serde(rename = "prod")]
    Production,
}

impl Environment {
    /// Suffix appended to per-environment resource names.
    pub fn name_suffix(&self) -> &'static str {
        match self {
            Environment::Development => "-dev",
            Environment::Staging => "-stg",
            Environment::Production => "-prod",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Env files receiving this environment's credentials, relative to the project root.
    /// The first file is the one discovery reads back.
    pub fn env_files(&self) -> &'static [&'static str] {
        match self {
            Environment::Development => &[".env.local", ".env.development"],
            Environment::Staging => &[".env.staging"],
            Environment::Production => &[".env.production"],
        }
    }

    /// Target name used by the hosting provider for its environment variables.
    pub fn hosting_target(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "preview",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "stg" | "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(format!("`{}` is not a known environment", s)),
        }
    }
}
