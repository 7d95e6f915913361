use crate::cmd::command::{VendorCli, VendorInvocation};
use crate::cmd::structs::VercelProjectLink;
use crate::constants::VERCEL_PROJECT_LINK;
use crate::errors::CommandError;
use crate::models::environment::Environment;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const VERCEL_BINARY: &str = "vercel";
const VERCEL_TOKEN: &str = "VERCEL_TOKEN";

static BLOB_STORE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"store_[A-Za-z0-9]+").expect("invalid store id regex"));
static BLOB_RW_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"vercel_blob_rw_[A-Za-z0-9_]+").expect("invalid blob token regex"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobStore {
    pub id: String,
    pub token: Option<String>,
}

/// Vercel projects, env vars, domains and blob stores, driven through the `vercel` CLI.
/// Every call runs from the project directory so the CLI picks up its `.vercel` link.
#[derive(Clone)]
pub struct VercelCli {
    cli: Arc<dyn VendorCli>,
    project_path: PathBuf,
    token: Option<String>,
}

impl VercelCli {
    pub fn new(cli: Arc<dyn VendorCli>, project_path: &Path, token: Option<String>) -> Self {
        VercelCli {
            cli,
            project_path: project_path.to_path_buf(),
            token,
        }
    }

    fn invocation(&self, args: &[&str]) -> VendorInvocation {
        VendorInvocation::new(VERCEL_BINARY, args)
            .with_cwd(&self.project_path)
            .with_token(VERCEL_TOKEN, self.token.as_deref())
    }

    pub fn create_blob_store(&self, name: &str) -> Result<BlobStore, CommandError> {
        info!("creating Vercel Blob store `{}`", name);
        let output = self.cli.run(&self.invocation(&["blob", "store", "add", name]))?;
        let text = format!("{}\n{}", output.stdout, output.stderr);

        let id = BLOB_STORE_ID
            .find(&text)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                CommandError::new(
                    format!("Cannot find id of Vercel Blob store `{}` in CLI output", name),
                    Some(text.clone()),
                    None,
                )
            })?;

        Ok(BlobStore {
            id,
            token: BLOB_RW_TOKEN.find(&text).map(|m| m.as_str().to_string()),
        })
    }

    pub fn remove_blob_store(&self, store_id: &str) -> Result<(), CommandError> {
        info!("removing Vercel Blob store `{}`", store_id);
        self.cli
            .run(&self.invocation(&["blob", "store", "remove", store_id, "--yes"]))
            .map(|_| ())
    }

    /// Creates the project and links the local directory to it, returning the written link.
    pub fn create_and_link_project(&self, name: &str) -> Result<VercelProjectLink, CommandError> {
        info!("creating Vercel project `{}`", name);
        self.cli.run(&self.invocation(&["project", "add", name]))?;
        self.cli
            .run(&self.invocation(&["link", "--yes", "--project", name]))?;

        read_project_link(&self.project_path)?.ok_or_else(|| {
            CommandError::new_from_safe_message(format!(
                "`vercel link` didn't write `{}` for project `{}`",
                VERCEL_PROJECT_LINK, name
            ))
        })
    }

    pub fn remove_project(&self, name: &str) -> Result<(), CommandError> {
        info!("removing Vercel project `{}`", name);
        self.cli
            .run(&self.invocation(&["project", "remove", name, "--yes"]))
            .map(|_| ())
    }

    pub fn add_env_var(&self, key: &str, value: &str, environment: Environment) -> Result<(), CommandError> {
        // value goes through stdin so it never lands in argv
        self.cli
            .run(
                &self
                    .invocation(&["env", "add", key, environment.hosting_target()])
                    .with_stdin(value),
            )
            .map(|_| ())
    }

    pub fn remove_env_var(&self, key: &str, environment: Environment) -> Result<(), CommandError> {
        self.cli
            .run(&self.invocation(&["env", "rm", key, environment.hosting_target(), "--yes"]))
            .map(|_| ())
    }

    pub fn remove_domain(&self, domain: &str) -> Result<(), CommandError> {
        info!("removing Vercel domain `{}`", domain);
        self.cli
            .run(&self.invocation(&["domains", "rm", domain, "--yes"]))
            .map(|_| ())
    }
}

/// Reads `.vercel/project.json`, `None` when the project isn't linked.
pub fn read_project_link(project_path: &Path) -> Result<Option<VercelProjectLink>, CommandError> {
    let path = project_path.join(VERCEL_PROJECT_LINK);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path)?;
    serde_json::from_str::<VercelProjectLink>(&content)
        .map(Some)
        .map_err(|e| {
            CommandError::new(
                format!("`{}` is not a valid Vercel project link", path.display()),
                Some(e.to_string()),
                None,
            )
        })
}
