use crate::cmd::command::{VendorCli, VendorInvocation};
use crate::cmd::{first_line, run_with_retry};
use crate::errors::CommandError;
use std::sync::Arc;

const TURSO_BINARY: &str = "turso";
pub const TURSO_API_TOKEN: &str = "TURSO_API_TOKEN";

/// Turso libSQL databases, driven through the `turso` CLI.
#[derive(Clone)]
pub struct TursoCli {
    cli: Arc<dyn VendorCli>,
    group: Option<String>,
    token: Option<String>,
}

impl TursoCli {
    pub fn new(cli: Arc<dyn VendorCli>, group: Option<String>, token: Option<String>) -> Self {
        TursoCli { cli, group, token }
    }

    fn invocation(&self, args: &[&str]) -> VendorInvocation {
        VendorInvocation::new(TURSO_BINARY, args).with_token(TURSO_API_TOKEN, self.token.as_deref())
    }

    pub fn create_database(&self, name: &str) -> Result<(), CommandError> {
        let mut args = vec!["db", "create", name];
        if let Some(group) = &self.group {
            args.extend(["--group", group.as_str()]);
        }

        info!("creating Turso database `{}`", name);
        self.cli.run(&self.invocation(&args)).map(|_| ())
    }

    pub fn database_url(&self, name: &str) -> Result<String, CommandError> {
        let output = run_with_retry(self.cli.as_ref(), &self.invocation(&["db", "show", name, "--url"]))?;

        first_line(&output).ok_or_else(|| {
            CommandError::new_from_safe_message(format!("Turso didn't return any url for database `{}`", name))
        })
    }

    pub fn create_token(&self, name: &str) -> Result<String, CommandError> {
        let output = self.cli.run(&self.invocation(&["db", "tokens", "create", name]))?;

        first_line(&output).ok_or_else(|| {
            CommandError::new_from_safe_message(format!("Turso didn't return any token for database `{}`", name))
        })
    }

    pub fn destroy_database(&self, name: &str) -> Result<(), CommandError> {
        info!("destroying Turso database `{}`", name);
        self.cli
            .run(&self.invocation(&["db", "destroy", name, "--yes"]))
            .map(|_| ())
    }
}
