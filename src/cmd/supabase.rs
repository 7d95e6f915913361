use crate::cmd::command::{VendorCli, VendorInvocation};
use crate::cmd::run_with_retry;
use crate::cmd::structs::{SupabaseApiKey, SupabaseProject};
use crate::errors::CommandError;
use std::sync::Arc;

const SUPABASE_BINARY: &str = "supabase";
pub const SUPABASE_ACCESS_TOKEN: &str = "SUPABASE_ACCESS_TOKEN";
const SUPABASE_DB_PASSWORD: &str = "SUPABASE_DB_PASSWORD";

/// Supabase Postgres projects, driven through the `supabase` CLI.
#[derive(Clone)]
pub struct SupabaseCli {
    cli: Arc<dyn VendorCli>,
    token: Option<String>,
}

impl SupabaseCli {
    pub fn new(cli: Arc<dyn VendorCli>, token: Option<String>) -> Self {
        SupabaseCli { cli, token }
    }

    fn invocation(&self, args: &[&str]) -> VendorInvocation {
        VendorInvocation::new(SUPABASE_BINARY, args).with_token(SUPABASE_ACCESS_TOKEN, self.token.as_deref())
    }

    pub fn create_project(
        &self,
        name: &str,
        org_id: &str,
        region: &str,
        db_password: &str,
    ) -> Result<SupabaseProject, CommandError> {
        info!("creating Supabase project `{}` in region `{}`", name, region);
        // the CLI reads `--db-password` from this variable when the flag is absent
        let invocation = self
            .invocation(&[
                "projects",
                "create",
                name,
                "--org-id",
                org_id,
                "--region",
                region,
                "--output",
                "json",
            ])
            .with_env(SUPABASE_DB_PASSWORD, db_password);
        let output = self.cli.run(&invocation)?;

        serde_json::from_str::<SupabaseProject>(&output.stdout).map_err(|e| {
            CommandError::new(
                format!("Cannot parse Supabase project `{}` creation output", name),
                Some(e.to_string()),
                None,
            )
        })
    }

    pub fn anon_key(&self, project_ref: &str) -> Result<String, CommandError> {
        let output = run_with_retry(
            self.cli.as_ref(),
            &self.invocation(&["projects", "api-keys", "--project-ref", project_ref, "--output", "json"]),
        )?;

        let keys = serde_json::from_str::<Vec<SupabaseApiKey>>(&output.stdout).map_err(|e| {
            CommandError::new(
                format!("Cannot parse Supabase api keys of project `{}`", project_ref),
                Some(e.to_string()),
                None,
            )
        })?;

        keys.into_iter()
            .find(|k| k.name == "anon")
            .map(|k| k.api_key)
            .ok_or_else(|| {
                CommandError::new_from_safe_message(format!("Supabase project `{}` has no anon key", project_ref))
            })
    }

    pub fn delete_project(&self, project_ref: &str) -> Result<(), CommandError> {
        info!("deleting Supabase project `{}`", project_ref);
        self.cli
            .run(&self.invocation(&["projects", "delete", project_ref, "--yes"]))
            .map(|_| ())
    }
}

pub fn database_url(project_ref: &str, db_password: &str) -> String {
    format!("postgresql://postgres:{}@db.{}.supabase.co:5432/postgres", db_password, project_ref)
}

pub fn api_url(project_ref: &str) -> String {
    format!("https://{}.supabase.co", project_ref)
}

/// Extracts the project ref from a Supabase api or database url.
pub fn project_ref_from_url(url: &str) -> Option<String> {
    let host = url::Url::parse(url).ok()?.host_str()?.to_string();
    let host = host.strip_prefix("db.").unwrap_or(host.as_str());

    host.strip_suffix(".supabase.co").map(|r| r.to_string())
}
