use serde_derive::{Deserialize, Serialize};

/// Output of `supabase projects create --output json`.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupabaseProject {
    #[serde(alias = "ref")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
}

/// Item of `supabase projects api-keys --output json`.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupabaseApiKey {
    pub name: String,
    pub api_key: String,
}

/// Content of `.vercel/project.json` written by `vercel link`.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VercelProjectLink {
    pub project_id: String,
    pub org_id: String,
    #[serde(default)]
    pub project_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supabase_project_accepts_ref_field() {
        let json = r#"{"ref": "abcdefghijklmnop", "name": "my-app-dev", "region": "us-east-1", "organization_id": "org"}"#;

        let project: SupabaseProject = serde_json::from_str(json).expect("cannot parse supabase project");

        assert_eq!(project.id, "abcdefghijklmnop");
        assert_eq!(project.name, "my-app-dev");
    }

    #[test]
    fn test_vercel_project_link() {
        let json = r#"{"projectId":"prj_123","orgId":"team_456"}"#;

        let link: VercelProjectLink = serde_json::from_str(json).expect("cannot parse vercel link");

        assert_eq!(link.project_id, "prj_123");
        assert_eq!(link.org_id, "team_456");
        assert_eq!(link.project_name, None);
    }
}
