use crate::dependency_graph::assess_risk;
use crate::errors::ValidationError;
use crate::models::cleanup::{
    BackupPlan, CleanupPlan, DeletionStep, DeletionStepType, EnvironmentScope, ResourceSelection,
};
use crate::models::inventory::{Resource, ResourceInventory};
use itertools::Itertools;
use std::collections::HashSet;
use std::time::Duration;

/// Resource types which aren't bound to an environment.
fn is_project_wide(resource_type: DeletionStepType) -> bool {
    matches!(
        resource_type,
        DeletionStepType::HostingProject | DeletionStepType::Domains | DeletionStepType::StorageStore
    )
}

/// Narrows the deletion order of `inventory` down to `selection`.
///
/// Steps keep the dependency graph order, so every step only depends on earlier ones.
/// Environment variables of a hosting project which is itself deleted are not deleted on their
/// own: removing the project removes them.
pub fn build_plan(inventory: &ResourceInventory, selection: &ResourceSelection) -> Result<CleanupPlan, ValidationError> {
    if selection.resource_types.is_empty() {
        return Err(ValidationError::EmptySelection);
    }

    let present = inventory.resource_types();
    for resource_type in selection.resource_types.iter().unique() {
        if !present.contains(resource_type) {
            return Err(ValidationError::ResourceTypeNotInInventory(*resource_type));
        }
        if is_project_wide(*resource_type) && selection.scope != EnvironmentScope::All {
            return Err(ValidationError::ResourceTypeNotInScope {
                resource_type: *resource_type,
                scope: selection.scope,
            });
        }
    }

    let selected: Vec<Resource> = inventory
        .resources()
        .into_iter()
        .filter(|r| selection.resource_types.contains(&r.step_type()))
        .filter(|r| selection.scope.includes(r.environment()))
        .filter(|r| !selection.exclusions.iter().any(|e| r.is_excluded_by(e)))
        .collect();

    let hosting_deleted = selected
        .iter()
        .any(|r| r.step_type() == DeletionStepType::HostingProject);
    let folded: Vec<&Resource> = selected
        .iter()
        .filter(|r| hosting_deleted && r.step_type() == DeletionStepType::EnvironmentVariables)
        .collect();
    let folded_ids: HashSet<String> = folded.iter().map(|r| r.id()).collect();
    let step_ids: HashSet<String> = selected
        .iter()
        .map(|r| r.id())
        .filter(|id| !folded_ids.contains(id))
        .collect();

    let graph = inventory.dependency_graph();
    let mut steps: Vec<DeletionStep> = graph
        .deletion_order
        .iter()
        .filter(|entry| step_ids.contains(&entry.id))
        .filter_map(|entry| {
            let resource = selected.iter().find(|r| r.id() == entry.id)?;
            let mut parameters = resource.parameters();
            if resource.step_type() == DeletionStepType::HostingProject && !folded.is_empty() {
                parameters.insert(
                    "environmentVariables".to_string(),
                    folded.iter().filter_map(|r| r.environment()).join(","),
                );
            }

            Some(DeletionStep {
                id: entry.id.clone(),
                step_type: entry.resource_type,
                description: resource.description(),
                parameters,
                order: 0,
                requires_backup: graph
                    .backup_requirement(&entry.id)
                    .map(|b| b.required)
                    .unwrap_or(false),
                dependencies: entry
                    .dependencies
                    .iter()
                    .filter(|d| step_ids.contains(*d))
                    .cloned()
                    .collect(),
            })
        })
        .collect();
    for (idx, step) in steps.iter_mut().enumerate() {
        step.order = idx as u32 + 1;
    }

    let backup_plan = BackupPlan {
        requirements: graph
            .backup_requirements
            .iter()
            .filter(|b| step_ids.contains(&b.resource_id) || folded_ids.contains(&b.resource_id))
            .cloned()
            .collect(),
    };
    let estimated_duration: Duration = steps.iter().map(|s| s.step_type.estimated_duration()).sum();
    let risk_level = assess_risk(&selected).overall;

    info!(
        "cleanup plan of `{}`: {} step(s), risk {}, about {}s",
        inventory.project_name(),
        steps.len(),
        risk_level,
        estimated_duration.as_secs()
    );

    Ok(CleanupPlan {
        project_name: inventory.project_name().to_string(),
        steps,
        target_resources: selection.clone(),
        backup_plan,
        estimated_duration,
        risk_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::environment::Environment;
    use crate::models::graph::RiskLevel;
    use crate::models::inventory::{DatabaseResource, EnvironmentVariableSet, HostingResources, StorageResource};
    use crate::models::provider::{DatabaseProvider, HostingProvider, StorageProvider};
    use std::path::Path;

    fn inventory(with_hosting: bool) -> ResourceInventory {
        let databases = [Environment::Development, Environment::Staging, Environment::Production]
            .iter()
            .map(|env| DatabaseResource {
                provider: DatabaseProvider::Turso,
                environment: *env,
                identifier: format!("shop{}", env.name_suffix()),
                url: None,
                token: None,
            })
            .collect();
        let storage = vec![StorageResource {
            provider: StorageProvider::VercelBlob,
            name: "store-a".to_string(),
            id: Some("store_a".to_string()),
            region: None,
        }];
        let hosting = with_hosting.then(|| HostingResources {
            provider: HostingProvider::Vercel,
            project_id: "prj_1".to_string(),
            org_id: "team_1".to_string(),
            project_name: "shop".to_string(),
            production_url: None,
            domains: vec!["shop.example.com".to_string()],
            env_vars: vec![EnvironmentVariableSet {
                environment: Environment::Production,
                keys: vec!["TURSO_DATABASE_URL".to_string()],
            }],
        });

        ResourceInventory::new(
            "shop".to_string(),
            Path::new("/tmp/shop"),
            hosting,
            Some(databases),
            Some(storage),
        )
    }

    #[test]
    fn test_staging_database_only() {
        let selection =
            ResourceSelection::new(vec![DeletionStepType::Database]).with_scope(EnvironmentScope::Only(Environment::Staging));

        let plan = build_plan(&inventory(false), &selection).expect("valid plan");

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].id, "database:shop-stg");
        assert_eq!(plan.steps[0].order, 1);
        assert_eq!(plan.risk_level, RiskLevel::High);
        assert_eq!(plan.estimated_duration, Duration::from_secs(15));
    }

    #[test]
    fn test_type_absent_from_inventory() {
        let selection = ResourceSelection::new(vec![DeletionStepType::HostingProject]);

        assert_eq!(
            build_plan(&inventory(false), &selection),
            Err(ValidationError::ResourceTypeNotInInventory(DeletionStepType::HostingProject))
        );
    }

    #[test]
    fn test_project_wide_type_under_environment_scope() {
        let selection = ResourceSelection::new(vec![DeletionStepType::StorageStore])
            .with_scope(EnvironmentScope::Only(Environment::Production));

        assert!(matches!(
            build_plan(&inventory(false), &selection),
            Err(ValidationError::ResourceTypeNotInScope { .. })
        ));
    }

    #[test]
    fn test_empty_selection() {
        assert_eq!(
            build_plan(&inventory(false), &ResourceSelection::default()),
            Err(ValidationError::EmptySelection)
        );
    }

    #[test]
    fn test_full_plan_is_a_linear_extension() {
        let selection = ResourceSelection::new(vec![
            DeletionStepType::Domains,
            DeletionStepType::HostingProject,
            DeletionStepType::EnvironmentVariables,
            DeletionStepType::Database,
            DeletionStepType::StorageStore,
        ]);

        let plan = build_plan(&inventory(true), &selection).expect("valid plan");

        for (idx, step) in plan.steps.iter().enumerate() {
            assert_eq!(step.order as usize, idx + 1);
            for dependency in &step.dependencies {
                let position = plan
                    .steps
                    .iter()
                    .position(|s| &s.id == dependency)
                    .expect("dependency must be a step");
                assert!(position < idx);
            }
        }
        assert_eq!(plan.risk_level, RiskLevel::Critical);
        // production env vars are removed along with the hosting project
        assert!(
            !plan
                .steps
                .iter()
                .any(|s| s.step_type == DeletionStepType::EnvironmentVariables)
        );
        let hosting = plan
            .steps
            .iter()
            .find(|s| s.step_type == DeletionStepType::HostingProject)
            .expect("hosting step expected");
        assert_eq!(hosting.parameter("environmentVariables"), Some("production"));
        assert_eq!(hosting.dependencies, vec!["domains:shop.example.com"]);
    }

    #[test]
    fn test_exclusions() {
        let selection = ResourceSelection::new(vec![DeletionStepType::Database]).excluding("shop-prod");

        let plan = build_plan(&inventory(false), &selection).expect("valid plan");

        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.risk_level, RiskLevel::High);
        assert_eq!(plan.backup_plan.required().count(), 2);
    }
}
