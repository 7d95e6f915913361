use crate::helpers::{FailingDeleter, RecordingLogger, init};
use resource_engine::config::EngineConfig;
use resource_engine::discovery::discover;
use resource_engine::engine::{cleanup_project, cleanup_project_with, provision_project};
use resource_engine::events::{CleanupStep, EngineEvent, Stage};
use resource_engine::models::cleanup::{DeletionStepType, EnvironmentScope, ResourceSelection};
use resource_engine::models::environment::Environment;
use resource_engine::models::graph::RiskLevel;
use resource_engine::models::provider::{DatabaseProvider, StorageProvider};
use resource_engine::orchestrator::CleanupOrchestrator;
use resource_engine::planner::build_plan;
use resource_engine::provisioner::ProvisioningRequest;
use std::path::Path;
use tempfile::{TempDir, tempdir};

/// Project provisioned in mock mode with a database per environment and a blob store.
fn provisioned_project() -> TempDir {
    let dir = tempdir().expect("cannot create temp dir");
    let request = ProvisioningRequest::new("shop", dir.path())
        .with_database(DatabaseProvider::Turso)
        .with_storage(StorageProvider::VercelBlob);

    let result = provision_project(&EngineConfig::mock(), &request);
    assert!(result.success, "{:?}", result.error);

    dir
}

fn databases_only() -> ResourceSelection {
    ResourceSelection::new(vec![DeletionStepType::Database])
}

#[test]
fn test_staging_scoped_plan() {
    let _start = init();
    let dir = provisioned_project();
    let inventory = discover(dir.path()).expect("discovery should succeed");

    let plan = build_plan(
        &inventory,
        &databases_only().with_scope(EnvironmentScope::Only(Environment::Staging)),
    )
    .expect("plan should be valid");

    assert_eq!(plan.project_name, "shop");
    assert_eq!(
        plan.steps.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
        vec!["database:shop-stg"]
    );
    assert_eq!(plan.steps[0].parameter("identifier"), Some("shop-stg"));
    assert_eq!(plan.risk_level, RiskLevel::High);
}

#[test]
fn test_failure_halts_the_cleanup() {
    let _start = init();
    let dir = provisioned_project();
    let inventory = discover(dir.path()).expect("discovery should succeed");
    let plan = build_plan(&inventory, &databases_only()).expect("plan should be valid");
    assert_eq!(plan.steps.len(), 3);
    assert_eq!(plan.risk_level, RiskLevel::Critical);

    let second_step = plan.steps[1].id.clone();
    let deleter = FailingDeleter::failing_on(&second_step);
    let logger = RecordingLogger::default();
    let result = CleanupOrchestrator::new(Box::new(deleter.clone()), Box::new(logger.clone())).execute(plan.clone());

    assert!(!result.success);
    assert_eq!(result.completed_steps, 1);
    assert_eq!(result.failed_steps, 1);
    assert_eq!(result.step_results.len(), 2);
    assert!(result.rollback_performed);
    assert_eq!(deleter.attempts(), vec![plan.steps[0].id.clone(), second_step.clone()]);
    assert!(
        result.step_results[1]
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("vendor returned 503")
    );

    let advisory = result.recovery_advisory.expect("advisory expected");
    assert_eq!(
        advisory
            .instructions
            .iter()
            .map(|i| i.step_id.as_str())
            .collect::<Vec<_>>(),
        vec![plan.steps[0].id.as_str()]
    );

    let sub_steps = logger.sub_step_names();
    assert!(sub_steps.contains(&"delete-error-database".to_string()));
    assert_eq!(
        sub_steps
            .iter()
            .filter(|s| s.as_str() == "delete-database")
            .count(),
        2
    );
}

#[test]
fn test_end_to_end_cleanup_in_mock_mode() {
    let _start = init();
    let dir = provisioned_project();

    let result = cleanup_project(
        &EngineConfig::mock(),
        dir.path(),
        &ResourceSelection::new(vec![DeletionStepType::Database, DeletionStepType::StorageStore]),
    );

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.completed_steps, 4);
    assert_eq!(result.failed_steps, 0);
    assert!(result.recovery_advisory.is_none());
}

#[test]
fn test_cleanup_reports_progress() {
    let _start = init();
    let dir = provisioned_project();
    let logger = RecordingLogger::default();

    let result = cleanup_project_with(
        Box::new(FailingDeleter::default()),
        Box::new(logger.clone()),
        dir.path(),
        &ResourceSelection::new(vec![DeletionStepType::StorageStore]),
    );

    assert!(result.success);
    let events = logger.events.lock().expect("poisoned lock");
    let last = events.last().expect("events expected");
    assert!(matches!(last, EngineEvent::Info(..)));
    assert_eq!(last.get_details().stage(), &Stage::Cleanup(CleanupStep::Summary));
    assert_eq!(last.get_details().progress(), Some(100));
}

#[test]
fn test_invalid_selection_fails_before_any_deletion() {
    let _start = init();
    let dir = provisioned_project();
    let deleter = FailingDeleter::default();

    let result = cleanup_project_with(
        Box::new(deleter.clone()),
        Box::new(RecordingLogger::default()),
        dir.path(),
        &ResourceSelection::new(vec![DeletionStepType::HostingProject]),
    );

    assert!(!result.success);
    assert!(result.error.is_some());
    assert!(deleter.attempts().is_empty());
}

#[test]
fn test_nothing_to_clean_up() {
    let _start = init();
    let dir = tempdir().expect("cannot create temp dir");

    let result = cleanup_project(&EngineConfig::mock(), dir.path(), &databases_only());

    assert!(result.success);
    assert!(result.step_results.is_empty());
    assert!(!cleanup_project(&EngineConfig::mock(), Path::new("/definitely/not/here"), &databases_only()).success);
}
