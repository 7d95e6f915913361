use crate::helpers::{RecordingLogger, init};
use resource_engine::config::EngineConfig;
use resource_engine::engine::{provision_project, provision_project_with};
use resource_engine::env_file;
use resource_engine::manifest;
use resource_engine::models::environment::Environment;
use resource_engine::models::provider::{DatabaseProvider, StorageProvider};
use resource_engine::provisioner::{MockProvisioner, ProvisioningRequest};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_staging_failure_keeps_development_and_production() {
    let _start = init();
    let dir = tempdir().expect("cannot create temp dir");
    let logger = RecordingLogger::default();
    let request = ProvisioningRequest::new("shop", dir.path())
        .with_database(DatabaseProvider::Turso)
        .with_storage(StorageProvider::VercelBlob);

    let result = provision_project_with(&MockProvisioner::new().failing_for(Environment::Staging), &request, &logger);

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap_or_default().contains("staging"));
    for file in [".env.local", ".env.development", ".env.production"] {
        assert!(dir.path().join(file).exists(), "{} should be written", file);
    }
    assert!(!dir.path().join(".env.staging").exists());
    assert_eq!(
        result.credentials.map(|c| c.keys().copied().collect::<Vec<_>>()),
        Some(vec![Environment::Development, Environment::Production])
    );

    let record = manifest::read(dir.path())
        .expect("manifest should be readable")
        .expect("partial manifest should be written");
    assert_eq!(
        record.database.map(|d| d.environments()).unwrap_or_default(),
        vec![Environment::Development, Environment::Production]
    );
    let production = env_file::read(dir.path().join(".env.production")).expect("cannot read env file");
    assert_eq!(
        production.get("TURSO_DATABASE_URL").map(|v| v.as_str()),
        Some("libsql://shop-prod-mock.turso.io")
    );
    assert!(production.contains_key("BLOB_READ_WRITE_TOKEN"));
    assert!(
        logger
            .sub_step_names()
            .contains(&"provision-error".to_string())
    );
}

#[test]
fn test_one_database_per_requested_environment() {
    let _start = init();
    let subsets = vec![
        vec![Environment::Production],
        vec![Environment::Development, Environment::Staging],
        vec![Environment::Development, Environment::Staging, Environment::Production],
    ];

    for environments in subsets {
        let dir = tempdir().expect("cannot create temp dir");
        let request = ProvisioningRequest::new("shop", dir.path())
            .with_environments(&environments)
            .with_database(DatabaseProvider::Supabase);

        let result = provision_project(&EngineConfig::mock(), &request);

        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.databases.iter().map(|d| d.environment).collect::<Vec<_>>(),
            environments
        );
        assert!(result.databases.iter().all(|d| !d.url.is_empty()));
    }
}

#[test]
fn test_env_files_are_merged_idempotently() {
    let _start = init();
    let dir = tempdir().expect("cannot create temp dir");
    fs::write(
        dir.path().join(".env.local"),
        "# keep me\nOTHER=1\nTURSO_AUTH_TOKEN=old\n",
    )
    .expect("cannot write env file");
    let request = ProvisioningRequest::new("shop", dir.path())
        .with_environments(&[Environment::Development])
        .with_database(DatabaseProvider::Turso);

    assert!(provision_project(&EngineConfig::mock(), &request).success);
    let first = fs::read_to_string(dir.path().join(".env.local")).expect("cannot read env file");
    assert!(provision_project(&EngineConfig::mock(), &request).success);
    let second = fs::read_to_string(dir.path().join(".env.local")).expect("cannot read env file");

    assert_eq!(
        first,
        "# keep me\nOTHER=1\nTURSO_AUTH_TOKEN=mock-token-shop-dev\nTURSO_DATABASE_URL=libsql://shop-dev-mock.turso.io\n"
    );
    assert_eq!(first, second);
}

#[test]
fn test_merge_keeps_foreign_values() {
    let _start = init();
    let dir = tempdir().expect("cannot create temp dir");
    let path = dir.path().join(".env.production");
    fs::write(&path, "export API_KEY=\"a b\"\n").expect("cannot write env file");

    env_file::merge(&path, &btreemap! {"S3_BUCKET".to_string() => "shop".to_string()}).expect("merge should succeed");

    assert_eq!(
        env_file::read(&path).expect("cannot read env file"),
        btreemap! {
            "API_KEY".to_string() => "a b".to_string(),
            "S3_BUCKET".to_string() => "shop".to_string(),
        }
    );
}
