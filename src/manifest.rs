use crate::constants::MANIFEST_FILE_NAME;
use crate::errors::ManifestError;
use crate::models::record::ProvisioningRecord;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub fn manifest_path(project_path: &Path) -> PathBuf {
    project_path.join(MANIFEST_FILE_NAME)
}

/// Reads the provisioning manifest of a project, `None` when the project has none.
pub fn read(project_path: &Path) -> Result<Option<ProvisioningRecord>, ManifestError> {
    let path = manifest_path(project_path);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ManifestError::Io { path, source: err }),
    };

    serde_json::from_str::<ProvisioningRecord>(&content)
        .map(Some)
        .map_err(|err| ManifestError::Parse { path, source: err })
}

/// Persists `record` as the provisioning manifest of the project, replacing any previous one.
pub fn write(project_path: &Path, record: &ProvisioningRecord) -> Result<PathBuf, ManifestError> {
    let path = manifest_path(project_path);
    let content = serde_json::to_string_pretty(record).map_err(|err| ManifestError::Parse {
        path: path.clone(),
        source: err,
    })?;

    let io_error = |source: std::io::Error| ManifestError::Io {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(project_path).map_err(io_error)?;
    let mut tmp_file = NamedTempFile::new_in(project_path).map_err(io_error)?;
    tmp_file.write_all(content.as_bytes()).map_err(io_error)?;
    tmp_file.write_all(b"\n").map_err(io_error)?;
    tmp_file.persist(&path).map_err(|err| io_error(err.error))?;

    info!("provisioning manifest written to `{}`", path.display());

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::environment::Environment;
    use crate::models::provider::DatabaseProvider;
    use crate::models::record::{DatabaseBlock, DatabaseRecord, ProvisioningMode};
    use tempfile::tempdir;

    #[test]
    fn test_missing_manifest() {
        let dir = tempdir().expect("cannot create temp dir");

        assert!(read(dir.path()).expect("cannot read").is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().expect("cannot create temp dir");
        let database = DatabaseBlock::new(
            DatabaseProvider::Turso,
            vec![DatabaseRecord {
                environment: Environment::Production,
                name: "shop-prod".to_string(),
                url: "libsql://shop-prod.turso.io".to_string(),
                auth_token: "token".to_string(),
            }],
        )
        .expect("invalid block");
        let record = ProvisioningRecord::new(ProvisioningMode::Real, "shop".to_string()).with_database(Some(database));

        let path = write(dir.path(), &record).expect("cannot write");

        assert!(path.ends_with(MANIFEST_FILE_NAME));
        assert_eq!(read(dir.path()).expect("cannot read"), Some(record));
    }

    #[test]
    fn test_corrupt_manifest() {
        let dir = tempdir().expect("cannot create temp dir");
        fs::write(manifest_path(dir.path()), "{ not json").expect("cannot write");

        assert!(matches!(read(dir.path()), Err(ManifestError::Parse { .. })));
    }
}
