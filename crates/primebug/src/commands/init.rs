//! Implementation of the `init` command.
//!
//! Creates the `.primebug/` directory with a default configuration, an
//! empty document snapshot and the blob directory.

use crate::config::{BackendKind, PrimeBugConfig, CONFIG_FILE_NAME, PRIMEBUG_DIR_NAME};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Name of the gitignore file within .primebug
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Maximum directory depth to traverse when searching for the workspace root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Result of the init command
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created .primebug directory
    pub primebug_dir: PathBuf,
    /// Path to the created config file
    pub config_file: PathBuf,
    /// Path to the created document snapshot, if the backend persists
    pub data_file: Option<PathBuf>,
    /// Path to the created blob directory
    pub blob_dir: PathBuf,
}

/// Initialize a new workspace in `base_dir`.
///
/// # Errors
///
/// Returns an error if:
/// - The `.primebug/` directory already exists
/// - File system operations fail
pub async fn init(base_dir: &Path, backend: BackendKind) -> Result<InitResult> {
    let primebug_dir = base_dir.join(PRIMEBUG_DIR_NAME);

    if primebug_dir.exists() {
        return Err(Error::Config(format!(
            "PrimeBug is already initialized in this directory. Found existing '{PRIMEBUG_DIR_NAME}'"
        )));
    }

    fs::create_dir_all(&primebug_dir).await?;

    let mut config = PrimeBugConfig::default();
    config.storage.backend = backend;

    let config_file = primebug_dir.join(CONFIG_FILE_NAME);
    config.save(&config_file).await?;

    let data_file = match backend {
        BackendKind::Jsonl => {
            let path = base_dir.join(&config.storage.data_file);
            fs::write(&path, "").await?;
            Some(path)
        }
        BackendKind::Memory => None,
    };

    let blob_dir = config.blob_dir(base_dir);
    fs::create_dir_all(&blob_dir).await?;

    let gitignore_file = primebug_dir.join(GITIGNORE_FILE_NAME);
    fs::write(
        &gitignore_file,
        "# Uploaded attachments are not tracked\nblobs/\n",
    )
    .await?;

    tracing::info!(dir = %primebug_dir.display(), "Initialized PrimeBug workspace");

    Ok(InitResult {
        primebug_dir,
        config_file,
        data_file,
        blob_dir,
    })
}

/// Check if a directory has been initialized.
pub fn is_initialized(base_dir: &Path) -> bool {
    base_dir.join(PRIMEBUG_DIR_NAME).exists()
}

/// Find the workspace root by searching up the directory tree.
///
/// Returns the directory containing `.primebug/`, or `None` if none is
/// found within [`MAX_TRAVERSAL_DEPTH`] levels.
pub fn find_primebug_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(PRIMEBUG_DIR_NAME).exists() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_directory_structure() {
        let temp_dir = TempDir::new().unwrap();

        let result = init(temp_dir.path(), BackendKind::Jsonl).await.unwrap();

        assert!(result.primebug_dir.exists());
        assert!(result.config_file.exists());
        assert!(result.blob_dir.is_dir());
        let data_file = result.data_file.unwrap();
        assert!(tokio::fs::read_to_string(&data_file).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_init_memory_backend_has_no_data_file() {
        let temp_dir = TempDir::new().unwrap();

        let result = init(temp_dir.path(), BackendKind::Memory).await.unwrap();
        assert!(result.data_file.is_none());

        let config = PrimeBugConfig::load(&result.config_file).await.unwrap();
        assert_eq!(config.storage.backend, BackendKind::Memory);
    }

    #[tokio::test]
    async fn test_init_fails_if_already_initialized() {
        let temp_dir = TempDir::new().unwrap();

        init(temp_dir.path(), BackendKind::Jsonl).await.unwrap();
        let err = init(temp_dir.path(), BackendKind::Jsonl).await.unwrap_err();

        assert!(err.to_string().to_lowercase().contains("already initialized"));
    }

    #[test]
    fn test_is_initialized() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!is_initialized(temp_dir.path()));

        std::fs::create_dir(temp_dir.path().join(PRIMEBUG_DIR_NAME)).unwrap();
        assert!(is_initialized(temp_dir.path()));
    }

    #[test]
    fn test_find_root_in_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join(PRIMEBUG_DIR_NAME)).unwrap();

        let sub_dir = temp_dir.path().join("sub").join("nested");
        std::fs::create_dir_all(&sub_dir).unwrap();

        assert_eq!(
            find_primebug_root(&sub_dir),
            Some(temp_dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_find_root_not_found() {
        let temp_dir = TempDir::new().unwrap();
        assert!(find_primebug_root(temp_dir.path()).is_none());
    }
}
