//! Workspace configuration.
//!
//! `.primebug/config.yaml` is created by `primebug init` and read by every
//! other command. Every section has defaults, so a partial file is valid.

use crate::error::{Error, Result};
use primebug_docstore::StoreBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Name of the workspace directory
pub const PRIMEBUG_DIR_NAME: &str = ".primebug";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the document snapshot file
pub const DOCUMENTS_FILE_NAME: &str = "documents.jsonl";

/// Name of the blob directory
pub const BLOBS_DIR_NAME: &str = "blobs";

/// Default attachment size limit (10 MiB)
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Default transaction attempts, matching the store's retry policy
pub const DEFAULT_MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Default notification delivery attempts
pub const DEFAULT_MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrimeBugConfig {
    /// Document storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Attachment storage
    #[serde(default)]
    pub attachments: AttachmentConfig,

    /// Transaction retry policy
    #[serde(default)]
    pub transactions: TransactionConfig,

    /// Notification delivery
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Storage backend type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-memory documents persisted to a JSONL snapshot
    #[default]
    Jsonl,
    /// Ephemeral in-memory documents
    Memory,
}

/// Storage configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Backend type
    #[serde(default)]
    pub backend: BackendKind,

    /// Path to the snapshot file, relative to the workspace root
    #[serde(default = "default_data_file")]
    pub data_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            data_file: default_data_file(),
        }
    }
}

impl StorageConfig {
    /// Resolve this section into a store backend rooted at `root_dir`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the data file path is empty.
    pub fn to_backend(&self, root_dir: &Path) -> Result<StoreBackend> {
        match self.backend {
            BackendKind::Memory => Ok(StoreBackend::InMemory),
            BackendKind::Jsonl => {
                if self.data_file.trim().is_empty() {
                    return Err(Error::Config(
                        "storage.data_file cannot be empty for the jsonl backend".to_string(),
                    ));
                }
                Ok(StoreBackend::Jsonl(root_dir.join(&self.data_file)))
            }
        }
    }
}

/// Attachment configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentConfig {
    /// Blob directory, relative to the workspace root
    #[serde(default = "default_blob_dir")]
    pub directory: String,

    /// Largest accepted upload in bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            directory: default_blob_dir(),
            max_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }
}

/// Transaction configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Attempts before a conflicting transaction gives up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_TRANSACTION_ATTEMPTS,
        }
    }
}

/// Notification configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Delivery attempts before a notification is dropped
    #[serde(default = "default_delivery_attempts")]
    pub max_delivery_attempts: u32,

    /// Prefix for notification deep links
    #[serde(default = "default_link_base")]
    pub link_base: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_delivery_attempts: DEFAULT_MAX_DELIVERY_ATTEMPTS,
            link_base: default_link_base(),
        }
    }
}

fn default_data_file() -> String {
    format!("{PRIMEBUG_DIR_NAME}/{DOCUMENTS_FILE_NAME}")
}

fn default_blob_dir() -> String {
    format!("{PRIMEBUG_DIR_NAME}/{BLOBS_DIR_NAME}")
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_ATTACHMENT_BYTES
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_TRANSACTION_ATTEMPTS
}

fn default_delivery_attempts() -> u32 {
    DEFAULT_MAX_DELIVERY_ATTEMPTS
}

fn default_link_base() -> String {
    "/".to_string()
}

impl PrimeBugConfig {
    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Config`
    /// if it is not valid YAML or fails validation.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Reject values no service can work with.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.transactions.max_attempts == 0 {
            return Err(Error::Config(
                "transactions.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.notifications.max_delivery_attempts == 0 {
            return Err(Error::Config(
                "notifications.max_delivery_attempts must be at least 1".to_string(),
            ));
        }
        if self.attachments.max_bytes == 0 {
            return Err(Error::Config(
                "attachments.max_bytes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Blob directory resolved against `root_dir`.
    #[must_use]
    pub fn blob_dir(&self, root_dir: &Path) -> PathBuf {
        root_dir.join(&self.attachments.directory)
    }

    /// The settings services run with.
    #[must_use]
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            max_transaction_attempts: self.transactions.max_attempts,
            max_delivery_attempts: self.notifications.max_delivery_attempts,
            max_attachment_bytes: self.attachments.max_bytes,
            link_base: self.notifications.link_base.clone(),
        }
    }
}

/// Tunables handed to the services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Attempts per optimistic transaction.
    pub max_transaction_attempts: u32,
    /// Delivery attempts per notification.
    pub max_delivery_attempts: u32,
    /// Largest accepted attachment.
    pub max_attachment_bytes: u64,
    /// Deep-link prefix.
    pub link_base: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        PrimeBugConfig::default().service_settings()
    }
}

impl ServiceSettings {
    /// Join `path` onto the link base.
    #[must_use]
    pub fn link(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.link_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PrimeBugConfig::default();
        assert_eq!(config.storage.backend, BackendKind::Jsonl);
        assert_eq!(config.storage.data_file, ".primebug/documents.jsonl");
        assert_eq!(config.attachments.directory, ".primebug/blobs");
        assert_eq!(config.attachments.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.transactions.max_attempts, 5);
        assert_eq!(config.notifications.max_delivery_attempts, 3);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: PrimeBugConfig =
            serde_yaml::from_str("storage:\n  backend: memory\n").unwrap();
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert_eq!(config.storage.data_file, ".primebug/documents.jsonl");
        assert_eq!(config.transactions.max_attempts, 5);
    }

    #[tokio::test]
    async fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        let mut original = PrimeBugConfig::default();
        original.notifications.link_base = "https://bugs.example.com".to_string();
        original.save(&path).await.unwrap();

        let loaded = PrimeBugConfig::load(&path).await.unwrap();
        assert_eq!(original, loaded);
    }

    #[tokio::test]
    async fn test_zero_attempts_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, "transactions:\n  max_attempts: 0\n")
            .await
            .unwrap();

        let err = PrimeBugConfig::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_backend_resolution() {
        let root = Path::new("/work");
        let config = PrimeBugConfig::default();
        assert_eq!(
            config.storage.to_backend(root).unwrap(),
            StoreBackend::Jsonl(PathBuf::from("/work/.primebug/documents.jsonl"))
        );

        let memory = StorageConfig {
            backend: BackendKind::Memory,
            ..StorageConfig::default()
        };
        assert_eq!(memory.to_backend(root).unwrap(), StoreBackend::InMemory);
    }

    #[test]
    fn test_link_joins_without_double_slash() {
        let settings = ServiceSettings {
            link_base: "https://bugs.example.com/".to_string(),
            ..ServiceSettings::default()
        };
        assert_eq!(
            settings.link("/projects/web"),
            "https://bugs.example.com/projects/web"
        );
        assert_eq!(ServiceSettings::default().link("bugs/b1"), "/bugs/b1");
    }
}
