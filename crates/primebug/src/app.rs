//! Application context for CLI command execution.
//!
//! [`App`] locates the workspace, loads its configuration and assembles
//! the [`Backend`] every command runs against.
//!
//! # Example
//!
//! ```no_run
//! use primebug::app::App;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::from_directory(Path::new(".")).await?;
//!     // Execute commands using app.backend()...
//!     app.save().await?;
//!     Ok(())
//! }
//! ```

use crate::blob::FsBlobStore;
use crate::commands::init::find_primebug_root;
use crate::config::{PrimeBugConfig, CONFIG_FILE_NAME, PRIMEBUG_DIR_NAME};
use crate::error::{Error, Result};
use crate::services::Backend;
use primebug_docstore::open_store;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Application context for CLI operations.
#[derive(Debug)]
pub struct App {
    backend: Backend,

    /// Directory containing `.primebug/`
    root_dir: PathBuf,

    /// Path to the `.primebug` directory
    primebug_dir: PathBuf,
}

impl App {
    /// Create an App instance from the given working directory.
    ///
    /// Searches up the directory tree for `.primebug/`, loads the
    /// configuration and opens the document and blob stores.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No workspace is found in the directory tree
    /// - Configuration cannot be loaded
    /// - Storage initialization fails
    pub async fn from_directory(working_dir: &Path) -> Result<Self> {
        let root_dir = find_primebug_root(working_dir).ok_or_else(|| {
            Error::Config(
                "Not a primebug workspace (or any parent directory). Run 'primebug init' first."
                    .to_string(),
            )
        })?;

        let primebug_dir = root_dir.join(PRIMEBUG_DIR_NAME);
        let config = PrimeBugConfig::load(&primebug_dir.join(CONFIG_FILE_NAME)).await?;

        let store = open_store(config.storage.to_backend(&root_dir)?).await?;
        let blobs = FsBlobStore::new(config.blob_dir(&root_dir));
        let backend = Backend::new(store, Arc::new(blobs), config.service_settings());

        tracing::debug!(root = %root_dir.display(), "Opened workspace");

        Ok(Self {
            backend,
            root_dir,
            primebug_dir,
        })
    }

    /// The services backend.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Directory containing `.primebug/`.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Path to the `.primebug` directory.
    pub fn primebug_dir(&self) -> &Path {
        &self.primebug_dir
    }

    /// Deliver queued notifications and persist the document store.
    ///
    /// Call after any mutating command.
    pub async fn save(&self) -> Result<()> {
        let report = self.backend.flush_notifications().await;
        if report.dropped > 0 {
            tracing::warn!(dropped = report.dropped, "Some notifications were not delivered");
        }
        self.backend.save().await
    }
}
