//! Filesystem configuration.
//!
//! Configuration is RON:
//!
//! ```ron
//! (
//!     backend: Gcs,
//!     project: Some("my-project"),
//!     token_path: Some("~/.config/gcloud/sa.json"),
//!     bucket: "notebooks",
//!     prefix: "team-a",
//! )
//! ```
//!
//! Every field has a default, so `()` is a valid (GCS, bucket `notebooks`)
//! configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::vfs::{
    DEFAULT_CAPACITY, DEFAULT_CHUNK_SIZE, DEFAULT_LARGE_FILE_THRESHOLD, FileSystem, FsOptions,
    LocalStore, MarkerFs, NativeFs, ObjectStoreBackend, PathResolver, VfsError, VfsResult,
};

/// Which store backs the filesystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum BackendKind {
    /// Local directory tree with native directories.
    Local,
    /// Google Cloud Storage bucket with marker directories.
    #[default]
    Gcs,
    /// In-memory object store with marker directories. Not persistent.
    Memory,
}

impl BackendKind {
    /// Returns true for flat object stores.
    pub fn is_object_store(&self) -> bool {
        matches!(self, BackendKind::Gcs | BackendKind::Memory)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    pub backend: BackendKind,
    /// Cloud project the bucket belongs to. Informational only; the bucket
    /// name is globally unique.
    pub project: Option<String>,
    /// Service account JSON for GCS. `~` is expanded.
    pub token_path: Option<String>,
    /// Container: the bucket, or the first directory under `local_root`.
    pub bucket: String,
    /// Root prefix inside the container.
    pub prefix: String,
    pub separator: String,
    pub marker_name: String,
    /// Base directory for the `Local` backend. `~` is expanded.
    pub local_root: Option<String>,
    pub large_file_threshold: u64,
    pub chunk_size: usize,
    pub stat_ttl_ms: u64,
    pub stat_capacity: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        let options = FsOptions::default();
        Self {
            backend: BackendKind::default(),
            project: None,
            token_path: None,
            bucket: "notebooks".to_string(),
            prefix: String::new(),
            separator: "/".to_string(),
            marker_name: options.marker_name,
            local_root: None,
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            stat_ttl_ms: options.stat_ttl.as_millis() as u64,
            stat_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl FsConfig {
    /// Parse a RON configuration.
    pub fn from_ron(text: &str) -> VfsResult<Self> {
        ron::from_str(text).map_err(|e| VfsError::config(format!("invalid config: {e}")))
    }

    /// Load a RON configuration file.
    pub fn load(path: impl AsRef<Path>) -> VfsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| VfsError::config(format!("reading {}: {e}", path.display())))?;
        Self::from_ron(&text)
    }

    pub fn resolver(&self) -> PathResolver {
        PathResolver::new(&self.bucket, &self.prefix, self.separator.as_str())
    }

    pub fn options(&self) -> FsOptions {
        FsOptions {
            large_file_threshold: self.large_file_threshold,
            chunk_size: self.chunk_size,
            stat_ttl: Duration::from_millis(self.stat_ttl_ms),
            stat_capacity: self.stat_capacity,
            marker_name: self.marker_name.clone(),
        }
    }

    /// Check the configuration for inconsistencies.
    pub fn validate(&self) -> VfsResult<()> {
        if self.separator.is_empty() {
            return Err(VfsError::config("separator must not be empty"));
        }
        if self.backend.is_object_store() && self.separator != "/" {
            return Err(VfsError::config(format!(
                "{:?} backend requires separator \"/\", got {:?}",
                self.backend, self.separator
            )));
        }
        if self.chunk_size == 0 {
            return Err(VfsError::config("chunk_size must be positive"));
        }
        if self.marker_name.is_empty() || self.marker_name.contains(self.separator.as_str()) {
            return Err(VfsError::config(format!(
                "invalid marker name {:?}",
                self.marker_name
            )));
        }
        if self.backend == BackendKind::Local && self.local_root.is_none() {
            return Err(VfsError::config("Local backend requires local_root"));
        }
        Ok(())
    }

    /// Token path with `~` expanded.
    pub fn token_path(&self) -> Option<PathBuf> {
        self.token_path.as_deref().map(expand)
    }

    /// Local root with `~` expanded.
    pub fn local_root(&self) -> Option<PathBuf> {
        self.local_root.as_deref().map(expand)
    }

    /// Build the configured filesystem.
    ///
    /// The root directory is created if missing; a root that still does not
    /// classify as a directory fails with an invariant violation.
    pub async fn open(&self) -> VfsResult<Box<dyn FileSystem>> {
        self.validate()?;
        tracing::info!(
            backend = ?self.backend,
            project = self.project.as_deref().unwrap_or("-"),
            bucket = %self.bucket,
            prefix = %self.prefix,
            "opening filesystem"
        );

        let resolver = self.resolver();
        let options = self.options();
        match self.backend {
            BackendKind::Local => {
                let root = self
                    .local_root()
                    .ok_or_else(|| VfsError::config("Local backend requires local_root"))?;
                std::fs::create_dir_all(&root)?;
                let store = LocalStore::new(root).with_separator(self.separator.clone());
                Ok(Box::new(NativeFs::open(store, resolver, options).await?))
            }
            BackendKind::Gcs => {
                let token = self.token_path();
                let store = ObjectStoreBackend::gcs(&self.bucket, token.as_deref())?;
                Ok(Box::new(MarkerFs::open(store, resolver, options).await?))
            }
            BackendKind::Memory => {
                let store = ObjectStoreBackend::memory(self.bucket.clone());
                Ok(Box::new(MarkerFs::open(store, resolver, options).await?))
            }
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
