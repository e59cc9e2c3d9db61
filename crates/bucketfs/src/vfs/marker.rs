//! Filesystem over a flat object store, with emulated directories.
//!
//! A flat store only has keys. A directory exists here if its marker
//! object (`dir/<marker>`) exists, or if any object lives beneath
//! `dir/`. The second rule covers trees written by other tools that never
//! created markers, including directories that only hold subdirectories.

use async_trait::async_trait;
use std::time::Instant;

use super::ops::{FileSystem, FsOptions};
use super::path::PathResolver;
use super::stat_cache::StatCache;
use super::store::StoreOps;
use super::types::StatEntry;
use super::VfsResult;

/// Directory existence, creation, and deletion via marker objects.
#[derive(Debug, Clone)]
pub struct DirectoryEmulator {
    marker_name: String,
}

impl DirectoryEmulator {
    pub fn new(marker_name: impl Into<String>) -> Self {
        Self {
            marker_name: marker_name.into(),
        }
    }

    pub fn marker_name(&self) -> &str {
        &self.marker_name
    }

    /// Backend path of the marker object for logical directory `path`.
    pub fn marker_path(&self, resolver: &PathResolver, path: &str) -> String {
        resolver.resolve_child(path, &self.marker_name)
    }

    /// Classify a logical path against a flat store.
    ///
    /// An object with its own metadata is a file; otherwise a marker or any
    /// descendant makes it a directory.
    pub async fn classify(
        &self,
        store: &dyn StoreOps,
        resolver: &PathResolver,
        path: &str,
    ) -> VfsResult<StatEntry> {
        let backend = resolver.resolve(path);
        let now = Instant::now();

        match store.stat(&backend).await {
            Ok(meta) => return Ok(StatEntry::from_meta(&meta, now)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        match store.stat(&self.marker_path(resolver, path)).await {
            Ok(marker) => {
                return Ok(StatEntry {
                    mtime: marker.mtime,
                    ..StatEntry::implicit_directory(now)
                });
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        if store.list(&backend).await?.is_empty() {
            Ok(StatEntry::absent(now))
        } else {
            tracing::trace!(path = %backend, "directory without marker");
            Ok(StatEntry::implicit_directory(now))
        }
    }

    /// Create the marker for logical directory `path`.
    pub async fn create(
        &self,
        store: &dyn StoreOps,
        resolver: &PathResolver,
        path: &str,
    ) -> VfsResult<()> {
        let marker = self.marker_path(resolver, path);
        tracing::debug!(path = %marker, "making dir (touch)");
        store.make_directory(&marker).await
    }

    /// Delete every object beneath logical directory `path`, marker included.
    pub async fn remove(
        &self,
        store: &dyn StoreOps,
        resolver: &PathResolver,
        path: &str,
    ) -> VfsResult<()> {
        let backend = resolver.resolve(path);
        for object in store.walk(&backend).await? {
            tracing::trace!(path = %object, "removing object");
            match store.delete_object(&object).await {
                Err(e) if !e.is_not_found() => return Err(e),
                _ => {}
            }
        }
        Ok(())
    }
}

/// [`FileSystem`] for flat object stores.
pub struct MarkerFs {
    store: Box<dyn StoreOps>,
    resolver: PathResolver,
    dirs: DirectoryEmulator,
    cache: StatCache,
    options: FsOptions,
}

impl std::fmt::Debug for MarkerFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerFs")
            .field("store", &self.store.name())
            .field("prefix", &self.resolver.prefix())
            .field("marker", &self.dirs.marker_name())
            .finish()
    }
}

impl MarkerFs {
    /// Open the filesystem, writing the root marker if needed.
    ///
    /// Fails with an invariant violation if the root is not a directory
    /// afterwards.
    pub async fn open(
        store: impl StoreOps + 'static,
        resolver: PathResolver,
        options: FsOptions,
    ) -> VfsResult<Self> {
        let fs = Self {
            store: Box::new(store),
            dirs: DirectoryEmulator::new(options.marker_name.clone()),
            cache: options.stat_cache(),
            resolver,
            options,
        };
        fs.ensure_root().await?;
        tracing::info!(
            store = fs.store.name(),
            prefix = %fs.resolver.prefix(),
            marker = %fs.dirs.marker_name(),
            "opened marker filesystem"
        );
        Ok(fs)
    }

    pub fn directories(&self) -> &DirectoryEmulator {
        &self.dirs
    }
}

#[async_trait]
impl FileSystem for MarkerFs {
    fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    fn store(&self) -> &dyn StoreOps {
        self.store.as_ref()
    }

    fn cache(&self) -> &StatCache {
        &self.cache
    }

    fn options(&self) -> &FsOptions {
        &self.options
    }

    async fn stat_uncached(&self, path: &str) -> VfsResult<StatEntry> {
        self.dirs
            .classify(self.store.as_ref(), &self.resolver, path)
            .await
    }

    async fn mkdir(&self, path: &str) -> VfsResult<()> {
        self.dirs
            .create(self.store.as_ref(), &self.resolver, path)
            .await?;
        self.forget(path);
        Ok(())
    }

    async fn remove_directory(&self, path: &str) -> VfsResult<()> {
        self.dirs
            .remove(self.store.as_ref(), &self.resolver, path)
            .await
    }
}
