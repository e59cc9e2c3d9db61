//! Filesystem over a store with native directories.

use async_trait::async_trait;
use std::time::Instant;

use super::ops::{FileSystem, FsOptions};
use super::path::PathResolver;
use super::stat_cache::StatCache;
use super::store::StoreOps;
use super::types::StatEntry;
use super::VfsResult;

/// [`FileSystem`] for stores that report directories in stat results and
/// support native `makedirs` and recursive delete.
pub struct NativeFs {
    store: Box<dyn StoreOps>,
    resolver: PathResolver,
    cache: StatCache,
    options: FsOptions,
}

impl std::fmt::Debug for NativeFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFs")
            .field("store", &self.store.name())
            .field("prefix", &self.resolver.prefix())
            .finish()
    }
}

impl NativeFs {
    /// Open the filesystem, creating the root directory if needed.
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
            cache: options.stat_cache(),
            resolver,
            options,
        };
        fs.ensure_root().await?;
        tracing::info!(store = fs.store.name(), prefix = %fs.resolver.prefix(), "opened native filesystem");
        Ok(fs)
    }
}

#[async_trait]
impl FileSystem for NativeFs {
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
        let backend = self.resolver.resolve(path);
        let now = Instant::now();
        match self.store.stat(&backend).await {
            Ok(meta) => Ok(StatEntry::from_meta(&meta, now)),
            Err(e) if e.is_not_found() => Ok(StatEntry::absent(now)),
            Err(e) => Err(e),
        }
    }

    async fn mkdir(&self, path: &str) -> VfsResult<()> {
        let backend = self.resolver.resolve(path);
        tracing::debug!(path = %backend, "making dir");
        self.store.make_directory(&backend).await?;
        self.forget(path);
        Ok(())
    }

    async fn remove_directory(&self, path: &str) -> VfsResult<()> {
        self.store.remove_tree(&self.resolver.resolve(path)).await
    }
}
