//! Filesystem operations trait.
//!
//! [`FileSystem`] is the capability interface the content layer consumes.
//! Implementors supply path classification and the directory primitives
//! that differ between native-directory stores and flat stores; reads,
//! writes, listing, and the recursive copy/move/remove are composed here
//! from those primitives and the [`StoreOps`] verbs.
//!
//! Every operation takes a logical path and resolves it internally. Multi-step
//! operations are sequential and best-effort: a failure part way through
//! leaves whatever was already done in place.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::time::Duration;

use super::chunks::{ChunkStream, DEFAULT_CHUNK_SIZE};
use super::path::PathResolver;
use super::stat_cache::{DEFAULT_CAPACITY, DEFAULT_TTL, StatCache};
use super::store::StoreOps;
use super::types::{ContentFormat, EntryKind, FileContent, StatEntry, WriteMode};
use super::{VfsError, VfsResult};

/// Files larger than this are streamed in chunks instead of loaded whole.
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 8 * 1024 * 1024;

/// Tunables shared by both filesystem variants.
#[derive(Debug, Clone)]
pub struct FsOptions {
    pub large_file_threshold: u64,
    pub chunk_size: usize,
    pub stat_ttl: Duration,
    pub stat_capacity: usize,
    /// Marker object name for directory emulation.
    pub marker_name: String,
}

impl Default for FsOptions {
    fn default() -> Self {
        Self {
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            stat_ttl: DEFAULT_TTL,
            stat_capacity: DEFAULT_CAPACITY,
            marker_name: ".keep".to_string(),
        }
    }
}

impl FsOptions {
    /// A stat cache sized and timed by these options.
    pub fn stat_cache(&self) -> StatCache {
        StatCache::new(self.stat_ttl, self.stat_capacity)
    }
}

/// Returns true for names hidden from default listings.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Hierarchical filesystem over an object store.
#[async_trait]
pub trait FileSystem: Send + Sync {
    // ========================================================================
    // Required
    // ========================================================================

    fn resolver(&self) -> &PathResolver;

    fn store(&self) -> &dyn StoreOps;

    fn cache(&self) -> &StatCache;

    fn options(&self) -> &FsOptions;

    /// Classify `path` from the backend, bypassing the cache.
    ///
    /// Backend not-found must come back as an `Absent` entry, not an error.
    async fn stat_uncached(&self, path: &str) -> VfsResult<StatEntry>;

    /// Create a directory. Creating an existing directory is not an error.
    async fn mkdir(&self, path: &str) -> VfsResult<()>;

    /// Delete a directory and everything beneath it.
    async fn remove_directory(&self, path: &str) -> VfsResult<()>;

    // ========================================================================
    // Classification
    // ========================================================================

    /// Stat record for `path`, served from the cache while fresh.
    ///
    /// A missing path yields an `Absent` entry; the negative result is
    /// cached like any other.
    async fn lstat(&self, path: &str) -> VfsResult<StatEntry> {
        let key = self.resolver().unprefix(path);
        if let Some(st) = self.cache().get(&key) {
            return Ok(st);
        }
        tracing::debug!(path = %key, backend = self.store().name(), "lstat");
        let st = self.stat_uncached(&key).await?;
        self.cache().put(key, st.clone());
        Ok(st)
    }

    async fn is_file(&self, path: &str) -> VfsResult<bool> {
        Ok(self.lstat(path).await?.kind == EntryKind::File)
    }

    async fn is_dir(&self, path: &str) -> VfsResult<bool> {
        Ok(self.lstat(path).await?.kind == EntryKind::Directory)
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Immediate children of a directory, as logical paths.
    ///
    /// Order is whatever the backend lists. Hidden names are dropped unless
    /// `include_hidden` is set.
    async fn list(&self, path: &str, include_hidden: bool) -> VfsResult<Vec<String>> {
        let resolver = self.resolver();
        let backend = resolver.resolve(path);
        tracing::debug!(path = %backend, "listing directory");
        let children = self.store().list(&backend).await?;
        Ok(children
            .iter()
            .map(|child| resolver.unprefix(child))
            .filter(|child| include_hidden || !is_hidden(resolver.file_name(child)))
            .collect())
    }

    /// Read a file.
    ///
    /// Files above the large-file threshold come back as a
    /// [`ChunkStream`]. Smaller files are decoded as UTF-8 when `format` is
    /// `None` or `Text`, falling back to base64 only when no format was
    /// requested.
    async fn read(&self, path: &str, format: Option<ContentFormat>) -> VfsResult<FileContent> {
        let backend = self.resolver().resolve(path);
        if !self.is_file(path).await? {
            return Err(VfsError::no_such_file(backend));
        }

        // a cached File entry may outlive the object
        let mut reader = match self.store().open_read(&backend).await {
            Ok(reader) => reader,
            Err(e) if e.is_not_found() => {
                self.forget(path);
                return Err(VfsError::no_such_file(backend));
            }
            Err(e) => return Err(e),
        };
        let options = self.options();
        if reader.size() > options.large_file_threshold {
            tracing::debug!(path = %backend, size = reader.size(), "streaming large file");
            return Ok(FileContent::Chunked(ChunkStream::new(
                backend,
                reader,
                options.chunk_size,
            )));
        }

        tracing::debug!(path = %backend, "read");
        let bytes = reader.read_to_end().await?;
        reader.close().await?;
        decode_content(&backend, bytes, format)
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write a file. Base64 content is decoded to raw bytes first.
    async fn write(
        &self,
        path: &str,
        content: &str,
        format: ContentFormat,
        mode: WriteMode,
    ) -> VfsResult<()> {
        let backend = self.resolver().resolve(path);
        tracing::debug!(path = %backend, encoding = format.as_str(), ?mode, "writing file");
        let bytes = encode_content(&backend, content, format)?;

        let mut sink = self.store().open_write(&backend, mode).await?;
        sink.write(&bytes).await?;
        sink.finish().await?;
        self.forget(path);
        Ok(())
    }

    /// Remove a file, or a directory with everything beneath it.
    ///
    /// Removing a missing path does nothing.
    async fn remove(&self, path: &str) -> VfsResult<()> {
        let key = self.resolver().unprefix(path);
        if key.is_empty() {
            return Err(VfsError::invalid_path("cannot remove root"));
        }
        let backend = self.resolver().resolve(&key);
        tracing::debug!(path = %backend, "removing");

        match self.lstat(&key).await?.kind {
            EntryKind::File => {
                tracing::debug!(path = %backend, "removing file");
                match self.store().delete_object(&backend).await {
                    Err(e) if !e.is_not_found() => return Err(e),
                    _ => {}
                }
            }
            EntryKind::Directory => {
                tracing::debug!(path = %backend, "removing directory");
                self.remove_directory(&key).await?;
            }
            EntryKind::Absent => {}
        }
        self.forget(&key);
        Ok(())
    }

    /// Copy a file, or a directory tree child by child.
    ///
    /// An empty source directory becomes an empty destination directory.
    async fn copy(&self, src: &str, dst: &str) -> VfsResult<()> {
        let resolver = self.resolver();
        let (from, to) = (resolver.unprefix(src), resolver.unprefix(dst));
        if from == to {
            return Ok(());
        }
        tracing::debug!(
            from = %resolver.resolve(&from),
            to = %resolver.resolve(&to),
            "copying"
        );

        match self.lstat(&from).await?.kind {
            EntryKind::Directory => {
                if resolver.is_within(&to, &from) {
                    return Err(VfsError::invalid_path(format!(
                        "cannot copy {from} into itself ({to})"
                    )));
                }
                let children = self.list(&from, true).await?;
                if children.is_empty() {
                    self.mkdir(&to).await?;
                }
                for child in children {
                    match resolver.rebase(&child, &from, &to) {
                        Some(target) => self.copy(&child, &target).await?,
                        None => {
                            tracing::warn!(child = %child, dir = %from, "listed child outside directory");
                        }
                    }
                }
            }
            EntryKind::File => {
                self.store()
                    .copy_object(&resolver.resolve(&from), &resolver.resolve(&to))
                    .await?;
            }
            EntryKind::Absent => {
                tracing::warn!(path = %from, "copy source does not exist");
            }
        }
        self.forget(&to);
        Ok(())
    }

    /// Copy then remove the source. Not atomic.
    async fn mv(&self, src: &str, dst: &str) -> VfsResult<()> {
        tracing::debug!(from = %src, to = %dst, "moving");
        let resolver = self.resolver();
        if resolver.unprefix(src) == resolver.unprefix(dst) {
            return Ok(());
        }
        self.copy(src, dst).await?;
        self.remove(src).await
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Startup check: the root exists, lists, and is a directory.
    async fn ensure_root(&self) -> VfsResult<()> {
        self.mkdir("").await?;
        self.list("", false).await?;
        if !self.is_dir("").await? {
            return Err(VfsError::invariant(format!(
                "root directory {} does not exist",
                self.resolver().resolve("")
            )));
        }
        Ok(())
    }

    /// Drop cached stats invalidated by a local mutation of `path`.
    fn forget(&self, path: &str) {
        let resolver = self.resolver();
        let key = resolver.unprefix(path);
        self.cache().invalidate_tree(&key, resolver.separator());
        for ancestor in resolver.ancestors(&key) {
            self.cache().invalidate(&ancestor);
        }
    }
}

/// Bytes to write for `content` in `format`.
///
/// Base64 input may be line-wrapped; ASCII whitespace is ignored.
pub fn encode_content(path: &str, content: &str, format: ContentFormat) -> VfsResult<Vec<u8>> {
    match format {
        ContentFormat::Text => Ok(content.as_bytes().to_vec()),
        ContentFormat::Base64 => {
            let compact: String = content
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            STANDARD
                .decode(compact)
                .map_err(|source| VfsError::Decode {
                    path: path.to_string(),
                    source,
                })
        }
    }
}

/// Content for `bytes` read from `path`, honoring the requested format.
pub fn decode_content(
    path: &str,
    bytes: Vec<u8>,
    format: Option<ContentFormat>,
) -> VfsResult<FileContent> {
    match format {
        None | Some(ContentFormat::Text) => match String::from_utf8(bytes) {
            Ok(text) => Ok(FileContent::Text(text)),
            Err(_) if format == Some(ContentFormat::Text) => Err(VfsError::format(path)),
            Err(e) => Ok(FileContent::Base64(STANDARD.encode(e.into_bytes()))),
        },
        Some(ContentFormat::Base64) => Ok(FileContent::Base64(STANDARD.encode(bytes))),
    }
}
