//! Backend adapter contract.
//!
//! A store speaks backend-absolute paths (container + prefix + logical
//! path) and knows nothing about caching, hidden files, or content
//! encodings. The filesystem layer composes these verbs into directory
//! semantics.

use async_trait::async_trait;

use super::types::{ObjectMeta, WriteMode};
use super::VfsResult;

/// Object-store operations used by the filesystem layer.
#[async_trait]
pub trait StoreOps: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Immediate children of `path`, as backend-absolute paths.
    ///
    /// Flat stores synthesize directory children from common key prefixes.
    /// A missing path lists as empty.
    async fn list(&self, path: &str) -> VfsResult<Vec<String>>;

    /// Metadata for the object at `path`.
    ///
    /// Returns a not-found error when no object exists. On flat stores this
    /// includes key prefixes that only have descendants.
    async fn stat(&self, path: &str) -> VfsResult<ObjectMeta>;

    /// Returns true if an object or a non-empty prefix exists at `path`.
    async fn exists(&self, path: &str) -> VfsResult<bool>;

    /// Open the object at `path` for sequential reading.
    async fn open_read(&self, path: &str) -> VfsResult<Box<dyn ObjectReader>>;

    /// Open a sink that stores its bytes at `path` when finished.
    async fn open_write(&self, path: &str, mode: WriteMode) -> VfsResult<Box<dyn ObjectWriter>>;

    /// Server-side copy of a single object.
    async fn copy_object(&self, from: &str, to: &str) -> VfsResult<()>;

    /// Delete a single object.
    async fn delete_object(&self, path: &str) -> VfsResult<()>;

    /// Every object beneath `path`, as backend-absolute paths.
    async fn walk(&self, path: &str) -> VfsResult<Vec<String>>;

    /// Make `path` addressable as a directory.
    ///
    /// Native stores create the directory and its parents. Flat stores have
    /// nothing to create, so they write a zero-length object at `path`;
    /// directory emulation passes the marker path here.
    async fn make_directory(&self, path: &str) -> VfsResult<()>;

    /// Delete `path` and everything beneath it.
    ///
    /// The default walks and deletes objects one by one. Stores with a
    /// native recursive delete override this.
    async fn remove_tree(&self, path: &str) -> VfsResult<()> {
        for object in self.walk(path).await? {
            self.delete_object(&object).await?;
        }
        Ok(())
    }
}

/// Sequential reader over one object.
///
/// Dropping the reader releases the underlying handle.
#[async_trait]
pub trait ObjectReader: Send {
    /// Total object size in bytes.
    fn size(&self) -> u64;

    /// Read up to `max` bytes. Returns `None` at end of object.
    async fn read_chunk(&mut self, max: usize) -> VfsResult<Option<Vec<u8>>>;

    /// Release the handle.
    async fn close(self: Box<Self>) -> VfsResult<()> {
        Ok(())
    }

    /// Read everything that remains.
    async fn read_to_end(&mut self) -> VfsResult<Vec<u8>> {
        const STEP: usize = 1024 * 1024;
        let mut out = Vec::with_capacity(self.size() as usize);
        while let Some(chunk) = self.read_chunk(STEP).await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

/// Write sink for one object.
///
/// Data is only guaranteed durable after [`finish`](ObjectWriter::finish).
#[async_trait]
pub trait ObjectWriter: Send {
    async fn write(&mut self, data: &[u8]) -> VfsResult<()>;

    /// Commit the written bytes.
    async fn finish(self: Box<Self>) -> VfsResult<()>;
}
