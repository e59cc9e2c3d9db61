//! Flat object store backend.
//!
//! Wraps any [`object_store::ObjectStore`] (Google Cloud Storage in
//! production, `InMemory` for tests). Keys are flat: there are no directory
//! objects, only common key prefixes, so directory semantics are emulated
//! one layer up by [`MarkerFs`](crate::vfs::MarkerFs).
//!
//! Backend paths start with the container (bucket) name, which is stripped
//! before talking to the store, since a store handle addresses one bucket.

use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutPayload};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::store::{ObjectReader, ObjectWriter, StoreOps};
use crate::vfs::types::{ObjectKind, ObjectMeta, WriteMode};

/// Adapter from [`StoreOps`] onto a bucket-scoped object store.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    container: String,
}

impl ObjectStoreBackend {
    /// Wrap a store handle for `container`.
    pub fn new(store: Arc<dyn ObjectStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    /// In-memory bucket. All data is lost when dropped.
    pub fn memory(container: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), container)
    }

    /// Google Cloud Storage bucket.
    ///
    /// Credentials come from `token_path` (a service account JSON file) when
    /// given, otherwise from the `GOOGLE_*` environment variables.
    pub fn gcs(bucket: &str, token_path: Option<&Path>) -> VfsResult<Self> {
        let mut builder =
            object_store::gcp::GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket);
        if let Some(token) = token_path {
            builder = builder.with_service_account_path(token.to_string_lossy());
        }
        let store = builder.build()?;
        Ok(Self::new(Arc::new(store), bucket))
    }

    /// The wrapped store handle.
    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Object key for a backend path.
    ///
    /// Keys are taken verbatim, never percent-encoded, so a key read back
    /// from a listing addresses the same object.
    fn key(&self, path: &str) -> VfsResult<StorePath> {
        let path = path.trim_matches('/');
        let raw = if self.container.is_empty() {
            path
        } else {
            match path.strip_prefix(self.container.as_str()) {
                Some("") => return Ok(StorePath::default()),
                Some(rest) if rest.starts_with('/') => &rest[1..],
                _ => {
                    return Err(VfsError::invalid_path(format!(
                        "{path} is outside container {}",
                        self.container
                    )));
                }
            }
        };
        StorePath::parse(raw).map_err(|e| VfsError::invalid_path(format!("{path}: {e}")))
    }

    /// Backend path for an object key.
    fn backend_path(&self, key: &StorePath) -> String {
        let key = key.as_ref();
        match (self.container.is_empty(), key.is_empty()) {
            (true, _) => key.to_string(),
            (false, true) => self.container.clone(),
            (false, false) => format!("{}/{}", self.container, key),
        }
    }

    fn map_err(path: &str, e: object_store::Error) -> VfsError {
        match e {
            object_store::Error::NotFound { .. } => VfsError::not_found(path),
            other => VfsError::Backend(other),
        }
    }

    fn prefix_arg(key: &StorePath) -> Option<&StorePath> {
        if key.as_ref().is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

#[async_trait]
impl StoreOps for ObjectStoreBackend {
    fn name(&self) -> &str {
        "object"
    }

    async fn list(&self, path: &str) -> VfsResult<Vec<String>> {
        let key = self.key(path)?;
        let listing = self
            .store
            .list_with_delimiter(Self::prefix_arg(&key))
            .await
            .map_err(|e| Self::map_err(path, e))?;

        let prefixes = listing.common_prefixes.iter();
        let objects = listing
            .objects
            .iter()
            .map(|meta| &meta.location)
            .filter(|location| **location != key);
        Ok(prefixes
            .chain(objects)
            .map(|location| self.backend_path(location))
            .collect())
    }

    async fn stat(&self, path: &str) -> VfsResult<ObjectMeta> {
        let key = self.key(path)?;
        // the bucket root is never an object
        if key.as_ref().is_empty() {
            return Err(VfsError::not_found(path));
        }
        let meta = self
            .store
            .head(&key)
            .await
            .map_err(|e| Self::map_err(path, e))?;
        Ok(ObjectMeta {
            kind: ObjectKind::File,
            size: meta.size as u64,
            mtime: SystemTime::from(meta.last_modified),
        })
    }

    async fn exists(&self, path: &str) -> VfsResult<bool> {
        match self.stat(path).await {
            Ok(_) => return Ok(true),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        Ok(!self.list(path).await?.is_empty())
    }

    async fn open_read(&self, path: &str) -> VfsResult<Box<dyn ObjectReader>> {
        let size = self.stat(path).await?.size;
        Ok(Box::new(RangeReader {
            store: Arc::clone(&self.store),
            location: self.key(path)?,
            path: path.to_string(),
            size,
            offset: 0,
        }))
    }

    async fn open_write(&self, path: &str, mode: WriteMode) -> VfsResult<Box<dyn ObjectWriter>> {
        let location = self.key(path)?;
        if location.as_ref().is_empty() {
            return Err(VfsError::invalid_path(path));
        }
        Ok(Box::new(BufferedWriter {
            store: Arc::clone(&self.store),
            location,
            path: path.to_string(),
            mode,
            buf: Vec::new(),
        }))
    }

    async fn copy_object(&self, from: &str, to: &str) -> VfsResult<()> {
        let (src, dst) = (self.key(from)?, self.key(to)?);
        self.store
            .copy(&src, &dst)
            .await
            .map_err(|e| Self::map_err(from, e))
    }

    async fn delete_object(&self, path: &str) -> VfsResult<()> {
        let key = self.key(path)?;
        self.store
            .delete(&key)
            .await
            .map_err(|e| Self::map_err(path, e))
    }

    async fn walk(&self, path: &str) -> VfsResult<Vec<String>> {
        let key = self.key(path)?;
        let objects: Vec<object_store::ObjectMeta> = self
            .store
            .list(Self::prefix_arg(&key))
            .try_collect()
            .await
            .map_err(|e| Self::map_err(path, e))?;
        Ok(objects
            .iter()
            .map(|meta| self.backend_path(&meta.location))
            .collect())
    }

    async fn make_directory(&self, path: &str) -> VfsResult<()> {
        let mut sink = self.open_write(path, WriteMode::Truncate).await?;
        sink.write(&[]).await?;
        sink.finish().await
    }
}

/// Reads an object one ranged GET per chunk.
struct RangeReader {
    store: Arc<dyn ObjectStore>,
    location: StorePath,
    path: String,
    size: u64,
    offset: u64,
}

#[async_trait]
impl ObjectReader for RangeReader {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read_chunk(&mut self, max: usize) -> VfsResult<Option<Vec<u8>>> {
        if self.offset >= self.size || max == 0 {
            return Ok(None);
        }
        let start = self.offset as usize;
        let end = (self.offset + max as u64).min(self.size) as usize;
        let bytes = self
            .store
            .get_range(&self.location, start..end)
            .await
            .map_err(|e| ObjectStoreBackend::map_err(&self.path, e))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        self.offset += bytes.len() as u64;
        Ok(Some(bytes.to_vec()))
    }

    async fn read_to_end(&mut self) -> VfsResult<Vec<u8>> {
        if self.offset >= self.size {
            return Ok(Vec::new());
        }
        let map_err = |e: object_store::Error| ObjectStoreBackend::map_err(&self.path, e);
        // single GET for the remainder
        let bytes = if self.offset == 0 {
            self.store
                .get(&self.location)
                .await
                .map_err(map_err)?
                .bytes()
                .await
                .map_err(map_err)?
        } else {
            self.store
                .get_range(&self.location, self.offset as usize..self.size as usize)
                .await
                .map_err(map_err)?
        };
        self.offset = self.size.max(self.offset + bytes.len() as u64);
        Ok(bytes.to_vec())
    }
}

/// Collects writes and uploads the object in one PUT on finish.
struct BufferedWriter {
    store: Arc<dyn ObjectStore>,
    location: StorePath,
    path: String,
    mode: WriteMode,
    buf: Vec<u8>,
}

#[async_trait]
impl ObjectWriter for BufferedWriter {
    async fn write(&mut self, data: &[u8]) -> VfsResult<()> {
        self.buf.extend_from_slice(data);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> VfsResult<()> {
        let BufferedWriter {
            store,
            location,
            path,
            mode,
            buf,
        } = *self;

        let body = match mode {
            WriteMode::Truncate => buf,
            WriteMode::Append => {
                let mut existing = match store.get(&location).await {
                    Ok(result) => result
                        .bytes()
                        .await
                        .map_err(|e| ObjectStoreBackend::map_err(&path, e))?
                        .to_vec(),
                    Err(object_store::Error::NotFound { .. }) => Vec::new(),
                    Err(e) => return Err(VfsError::Backend(e)),
                };
                existing.extend_from_slice(&buf);
                existing
            }
        };

        store
            .put(&location, PutPayload::from(body))
            .await
            .map_err(|e| ObjectStoreBackend::map_err(&path, e))?;
        Ok(())
    }
}
