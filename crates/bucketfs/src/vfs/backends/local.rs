//! Native-directory store over a local directory.
//!
//! Directories are real, stat reports their kind directly, and recursive
//! delete and `makedirs` are native. The container is the first directory
//! below `root`.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::store::{ObjectReader, ObjectWriter, StoreOps};
use crate::vfs::types::{ObjectKind, ObjectMeta, WriteMode};

/// Local directory store.
///
/// Backend paths are relative to `root`. For example, with `root`
/// `/srv/buckets`, the backend path `notebooks/team/a.ipynb` is the file
/// `/srv/buckets/notebooks/team/a.ipynb`.
///
/// Path security is enforced: `.` and `..` segments are rejected, and a
/// path whose symlinks lead outside the root fails with `PathEscapesRoot`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    separator: String,
}

impl LocalStore {
    /// Create a store rooted at the given directory.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self {
            root,
            separator: "/".to_string(),
        }
    }

    /// Use a backend path separator other than `/`.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a backend path onto the local filesystem.
    ///
    /// The returned path is not canonicalized, so symlinks inside the root
    /// are operated on as links; their targets must still lie under the root.
    async fn resolve(&self, path: &str) -> VfsResult<PathBuf> {
        let mut full = self.root.clone();
        for segment in path.split(self.separator.as_str()).filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." || segment.contains(std::path::MAIN_SEPARATOR) {
                return Err(VfsError::path_escapes_root(path));
            }
            full.push(segment);
        }
        self.check_contained(&full).await?;
        Ok(full)
    }

    /// Canonicalize the deepest existing ancestor of `full` and verify it
    /// has not left the root through a symlink.
    async fn check_contained(&self, full: &Path) -> VfsResult<()> {
        let root = fs::canonicalize(&self.root)
            .await
            .unwrap_or_else(|_| self.root.clone());

        let mut ancestor = full.to_path_buf();
        let mut missing: Vec<OsString> = Vec::new();
        let canonical = loop {
            match fs::canonicalize(&ancestor).await {
                Ok(mut canonical) => {
                    canonical.extend(missing.iter().rev());
                    break canonical;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && ancestor != self.root => {
                    let Some(name) = ancestor.file_name().map(|n| n.to_os_string()) else {
                        return Ok(());
                    };
                    missing.push(name);
                    ancestor.pop();
                }
                // the root itself is missing; nothing below it can be a link
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(VfsError::Io(e)),
            }
        };

        if canonical.starts_with(&root) {
            Ok(())
        } else {
            Err(VfsError::path_escapes_root(format!(
                "{} is not under {}",
                canonical.display(),
                root.display()
            )))
        }
    }

    /// Backend path of a local path below `root`.
    fn backend_path(&self, local: &Path) -> String {
        local
            .strip_prefix(&self.root)
            .unwrap_or(local)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    fn map_io(path: &str, e: std::io::Error) -> VfsError {
        if e.kind() == std::io::ErrorKind::NotFound {
            VfsError::not_found(path)
        } else {
            VfsError::Io(e)
        }
    }

    fn metadata_to_meta(meta: &std::fs::Metadata) -> ObjectMeta {
        let kind = if meta.is_dir() {
            ObjectKind::Directory
        } else {
            ObjectKind::File
        };
        ObjectMeta {
            kind,
            size: if meta.is_dir() { 0 } else { meta.len() },
            mtime: meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        }
    }

    async fn ensure_parent(full: &Path) -> VfsResult<()> {
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StoreOps for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn list(&self, path: &str) -> VfsResult<Vec<String>> {
        let full = self.resolve(path).await?;
        match fs::metadata(&full).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(Vec::new()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(VfsError::Io(e)),
        }

        let mut children = Vec::new();
        let mut dir = fs::read_dir(&full).await?;
        while let Some(entry) = dir.next_entry().await? {
            children.push(self.backend_path(&entry.path()));
        }
        Ok(children)
    }

    async fn stat(&self, path: &str) -> VfsResult<ObjectMeta> {
        let full = self.resolve(path).await?;
        let meta = fs::metadata(&full)
            .await
            .map_err(|e| Self::map_io(path, e))?;
        Ok(Self::metadata_to_meta(&meta))
    }

    async fn exists(&self, path: &str) -> VfsResult<bool> {
        let full = self.resolve(path).await?;
        Ok(fs::try_exists(&full).await?)
    }

    async fn open_read(&self, path: &str) -> VfsResult<Box<dyn ObjectReader>> {
        let full = self.resolve(path).await?;
        let file = fs::File::open(&full)
            .await
            .map_err(|e| Self::map_io(path, e))?;
        let meta = file.metadata().await?;
        if meta.is_dir() {
            return Err(VfsError::no_such_file(path));
        }
        Ok(Box::new(LocalReader {
            file,
            size: meta.len(),
        }))
    }

    async fn open_write(&self, path: &str, mode: WriteMode) -> VfsResult<Box<dyn ObjectWriter>> {
        let full = self.resolve(path).await?;
        Self::ensure_parent(&full).await?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true);
        match mode {
            WriteMode::Truncate => options.truncate(true),
            WriteMode::Append => options.append(true),
        };
        let file = options.open(&full).await?;
        Ok(Box::new(LocalWriter { file }))
    }

    async fn copy_object(&self, from: &str, to: &str) -> VfsResult<()> {
        let src = self.resolve(from).await?;
        let dst = self.resolve(to).await?;
        Self::ensure_parent(&dst).await?;
        fs::copy(&src, &dst).await.map_err(|e| Self::map_io(from, e))?;
        Ok(())
    }

    async fn delete_object(&self, path: &str) -> VfsResult<()> {
        let full = self.resolve(path).await?;
        fs::remove_file(&full)
            .await
            .map_err(|e| Self::map_io(path, e))
    }

    async fn walk(&self, path: &str) -> VfsResult<Vec<String>> {
        let mut files = Vec::new();
        let mut pending = vec![self.resolve(path).await?];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(VfsError::Io(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    pending.push(entry.path());
                } else {
                    files.push(self.backend_path(&entry.path()));
                }
            }
        }
        Ok(files)
    }

    async fn make_directory(&self, path: &str) -> VfsResult<()> {
        let full = self.resolve(path).await?;
        fs::create_dir_all(&full).await?;
        Ok(())
    }

    async fn remove_tree(&self, path: &str) -> VfsResult<()> {
        let full = self.resolve(path).await?;
        let result = match fs::metadata(&full).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&full).await,
            Ok(_) => fs::remove_file(&full).await,
            Err(e) => Err(e),
        };
        match result {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => Ok(other?),
        }
    }
}

/// Open local file being read in chunks.
struct LocalReader {
    file: fs::File,
    size: u64,
}

#[async_trait]
impl ObjectReader for LocalReader {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read_chunk(&mut self, max: usize) -> VfsResult<Option<Vec<u8>>> {
        let mut buf = vec![0u8; max];
        let mut filled = 0;
        while filled < max {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf))
    }
}

/// Open local file being written.
struct LocalWriter {
    file: fs::File,
}

#[async_trait]
impl ObjectWriter for LocalWriter {
    async fn write(&mut self, data: &[u8]) -> VfsResult<()> {
        self.file.write_all(data).await?;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> VfsResult<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }
}
