//! Core filesystem types.

use serde::{Deserialize, Serialize};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::chunks::ChunkStream;

/// Classification of a logical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file (an object with its own data).
    File,
    /// Directory (native, or emulated with a marker/descendants).
    Directory,
    /// The backend reported nothing at this path.
    Absent,
}

impl EntryKind {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    /// Returns true if nothing exists at the path.
    pub fn is_absent(&self) -> bool {
        matches!(self, EntryKind::Absent)
    }
}

/// Kind reported by a backend stat call. Backends never report absence as a
/// kind; they return a not-found error instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    File,
    Directory,
}

/// Raw metadata returned by [`StoreOps::stat`](super::StoreOps::stat).
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub kind: ObjectKind,
    pub size: u64,
    pub mtime: SystemTime,
}

/// Cached stat record for a logical path.
#[derive(Debug, Clone)]
pub struct StatEntry {
    /// When the record was fetched from the backend.
    pub retrieved_at: Instant,
    /// Last modification time; `UNIX_EPOCH` when unknown or absent.
    pub mtime: SystemTime,
    /// Object size; `None` for absent paths and emulated directories.
    pub size: Option<u64>,
    pub kind: EntryKind,
}

impl StatEntry {
    /// A negative result: the backend reported not-found.
    pub fn absent(retrieved_at: Instant) -> Self {
        Self {
            retrieved_at,
            mtime: UNIX_EPOCH,
            size: None,
            kind: EntryKind::Absent,
        }
    }

    /// Build an entry from backend metadata.
    pub fn from_meta(meta: &ObjectMeta, retrieved_at: Instant) -> Self {
        let kind = match meta.kind {
            ObjectKind::File => EntryKind::File,
            ObjectKind::Directory => EntryKind::Directory,
        };
        Self {
            retrieved_at,
            mtime: meta.mtime,
            size: Some(meta.size),
            kind,
        }
    }

    /// A directory with no metadata of its own (emulated from descendants).
    pub fn implicit_directory(retrieved_at: Instant) -> Self {
        Self {
            retrieved_at,
            mtime: UNIX_EPOCH,
            size: None,
            kind: EntryKind::Directory,
        }
    }

    /// Modification time in milliseconds since the epoch (0 if unknown).
    pub fn mtime_millis(&self) -> u64 {
        self.mtime
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Content encoding of file data crossing the filesystem boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    /// UTF-8 text.
    Text,
    /// Base64-encoded bytes.
    Base64,
}

impl ContentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFormat::Text => "text",
            ContentFormat::Base64 => "base64",
        }
    }
}

/// How `write` treats existing content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    /// Replace any existing object.
    #[default]
    Truncate,
    /// Append to the existing object (created if missing).
    Append,
}

/// Result of [`FileSystem::read`](super::FileSystem::read).
#[derive(Debug)]
pub enum FileContent {
    /// Whole file decoded as UTF-8.
    Text(String),
    /// Whole file, base64-encoded.
    Base64(String),
    /// Large file streamed in fixed-size binary chunks.
    Chunked(ChunkStream),
}

impl FileContent {
    /// Encoding tag for this content. Chunked content is binary.
    pub fn format(&self) -> ContentFormat {
        match self {
            FileContent::Text(_) => ContentFormat::Text,
            FileContent::Base64(_) | FileContent::Chunked(_) => ContentFormat::Base64,
        }
    }

    /// Returns true if the content is streamed.
    pub fn is_chunked(&self) -> bool {
        matches!(self, FileContent::Chunked(_))
    }
}
