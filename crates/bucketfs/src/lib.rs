//! # bucketfs
//!
//! Hierarchical filesystem semantics over object storage.
//!
//! Callers speak logical paths relative to a configured root
//! (`container/prefix`). Two variants implement [`FileSystem`]:
//! - [`NativeFs`] for stores with real directories
//! - [`MarkerFs`] for flat object stores, where a directory is a marker
//!   object or any key beneath the directory prefix
//!
//! Classification results are cached briefly in a [`StatCache`]; large files
//! are read as a [`ChunkStream`].

pub mod config;
pub mod vfs;

pub use config::{BackendKind, FsConfig};
pub use vfs::{
    ChunkStream, ContentFormat, EntryKind, FileContent, FileSystem, FsOptions, LocalStore,
    MarkerFs, NativeFs, ObjectStoreBackend, PathResolver, StatCache, StatEntry, StoreOps,
    VfsError, VfsResult, WriteMode,
};
