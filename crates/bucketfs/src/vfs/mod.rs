//! Hierarchical filesystem over object storage.
//!
//! Key components:
//!
//! - [`FileSystem`] - Logical-path operations shared by every variant
//! - [`NativeFs`] - Stores with real directories ([`LocalStore`])
//! - [`MarkerFs`] - Flat stores with marker-emulated directories
//!   ([`ObjectStoreBackend`])
//! - [`PathResolver`] - Logical ↔ backend path mapping
//! - [`StatCache`] - Short-lived classification cache
//!
//! ## Design Decisions
//!
//! - **Logical paths everywhere**: callers never see the container or
//!   prefix; every operation resolves internally.
//! - **Negative caching**: an absent path is cached like any other stat,
//!   and local mutations invalidate what they touch.
//! - **Best effort**: recursive copy, move, and remove are sequential and
//!   not atomic.

pub mod backends;
mod chunks;
mod error;
mod marker;
mod native;
mod ops;
mod path;
mod stat_cache;
mod store;
mod types;

pub use backends::{LocalStore, ObjectStoreBackend};
pub use chunks::{ChunkStream, DEFAULT_CHUNK_SIZE};
pub use error::{VfsError, VfsResult};
pub use marker::{DirectoryEmulator, MarkerFs};
pub use native::NativeFs;
pub use ops::{
    DEFAULT_LARGE_FILE_THRESHOLD, FileSystem, FsOptions, decode_content, encode_content, is_hidden,
};
pub use path::PathResolver;
pub use stat_cache::{DEFAULT_CAPACITY, DEFAULT_TTL, StatCache};
pub use store::{ObjectReader, ObjectWriter, StoreOps};
pub use types::{
    ContentFormat, EntryKind, FileContent, ObjectKind, ObjectMeta, StatEntry, WriteMode,
};
