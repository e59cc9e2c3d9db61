//! Store backends.
//!
//! Backends implement [`StoreOps`](crate::vfs::StoreOps) for different
//! storage types: a native-directory store and a flat object store.

mod local;
mod object;

pub use local::LocalStore;
pub use object::ObjectStoreBackend;
