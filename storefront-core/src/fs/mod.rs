//! Disk persistence: atomic JSON documents guarded by marker-file locks.

pub mod lock;
pub mod persistence;
pub mod store;

pub use lock::{with_lock, FileLock, LockGuard, LockOptions};
pub use store::{DocumentStore, JsonFileStore, MemoryStore, StoreGuard};
