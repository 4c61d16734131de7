//! File-based mutual exclusion for JSON documents.
//!
//! A document at `orders.json` is guarded by a marker file `orders.json.lock`.
//! Acquisition creates the marker with create-new semantics, so exactly one
//! caller wins even across processes sharing the same data directory.
//! Losers sleep for a fixed interval and retry until the attempt budget is spent.
//!
//! # Example
//!
//! ```ignore
//! let lock = FileLock::new("data/hotel_orders.json");
//! let guard = lock.acquire().await?;
//! // read, mutate, write the document
//! drop(guard); // marker removed
//! ```

use crate::error::{StoreError, StoreResult};
use log::{debug, warn};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default pause between two acquisition attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Default number of acquisition attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

/// Retry budget for lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub retry_interval: Duration,
    pub max_attempts: u32,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// A lock bound to one document path.
#[derive(Debug, Clone)]
pub struct FileLock {
    lock_path: PathBuf,
    options: LockOptions,
}

impl FileLock {
    pub fn new(document_path: impl AsRef<Path>) -> Self {
        Self::with_options(document_path, LockOptions::default())
    }

    pub fn with_options(document_path: impl AsRef<Path>, options: LockOptions) -> Self {
        Self {
            lock_path: lock_path_for(document_path.as_ref()),
            options,
        }
    }

    /// Path of the marker file.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Acquires the lock, retrying while another holder owns the marker.
    ///
    /// # Errors
    ///
    /// * [`StoreError::LockTimeout`] if the marker is still present after
    ///   `max_attempts` tries.
    /// * [`StoreError::Io`] immediately for any other IO failure.
    pub async fn acquire(&self) -> StoreResult<LockGuard> {
        let attempts = self.options.max_attempts.max(1);

        for attempt in 1..=attempts {
            // One synchronous syscall: no await point between creating the
            // marker and handing out the guard that removes it.
            let created = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path);

            match created {
                Ok(file) => {
                    // The handle is not needed; the marker's existence is the lock.
                    drop(file);
                    if attempt > 1 {
                        debug!(
                            "Store: Acquired {:?} after {} attempts",
                            self.lock_path, attempt
                        );
                    }
                    return Ok(LockGuard {
                        lock_path: self.lock_path.clone(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if attempt < attempts {
                        tokio::time::sleep(self.options.retry_interval).await;
                    }
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
        }

        warn!(
            "Store: Gave up on {:?} after {} attempts",
            self.lock_path, attempts
        );
        Err(StoreError::LockTimeout {
            path: self.lock_path.clone(),
            attempts,
        })
    }
}

/// Proof of lock ownership. Dropping it removes the marker file.
///
/// Release happens on every exit path of the critical section: normal return,
/// early return through `?`, panic unwinding, and cancellation of the future
/// holding the guard.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    lock_path: PathBuf,
}

impl LockGuard {
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Store: Failed to release {:?}: {}", self.lock_path, e);
            }
        }
    }
}

/// Runs `operation` while holding the lock for `document_path`.
///
/// The operation is not started if the lock cannot be acquired. Its own error
/// type only needs to absorb [`StoreError`].
pub async fn with_lock<T, E, F, Fut>(
    document_path: impl AsRef<Path>,
    options: LockOptions,
    operation: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<StoreError>,
{
    let _guard = FileLock::with_options(document_path, options)
        .acquire()
        .await?;
    operation().await
}

/// `orders.json` -> `orders.json.lock`
pub fn lock_path_for(document_path: &Path) -> PathBuf {
    let mut name = document_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    document_path.with_file_name(name)
}
