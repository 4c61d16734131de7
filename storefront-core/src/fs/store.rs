use super::lock::{FileLock, LockOptions};
use super::persistence;
use crate::error::StoreResult;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Token held for the duration of a critical section. Dropping it releases the lock.
pub type StoreGuard = Box<dyn Any + Send + Sync>;

/// Storage seam used by the ledger.
///
/// `load`/`save` move whole documents. `lock` provides the mutual exclusion
/// that read-modify-write sequences must hold from the first read until the
/// final save.
#[async_trait]
pub trait DocumentStore<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Reads the current document. Does not take the lock.
    async fn load(&self) -> StoreResult<T>;

    /// Replaces the stored document.
    async fn save(&self, document: &T) -> StoreResult<()>;

    /// Acquires exclusive access until the returned guard is dropped.
    async fn lock(&self) -> StoreResult<StoreGuard>;
}

/// A JSON document on disk guarded by a sibling `.lock` marker.
pub struct JsonFileStore<T> {
    path: PathBuf,
    lock: FileLock,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_lock_options(path, LockOptions::default())
    }

    pub fn with_lock_options(path: impl Into<PathBuf>, options: LockOptions) -> Self {
        let path = path.into();
        let lock = FileLock::with_options(&path, options);
        Self {
            path,
            lock,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<T> DocumentStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
{
    async fn load(&self) -> StoreResult<T> {
        let path = self.path.clone();
        run_blocking(move || persistence::load_or_default(&path)).await
    }

    async fn save(&self, document: &T) -> StoreResult<()> {
        // Serialize on the caller's task, write on the blocking pool.
        let value = serde_json::to_value(document)?;
        let path = self.path.clone();
        run_blocking(move || persistence::save_state(&path, &value)).await
    }

    async fn lock(&self) -> StoreResult<StoreGuard> {
        let guard = self.lock.acquire().await?;
        Ok(Box::new(guard))
    }
}

/// In-process store: the same contract without touching the filesystem.
pub struct MemoryStore<T> {
    document: std::sync::Mutex<T>,
    section: Arc<Mutex<()>>,
}

impl<T: Default> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> MemoryStore<T> {
    pub fn new(document: T) -> Self {
        Self {
            document: std::sync::Mutex::new(document),
            section: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl<T> DocumentStore<T> for MemoryStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn load(&self) -> StoreResult<T> {
        let doc = self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(doc.clone())
    }

    async fn save(&self, document: &T) -> StoreResult<()> {
        let mut doc = self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *doc = document.clone();
        Ok(())
    }

    async fn lock(&self) -> StoreResult<StoreGuard> {
        let guard = self.section.clone().lock_owned().await;
        Ok(Box::new(guard))
    }
}

async fn run_blocking<R, F>(f: F) -> StoreResult<R>
where
    F: FnOnce() -> StoreResult<R> + Send + 'static,
    R: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(join_error) => Err(std::io::Error::new(std::io::ErrorKind::Other, join_error).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_store_round_trip_and_lock_marker() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFileStore<Vec<String>> = JsonFileStore::new(dir.path().join("list.json"));

        assert!(store.load().await.unwrap().is_empty());

        {
            let _guard = store.lock().await.unwrap();
            assert!(dir.path().join("list.json.lock").exists());
            let mut doc = store.load().await.unwrap();
            doc.push("a".into());
            store.save(&doc).await.unwrap();
        }

        assert!(!dir.path().join("list.json.lock").exists());
        assert_eq!(store.load().await.unwrap(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_store_lock_is_exclusive() {
        let store: Arc<MemoryStore<u32>> = Arc::new(MemoryStore::default());

        let guard = store.lock().await.unwrap();
        let contender = {
            let store = store.clone();
            tokio::spawn(async move {
                let _g = store.lock().await.unwrap();
                store.load().await.unwrap()
            })
        };

        store.save(&5).await.unwrap();
        drop(guard);

        assert_eq!(contender.await.unwrap(), 5);
    }
}
