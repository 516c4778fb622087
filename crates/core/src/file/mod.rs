//! One-file-per-key storage engine.
//!
//! Each key is stored as a file named after [`CacheKey::value`] under a root
//! directory, optionally inside a subdirectory created with
//! [`FileEngine::subdirectory`].
//!
//! - Writes go to a temp file in the target directory, are synced, then
//!   renamed over the target. Readers never see a partial file.
//! - Overwriting a key recreates its file, so the creation time reported by
//!   the filesystem moves forward on every write.
//! - Timestamps come from file metadata: birth time, modification time and
//!   access time. Filesystems without birth time report `None`.
//! - Batch operations are not atomic; each file is.

mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::worker::Worker;
use crate::{CacheKey, Error, StorageEngine};
use store::FileStore;

pub(crate) use store::is_valid_component;

/// File-backed [`StorageEngine`].
///
/// All operations of an engine and of every subdirectory view derived from
/// it run on one worker thread, in submission order.
#[derive(Clone, Debug)]
pub struct FileEngine {
    worker: Worker<FileStore>,
    root: PathBuf,
    scope: Option<Arc<str>>,
}

impl FileEngine {
    /// Open an engine rooted at `root`, creating the directory if needed.
    ///
    /// Temp files left by writes that never completed are removed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();
        let worker = Worker::spawn("stowage-file", FileStore::new(root.clone()))?;

        let swept = worker.call(|store| store.prepare()).await?;
        if swept > 0 {
            tracing::info!(root = %root.display(), swept, "removed orphaned temp files");
        }
        tracing::debug!(root = %root.display(), "file engine opened");

        Ok(Self { worker, root, scope: None })
    }

    /// A view of the same root that stores keys under `root/name/`.
    ///
    /// The view shares this engine's worker. `name` is always relative to the
    /// root, also when called on a view.
    pub fn subdirectory(&self, name: &str) -> Result<Self, Error> {
        if !store::is_valid_component(name) {
            return Err(Error::InvalidKey(format!("subdirectory {name:?}")));
        }
        Ok(Self { worker: self.worker.clone(), root: self.root.clone(), scope: Some(Arc::from(name)) })
    }

    /// The directory this engine was opened on.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory keys of this view live in.
    pub fn directory(&self) -> PathBuf {
        match &self.scope {
            Some(name) => self.root.join(&**name),
            None => self.root.clone(),
        }
    }

    async fn with_store<F, R>(&self, function: F) -> Result<R, Error>
    where
        F: FnOnce(&FileStore, Option<&str>) -> Result<R, Error> + Send + 'static,
        R: Send + 'static,
    {
        let scope = self.scope.clone();
        self.worker.call(move |store| function(store, scope.as_deref())).await
    }
}

#[async_trait]
impl StorageEngine for FileEngine {
    async fn write(&self, key: &CacheKey, data: Vec<u8>) -> Result<(), Error> {
        let key = key.clone();
        tracing::debug!(key = %key, bytes = data.len(), "file write");
        self.with_store(move |store, scope| store.write(scope, &key, &data)).await
    }

    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, Error> {
        let key = key.clone();
        self.with_store(move |store, scope| store.read(scope, &key)).await
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), Error> {
        let key = key.clone();
        tracing::debug!(key = %key, "file remove");
        self.with_store(move |store, scope| store.remove(scope, &key)).await
    }

    async fn remove_all(&self) -> Result<(), Error> {
        tracing::debug!(directory = %self.directory().display(), "file remove all");
        self.with_store(|store, scope| store.remove_all(scope)).await
    }

    async fn all_keys(&self) -> Result<Vec<CacheKey>, Error> {
        self.with_store(|store, scope| store.keys(scope)).await
    }

    async fn created_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error> {
        let key = key.clone();
        self.with_store(move |store, scope| store.created_at(scope, &key)).await
    }

    async fn updated_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error> {
        let key = key.clone();
        self.with_store(move |store, scope| store.updated_at(scope, &key)).await
    }

    async fn last_accessed(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error> {
        let key = key.clone();
        self.with_store(move |store, scope| store.accessed_at(scope, &key)).await
    }

    async fn key_exists(&self, key: &CacheKey) -> Result<bool, Error> {
        let key = key.clone();
        self.with_store(move |store, scope| store.exists(scope, &key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use tempfile::tempdir;

    fn key(s: &str) -> CacheKey {
        CacheKey::verbatim(s)
    }

    #[tokio::test]
    async fn test_open_creates_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("store");
        let engine = FileEngine::open(&root).await.unwrap();
        assert!(root.is_dir());
        assert_eq!(engine.root(), root.as_path());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let engine = FileEngine::open(dir.path()).await.unwrap();
        let k = CacheKey::new("https://example.com/page");

        engine.write(&k, b"payload".to_vec()).await.unwrap();

        assert_eq!(engine.read(&k).await.unwrap(), Some(b"payload".to_vec()));
        assert!(dir.path().join(k.value()).is_file());
    }

    #[tokio::test]
    async fn test_read_missing() {
        let dir = tempdir().unwrap();
        let engine = FileEngine::open(dir.path()).await.unwrap();
        assert_eq!(engine.read(&key("nope")).await.unwrap(), None);
        assert!(!engine.key_exists(&key("nope")).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let dir = tempdir().unwrap();
        let engine = FileEngine::open(dir.path()).await.unwrap();
        engine.remove(&key("never")).await.unwrap();
        engine.remove_many(&[key("a"), key("b")]).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_all_recreates_root() {
        let dir = tempdir().unwrap();
        let engine = FileEngine::open(dir.path().join("store")).await.unwrap();
        engine.write(&key("a"), b"1".to_vec()).await.unwrap();

        engine.remove_all().await.unwrap();

        assert!(dir.path().join("store").is_dir());
        assert_eq!(engine.key_count().await.unwrap(), 0);
        engine.write(&key("b"), b"2".to_vec()).await.unwrap();
        assert_eq!(engine.key_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_subdirectory_partitions_keys() {
        let dir = tempdir().unwrap();
        let engine = FileEngine::open(dir.path()).await.unwrap();
        let images = engine.subdirectory("images").unwrap();

        engine.write(&key("top"), b"1".to_vec()).await.unwrap();
        images.write(&key("cat"), b"2".to_vec()).await.unwrap();

        assert_eq!(engine.all_keys().await.unwrap(), vec![key("top")]);
        assert_eq!(images.all_keys().await.unwrap(), vec![key("cat")]);
        assert_eq!(engine.read(&key("cat")).await.unwrap(), None);
        assert!(dir.path().join("images").join("cat").is_file());
        assert_eq!(images.directory(), dir.path().join("images"));
    }

    #[tokio::test]
    async fn test_subdirectory_remove_all_leaves_parent() {
        let dir = tempdir().unwrap();
        let engine = FileEngine::open(dir.path()).await.unwrap();
        let shard = engine.subdirectory("shard").unwrap();

        engine.write(&key("top"), b"1".to_vec()).await.unwrap();
        shard.write(&key("inner"), b"2".to_vec()).await.unwrap();

        shard.remove_all().await.unwrap();
        shard.remove_all().await.unwrap();

        assert!(!dir.path().join("shard").exists());
        assert_eq!(engine.read(&key("top")).await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_invalid_subdirectory() {
        let dir = tempdir().unwrap();
        let engine = FileEngine::open(dir.path()).await.unwrap();
        assert!(matches!(engine.subdirectory("../up"), Err(Error::InvalidKey(_))));
        assert!(matches!(engine.subdirectory(""), Err(Error::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_invalid_key_is_an_error() {
        let dir = tempdir().unwrap();
        let engine = FileEngine::open(dir.path()).await.unwrap();
        let result = engine.write(&key("a/b"), b"x".to_vec()).await;
        assert!(matches!(result, Err(Error::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_timestamps_track_writes() {
        let dir = tempdir().unwrap();
        let engine = FileEngine::open(dir.path()).await.unwrap();
        let k = key("stamped");
        // Filesystem clocks are coarser than the system clock.
        let slack = TimeDelta::seconds(2);

        assert_eq!(engine.created_at(&k).await.unwrap(), None);
        assert_eq!(engine.updated_at(&k).await.unwrap(), None);
        assert_eq!(engine.last_accessed(&k).await.unwrap(), None);

        let before = Utc::now();
        engine.write(&k, b"v1".to_vec()).await.unwrap();
        let after = Utc::now();

        let updated = engine.updated_at(&k).await.unwrap().unwrap();
        assert!(updated >= before - slack && updated <= after + slack);
        if let Some(created) = engine.created_at(&k).await.unwrap() {
            assert!(created >= before - slack && created <= after + slack);
        }
        assert!(engine.last_accessed(&k).await.unwrap().is_some());

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        engine.write(&k, b"v2".to_vec()).await.unwrap();

        let updated_again = engine.updated_at(&k).await.unwrap().unwrap();
        assert!(updated_again >= updated);
        if let Some(created_again) = engine.created_at(&k).await.unwrap() {
            // Overwrite replaces the file, so its birth time is the second write's.
            assert!(created_again >= updated - slack);
        }
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        {
            let engine = FileEngine::open(dir.path()).await.unwrap();
            engine.write(&key("persisted"), b"yes".to_vec()).await.unwrap();
        }
        let engine = FileEngine::open(dir.path()).await.unwrap();
        assert_eq!(engine.read(&key("persisted")).await.unwrap(), Some(b"yes".to_vec()));
    }
}
