//! Typed values on top of any engine.
//!
//! [`ObjectStore`] encodes values as JSON before handing the bytes to a
//! [`StorageEngine`], and decodes them on the way out. Stored bytes that no
//! longer decode as `T` read as missing, the same way engines treat
//! unreadable values.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{CacheKey, Error, StorageEngine};

/// A store of `T` values backed by a shared engine.
pub struct ObjectStore<T> {
    engine: Arc<dyn StorageEngine>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ObjectStore<T> {
    fn clone(&self) -> Self {
        Self { engine: Arc::clone(&self.engine), _marker: PhantomData }
    }
}

impl<T> fmt::Debug for ObjectStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStore")
            .field("type", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T> ObjectStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self { engine, _marker: PhantomData }
    }

    /// The engine values are stored in.
    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    pub async fn store(&self, key: &CacheKey, object: &T) -> Result<(), Error> {
        let data = serde_json::to_vec(object)?;
        self.engine.write(key, data).await
    }

    /// Encode every item first, then write them as one batch.
    pub async fn store_many(&self, items: &[(CacheKey, T)]) -> Result<(), Error> {
        let encoded = items
            .iter()
            .map(|(key, object)| -> Result<_, Error> { Ok((key.clone(), serde_json::to_vec(object)?)) })
            .collect::<Result<Vec<_>, Error>>()?;
        self.engine.write_many(encoded).await
    }

    pub async fn object(&self, key: &CacheKey) -> Result<Option<T>, Error> {
        Ok(self.engine.read(key).await?.and_then(|data| decode(key, &data)))
    }

    /// Values for `keys`, skipping keys that are absent or undecodable.
    pub async fn objects(&self, keys: &[CacheKey]) -> Result<Vec<T>, Error> {
        Ok(self
            .objects_with_keys(keys)
            .await?
            .into_iter()
            .map(|(_, object)| object)
            .collect())
    }

    pub async fn objects_with_keys(&self, keys: &[CacheKey]) -> Result<Vec<(CacheKey, T)>, Error> {
        Ok(decode_pairs(self.engine.read_pairs(keys).await?))
    }

    pub async fn all_objects(&self) -> Result<Vec<T>, Error> {
        Ok(self
            .all_objects_with_keys()
            .await?
            .into_iter()
            .map(|(_, object)| object)
            .collect())
    }

    pub async fn all_objects_with_keys(&self) -> Result<Vec<(CacheKey, T)>, Error> {
        Ok(decode_pairs(self.engine.read_all_pairs().await?))
    }

    pub async fn remove(&self, key: &CacheKey) -> Result<(), Error> {
        self.engine.remove(key).await
    }

    pub async fn remove_many(&self, keys: &[CacheKey]) -> Result<(), Error> {
        self.engine.remove_many(keys).await
    }

    pub async fn remove_all(&self) -> Result<(), Error> {
        self.engine.remove_all().await
    }

    pub async fn keys(&self) -> Result<Vec<CacheKey>, Error> {
        self.engine.all_keys().await
    }

    pub async fn key_count(&self) -> Result<usize, Error> {
        self.engine.key_count().await
    }

    pub async fn key_exists(&self, key: &CacheKey) -> Result<bool, Error> {
        self.engine.key_exists(key).await
    }

    pub async fn created_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error> {
        self.engine.created_at(key).await
    }

    pub async fn updated_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error> {
        self.engine.updated_at(key).await
    }

    pub async fn last_accessed(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error> {
        self.engine.last_accessed(key).await
    }
}

fn decode<T: DeserializeOwned>(key: &CacheKey, data: &[u8]) -> Option<T> {
    match serde_json::from_slice(data) {
        Ok(object) => Some(object),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "undecodable object treated as missing");
            None
        }
    }
}

fn decode_pairs<T: DeserializeOwned>(pairs: Vec<(CacheKey, Vec<u8>)>) -> Vec<(CacheKey, T)> {
    pairs
        .into_iter()
        .filter_map(|(key, data)| decode(&key, &data).map(|object| (key, object)))
        .collect()
}
