//! The storage engine contract.
//!
//! Engines are opaque byte stores addressed by [`CacheKey`]. They never look
//! inside the bytes they hold.
//!
//! Implementors provide the primitive operations; everything else has a
//! default built on those primitives, which engines override when their
//! substrate can do better.
//!
//! # Error policy
//!
//! - Reading or probing an absent key is not an error (`None` / `false`).
//! - Removing an absent key succeeds, singly and in bulk.
//! - A stored value that cannot be read back is reported as absent.
//! - Failures of the substrate itself (I/O on write, a closed connection) are
//!   returned as [`Error`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{CacheKey, Error};

/// A key-value blob store.
///
/// Every operation on one engine instance runs in submission order; a `read`
/// issued after a `write` of the same key observes that write.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Store `data` under `key`, replacing any previous value.
    async fn write(&self, key: &CacheKey, data: Vec<u8>) -> Result<(), Error>;

    /// Read the value stored under `key`.
    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, Error>;

    /// Remove `key`. Succeeds when the key is absent.
    async fn remove(&self, key: &CacheKey) -> Result<(), Error>;

    /// Remove every stored value.
    async fn remove_all(&self) -> Result<(), Error>;

    /// Every key currently stored. Order is engine-specific.
    async fn all_keys(&self) -> Result<Vec<CacheKey>, Error>;

    /// When `key` was created, if it exists.
    async fn created_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error>;

    /// When `key` was last written, if it exists.
    async fn updated_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error>;

    /// When `key` was last read, for engines that track access.
    async fn last_accessed(&self, _key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(None)
    }

    /// Write several values.
    ///
    /// The default writes one item at a time and stops at the first failure;
    /// items written before it stay written.
    async fn write_many(&self, items: Vec<(CacheKey, Vec<u8>)>) -> Result<(), Error> {
        for (key, data) in items {
            self.write(&key, data).await?;
        }
        Ok(())
    }

    /// Read several values, skipping keys that are absent.
    ///
    /// Hits come back in the order their keys were given.
    async fn read_many(&self, keys: &[CacheKey]) -> Result<Vec<Vec<u8>>, Error> {
        Ok(self
            .read_pairs(keys)
            .await?
            .into_iter()
            .map(|(_, data)| data)
            .collect())
    }

    /// Read several values together with the key each one was stored under.
    ///
    /// Absent keys are skipped. Each value is paired with its own key as it is
    /// read, so a miss in the middle of `keys` never shifts later pairs.
    async fn read_pairs(&self, keys: &[CacheKey]) -> Result<Vec<(CacheKey, Vec<u8>)>, Error> {
        let mut pairs = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(data) = self.read(key).await? {
                pairs.push((key.clone(), data));
            }
        }
        Ok(pairs)
    }

    /// Remove several keys. Absent keys are ignored.
    async fn remove_many(&self, keys: &[CacheKey]) -> Result<(), Error> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }

    /// Whether `key` is stored. The default scans [`all_keys`](Self::all_keys).
    async fn key_exists(&self, key: &CacheKey) -> Result<bool, Error> {
        Ok(self.all_keys().await?.contains(key))
    }

    /// Number of stored keys.
    async fn key_count(&self) -> Result<usize, Error> {
        Ok(self.all_keys().await?.len())
    }

    /// Every stored value.
    async fn read_all(&self) -> Result<Vec<Vec<u8>>, Error> {
        let keys = self.all_keys().await?;
        self.read_many(&keys).await
    }

    /// Every stored value with its key.
    async fn read_all_pairs(&self) -> Result<Vec<(CacheKey, Vec<u8>)>, Error> {
        let keys = self.all_keys().await?;
        self.read_pairs(&keys).await
    }
}
