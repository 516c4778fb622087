//! Entry CRUD operations.
//!
//! Implements [`StorageEngine`] for [`SqliteEngine`]. Multi-key reads and
//! removals use `IN (...)` queries instead of the per-key defaults.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, params_from_iter};

use super::{SqliteEngine, decode_value, parse_timestamp, timestamp};
use crate::{CacheKey, Error, StorageEngine};

/// Insert a new row, or replace the value and `updated_at` of an existing one.
const UPSERT: &str = "INSERT INTO entries (key, value, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?3)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = excluded.updated_at";

/// Keys bound per `IN (...)` statement, well below SQLite's variable limit.
const MAX_BOUND_KEYS: usize = 500;

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn key_values(keys: &[CacheKey]) -> Vec<String> {
    keys.iter().map(|key| key.value().to_string()).collect()
}

#[async_trait]
impl StorageEngine for SqliteEngine {
    async fn write(&self, key: &CacheKey, data: Vec<u8>) -> Result<(), Error> {
        let key = key.value().to_string();
        tracing::debug!(key = %key, bytes = data.len(), "sqlite write");
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(UPSERT, params![key, data, timestamp(Utc::now())])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Writes every item in one transaction: either all are stored or none.
    async fn write_many(&self, items: Vec<(CacheKey, Vec<u8>)>) -> Result<(), Error> {
        if items.is_empty() {
            return Ok(());
        }
        let count = items.len();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let now = timestamp(Utc::now());
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare_cached(UPSERT)?;
                    for (key, data) in &items {
                        stmt.execute(params![key.value(), data, now])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        tracing::debug!(count, "sqlite batch write");
        Ok(())
    }

    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, Error> {
        let key = key.value().to_string();
        self.conn
            .call(move |conn| -> Result<Option<Vec<u8>>, Error> {
                let result = conn.query_row("SELECT value FROM entries WHERE key = ?1", params![key], |row| {
                    Ok(decode_value(&key, row.get_ref(0)?))
                });

                match result {
                    Ok(value) => Ok(value),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn read_many(&self, keys: &[CacheKey]) -> Result<Vec<Vec<u8>>, Error> {
        Ok(self
            .read_pairs(keys)
            .await?
            .into_iter()
            .map(|(_, data)| data)
            .collect())
    }

    async fn read_pairs(&self, keys: &[CacheKey]) -> Result<Vec<(CacheKey, Vec<u8>)>, Error> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let wanted = key_values(keys);

        let found = self
            .conn
            .call(move |conn| -> Result<HashMap<String, Vec<u8>>, Error> {
                let mut found = HashMap::with_capacity(wanted.len());
                for chunk in wanted.chunks(MAX_BOUND_KEYS) {
                    let sql = format!("SELECT key, value FROM entries WHERE key IN ({})", placeholders(chunk.len()));
                    let mut stmt = conn.prepare_cached(&sql)?;
                    let mut rows = stmt.query(params_from_iter(chunk))?;
                    while let Some(row) = rows.next()? {
                        let key: String = row.get(0)?;
                        if let Some(value) = decode_value(&key, row.get_ref(1)?) {
                            found.insert(key, value);
                        }
                    }
                }
                Ok(found)
            })
            .await
            .map_err(Error::from)?;

        // IN returns rows in index order; hand them back in the caller's order.
        Ok(keys
            .iter()
            .filter_map(|key| found.get(key.value()).map(|data| (key.clone(), data.clone())))
            .collect())
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), Error> {
        let key = key.value().to_string();
        tracing::debug!(key = %key, "sqlite remove");
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn remove_many(&self, keys: &[CacheKey]) -> Result<(), Error> {
        if keys.is_empty() {
            return Ok(());
        }
        let doomed = key_values(keys);

        let deleted = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                let mut deleted = 0;
                for chunk in doomed.chunks(MAX_BOUND_KEYS) {
                    let sql = format!("DELETE FROM entries WHERE key IN ({})", placeholders(chunk.len()));
                    deleted += tx.execute(&sql, params_from_iter(chunk))?;
                }
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(Error::from)?;

        tracing::debug!(requested = keys.len(), deleted, "sqlite batch remove");
        Ok(())
    }

    async fn remove_all(&self) -> Result<(), Error> {
        let deleted = self
            .conn
            .call(|conn| -> Result<usize, Error> { Ok(conn.execute("DELETE FROM entries", [])?) })
            .await
            .map_err(Error::from)?;

        tracing::debug!(deleted, "sqlite remove all");
        Ok(())
    }

    async fn all_keys(&self) -> Result<Vec<CacheKey>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<CacheKey>, Error> {
                let mut stmt = conn.prepare_cached("SELECT key FROM entries ORDER BY key")?;
                let keys = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .map(|key| key.map(CacheKey::verbatim))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn key_exists(&self, key: &CacheKey) -> Result<bool, Error> {
        let key = key.value().to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM entries WHERE key = ?1)",
                    params![key],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    async fn key_count(&self) -> Result<usize, Error> {
        self.conn
            .call(|conn| -> Result<usize, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }

    async fn read_all(&self) -> Result<Vec<Vec<u8>>, Error> {
        Ok(self
            .read_all_pairs()
            .await?
            .into_iter()
            .map(|(_, data)| data)
            .collect())
    }

    async fn read_all_pairs(&self) -> Result<Vec<(CacheKey, Vec<u8>)>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<(CacheKey, Vec<u8>)>, Error> {
                let mut stmt = conn.prepare_cached("SELECT key, value FROM entries ORDER BY key")?;
                let mut rows = stmt.query([])?;
                let mut pairs = Vec::new();
                while let Some(row) = rows.next()? {
                    let key: String = row.get(0)?;
                    if let Some(value) = decode_value(&key, row.get_ref(1)?) {
                        pairs.push((CacheKey::verbatim(key), value));
                    }
                }
                Ok(pairs)
            })
            .await
            .map_err(Error::from)
    }

    async fn created_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error> {
        self.stored_timestamp(key, "SELECT created_at FROM entries WHERE key = ?1")
            .await
    }

    async fn updated_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error> {
        self.stored_timestamp(key, "SELECT updated_at FROM entries WHERE key = ?1")
            .await
    }
}

impl SqliteEngine {
    async fn stored_timestamp(&self, key: &CacheKey, sql: &'static str) -> Result<Option<DateTime<Utc>>, Error> {
        let key = key.value().to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                Ok(conn.query_row(sql, params![key], |row| row.get(0)).optional()?)
            })
            .await
            .map_err(Error::from)?;

        Ok(raw.as_deref().and_then(parse_timestamp))
    }

    /// Delete entries last written before `cutoff`.
    ///
    /// Returns the number of deleted entries.
    pub async fn remove_updated_before(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let cutoff = timestamp(cutoff);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM entries WHERE updated_at < ?1", params![cutoff])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the least recently written entries until at most `max_entries` remain.
    ///
    /// Returns the number of deleted entries.
    pub async fn retain_newest(&self, max_entries: usize) -> Result<u64, Error> {
        let max = i64::try_from(max_entries).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE key IN (
                    SELECT key FROM entries ORDER BY updated_at ASC, key ASC LIMIT ?1
                )",
                    params![to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
