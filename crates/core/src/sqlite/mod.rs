//! Single-file SQLite storage engine.
//!
//! Every key of a store is a row in one `entries` table:
//!
//! | column       | type | notes                              |
//! |--------------|------|------------------------------------|
//! | `key`        | TEXT | primary key, [`CacheKey::value`]   |
//! | `value`      | BLOB | opaque payload                     |
//! | `created_at` | TEXT | set on insert, never changed       |
//! | `updated_at` | TEXT | refreshed by every write           |
//!
//! Unlike the file engine, overwriting a key keeps its `created_at`. Reads do
//! not touch any column, so there is no access-time tracking.
//!
//! Access goes through tokio-rusqlite, which runs every call on one background
//! thread in submission order. Batch writes and batch removals each run in a
//! single transaction.
//!
//! [`CacheKey::value`]: crate::CacheKey::value

mod connection;
mod entries;
mod migrations;
mod page;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::rusqlite::types::ValueRef;

pub use connection::{SqliteEngine, SqliteOptions};
pub use page::{Page, PageCursor};

/// Stored timestamp format: fixed-width RFC 3339 in UTC, so text order is time order.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => Some(at.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(raw, error = %e, "unparseable timestamp treated as missing");
            None
        }
    }
}

fn decode_value(key: &str, value: ValueRef<'_>) -> Option<Vec<u8>> {
    match value {
        ValueRef::Blob(bytes) => Some(bytes.to_vec()),
        other => {
            tracing::warn!(key, data_type = ?other.data_type(), "non-blob value treated as missing");
            None
        }
    }
}
