//! Keyset pagination over the entries table.

use tokio_rusqlite::params;

use super::{SqliteEngine, decode_value};
use crate::{CacheKey, Error};

/// Position of a paginated scan.
///
/// A scan starts at [`PageCursor::start`] and moves forward one
/// [`SqliteEngine::read_page`] call at a time until it reaches
/// [`PageCursor::Exhausted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// More rows may follow the key in `after` (or the beginning, if `None`).
    HasMore { after: Option<String> },

    /// The scan has returned every row.
    Exhausted,
}

impl PageCursor {
    /// Cursor positioned before the first key.
    pub fn start() -> Self {
        PageCursor::HasMore { after: None }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, PageCursor::Exhausted)
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::start()
    }
}

/// One page of entries in ascending key order.
#[derive(Debug, Clone)]
pub struct Page {
    pub entries: Vec<(CacheKey, Vec<u8>)>,
    /// Cursor to pass to the next [`SqliteEngine::read_page`] call.
    pub next: PageCursor,
}

impl SqliteEngine {
    /// Fetch up to `limit` entries following `cursor`.
    ///
    /// An exhausted cursor yields an empty, exhausted page. A `limit` of zero
    /// returns no entries and leaves the cursor where it was.
    pub async fn read_page(&self, cursor: &PageCursor, limit: usize) -> Result<Page, Error> {
        let after = match cursor {
            PageCursor::Exhausted => return Ok(Page { entries: Vec::new(), next: PageCursor::Exhausted }),
            PageCursor::HasMore { .. } if limit == 0 => {
                return Ok(Page { entries: Vec::new(), next: cursor.clone() });
            }
            PageCursor::HasMore { after } => after.clone(),
        };

        // One extra row tells us whether another page follows.
        let fetch = i64::try_from(limit).unwrap_or(i64::MAX - 1) + 1;

        let mut rows = self
            .conn
            .call(move |conn| -> Result<Vec<(String, Option<Vec<u8>>)>, Error> {
                let mut stmt = conn.prepare_cached(
                    "SELECT key, value FROM entries
                     WHERE ?1 IS NULL OR key > ?1
                     ORDER BY key
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![after, fetch], |row| {
                    let key: String = row.get(0)?;
                    let value = decode_value(&key, row.get_ref(1)?);
                    Ok((key, value))
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)?;

        let next = if rows.len() > limit {
            rows.truncate(limit);
            PageCursor::HasMore { after: rows.last().map(|(key, _)| key.clone()) }
        } else {
            PageCursor::Exhausted
        };

        let entries = rows
            .into_iter()
            .filter_map(|(key, value)| value.map(|data| (CacheKey::verbatim(key), data)))
            .collect();

        Ok(Page { entries, next })
    }
}
