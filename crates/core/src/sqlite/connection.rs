//! Connection setup for the SQLite engine.
//!
//! Opens the database, applies pragmas and runs migrations. An engine value
//! only exists once all of that has succeeded.

use std::path::Path;
use std::time::Duration;

use tokio_rusqlite::Connection;

use super::migrations;
use crate::Error;

/// Pragma tuning for [`SqliteEngine::open_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteOptions {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,

    /// Use write-ahead logging instead of a rollback journal.
    pub wal: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self { busy_timeout: Duration::from_secs(5), wal: true }
    }
}

impl SqliteOptions {
    fn pragmas(&self) -> String {
        let journal_mode = if self.wal { "WAL" } else { "DELETE" };
        format!(
            "PRAGMA journal_mode={journal_mode};
             PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;"
        )
    }
}

/// SQLite-backed [`StorageEngine`](crate::StorageEngine).
///
/// Wraps a tokio-rusqlite Connection that runs database operations on a
/// background thread. Clones share that connection and its queue.
#[derive(Clone, Debug)]
pub struct SqliteEngine {
    pub(crate) conn: Connection,
}

impl SqliteEngine {
    /// Open or create the database at `path` with default options.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with(path, SqliteOptions::default()).await
    }

    /// Open or create the database at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened, is not a SQLite database, or the
    /// schema cannot be created. The parent directory must already exist.
    pub async fn open_with(path: impl AsRef<Path>, options: SqliteOptions) -> Result<Self, Error> {
        let path = path.as_ref();
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        let engine = Self::configure(conn, &options).await?;

        tracing::debug!(path = %path.display(), wal = options.wal, "sqlite engine opened");
        Ok(engine)
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::configure(conn, &SqliteOptions::default()).await
    }

    /// Close the connection once queued operations have finished.
    ///
    /// Other clones of this engine fail with a database error afterwards.
    pub async fn close(self) -> Result<(), Error> {
        self.conn.close().await.map_err(|e| Error::Database(e.into()))
    }

    async fn configure(conn: Connection, options: &SqliteOptions) -> Result<Self, Error> {
        let pragmas = options.pragmas();
        let busy_timeout = options.busy_timeout;

        conn.call(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch(&pragmas)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}
