//! Unified error type for stowage engines.
//!
//! Messages carry a short code prefix so they stay greppable in logs.

use tokio_rusqlite::rusqlite;

use crate::config::ConfigError;

/// Errors returned by storage engines and the layers built on them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filesystem operation failed.
    #[error("STORAGE_IO: {0}")]
    Io(#[from] std::io::Error),

    /// Database operation failed.
    #[error("STORAGE_DB: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORAGE_DB: migration failed: {0}")]
    MigrationFailed(String),

    /// The key cannot be used as an identifier by this engine.
    #[error("INVALID_KEY: {0}")]
    InvalidKey(String),

    /// The engine's background worker is gone; no further operations can run.
    #[error("STORAGE_CLOSED: engine worker is no longer running")]
    WorkerClosed,

    /// A typed value could not be encoded.
    #[error("SERIALIZATION: {0}")]
    Serialization(String),

    /// Engine configuration was rejected.
    #[error("CONFIG: {0}")]
    Config(#[from] ConfigError),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
