//! Core types and shared functionality for stowage.
//!
//! This crate provides:
//! - A key-value [`StorageEngine`] contract with batch defaults
//! - A file-per-key engine and a SQLite engine
//! - Typed values through [`ObjectStore`]
//! - Unified error types
//! - Configuration structures

pub mod config;
mod engine;
pub mod error;
pub mod file;
mod key;
pub mod object;
pub mod sqlite;
mod worker;

pub use config::{ConfigError, EngineKind, StoreConfig};
pub use engine::StorageEngine;
pub use error::Error;
pub use file::FileEngine;
pub use key::CacheKey;
pub use object::ObjectStore;
pub use sqlite::{Page, PageCursor, SqliteEngine, SqliteOptions};
pub use worker::Worker;
