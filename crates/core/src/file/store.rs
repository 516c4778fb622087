//! Blocking filesystem operations behind [`super::FileEngine`].
//!
//! Everything here runs on the engine's worker thread, one call at a time.

use std::fs::{self, Metadata};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::{CacheKey, Error};

/// Prefix of in-flight temp files. Never a valid key.
pub(crate) const TEMP_PREFIX: &str = ".stowage-tmp-";

#[derive(Debug)]
pub(crate) struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root and delete temp files an interrupted write left behind.
    ///
    /// Returns the number of temp files removed.
    pub(crate) fn prepare(&self) -> Result<usize, Error> {
        fs::create_dir_all(&self.root)?;

        let mut swept = sweep_temp_files(&self.root)?;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                swept += sweep_temp_files(&entry.path())?;
            }
        }
        Ok(swept)
    }

    pub(crate) fn write(&self, scope: Option<&str>, key: &CacheKey, data: &[u8]) -> Result<(), Error> {
        let path = self.entry_path(scope, key)?;
        let dir = self.scope_dir(scope);
        fs::create_dir_all(&dir)?;

        let mut temp = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(&dir)?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    pub(crate) fn read(&self, scope: Option<&str>, key: &CacheKey) -> Result<Option<Vec<u8>>, Error> {
        let path = self.entry_path(scope, key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable entry treated as missing");
                Ok(None)
            }
        }
    }

    pub(crate) fn remove(&self, scope: Option<&str>, key: &CacheKey) -> Result<(), Error> {
        let path = self.entry_path(scope, key)?;
        ignore_not_found(fs::remove_file(&path))
    }

    pub(crate) fn remove_all(&self, scope: Option<&str>) -> Result<(), Error> {
        let dir = self.scope_dir(scope);
        ignore_not_found(fs::remove_dir_all(&dir))?;
        if scope.is_none() {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    pub(crate) fn keys(&self, scope: Option<&str>) -> Result<Vec<CacheKey>, Error> {
        let dir = self.scope_dir(scope);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                tracing::warn!(path = %entry.path().display(), "skipping entry with non UTF-8 name");
                continue;
            };
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            keys.push(CacheKey::verbatim(name));
        }
        Ok(keys)
    }

    pub(crate) fn exists(&self, scope: Option<&str>, key: &CacheKey) -> Result<bool, Error> {
        Ok(self.metadata(scope, key)?.is_some())
    }

    pub(crate) fn created_at(&self, scope: Option<&str>, key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(self.metadata(scope, key)?.and_then(|m| m.created().ok()).map(DateTime::from))
    }

    pub(crate) fn updated_at(&self, scope: Option<&str>, key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(self.metadata(scope, key)?.and_then(|m| m.modified().ok()).map(DateTime::from))
    }

    pub(crate) fn accessed_at(&self, scope: Option<&str>, key: &CacheKey) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(self.metadata(scope, key)?.and_then(|m| m.accessed().ok()).map(DateTime::from))
    }

    fn metadata(&self, scope: Option<&str>, key: &CacheKey) -> Result<Option<Metadata>, Error> {
        let path = self.entry_path(scope, key)?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Some(meta)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn scope_dir(&self, scope: Option<&str>) -> PathBuf {
        match scope {
            Some(name) => self.root.join(name),
            None => self.root.clone(),
        }
    }

    fn entry_path(&self, scope: Option<&str>, key: &CacheKey) -> Result<PathBuf, Error> {
        if !is_valid_component(key.value()) {
            return Err(Error::InvalidKey(key.value().to_string()));
        }
        Ok(self.scope_dir(scope).join(key.value()))
    }
}

/// Whether `name` can be used as a single file or directory name under the root.
pub(crate) fn is_valid_component(name: &str) -> bool {
    !(name.is_empty()
        || name == "."
        || name == ".."
        || name.starts_with(TEMP_PREFIX)
        || name.chars().any(|c| matches!(c, '/' | '\\' | '\0')))
}

fn sweep_temp_files(dir: &Path) -> Result<usize, Error> {
    let mut swept = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_temp = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(TEMP_PREFIX));
        if is_temp && entry.file_type()?.is_file() {
            ignore_not_found(fs::remove_file(entry.path()))?;
            swept += 1;
        }
    }
    Ok(swept)
}

fn ignore_not_found(result: io::Result<()>) -> Result<(), Error> {
    match result {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_component_validation() {
        assert!(is_valid_component("0b7c3e2a-1f4d-4c3b-9e8f-123456789abc"));
        assert!(is_valid_component("settings.json"));
        assert!(!is_valid_component(""));
        assert!(!is_valid_component("."));
        assert!(!is_valid_component(".."));
        assert!(!is_valid_component("a/b"));
        assert!(!is_valid_component("a\\b"));
        assert!(!is_valid_component(".stowage-tmp-abc"));
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.prepare().unwrap();

        store.write(None, &CacheKey::verbatim("k"), b"v").unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["k".to_string()]);
    }

    #[test]
    fn test_prepare_sweeps_orphaned_temp_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(format!("{TEMP_PREFIX}orphan")), b"partial").unwrap();
        fs::create_dir(dir.path().join("shard")).unwrap();
        fs::write(dir.path().join("shard").join(format!("{TEMP_PREFIX}orphan")), b"partial").unwrap();
        fs::write(dir.path().join("kept"), b"value").unwrap();

        let store = FileStore::new(dir.path().to_path_buf());
        assert_eq!(store.prepare().unwrap(), 2);
        assert_eq!(store.keys(None).unwrap(), vec![CacheKey::verbatim("kept")]);
    }

    #[test]
    fn test_keys_skip_directories_and_temp_files() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.prepare().unwrap();

        store.write(None, &CacheKey::verbatim("top"), b"1").unwrap();
        store.write(Some("shard"), &CacheKey::verbatim("nested"), b"2").unwrap();
        fs::write(dir.path().join(format!("{TEMP_PREFIX}inflight")), b"partial").unwrap();

        assert_eq!(store.keys(None).unwrap(), vec![CacheKey::verbatim("top")]);
        assert_eq!(store.keys(Some("shard")).unwrap(), vec![CacheKey::verbatim("nested")]);
    }

    #[test]
    fn test_invalid_key_rejected() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());

        let result = store.write(None, &CacheKey::verbatim("../escape"), b"x");
        assert!(matches!(result, Err(Error::InvalidKey(_))));
        assert!(!dir.path().parent().unwrap().join("escape").exists());
    }

    #[test]
    fn test_directory_at_key_path_is_not_an_entry() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.write(Some("shard"), &CacheKey::verbatim("x"), b"1").unwrap();

        assert!(!store.exists(None, &CacheKey::verbatim("shard")).unwrap());
        assert_eq!(store.updated_at(None, &CacheKey::verbatim("shard")).unwrap(), None);
    }
}
