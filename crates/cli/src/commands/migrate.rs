//! Copy a store into another engine.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use stowage_core::{EngineKind, StorageEngine, StoreConfig};

/// Configuration for the target of a migration from `source`.
///
/// Fails when the target would be the source itself.
pub fn target_config(
    source: &StoreConfig, engine: EngineKind, path: PathBuf, subdirectory: Option<String>,
) -> Result<StoreConfig> {
    let mut target = StoreConfig { subdirectory: None, ..source.clone() };
    super::apply_overrides(&mut target, Some(engine), Some(path), subdirectory);

    if target.engine == source.engine && resolved(&super::location(&target)) == resolved(&super::location(source)) {
        bail!("migration target is the source store ({})", super::location(source).display());
    }
    target.validate()?;
    Ok(target)
}

/// `path` with symlinks resolved when it exists, otherwise made absolute.
fn resolved(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Copy every entry of `source` into `target`, returning how many were copied.
///
/// Entries already in `target` under the same keys are overwritten.
pub async fn run(source: &dyn StorageEngine, target: &dyn StorageEngine) -> Result<usize> {
    let pairs = source.read_all_pairs().await.context("failed to read source store")?;
    let count = pairs.len();
    target.write_many(pairs).await.context("failed to write target store")?;
    tracing::info!(count, "migrated entries");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::CacheKey;

    #[tokio::test]
    async fn test_file_to_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let source_config = StoreConfig { engine: EngineKind::File, root: dir.path().join("files"), ..Default::default() };
        let target_config =
            target_config(&source_config, EngineKind::Sqlite, dir.path().join("store.sqlite"), None).unwrap();

        let source = source_config.open_engine().await.unwrap();
        let items = (0..5).map(|i| (CacheKey::verbatim(format!("k{i}")), vec![i as u8; 3])).collect();
        source.write_many(items).await.unwrap();

        let target = target_config.open_engine().await.unwrap();
        assert_eq!(run(source.as_ref(), target.as_ref()).await.unwrap(), 5);

        assert_eq!(target.key_count().await.unwrap(), 5);
        assert_eq!(target.read(&CacheKey::verbatim("k3")).await.unwrap(), Some(vec![3; 3]));
    }

    #[test]
    fn test_same_store_rejected() {
        let source = StoreConfig::default();
        let path = source.db_path.clone();
        assert!(target_config(&source, EngineKind::Sqlite, path, None).is_err());
    }

    #[test]
    fn test_same_store_rejected_through_equivalent_paths() {
        let source = StoreConfig { db_path: PathBuf::from("stowage.sqlite"), ..Default::default() };
        assert!(target_config(&source, EngineKind::Sqlite, PathBuf::from("./stowage.sqlite"), None).is_err());

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let source = StoreConfig { engine: EngineKind::File, root: dir.path().to_path_buf(), ..Default::default() };
        let detour = dir.path().join("nested").join("..");
        assert!(target_config(&source, EngineKind::File, detour, None).is_err());
    }

    #[test]
    fn test_subdirectory_makes_distinct_target() {
        let source = StoreConfig { engine: EngineKind::File, root: PathBuf::from("/data"), ..Default::default() };
        let target = target_config(&source, EngineKind::File, PathBuf::from("/data"), Some("copy".into())).unwrap();
        assert_eq!(target.subdirectory.as_deref(), Some("copy"));
    }
}
