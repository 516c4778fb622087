//! Behaviour every engine must share, run against each engine.

use std::collections::BTreeSet;
use std::sync::Arc;

use stowage_core::{CacheKey, FileEngine, SqliteEngine, StorageEngine};
use tempfile::TempDir;
use url::Url;

async fn file_engine() -> (Arc<dyn StorageEngine>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let engine = FileEngine::open(dir.path()).await.unwrap();
    (Arc::new(engine), dir)
}

async fn file_subdirectory_engine() -> (Arc<dyn StorageEngine>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let engine = FileEngine::open(dir.path()).await.unwrap().subdirectory("scoped").unwrap();
    (Arc::new(engine), dir)
}

async fn sqlite_engine() -> (Arc<dyn StorageEngine>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let engine = SqliteEngine::open(dir.path().join("store.sqlite")).await.unwrap();
    (Arc::new(engine), dir)
}

fn key(name: &str) -> CacheKey {
    CacheKey::verbatim(name)
}

macro_rules! engine_contract {
    ($name:ident, $factory:path) => {
        mod $name {
            use super::*;

            #[tokio::test]
            async fn round_trip() {
                let (engine, _dir) = $factory().await;
                engine.write(&key("alpha"), b"one".to_vec()).await.unwrap();

                assert_eq!(engine.read(&key("alpha")).await.unwrap(), Some(b"one".to_vec()));
                assert!(engine.key_exists(&key("alpha")).await.unwrap());
                assert_eq!(engine.read(&key("beta")).await.unwrap(), None);
                assert!(!engine.key_exists(&key("beta")).await.unwrap());
            }

            #[tokio::test]
            async fn empty_value_round_trips() {
                let (engine, _dir) = $factory().await;
                engine.write(&key("empty"), Vec::new()).await.unwrap();
                assert_eq!(engine.read(&key("empty")).await.unwrap(), Some(Vec::new()));
            }

            #[tokio::test]
            async fn overwrite_replaces_value() {
                let (engine, _dir) = $factory().await;
                engine.write(&key("alpha"), b"one".to_vec()).await.unwrap();
                engine.write(&key("alpha"), b"two".to_vec()).await.unwrap();

                assert_eq!(engine.read(&key("alpha")).await.unwrap(), Some(b"two".to_vec()));
                assert_eq!(engine.key_count().await.unwrap(), 1);
            }

            #[tokio::test]
            async fn remove_is_idempotent() {
                let (engine, _dir) = $factory().await;
                engine.write(&key("alpha"), b"one".to_vec()).await.unwrap();

                engine.remove(&key("alpha")).await.unwrap();
                engine.remove(&key("alpha")).await.unwrap();
                engine.remove(&key("never-written")).await.unwrap();

                assert_eq!(engine.read(&key("alpha")).await.unwrap(), None);
                assert_eq!(engine.created_at(&key("alpha")).await.unwrap(), None);
                assert_eq!(engine.updated_at(&key("alpha")).await.unwrap(), None);
            }

            #[tokio::test]
            async fn enumeration_matches_writes() {
                let (engine, _dir) = $factory().await;
                let names = ["delta", "alpha", "charlie", "bravo"];
                for name in names {
                    engine.write(&key(name), name.as_bytes().to_vec()).await.unwrap();
                }

                let listed: BTreeSet<String> =
                    engine.all_keys().await.unwrap().iter().map(|k| k.value().to_string()).collect();
                let expected: BTreeSet<String> = names.iter().map(|n| n.to_string()).collect();
                assert_eq!(listed, expected);
                assert_eq!(engine.key_count().await.unwrap(), names.len());

                let pairs = engine.read_all_pairs().await.unwrap();
                assert_eq!(pairs.len(), names.len());
                for (k, v) in pairs {
                    assert_eq!(k.value().as_bytes(), v.as_slice());
                }
            }

            #[tokio::test]
            async fn read_pairs_skips_misses() {
                let (engine, _dir) = $factory().await;
                engine.write(&key("a"), b"A".to_vec()).await.unwrap();
                engine.write(&key("c"), b"C".to_vec()).await.unwrap();

                let pairs = engine.read_pairs(&[key("c"), key("b"), key("a")]).await.unwrap();
                assert_eq!(pairs, vec![(key("c"), b"C".to_vec()), (key("a"), b"A".to_vec())]);

                let values = engine.read_many(&[key("a"), key("missing")]).await.unwrap();
                assert_eq!(values, vec![b"A".to_vec()]);
            }

            #[tokio::test]
            async fn timestamps_follow_writes() {
                let (engine, _dir) = $factory().await;
                engine.write(&key("alpha"), b"one".to_vec()).await.unwrap();

                let updated = engine.updated_at(&key("alpha")).await.unwrap();
                assert!(updated.is_some());

                if let Some(created) = engine.created_at(&key("alpha")).await.unwrap() {
                    assert!(created <= updated.unwrap() + chrono::Duration::seconds(2));
                }
            }

            #[tokio::test]
            async fn ten_key_scenario() {
                let (engine, _dir) = $factory().await;
                let items =
                    (0..10).map(|i| (key(&i.to_string()), format!("value-{i}").into_bytes())).collect::<Vec<_>>();
                engine.write_many(items).await.unwrap();
                assert_eq!(engine.key_count().await.unwrap(), 10);

                let mut keys = engine.all_keys().await.unwrap();
                keys.sort();
                let listed: Vec<&str> = keys.iter().map(|k| k.value()).collect();
                assert_eq!(listed, ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]);

                let values = engine.read_many(&[key("8"), key("9")]).await.unwrap();
                assert_eq!(values, vec![b"value-8".to_vec(), b"value-9".to_vec()]);

                engine.remove_many(&[key("0"), key("1")]).await.unwrap();
                assert_eq!(engine.key_count().await.unwrap(), 8);

                engine.remove_all().await.unwrap();
                assert_eq!(engine.key_count().await.unwrap(), 0);
                assert!(engine.all_keys().await.unwrap().is_empty());
            }

            #[tokio::test]
            async fn url_keys_are_normalized() {
                let (engine, _dir) = $factory().await;
                let first = CacheKey::from_url(&Url::parse("https://www.example.com/docs/").unwrap());
                let second = CacheKey::from_url(&Url::parse("http://example.com/docs").unwrap());
                assert_eq!(first, second);

                engine.write(&first, b"page".to_vec()).await.unwrap();
                assert_eq!(engine.read(&second).await.unwrap(), Some(b"page".to_vec()));
            }
        }
    };
}

engine_contract!(file, file_engine);
engine_contract!(file_subdirectory, file_subdirectory_engine);
engine_contract!(sqlite, sqlite_engine);
