//! Every driver honours the same contract

use datavault_storage::{
    BinaryCodecStorage, Dataset, Error, HybridStorage, LocalFileStorage, MemoryStorage, Record,
    RemoteObjectStorage, Storage,
};
use datavault_core::RemoteConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn alice() -> Dataset {
    let mut numeric = HashMap::new();
    numeric.insert("Fin".to_string(), 10);
    Dataset::new(
        vec![Record {
            uid: 1,
            name: "Alice".to_string(),
            numeric_attributes: numeric,
            overall: 10,
            ..Default::default()
        }],
        "$",
    )
}

fn bob() -> Dataset {
    Dataset::new(
        vec![Record {
            uid: 2,
            name: "Bob".to_string(),
            ..Default::default()
        }],
        "€",
    )
}

/// Each driver under test, with the directory keeping it alive
async fn drivers() -> Vec<(Arc<dyn Storage>, Option<TempDir>)> {
    let local_dir = TempDir::new().unwrap();
    let hybrid_dir = TempDir::new().unwrap();
    let wrapped_dir = TempDir::new().unwrap();

    let local = LocalFileStorage::new(local_dir.path()).await.unwrap();
    let hybrid = HybridStorage::new(hybrid_dir.path()).await.unwrap();
    let wrapped = BinaryCodecStorage::new(LocalFileStorage::new(wrapped_dir.path()).await.unwrap());
    let remote = RemoteObjectStorage::new(
        RemoteConfig {
            endpoint: "127.0.0.1:1".to_string(),
            access_key: "access".to_string(),
            secret_key: "secret".to_string(),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        },
        Arc::new(MemoryStorage::new()),
    )
    .await;

    vec![
        (Arc::new(MemoryStorage::new()), None),
        (Arc::new(local), Some(local_dir)),
        (Arc::new(hybrid), Some(hybrid_dir)),
        (Arc::new(wrapped), Some(wrapped_dir)),
        (Arc::new(remote), None),
        (Arc::new(BinaryCodecStorage::new(MemoryStorage::new())), None),
    ]
}

#[tokio::test]
async fn round_trip_on_every_driver() {
    for (storage, _dir) in drivers().await {
        let name = storage.backend_name();
        storage.store("abc", alice()).await.unwrap();
        assert_eq!(storage.retrieve("abc").await.unwrap(), alice(), "{name}");
    }
}

#[tokio::test]
async fn overwrite_replaces_whole_dataset() {
    for (storage, _dir) in drivers().await {
        storage.store("abc", alice()).await.unwrap();
        storage.store("abc", bob()).await.unwrap();
        assert_eq!(storage.retrieve("abc").await.unwrap(), bob(), "{}", storage.backend_name());
    }
}

#[tokio::test]
async fn delete_is_idempotent_and_retrieve_then_fails() {
    for (storage, _dir) in drivers().await {
        let name = storage.backend_name();
        storage.store("abc", alice()).await.unwrap();
        storage.delete("abc").await.unwrap();
        storage.delete("abc").await.unwrap();
        assert!(storage.retrieve("abc").await.unwrap_err().is_not_found(), "{name}");
        assert!(!storage.list().await.unwrap().contains(&"abc".to_string()), "{name}");
    }
}

#[tokio::test]
async fn list_reports_each_id_once() {
    for (storage, _dir) in drivers().await {
        storage.store("one", alice()).await.unwrap();
        storage.store("two", bob()).await.unwrap();
        storage.store("one", bob()).await.unwrap();

        let mut ids = storage.list().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["one", "two"], "{}", storage.backend_name());
    }
}

#[tokio::test]
async fn hostile_ids_are_rejected_by_file_backed_drivers() {
    for (storage, _dir) in drivers().await {
        if storage.backend_name() == "memory" {
            continue;
        }
        for id in ["../etc/passwd", "a/b", "", "with space", &"x".repeat(101)] {
            let err = storage.store(id, alice()).await.unwrap_err();
            assert!(
                matches!(err, Error::InvalidId { .. }),
                "{} accepted {id:?}",
                storage.backend_name()
            );
        }
    }
}

#[tokio::test]
async fn cleanup_keeps_excluded_and_recent_datasets() {
    for (storage, _dir) in drivers().await {
        storage.store("demo", alice()).await.unwrap();
        storage.store("recent", bob()).await.unwrap();

        storage
            .cleanup_old_datasets(Duration::from_secs(3600), &["demo".to_string()])
            .await
            .unwrap();

        let mut ids = storage.list().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["demo", "recent"], "{}", storage.backend_name());
    }
}

#[tokio::test]
async fn wrapped_local_store_survives_a_new_instance() {
    let dir = TempDir::new().unwrap();
    let dataset = Dataset::new(
        vec![Record {
            name: "Alice".to_string(),
            overall: 10,
            ..Default::default()
        }],
        "$",
    );

    {
        let storage = BinaryCodecStorage::new(LocalFileStorage::new(dir.path()).await.unwrap());
        storage.store("abc", dataset.clone()).await.unwrap();
    }

    let reopened = BinaryCodecStorage::new(LocalFileStorage::new(dir.path()).await.unwrap());
    assert_eq!(reopened.retrieve("abc").await.unwrap(), dataset);
}

#[tokio::test]
async fn plain_files_read_through_the_wrapper() {
    let dir = TempDir::new().unwrap();
    LocalFileStorage::new(dir.path())
        .await
        .unwrap()
        .store("legacy", alice())
        .await
        .unwrap();

    let wrapped = BinaryCodecStorage::new(LocalFileStorage::new(dir.path()).await.unwrap());
    assert_eq!(wrapped.retrieve("legacy").await.unwrap(), alice());
}

#[tokio::test]
async fn unreachable_remote_serves_from_fallback() {
    let fallback = Arc::new(MemoryStorage::new());
    let remote = RemoteObjectStorage::new(
        RemoteConfig {
            endpoint: "127.0.0.1:1".to_string(),
            access_key: "access".to_string(),
            secret_key: "secret".to_string(),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        },
        fallback.clone(),
    )
    .await;
    assert!(!remote.is_connected());

    remote.store("abc", alice()).await.unwrap();
    assert_eq!(remote.retrieve("abc").await.unwrap(), alice());
    assert_eq!(fallback.len(), 1);
}

#[tokio::test]
async fn concurrent_writers_leave_one_complete_dataset() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(HybridStorage::new(dir.path()).await.unwrap());

    let mut tasks = Vec::new();
    for i in 0..16 {
        let storage = Arc::clone(&storage);
        tasks.push(tokio::spawn(async move {
            let dataset = if i % 2 == 0 { alice() } else { bob() };
            storage.store("shared", dataset).await.unwrap();
            storage.retrieve("shared").await.unwrap()
        }));
    }

    for task in tasks {
        let seen = task.await.unwrap();
        assert!(seen == alice() || seen == bob());
    }

    let fresh = LocalFileStorage::new(dir.path()).await.unwrap();
    let stored = fresh.retrieve("shared").await.unwrap();
    assert!(stored == alice() || stored == bob());
    assert_eq!(fresh.list().await.unwrap(), vec!["shared"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_hybrid_writers_are_all_listed() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(HybridStorage::new(dir.path()).await.unwrap());

    let mut tasks = Vec::new();
    for i in 0..32 {
        let storage = Arc::clone(&storage);
        tasks.push(tokio::spawn(async move {
            storage.store(&format!("dataset-{i}"), alice()).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let ids = storage.list().await.unwrap();
    assert_eq!(ids.len(), 32);
    for i in 0..32 {
        assert!(ids.contains(&format!("dataset-{i}")));
    }
}

mod float_fidelity {
    use super::*;
    use proptest::prelude::*;

    fn finite() -> impl Strategy<Value = f64> {
        prop::num::f64::POSITIVE
            | prop::num::f64::NEGATIVE
            | prop::num::f64::NORMAL
            | prop::num::f64::SUBNORMAL
            | prop::num::f64::ZERO
    }

    fn with_floats(stats: &[f64], percentiles: &[f64]) -> Dataset {
        let stats = stats
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("stat{i}"), *v))
            .collect();
        let group = percentiles
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("pct{i}"), *v))
            .collect();
        Dataset::new(
            vec![Record {
                uid: 7,
                name: "Floaty".to_string(),
                performance_stats_numeric: stats,
                performance_percentiles: HashMap::from([("Attacking".to_string(), group)]),
                ..Default::default()
            }],
            "$",
        )
    }

    fn bits(dataset: &Dataset) -> Vec<(String, u64)> {
        let record = &dataset.records[0];
        let mut out: Vec<(String, u64)> = record
            .performance_stats_numeric
            .iter()
            .map(|(k, v)| (k.clone(), v.to_bits()))
            .chain(
                record
                    .performance_percentiles
                    .values()
                    .flat_map(|group| group.iter().map(|(k, v)| (k.clone(), v.to_bits()))),
            )
            .collect();
        out.sort();
        out
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn text_drivers_keep_every_float_bit(
            stats in prop::collection::vec(finite(), 0..6),
            percentiles in prop::collection::vec(finite(), 0..6),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let dataset = with_floats(&stats, &percentiles);

            runtime.block_on(async {
                let local_dir = TempDir::new().unwrap();
                let hybrid_dir = TempDir::new().unwrap();
                let drivers: Vec<Arc<dyn Storage>> = vec![
                    Arc::new(LocalFileStorage::new(local_dir.path()).await.unwrap()),
                    Arc::new(HybridStorage::new(hybrid_dir.path()).await.unwrap()),
                ];
                for driver in drivers {
                    driver.store("floats", dataset.clone()).await.unwrap();
                    let back = driver.retrieve("floats").await.unwrap();
                    assert_eq!(bits(&back), bits(&dataset), "{}", driver.backend_name());
                }
            });
        }
    }
}
