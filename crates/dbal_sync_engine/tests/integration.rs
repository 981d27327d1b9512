//! Integration tests for the sync engine against an in-memory remote.

use dbal_sync_engine::{
    Collection, ConflictId, EntityMapping, EntityRecord, LocalStore, MemoryRemote, MemoryStore,
    ResolutionStrategy, SyncConfig, SyncEngine, SyncError, SyncStatus,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const TENANT: &str = "t1";

fn record(value: serde_json::Value) -> EntityRecord {
    EntityRecord::from_value(value).unwrap()
}

struct Fixture {
    remote: Arc<MemoryRemote>,
    store: Arc<MemoryStore>,
    engine: SyncEngine,
}

fn fixture_with(config: SyncConfig) -> Fixture {
    let remote = Arc::new(MemoryRemote::new());
    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::new(
        config,
        EntityMapping::default().shared(),
        remote.clone(),
        store.clone(),
    );
    Fixture {
        remote,
        store,
        engine,
    }
}

fn fixture() -> Fixture {
    fixture_with(SyncConfig::new("http://dbal.test", TENANT))
}

#[tokio::test]
async fn remote_version_wins_after_detection() {
    let f = fixture();
    f.store.replace(
        Collection::Files,
        vec![record(
            json!({"id": "f1", "tenantId": "t1", "content": "a", "updatedAt": 100}),
        )],
    );
    f.remote.insert(
        TENANT,
        "core",
        "File",
        record(json!({"id": "f1", "tenantId": "t1", "content": "b", "updatedAt": 200})),
    );

    let conflicts = f.engine.detect_conflicts().await;
    assert_eq!(conflicts.len(), 1);
    let id = &conflicts[0].id;
    assert_eq!(id.to_string(), "files:f1");
    assert!(conflicts[0].remote_is_newer());

    let resolution = f
        .engine
        .resolve(id, ResolutionStrategy::Remote, None)
        .await
        .unwrap();
    assert_eq!(resolution.record.get("content"), Some(&json!("b")));

    let local = f.store.get(Collection::Files, "f1").unwrap();
    assert_eq!(local.get("content"), Some(&json!("b")));
    assert!(f.engine.pending_conflicts().is_empty());
}

#[tokio::test]
async fn pull_of_empty_remote_has_every_collection() {
    let f = fixture();

    let snapshot = f.engine.pull().await;
    assert_eq!(snapshot.len(), Collection::ALL.len());
    for collection in Collection::ALL {
        assert_eq!(snapshot.get(&collection), Some(&Vec::new()));
    }
    assert_eq!(f.engine.status(), SyncStatus::Success);
}

#[tokio::test]
async fn upsert_during_outage_leaves_store_alone() {
    let f = fixture();
    f.store
        .replace(Collection::Settings, vec![record(json!({"id": "s1", "v": 1}))]);
    let writes = f.store.write_count();
    f.remote.set_offline(true);

    let err = f
        .engine
        .client()
        .upsert(Collection::Settings, "s1", &record(json!({"v": 2})))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::RemoteUnavailable(_)));
    assert_eq!(err.user_message(), "service unreachable, working offline");
    assert_eq!(f.store.write_count(), writes);
    assert_eq!(
        f.store.get(Collection::Settings, "s1").unwrap().get("v"),
        Some(&json!(1))
    );
}

#[tokio::test]
async fn repeated_upsert_is_idempotent() {
    let f = fixture();
    let theme = record(json!({"name": "dark", "bg": "#000"}));

    f.engine
        .client()
        .upsert(Collection::Themes, "dark", &theme)
        .await
        .unwrap();
    let once = f.remote.entities(TENANT, "core", "Theme");

    f.engine
        .client()
        .upsert(Collection::Themes, "dark", &theme)
        .await
        .unwrap();
    let twice = f.remote.entities(TENANT, "core", "Theme");

    assert_eq!(once, twice);
    assert_eq!(twice.len(), 1);
}

#[tokio::test]
async fn resolve_all_keeps_only_failures() {
    let f = fixture();
    let locals: Vec<EntityRecord> = (0..4)
        .map(|i| record(json!({"id": format!("w{i}"), "step": "local"})))
        .collect();
    f.store.replace(Collection::Workflows, locals);
    for i in 0..4 {
        f.remote.insert(
            TENANT,
            "core",
            "Workflow",
            record(json!({"id": format!("w{i}"), "step": "remote"})),
        );
    }

    let conflicts = f.engine.detect_conflicts().await;
    assert_eq!(conflicts.len(), 4);

    // A manual resolution of one item fails without a custom version.
    let first: ConflictId = "workflows:w0".parse().unwrap();
    let err = f
        .engine
        .resolve(&first, ResolutionStrategy::Manual, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::MissingCustomVersion(_)));

    let report = f.engine.resolve_all(ResolutionStrategy::Merge).await;
    assert_eq!(report.resolved.len(), 4);
    assert!(report.failed.is_empty());
    assert!(f.engine.pending_conflicts().is_empty());
    assert_eq!(f.engine.stats().conflicts_resolved, 4);

    for i in 0..4 {
        let id = format!("w{i}");
        let merged = f.store.get(Collection::Workflows, &id).unwrap();
        assert_eq!(merged.get("step"), Some(&json!("local")));
        let echoed = f.remote.entity(TENANT, "core", "Workflow", &id).unwrap();
        assert!(echoed.get("mergedAt").is_some());
    }
}

#[tokio::test]
async fn pull_settles_under_partial_outage() {
    let f = fixture();
    f.remote
        .insert(TENANT, "core", "Lambda", record(json!({"id": "l1"})));
    f.remote
        .insert(TENANT, "core", "Model", record(json!({"id": "m1"})));
    f.remote.fail_path("/t1/core/Model", 503, "maintenance");

    let snapshot = f.engine.pull().await;
    assert_eq!(snapshot.len(), Collection::ALL.len());
    assert_eq!(snapshot[&Collection::Lambdas].len(), 1);
    assert!(snapshot[&Collection::Models].is_empty());
}

#[tokio::test]
async fn push_then_detect_finds_nothing() {
    let f = fixture();
    f.store.replace(
        Collection::Translations,
        vec![
            record(json!({"id": "en", "tenantId": "t1", "hello": "Hello"})),
            record(json!({"id": "fr", "tenantId": "t1", "hello": "Bonjour"})),
        ],
    );

    let summary = f.engine.push().await;
    assert_eq!(summary.synced, 2);
    assert!(summary.is_clean());

    assert!(f.engine.detect_conflicts().await.is_empty());
    assert_eq!(f.engine.stats().pushes, 1);
}

#[tokio::test(start_paused = true)]
async fn slow_remote_counts_as_unavailable() {
    let f = fixture_with(
        SyncConfig::new("http://dbal.test", TENANT).with_request_timeout(Duration::from_secs(2)),
    );
    f.remote.set_latency(Some(Duration::from_secs(30)));

    let err = f
        .engine
        .client()
        .upsert(Collection::Components, "c1", &record(json!({"kind": "button"})))
        .await
        .unwrap_err();
    assert!(err.is_offline());

    let fetched = f.engine.client().fetch(Collection::Components, "c1").await;
    assert_eq!(fetched, Ok(None));
}
