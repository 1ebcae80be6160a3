//! SessionStore scenarios over a real SQLite database.

use chrono::Duration;
use kvsession_core::{
    Clock, ManualClock, SessionData, SessionStore, StoreConfig, TouchOutcome, to_epoch_seconds,
};
use kvsession_sqlite::SqliteBackend;
use serde_json::json;
use tempfile::TempDir;

const NOW_MS: i64 = 1_700_000_000_000;

fn store_at(
    dir: &TempDir,
    config: StoreConfig,
) -> (SessionStore<SqliteBackend, ManualClock>, ManualClock) {
    let backend = SqliteBackend::open(dir.path().join("sessions.db"), &config).unwrap();
    let clock = ManualClock::at_millis(NOW_MS);
    let store = SessionStore::with_clock(config, backend, clock.clone()).unwrap();
    (store, clock)
}

#[tokio::test]
async fn test_set_get_destroy() {
    let dir = TempDir::new().unwrap();
    let (store, _) = store_at(&dir, StoreConfig::default());

    store
        .set("abc", SessionData::new().with_field("user", "ada"))
        .await
        .unwrap();

    let loaded = store.get("abc").await.unwrap().unwrap();
    assert_eq!(loaded.field("user"), Some(&json!("ada")));
    assert_eq!(loaded.updated(), Some(NOW_MS));

    store.destroy("abc").await.unwrap();
    assert!(store.get("abc").await.unwrap().is_none());
    store.destroy("abc").await.unwrap();
}

#[tokio::test]
async fn test_touch_extends_expiry() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default().with_ttl(std::time::Duration::from_secs(60));
    let (store, clock) = store_at(&dir, config);

    let written = store.set("abc", SessionData::new()).await.unwrap();

    clock.advance(Duration::seconds(45));
    let outcome = store.touch("abc", &written).await.unwrap();
    assert!(outcome.is_refreshed());

    // Past the original expiry but inside the refreshed one
    clock.advance(Duration::seconds(30));
    let loaded = store.get("abc").await.unwrap().unwrap();
    assert_eq!(loaded.updated(), Some(NOW_MS + 45_000));
}

#[tokio::test]
async fn test_touch_after_destroy_is_missing() {
    let dir = TempDir::new().unwrap();
    let (store, clock) = store_at(&dir, StoreConfig::default());

    let written = store.set("abc", SessionData::new()).await.unwrap();
    store.destroy("abc").await.unwrap();

    clock.advance(Duration::minutes(5));
    let outcome = store.touch("abc", &written).await.unwrap();
    assert_eq!(outcome, TouchOutcome::Missing);
    assert_eq!(store.backend().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_optimistic_touch_loses_to_newer_set() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default().with_optimistic_touch(true);
    let (store, clock) = store_at(&dir, config);

    let stale = store.set("abc", SessionData::new()).await.unwrap();
    clock.advance(Duration::minutes(1));
    store
        .set("abc", SessionData::new().with_field("n", 2))
        .await
        .unwrap();

    clock.advance(Duration::minutes(1));
    let outcome = store.touch("abc", &stale).await.unwrap();
    assert_eq!(outcome, TouchOutcome::Missing);

    let loaded = store.get("abc").await.unwrap().unwrap();
    assert_eq!(loaded.field("n"), Some(&json!(2)));
}

#[tokio::test]
async fn test_expired_session_deleted_then_purge_is_empty() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default().with_ttl(std::time::Duration::from_secs(10));
    let (store, clock) = store_at(&dir, config);

    store.set("a", SessionData::new()).await.unwrap();
    store.set("b", SessionData::new()).await.unwrap();
    clock.advance(Duration::seconds(11));

    assert!(store.get("a").await.unwrap().is_none());
    assert_eq!(store.backend().count().await.unwrap(), 1);

    let now_secs = to_epoch_seconds(clock.now());
    assert_eq!(store.backend().purge_expired(now_secs).await.unwrap(), 1);
    assert_eq!(store.backend().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_payload_nulls_survive_sqlite() {
    let dir = TempDir::new().unwrap();
    let (store, _) = store_at(&dir, StoreConfig::default());
    let session = SessionData::from_value(json!({
        "cookie": { "maxAge": null, "path": "/" },
        "flash": null
    }))
    .unwrap();

    store.set("abc", session).await.unwrap();
    let loaded = store.get("abc").await.unwrap().unwrap();

    assert_eq!(
        loaded.to_value(),
        json!({
            "cookie": { "maxAge": null, "path": "/" },
            "flash": null,
            "updated": NOW_MS
        })
    );
}
