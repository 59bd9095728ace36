use storage::keys;
use storage::repository::KeyValueStore;
use storage::sqlite::SqliteStore;

#[tokio::test]
async fn sqlite_round_trips_values() {
    let store = SqliteStore::connect("sqlite:file:memdb_kv_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("migrate");

    store.set(keys::PROGRESS, r#"{"answers":{}}"#).await.unwrap();
    assert_eq!(
        store.get(keys::PROGRESS).await.unwrap().as_deref(),
        Some(r#"{"answers":{}}"#)
    );

    store.set(keys::PROGRESS, r#"{"answers":{"q1":{}}}"#).await.unwrap();
    assert_eq!(
        store.get(keys::PROGRESS).await.unwrap().as_deref(),
        Some(r#"{"answers":{"q1":{}}}"#)
    );
    assert!(store.contains(keys::PROGRESS).await.unwrap());
}

#[tokio::test]
async fn sqlite_lists_and_removes_keys() {
    let store = SqliteStore::connect("sqlite:file:memdb_kv_keys?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("migrate");
    // Migrations are idempotent.
    store.migrate().await.expect("migrate twice");

    store.set("exam_attempt_b", "{}").await.unwrap();
    store.set("exam_attempt_a", "{}").await.unwrap();
    store.set(keys::ACTIVE_ATTEMPT, "{}").await.unwrap();

    let listed = store.keys().await.unwrap();
    assert_eq!(
        listed,
        vec![
            keys::ACTIVE_ATTEMPT.to_string(),
            "exam_attempt_a".to_string(),
            "exam_attempt_b".to_string(),
        ]
    );

    store.remove("exam_attempt_a").await.unwrap();
    store.remove("exam_attempt_a").await.unwrap();
    assert!(!store.contains("exam_attempt_a").await.unwrap());
    assert_eq!(store.keys().await.unwrap().len(), 2);
}
