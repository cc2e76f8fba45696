//! Tests for the state store, run against in-memory SQLite.

use serde_json::json;

use crate::domain::{ChatId, UserId};
use crate::store::{DatabaseType, FilterList, StateStore, StoreConfig};

async fn setup_store() -> StateStore {
    let store = StateStore::connect(StoreConfig::new("sqlite::memory:"))
        .await
        .expect("Failed to connect");
    store.migrate().await.expect("Failed to migrate");
    store
}

async fn count_rows(store: &StateStore, table: &str) -> i64 {
    use sqlx::Row;
    let sql = format!("SELECT COUNT(*) AS n FROM {table}");
    sqlx::query(&sql)
        .fetch_one(store.pool())
        .await
        .expect("count failed")
        .try_get::<i64, _>("n")
        .expect("count column")
}

#[tokio::test]
async fn test_database_type_detection() {
    assert_eq!(
        DatabaseType::from_url("postgres://localhost/db"),
        Some(DatabaseType::PostgreSQL)
    );
    assert_eq!(
        DatabaseType::from_url("postgresql://localhost/db"),
        Some(DatabaseType::PostgreSQL)
    );
    assert_eq!(
        DatabaseType::from_url("sqlite::memory:"),
        Some(DatabaseType::SQLite)
    );
    assert_eq!(DatabaseType::from_url("mysql://localhost/db"), None);
}

#[tokio::test]
async fn test_unsupported_url_is_config_error() {
    let err = StateStore::connect(StoreConfig::new("redis://localhost"))
        .await
        .err()
        .expect("should fail");
    assert!(matches!(err, crate::Error::Config(_)));
}

#[tokio::test]
async fn test_migrate_is_idempotent() {
    let store = setup_store().await;
    store.migrate().await.unwrap();
    store.ping().await.unwrap();
    assert_eq!(store.database_type(), DatabaseType::SQLite);
}

#[tokio::test]
async fn test_license_upsert_overwrites_without_duplicating() {
    let store = setup_store().await;
    let user = UserId(100);

    assert!(store.license(user).await.unwrap().is_none());

    store.upsert_license(user, "CODE-1").await.unwrap();
    store.upsert_license(user, "CODE-2").await.unwrap();

    let license = store.license(user).await.unwrap().unwrap();
    assert_eq!(license.license_code, "CODE-2");
    assert!(license.active);
    assert_eq!(count_rows(&store, "user_licenses").await, 1);
}

#[tokio::test]
async fn test_license_revalidation_reactivates() {
    let store = setup_store().await;
    let user = UserId(7);

    store.upsert_license(user, "A").await.unwrap();
    assert!(store.set_license_active(user, false).await.unwrap());
    assert!(!store.license(user).await.unwrap().unwrap().active);

    store.upsert_license(user, "B").await.unwrap();
    assert!(store.license(user).await.unwrap().unwrap().active);

    assert!(!store.set_license_active(UserId(8), false).await.unwrap());
}

#[tokio::test]
async fn test_connection_upsert_keeps_one_row_and_advances_timestamp() {
    let store = setup_store().await;
    let user = UserId(1);

    store.upsert_connection(user, "+33600000000").await.unwrap();
    let first = store.connection(user, "+33600000000").await.unwrap().unwrap();

    store.upsert_connection(user, "+33600000000").await.unwrap();
    let second = store.connection(user, "+33600000000").await.unwrap().unwrap();

    assert_eq!(count_rows(&store, "user_connections").await, 1);
    assert!(second.connected_at > first.connected_at);
    assert!(second.active);
}

#[tokio::test]
async fn test_reconnect_reactivates_connection() {
    let store = setup_store().await;
    let user = UserId(1);

    store.upsert_connection(user, "+1").await.unwrap();
    assert!(store.deactivate_connection(user, "+1").await.unwrap());
    assert!(store.active_connections(user).await.unwrap().is_empty());
    // Already inactive.
    assert!(!store.deactivate_connection(user, "+1").await.unwrap());

    store.upsert_connection(user, "+1").await.unwrap();
    let active = store.active_connections(user).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].phone_number, "+1");
}

#[tokio::test]
async fn test_active_connections_are_scoped_and_ordered() {
    let store = setup_store().await;

    store.upsert_connection(UserId(1), "+1").await.unwrap();
    store.upsert_connection(UserId(1), "+2").await.unwrap();
    store.upsert_connection(UserId(1), "+3").await.unwrap();
    store.upsert_connection(UserId(2), "+9").await.unwrap();
    store.deactivate_connection(UserId(1), "+2").await.unwrap();

    let phones: Vec<String> = store
        .active_connections(UserId(1))
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.phone_number)
        .collect();
    assert_eq!(phones, vec!["+1".to_string(), "+3".to_string()]);
}

#[tokio::test]
async fn test_identical_redirections_are_all_kept() {
    let store = setup_store().await;
    let user = UserId(5);

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(
            store
                .insert_redirection(user, "+1", ChatId(-100), ChatId(-200))
                .await
                .unwrap(),
        );
    }
    ids.dedup();
    assert_eq!(ids.len(), 3);

    let rules = store.active_redirections(user).await.unwrap();
    assert_eq!(rules.len(), 3);
    assert!(rules
        .iter()
        .all(|r| r.source_chat_id == ChatId(-100) && r.destination_chat_id == ChatId(-200)));
}

#[tokio::test]
async fn test_deactivated_redirection_is_not_listed() {
    let store = setup_store().await;
    let user = UserId(5);

    let keep = store
        .insert_redirection(user, "+1", ChatId(1), ChatId(2))
        .await
        .unwrap();
    let drop = store
        .insert_redirection(user, "+1", ChatId(3), ChatId(4))
        .await
        .unwrap();

    // Another user cannot deactivate it.
    assert!(!store.deactivate_redirection(UserId(6), drop).await.unwrap());
    assert!(store.deactivate_redirection(user, drop).await.unwrap());

    let rules = store.active_redirections(user).await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].id, keep);
    assert_eq!(count_rows(&store, "redirections").await, 2);
}

#[tokio::test]
async fn test_transformation_settings_are_stored_opaquely() {
    let store = setup_store().await;
    let user = UserId(9);
    let settings = json!({
        "find": ["@old"],
        "replace": "@new",
        "nested": { "case_sensitive": false }
    });

    let id = store
        .insert_transformation(user, "+1", "text_replace", &settings)
        .await
        .unwrap();
    store
        .insert_transformation(user, "+2", "header", &json!({"text": "hi"}))
        .await
        .unwrap();

    let rows = store.active_transformations(user, "+1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, id);
    assert_eq!(rows[0].transformation_type, "text_replace");
    assert_eq!(rows[0].settings, settings);

    assert!(store.deactivate_transformation(user, id).await.unwrap());
    assert!(store.active_transformations(user, "+1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_whitelist_and_blacklist_are_independent() {
    let store = setup_store().await;
    let user = UserId(3);

    store
        .insert_filter(FilterList::Whitelist, user, "+1", "keyword", "crypto")
        .await
        .unwrap();
    let black = store
        .insert_filter(FilterList::Blacklist, user, "+1", "keyword", "crypto")
        .await
        .unwrap();

    let white = store
        .active_filters(FilterList::Whitelist, user, "+1")
        .await
        .unwrap();
    let blacks = store
        .active_filters(FilterList::Blacklist, user, "+1")
        .await
        .unwrap();
    assert_eq!(white.len(), 1);
    assert_eq!(white[0].list, FilterList::Whitelist);
    assert_eq!(blacks.len(), 1);
    assert_eq!(blacks[0].filter_value, "crypto");

    assert!(store
        .deactivate_filter(FilterList::Blacklist, user, black)
        .await
        .unwrap());
    assert!(store
        .active_filters(FilterList::Blacklist, user, "+1")
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        store
            .active_filters(FilterList::Whitelist, user, "+1")
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_session_upsert_and_touch() {
    let store = setup_store().await;
    let user = UserId(4);

    store
        .upsert_session(user, "+1", "sessions/4_1.session")
        .await
        .unwrap();
    store
        .upsert_session(user, "+1", "sessions/4_1b.session")
        .await
        .unwrap();
    assert_eq!(count_rows(&store, "user_sessions").await, 1);

    let before = store.session(user, "+1").await.unwrap().unwrap();
    assert_eq!(before.session_file, "sessions/4_1b.session");

    assert!(store.touch_session(user, "+1").await.unwrap());
    let after = store.session(user, "+1").await.unwrap().unwrap();
    assert!(after.last_activity > before.last_activity);

    assert!(!store.touch_session(user, "+2").await.unwrap());
    assert_eq!(store.active_sessions(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_connected_session_writes_both_rows() {
    let store = setup_store().await;
    let user = UserId(11);

    store
        .register_connected_session(user, "+7", "sessions/11_7.session")
        .await
        .unwrap();

    assert!(store.connection(user, "+7").await.unwrap().unwrap().active);
    let session = store.session(user, "+7").await.unwrap().unwrap();
    assert_eq!(session.session_file, "sessions/11_7.session");
}

#[tokio::test]
async fn test_reads_fail_after_close() {
    let store = setup_store().await;
    store.close().await;

    assert!(store.ping().await.is_err());
    assert!(store.license(UserId(1)).await.is_err());
}
