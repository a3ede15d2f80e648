//! PostgreSQL document store integration tests.
//!
//! Run with: `cargo test -p pictura-db --test postgres_test -- --ignored`
//! Requires Docker for testcontainers (Postgres).

#![cfg(feature = "store-postgres")]

use pictura_db::{DocumentStore, PgDocumentStore};
use serde_json::json;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

struct TestDb {
    store: PgDocumentStore,
    _container: ContainerAsync<Postgres>,
}

async fn setup_test_db() -> TestDb {
    let container = Postgres::default()
        .start()
        .await
        .expect("Failed to start Postgres container");

    let connection_string = format!(
        "postgresql://postgres:postgres@{}:{}/postgres",
        container.get_host().await.expect("Failed to resolve container host"),
        container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to resolve container port")
    );

    let store = PgDocumentStore::connect(&connection_string, 5)
        .await
        .expect("Failed to connect to test database");

    TestDb {
        store,
        _container: container,
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_replace_overwrites_whole_document() {
    let db = setup_test_db().await;

    db.store
        .replace("exif", "abc", json!({ "Format": "JPEG", "Geometry": "800x600" }))
        .await
        .unwrap();
    db.store
        .replace("exif", "abc", json!({ "Format": "PNG" }))
        .await
        .unwrap();

    assert_eq!(
        db.store.get("exif", "abc").await.unwrap(),
        Some(json!({ "Format": "PNG" }))
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_merge_creates_missing_document() {
    let db = setup_test_db().await;

    assert!(db.store.get("images", "abc").await.unwrap().is_none());

    db.store
        .merge_into("images", "abc", json!({ "repros": { "thumbnail": "t-url" } }))
        .await
        .unwrap();

    assert_eq!(
        db.store.get("images", "abc").await.unwrap(),
        Some(json!({ "repros": { "thumbnail": "t-url" } }))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "requires Docker"]
async fn test_concurrent_merges_keep_sibling_keys() {
    let db = setup_test_db().await;

    db.store
        .replace("images", "abc", json!({ "name": "photo.jpg" }))
        .await
        .unwrap();

    let thumbnail = db.store.clone();
    let small = db.store.clone();
    let (first, second) = tokio::join!(
        tokio::spawn(async move {
            thumbnail
                .merge_into("images", "abc", json!({ "repros": { "thumbnail": "t-url" } }))
                .await
        }),
        tokio::spawn(async move {
            small
                .merge_into("images", "abc", json!({ "repros": { "small": "s-url" } }))
                .await
        }),
    );
    first.unwrap().unwrap();
    second.unwrap().unwrap();

    assert_eq!(
        db.store.get("images", "abc").await.unwrap(),
        Some(json!({
            "name": "photo.jpg",
            "repros": { "thumbnail": "t-url", "small": "s-url" }
        }))
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_delete_reports_presence() {
    let db = setup_test_db().await;

    db.store
        .replace("labels", "abc", json!({ "labels": [] }))
        .await
        .unwrap();

    assert!(db.store.delete("labels", "abc").await.unwrap());
    assert!(!db.store.delete("labels", "abc").await.unwrap());
    assert!(db.store.get("labels", "abc").await.unwrap().is_none());
}
